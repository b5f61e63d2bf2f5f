//! The statement tree handed to the loader.
//!
//! A front end (the text parser, or a host building scripts in code)
//! produces a [`Script`]. Nothing in here is validated yet; that happens in
//! [`crate::Runtime::install`].

use std::fmt;

use skript_registry::{ChangeMode, ClassId, ClassRegistry, Relation, Time, Value};

use crate::cond::Condition;
use crate::effect::{AsyncEffect, Effect};
use crate::expr::{Expression, Literal};
use crate::node::ExitScope;

#[derive(Debug, Default)]
pub struct Script {
    pub name: String,
    pub items: Vec<Item>,
}

impl Script {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn trigger(mut self, name: impl Into<String>, event: ClassId, body: Vec<Stmt>) -> Self {
        self.items.push(Item::Trigger(TriggerDef {
            name: name.into(),
            event,
            body,
        }));
        self
    }

    #[must_use]
    pub fn function(mut self, def: FunctionDef) -> Self {
        self.items.push(Item::Function(def));
        self
    }
}

#[derive(Debug)]
pub enum Item {
    Trigger(TriggerDef),
    Function(FunctionDef),
}

#[derive(Debug)]
pub struct TriggerDef {
    /// Display name, e.g. `on join`.
    pub name: String,
    pub event: ClassId,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct ParamDef {
    pub name: String,
    pub class: ClassId,
    pub single: bool,
    pub default: Option<Expr>,
}

impl ParamDef {
    pub fn single(name: impl Into<String>, class: ClassId) -> Self {
        Self {
            name: name.into(),
            class,
            single: true,
            default: None,
        }
    }

    pub fn plural(name: impl Into<String>, class: ClassId) -> Self {
        Self {
            single: false,
            ..Self::single(name, class)
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    /// Return class and whether only a single value is returned.
    pub returns: Option<(ClassId, bool)>,
    pub body: Vec<Stmt>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, params: Vec<ParamDef>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params,
            returns: None,
            body,
        }
    }

    #[must_use]
    pub const fn returns(mut self, class: ClassId, single: bool) -> Self {
        self.returns = Some((class, single));
        self
    }
}

/// How many sections an `exit` leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitLevels {
    /// `stop`: the whole trigger.
    Trigger,
    Count(usize),
    /// `stop all loops`
    All,
}

#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: Option<usize>,
}

pub enum StmtKind {
    Effect(Box<dyn Effect>),
    Change {
        target: Expr,
        mode: ChangeMode,
        delta: Option<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Async(Box<dyn AsyncEffect>),
    /// A condition on its own line.
    Condition(Cond),
    DoIf {
        condition: Cond,
        effect: Box<Stmt>,
    },
    If {
        condition: Cond,
        body: Vec<Stmt>,
    },
    ElseIf {
        condition: Cond,
        body: Vec<Stmt>,
    },
    Else {
        body: Vec<Stmt>,
    },
    Loop {
        expr: Expr,
        body: Vec<Stmt>,
    },
    While {
        condition: Cond,
        do_while: bool,
        body: Vec<Stmt>,
    },
    Delay(Expr),
    /// Wait for an operation whose duration `Expr` reports.
    WaitFor(Expr),
    Exit {
        scope: ExitScope,
        levels: ExitLevels,
    },
    Continue,
    Return(Expr),
}

impl fmt::Debug for StmtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Effect(effect) => write!(f, "Effect({effect:?})"),
            Self::Async(effect) => write!(f, "Async({effect:?})"),
            Self::Exit { scope, levels } => write!(f, "Exit({scope:?}, {levels:?})"),
            Self::Change { mode, .. } => write!(f, "Change({mode:?})"),
            Self::Call { name, .. } => write!(f, "Call({name})"),
            Self::Condition(cond) => write!(f, "Condition({cond:?})"),
            Self::DoIf { .. } => f.write_str("DoIf"),
            Self::If { .. } => f.write_str("If"),
            Self::ElseIf { .. } => f.write_str("ElseIf"),
            Self::Else { .. } => f.write_str("Else"),
            Self::Loop { .. } => f.write_str("Loop"),
            Self::While { .. } => f.write_str("While"),
            Self::Delay(duration) => write!(f, "Delay({duration:?})"),
            Self::WaitFor(duration) => write!(f, "WaitFor({duration:?})"),
            Self::Continue => f.write_str("Continue"),
            Self::Return(value) => write!(f, "Return({value:?})"),
        }
    }
}

impl Stmt {
    #[must_use]
    pub const fn new(kind: StmtKind) -> Self {
        Self { kind, line: None }
    }

    #[must_use]
    pub const fn at(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn effect(effect: impl Effect + 'static) -> Self {
        Self::new(StmtKind::Effect(Box::new(effect)))
    }

    pub fn async_effect(effect: impl AsyncEffect + 'static) -> Self {
        Self::new(StmtKind::Async(Box::new(effect)))
    }

    #[must_use]
    pub fn set(target: Expr, value: Expr) -> Self {
        Self::new(StmtKind::Change {
            target,
            mode: ChangeMode::Set,
            delta: Some(value),
        })
    }

    #[must_use]
    pub fn change(target: Expr, mode: ChangeMode, delta: Option<Expr>) -> Self {
        Self::new(StmtKind::Change {
            target,
            mode,
            delta,
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(StmtKind::Call {
            name: name.into(),
            args,
        })
    }

    #[must_use]
    pub fn condition(condition: Cond) -> Self {
        Self::new(StmtKind::Condition(condition))
    }

    #[must_use]
    pub fn do_if(effect: Self, condition: Cond) -> Self {
        Self::new(StmtKind::DoIf {
            condition,
            effect: Box::new(effect),
        })
    }

    #[must_use]
    pub fn if_(condition: Cond, body: Vec<Self>) -> Self {
        Self::new(StmtKind::If { condition, body })
    }

    #[must_use]
    pub fn else_if(condition: Cond, body: Vec<Self>) -> Self {
        Self::new(StmtKind::ElseIf { condition, body })
    }

    #[must_use]
    pub fn else_(body: Vec<Self>) -> Self {
        Self::new(StmtKind::Else { body })
    }

    #[must_use]
    pub fn loop_(expr: Expr, body: Vec<Self>) -> Self {
        Self::new(StmtKind::Loop { expr, body })
    }

    #[must_use]
    pub fn while_(condition: Cond, body: Vec<Self>) -> Self {
        Self::new(StmtKind::While {
            condition,
            do_while: false,
            body,
        })
    }

    #[must_use]
    pub fn do_while(condition: Cond, body: Vec<Self>) -> Self {
        Self::new(StmtKind::While {
            condition,
            do_while: true,
            body,
        })
    }

    #[must_use]
    pub fn delay(duration: Expr) -> Self {
        Self::new(StmtKind::Delay(duration))
    }

    #[must_use]
    pub fn wait_for(duration: Expr) -> Self {
        Self::new(StmtKind::WaitFor(duration))
    }

    #[must_use]
    pub const fn stop() -> Self {
        Self::new(StmtKind::Exit {
            scope: ExitScope::Everything,
            levels: ExitLevels::Trigger,
        })
    }

    #[must_use]
    pub const fn exit(levels: ExitLevels, scope: ExitScope) -> Self {
        Self::new(StmtKind::Exit { scope, levels })
    }

    #[must_use]
    pub const fn continue_() -> Self {
        Self::new(StmtKind::Continue)
    }

    #[must_use]
    pub fn return_(value: Expr) -> Self {
        Self::new(StmtKind::Return(value))
    }

    /// Display form used in load errors.
    #[must_use]
    pub fn describe(&self, classes: &ClassRegistry) -> String {
        let e = |expr: &Expr| expr.describe(classes);
        let c = |cond: &Cond| cond.describe(classes);
        match &self.kind {
            StmtKind::Effect(effect) => effect.describe(None, false),
            StmtKind::Async(effect) => effect.describe(None, false),
            StmtKind::Change {
                target,
                mode,
                delta,
            } => {
                let delta = delta.as_ref().map(e).unwrap_or_default();
                match mode {
                    ChangeMode::Set => format!("set {} to {delta}", e(target)),
                    ChangeMode::Add => format!("add {delta} to {}", e(target)),
                    ChangeMode::Remove => format!("remove {delta} from {}", e(target)),
                    ChangeMode::RemoveAll => format!("remove all {delta} from {}", e(target)),
                    ChangeMode::Delete => format!("delete {}", e(target)),
                    ChangeMode::Reset => format!("reset {}", e(target)),
                }
            }
            StmtKind::Call { name, args } => describe_call(name, args, classes),
            StmtKind::Condition(cond) => c(cond),
            StmtKind::DoIf { condition, effect } => {
                format!("{} if {}", effect.describe(classes), c(condition))
            }
            StmtKind::If { condition, .. } => format!("if {}", c(condition)),
            StmtKind::ElseIf { condition, .. } => format!("else if {}", c(condition)),
            StmtKind::Else { .. } => "else".to_string(),
            StmtKind::Loop { expr, .. } => format!("loop {}", e(expr)),
            StmtKind::While {
                condition,
                do_while,
                ..
            } => format!(
                "{}while {}",
                if *do_while { "do " } else { "" },
                c(condition)
            ),
            StmtKind::Delay(duration) => format!("wait for {}", e(duration)),
            StmtKind::WaitFor(_) => "wait for operation to finish".to_string(),
            StmtKind::Exit { scope, levels } => match levels {
                ExitLevels::Trigger => "stop".to_string(),
                ExitLevels::Count(n) => format!("stop {n} {}", scope.noun()),
                ExitLevels::All => format!("stop all {}", scope.noun()),
            },
            StmtKind::Continue => "continue".to_string(),
            StmtKind::Return(value) => format!("return {}", e(value)),
        }
    }
}

fn describe_call(name: &str, args: &[Expr], classes: &ClassRegistry) -> String {
    let args: Vec<String> = args.iter().map(|a| a.describe(classes)).collect();
    format!("{name}({})", args.join(", "))
}

pub enum Expr {
    Literal(Vec<Value>),
    /// A local variable; names ending in `::*` are lists.
    Local(String),
    EventValue {
        class: ClassId,
        time: Time,
    },
    /// `loop-value`, `loop-<class>` or `loop-<class>-<n>`.
    LoopValue {
        class: Option<ClassId>,
        nth: Option<usize>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Custom(Box<dyn Expression>),
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(vec![value.into()])
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::Local(name.into())
    }

    #[must_use]
    pub const fn event_value(class: ClassId) -> Self {
        Self::EventValue {
            class,
            time: Time::Now,
        }
    }

    #[must_use]
    pub const fn loop_value() -> Self {
        Self::LoopValue {
            class: None,
            nth: None,
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call {
            name: name.into(),
            args,
        }
    }

    pub fn custom(expr: impl Expression + 'static) -> Self {
        Self::Custom(Box::new(expr))
    }

    #[must_use]
    pub fn describe(&self, classes: &ClassRegistry) -> String {
        match self {
            Self::Literal(values) => Literal::new(values.clone()).describe(None, false),
            Self::Local(name) => format!("{{_{name}}}"),
            Self::EventValue { class, time } => match time {
                Time::Now => format!("event-{}", class_name(classes, *class)),
                time => format!("{time} event-{}", class_name(classes, *class)),
            },
            Self::LoopValue { class, nth } => {
                let name = class.map_or_else(|| "value".to_string(), |c| class_name(classes, c));
                match nth {
                    Some(n) => format!("loop-{name}-{n}"),
                    None => format!("loop-{name}"),
                }
            }
            Self::Call { name, args } => describe_call(name, args, classes),
            Self::Custom(expr) => expr.describe(None, false),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(values) => f.debug_tuple("Literal").field(values).finish(),
            Self::Local(name) => f.debug_tuple("Local").field(name).finish(),
            Self::EventValue { class, time } => f
                .debug_struct("EventValue")
                .field("class", class)
                .field("time", time)
                .finish(),
            Self::LoopValue { class, nth } => f
                .debug_struct("LoopValue")
                .field("class", class)
                .field("nth", nth)
                .finish(),
            Self::Call { name, args } => f
                .debug_struct("Call")
                .field("name", name)
                .field("args", args)
                .finish(),
            Self::Custom(expr) => write!(f, "Custom({expr:?})"),
        }
    }
}

pub enum Cond {
    Compare {
        left: Expr,
        relation: Relation,
        right: Expr,
    },
    IsSet(Expr),
    Not(Box<Cond>),
    Custom(Box<dyn Condition>),
}

impl Cond {
    #[must_use]
    pub const fn compare(left: Expr, relation: Relation, right: Expr) -> Self {
        Self::Compare {
            left,
            relation,
            right,
        }
    }

    #[must_use]
    pub const fn is_set(expr: Expr) -> Self {
        Self::IsSet(expr)
    }

    #[must_use]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn custom(condition: impl Condition + 'static) -> Self {
        Self::Custom(Box::new(condition))
    }

    #[must_use]
    pub fn describe(&self, classes: &ClassRegistry) -> String {
        match self {
            Self::Compare {
                left,
                relation,
                right,
            } => {
                let (left, right) = (left.describe(classes), right.describe(classes));
                match relation {
                    Relation::Equal => format!("{left} is {right}"),
                    Relation::NotEqual => format!("{left} is not {right}"),
                    relation => format!("{left} is {relation} {right}"),
                }
            }
            Self::IsSet(expr) => format!("{} is set", expr.describe(classes)),
            Self::Not(inner) => format!("not {}", inner.describe(classes)),
            Self::Custom(condition) => condition.describe(None, false),
        }
    }
}

impl fmt::Debug for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare {
                left,
                relation,
                right,
            } => f
                .debug_struct("Compare")
                .field("left", left)
                .field("relation", relation)
                .field("right", right)
                .finish(),
            Self::IsSet(expr) => f.debug_tuple("IsSet").field(expr).finish(),
            Self::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Self::Custom(condition) => write!(f, "Custom({condition:?})"),
        }
    }
}

pub(crate) fn class_name(classes: &ClassRegistry, class: ClassId) -> String {
    classes
        .get(class)
        .map_or_else(|| classes.code_name(class).to_string(), |c| c.singular().to_string())
}

/// "a number", "an event".
pub(crate) fn with_article(noun: &str) -> String {
    let vowel = noun
        .chars()
        .next()
        .is_some_and(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'));
    if vowel {
        format!("an {noun}")
    } else {
        format!("a {noun}")
    }
}
