//! Statement trees to graphs.
//!
//! Every structural rule is checked here so that walking a loaded graph
//! can't fail: `continue` outside a loop, `exit` deeper than the nesting,
//! `return` outside a function, dangling `else`, unsupported change modes,
//! calls that don't match a signature.
//!
//! Loading happens in two passes per graph. The first pass creates nodes
//! depth-first, tracking the open sections and whether a delay may have
//! happened yet. The second pass links `next` pointers once every body is
//! known, since a body's tail depends on what follows its section.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use skript_registry::{ChangeMode, ClassId, Kleenean, Registry, Time};

use crate::cond::{Compare, Condition, IsSet, Not};
use crate::effect::{CallEffect, Change, LoadEnv};
use crate::error::{LoadError, LoadWarning, ScriptLoadError};
use crate::expr::{Converted, EventValueExpr, Expression, FunctionCall, Literal, LocalVariable, LoopValue};
use crate::function::{Function, FunctionTable, Parameter, Signature};
use crate::node::{Branch, ExitScope, Graph, Node, NodeId, NodeKind};
use crate::script::{Cond, Expr, ExitLevels, FunctionDef, Item, Script, Stmt, StmtKind, TriggerDef, class_name, with_article};
use crate::trigger::Trigger;

/// A successfully loaded script, not installed yet.
pub(crate) struct Loaded {
    pub triggers: Vec<Trigger>,
    pub functions: Vec<Function>,
    pub warnings: Vec<LoadWarning>,
}

/// A section whose body is being loaded.
#[derive(Clone, Copy)]
enum Open {
    Loop { node: NodeId, class: ClassId },
    While { node: NodeId },
    Conditional { node: NodeId },
}

impl Open {
    const fn node(self) -> NodeId {
        match self {
            Self::Loop { node, .. } | Self::While { node } | Self::Conditional { node } => node,
        }
    }

    const fn is_loop(self) -> bool {
        matches!(self, Self::Loop { .. } | Self::While { .. })
    }
}

enum Link {
    Conditional,
    Repeat,
    DoIf(NodeId),
    Plain,
}

pub(crate) fn load(registry: &Registry, installed: &FunctionTable, script: Script) -> Result<Loaded, ScriptLoadError> {
    let Script { name, items } = script;
    let mut loader = Loader::new(registry, &name, installed);

    let mut triggers = Vec::new();
    let mut functions = Vec::new();
    for item in items {
        match item {
            Item::Trigger(def) => triggers.push(def),
            Item::Function(def) => {
                if let Some(signature) = loader.declare(&def) {
                    functions.push((signature, def));
                }
            }
        }
    }

    let functions: Vec<Function> = functions
        .into_iter()
        .map(|(signature, def)| loader.function(signature, def))
        .collect();
    let triggers: Vec<Trigger> = triggers
        .into_iter()
        .filter_map(|def| loader.trigger(def))
        .collect();

    let errors = std::mem::take(&mut loader.errors);
    let warnings = std::mem::take(&mut loader.warnings);
    drop(loader);
    if errors.is_empty() {
        Ok(Loaded {
            triggers,
            functions,
            warnings,
        })
    } else {
        Err(ScriptLoadError {
            script: name,
            errors,
        })
    }
}

struct Loader<'a> {
    registry: &'a Registry,
    script: &'a str,
    signatures: FxHashMap<String, Arc<Signature>>,
    errors: Vec<LoadError>,
    warnings: Vec<LoadWarning>,

    graph: Graph,
    root: Option<NodeId>,
    event: ClassId,
    function: Option<Arc<Signature>>,
    sections: Vec<Open>,
    delayed: Kleenean,
    bodies: FxHashMap<NodeId, Vec<NodeId>>,
}

impl<'a> Loader<'a> {
    fn new(registry: &'a Registry, script: &'a str, installed: &FunctionTable) -> Self {
        Self {
            registry,
            script,
            // A script being reinstalled replaces its own functions.
            signatures: installed
                .signatures()
                .filter(|s| s.script != script)
                .map(|s| (s.name.clone(), s.clone()))
                .collect(),
            errors: Vec::new(),
            warnings: Vec::new(),
            graph: Graph::default(),
            root: None,
            event: ClassId::EVENT,
            function: None,
            sections: Vec::new(),
            delayed: Kleenean::False,
            bodies: FxHashMap::default(),
        }
    }

    fn error(&mut self, message: impl Into<String>, line: Option<usize>, statement: &str) {
        self.errors.push(LoadError::new(message, line, statement));
    }

    fn warn(&mut self, message: impl Into<String>, line: Option<usize>) {
        self.warnings.push(LoadWarning {
            message: message.into(),
            line,
        });
    }

    fn env(&self) -> LoadEnv<'a> {
        LoadEnv {
            registry: self.registry,
            event: self.event,
            delayed: self.delayed,
            in_function: self.function.is_some(),
        }
    }

    /// Register a function's signature so bodies loaded later can call it.
    fn declare(&mut self, def: &FunctionDef) -> Option<Arc<Signature>> {
        let classes = self.registry.classes();
        let statement = format!("function {}", def.name);

        if self.signatures.contains_key(&def.name) {
            self.error(
                format!("A function named '{}' already exists", def.name),
                None,
                &statement,
            );
            return None;
        }
        for (i, param) in def.params.iter().enumerate() {
            if def.params[..i]
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case(&param.name))
            {
                self.error(
                    format!(
                        "Each argument's name must be unique, but the name '{}' occurs at least twice.",
                        param.name
                    ),
                    None,
                    &statement,
                );
                return None;
            }
        }
        let unknown = def
            .params
            .iter()
            .map(|p| p.class)
            .chain(def.returns.map(|(class, _)| class))
            .any(|class| !classes.contains(class));
        if unknown {
            self.error(
                format!("The signature of '{}' uses an unknown type", def.name),
                None,
                &statement,
            );
            return None;
        }

        let signature = Arc::new(Signature {
            name: def.name.clone(),
            script: self.script.to_string(),
            parameters: def
                .params
                .iter()
                .map(|p| Parameter {
                    name: p.name.clone(),
                    class: p.class,
                    single: p.single,
                    has_default: p.default.is_some(),
                })
                .collect(),
            return_type: def.returns.map(|(class, _)| class),
            single_return: def.returns.is_none_or(|(_, single)| single),
        });
        self.signatures
            .insert(signature.name.clone(), signature.clone());
        Some(signature)
    }

    fn function(&mut self, signature: Arc<Signature>, def: FunctionDef) -> Function {
        let registry = self.registry;
        let root = self.begin(ClassId::FUNCTION_EVENT, Some(signature.clone()));
        let statement = format!("function {}", def.name);

        let mut defaults = Vec::with_capacity(def.params.len());
        for (param, declared) in def.params.into_iter().zip(&signature.parameters) {
            let default = param.default.and_then(|expr| {
                let expr = self.expr(expr, None, &statement)?;
                let rt = expr.return_type();
                if rt != ClassId::OBJECT && !registry.converters().converter_exists(rt, declared.class) {
                    self.error(
                        format!(
                            "The default value of '{}' is not {}",
                            declared.name,
                            with_article(&class_name(registry.classes(), declared.class))
                        ),
                        None,
                        &statement,
                    );
                    return None;
                }
                Some(expr)
            });
            defaults.push(default);
        }

        self.body(root, def.body);
        Function::new(signature, defaults, self.finish(), root)
    }

    fn trigger(&mut self, def: TriggerDef) -> Option<Trigger> {
        if !self.registry.classes().is_event(def.event) {
            let event = self.registry.classes().code_name(def.event).to_string();
            self.error(format!("'{event}' is not an event"), None, &def.name);
            return None;
        }
        let root = self.begin(def.event, None);
        self.body(root, def.body);
        Some(Trigger::new(def.name, self.script, def.event, self.finish(), root))
    }

    fn begin(&mut self, event: ClassId, function: Option<Arc<Signature>>) -> NodeId {
        self.graph = Graph::default();
        self.event = event;
        self.function = function;
        self.sections.clear();
        self.delayed = Kleenean::False;
        self.bodies.clear();
        let root = self.graph.push(Node {
            parent: None,
            next: None,
            kind: NodeKind::Trigger { first: None },
            delayed: Kleenean::False,
            line: None,
        });
        self.root = Some(root);
        root
    }

    fn body(&mut self, root: NodeId, stmts: Vec<Stmt>) {
        let chain = self.chain(stmts);
        self.set_first(root, chain.first().copied());
        self.link(&chain, None);
    }

    fn finish(&mut self) -> Graph {
        self.root = None;
        std::mem::take(&mut self.graph)
    }

    fn push(&mut self, kind: NodeKind, line: Option<usize>) -> NodeId {
        let parent = self.sections.last().map(|o| o.node()).or(self.root);
        self.graph.push(Node {
            parent,
            next: None,
            kind,
            delayed: self.delayed,
            line,
        })
    }

    fn set_first(&mut self, section: NodeId, node: Option<NodeId>) {
        match &mut self.graph.node_mut(section).kind {
            NodeKind::Trigger { first }
            | NodeKind::Conditional { first, .. }
            | NodeKind::Loop { first, .. }
            | NodeKind::While { first, .. } => *first = node,
            _ => {}
        }
    }

    fn section(&mut self, open: Open, body: Vec<Stmt>) {
        self.sections.push(open);
        let chain = self.chain(body);
        self.sections.pop();
        self.set_first(open.node(), chain.first().copied());
        self.bodies.insert(open.node(), chain);
    }

    /// A body that may run zero times leaves the delay state unknown.
    fn merge_optional(&mut self, had: Kleenean) {
        if !had.is_true() && !self.delayed.is_false() {
            self.delayed = Kleenean::Unknown;
        }
    }

    fn chain(&mut self, stmts: Vec<Stmt>) -> Vec<NodeId> {
        let mut chain = Vec::with_capacity(stmts.len());
        // Delay state after each branch of the if/else-if chain being built.
        let mut open_if: Option<Vec<Kleenean>> = None;

        for stmt in stmts {
            let line = stmt.line;
            let text = stmt.describe(self.registry.classes());
            let id = match stmt.kind {
                StmtKind::If { condition, body } => {
                    self.conditional(Branch::If, Some(condition), body, &mut open_if, line, &text)
                }
                StmtKind::ElseIf { condition, body } => {
                    if open_if.is_some() {
                        self.conditional(Branch::ElseIf, Some(condition), body, &mut open_if, line, &text)
                    } else {
                        self.error(
                            "'else if' has to be placed just after another 'if' or 'else if' section",
                            line,
                            &text,
                        );
                        None
                    }
                }
                StmtKind::Else { body } => {
                    if open_if.is_some() {
                        self.conditional(Branch::Else, None, body, &mut open_if, line, &text)
                    } else {
                        self.error(
                            "'else' has to be placed just after another 'if' or 'else if' section",
                            line,
                            &text,
                        );
                        None
                    }
                }
                kind => {
                    open_if = None;
                    self.statement(kind, line, &text)
                }
            };
            chain.extend(id);
        }
        chain
    }

    fn conditional(
        &mut self,
        branch: Branch,
        condition: Option<Cond>,
        body: Vec<Stmt>,
        open_if: &mut Option<Vec<Kleenean>>,
        line: Option<usize>,
        text: &str,
    ) -> Option<NodeId> {
        let condition = match condition.map(|c| self.cond(c, line, text)) {
            Some(None) => {
                if branch == Branch::If {
                    *open_if = Some(Vec::new());
                }
                return None;
            }
            Some(Some(c)) => Some(c),
            None => None,
        };

        let id = self.push(
            NodeKind::Conditional {
                branch,
                condition,
                first: None,
                skipped_next: None,
            },
            line,
        );
        let had = self.delayed;
        self.section(Open::Conditional { node: id }, body);
        let after = self.delayed;

        if !had.is_true() && had != after {
            let all_delayed = open_if
                .as_ref()
                .is_some_and(|branches| branches.iter().all(|k| k.is_true()));
            self.delayed = if branch == Branch::Else && after.is_true() && all_delayed {
                Kleenean::True
            } else {
                Kleenean::Unknown
            };
        }

        match branch {
            Branch::If => *open_if = Some(vec![after]),
            Branch::ElseIf => {
                if let Some(branches) = open_if {
                    branches.push(after);
                }
            }
            Branch::Else => *open_if = None,
        }
        Some(id)
    }

    fn statement(&mut self, kind: StmtKind, line: Option<usize>, text: &str) -> Option<NodeId> {
        match kind {
            StmtKind::Effect(mut effect) => {
                let env = self.env();
                if let Err(message) = effect.init(&env) {
                    self.error(message, line, text);
                    return None;
                }
                Some(self.push(NodeKind::Effect(effect), line))
            }
            StmtKind::Change {
                target,
                mode,
                delta,
            } => self.change(target, mode, delta, line, text),
            StmtKind::Call { name, args } => {
                let call = self.call(name, args, false, line, text)?;
                Some(self.push(NodeKind::Effect(Box::new(CallEffect::new(call))), line))
            }
            StmtKind::Async(effect) => {
                if self.function.is_some() {
                    self.error("Async effects can't be used within functions", line, text);
                    return None;
                }
                let id = self.push(NodeKind::Async(effect), line);
                self.delayed = Kleenean::True;
                Some(id)
            }
            StmtKind::Condition(condition) => {
                let condition = self.cond(condition, line, text)?;
                Some(self.push(NodeKind::Guard(condition), line))
            }
            StmtKind::DoIf { condition, effect } => self.do_if(condition, *effect, line, text),
            StmtKind::Loop { expr, body } => {
                let expr = self.expr(expr, line, text)?;
                if expr.is_single() {
                    self.error(
                        format!(
                            "Can't loop {} because it's only a single value",
                            expr.describe(None, false)
                        ),
                        line,
                        text,
                    );
                    return None;
                }
                let class = expr.return_type();
                let id = self.push(NodeKind::Loop { expr, first: None }, line);
                let had = self.delayed;
                self.section(Open::Loop { node: id, class }, body);
                self.merge_optional(had);
                Some(id)
            }
            StmtKind::While {
                condition,
                do_while,
                body,
            } => {
                let condition = self.cond(condition, line, text)?;
                let id = self.push(
                    NodeKind::While {
                        condition,
                        do_while,
                        first: None,
                    },
                    line,
                );
                let had = self.delayed;
                self.section(Open::While { node: id }, body);
                self.merge_optional(had);
                Some(id)
            }
            StmtKind::Delay(duration) => self.delay(duration, false, line, text),
            StmtKind::WaitFor(duration) => self.delay(duration, true, line, text),
            StmtKind::Exit { scope, levels } => self.exit(scope, levels, line, text),
            StmtKind::Continue => {
                let Some(target) = self
                    .sections
                    .iter()
                    .rev()
                    .find(|o| o.is_loop())
                    .map(|o| o.node())
                else {
                    self.error("Continue may only be used in while or loop sections", line, text);
                    return None;
                };
                Some(self.push(NodeKind::Continue { target }, line))
            }
            StmtKind::Return(value) => self.return_(value, line, text),
            StmtKind::If { .. } | StmtKind::ElseIf { .. } | StmtKind::Else { .. } => {
                self.error("A conditional section can't be used here", line, text);
                None
            }
        }
    }

    fn do_if(&mut self, condition: Cond, inner: Stmt, line: Option<usize>, text: &str) -> Option<NodeId> {
        match &inner.kind {
            StmtKind::DoIf { .. } => {
                self.error("Do if effects may not be nested", line, text);
                return None;
            }
            StmtKind::If { .. }
            | StmtKind::ElseIf { .. }
            | StmtKind::Else { .. }
            | StmtKind::Loop { .. }
            | StmtKind::While { .. }
            | StmtKind::Condition(_) => {
                self.error("Only effects can be followed by 'if'", line, text);
                return None;
            }
            _ => {}
        }

        let condition = self.cond(condition, line, text)?;
        let had = self.delayed;
        let effect = self.statement(inner.kind, inner.line.or(line), text)?;
        if !had.is_true() && self.delayed != had {
            self.delayed = Kleenean::Unknown;
        }
        let id = self.push(NodeKind::DoIf { condition, effect }, line);
        self.graph.node_mut(id).delayed = had;
        Some(id)
    }

    fn change(
        &mut self,
        target: Expr,
        mode: ChangeMode,
        delta: Option<Expr>,
        line: Option<usize>,
        text: &str,
    ) -> Option<NodeId> {
        let registry = self.registry;
        let target = self.expr(target, line, text)?;
        let delta = match delta {
            Some(delta) => Some(self.expr(delta, line, text)?),
            None => None,
        };
        let shown = target.describe(None, false);

        let Some(accepted) = target.accept_change(mode, registry) else {
            let message = match mode {
                ChangeMode::Set => format!("{shown} can't be set to anything"),
                ChangeMode::Add => format!("{shown} can't have anything added to it"),
                ChangeMode::Remove | ChangeMode::RemoveAll => {
                    format!("Nothing can be removed from {shown}")
                }
                ChangeMode::Delete => format!("{shown} can't be deleted"),
                ChangeMode::Reset => format!("{shown} can't be reset"),
            };
            self.error(message, line, text);
            return None;
        };

        match (&delta, mode.takes_delta()) {
            (None, true) => {
                self.error(format!("'{mode}' needs a value"), line, text);
                return None;
            }
            (Some(_), false) => {
                self.error(format!("'{mode}' doesn't take a value"), line, text);
                return None;
            }
            _ => {}
        }

        if let Some(delta) = &delta {
            let rt = delta.return_type();
            if rt != ClassId::OBJECT
                && !accepted.is_empty()
                && !registry.converters().converter_exists_any(rt, &accepted)
            {
                self.error(
                    format!("{} can't be used to {mode} {shown}", delta.describe(None, false)),
                    line,
                    text,
                );
                return None;
            }
            if mode == ChangeMode::Set && target.is_single() && !delta.is_single() {
                self.error(
                    format!("{shown} can only be set to one value, not more"),
                    line,
                    text,
                );
                return None;
            }
        }

        let effect = Change::new(target, mode, delta, accepted);
        Some(self.push(NodeKind::Effect(Box::new(effect)), line))
    }

    fn delay(&mut self, duration: Expr, indeterminate: bool, line: Option<usize>, text: &str) -> Option<NodeId> {
        let registry = self.registry;
        if self.function.is_some() {
            self.error("Delays can't be used within functions", line, text);
            return None;
        }
        let duration = self.expr(duration, line, text)?;
        let rt = duration.return_type();

        if let Some(values) = duration.constant() {
            let spans = registry.converters().convert_array(&values, ClassId::TIMESPAN);
            if spans
                .iter()
                .filter_map(|v| v.as_timespan())
                .any(|span| span.ticks() == 0)
            {
                self.warn(
                    "Delays less than one tick are not possible, defaulting to one tick.",
                    line,
                );
            }
        }

        let duration: Box<dyn Expression> = if rt == ClassId::TIMESPAN {
            duration
        } else if rt == ClassId::OBJECT || registry.converters().converter_exists(rt, ClassId::TIMESPAN) {
            Box::new(Converted::new(duration, ClassId::TIMESPAN))
        } else {
            self.error(
                format!("{} is not a time span", duration.describe(None, false)),
                line,
                text,
            );
            return None;
        };

        let id = self.push(
            NodeKind::Delay {
                duration,
                indeterminate,
            },
            line,
        );
        self.delayed = Kleenean::True;
        Some(id)
    }

    fn exit(&mut self, scope: ExitScope, levels: ExitLevels, line: Option<usize>, text: &str) -> Option<NodeId> {
        let noun = scope.noun();
        let available = self
            .sections
            .iter()
            .filter(|o| match scope {
                ExitScope::Everything => true,
                ExitScope::Loops => o.is_loop(),
                ExitScope::Conditionals => matches!(o, Open::Conditional { .. }),
            })
            .count();

        let (levels, scope) = match levels {
            ExitLevels::Trigger => (self.sections.len() + 1, ExitScope::Everything),
            _ if available == 0 => {
                self.error(
                    format!("can't stop any {noun} as there are no {noun} present"),
                    line,
                    text,
                );
                return None;
            }
            ExitLevels::All => (available, scope),
            ExitLevels::Count(0) => {
                self.error(format!("can't stop 0 {noun}"), line, text);
                return None;
            }
            ExitLevels::Count(n) if n > available => {
                self.error(
                    format!("can't stop {n} {noun} as there are only {available} {noun} present"),
                    line,
                    text,
                );
                return None;
            }
            ExitLevels::Count(n) => (n, scope),
        };
        Some(self.push(NodeKind::Exit { levels, scope }, line))
    }

    fn return_(&mut self, value: Expr, line: Option<usize>, text: &str) -> Option<NodeId> {
        let registry = self.registry;
        let Some(signature) = self.function.clone() else {
            self.error("The return statement can only be used in a function", line, text);
            return None;
        };
        if !self.delayed.is_false() {
            self.error(
                "A return statement after a delay is useless, as the calling trigger will resume when the delay starts (and won't get any returned value)",
                line,
                text,
            );
            return None;
        }
        let Some(class) = signature.return_type else {
            self.error(
                "This function doesn't return any value. Please use 'stop' or 'exit' if you want to stop the function.",
                line,
                text,
            );
            return None;
        };

        let value = self.expr(value, line, text)?;
        let name = class_name(registry.classes(), class);
        let rt = value.return_type();
        if rt != ClassId::OBJECT && !registry.converters().converter_exists(rt, class) {
            self.error(
                format!(
                    "This function is declared to return {}, but {} is not of that type.",
                    with_article(&name),
                    value.describe(None, false)
                ),
                line,
                text,
            );
            return None;
        }
        if signature.single_return && !value.is_single() {
            self.error(
                format!(
                    "This function is defined to only return a single {name}, but this return statement can return multiple values."
                ),
                line,
                text,
            );
            return None;
        }

        let value: Box<dyn Expression> = if registry.classes().is_assignable(class, rt) {
            value
        } else {
            Box::new(Converted::new(value, class))
        };
        Some(self.push(NodeKind::Return { value }, line))
    }

    fn expr(&mut self, expr: Expr, line: Option<usize>, text: &str) -> Option<Box<dyn Expression>> {
        match expr {
            Expr::Literal(values) => Some(Box::new(Literal::new(values))),
            Expr::Local(name) => Some(Box::new(LocalVariable::new(name))),
            Expr::EventValue { class, time } => self.event_value(class, time, line, text),
            Expr::LoopValue { class, nth } => self.loop_value(class, nth, line, text),
            Expr::Call { name, args } => {
                let call = self.call(name, args, true, line, text)?;
                Some(Box::new(call))
            }
            Expr::Custom(expr) => Some(expr),
        }
    }

    fn event_value(&mut self, class: ClassId, time: Time, line: Option<usize>, text: &str) -> Option<Box<dyn Expression>> {
        let registry = self.registry;
        let value_name = class_name(registry.classes(), class);
        let event_name = class_name(registry.classes(), self.event);

        match registry.event_value_getter(self.event, class, time) {
            Ok(Some(getter)) => {
                if time != Time::Now
                    && !registry
                        .event_values()
                        .does_event_value_have_time_states(self.event, class)
                {
                    self.warn(
                        format!("{event_name} events have no {time} state of {value_name}, the current one is used instead"),
                        line,
                    );
                }
                Some(Box::new(EventValueExpr::new(class, value_name, time, getter)))
            }
            Ok(None) => {
                self.error(
                    format!("There's no {value_name} in {} event", with_article(&event_name)),
                    line,
                    text,
                );
                None
            }
            Err(err) => {
                self.error(err.to_string(), line, text);
                None
            }
        }
    }

    fn loop_value(
        &mut self,
        class: Option<ClassId>,
        nth: Option<usize>,
        line: Option<usize>,
        text: &str,
    ) -> Option<Box<dyn Expression>> {
        let classes = self.registry.classes();
        let name = class.map_or_else(|| "value".to_string(), |c| class_name(classes, c));

        // Outermost first.
        let candidates: Vec<(NodeId, ClassId)> = self
            .sections
            .iter()
            .filter_map(|o| match *o {
                Open::Loop { node, class } => Some((node, class)),
                _ => None,
            })
            .filter(|(_, looped)| {
                class.is_none_or(|c| classes.is_assignable(c, *looped) || classes.is_assignable(*looped, c))
            })
            .collect();

        let chosen = match nth {
            Some(n) => n.checked_sub(1).and_then(|i| candidates.get(i)).copied(),
            None if class.is_some() && candidates.len() > 1 => {
                self.error(
                    format!(
                        "There are multiple loops that match loop-{name}. Use loop-{name}-1/2/3/etc. to specify which loop's value you want."
                    ),
                    line,
                    text,
                );
                return None;
            }
            None => candidates.last().copied(),
        };
        let Some((node, looped)) = chosen else {
            self.error(format!("There's no loop that matches 'loop-{name}'"), line, text);
            return None;
        };

        let expr: Box<dyn Expression> = Box::new(LoopValue::new(node, looped, name));
        match class {
            Some(c) if !classes.is_assignable(c, looped) => Some(Box::new(Converted::new(expr, c))),
            _ => Some(expr),
        }
    }

    fn call(
        &mut self,
        name: String,
        args: Vec<Expr>,
        as_expression: bool,
        line: Option<usize>,
        text: &str,
    ) -> Option<FunctionCall> {
        let registry = self.registry;
        let Some(signature) = self.signatures.get(&name).cloned() else {
            self.error(format!("The function '{name}' does not exist."), line, text);
            return None;
        };
        if as_expression && signature.return_type.is_none() {
            self.error(format!("The function '{name}' doesn't return any value."), line, text);
            return None;
        }

        let given = args.len();
        let max = signature.parameters.len();
        let required = signature.required_parameters();
        if given > max {
            self.error(
                format!("The function '{name}' has only {max} argument(s), but {given} are given"),
                line,
                text,
            );
            return None;
        }
        if given < required {
            self.error(
                format!("The function '{name}' requires at least {required} argument(s), but only {given} are given"),
                line,
                text,
            );
            return None;
        }

        let mut loaded = Vec::with_capacity(given);
        for (i, (arg, param)) in args.into_iter().zip(&signature.parameters).enumerate() {
            let arg = self.expr(arg, line, text)?;
            let rt = arg.return_type();
            let param_name = class_name(registry.classes(), param.class);
            if rt != ClassId::OBJECT && !registry.converters().converter_exists(rt, param.class) {
                self.error(
                    format!(
                        "Argument {} given to the function '{name}' is not of the required type {param_name}",
                        i + 1
                    ),
                    line,
                    text,
                );
                return None;
            }
            if param.single && !arg.is_single() {
                self.error(
                    format!(
                        "Argument {} given to the function '{name}' must be a single {param_name}",
                        i + 1
                    ),
                    line,
                    text,
                );
                return None;
            }
            loaded.push(arg);
        }

        let (return_type, single) = signature
            .return_type
            .map_or((ClassId::OBJECT, true), |c| (c, signature.single_return));
        Some(FunctionCall::new(name, loaded, return_type, single))
    }

    fn cond(&mut self, cond: Cond, line: Option<usize>, text: &str) -> Option<Box<dyn Condition>> {
        match cond {
            Cond::Compare {
                left,
                relation,
                right,
            } => {
                let left = self.expr(left, line, text)?;
                let right = self.expr(right, line, text)?;
                if relation.is_ordering() {
                    let (l, r) = (left.return_type(), right.return_type());
                    let ordered = l == ClassId::OBJECT
                        || r == ClassId::OBJECT
                        || self
                            .registry
                            .comparators()
                            .get_comparator(l, r)
                            .is_some_and(|c| c.supports_ordering());
                    if !ordered {
                        self.error(
                            format!(
                                "Can't test {} for being '{relation}' {}",
                                left.describe(None, false),
                                right.describe(None, false)
                            ),
                            line,
                            text,
                        );
                        return None;
                    }
                }
                Some(Box::new(Compare::new(left, relation, right)))
            }
            Cond::IsSet(expr) => Some(Box::new(IsSet::new(self.expr(expr, line, text)?))),
            Cond::Not(inner) => Some(Box::new(Not::new(self.cond(*inner, line, text)?))),
            Cond::Custom(condition) => Some(condition),
        }
    }

    fn is_else(&self, id: NodeId) -> bool {
        matches!(
            self.graph.node(id).kind,
            NodeKind::Conditional {
                branch: Branch::ElseIf | Branch::Else,
                ..
            }
        )
    }

    /// Point every node of `chain` at its successor, the last one at `tail`.
    fn link(&mut self, chain: &[NodeId], tail: Option<NodeId>) {
        for (i, &id) in chain.iter().enumerate() {
            let next = chain.get(i + 1).copied().or(tail);
            self.graph.node_mut(id).next = next;

            let link = match &self.graph.node(id).kind {
                NodeKind::Conditional { .. } => Link::Conditional,
                NodeKind::Loop { .. } | NodeKind::While { .. } => Link::Repeat,
                NodeKind::DoIf { effect, .. } => Link::DoIf(*effect),
                _ => Link::Plain,
            };
            match link {
                Link::Conditional => {
                    let skipped = chain[i + 1..]
                        .iter()
                        .copied()
                        .find(|n| !self.is_else(*n))
                        .or(tail);
                    if let NodeKind::Conditional { skipped_next, .. } = &mut self.graph.node_mut(id).kind {
                        *skipped_next = skipped;
                    }
                    let body = self.bodies.remove(&id).unwrap_or_default();
                    self.link(&body, skipped);
                }
                Link::Repeat => {
                    let body = self.bodies.remove(&id).unwrap_or_default();
                    self.link(&body, Some(id));
                }
                Link::DoIf(effect) => self.graph.node_mut(effect).next = next,
                Link::Plain => {}
            }
        }
    }
}
