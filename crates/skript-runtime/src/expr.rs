//! Expressions: things that evaluate to values in a context.

use std::fmt;

use skript_registry::{ChangeMode, ClassId, Getter, Registry, Time, Value};

use crate::context::Context;
use crate::function;
use crate::node::NodeId;

/// A value-producing part of a statement.
pub trait Expression: Send + Sync {
    /// All values; empty when there are none.
    fn get(&self, ctx: &Context) -> Vec<Value>;

    fn get_single(&self, ctx: &Context) -> Option<Value> {
        self.get(ctx).into_iter().next()
    }

    /// Whether this can only ever produce at most one value.
    fn is_single(&self) -> bool;

    fn return_type(&self) -> ClassId;

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String;

    /// The values, when they are known without a context.
    fn constant(&self) -> Option<Vec<Value>> {
        None
    }

    /// Delta classes accepted by `mode`, or `None` if unsupported.
    fn accept_change(&self, mode: ChangeMode, registry: &Registry) -> Option<Vec<ClassId>> {
        registry.classes().accepts_change(self.return_type(), mode)
    }

    fn change(&self, ctx: &mut Context, delta: Option<&[Value]>, mode: ChangeMode) {
        let targets = self.get(ctx);
        if let Some(changer) = ctx.registry().classes().changer_for(self.return_type()) {
            changer.change(&targets, delta, mode);
        }
    }
}

impl fmt::Debug for dyn Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(None, true))
    }
}

/// "a", "a and b", "a, b and c".
pub(crate) fn join_and(parts: &[String]) -> String {
    match parts {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// Constant values.
pub struct Literal {
    values: Vec<Value>,
    class: ClassId,
}

impl Literal {
    #[must_use]
    pub fn new(values: Vec<Value>) -> Self {
        let class = match values.first() {
            Some(first) if values.iter().all(|v| v.class() == first.class()) => first.class(),
            _ => ClassId::OBJECT,
        };
        Self { values, class }
    }

    #[must_use]
    pub fn single(value: impl Into<Value>) -> Self {
        Self::new(vec![value.into()])
    }
}

impl Expression for Literal {
    fn get(&self, _ctx: &Context) -> Vec<Value> {
        self.values.clone()
    }

    fn is_single(&self) -> bool {
        self.values.len() <= 1
    }

    fn return_type(&self) -> ClassId {
        self.class
    }

    fn describe(&self, ctx: Option<&Context>, _debug: bool) -> String {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|v| match v {
                Value::Text(s) => format!("\"{s}\""),
                other => ctx.map_or_else(|| other.as_text(), |c| c.registry().to_string(other)),
            })
            .collect();
        join_and(&parts)
    }

    fn constant(&self) -> Option<Vec<Value>> {
        Some(self.values.clone())
    }

    fn accept_change(&self, _mode: ChangeMode, _registry: &Registry) -> Option<Vec<ClassId>> {
        None
    }
}

/// `{_name}` or `{_name::*}`.
pub struct LocalVariable {
    name: String,
}

impl LocalVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    #[must_use]
    pub fn is_list(&self) -> bool {
        self.name.ends_with("::*")
    }
}

impl Expression for LocalVariable {
    fn get(&self, ctx: &Context) -> Vec<Value> {
        ctx.locals().get(&self.name)
    }

    fn is_single(&self) -> bool {
        !self.is_list()
    }

    fn return_type(&self) -> ClassId {
        ClassId::OBJECT
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String {
        match ctx {
            Some(ctx) if debug => {
                let values: Vec<String> = self
                    .get(ctx)
                    .iter()
                    .map(|v| ctx.registry().to_string(v))
                    .collect();
                format!("{{_{}}} (= {})", self.name, join_and(&values))
            }
            _ => format!("{{_{}}}", self.name),
        }
    }

    fn accept_change(&self, mode: ChangeMode, _registry: &Registry) -> Option<Vec<ClassId>> {
        if mode.takes_delta() {
            Some(vec![ClassId::OBJECT])
        } else {
            Some(Vec::new())
        }
    }

    fn change(&self, ctx: &mut Context, delta: Option<&[Value]>, mode: ChangeMode) {
        let delta = delta.unwrap_or_default();
        let locals = ctx.locals_mut();
        match mode {
            ChangeMode::Set => locals.set(&self.name, delta),
            ChangeMode::Add => locals.add(&self.name, delta),
            ChangeMode::Remove => locals.remove(&self.name, delta),
            ChangeMode::RemoveAll => locals.remove_all(&self.name, delta),
            ChangeMode::Delete | ChangeMode::Reset => locals.delete(&self.name),
        }
    }
}

/// `event-<class>`, resolved against the trigger's event class at load time.
pub struct EventValueExpr {
    class: ClassId,
    name: String,
    time: Time,
    getter: Getter,
}

impl EventValueExpr {
    pub(crate) fn new(class: ClassId, name: impl Into<String>, time: Time, getter: Getter) -> Self {
        Self {
            class,
            name: name.into(),
            time,
            getter,
        }
    }
}

impl Expression for EventValueExpr {
    fn get(&self, ctx: &Context) -> Vec<Value> {
        (self.getter)(ctx.event()).into_iter().collect()
    }

    fn is_single(&self) -> bool {
        true
    }

    fn return_type(&self) -> ClassId {
        self.class
    }

    fn describe(&self, _ctx: Option<&Context>, _debug: bool) -> String {
        match self.time {
            Time::Now => format!("event-{}", self.name),
            time => format!("{time} event-{}", self.name),
        }
    }
}

/// `loop-<class>`: the current value of one loop section.
pub struct LoopValue {
    section: NodeId,
    class: ClassId,
    name: String,
}

impl LoopValue {
    pub(crate) fn new(section: NodeId, class: ClassId, name: impl Into<String>) -> Self {
        Self {
            section,
            class,
            name: name.into(),
        }
    }
}

impl Expression for LoopValue {
    fn get(&self, ctx: &Context) -> Vec<Value> {
        ctx.loop_value(self.section).cloned().into_iter().collect()
    }

    fn is_single(&self) -> bool {
        true
    }

    fn return_type(&self) -> ClassId {
        self.class
    }

    fn describe(&self, _ctx: Option<&Context>, _debug: bool) -> String {
        format!("loop-{}", self.name)
    }
}

/// `name(args...)`. Looked up by name on every call so functions can be
/// replaced by reinstalling a script.
pub struct FunctionCall {
    name: String,
    args: Vec<Box<dyn Expression>>,
    return_type: ClassId,
    single: bool,
}

impl FunctionCall {
    pub(crate) fn new(
        name: impl Into<String>,
        args: Vec<Box<dyn Expression>>,
        return_type: ClassId,
        single: bool,
    ) -> Self {
        Self {
            name: name.into(),
            args,
            return_type,
            single,
        }
    }
}

impl Expression for FunctionCall {
    fn get(&self, ctx: &Context) -> Vec<Value> {
        let args: Vec<Vec<Value>> = self.args.iter().map(|a| a.get(ctx)).collect();
        function::call(ctx.shared(), &self.name, &args, ctx.call_depth() + 1).unwrap_or_default()
    }

    fn is_single(&self) -> bool {
        self.single
    }

    fn return_type(&self) -> ClassId {
        self.return_type
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String {
        let args: Vec<String> = self.args.iter().map(|a| a.describe(ctx, debug)).collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

/// Another expression's values converted to `to`; values that don't
/// convert are dropped.
pub struct Converted {
    inner: Box<dyn Expression>,
    to: ClassId,
}

impl Converted {
    pub(crate) fn new(inner: Box<dyn Expression>, to: ClassId) -> Self {
        Self { inner, to }
    }
}

impl Expression for Converted {
    fn get(&self, ctx: &Context) -> Vec<Value> {
        let values = self.inner.get(ctx);
        ctx.registry().converters().convert_array(&values, self.to)
    }

    fn is_single(&self) -> bool {
        self.inner.is_single()
    }

    fn return_type(&self) -> ClassId {
        self.to
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String {
        self.inner.describe(ctx, debug)
    }
}

type ValuesFn = Box<dyn Fn(&Context) -> Vec<Value> + Send + Sync>;

/// A host expression backed by a closure.
pub struct FnExpression {
    name: String,
    return_type: ClassId,
    single: bool,
    f: ValuesFn,
}

impl FnExpression {
    pub fn new(
        name: impl Into<String>,
        return_type: ClassId,
        single: bool,
        f: impl Fn(&Context) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            return_type,
            single,
            f: Box::new(f),
        }
    }
}

impl Expression for FnExpression {
    fn get(&self, ctx: &Context) -> Vec<Value> {
        (self.f)(ctx)
    }

    fn is_single(&self) -> bool {
        self.single
    }

    fn return_type(&self) -> ClassId {
        self.return_type
    }

    fn describe(&self, _ctx: Option<&Context>, _debug: bool) -> String {
        self.name.clone()
    }
}
