//! Effects: statements that do something.

use std::fmt;

use skript_registry::{ChangeMode, ClassId, Kleenean, Registry};

use crate::context::Context;
use crate::expr::{Expression, FunctionCall};

/// What the walker does after an effect ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// End this execution here.
    Stop,
}

/// What an effect may look at while its statement is being loaded.
#[derive(Clone, Copy)]
pub struct LoadEnv<'a> {
    pub registry: &'a Registry,
    /// Event class of the trigger being loaded.
    pub event: ClassId,
    /// Whether a delay may have run before this statement.
    pub delayed: Kleenean,
    pub in_function: bool,
}

impl fmt::Debug for LoadEnv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadEnv")
            .field("event", &self.event)
            .field("delayed", &self.delayed)
            .field("in_function", &self.in_function)
            .finish_non_exhaustive()
    }
}

pub trait Effect: Send + Sync {
    fn execute(&self, ctx: &mut Context);

    /// Run and decide whether to go on. Most effects only `execute`.
    fn walk(&self, ctx: &mut Context) -> Flow {
        self.execute(ctx);
        Flow::Continue
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String;

    /// Validate against the surrounding statement. `Err` becomes a load
    /// error for this statement.
    fn init(&mut self, _env: &LoadEnv<'_>) -> Result<(), String> {
        Ok(())
    }
}

impl fmt::Debug for dyn Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(None, true))
    }
}

/// Applied to the context on the tick thread once background work is done.
pub type Completion = Box<dyn FnOnce(&mut Context) + Send>;

/// Background work. Runs on the async pool and must not touch the context.
pub type AsyncJob = Box<dyn FnOnce() -> Completion + Send>;

/// An effect that suspends the trigger while work runs off the tick thread.
pub trait AsyncEffect: Send + Sync {
    /// Capture what the job needs from the context and hand it off.
    fn begin(&self, ctx: &Context) -> AsyncJob;

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String;
}

impl fmt::Debug for dyn AsyncEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(None, true))
    }
}

/// `set`/`add`/`remove`/`remove all`/`delete`/`reset`.
pub struct Change {
    target: Box<dyn Expression>,
    mode: ChangeMode,
    delta: Option<Box<dyn Expression>>,
    /// Classes the target accepts for `mode`, resolved at load time.
    accepted: Vec<ClassId>,
}

impl Change {
    pub(crate) fn new(
        target: Box<dyn Expression>,
        mode: ChangeMode,
        delta: Option<Box<dyn Expression>>,
        accepted: Vec<ClassId>,
    ) -> Self {
        Self {
            target,
            mode,
            delta,
            accepted,
        }
    }
}

impl Effect for Change {
    fn execute(&self, ctx: &mut Context) {
        let delta = self.delta.as_ref().map(|delta| {
            let values = delta.get(ctx);
            ctx.registry()
                .converters()
                .convert_array_any(&values, &self.accepted)
        });
        if let Some(values) = &delta {
            // Nothing to add or remove.
            if values.is_empty() && self.mode != ChangeMode::Set {
                return;
            }
        }
        self.target.change(ctx, delta.as_deref(), self.mode);
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String {
        let target = self.target.describe(ctx, debug);
        let delta = self
            .delta
            .as_ref()
            .map(|d| d.describe(ctx, debug))
            .unwrap_or_default();
        match self.mode {
            ChangeMode::Set => format!("set {target} to {delta}"),
            ChangeMode::Add => format!("add {delta} to {target}"),
            ChangeMode::Remove => format!("remove {delta} from {target}"),
            ChangeMode::RemoveAll => format!("remove all {delta} from {target}"),
            ChangeMode::Delete => format!("delete {target}"),
            ChangeMode::Reset => format!("reset {target}"),
        }
    }
}

/// A function call on its own line; the result is discarded.
pub struct CallEffect {
    call: FunctionCall,
}

impl CallEffect {
    pub(crate) fn new(call: FunctionCall) -> Self {
        Self { call }
    }
}

impl Effect for CallEffect {
    fn execute(&self, ctx: &mut Context) {
        self.call.get(ctx);
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String {
        self.call.describe(ctx, debug)
    }
}

type ExecuteFn = Box<dyn Fn(&mut Context) + Send + Sync>;

/// A host effect backed by a closure.
pub struct FnEffect {
    name: String,
    f: ExecuteFn,
}

impl FnEffect {
    pub fn new(name: impl Into<String>, f: impl Fn(&mut Context) + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Effect for FnEffect {
    fn execute(&self, ctx: &mut Context) {
        (self.f)(ctx);
    }

    fn describe(&self, _ctx: Option<&Context>, _debug: bool) -> String {
        self.name.clone()
    }
}

type BeginFn = Box<dyn Fn(&Context) -> AsyncJob + Send + Sync>;

/// A host async effect backed by a closure.
pub struct FnAsyncEffect {
    name: String,
    f: BeginFn,
}

impl FnAsyncEffect {
    pub fn new(name: impl Into<String>, f: impl Fn(&Context) -> AsyncJob + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl AsyncEffect for FnAsyncEffect {
    fn begin(&self, ctx: &Context) -> AsyncJob {
        (self.f)(ctx)
    }

    fn describe(&self, _ctx: Option<&Context>, _debug: bool) -> String {
        self.name.clone()
    }
}
