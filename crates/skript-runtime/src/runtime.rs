//! The host-facing runtime.
//!
//! The host owns the tick thread. Events are fired into the runtime, which
//! walks every matching trigger until it ends or suspends. Each call to
//! [`Runtime::tick`] moves to the next tick, resumes the delays due on it,
//! then applies finished async work.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use skript_registry::{Event, Registry, Value};
use tracing::{debug, error, info, trace, warn};

use crate::config::RuntimeConfig;
use crate::context::{Context, ContextArena, ContextId, Shared};
use crate::delay::{Continuation, Pending, Suspension};
use crate::effect::{AsyncJob, Completion};
use crate::engine;
use crate::error::{LoadWarning, RuntimeError, RuntimeResult};
use crate::function::{self, Function};
use crate::loader;
use crate::locals::Locals;
use crate::node::NodeId;
use crate::scheduler::{Scheduler, TickQueue};
use crate::script::Script;
use crate::trigger::Trigger;

/// Summary of a successful [`Runtime::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub script: String,
    pub triggers: usize,
    pub functions: usize,
    pub warnings: Vec<LoadWarning>,
}

/// Async work that finished on the pool and waits for the tick thread.
struct Completed {
    continuation: Continuation,
    completion: Completion,
}

pub struct Runtime {
    shared: Arc<Shared>,
    triggers: Vec<Arc<Trigger>>,
    contexts: ContextArena,
    scheduler: Box<dyn Scheduler>,
    pool: rayon::ThreadPool,
    completed_tx: Sender<Completed>,
    completed_rx: Receiver<Completed>,
    in_flight: usize,
}

impl Runtime {
    pub fn new(registry: Arc<Registry>, config: RuntimeConfig) -> RuntimeResult<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("skript-async-{i}"));
        if config.async_workers > 0 {
            builder = builder.num_threads(config.async_workers);
        }
        let pool = builder.build()?;
        let (completed_tx, completed_rx) = crossbeam_channel::unbounded();

        info!(
            async_workers = pool.current_num_threads(),
            max_call_depth = config.max_call_depth,
            "skript runtime started"
        );

        Ok(Self {
            shared: Arc::new(Shared::new(registry, config)),
            triggers: Vec::new(),
            contexts: ContextArena::default(),
            scheduler: Box::new(TickQueue::new()),
            pool,
            completed_tx,
            completed_rx,
            in_flight: 0,
        })
    }

    /// Replace the delay scheduler. Only call this before anything is
    /// scheduled.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Box::new(scheduler);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.shared.registry
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Load `script` and make its triggers and functions live. A script
    /// with the same name is replaced. Nothing is installed on error.
    pub fn install(&mut self, script: Script) -> RuntimeResult<LoadReport> {
        if !self.shared.is_enabled() {
            return Err(RuntimeError::Disabled);
        }
        let name = script.name.clone();

        let loaded = {
            let functions = self.shared.functions.read();
            loader::load(&self.shared.registry, &functions, script)
        };
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                for e in &err.errors {
                    error!(script = %name, "{e}");
                }
                return Err(err.into());
            }
        };
        for warning in &loaded.warnings {
            warn!(script = %name, line = ?warning.line, "{}", warning.message);
        }

        self.uninstall(&name);
        let report = LoadReport {
            script: name,
            triggers: loaded.triggers.len(),
            functions: loaded.functions.len(),
            warnings: loaded.warnings,
        };
        {
            let mut functions = self.shared.functions.write();
            for function in loaded.functions {
                functions.insert(function);
            }
        }
        self.triggers
            .extend(loaded.triggers.into_iter().map(Arc::new));

        info!(
            script = %report.script,
            triggers = report.triggers,
            functions = report.functions,
            "installed script"
        );
        Ok(report)
    }

    /// Remove every trigger and function of `script`. Executions already
    /// suspended inside it still run to the end.
    pub fn uninstall(&mut self, script: &str) -> usize {
        let before = self.triggers.len();
        self.triggers.retain(|t| t.script() != script);
        let triggers = before - self.triggers.len();
        let functions = self.shared.functions.write().remove_script(script);
        if triggers + functions > 0 {
            debug!(script, triggers, functions, "uninstalled script");
        }
        triggers + functions
    }

    #[must_use]
    pub fn triggers(&self) -> &[Arc<Trigger>] {
        &self.triggers
    }

    #[must_use]
    pub fn function(&self, name: &str) -> Option<Arc<Function>> {
        self.shared.functions.read().get(name)
    }

    /// Run every trigger listening to `event`'s class or a supertype of it.
    /// Returns the number of triggers started.
    pub fn fire(&mut self, event: Arc<dyn Event>) -> usize {
        if !self.shared.is_enabled() {
            debug!("runtime disabled, ignoring event");
            return 0;
        }
        let class = event.class();
        let classes = self.shared.registry.classes();
        let matching: Vec<Arc<Trigger>> = self
            .triggers
            .iter()
            .filter(|t| classes.is_assignable(t.event(), class))
            .cloned()
            .collect();

        for trigger in &matching {
            self.execute(trigger, event.clone(), Locals::new());
        }
        matching.len()
    }

    /// Start one execution of `trigger` with the given initial locals.
    pub fn execute(&mut self, trigger: &Arc<Trigger>, event: Arc<dyn Event>, locals: Locals) -> ContextId {
        let shared = self.shared.clone();
        let id = self
            .contexts
            .allocate(|id| Context::new(id, event, locals, shared, 0));
        debug!(trigger = trigger.name(), context = %id, "executing trigger");
        self.run(trigger, Some(trigger.root()), id);
        id
    }

    /// Call a script function from the host.
    pub fn call_function(&self, name: &str, args: &[Vec<Value>]) -> Option<Vec<Value>> {
        function::call(&self.shared, name, args, 1)
    }

    /// Advance one tick. Returns the number of executions resumed.
    ///
    /// The scheduler moves to the new tick first, so a delay reached by a
    /// resumed execution is always due on a later tick.
    pub fn tick(&mut self) -> usize {
        let mut resumed = 0;
        for continuation in self.scheduler.advance() {
            resumed += usize::from(self.resume(continuation, None));
        }
        while let Ok(completed) = self.completed_rx.try_recv() {
            resumed += usize::from(self.complete(completed));
        }
        if resumed > 0 {
            trace!(tick = self.scheduler.current_tick(), resumed, "tick");
        }
        resumed
    }

    /// Block until async work finishes or `timeout` passes, then resume what
    /// finished. The scheduler is not advanced.
    pub fn await_async(&mut self, timeout: Duration) -> usize {
        if self.in_flight == 0 {
            return 0;
        }
        let Ok(first) = self.completed_rx.recv_timeout(timeout) else {
            return 0;
        };
        let mut completed = vec![first];
        completed.extend(self.completed_rx.try_iter());
        completed
            .into_iter()
            .map(|c| usize::from(self.complete(c)))
            .sum()
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.scheduler.current_tick()
    }

    /// Delayed executions waiting for their tick.
    #[must_use]
    pub fn pending_continuations(&self) -> usize {
        self.scheduler.len()
    }

    /// Async effects still running on the pool.
    #[must_use]
    pub const fn pending_async(&self) -> usize {
        self.in_flight
    }

    #[must_use]
    pub fn context(&self, id: ContextId) -> Option<&Context> {
        self.contexts.get(id)
    }

    /// Executions that have started and not finished.
    #[must_use]
    pub const fn live_contexts(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_delayed(&self, id: ContextId) -> bool {
        self.shared.is_delayed(id)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.shared.is_enabled()
    }

    /// While disabled, events are ignored and delays end their execution
    /// instead of scheduling it.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.shared.set_enabled(enabled);
    }

    /// Disable the runtime and drop every suspended execution. Returns the
    /// number of continuations dropped.
    pub fn shutdown(&mut self) -> usize {
        self.shared.set_enabled(false);
        let dropped = self.scheduler.clear().len();
        for id in self.contexts.ids() {
            self.finish(id);
        }
        info!(dropped, in_flight = self.in_flight, "skript runtime shut down");
        dropped
    }

    fn run(&mut self, trigger: &Arc<Trigger>, start: Option<NodeId>, id: ContextId) {
        let Some(ctx) = self.contexts.get_mut(id) else {
            debug!(context = %id, "context is gone");
            return;
        };
        let suspension = start.and_then(|start| engine::walk(trigger.graph(), start, ctx));

        match suspension {
            Some(Suspension {
                resume,
                pending,
                snapshot,
            }) => {
                let continuation = Continuation::new(trigger.clone(), resume, id, snapshot);
                match pending {
                    Pending::Timer { ticks } => {
                        trace!(context = %id, ticks, "delaying");
                        self.scheduler.schedule(ticks, continuation);
                    }
                    Pending::Async(job) => self.dispatch(continuation, job),
                }
            }
            None => self.finish(id),
        }
    }

    fn dispatch(&mut self, continuation: Continuation, job: AsyncJob) {
        let tx = self.completed_tx.clone();
        self.in_flight += 1;
        self.pool.spawn(move || {
            let completion = job();
            let context = continuation.context();
            if tx
                .send(Completed {
                    continuation,
                    completion,
                })
                .is_err()
            {
                debug!(%context, "runtime dropped before async effect finished");
            }
        });
    }

    fn complete(&mut self, completed: Completed) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.resume(completed.continuation, Some(completed.completion))
    }

    /// Returns whether the execution was still alive and walked on.
    fn resume(&mut self, continuation: Continuation, completion: Option<Completion>) -> bool {
        let (trigger, resume, id, snapshot) = continuation.into_parts();
        let Some(ctx) = self.contexts.get_mut(id) else {
            debug!(context = %id, trigger = trigger.name(), "dropping continuation of a finished execution");
            return false;
        };
        ctx.locals_mut().restore(snapshot);
        if let Some(completion) = completion {
            completion(ctx);
        }
        self.run(&trigger, resume, id);
        true
    }

    fn finish(&mut self, id: ContextId) {
        if let Some(mut ctx) = self.contexts.release(id) {
            ctx.locals_mut().clear();
        }
        self.shared.forget(id);
        trace!(context = %id, "execution finished");
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("triggers", &self.triggers.len())
            .field("functions", &self.shared.functions.read().len())
            .field("contexts", &self.contexts)
            .field("pending", &self.scheduler.len())
            .field("in_flight", &self.in_flight)
            .field("enabled", &self.shared.is_enabled())
            .finish_non_exhaustive()
    }
}
