#![allow(missing_docs)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cast_possible_truncation)]

//! Trigger execution for Skript.
//!
//! Scripts are handed over as statement trees ([`Script`]), checked and
//! loaded into per-trigger node graphs, and walked when their event fires.
//!
//! # Key Concepts
//!
//! - **Trigger**: an event class plus the graph of statements to run for it
//! - **Context**: one execution of a trigger; owns its [`Locals`] and loop
//!   state, addressed by a generational [`ContextId`]
//! - **Section**: a node with a body (`if`, `loop`, `while`). Bodies are
//!   linked so that walking never recurses
//! - **Delay**: stops the walk, detaches the locals and schedules a
//!   [`Continuation`] on a later tick
//! - **Async effect**: like a delay, but resumes when background work on the
//!   pool finishes
//! - **Function**: a graph walked synchronously in a detached context;
//!   delays are not allowed inside
//!
//! # Lifecycle
//!
//! ```ignore
//! let mut runtime = Runtime::new(registry, RuntimeConfig::from_env())?;
//! runtime.install(
//!     Script::new("greet").trigger("on join", join, vec![
//!         Stmt::effect(FnEffect::new("say hi", |ctx| { /* ... */ })),
//!         Stmt::delay(Expr::literal(Timespan::from_seconds(1))),
//!         Stmt::effect(FnEffect::new("say bye", |ctx| { /* ... */ })),
//!     ]),
//! )?;
//!
//! runtime.fire(Arc::new(JoinEvent { .. }));
//! loop {
//!     runtime.tick();
//! }
//! ```

mod cond;
mod config;
mod context;
mod delay;
mod effect;
mod engine;
mod error;
mod expr;
mod function;
mod loader;
mod locals;
mod node;
mod runtime;
mod scheduler;
mod script;
mod trigger;

pub use cond::{Compare, Condition, FnCondition, IsSet, Not};
pub use config::RuntimeConfig;
pub use context::{Context, ContextId, Generation};
pub use delay::Continuation;
pub use effect::{AsyncEffect, AsyncJob, CallEffect, Change, Completion, Effect, Flow, FnAsyncEffect, FnEffect, LoadEnv};
pub use error::{ConfigError, LoadError, LoadWarning, RuntimeError, RuntimeResult, ScriptLoadError};
pub use expr::{
    Converted, EventValueExpr, Expression, FnExpression, FunctionCall, Literal, LocalVariable, LoopValue,
};
pub use function::{Function, FunctionEvent, FunctionTable, Parameter, Signature};
pub use locals::{Locals, LocalsSnapshot};
pub use node::{Branch, ExitScope, Graph, Node, NodeId, NodeKind};
pub use runtime::{LoadReport, Runtime};
pub use scheduler::{Scheduler, TickQueue};
pub use script::{Cond, ExitLevels, Expr, FunctionDef, Item, ParamDef, Script, Stmt, StmtKind, TriggerDef};
pub use trigger::Trigger;
