#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use skript_registry::{ClassId, Event, Registry, RegistryBuilder, Time, Value};
use skript_runtime::{FnEffect, Runtime, RuntimeConfig, Stmt};

#[derive(Debug)]
pub struct TestEvent(pub ClassId);

impl Event for TestEvent {
    fn class(&self) -> ClassId {
        self.0
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct Events {
    pub tick: ClassId,
    pub chat: ClassId,
}

pub fn registry() -> (Arc<Registry>, Events) {
    let mut builder = RegistryBuilder::new();
    let tick = builder.register_event("tick", &[]).unwrap();
    let chat = builder.register_event("chat", &[]).unwrap();
    builder
        .register_event_value(
            chat,
            ClassId::TEXT,
            |_| Some(Value::from("hello")),
            Time::Now,
        )
        .unwrap();
    (Arc::new(builder.build()), Events { tick, chat })
}

pub fn runtime_with(config: RuntimeConfig) -> (Runtime, Events) {
    let (registry, events) = registry();
    (Runtime::new(registry, config).unwrap(), events)
}

pub fn runtime() -> (Runtime, Events) {
    runtime_with(RuntimeConfig {
        async_workers: 2,
        ..RuntimeConfig::default()
    })
}

/// Records what effects saw, in order.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    /// An effect that records `name`.
    pub fn mark(&self, name: &str) -> Stmt {
        let journal = self.clone();
        let entry = name.to_string();
        Stmt::effect(FnEffect::new(name, move |_| journal.push(entry.clone())))
    }

    /// An effect that records `var=<values>`, list values joined with `,`.
    pub fn local(&self, var: &str) -> Stmt {
        let journal = self.clone();
        let var = var.to_string();
        Stmt::effect(FnEffect::new(format!("record {{_{var}}}"), move |ctx| {
            let values: Vec<String> = ctx.locals().get(&var).iter().map(Value::as_text).collect();
            journal.push(format!("{var}={}", values.join(",")));
        }))
    }
}
