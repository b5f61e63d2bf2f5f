//! Execution contexts with generational ids.
//!
//! A context is "the event" while a trigger runs: it owns the locals, loop
//! state and return slot of one execution. Contexts live in a
//! [`ContextArena`] and are referred to by [`ContextId`] so a continuation
//! never holds on to one across ticks.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use skript_registry::{Event, Registry, Value};

use crate::config::RuntimeConfig;
use crate::function::FunctionTable;
use crate::locals::Locals;
use crate::node::NodeId;

/// Generation counter to detect stale context ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Generation(u32);

impl Generation {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Handle to a live context.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId {
    index: u32,
    generation: Generation,
}

impl ContextId {
    /// Contexts that are not tracked by the arena, e.g. function calls.
    pub const DETACHED: Self = Self {
        index: u32::MAX,
        generation: Generation(0),
    };

    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[must_use]
    pub const fn generation(self) -> Generation {
        self.generation
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::DETACHED {
            return f.write_str("Context(detached)");
        }
        write!(f, "Context({}v{})", self.index, self.generation.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation.0)
    }
}

/// Per-execution state of a loop or while section.
pub(crate) enum Frame {
    Loop {
        remaining: VecDeque<Value>,
        current: Option<Value>,
    },
    While,
}

/// State shared by every context of one runtime.
pub(crate) struct Shared {
    pub registry: Arc<Registry>,
    pub functions: RwLock<FunctionTable>,
    pub config: RuntimeConfig,
    enabled: AtomicBool,
    /// Contexts that have passed a delay. Entries are dropped with the
    /// context, so stale ids never match.
    delayed: Mutex<FxHashSet<ContextId>>,
}

impl Shared {
    pub fn new(registry: Arc<Registry>, config: RuntimeConfig) -> Self {
        Self {
            registry,
            functions: RwLock::new(FunctionTable::default()),
            config,
            enabled: AtomicBool::new(true),
            delayed: Mutex::new(FxHashSet::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_delayed(&self, id: ContextId) -> bool {
        self.delayed.lock().contains(&id)
    }

    pub fn mark_delayed(&self, id: ContextId) {
        if id != ContextId::DETACHED {
            self.delayed.lock().insert(id);
        }
    }

    pub fn forget(&self, id: ContextId) {
        self.delayed.lock().remove(&id);
    }
}

/// One execution of a trigger or function.
pub struct Context {
    id: ContextId,
    event: Arc<dyn Event>,
    locals: Locals,
    pub(crate) frames: FxHashMap<NodeId, Frame>,
    return_value: Option<Vec<Value>>,
    shared: Arc<Shared>,
    call_depth: usize,
}

impl Context {
    pub(crate) fn new(
        id: ContextId,
        event: Arc<dyn Event>,
        locals: Locals,
        shared: Arc<Shared>,
        call_depth: usize,
    ) -> Self {
        Self {
            id,
            event,
            locals,
            frames: FxHashMap::default(),
            return_value: None,
            shared,
            call_depth,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ContextId {
        self.id
    }

    #[must_use]
    pub fn event(&self) -> &dyn Event {
        &*self.event
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    #[must_use]
    pub const fn locals(&self) -> &Locals {
        &self.locals
    }

    pub fn locals_mut(&mut self) -> &mut Locals {
        &mut self.locals
    }

    /// Whether a delay or async effect has suspended this execution before.
    #[must_use]
    pub fn is_delayed(&self) -> bool {
        self.shared.is_delayed(self.id)
    }

    /// Current value of the loop section `node`.
    #[must_use]
    pub fn loop_value(&self, node: NodeId) -> Option<&Value> {
        match self.frames.get(&node) {
            Some(Frame::Loop { current, .. }) => current.as_ref(),
            _ => None,
        }
    }

    /// Loop and while sections currently iterating.
    #[must_use]
    pub fn active_loops(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub const fn call_depth(&self) -> usize {
        self.call_depth
    }

    #[must_use]
    pub fn return_value(&self) -> Option<&[Value]> {
        self.return_value.as_deref()
    }

    pub(crate) fn set_return_value(&mut self, values: Vec<Value>) {
        self.return_value = Some(values);
    }

    pub(crate) fn take_return_value(&mut self) -> Option<Vec<Value>> {
        self.return_value.take()
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn mark_delayed(&self) {
        self.shared.mark_delayed(self.id);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("event", &self.event)
            .field("locals", &self.locals)
            .field("frames", &self.frames.len())
            .field("call_depth", &self.call_depth)
            .finish_non_exhaustive()
    }
}

struct Slot {
    generation: Generation,
    context: Option<Context>,
}

/// Storage for live contexts with a free list of recycled slots.
#[derive(Default)]
pub(crate) struct ContextArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    alive_count: u32,
}

impl ContextArena {
    /// Allocate a slot and build the context for it.
    pub fn allocate(&mut self, build: impl FnOnce(ContextId) -> Context) -> ContextId {
        self.alive_count += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            let id = ContextId {
                index,
                generation: slot.generation,
            };
            slot.context = Some(build(id));
            id
        } else {
            let index = self.slots.len() as u32;
            let id = ContextId {
                index,
                generation: Generation::default(),
            };
            self.slots.push(Slot {
                generation: id.generation,
                context: Some(build(id)),
            });
            id
        }
    }

    fn slot(&self, id: ContextId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    pub fn get(&self, id: ContextId) -> Option<&Context> {
        self.slot(id)?.context.as_ref()
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut Context> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?
            .context
            .as_mut()
    }

    pub fn is_alive(&self, id: ContextId) -> bool {
        self.get(id).is_some()
    }

    /// Remove a context, invalidating its id.
    pub fn release(&mut self, id: ContextId) -> Option<Context> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let context = slot.context.take()?;
        slot.generation = slot.generation.next();
        self.free_list.push(id.index);
        self.alive_count -= 1;
        Some(context)
    }

    pub fn ids(&self) -> Vec<ContextId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.context.is_some())
            .map(|(index, slot)| ContextId {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub const fn len(&self) -> usize {
        self.alive_count as usize
    }
}

impl fmt::Debug for ContextArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextArena")
            .field("slots", &self.slots.len())
            .field("alive", &self.alive_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use skript_registry::{ClassId, RegistryBuilder};

    use super::*;

    struct Nothing;

    impl Event for Nothing {
        fn class(&self) -> ClassId {
            ClassId::EVENT
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn shared() -> Arc<Shared> {
        Arc::new(Shared::new(
            Arc::new(RegistryBuilder::new().build()),
            RuntimeConfig::default(),
        ))
    }

    #[test]
    fn test_stale_ids_are_rejected() {
        let shared = shared();
        let mut arena = ContextArena::default();
        let build = |id| Context::new(id, Arc::new(Nothing), Locals::new(), shared.clone(), 0);

        let a = arena.allocate(build);
        assert!(arena.is_alive(a));
        assert!(arena.release(a).is_some());
        assert!(!arena.is_alive(a));
        assert!(arena.release(a).is_none());

        let b = arena.allocate(build);
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b).map(Context::id), Some(b));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_delayed_side_table() {
        let shared = shared();
        let mut arena = ContextArena::default();
        let id = arena.allocate(|id| Context::new(id, Arc::new(Nothing), Locals::new(), shared.clone(), 0));

        assert!(!shared.is_delayed(id));
        shared.mark_delayed(id);
        assert!(arena.get(id).is_some_and(Context::is_delayed));

        shared.forget(id);
        assert!(!shared.is_delayed(id));

        shared.mark_delayed(ContextId::DETACHED);
        assert!(!shared.is_delayed(ContextId::DETACHED));
    }
}
