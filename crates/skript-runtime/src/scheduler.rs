//! Tick scheduling for delayed continuations.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::delay::Continuation;

/// The host's "run this after N ticks" service.
///
/// Continuations due on the same tick come out in the order they were
/// scheduled.
pub trait Scheduler: Send {
    /// Queue `continuation` to run `ticks` ticks from now. `ticks` is at
    /// least one.
    fn schedule(&mut self, ticks: u64, continuation: Continuation);

    /// Advance one tick and drain everything now due.
    fn advance(&mut self) -> Vec<Continuation>;

    fn current_tick(&self) -> u64;

    /// Number of queued continuations.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything queued, returning it.
    fn clear(&mut self) -> Vec<Continuation>;
}

/// Continuations bucketed by the tick they are due on.
#[derive(Default)]
pub struct TickQueue {
    tick: u64,
    buckets: BTreeMap<u64, VecDeque<Continuation>>,
    len: usize,
}

impl TickQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of continuations due on `tick`.
    #[must_use]
    pub fn due_on(&self, tick: u64) -> usize {
        self.buckets.get(&tick).map_or(0, VecDeque::len)
    }
}

impl Scheduler for TickQueue {
    fn schedule(&mut self, ticks: u64, continuation: Continuation) {
        let due = self.tick + ticks.max(1);
        self.buckets.entry(due).or_default().push_back(continuation);
        self.len += 1;
    }

    fn advance(&mut self) -> Vec<Continuation> {
        self.tick += 1;
        let later = self.buckets.split_off(&(self.tick + 1));
        let due = std::mem::replace(&mut self.buckets, later);
        let drained: Vec<Continuation> = due.into_values().flatten().collect();
        self.len -= drained.len();
        drained
    }

    fn current_tick(&self) -> u64 {
        self.tick
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) -> Vec<Continuation> {
        self.len = 0;
        std::mem::take(&mut self.buckets)
            .into_values()
            .flatten()
            .collect()
    }
}

impl fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickQueue")
            .field("tick", &self.tick)
            .field("buckets", &self.buckets.len())
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use skript_registry::ClassId;

    use super::*;
    use crate::context::ContextId;
    use crate::locals::Locals;
    use crate::node::{Graph, Node, NodeKind};
    use crate::trigger::Trigger;

    fn continuation(trigger: &Arc<Trigger>) -> Continuation {
        Continuation::new(trigger.clone(), None, ContextId::DETACHED, Locals::new().take())
    }

    fn trigger() -> Arc<Trigger> {
        let mut graph = Graph::default();
        let root = graph.push(Node {
            parent: None,
            next: None,
            kind: NodeKind::Trigger { first: None },
            delayed: skript_registry::Kleenean::False,
            line: None,
        });
        Arc::new(Trigger::new("on test", "test", ClassId::EVENT, graph, root))
    }

    #[test]
    fn test_due_after_exact_ticks() {
        let trigger = trigger();
        let mut queue = TickQueue::new();
        queue.schedule(1, continuation(&trigger));
        queue.schedule(3, continuation(&trigger));
        queue.schedule(3, continuation(&trigger));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.due_on(3), 2);

        assert_eq!(queue.advance().len(), 1);
        assert!(queue.advance().is_empty());
        assert_eq!(queue.advance().len(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.current_tick(), 3);
    }

    #[test]
    fn test_zero_ticks_means_next_tick() {
        let trigger = trigger();
        let mut queue = TickQueue::new();
        queue.schedule(0, continuation(&trigger));
        assert_eq!(queue.due_on(1), 1);
        assert_eq!(queue.advance().len(), 1);
    }

    #[test]
    fn test_clear() {
        let trigger = trigger();
        let mut queue = TickQueue::new();
        queue.schedule(5, continuation(&trigger));
        assert_eq!(queue.clear().len(), 1);
        assert!(queue.is_empty());
        assert!(queue.advance().is_empty());
    }
}
