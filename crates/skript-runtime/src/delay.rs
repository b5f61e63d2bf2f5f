//! Suspending a trigger across ticks.
//!
//! A delay detaches the context's locals into a [`LocalsSnapshot`] and
//! stops the walk. The runtime turns the resulting [`Suspension`] into a
//! [`Continuation`], queues it, and later restores the snapshot before
//! walking on from the resume node. Async effects take the same path, with
//! the job's completion applied right before the walk resumes.

use std::fmt;
use std::sync::Arc;

use skript_registry::Timespan;
use tracing::warn;

use crate::context::ContextId;
use crate::effect::AsyncJob;
use crate::locals::LocalsSnapshot;
use crate::node::NodeId;
use crate::trigger::Trigger;

/// What a suspended walk is waiting for.
pub(crate) enum Pending {
    Timer { ticks: u64 },
    Async(AsyncJob),
}

/// Returned by the walker when it stops at a delay or async effect.
pub(crate) struct Suspension {
    pub resume: Option<NodeId>,
    pub pending: Pending,
    pub snapshot: LocalsSnapshot,
}

/// Everything needed to pick a suspended execution back up.
pub struct Continuation {
    trigger: Arc<Trigger>,
    resume: Option<NodeId>,
    context: ContextId,
    snapshot: LocalsSnapshot,
}

impl Continuation {
    pub(crate) fn new(
        trigger: Arc<Trigger>,
        resume: Option<NodeId>,
        context: ContextId,
        snapshot: LocalsSnapshot,
    ) -> Self {
        Self {
            trigger,
            resume,
            context,
            snapshot,
        }
    }

    #[must_use]
    pub const fn context(&self) -> ContextId {
        self.context
    }

    #[must_use]
    pub const fn resume(&self) -> Option<NodeId> {
        self.resume
    }

    #[must_use]
    pub fn trigger(&self) -> &Arc<Trigger> {
        &self.trigger
    }

    pub(crate) fn into_parts(self) -> (Arc<Trigger>, Option<NodeId>, ContextId, LocalsSnapshot) {
        (self.trigger, self.resume, self.context, self.snapshot)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("trigger", &self.trigger.name())
            .field("resume", &self.resume)
            .field("context", &self.context)
            .field("snapshot", &self.snapshot)
            .finish()
    }
}

/// Ticks to wait for `span`. There is nothing shorter than one tick.
pub(crate) fn clamp_ticks(span: Timespan, warn_sub_tick: bool) -> u64 {
    let ticks = span.ticks();
    if ticks == 0 {
        if warn_sub_tick {
            warn!(requested = %span, "delays less than one tick are not possible, defaulting to one tick");
        }
        return 1;
    }
    ticks
}
