//! The walk trampoline.
//!
//! [`walk`] follows node handles until the chain ends or a delay or async
//! effect suspends it. Each step only decides the next handle, so control
//! flow never recurses and never rewrites the graph.

use std::collections::VecDeque;

use tracing::{Level, trace, warn};

use crate::context::{Context, Frame};
use crate::delay::{self, Pending, Suspension};
use crate::effect::Flow;
use crate::node::{Branch, ExitScope, Graph, Node, NodeId, NodeKind};

enum Step {
    Goto(Option<NodeId>),
    Suspend(Suspension),
}

/// Walk from `start` until the chain ends or suspends.
pub(crate) fn walk(graph: &Graph, start: NodeId, ctx: &mut Context) -> Option<Suspension> {
    let mut cursor = Some(start);
    while let Some(id) = cursor {
        let node = graph.node(id);
        if tracing::enabled!(Level::TRACE) {
            trace!(context = %ctx.id(), node = ?id, line = ?node.line, "{}", graph.describe(id));
        }
        cursor = match step(graph, id, node, ctx) {
            Step::Goto(next) => next,
            Step::Suspend(suspension) => return Some(suspension),
        };
    }
    None
}

fn step(graph: &Graph, id: NodeId, node: &Node, ctx: &mut Context) -> Step {
    match &node.kind {
        NodeKind::Trigger { first } => Step::Goto(*first),
        NodeKind::Effect(effect) => match effect.walk(ctx) {
            Flow::Continue => Step::Goto(node.next),
            Flow::Stop => Step::Goto(None),
        },
        NodeKind::Guard(condition) => {
            if condition.check(ctx) {
                Step::Goto(node.next)
            } else {
                Step::Goto(node.parent.and_then(|parent| graph.body_exit(parent)))
            }
        }
        NodeKind::DoIf { condition, effect } => {
            if condition.check(ctx) {
                Step::Goto(Some(*effect))
            } else {
                Step::Goto(node.next)
            }
        }
        NodeKind::Conditional {
            branch,
            condition,
            first,
            skipped_next,
        } => {
            let taken = *branch == Branch::Else || condition.as_ref().is_some_and(|c| c.check(ctx));
            if taken {
                Step::Goto(first.or(*skipped_next))
            } else {
                Step::Goto(node.next)
            }
        }
        NodeKind::Loop { expr, first } => {
            if !ctx.frames.contains_key(&id) {
                let remaining: VecDeque<_> = expr.get(ctx).into();
                ctx.frames.insert(
                    id,
                    Frame::Loop {
                        remaining,
                        current: None,
                    },
                );
            }
            let advanced = match ctx.frames.get_mut(&id) {
                Some(Frame::Loop { remaining, current }) => {
                    *current = remaining.pop_front();
                    current.is_some()
                }
                _ => false,
            };
            if advanced {
                Step::Goto(first.or(Some(id)))
            } else {
                ctx.frames.remove(&id);
                Step::Goto(node.next)
            }
        }
        NodeKind::While {
            condition,
            do_while,
            first,
        } => {
            let first_pass = *do_while && !ctx.frames.contains_key(&id);
            if first_pass || condition.check(ctx) {
                ctx.frames.insert(id, Frame::While);
                Step::Goto(first.or(Some(id)))
            } else {
                ctx.frames.remove(&id);
                Step::Goto(node.next)
            }
        }
        NodeKind::Delay { duration, .. } => {
            let Some(next) = node.next else {
                return Step::Goto(None);
            };
            if !ctx.shared().is_enabled() {
                warn!(context = %ctx.id(), "runtime disabled, not scheduling delayed continuation");
                return Step::Goto(None);
            }
            ctx.mark_delayed();
            let Some(span) = duration.get_single(ctx).and_then(|v| v.as_timespan()) else {
                return Step::Goto(None);
            };
            let ticks = delay::clamp_ticks(span, ctx.config().warn_sub_tick_delays);
            Step::Suspend(Suspension {
                resume: Some(next),
                pending: Pending::Timer { ticks },
                snapshot: ctx.locals_mut().take(),
            })
        }
        NodeKind::Async(effect) => {
            if !ctx.shared().is_enabled() {
                warn!(context = %ctx.id(), "runtime disabled, not dispatching async effect");
                return Step::Goto(None);
            }
            ctx.mark_delayed();
            let job = effect.begin(ctx);
            Step::Suspend(Suspension {
                resume: node.next,
                pending: Pending::Async(job),
                snapshot: ctx.locals_mut().take(),
            })
        }
        NodeKind::Exit { levels, scope } => Step::Goto(exit(graph, id, *levels, *scope, ctx)),
        NodeKind::Continue { target } => Step::Goto(Some(*target)),
        NodeKind::Return { value } => {
            let values = value.get(ctx);
            ctx.set_return_value(values);
            let mut parent = node.parent;
            while let Some(section) = parent {
                ctx.frames.remove(&section);
                parent = graph.node(section).parent;
            }
            Step::Goto(None)
        }
    }
}

/// Leave `levels` sections matching `scope`, ending every loop passed on
/// the way, and return where to continue.
fn exit(graph: &Graph, from: NodeId, levels: usize, scope: ExitScope, ctx: &mut Context) -> Option<NodeId> {
    let mut section = from;
    let mut remaining = levels;
    while remaining > 0 {
        section = graph.node(section).parent?;
        let kind = &graph.node(section).kind;
        if matches!(kind, NodeKind::Loop { .. } | NodeKind::While { .. }) {
            ctx.frames.remove(&section);
        }
        if scope.matches(kind) {
            remaining -= 1;
        }
    }
    graph.exit_target(section)
}
