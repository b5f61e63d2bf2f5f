//! Trigger graphs.
//!
//! Statements are flattened into a [`Graph`] of [`Node`]s addressed by
//! [`NodeId`]. Every node has a parent section and a `next` pointer; the
//! pointers are fixed once loading is done, so walking never mutates the
//! graph and any number of contexts can walk it at once.
//!
//! # Body tails
//!
//! The last node of a body points past the body:
//!
//! - loop and while bodies point back at their section
//! - conditional bodies point at the conditional's skipped-next
//! - the trigger body points nowhere

use std::fmt;

use skript_registry::Kleenean;

use crate::cond::Condition;
use crate::effect::{AsyncEffect, Effect};
use crate::expr::Expression;

/// Index of a node in its [`Graph`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which link of an if/else-if/else chain a conditional is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    If,
    ElseIf,
    Else,
}

/// What `exit` counts while walking up the parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitScope {
    /// Every section, the trigger included.
    Everything,
    /// Loops and while sections.
    Loops,
    Conditionals,
}

impl ExitScope {
    pub(crate) const fn noun(self) -> &'static str {
        match self {
            Self::Everything => "sections",
            Self::Loops => "loops",
            Self::Conditionals => "conditionals",
        }
    }

    pub(crate) const fn matches(self, kind: &NodeKind) -> bool {
        match self {
            Self::Everything => kind.is_section(),
            Self::Loops => matches!(kind, NodeKind::Loop { .. } | NodeKind::While { .. }),
            Self::Conditionals => matches!(kind, NodeKind::Conditional { .. }),
        }
    }
}

pub enum NodeKind {
    /// Root of a trigger or function body.
    Trigger { first: Option<NodeId> },
    Effect(Box<dyn Effect>),
    /// A condition on its own line; false leaves the enclosing section.
    Guard(Box<dyn Condition>),
    /// `<effect> if <condition>`. The inner node shares this node's parent
    /// and next.
    DoIf {
        condition: Box<dyn Condition>,
        effect: NodeId,
    },
    Conditional {
        branch: Branch,
        condition: Option<Box<dyn Condition>>,
        first: Option<NodeId>,
        /// Where execution continues after this whole if/else chain.
        skipped_next: Option<NodeId>,
    },
    Loop {
        expr: Box<dyn Expression>,
        first: Option<NodeId>,
    },
    While {
        condition: Box<dyn Condition>,
        do_while: bool,
        first: Option<NodeId>,
    },
    Delay {
        duration: Box<dyn Expression>,
        /// Waits for an external operation rather than a literal time.
        indeterminate: bool,
    },
    Async(Box<dyn AsyncEffect>),
    Exit {
        levels: usize,
        scope: ExitScope,
    },
    Continue { target: NodeId },
    Return { value: Box<dyn Expression> },
}

impl NodeKind {
    #[must_use]
    pub const fn is_section(&self) -> bool {
        matches!(
            self,
            Self::Trigger { .. } | Self::Conditional { .. } | Self::Loop { .. } | Self::While { .. }
        )
    }

    /// First node of the body, for sections.
    #[must_use]
    pub const fn first(&self) -> Option<NodeId> {
        match self {
            Self::Trigger { first }
            | Self::Conditional { first, .. }
            | Self::Loop { first, .. }
            | Self::While { first, .. } => *first,
            _ => None,
        }
    }

    fn describe(&self, graph: &Graph) -> String {
        match self {
            Self::Trigger { .. } => "trigger".to_string(),
            Self::Effect(effect) => effect.describe(None, false),
            Self::Guard(condition) => condition.describe(None, false),
            Self::DoIf { condition, effect } => format!(
                "{} if {}",
                graph.node(*effect).kind.describe(graph),
                condition.describe(None, false)
            ),
            Self::Conditional {
                branch, condition, ..
            } => {
                let condition = condition
                    .as_ref()
                    .map(|c| c.describe(None, false))
                    .unwrap_or_default();
                match branch {
                    Branch::If => format!("if {condition}"),
                    Branch::ElseIf => format!("else if {condition}"),
                    Branch::Else => "else".to_string(),
                }
            }
            Self::Loop { expr, .. } => format!("loop {}", expr.describe(None, false)),
            Self::While {
                condition,
                do_while,
                ..
            } => format!(
                "{}while {}",
                if *do_while { "do " } else { "" },
                condition.describe(None, false)
            ),
            Self::Delay {
                duration,
                indeterminate,
            } => {
                if *indeterminate {
                    "wait for operation to finish".to_string()
                } else {
                    format!("wait for {}", duration.describe(None, false))
                }
            }
            Self::Async(effect) => effect.describe(None, false),
            Self::Exit { levels: 1, scope } => {
                format!("stop 1 {}", scope.noun().trim_end_matches('s'))
            }
            Self::Exit { levels, scope } => format!("stop {levels} {}", scope.noun()),
            Self::Continue { .. } => "continue".to_string(),
            Self::Return { value } => format!("return {}", value.describe(None, false)),
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trigger { .. } => "Trigger",
            Self::Effect(_) => "Effect",
            Self::Guard(_) => "Guard",
            Self::DoIf { .. } => "DoIf",
            Self::Conditional { .. } => "Conditional",
            Self::Loop { .. } => "Loop",
            Self::While { .. } => "While",
            Self::Delay { .. } => "Delay",
            Self::Async(_) => "Async",
            Self::Exit { .. } => "Exit",
            Self::Continue { .. } => "Continue",
            Self::Return { .. } => "Return",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub next: Option<NodeId>,
    pub kind: NodeKind,
    /// Whether a delay may have run before this node.
    pub delayed: Kleenean,
    pub line: Option<usize>,
}

/// The nodes of one trigger or function.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Where execution goes once `section` is abandoned or its body ends.
    #[must_use]
    pub fn body_exit(&self, section: NodeId) -> Option<NodeId> {
        match &self.node(section).kind {
            NodeKind::Loop { .. } | NodeKind::While { .. } => Some(section),
            NodeKind::Conditional { skipped_next, .. } => *skipped_next,
            _ => None,
        }
    }

    /// Where `exit` resumes after leaving `section`.
    #[must_use]
    pub fn exit_target(&self, section: NodeId) -> Option<NodeId> {
        match &self.node(section).kind {
            NodeKind::Loop { .. } | NodeKind::While { .. } => self.node(section).next,
            NodeKind::Conditional { skipped_next, .. } => *skipped_next,
            _ => None,
        }
    }

    /// One line per node, indented one level per section.
    #[must_use]
    pub fn render(&self, root: NodeId) -> String {
        let mut out = String::new();
        self.render_body(root, 1, &mut out);
        out
    }

    fn render_body(&self, section: NodeId, depth: usize, out: &mut String) {
        let mut cursor = self.node(section).kind.first();
        while let Some(id) = cursor {
            let node = self.node(id);
            out.push_str(&"    ".repeat(depth));
            out.push_str(&node.kind.describe(self));
            if node.kind.is_section() {
                out.push(':');
            }
            out.push('\n');
            if node.kind.is_section() {
                self.render_body(id, depth + 1, out);
            }
            cursor = node
                .next
                .filter(|next| self.node(*next).parent == Some(section));
        }
    }

    /// Display form of a single node.
    #[must_use]
    pub fn describe(&self, id: NodeId) -> String {
        self.node(id).kind.describe(self)
    }
}
