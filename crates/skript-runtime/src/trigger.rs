use skript_registry::ClassId;

use crate::node::{Graph, NodeId};

/// A loaded event handler: an event class and the graph to walk for it.
#[derive(Debug)]
pub struct Trigger {
    name: String,
    script: String,
    event: ClassId,
    graph: Graph,
    root: NodeId,
}

impl Trigger {
    pub(crate) fn new(
        name: impl Into<String>,
        script: impl Into<String>,
        event: ClassId,
        graph: Graph,
        root: NodeId,
    ) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            event,
            graph,
            root,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the script this trigger was loaded from.
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }

    #[must_use]
    pub const fn event(&self) -> ClassId {
        self.event
    }

    #[must_use]
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Header line plus the indented body.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}:\n{}", self.name, self.graph.render(self.root))
    }
}
