use super::payload::NodeKind;
use crate::naming::sanitize_identifier;

/// The complete, validated definition of an automation flow, ready for compilation.
/// This is the target structure of every ingestion path (`FlowLoader`, `IntoFlow`).
#[derive(Debug, Clone, Default)]
pub struct FlowDefinition {
    pub flow_id: String,
    pub title: String,
    pub organisation_id: String,
    pub branch_id: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl FlowDefinition {
    /// The trigger node. Ingestion guarantees there is exactly one.
    pub fn trigger(&self) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Trigger(_)))
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The name under which the compiled program is submitted to a sink.
    pub fn program_name(&self) -> String {
        let name = sanitize_identifier(&format!("{} {}", self.organisation_id, self.flow_id));
        if name.is_empty() {
            "flow".to_string()
        } else {
            name
        }
    }
}

/// A single automation action or control-flow construct.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    /// The designer-facing title, used to derive generated names.
    pub title: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }
}

/// A named outgoing transition from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// The named port on the source node, e.g. `next-step` or a button id.
    pub source_handle: String,
}
