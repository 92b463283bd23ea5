use crate::flow::{Edge, FlowDefinition, Node, NodeKind};
use crate::naming::{normalize_label, sanitize_identifier};
use ahash::AHashMap;
use std::borrow::Cow;

pub const NEXT_STEP: &str = "next-step";
pub const YES: &str = "yes";
pub const NO: &str = "no";
pub const NO_RESPONSE: &str = "no-response";
pub const FAILURE: &str = "failure";

/// A named outgoing port of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Port {
    /// A fixed port name, matched exactly.
    Named(&'static str),
    /// A button or list row id; the edge handle must end with it.
    Option(String),
    /// A branch label; the edge handle must end with its normalized form.
    Label(String),
}

impl Port {
    pub fn next_step() -> Self {
        Port::Named(NEXT_STEP)
    }

    /// The key matched against edge handles.
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            Port::Named(name) => Cow::Borrowed(*name),
            Port::Option(id) => Cow::Borrowed(id.as_str()),
            Port::Label(label) => Cow::Owned(normalize_label(label)),
        }
    }

    /// Dynamic keys match as a handle suffix that starts at a separator, so
    /// `1` matches `option-1` but neither `option-11` nor `option-b_1`.
    pub fn matches(&self, handle: &str) -> bool {
        match self {
            Port::Named(name) => handle == *name,
            Port::Option(_) | Port::Label(_) => {
                let key = self.key();
                match handle.strip_suffix(key.as_ref()) {
                    Some(rest) => rest
                        .chars()
                        .next_back()
                        .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_'),
                    None => false,
                }
            }
        }
    }

    /// Every port a node of `kind` leads on through, in the order its
    /// translator visits them. An unsupported node ends translation, but its
    /// `next-step` still ties it to the rest of a loop body.
    pub fn followed_by(kind: &NodeKind) -> Vec<Port> {
        match kind {
            NodeKind::SendText(data) if data.wait_for_response => {
                vec![Port::Named(YES), Port::Named(NO_RESPONSE)]
            }
            NodeKind::SendButtons(data) => data
                .buttons
                .iter()
                .map(|b| Port::Option(b.id.clone()))
                .chain([Port::Named(NO_RESPONSE)])
                .collect(),
            NodeKind::SendList(data) => data
                .rows()
                .map(|row| Port::Option(row.id.clone()))
                .chain([Port::Named(NO_RESPONSE)])
                .collect(),
            NodeKind::ConditionalSplit(_) => vec![Port::Named(YES), Port::Named(NO)],
            NodeKind::ConditionalBranch(data) => data
                .branches
                .iter()
                .map(|path| Port::Label(path.label.clone()))
                .collect(),
            NodeKind::Subflow(_) => vec![Port::Named(FAILURE), Port::next_step()],
            NodeKind::Trigger(_) => Vec::new(),
            _ => vec![Port::next_step()],
        }
    }

    /// Identifier-safe form of the port, used in generated routine names.
    pub fn slug(&self) -> String {
        let slug = sanitize_identifier(&self.key());
        if slug.is_empty() {
            "port".to_string()
        } else {
            slug
        }
    }
}

/// Finds the edge leaving `node_id` through `port`. The first match in
/// document order wins; `None` means the designer left the port unconnected.
pub fn find_edge<'a>(flow: &'a FlowDefinition, node_id: &str, port: &Port) -> Option<&'a Edge> {
    flow.edges
        .iter()
        .find(|e| e.source == node_id && port.matches(&e.source_handle))
}

/// Indexed view over a flow for repeated node and edge lookups.
pub struct FlowGraph<'a> {
    flow: &'a FlowDefinition,
    nodes: AHashMap<&'a str, &'a Node>,
    outgoing: AHashMap<&'a str, Vec<&'a Edge>>,
}

impl<'a> FlowGraph<'a> {
    pub fn new(flow: &'a FlowDefinition) -> Self {
        let nodes = flow.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut outgoing: AHashMap<&'a str, Vec<&'a Edge>> = AHashMap::new();
        for edge in &flow.edges {
            outgoing.entry(edge.source.as_str()).or_default().push(edge);
        }
        Self {
            flow,
            nodes,
            outgoing,
        }
    }

    pub fn flow(&self) -> &'a FlowDefinition {
        self.flow
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    /// Outgoing edges of `node_id`, in document order.
    pub fn outgoing(&self, node_id: &str) -> &[&'a Edge] {
        self.outgoing
            .get(node_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn find_edge(&self, node_id: &str, port: &Port) -> Option<&'a Edge> {
        self.outgoing(node_id)
            .iter()
            .copied()
            .find(|e| port.matches(&e.source_handle))
    }

    /// The node behind `port`, if the port is connected.
    pub fn next_node(&self, node_id: &str, port: &Port) -> Option<&'a Node> {
        self.find_edge(node_id, port)
            .and_then(|edge| self.node(&edge.target))
    }
}
