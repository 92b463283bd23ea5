use super::definition::{Edge, FlowDefinition, Node};
use super::payload::NodeKind;
use crate::compiler::edges::NEXT_STEP;
use crate::error::FlowError;
use ahash::{AHashMap, AHashSet};
use serde::Deserialize;
use serde_json::Value;

/// A trait for custom data models that can be converted into a `FlowDefinition`.
///
/// Implement this on your own flow editor's export format to feed it to the
/// compiler. The JSON format produced by the visual designer is handled by
/// `RawFlow`, which implements this trait through the default `FlowLoader`.
///
/// # Example
///
/// ```rust,no_run
/// use keiro::prelude::*;
/// use keiro::error::FlowError;
///
/// struct Exported { json: String }
///
/// impl IntoFlow for Exported {
///     fn into_flow(self) -> std::result::Result<FlowDefinition, FlowError> {
///         FlowLoader::new()
///             .with_type_alias("textMessage", "sendText")
///             .load_str(&self.json)
///     }
/// }
/// ```
pub trait IntoFlow {
    /// Consumes the object and converts it into a validated flow.
    fn into_flow(self) -> Result<FlowDefinition, FlowError>;
}

// --- JSON deserialization structs (designer export format) ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFlow {
    #[serde(default, alias = "id")]
    pub flow_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub organisation_id: String,
    #[serde(default)]
    pub branch_id: String,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
}

impl IntoFlow for RawFlow {
    fn into_flow(self) -> Result<FlowDefinition, FlowError> {
        FlowLoader::new().load_raw(self)
    }
}

/// Parses and validates designer flows. All payload checking happens here.
#[derive(Debug, Clone, Default)]
pub struct FlowLoader {
    aliases: AHashMap<String, String>,
}

impl FlowLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats nodes tagged `user_type_name` as the built-in `builtin_type_name`.
    pub fn with_type_alias(mut self, user_type_name: &str, builtin_type_name: &str) -> Self {
        self.aliases
            .insert(user_type_name.to_string(), builtin_type_name.to_string());
        self
    }

    pub fn load_str(&self, json: &str) -> Result<FlowDefinition, FlowError> {
        let raw: RawFlow =
            serde_json::from_str(json).map_err(|e| FlowError::JsonParseError(e.to_string()))?;
        self.load_raw(raw)
    }

    pub fn load_raw(&self, raw: RawFlow) -> Result<FlowDefinition, FlowError> {
        let mut seen = AHashSet::new();
        let mut nodes = Vec::with_capacity(raw.nodes.len());
        for raw_node in raw.nodes {
            if !seen.insert(raw_node.id.clone()) {
                return Err(FlowError::DuplicateNodeId(raw_node.id));
            }
            nodes.push(self.convert_node(raw_node)?);
        }

        let triggers = nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Trigger(_)))
            .count();
        match triggers {
            0 => {
                return Err(FlowError::MissingTrigger {
                    flow_id: raw.flow_id,
                });
            }
            1 => {}
            count => {
                return Err(FlowError::MultipleTriggers {
                    flow_id: raw.flow_id,
                    count,
                });
            }
        }

        let mut edges = Vec::with_capacity(raw.edges.len());
        for (index, raw_edge) in raw.edges.into_iter().enumerate() {
            let edge_id = if raw_edge.id.is_empty() {
                format!("edge-{}", index)
            } else {
                raw_edge.id
            };
            for endpoint in [&raw_edge.source, &raw_edge.target] {
                if !seen.contains(endpoint) {
                    return Err(FlowError::DanglingEdge {
                        edge_id,
                        missing_node_id: endpoint.clone(),
                    });
                }
            }
            edges.push(Edge {
                id: edge_id,
                source: raw_edge.source,
                target: raw_edge.target,
                // Single-output nodes are exported without a handle id.
                source_handle: raw_edge
                    .source_handle
                    .unwrap_or_else(|| NEXT_STEP.to_string()),
            });
        }

        Ok(FlowDefinition {
            flow_id: raw.flow_id,
            title: raw.title,
            organisation_id: raw.organisation_id,
            branch_id: raw.branch_id,
            nodes,
            edges,
        })
    }

    fn convert_node(&self, raw: RawNode) -> Result<Node, FlowError> {
        let type_name = self
            .aliases
            .get(&raw.node_type)
            .cloned()
            .unwrap_or(raw.node_type);

        let data = match raw.data {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let title = data
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&type_name)
            .to_string();

        let invalid = |message: String| FlowError::InvalidNodeData {
            node_id: raw.id.clone(),
            type_name: type_name.clone(),
            message,
        };
        let kind = NodeKind::from_data(&type_name, data).map_err(|e| invalid(e.to_string()))?;
        kind.validate().map_err(invalid)?;

        Ok(Node {
            id: raw.id,
            title,
            kind,
        })
    }
}
