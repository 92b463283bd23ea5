use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The typed payload of a node, discriminated by the node's `type` tag.
///
/// Payloads are parsed and checked once, when a flow is ingested. Translators
/// rely on the shapes below and never inspect raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Trigger(TriggerData),
    SendText(SendTextData),
    SendButtons(ButtonsData),
    SendList(ListData),
    Delay(DelayData),
    ConditionalSplit(SplitData),
    ConditionalBranch(BranchData),
    SaveData(SaveFieldsData),
    SaveVariable(SaveVariableData),
    LoopStart(LoopStartData),
    LoopEnd,
    ApiCall(ApiCallData),
    Webhook(WebhookData),
    Subflow(SubflowData),
    Alert(AlertData),
    UtilityFunction(UtilityData),
    /// A tag this compiler does not know. Compiles to a terminal step.
    Unsupported { type_name: String },
}

impl NodeKind {
    /// Every type tag understood by the compiler.
    pub const TAGS: [&'static str; 16] = [
        "trigger",
        "sendText",
        "sendButtons",
        "sendList",
        "delay",
        "conditionalSplit",
        "conditionalBranch",
        "saveData",
        "saveVariable",
        "loopStart",
        "loopEnd",
        "apiCall",
        "webhook",
        "subflow",
        "alert",
        "utilityFunction",
    ];

    /// Parses the payload for `type_name`. Unknown tags become `Unsupported`.
    pub fn from_data(type_name: &str, data: Value) -> Result<Self, serde_json::Error> {
        let kind = match type_name {
            "trigger" => NodeKind::Trigger(serde_json::from_value(data)?),
            "sendText" => NodeKind::SendText(serde_json::from_value(data)?),
            "sendButtons" => NodeKind::SendButtons(serde_json::from_value(data)?),
            "sendList" => NodeKind::SendList(serde_json::from_value(data)?),
            "delay" => NodeKind::Delay(serde_json::from_value(data)?),
            "conditionalSplit" => NodeKind::ConditionalSplit(serde_json::from_value(data)?),
            "conditionalBranch" => NodeKind::ConditionalBranch(serde_json::from_value(data)?),
            "saveData" => NodeKind::SaveData(serde_json::from_value(data)?),
            "saveVariable" => NodeKind::SaveVariable(serde_json::from_value(data)?),
            "loopStart" => NodeKind::LoopStart(serde_json::from_value(data)?),
            "loopEnd" => NodeKind::LoopEnd,
            "apiCall" => NodeKind::ApiCall(serde_json::from_value(data)?),
            "webhook" => NodeKind::Webhook(serde_json::from_value(data)?),
            "subflow" => NodeKind::Subflow(serde_json::from_value(data)?),
            "alert" => NodeKind::Alert(serde_json::from_value(data)?),
            "utilityFunction" => NodeKind::UtilityFunction(serde_json::from_value(data)?),
            other => NodeKind::Unsupported {
                type_name: other.to_string(),
            },
        };
        Ok(kind)
    }

    pub fn type_name(&self) -> &str {
        match self {
            NodeKind::Trigger(_) => "trigger",
            NodeKind::SendText(_) => "sendText",
            NodeKind::SendButtons(_) => "sendButtons",
            NodeKind::SendList(_) => "sendList",
            NodeKind::Delay(_) => "delay",
            NodeKind::ConditionalSplit(_) => "conditionalSplit",
            NodeKind::ConditionalBranch(_) => "conditionalBranch",
            NodeKind::SaveData(_) => "saveData",
            NodeKind::SaveVariable(_) => "saveVariable",
            NodeKind::LoopStart(_) => "loopStart",
            NodeKind::LoopEnd => "loopEnd",
            NodeKind::ApiCall(_) => "apiCall",
            NodeKind::Webhook(_) => "webhook",
            NodeKind::Subflow(_) => "subflow",
            NodeKind::Alert(_) => "alert",
            NodeKind::UtilityFunction(_) => "utilityFunction",
            NodeKind::Unsupported { type_name } => type_name,
        }
    }

    /// Prefix used for routine names generated on behalf of this node.
    pub fn prefix(&self) -> &'static str {
        match self {
            NodeKind::Trigger(_) => "trigger",
            NodeKind::SendText(_) => "text",
            NodeKind::SendButtons(_) => "buttons",
            NodeKind::SendList(_) => "list",
            NodeKind::Delay(_) => "delay",
            NodeKind::ConditionalSplit(_) => "split",
            NodeKind::ConditionalBranch(_) => "branch",
            NodeKind::SaveData(_) => "save",
            NodeKind::SaveVariable(_) => "variable",
            NodeKind::LoopStart(_) => "loop",
            NodeKind::LoopEnd => "loop_end",
            NodeKind::ApiCall(_) => "api",
            NodeKind::Webhook(_) => "webhook",
            NodeKind::Subflow(_) => "subflow",
            NodeKind::Alert(_) => "alert",
            NodeKind::UtilityFunction(_) => "utility",
            NodeKind::Unsupported { .. } => "node",
        }
    }

    /// Whether the node binds a value later nodes can read.
    pub fn produces_result(&self) -> bool {
        !matches!(
            self,
            NodeKind::Trigger(_)
                | NodeKind::Delay(_)
                | NodeKind::LoopStart(_)
                | NodeKind::LoopEnd
                | NodeKind::Unsupported { .. }
        )
    }

    /// Semantic checks serde cannot express.
    pub(crate) fn validate(&self) -> Result<(), String> {
        match self {
            NodeKind::SendButtons(data) => {
                if data.buttons.is_empty() {
                    return Err("a button prompt needs at least one button".to_string());
                }
                if data.buttons.iter().any(|b| b.id.trim().is_empty()) {
                    return Err("every button needs a non-empty id".to_string());
                }
            }
            NodeKind::SendList(data) => {
                let rows: Vec<&ListRow> = data.sections.iter().flat_map(|s| &s.rows).collect();
                if rows.is_empty() {
                    return Err("a list prompt needs at least one row".to_string());
                }
                if rows.iter().any(|r| r.id.trim().is_empty()) {
                    return Err("every list row needs a non-empty id".to_string());
                }
            }
            NodeKind::ConditionalBranch(data) => {
                if data.branches.is_empty() {
                    return Err("a conditional branch needs at least one path".to_string());
                }
                if data.branches.iter().any(|b| b.label.trim().is_empty()) {
                    return Err("every branch path needs a label".to_string());
                }
            }
            NodeKind::Subflow(data) if data.subflow_id.trim().is_empty() => {
                return Err("subflowId must not be empty".to_string());
            }
            NodeKind::SaveVariable(data) if data.variable_name.trim().is_empty() => {
                return Err("variableName must not be empty".to_string());
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerData {
    #[serde(default)]
    pub event: Option<String>,
}

/// Response validation applied to a free-text reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Number,
    Email,
    Phone,
}

impl ResponseFormat {
    /// The regular expression a valid reply must match.
    pub fn pattern(&self) -> &'static str {
        match self {
            ResponseFormat::Number => r"^[0-9]+([.,][0-9]+)?$",
            ResponseFormat::Email => r"^[^@\s]+@[^@\s]+\.[^@\s]+$",
            ResponseFormat::Phone => r"^\+?[0-9 ()-]{7,20}$",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextData {
    pub message: String,
    #[serde(default)]
    pub wait_for_response: bool,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonOption {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonsData {
    pub message: String,
    pub buttons: Vec<ButtonOption>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub retry_invalid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSection {
    #[serde(default)]
    pub title: String,
    pub rows: Vec<ListRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListData {
    pub message: String,
    #[serde(default)]
    pub button_label: Option<String>,
    pub sections: Vec<ListSection>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub retry_invalid: bool,
}

impl ListData {
    pub fn rows(&self) -> impl Iterator<Item = &ListRow> {
        self.sections.iter().flat_map(|s| s.rows.iter())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayData {
    pub duration: u64,
    #[serde(default)]
    pub unit: DelayUnit,
}

impl DelayData {
    pub fn seconds(&self) -> u64 {
        let factor = match self.unit {
            DelayUnit::Seconds => 1,
            DelayUnit::Minutes => 60,
            DelayUnit::Hours => 3_600,
            DelayUnit::Days => 86_400,
        };
        self.duration.saturating_mul(factor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitData {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub logic: ConditionLogic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchPath {
    pub label: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub logic: ConditionLogic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchData {
    pub branches: Vec<BranchPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFieldsData {
    #[serde(default)]
    pub fields: Vec<FieldValue>,
    #[serde(default)]
    pub collection: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveVariableData {
    pub variable_name: String,
    #[serde(default)]
    pub value: Value,
}

/// What a loop iterates over: a fixed count or a list expression such as
/// `tg.order.items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoopValue {
    Count(u32),
    List(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopStartData {
    pub loop_value: LoopValue,
    #[serde(default)]
    pub loop_limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallData {
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubflowData {
    pub subflow_id: String,
    #[serde(default)]
    pub subflow_name: Option<String>,
}

fn default_alert_channel() -> String {
    "email".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertData {
    pub message: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_alert_channel")]
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityData {
    pub function: String,
    #[serde(default)]
    pub arguments: IndexMap<String, Value>,
}
