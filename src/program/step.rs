use crate::config::RetryPolicy;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

/// One named instruction of a routine.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// Invoke a routine of the program or an engine primitive.
    Call(CallStep),
    /// Set variables, in order.
    Assign(Vec<(String, Value)>),
    /// First case whose condition holds wins. A case without condition always holds.
    Switch(Vec<SwitchCase>),
    /// A named, nested step list.
    Block(Vec<Step>),
    /// The engine's iteration primitive.
    For(ForLoop),
    Raise(Value),
    Return(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallStep {
    pub target: String,
    pub args: IndexMap<String, Value>,
    pub result: Option<String>,
    pub retry: Option<RetryPolicy>,
}

impl CallStep {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            args: IndexMap::new(),
            result: None,
            retry: None,
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    pub fn with_args(mut self, args: IndexMap<String, Value>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn with_result(mut self, variable: impl Into<String>) -> Self {
        self.result = Some(variable.into());
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SwitchCase {
    pub condition: Option<Value>,
    pub steps: Vec<Step>,
    pub next: Option<String>,
}

impl SwitchCase {
    pub fn when(condition: Value) -> Self {
        Self {
            condition: Some(condition),
            ..Self::default()
        }
    }

    /// The unconditional fallthrough case.
    pub fn otherwise() -> Self {
        Self::default()
    }

    pub fn then_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn then_next(mut self, target: impl Into<String>) -> Self {
        self.next = Some(target.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub value: String,
    pub index: Option<String>,
    pub source: ForSource,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForSource {
    /// Iterate over the elements of a list expression.
    In(Value),
    /// Iterate over an inclusive integer range.
    Range(u32, u32),
}

impl Step {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn call(name: impl Into<String>, call: CallStep) -> Self {
        Self::new(name, StepKind::Call(call))
    }

    pub fn assign(name: impl Into<String>, bindings: Vec<(String, Value)>) -> Self {
        Self::new(name, StepKind::Assign(bindings))
    }

    pub fn switch(name: impl Into<String>, cases: Vec<SwitchCase>) -> Self {
        Self::new(name, StepKind::Switch(cases))
    }

    pub fn block(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self::new(name, StepKind::Block(steps))
    }

    pub fn for_each(name: impl Into<String>, body: ForLoop) -> Self {
        Self::new(name, StepKind::For(body))
    }

    pub fn raise(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, StepKind::Raise(value))
    }

    pub fn returns(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, StepKind::Return(value))
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            StepKind::Call(_) => "call",
            StepKind::Assign(_) => "assign",
            StepKind::Switch(_) => "switch",
            StepKind::Block(_) => "block",
            StepKind::For(_) => "for",
            StepKind::Raise(_) => "raise",
            StepKind::Return(_) => "return",
        }
    }

    pub fn as_call(&self) -> Option<&CallStep> {
        match &self.kind {
            StepKind::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Steps nested directly inside this one, in program order.
    pub fn children(&self) -> Vec<&Step> {
        match &self.kind {
            StepKind::Block(steps) => steps.iter().collect(),
            StepKind::Switch(cases) => cases.iter().flat_map(|c| &c.steps).collect(),
            StepKind::For(body) => body.steps.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Visits this step and every nested step, depth-first in program order.
    pub fn visit<'s>(&'s self, f: &mut impl FnMut(&'s Step)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }
}

// --- Wire format ---
// Each step serializes as a single-key map `{ name: body }`.

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &StepBody(&self.kind))?;
        map.end()
    }
}

struct StepBody<'a>(&'a StepKind);

impl Serialize for StepBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self.0 {
            StepKind::Call(call) => {
                map.serialize_entry("call", &call.target)?;
                if !call.args.is_empty() {
                    map.serialize_entry("args", &call.args)?;
                }
                if let Some(result) = &call.result {
                    map.serialize_entry("result", result)?;
                }
                if let Some(policy) = &call.retry {
                    map.serialize_entry("retry", &RetrySpec(policy))?;
                }
            }
            StepKind::Assign(bindings) => {
                let list: Vec<Binding<'_>> = bindings
                    .iter()
                    .map(|(name, value)| Binding(name, value))
                    .collect();
                map.serialize_entry("assign", &list)?;
            }
            StepKind::Switch(cases) => map.serialize_entry("switch", cases)?,
            StepKind::Block(steps) => map.serialize_entry("steps", steps)?,
            StepKind::For(body) => map.serialize_entry("for", body)?,
            StepKind::Raise(value) => map.serialize_entry("raise", value)?,
            StepKind::Return(value) => map.serialize_entry("return", value)?,
        }
        map.end()
    }
}

struct Binding<'a>(&'a str, &'a Value);

impl Serialize for Binding<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0, self.1)?;
        map.end()
    }
}

struct RetrySpec<'a>(&'a RetryPolicy);

impl Serialize for RetrySpec<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let policy = self.0;
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("predicate", "${http.default_retry_predicate}")?;
        map.serialize_entry("max_retries", &policy.max_retries)?;
        map.serialize_entry(
            "backoff",
            &serde_json::json!({
                "initial_delay": policy.initial_delay_secs,
                "max_delay": policy.max_delay_secs,
                "multiplier": policy.multiplier,
            }),
        )?;
        map.end()
    }
}

impl Serialize for SwitchCase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match &self.condition {
            Some(condition) => map.serialize_entry("condition", condition)?,
            None => map.serialize_entry("condition", &true)?,
        }
        if !self.steps.is_empty() {
            map.serialize_entry("steps", &self.steps)?;
        }
        if let Some(next) = &self.next {
            map.serialize_entry("next", next)?;
        }
        map.end()
    }
}

impl Serialize for ForLoop {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("value", &self.value)?;
        if let Some(index) = &self.index {
            map.serialize_entry("index", index)?;
        }
        match &self.source {
            ForSource::In(list) => map.serialize_entry("in", list)?,
            ForSource::Range(from, to) => map.serialize_entry("range", &[from, to])?,
        }
        map.serialize_entry("steps", &self.steps)?;
        map.end()
    }
}
