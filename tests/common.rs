//! Common test utilities for building flows and inspecting compiled programs.
use keiro::prelude::*;
use keiro::program::CallStep;
use serde_json::{Value, json};

pub const BRANCH_ID: &str = "branch-1";
pub const BRANCH_NAME: &str = "Downtown";

/// The branch directory used by every fixture flow.
#[allow(dead_code)]
pub fn branches() -> StaticBranchLookup {
    StaticBranchLookup::new().with_branch(BRANCH_ID, BRANCH_NAME)
}

/// Builds designer-format flow JSON. Every flow starts with a trigger node
/// whose id is `trigger`.
#[derive(Debug, Clone)]
pub struct FlowFixture {
    nodes: Vec<Value>,
    edges: Vec<Value>,
}

#[allow(dead_code)]
impl FlowFixture {
    pub fn new() -> Self {
        Self {
            nodes: vec![json!({ "id": "trigger", "type": "trigger", "data": { "title": "Start" } })],
            edges: Vec::new(),
        }
    }

    pub fn node(mut self, id: &str, node_type: &str, data: Value) -> Self {
        self.nodes
            .push(json!({ "id": id, "type": node_type, "data": data }));
        self
    }

    pub fn edge(mut self, source: &str, handle: &str, target: &str) -> Self {
        let id = format!("e{}", self.edges.len());
        self.edges.push(json!({
            "id": id,
            "source": source,
            "target": target,
            "sourceHandle": handle,
        }));
        self
    }

    /// Shorthand for a `next-step` edge.
    pub fn then(self, source: &str, target: &str) -> Self {
        self.edge(source, "next-step", target)
    }

    pub fn to_json(&self) -> String {
        json!({
            "flowId": "flow-1",
            "title": "Fixture flow",
            "organisationId": "acme",
            "branchId": BRANCH_ID,
            "nodes": self.nodes,
            "edges": self.edges,
        })
        .to_string()
    }

    pub fn load(&self) -> FlowDefinition {
        FlowLoader::new()
            .load_str(&self.to_json())
            .expect("fixture flow should load")
    }

    pub fn compile(&self) -> std::result::Result<Program, CompileError> {
        Compiler::builder(self.load(), branches()).build().compile()
    }

    pub fn compile_with(&self, config: CompilerConfig) -> std::result::Result<Program, CompileError> {
        Compiler::builder(self.load(), branches())
            .with_config(config)
            .build()
            .compile()
    }

    pub fn compile_ok(&self) -> Program {
        self.compile().expect("fixture flow should compile")
    }
}

#[allow(dead_code)]
pub fn text(title: &str, message: &str) -> Value {
    json!({ "title": title, "message": message })
}

#[allow(dead_code)]
pub fn prompt(title: &str, message: &str) -> Value {
    json!({ "title": title, "message": message, "waitForResponse": true })
}

// --- Program walkers ---

/// Every step of a routine, nested ones included, in program order.
#[allow(dead_code)]
pub fn all_steps<'a>(routine: &'a Routine) -> Vec<&'a Step> {
    let mut steps = Vec::new();
    routine.visit(&mut |step| steps.push(step));
    steps
}

/// Looks up a step by name in the given routine.
#[allow(dead_code)]
pub fn find_step<'a>(routine: &'a Routine, name: &str) -> Option<&'a Step> {
    all_steps(routine).into_iter().find(|s| s.name == name)
}

/// Every call step of the program targeting `target`.
#[allow(dead_code)]
pub fn calls_to<'a>(program: &'a Program, target: &str) -> Vec<&'a CallStep> {
    program
        .routines()
        .flat_map(|(_, routine)| all_steps(routine))
        .filter_map(Step::as_call)
        .filter(|call| call.target == target)
        .collect()
}

/// Names of the program's routines, in order.
#[allow(dead_code)]
pub fn routine_names(program: &Program) -> Vec<String> {
    program.routines().map(|(name, _)| name.to_string()).collect()
}

#[allow(dead_code)]
pub fn top_level_names(routine: &Routine) -> Vec<&str> {
    routine.steps.iter().map(|s| s.name.as_str()).collect()
}

/// The value of a `return` step.
#[allow(dead_code)]
pub fn returned(step: &Step) -> Option<&Value> {
    match &step.kind {
        StepKind::Return(value) => Some(value),
        _ => None,
    }
}
