use thiserror::Error;

/// Errors raised while ingesting a designer-authored flow into a `FlowDefinition`.
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    #[error("Failed to parse flow JSON: {0}")]
    JsonParseError(String),

    #[error("Flow '{flow_id}' has no trigger node")]
    MissingTrigger { flow_id: String },

    #[error("Flow '{flow_id}' has {count} trigger nodes, exactly one is required")]
    MultipleTriggers { flow_id: String, count: usize },

    #[error("Node id '{0}' is used by more than one node")]
    DuplicateNodeId(String),

    #[error("Node '{node_id}' of type '{type_name}' has invalid data: {message}")]
    InvalidNodeData {
        node_id: String,
        type_name: String,
        message: String,
    },

    #[error("Edge '{edge_id}' references node '{missing_node_id}', which is not part of the flow")]
    DanglingEdge {
        edge_id: String,
        missing_node_id: String,
    },
}

/// Errors raised while lowering a `FlowDefinition` into a `Program`.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("Branch lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("Node '{node_id}' is reached again from its own continuation outside of a loop")]
    CycleDetected { node_id: String },

    #[error("Loop '{loop_id}' contains the nested loop '{nested_id}', which is not supported")]
    NestedLoop { loop_id: String, nested_id: String },

    #[error("Loop '{loop_id}' never reaches a loop end marker")]
    UnterminatedLoop { loop_id: String },

    #[error("Generated program is invalid: {0}")]
    Program(#[from] ProgramError),
}

/// Structural defects found by the program verifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("Routine '{routine}' calls '{target}', which is not defined in the program")]
    DanglingCall { routine: String, target: String },

    #[error("Routine '{routine}' jumps to unknown step '{target}'")]
    UnknownJumpTarget { routine: String, target: String },

    #[error("Routine '{routine}' defines the step '{step}' more than once")]
    DuplicateStepName { routine: String, step: String },

    #[error("Program has no 'main' routine")]
    MissingMain,
}

/// Errors returned by a `BranchLookup` implementation.
#[derive(Error, Debug, Clone)]
pub enum LookupError {
    #[error("Branch '{0}' not found")]
    BranchNotFound(String),

    #[error("Branch store error: {0}")]
    Store(String),
}

/// Errors returned by a `ProgramSink` implementation.
#[derive(Error, Debug, Clone)]
pub enum SinkError {
    #[error("Failed to serialize program '{name}': {message}")]
    Serialization { name: String, message: String },

    #[error("Failed to write program '{name}': {message}")]
    Io { name: String, message: String },
}
