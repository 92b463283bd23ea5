//! Prelude module for convenient imports
//!
//! Re-exports the types needed to load, compile and submit a flow.
//!
//! # Example
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/flow.json")?;
//! let branches = StaticBranchLookup::from_file("path/to/branches.json")?;
//!
//! let program = Compiler::from_json(&json, branches)?.compile()?;
//! println!("{}", program.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```

// Compilation
pub use crate::compiler::{Compiler, CompilerBuilder};
pub use crate::config::{CompilerConfig, RetryPolicy};

// Flow model
pub use crate::flow::{Edge, FlowDefinition, FlowLoader, IntoFlow, Node, NodeKind};

// Program model
pub use crate::program::{DisplayProgram, Program, Routine, Step, StepKind};

// Collaborators
pub use crate::lookup::{Branch, BranchLookup, StaticBranchLookup};
pub use crate::sink::{DirectorySink, ProgramSink, SubmissionHandle};

// Error types
pub use crate::error::{CompileError, FlowError, LookupError, ProgramError, SinkError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
