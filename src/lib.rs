//! # Keiro - Flow Compiler for Messaging Automations
//!
//! **Keiro** lowers the node graph drawn in a marketing-automation designer
//! into a program for a declarative, step-based workflow engine. A program is
//! a set of named routines; each routine is a list of named steps (`call`,
//! `assign`, `switch`, `block`, `for`, `raise`, `return`), serialized in the
//! engine's JSON wire format.
//!
//! ## Core Workflow
//!
//! 1.  **Load the flow**: Parse the designer export with `FlowLoader`, or implement
//!     `IntoFlow` for your own format. Node payloads are validated here, once.
//! 2.  **Compile**: Use `Compiler::builder` with a `BranchLookup` and an optional
//!     `CompilerConfig`. The compiler walks the graph depth-first from the trigger,
//!     inlining linear chains and emitting one routine per branch continuation
//!     and per loop body.
//! 3.  **Submit**: Hand the verified `Program` to a `ProgramSink`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let json = std::fs::read_to_string("flows/welcome.json")?;
//!     let flow = FlowLoader::new().load_str(&json)?;
//!
//!     let branches = StaticBranchLookup::new().with_branch(&flow.branch_id, "Downtown");
//!     let name = flow.program_name();
//!
//!     let compiler = Compiler::builder(flow, branches)
//!         .with_config(CompilerConfig::default())
//!         .build();
//!     let program = compiler.compile()?;
//!
//!     println!("{}", DisplayProgram { program: &program });
//!
//!     let handle = DirectorySink::new("out").submit(&program, &name)?;
//!     println!("Program written to {}", handle.location);
//!     Ok(())
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod flow;
pub mod lookup;
pub mod naming;
pub mod prelude;
pub mod program;
pub mod sink;
