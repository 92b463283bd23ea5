use crate::config::CompilerConfig;
use crate::error::{CompileError, FlowError};
use crate::flow::{FlowDefinition, FlowLoader};
use crate::lookup::BranchLookup;
use crate::program::expr::var;
use crate::program::verify::verify;
use crate::program::{Program, Routine, Step};
use serde_json::json;

#[cfg(feature = "debug-tools")]
use {crate::program::DisplayProgram, std::fs};

mod context;
pub mod edges;
pub mod registry;
mod translators;

use context::{API_BASE, BRANCH_ID, BRANCH_NAME, CompileSession, Scope};
use edges::{FlowGraph, Port};
use registry::STATE_PARAM;

pub use context::{BRANCH_SETUP, LOOP_CONTINUE, NO_REACHABLE_ACTION};
pub use translators::{LOOP_INDEX, LOOP_ITEM, MAX_PROMPT_ATTEMPTS};

/// Lowers one flow into a program. Compiling is a pure function of the flow,
/// the branch record and the configuration.
pub struct Compiler {
    flow: FlowDefinition,
    lookup: Box<dyn BranchLookup>,
    config: CompilerConfig,
}

pub struct CompilerBuilder {
    flow: FlowDefinition,
    lookup: Box<dyn BranchLookup>,
    config: CompilerConfig,
}

impl CompilerBuilder {
    pub fn new(flow: FlowDefinition, lookup: impl BranchLookup + 'static) -> Self {
        Self {
            flow,
            lookup: Box::new(lookup),
            config: CompilerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Compiler {
        Compiler {
            flow: self.flow,
            lookup: self.lookup,
            config: self.config,
        }
    }
}

impl Compiler {
    pub fn builder(flow: FlowDefinition, lookup: impl BranchLookup + 'static) -> CompilerBuilder {
        CompilerBuilder::new(flow, lookup)
    }

    /// Convenience constructor for a designer JSON export and default settings.
    pub fn from_json(
        json: &str,
        lookup: impl BranchLookup + 'static,
    ) -> Result<Self, CompileError> {
        let flow = FlowLoader::new().load_str(json)?;
        Ok(Self::builder(flow, lookup).build())
    }

    pub fn flow(&self) -> &FlowDefinition {
        &self.flow
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile(&self) -> Result<Program, CompileError> {
        let flow = &self.flow;
        tracing::info!(
            flow_id = %flow.flow_id,
            nodes = flow.nodes.len(),
            edges = flow.edges.len(),
            "compiling flow"
        );

        let trigger = flow.trigger().ok_or_else(|| FlowError::MissingTrigger {
            flow_id: flow.flow_id.clone(),
        })?;
        let mut session = CompileSession::new(FlowGraph::new(flow), &self.config);
        let mut main = Routine::new(vec![STATE_PARAM.to_string()], Vec::new());

        match session.graph.next_node(&trigger.id, &Port::next_step()) {
            None => {
                tracing::warn!(flow_id = %flow.flow_id, "trigger is not connected to any action");
                main.steps.push(Step::returns(
                    "no_reachable_action",
                    json!(NO_REACHABLE_ACTION),
                ));
            }
            Some(first) => {
                let branch = self.lookup.lookup_branch(&flow.branch_id)?;
                tracing::debug!(
                    branch_id = %flow.branch_id,
                    branch = %branch.name,
                    "branch resolved"
                );

                let mut scope = Scope::root();
                scope.registry.bind(BRANCH_ID, json!(flow.branch_id));
                scope.registry.bind(BRANCH_NAME, json!(branch.name));
                main.steps.push(session.branch_setup(&flow.title, &scope));
                scope.registry.bind_variable(API_BASE);

                // Direct children of the trigger may be read by routines
                // generated before they are bound.
                let children: Vec<_> = session
                    .graph
                    .outgoing(&trigger.id)
                    .iter()
                    .filter_map(|edge| session.graph.node(&edge.target))
                    .filter(|child| child.kind.produces_result())
                    .collect();
                for child in children {
                    let names = session.reserve_names(child);
                    scope.registry.reserve(&names.var);
                }

                main.steps.extend(session.translate_node(first, &mut scope)?);
                main.steps.push(session.clear_session_step("clear_session"));
                main.steps.push(Step::returns("finish", var(STATE_PARAM)));
            }
        }

        let program = session.into_program(main);
        verify(&program)?;

        #[cfg(feature = "debug-tools")]
        self.write_debug_file(&program);

        tracing::info!(
            flow_id = %flow.flow_id,
            routines = program.len(),
            steps = program.step_count(),
            "flow compiled"
        );
        Ok(program)
    }

    #[cfg(feature = "debug-tools")]
    fn write_debug_file(&self, program: &Program) {
        let path = format!("tmp/{}_tree.txt", self.flow.program_name());
        let display = DisplayProgram { program };
        let written = fs::create_dir_all("tmp").and_then(|_| fs::write(&path, display.to_string()));
        if let Err(e) = written {
            tracing::warn!(path = %path, error = %e, "could not write debug tree");
        }
    }
}
