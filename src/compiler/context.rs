use super::edges::{FlowGraph, Port};
use super::registry::{ArgsRegistry, STATE_PARAM};
use crate::config::CompilerConfig;
use crate::flow::Node;
use crate::naming::sanitize_identifier;
use crate::program::expr::{expr, quote, var};
use crate::program::primitives::{GET_ENV, HTTP_POST, LOG};
use crate::program::{CallStep, Program, Routine, Step};
use ahash::AHashMap;
use indexmap::IndexMap;
use serde_json::{Value, json};

/// Returned when the trigger leads nowhere, or from a terminal node outside a loop.
pub const NO_REACHABLE_ACTION: &str = "No reachable action";
/// Returned by a loop body, including from terminal nodes inside it.
pub const LOOP_CONTINUE: &str = "loop_continue";

pub const API_BASE: &str = "api_base";
pub const BRANCH_ID: &str = "branch_id";
pub const BRANCH_NAME: &str = "branch_name";
pub const BRANCH_SETUP: &str = "branch_setup";

/// Translation context passed by argument through the recursive walk.
///
/// Linear continuations share the caller's scope; every generated routine
/// gets its own copy via `enter_routine`, so bindings made on one branch
/// never leak into a sibling.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    pub registry: ArgsRegistry,
    pub inside_loop: bool,
    /// The start node of the loop body being translated.
    pub loop_start: Option<String>,
    /// The end marker of the loop body being translated; the walk stops there.
    pub loop_end: Option<String>,
    /// Node ids on the current translation path, for cycle detection.
    pub path: Vec<String>,
}

impl Scope {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn enter_routine(&self) -> Self {
        Self {
            registry: self.registry.rebased(),
            inside_loop: self.inside_loop,
            loop_start: self.loop_start.clone(),
            loop_end: self.loop_end.clone(),
            path: self.path.clone(),
        }
    }

    pub fn enter_loop(&self, start_id: &str, end_id: &str) -> Self {
        let mut scope = self.enter_routine();
        scope.inside_loop = true;
        scope.loop_start = Some(start_id.to_string());
        scope.loop_end = Some(end_id.to_string());
        scope
    }
}

/// Names generated for one visit of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NodeNames {
    pub seq: u32,
    /// Variable holding the node's result; also names the node's block.
    pub var: String,
    prefix: &'static str,
}

impl NodeNames {
    /// A step or helper variable owned by the node.
    pub fn step(&self, suffix: &str) -> String {
        format!("{}_{}", self.var, suffix)
    }

    /// A routine generated on behalf of the node.
    pub fn routine(&self, slug: &str) -> String {
        format!("{}_{}_{}", self.prefix, self.seq, slug)
    }
}

/// Sequence-based name generation: the same flow always yields the same names.
#[derive(Debug, Default)]
pub(crate) struct NameAllocator {
    next: u32,
    reserved: AHashMap<String, NodeNames>,
}

impl NameAllocator {
    fn allocate(&mut self, node: &Node) -> NodeNames {
        self.next += 1;
        let prefix = node.kind.prefix();
        let base = match sanitize_identifier(&node.title) {
            title if title.is_empty() => prefix.to_string(),
            title => title,
        };
        NodeNames {
            seq: self.next,
            var: format!("{}_{}", base, self.next),
            prefix,
        }
    }

    /// Fixes the names of the node's next visit ahead of time.
    pub fn reserve(&mut self, node: &Node) -> NodeNames {
        if let Some(names) = self.reserved.get(&node.id) {
            return names.clone();
        }
        let names = self.allocate(node);
        self.reserved.insert(node.id.clone(), names.clone());
        names
    }

    pub fn for_node(&mut self, node: &Node) -> NodeNames {
        self.reserved
            .remove(&node.id)
            .unwrap_or_else(|| self.allocate(node))
    }
}

/// Mutable state of one compilation: the routines emitted so far and the
/// name allocator, next to the read-only graph and configuration.
pub(crate) struct CompileSession<'a> {
    pub graph: FlowGraph<'a>,
    pub config: &'a CompilerConfig,
    routines: IndexMap<String, Routine>,
    names: NameAllocator,
}

impl<'a> CompileSession<'a> {
    pub fn new(graph: FlowGraph<'a>, config: &'a CompilerConfig) -> Self {
        Self {
            graph,
            config,
            routines: IndexMap::new(),
            names: NameAllocator::default(),
        }
    }

    pub fn names_for(&mut self, node: &Node) -> NodeNames {
        self.names.for_node(node)
    }

    pub fn reserve_names(&mut self, node: &Node) -> NodeNames {
        self.names.reserve(node)
    }

    pub fn register(&mut self, name: String, routine: Routine) {
        tracing::debug!(
            routine = %name,
            params = routine.params.len(),
            steps = routine.steps.len(),
            "registering routine"
        );
        self.routines.insert(name, routine);
    }

    /// Assembles the program with `main` first.
    pub fn into_program(self, main: Routine) -> Program {
        let mut routines = IndexMap::with_capacity(self.routines.len() + 1);
        routines.insert(Program::MAIN.to_string(), main);
        routines.extend(self.routines);
        Program::from_routines(routines)
    }

    /// `${api_base + "<path>"}`
    pub fn endpoint(&self, path: &str) -> Value {
        expr(format!("{} + {}", API_BASE, quote(path)))
    }

    pub fn http_post(
        &self,
        name: impl Into<String>,
        path: &str,
        body: Value,
        result: Option<String>,
    ) -> Step {
        let mut call = CallStep::new(HTTP_POST)
            .with_arg("url", self.endpoint(path))
            .with_arg("body", body)
            .with_retry(self.config.http_retry.clone());
        if let Some(result) = result {
            call = call.with_result(result);
        }
        Step::call(name, call)
    }

    pub fn clear_session_step(&self, name: impl Into<String>) -> Step {
        self.http_post(
            name,
            "/v1/sessions/clear",
            json!({ "session_id": expr("tg.session_id") }),
            None,
        )
    }

    /// Calls `routine` with every variable of `scope`.
    pub fn dispatch(
        &self,
        step_name: String,
        routine: &str,
        names: &NodeNames,
        scope: &Scope,
    ) -> Step {
        Step::call(
            step_name,
            CallStep::new(routine)
                .with_args(scope.registry.call_args())
                .with_result(names.step("outcome")),
        )
    }

    /// Registers the routine that resolves the API base URL and logs the run
    /// start, and returns the main step calling it.
    pub fn branch_setup(&mut self, flow_title: &str, scope: &Scope) -> Step {
        let steps = vec![
            Step::call(
                "read_api_base",
                CallStep::new(GET_ENV)
                    .with_arg("name", json!(self.config.base_url_env))
                    .with_result(API_BASE),
            ),
            Step::call(
                "log_start",
                CallStep::new(LOG)
                    .with_arg(
                        "text",
                        expr(format!(
                            "{} + {}",
                            quote(&format!("Flow '{}' started for branch ", flow_title)),
                            BRANCH_NAME
                        )),
                    )
                    .with_arg("severity", json!("INFO")),
            ),
            Step::returns("finish", var(API_BASE)),
        ];
        self.register(
            BRANCH_SETUP.to_string(),
            Routine::new(scope.registry.params(), steps),
        );
        Step::call(
            BRANCH_SETUP,
            CallStep::new(BRANCH_SETUP)
                .with_args(scope.registry.call_args())
                .with_result(API_BASE),
        )
    }

    /// Compiles the node behind `port` into its own routine and returns the
    /// routine's name. An unconnected port yields a stub routine.
    pub fn continuation_routine(
        &mut self,
        node: &'a Node,
        names: &NodeNames,
        port: &Port,
        slug: &str,
        label: &str,
        scope: &Scope,
    ) -> Result<String, crate::error::CompileError> {
        let routine_name = names.routine(slug);
        let mut child = scope.enter_routine();
        let params = child.registry.params();

        let steps = match self.graph.next_node(&node.id, port) {
            Some(next) => {
                let mut steps = self.translate_node(next, &mut child)?;
                steps.push(Step::returns("finish", var(STATE_PARAM)));
                steps
            }
            None => {
                tracing::warn!(
                    node_id = %node.id,
                    port = %port.key(),
                    routine = %routine_name,
                    "port is not connected, emitting stub routine"
                );
                vec![Step::returns(
                    "no_further_steps",
                    json!(format!("No further steps defined for `{}`", label)),
                )]
            }
        };

        self.register(routine_name.clone(), Routine::new(params, steps));
        Ok(routine_name)
    }
}
