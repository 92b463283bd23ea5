use crate::compiler::context::{CompileSession, LOOP_CONTINUE, Scope};
use crate::compiler::edges::Port;
use crate::error::CompileError;
use crate::flow::{LoopStartData, LoopValue, Node, NodeKind};
use crate::program::expr::{expr, expression_body, var};
use crate::program::{CallStep, ForLoop, ForSource, Routine, Step, SwitchCase};
use ahash::AHashSet;
use serde_json::{Value, json};

pub const LOOP_ITEM: &str = "loop_item";
pub const LOOP_INDEX: &str = "loop_index";

/// The nodes between a loop start and its end marker.
#[derive(Debug)]
pub(crate) struct LoopChain<'a> {
    /// Body nodes in walk order; the first one is entered from the start node.
    pub body: Vec<&'a Node>,
    pub end: &'a Node,
}

struct BodyWalk<'a> {
    start: &'a Node,
    body: Vec<&'a Node>,
    end: Option<&'a Node>,
    visited: AHashSet<&'a str>,
    path: Vec<&'a str>,
}

impl<'a> CompileSession<'a> {
    /// Walks every port the translators follow, starting at the body port of
    /// `start`. The first end marker reached closes the loop.
    pub(crate) fn collect_loop_chain(
        &self,
        start: &'a Node,
    ) -> Result<LoopChain<'a>, CompileError> {
        let mut walk = BodyWalk {
            start,
            body: Vec::new(),
            end: None,
            visited: AHashSet::new(),
            path: Vec::new(),
        };
        if let Some(first) = self.graph.next_node(&start.id, &Port::next_step()) {
            self.walk_loop_body(first, &mut walk)?;
        }
        match walk.end {
            Some(end) => Ok(LoopChain {
                body: walk.body,
                end,
            }),
            None => Err(CompileError::UnterminatedLoop {
                loop_id: start.id.clone(),
            }),
        }
    }

    fn walk_loop_body(&self, node: &'a Node, walk: &mut BodyWalk<'a>) -> Result<(), CompileError> {
        if node.id == walk.start.id || walk.path.contains(&node.id.as_str()) {
            return Err(CompileError::CycleDetected {
                node_id: node.id.clone(),
            });
        }
        // Converging paths share their tail.
        if !walk.visited.insert(node.id.as_str()) {
            return Ok(());
        }
        match node.kind {
            NodeKind::LoopEnd => {
                match walk.end {
                    None => walk.end = Some(node),
                    Some(end) => tracing::warn!(
                        loop_id = %walk.start.id,
                        end = %end.id,
                        ignored = %node.id,
                        "loop body reaches a second end marker"
                    ),
                }
                return Ok(());
            }
            NodeKind::LoopStart(_) => {
                return Err(CompileError::NestedLoop {
                    loop_id: walk.start.id.clone(),
                    nested_id: node.id.clone(),
                });
            }
            _ => walk.body.push(node),
        }

        walk.path.push(node.id.as_str());
        for port in Port::followed_by(&node.kind) {
            if let Some(next) = self.graph.next_node(&node.id, &port) {
                self.walk_loop_body(next, walk)?;
            }
        }
        walk.path.pop();
        Ok(())
    }

    pub(super) fn translate_loop(
        &mut self,
        node: &'a Node,
        data: &LoopStartData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        if let Some(outer) = &scope.loop_start {
            return Err(CompileError::NestedLoop {
                loop_id: outer.clone(),
                nested_id: node.id.clone(),
            });
        }
        let names = self.names_for(node);
        let chain = self.collect_loop_chain(node)?;
        tracing::debug!(
            node_id = %node.id,
            body_len = chain.body.len(),
            end = %chain.end.id,
            "lowering loop"
        );
        let limit = data.loop_limit.unwrap_or(self.config.default_loop_limit);

        // Body routine
        let body_routine = names.routine("body");
        let mut body_scope = scope.enter_loop(&node.id, &chain.end.id);
        body_scope.registry.bind_variable(LOOP_ITEM);
        body_scope.registry.bind_variable(LOOP_INDEX);
        let params = body_scope.registry.params();
        let mut body_steps = match chain.body.first().copied() {
            Some(first) => self.translate_node(first, &mut body_scope)?,
            None => Vec::new(),
        };
        body_steps.push(Step::returns("finish", json!(LOOP_CONTINUE)));
        self.register(body_routine.clone(), Routine::new(params, body_steps));

        // Host loop
        let limit_var = names.step("limit");
        let mut setup = vec![(limit_var.clone(), json!(limit))];
        let mut args = scope.registry.call_args();
        args.insert(LOOP_ITEM.to_string(), var(LOOP_ITEM));

        let (source, index, mut iteration) = match &data.loop_value {
            LoopValue::List(list) => {
                let values = names.step("values");
                setup.push((values.clone(), list_expression(list)));
                args.insert(LOOP_INDEX.to_string(), var(LOOP_INDEX));
                let guard = Step::switch(
                    names.step("guard"),
                    vec![
                        SwitchCase::when(expr(format!("{} >= {}", LOOP_INDEX, limit_var)))
                            .then_next("break"),
                    ],
                );
                (ForSource::In(var(&values)), Some(LOOP_INDEX.to_string()), vec![guard])
            }
            LoopValue::Count(count) => {
                args.insert(LOOP_INDEX.to_string(), expr(format!("{} - 1", LOOP_ITEM)));
                (ForSource::Range(1, (*count).min(limit)), None, Vec::new())
            }
        };
        iteration.push(Step::call(
            names.step("iteration"),
            CallStep::new(&body_routine)
                .with_args(args)
                .with_result(names.step("outcome")),
        ));

        let mut steps = vec![
            Step::assign(names.step("setup"), setup),
            Step::for_each(
                names.step("iterate"),
                ForLoop {
                    value: LOOP_ITEM.to_string(),
                    index,
                    source,
                    steps: iteration,
                },
            ),
        ];
        steps.extend(self.translate_next(chain.end, &Port::next_step(), scope)?);
        Ok(vec![Step::block(names.var, steps)])
    }
}

/// Accepts both `tg.items` and `${tg.items}`.
fn list_expression(list: &str) -> Value {
    let value = Value::String(list.trim().to_string());
    match expression_body(&value) {
        Some(_) => value,
        None => expr(list.trim()),
    }
}
