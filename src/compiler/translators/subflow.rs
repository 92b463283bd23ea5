use crate::compiler::context::{API_BASE, BRANCH_ID, CompileSession, NodeNames, Scope};
use crate::compiler::edges::{FAILURE, Port};
use crate::error::CompileError;
use crate::flow::{Node, SubflowData};
use crate::program::expr::{expr, quote, var};
use crate::program::primitives::{GET_ENV, HTTP_DELETE, HTTP_GET, SLEEP};
use crate::program::{CallStep, Step, SwitchCase};
use serde_json::{Map, Value, json};

/// Why a subflow run did not produce a result.
#[derive(Debug, Clone, Copy)]
enum Abort {
    Failed,
    TimedOut,
}

impl Abort {
    fn label(self) -> &'static str {
        match self {
            Abort::Failed => "failed",
            Abort::TimedOut => "timeout",
        }
    }

    fn code(self) -> &'static str {
        match self {
            Abort::Failed => "SUBFLOW_FAILED",
            Abort::TimedOut => "SUBFLOW_TIMEOUT",
        }
    }
}

impl<'a> CompileSession<'a> {
    /// Starts the child flow, polls its execution document until it settles,
    /// then decodes the result into the node variable.
    pub(super) fn translate_subflow(
        &mut self,
        node: &'a Node,
        data: &SubflowData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let caller = names.step("caller");
        let started = names.step("started");
        let status = names.step("status");
        let polls = names.step("polls");
        let poll_step = names.step("poll");
        let collect_step = names.step("collect");

        let forwarded: Map<String, Value> = scope.registry.call_args().into_iter().collect();
        let execution = format!("{}.body.execution_id", started);
        let document = expr(format!(
            "{} + {} + {}",
            API_BASE,
            quote("/v1/subflows/"),
            execution
        ));
        let retry = self.config.http_retry.clone();

        let mut steps = vec![
            Step::call(
                names.step("read_caller"),
                CallStep::new(GET_ENV)
                    .with_arg("name", json!(self.config.execution_id_env))
                    .with_result(&caller),
            ),
            self.http_post(
                names.step("start"),
                "/v1/subflows/start",
                json!({
                    "branch_id": scope.registry.reference(BRANCH_ID),
                    "flow_id": data.subflow_id,
                    "program": data.subflow_name.as_deref().unwrap_or(&data.subflow_id),
                    "caller_execution_id": var(&caller),
                    "args": forwarded,
                }),
                Some(started.clone()),
            ),
            Step::assign(names.step("poll_init"), vec![(polls.clone(), json!(0))]),
            Step::call(
                poll_step.clone(),
                CallStep::new(HTTP_GET)
                    .with_arg("url", document.clone())
                    .with_result(&status)
                    .with_retry(retry.clone()),
            ),
        ];

        let failure_routine = match self.graph.find_edge(&node.id, &Port::Named(FAILURE)) {
            Some(_) => Some(self.continuation_routine(
                node,
                &names,
                &Port::Named(FAILURE),
                "failure",
                FAILURE,
                scope,
            )?),
            None => None,
        };

        let state = format!("{}.body.status", status);
        steps.push(Step::switch(
            names.step("check"),
            vec![
                SwitchCase::when(expr(format!("{} == {}", state, quote("completed"))))
                    .then_next(collect_step.clone()),
                SwitchCase::when(expr(format!("{} == {}", state, quote("failed")))).then_steps(
                    self.abort_steps(
                        Abort::Failed,
                        &names,
                        failure_routine.as_deref(),
                        data,
                        scope,
                    ),
                ),
                SwitchCase::when(expr(format!(
                    "{} >= {}",
                    polls, self.config.subflow_max_polls
                )))
                .then_steps(self.abort_steps(
                    Abort::TimedOut,
                    &names,
                    failure_routine.as_deref(),
                    data,
                    scope,
                )),
                SwitchCase::otherwise()
                    .then_steps(vec![
                        Step::assign(
                            names.step("poll_count"),
                            vec![(polls.clone(), expr(format!("{} + 1", polls)))],
                        ),
                        Step::call(
                            names.step("wait"),
                            CallStep::new(SLEEP)
                                .with_arg("seconds", json!(self.config.subflow_poll_interval_secs)),
                        ),
                    ])
                    .then_next(poll_step),
            ],
        ));

        steps.push(Step::assign(
            collect_step,
            vec![(
                names.var.clone(),
                expr(format!("json.decode({}.body.result)", status)),
            )],
        ));
        scope.registry.bind_variable(&names.var);
        steps.push(Step::call(
            names.step("release"),
            CallStep::new(HTTP_DELETE)
                .with_arg("url", document)
                .with_retry(retry),
        ));
        steps.push(self.clear_session_step(names.step("clear_session")));
        steps.extend(self.translate_next(node, &Port::next_step(), scope)?);
        Ok(vec![Step::block(names.var, steps)])
    }

    /// Hands over to the failure routine when one is connected, otherwise
    /// raises a typed error. Either way the run does not continue past the
    /// subflow.
    fn abort_steps(
        &self,
        abort: Abort,
        names: &NodeNames,
        failure_routine: Option<&str>,
        data: &SubflowData,
        scope: &Scope,
    ) -> Vec<Step> {
        let label = abort.label();
        match failure_routine {
            Some(routine) => vec![
                self.dispatch(names.step(&format!("{}_dispatch", label)), routine, names, scope),
                self.clear_session_step(names.step(&format!("{}_clear_session", label))),
                Step::returns(
                    names.step(&format!("{}_return", label)),
                    var(&names.step("outcome")),
                ),
            ],
            None => vec![Step::raise(
                names.step(&format!("{}_raise", label)),
                json!({
                    "code": abort.code(),
                    "flow_id": data.subflow_id,
                    "execution_id": expr(format!("{}.body.execution_id", names.step("started"))),
                    "polls": var(&names.step("polls")),
                }),
            )],
        }
    }
}
