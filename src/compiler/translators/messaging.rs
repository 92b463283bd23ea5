use crate::compiler::context::{BRANCH_ID, CompileSession, NodeNames, Scope};
use crate::compiler::edges::{NO_RESPONSE, Port, YES};
use crate::error::CompileError;
use crate::flow::{ButtonsData, ListData, Node, ResponseFormat, SendTextData};
use crate::program::expr::{expr, quote};
use crate::program::primitives::AWAIT_CALLBACK;
use crate::program::{CallStep, Step, SwitchCase};
use serde_json::{Value, json};

/// Upper bound on sends of one prompt, the first one included.
pub const MAX_PROMPT_ATTEMPTS: u32 = 5;

const MESSAGES_PATH: &str = "/v1/messages";
const MESSAGING_SOURCE: &str = "messaging";

struct Choice {
    reply_id: String,
    label: String,
}

enum Expect {
    /// One continuation per option, matched on the reply id.
    Choices(Vec<Choice>),
    /// A single `yes` continuation, optionally gated by a format check.
    Text(Option<ResponseFormat>),
}

struct Prompt {
    body: Value,
    timeout_secs: u64,
    expect: Expect,
    retry: bool,
}

impl<'a> CompileSession<'a> {
    pub(super) fn translate_send_text(
        &mut self,
        node: &'a Node,
        data: &SendTextData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let body = message_body(scope, "text", json!({ "text": data.message }));

        if !data.wait_for_response {
            let response = names.step("response");
            let mut steps = vec![
                self.http_post(names.step("send"), MESSAGES_PATH, body, Some(response.clone())),
                Step::assign(
                    names.step("assign"),
                    vec![(names.var.clone(), expr(format!("{}.body", response)))],
                ),
            ];
            scope.registry.bind_variable(&names.var);
            steps.extend(self.translate_next(node, &Port::next_step(), scope)?);
            return Ok(vec![Step::block(names.var, steps)]);
        }

        let prompt = Prompt {
            body,
            timeout_secs: data
                .timeout_seconds
                .unwrap_or(self.config.response_timeout_secs),
            expect: Expect::Text(data.response_format),
            retry: data.response_format.is_some(),
        };
        self.awaiting_prompt(node, &names, prompt, scope)
    }

    pub(super) fn translate_buttons(
        &mut self,
        node: &'a Node,
        data: &ButtonsData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let body = message_body(
            scope,
            "buttons",
            json!({ "text": data.message, "buttons": data.buttons }),
        );
        let choices = data
            .buttons
            .iter()
            .map(|b| Choice {
                reply_id: b.id.clone(),
                label: b.label.clone(),
            })
            .collect();
        let prompt = Prompt {
            body,
            timeout_secs: data
                .timeout_seconds
                .unwrap_or(self.config.response_timeout_secs),
            expect: Expect::Choices(choices),
            retry: data.retry_invalid,
        };
        self.awaiting_prompt(node, &names, prompt, scope)
    }

    pub(super) fn translate_list(
        &mut self,
        node: &'a Node,
        data: &ListData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let body = message_body(
            scope,
            "list",
            json!({
                "text": data.message,
                "button": data.button_label.as_deref().unwrap_or("Options"),
                "sections": data.sections,
            }),
        );
        let choices = data
            .rows()
            .map(|row| Choice {
                reply_id: row.id.clone(),
                label: row.title.clone(),
            })
            .collect();
        let prompt = Prompt {
            body,
            timeout_secs: data
                .timeout_seconds
                .unwrap_or(self.config.response_timeout_secs),
            expect: Expect::Choices(choices),
            retry: data.retry_invalid,
        };
        self.awaiting_prompt(node, &names, prompt, scope)
    }

    /// Send, wait for the reply, then dispatch on it.
    fn awaiting_prompt(
        &mut self,
        node: &'a Node,
        names: &NodeNames,
        prompt: Prompt,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let reply = names.var.as_str();
        let attempts = names.step("attempts");
        let send_step = names.step("send");

        let mut steps = Vec::new();
        if prompt.retry {
            steps.push(Step::assign(
                names.step("init"),
                vec![(attempts.clone(), json!(1))],
            ));
        }
        steps.push(self.http_post(
            send_step.clone(),
            MESSAGES_PATH,
            prompt.body,
            Some(names.step("sent")),
        ));
        steps.push(Step::call(
            names.step("await"),
            CallStep::new(AWAIT_CALLBACK)
                .with_arg("source", json!(MESSAGING_SOURCE))
                .with_arg("timeout", json!(prompt.timeout_secs))
                .with_arg("correlation_id", expr("tg.session_id"))
                .with_result(reply),
        ));
        scope.registry.bind_variable(reply);

        let received = format!("{}.status == {}", reply, quote("received"));
        let mut cases = Vec::new();
        match &prompt.expect {
            Expect::Choices(choices) => {
                for (i, choice) in choices.iter().enumerate() {
                    let port = Port::Option(choice.reply_id.clone());
                    let slug = format!("{}_{}", i, port.slug());
                    let routine = self.continuation_routine(
                        node,
                        names,
                        &port,
                        &slug,
                        &choice.label,
                        scope,
                    )?;
                    let condition = expr(format!(
                        "{} and {}.body.reply_id == {}",
                        received,
                        reply,
                        quote(&choice.reply_id)
                    ));
                    let dispatch = self.dispatch(
                        names.step(&format!("option{}_dispatch", i)),
                        &routine,
                        names,
                        scope,
                    );
                    cases.push(SwitchCase::when(condition).then_steps(vec![dispatch]));
                }
            }
            Expect::Text(format) => {
                let routine =
                    self.continuation_routine(node, names, &Port::Named(YES), "yes", YES, scope)?;
                let condition = match format {
                    Some(format) => expr(format!(
                        "{} and text.match_regex({}.body.text, {})",
                        received,
                        reply,
                        quote(format.pattern())
                    )),
                    None => expr(&received),
                };
                let dispatch = self.dispatch(names.step("yes_dispatch"), &routine, names, scope);
                cases.push(SwitchCase::when(condition).then_steps(vec![dispatch]));
            }
        }

        if prompt.retry {
            cases.push(
                SwitchCase::when(expr(format!(
                    "{} and {} < {}",
                    received, attempts, MAX_PROMPT_ATTEMPTS
                )))
                .then_steps(vec![Step::assign(
                    names.step("retry"),
                    vec![(attempts.clone(), expr(format!("{} + 1", attempts)))],
                )])
                .then_next(send_step),
            );
        }

        let no_response = self.continuation_routine(
            node,
            names,
            &Port::Named(NO_RESPONSE),
            "no_response",
            NO_RESPONSE,
            scope,
        )?;
        let dispatch = self.dispatch(
            names.step("no_response_dispatch"),
            &no_response,
            names,
            scope,
        );
        cases.push(SwitchCase::otherwise().then_steps(vec![dispatch]));

        steps.push(Step::switch(names.step("route"), cases));
        Ok(vec![Step::block(names.var.clone(), steps)])
    }
}

/// Request body of the messaging endpoint, addressed to the contact.
fn message_body(scope: &Scope, kind: &str, content: Value) -> Value {
    json!({
        "branch_id": scope.registry.reference(BRANCH_ID),
        "session_id": expr("tg.session_id"),
        "to": expr("tg.contact.phone"),
        "type": kind,
        "content": content,
    })
}
