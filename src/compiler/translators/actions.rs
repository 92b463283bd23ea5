use crate::compiler::context::{BRANCH_ID, BRANCH_NAME, CompileSession, NodeNames, Scope};
use crate::compiler::edges::Port;
use crate::error::CompileError;
use crate::flow::{
    AlertData, ApiCallData, DelayData, Node, SaveFieldsData, SaveVariableData, UtilityData,
    WebhookData,
};
use crate::program::expr::{expr, quote};
use crate::program::primitives::{AWAIT_CALLBACK, HTTP_REQUEST, SLEEP};
use crate::program::{CallStep, Step};
use serde_json::{Map, Value, json};

impl<'a> CompileSession<'a> {
    /// Shared tail of every linear action: bind the result, then continue.
    fn linear(
        &mut self,
        node: &'a Node,
        names: NodeNames,
        mut steps: Vec<Step>,
        result: Option<Value>,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        if let Some(value) = result {
            steps.push(Step::assign(
                names.step("assign"),
                vec![(names.var.clone(), value)],
            ));
            scope.registry.bind_variable(&names.var);
        }
        steps.extend(self.translate_next(node, &Port::next_step(), scope)?);
        Ok(vec![Step::block(names.var, steps)])
    }

    pub(super) fn translate_delay(
        &mut self,
        node: &'a Node,
        data: &DelayData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let sleep = Step::call(
            names.step("sleep"),
            CallStep::new(SLEEP).with_arg("seconds", json!(data.seconds())),
        );
        self.linear(node, names, vec![sleep], None, scope)
    }

    pub(super) fn translate_save_data(
        &mut self,
        node: &'a Node,
        data: &SaveFieldsData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let fields: Map<String, Value> = data
            .fields
            .iter()
            .map(|f| (f.key.clone(), f.value.clone()))
            .collect();
        let body = json!({
            "branch_id": scope.registry.reference(BRANCH_ID),
            "contact_id": expr("tg.contact.id"),
            "collection": data.collection.as_deref().unwrap_or("contact"),
            "fields": fields,
        });
        let response = names.step("response");
        let save = self.http_post(
            names.step("save"),
            "/v1/contacts/data",
            body,
            Some(response.clone()),
        );
        let result = expr(format!("{}.body", response));
        self.linear(node, names, vec![save], Some(result), scope)
    }

    pub(super) fn translate_save_variable(
        &mut self,
        node: &'a Node,
        data: &SaveVariableData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let body = json!({
            "branch_id": scope.registry.reference(BRANCH_ID),
            "contact_id": expr("tg.contact.id"),
            "name": data.variable_name,
            "value": data.value,
        });
        let save = self.http_post(
            names.step("save"),
            "/v1/contacts/variables",
            body,
            Some(names.step("response")),
        );
        self.linear(node, names, vec![save], Some(data.value.clone()), scope)
    }

    pub(super) fn translate_api_call(
        &mut self,
        node: &'a Node,
        data: &ApiCallData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let response = names.step("response");
        let mut call = CallStep::new(HTTP_REQUEST)
            .with_arg("method", json!(data.method.as_str()))
            .with_arg("url", json!(data.url));
        if !data.headers.is_empty() {
            call = call.with_arg("headers", json!(data.headers));
        }
        if let Some(body) = &data.body {
            call = call.with_arg("body", body.clone());
        }
        let request = Step::call(
            names.step("request"),
            call.with_result(&response)
                .with_retry(self.config.http_retry.clone()),
        );
        let result = expr(format!("{}.body", response));
        self.linear(node, names, vec![request], Some(result), scope)
    }

    /// Suspends until an external system posts to the node's callback.
    pub(super) fn translate_webhook(
        &mut self,
        node: &'a Node,
        data: &WebhookData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let event = names.step("event");
        let correlation = format!("tg.session_id + {}", quote(&format!(":{}", names.var)));
        let wait = Step::call(
            names.step("await"),
            CallStep::new(AWAIT_CALLBACK)
                .with_arg("source", json!(data.source.as_deref().unwrap_or("webhook")))
                .with_arg(
                    "timeout",
                    json!(data.timeout_seconds.unwrap_or(self.config.webhook_timeout_secs)),
                )
                .with_arg("correlation_id", expr(correlation))
                .with_result(&event),
        );
        let result = expr(format!("{}.body", event));
        self.linear(node, names, vec![wait], Some(result), scope)
    }

    pub(super) fn translate_alert(
        &mut self,
        node: &'a Node,
        data: &AlertData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let body = json!({
            "branch_id": scope.registry.reference(BRANCH_ID),
            "branch_name": scope.registry.reference(BRANCH_NAME),
            "session_id": expr("tg.session_id"),
            "channel": data.channel,
            "recipients": data.recipients,
            "message": data.message,
        });
        let response = names.step("response");
        let send = self.http_post(names.step("send"), "/v1/alerts", body, Some(response.clone()));
        let result = expr(format!("{}.body", response));
        self.linear(node, names, vec![send], Some(result), scope)
    }

    pub(super) fn translate_utility(
        &mut self,
        node: &'a Node,
        data: &UtilityData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let body = json!({
            "branch_id": scope.registry.reference(BRANCH_ID),
            "session_id": expr("tg.session_id"),
            "arguments": data.arguments,
        });
        let response = names.step("response");
        let run = self.http_post(
            names.step("run"),
            &format!("/v1/utilities/{}", data.function),
            body,
            Some(response.clone()),
        );
        let result = expr(format!("{}.body.result", response));
        self.linear(node, names, vec![run], Some(result), scope)
    }
}
