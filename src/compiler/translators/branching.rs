use crate::compiler::context::{BRANCH_ID, CompileSession, Scope};
use crate::compiler::edges::{NO, Port, YES};
use crate::error::CompileError;
use crate::flow::{BranchData, Node, SplitData};
use crate::program::expr::{expr, quote};
use crate::program::{Step, SwitchCase};
use serde_json::{Value, json};

const EVALUATE_PATH: &str = "/v1/conditions/evaluate";

impl<'a> CompileSession<'a> {
    pub(super) fn translate_split(
        &mut self,
        node: &'a Node,
        data: &SplitData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let body = evaluation_body(
            scope,
            json!({ "conditions": data.conditions, "logic": data.logic }),
        );
        let mut steps = self.evaluate(
            &names.var,
            names.step("evaluate"),
            names.step("response"),
            body,
        );
        scope.registry.bind_variable(&names.var);

        let yes = self.continuation_routine(node, &names, &Port::Named(YES), "yes", YES, scope)?;
        let no = self.continuation_routine(node, &names, &Port::Named(NO), "no", NO, scope)?;
        steps.push(Step::switch(
            names.step("route"),
            vec![
                SwitchCase::when(expr(format!("{} == true", names.var))).then_steps(vec![
                    self.dispatch(names.step("yes_dispatch"), &yes, &names, scope),
                ]),
                SwitchCase::otherwise().then_steps(vec![self.dispatch(
                    names.step("no_dispatch"),
                    &no,
                    &names,
                    scope,
                )]),
            ],
        ));
        Ok(vec![Step::block(names.var, steps)])
    }

    /// One case per path, compared on the label the evaluation returns.
    /// A result matching no label falls through the switch.
    pub(super) fn translate_branch(
        &mut self,
        node: &'a Node,
        data: &BranchData,
        scope: &mut Scope,
    ) -> Result<Vec<Step>, CompileError> {
        let names = self.names_for(node);
        let body = evaluation_body(scope, json!({ "branches": data.branches }));
        let mut steps = self.evaluate(
            &names.var,
            names.step("evaluate"),
            names.step("response"),
            body,
        );
        scope.registry.bind_variable(&names.var);

        let mut cases = Vec::with_capacity(data.branches.len());
        for (i, path) in data.branches.iter().enumerate() {
            let port = Port::Label(path.label.clone());
            let slug = format!("{}_{}", i, port.slug());
            let routine =
                self.continuation_routine(node, &names, &port, &slug, &path.label, scope)?;
            let dispatch =
                self.dispatch(names.step(&format!("path{}_dispatch", i)), &routine, &names, scope);
            cases.push(
                SwitchCase::when(expr(format!("{} == {}", names.var, quote(&path.label))))
                    .then_steps(vec![dispatch]),
            );
        }
        steps.push(Step::switch(names.step("route"), cases));
        Ok(vec![Step::block(names.var, steps)])
    }

    fn evaluate(&self, var: &str, step_name: String, response: String, body: Value) -> Vec<Step> {
        vec![
            self.http_post(step_name, EVALUATE_PATH, body, Some(response.clone())),
            Step::assign(
                format!("{}_assign", var),
                vec![(var.to_string(), expr(format!("{}.body.result", response)))],
            ),
        ]
    }
}

fn evaluation_body(scope: &Scope, rules: Value) -> Value {
    let mut body = json!({
        "branch_id": scope.registry.reference(BRANCH_ID),
        "session_id": expr("tg.session_id"),
        "contact": expr("tg.contact"),
    });
    if let (Some(body), Value::Object(rules)) = (body.as_object_mut(), rules) {
        body.extend(rules);
    }
    body
}
