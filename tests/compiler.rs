//! Tests for program assembly: the main routine, branch setup and the
//! two reference scenarios.
mod common;
use common::*;
use keiro::compiler::{BRANCH_SETUP, NO_REACHABLE_ACTION};
use keiro::prelude::*;
use serde_json::{Value, json};

fn linear_flow() -> FlowFixture {
    FlowFixture::new()
        .node("welcome", "sendText", text("Welcome", "Hello"))
        .then("trigger", "welcome")
}

fn split_flow() -> FlowFixture {
    FlowFixture::new()
        .node(
            "check",
            "conditionalSplit",
            json!({
                "title": "Is VIP",
                "conditions": [{ "field": "contact.vip", "operator": "equals", "value": true }],
            }),
        )
        .node("vip", "sendText", text("VIP", "Welcome back"))
        .then("trigger", "check")
        .edge("check", "yes", "vip")
}

#[test]
fn test_linear_send_text_main_shape() {
    let program = linear_flow().compile_ok();
    let main = program.main().unwrap();

    assert_eq!(main.params, vec!["tg"]);
    assert_eq!(
        top_level_names(main),
        vec!["branch_setup", "welcome_1", "clear_session", "finish"]
    );
    assert_eq!(routine_names(&program), vec!["main", "branch_setup"]);

    let setup = main.steps[0].as_call().unwrap();
    assert_eq!(setup.target, BRANCH_SETUP);
    assert_eq!(setup.result.as_deref(), Some("api_base"));

    match &main.steps[1].kind {
        StepKind::Block(inner) => {
            let send = inner[0].as_call().unwrap();
            assert_eq!(send.target, "http.post");
            assert_eq!(send.args["url"], json!("${api_base + \"/v1/messages\"}"));
            assert_eq!(send.args["body"]["content"]["text"], json!("Hello"));
            assert_eq!(send.args["body"]["to"], json!("${tg.contact.phone}"));
            assert_eq!(send.args["body"]["branch_id"], json!(BRANCH_ID));
            assert!(matches!(inner[1].kind, StepKind::Assign(_)));
            assert_eq!(inner.len(), 2);
        }
        other => panic!("expected a block, got {:?}", other),
    }

    let clear = main.steps[2].as_call().unwrap();
    assert_eq!(clear.args["body"]["session_id"], json!("${tg.session_id}"));
    assert_eq!(returned(&main.steps[3]), Some(&json!("${tg}")));
}

#[test]
fn test_split_with_unconnected_no_port_gets_stub() {
    let program = split_flow().compile_ok();

    assert_eq!(
        routine_names(&program),
        vec!["main", "branch_setup", "split_1_yes", "split_1_no"]
    );

    let no = program.routine("split_1_no").unwrap();
    assert_eq!(no.steps.len(), 1);
    assert_eq!(
        returned(&no.steps[0]),
        Some(&json!("No further steps defined for `no`"))
    );

    let yes = program.routine("split_1_yes").unwrap();
    assert_eq!(top_level_names(yes), vec!["vip_2", "finish"]);
    assert_eq!(returned(&yes.steps[1]), Some(&json!("${tg}")));
}

#[test]
fn test_branch_routine_params_match_call_args() {
    let program = split_flow().compile_ok();
    let main = program.main().unwrap();
    let yes = program.routine("split_1_yes").unwrap();

    assert_eq!(
        yes.params,
        vec!["tg", "branch_id", "branch_name", "api_base", "is_vip_1"]
    );

    let dispatch = find_step(main, "is_vip_1_yes_dispatch")
        .and_then(Step::as_call)
        .unwrap();
    let keys: Vec<&str> = dispatch.args.keys().map(String::as_str).collect();
    assert_eq!(keys, yes.params);
    assert_eq!(dispatch.args["branch_name"], json!(BRANCH_NAME));
    assert_eq!(dispatch.args["is_vip_1"], json!("${is_vip_1}"));

    // Inside the child routine the branch id is read from its parameter.
    let vip_send = find_step(yes, "vip_2_send").and_then(Step::as_call).unwrap();
    assert_eq!(vip_send.args["body"]["branch_id"], json!("${branch_id}"));
}

#[test]
fn test_unconnected_trigger_skips_branch_lookup() {
    let flow = FlowFixture::new().load();
    // An empty directory would fail any lookup.
    let program = Compiler::builder(flow, StaticBranchLookup::new())
        .build()
        .compile()
        .unwrap();

    assert_eq!(program.len(), 1);
    let main = program.main().unwrap();
    assert_eq!(main.steps.len(), 1);
    assert_eq!(returned(&main.steps[0]), Some(&json!(NO_REACHABLE_ACTION)));
}

#[test]
fn test_unknown_branch_fails_compile() {
    let flow = linear_flow().load();
    let result = Compiler::builder(flow, StaticBranchLookup::new())
        .build()
        .compile();

    assert!(matches!(
        result,
        Err(CompileError::Lookup(LookupError::BranchNotFound(id))) if id == BRANCH_ID
    ));
}

#[test]
fn test_branch_setup_routine() {
    let program = linear_flow().compile_ok();
    let setup = program.routine(BRANCH_SETUP).unwrap();

    assert_eq!(setup.params, vec!["tg", "branch_id", "branch_name"]);
    let read = setup.steps[0].as_call().unwrap();
    assert_eq!(read.target, "sys.get_env");
    assert_eq!(read.args["name"], json!("FLOW_API_BASE_URL"));
    assert_eq!(read.result.as_deref(), Some("api_base"));
    assert_eq!(setup.steps[1].as_call().unwrap().target, "sys.log");
    assert_eq!(returned(setup.steps.last().unwrap()), Some(&json!("${api_base}")));
}

#[test]
fn test_config_is_applied() {
    let config = CompilerConfig {
        base_url_env: "MY_API".to_string(),
        http_retry: RetryPolicy {
            max_retries: 7,
            ..RetryPolicy::default()
        },
        ..CompilerConfig::default()
    };
    let program = linear_flow().compile_with(config).unwrap();

    let read = program.routine(BRANCH_SETUP).unwrap().steps[0]
        .as_call()
        .unwrap();
    assert_eq!(read.args["name"], json!("MY_API"));

    let posts = calls_to(&program, "http.post");
    assert!(!posts.is_empty());
    assert!(posts
        .iter()
        .all(|call| call.retry.as_ref().map(|r| r.max_retries) == Some(7)));
}

#[test]
fn test_trigger_children_are_reserved() {
    let program = split_flow()
        .node("later", "sendText", text("Later", "See you"))
        .edge("trigger", "secondary", "later")
        .compile_ok();

    let main = program.main().unwrap();
    let dispatch = find_step(main, "is_vip_1_yes_dispatch")
        .and_then(Step::as_call)
        .unwrap();
    assert_eq!(dispatch.args["later_2"], Value::Null);
    assert!(program
        .routine("split_1_yes")
        .unwrap()
        .params
        .contains(&"later_2".to_string()));
}

#[test]
fn test_cycle_outside_loop_is_rejected() {
    let result = FlowFixture::new()
        .node("a", "sendText", text("A", "first"))
        .node("b", "sendText", text("B", "second"))
        .then("trigger", "a")
        .then("a", "b")
        .then("b", "a")
        .compile();

    assert!(matches!(result, Err(CompileError::CycleDetected { node_id }) if node_id == "a"));
}

#[test]
fn test_converging_branches_compile_node_per_routine() {
    let program = FlowFixture::new()
        .node("check", "conditionalSplit", json!({ "title": "Check" }))
        .node("done", "sendText", text("Done", "Bye"))
        .then("trigger", "check")
        .edge("check", "yes", "done")
        .edge("check", "no", "done")
        .compile_ok();

    let yes = program.routine("split_1_yes").unwrap();
    let no = program.routine("split_1_no").unwrap();
    assert_eq!(top_level_names(yes), vec!["done_2", "finish"]);
    assert_eq!(top_level_names(no), vec!["done_3", "finish"]);
}

#[test]
fn test_program_wire_format() {
    let program = split_flow().compile_ok();
    let json: Value = serde_json::from_str(&program.to_json_pretty().unwrap()).unwrap();

    let routines: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(routines[0], "main");
    assert_eq!(json["main"]["params"], json!(["tg"]));

    let setup = &json["main"]["steps"][0]["branch_setup"];
    assert_eq!(setup["call"], json!("branch_setup"));
    assert_eq!(setup["result"], json!("api_base"));

    let block = &json["main"]["steps"][1]["is_vip_1"]["steps"];
    let evaluate = &block[0]["is_vip_1_evaluate"];
    assert_eq!(evaluate["call"], json!("http.post"));
    assert_eq!(
        evaluate["retry"]["predicate"],
        json!("${http.default_retry_predicate}")
    );
    assert_eq!(evaluate["retry"]["backoff"]["multiplier"], json!(2.0));
    assert_eq!(
        block[1]["is_vip_1_assign"]["assign"][0]["is_vip_1"],
        json!("${is_vip_1_response.body.result}")
    );

    let cases = &block[2]["is_vip_1_route"]["switch"];
    assert_eq!(cases[0]["condition"], json!("${is_vip_1 == true}"));
    assert_eq!(cases[1]["condition"], json!(true));
    assert_eq!(
        cases[1]["steps"][0]["is_vip_1_no_dispatch"]["call"],
        json!("split_1_no")
    );
}

#[test]
fn test_from_json_uses_default_loader() {
    let compiler = Compiler::from_json(&linear_flow().to_json(), branches()).unwrap();
    assert_eq!(compiler.flow().nodes.len(), 2);
    assert_eq!(compiler.config(), &CompilerConfig::default());
    assert!(compiler.compile().is_ok());
}

#[test]
fn test_display_program_tree() {
    let program = split_flow().compile_ok();
    let tree = DisplayProgram { program: &program }.to_string();

    assert!(tree.contains("main(tg)"));
    assert!(tree.contains("branch_setup: call branch_setup -> api_base"));
    assert!(tree.contains("when is_vip_1 == true"));
    assert!(tree.contains("when otherwise"));
    assert!(tree.contains("split_1_no(tg, branch_id, branch_name, api_base, is_vip_1)"));
}
