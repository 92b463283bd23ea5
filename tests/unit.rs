//! Unit tests for naming, edge resolution, ingestion, verification and the
//! compiler's collaborators.
mod common;
use common::*;
use indexmap::IndexMap;
use keiro::compiler::edges::{FlowGraph, NEXT_STEP, Port, find_edge};
use keiro::compiler::registry::ArgsRegistry;
use keiro::naming::{normalize_label, sanitize_identifier};
use keiro::prelude::*;
use keiro::program::verify::verify;
use keiro::program::{CallStep, SwitchCase};
use serde_json::json;
use std::fs;

// --- Naming ---

#[test]
fn test_sanitize_identifier() {
    assert_eq!(sanitize_identifier("Welcome Message!"), "welcome_message");
    assert_eq!(sanitize_identifier("  Ask -- e-mail  "), "ask_e_mail");
    assert_eq!(sanitize_identifier("2nd reminder"), "n_2nd_reminder");
    assert_eq!(sanitize_identifier("Ünïcode ok"), "n_code_ok");
    assert_eq!(sanitize_identifier("!!!"), "");
}

#[test]
fn test_normalize_label() {
    assert_eq!(normalize_label(" Gold tier "), "GOLD_TIER");
    assert_eq!(normalize_label("vip"), "VIP");
}

// --- Edge resolution ---

fn edge_flow() -> FlowDefinition {
    FlowFixture::new()
        .node("menu", "sendButtons", json!({ "message": "m", "buttons": [{ "id": "b1", "label": "One" }] }))
        .node("x", "sendText", text("X", "x"))
        .node("y", "sendText", text("Y", "y"))
        .then("trigger", "menu")
        .edge("menu", "option-b1", "x")
        .edge("menu", "handle-b1-copy", "y")
        .edge("menu", "no-response-extended", "y")
        .load()
}

#[test]
fn test_find_edge_first_match_wins() {
    let flow = edge_flow();
    let edge = find_edge(&flow, "menu", &Port::Option("b1".to_string())).unwrap();
    assert_eq!(edge.target, "x");
}

#[test]
fn test_named_ports_match_exactly() {
    let flow = edge_flow();
    assert!(find_edge(&flow, "menu", &Port::Named("no-response")).is_none());
    assert!(find_edge(&flow, "menu", &Port::next_step()).is_none());
    assert_eq!(
        find_edge(&flow, "trigger", &Port::next_step()).unwrap().target,
        "menu"
    );
}

#[test]
fn test_label_port_matches_normalized_key() {
    let port = Port::Label("Gold tier".to_string());
    assert_eq!(port.key(), "GOLD_TIER");
    assert!(port.matches("branch-GOLD_TIER"));
    assert!(!port.matches("branch-gold tier"));
    assert_eq!(port.slug(), "gold_tier");
    assert_eq!(Port::Named("no-response").slug(), "no_response");
}

#[test]
fn test_dynamic_ports_match_at_separator() {
    let port = Port::Option("1".to_string());
    assert!(port.matches("option-1"));
    assert!(port.matches("1"));
    assert!(!port.matches("option-11"));
    assert!(!port.matches("option-b_1"));
    assert!(!port.matches("option-1-copy"));
    assert!(!Port::Label("Tier".to_string()).matches("branch-GOLD_TIER"));
}

#[test]
fn test_short_button_id_skips_longer_handle() {
    let flow = FlowFixture::new()
        .node(
            "menu",
            "sendButtons",
            json!({ "message": "m", "buttons": [{ "id": "1", "label": "One" }, { "id": "11", "label": "Eleven" }] }),
        )
        .node("eleven", "sendText", text("Eleven", "11"))
        .node("one", "sendText", text("One", "1"))
        .then("trigger", "menu")
        .edge("menu", "option-11", "eleven")
        .edge("menu", "option-1", "one")
        .load();
    let graph = FlowGraph::new(&flow);

    assert_eq!(graph.next_node("menu", &Port::Option("1".to_string())).unwrap().id, "one");
    assert_eq!(graph.next_node("menu", &Port::Option("11".to_string())).unwrap().id, "eleven");
}

#[test]
fn test_flow_graph_agrees_with_find_edge() {
    let flow = edge_flow();
    let graph = FlowGraph::new(&flow);

    for port in [Port::Option("b1".to_string()), Port::Named("no-response"), Port::next_step()] {
        assert_eq!(
            graph.find_edge("menu", &port).map(|e| &e.id),
            find_edge(&flow, "menu", &port).map(|e| &e.id)
        );
    }
    assert_eq!(graph.outgoing("menu").len(), 3);
    assert!(graph.outgoing("y").is_empty());
}

// --- Ingestion ---

fn load(flow: serde_json::Value) -> std::result::Result<FlowDefinition, FlowError> {
    FlowLoader::new().load_str(&flow.to_string())
}

#[test]
fn test_missing_handle_defaults_to_next_step() {
    let flow = load(json!({
        "flowId": "f",
        "nodes": [
            { "id": "t", "type": "trigger" },
            { "id": "a", "type": "delay", "data": { "duration": 1 } },
        ],
        "edges": [{ "source": "t", "target": "a" }],
    }))
    .unwrap();

    assert_eq!(flow.edges[0].source_handle, NEXT_STEP);
    assert_eq!(flow.edges[0].id, "edge-0");
    assert_eq!(flow.node("t").unwrap().title, "trigger");
}

#[test]
fn test_trigger_count_is_checked() {
    let none = load(json!({ "flowId": "f", "nodes": [], "edges": [] }));
    assert!(matches!(none, Err(FlowError::MissingTrigger { flow_id }) if flow_id == "f"));

    let two = load(json!({
        "flowId": "f",
        "nodes": [{ "id": "a", "type": "trigger" }, { "id": "b", "type": "trigger" }],
    }));
    assert!(matches!(two, Err(FlowError::MultipleTriggers { count: 2, .. })));
}

#[test]
fn test_duplicate_node_id_is_rejected() {
    let result = load(json!({
        "nodes": [{ "id": "a", "type": "trigger" }, { "id": "a", "type": "delay", "data": { "duration": 1 } }],
    }));
    assert!(matches!(result, Err(FlowError::DuplicateNodeId(id)) if id == "a"));
}

#[test]
fn test_dangling_edge_is_rejected() {
    let result = load(json!({
        "nodes": [{ "id": "t", "type": "trigger" }],
        "edges": [{ "id": "e1", "source": "t", "target": "ghost" }],
    }));
    assert!(matches!(
        result,
        Err(FlowError::DanglingEdge { edge_id, missing_node_id }) if edge_id == "e1" && missing_node_id == "ghost"
    ));
}

#[test]
fn test_invalid_payloads_fail_at_ingestion() {
    let cases = [
        ("sendButtons", json!({ "message": "m", "buttons": [] })),
        ("sendText", json!({ "waitForResponse": true })),
        ("delay", json!({ "duration": "soon" })),
        ("subflow", json!({ "subflowId": " " })),
        ("conditionalBranch", json!({ "branches": [{ "label": "" }] })),
        ("sendList", json!({ "message": "m", "sections": [{ "rows": [] }] })),
    ];

    for (node_type, data) in cases {
        let result = load(json!({
            "nodes": [{ "id": "t", "type": "trigger" }, { "id": "bad", "type": node_type, "data": data }],
        }));
        match result {
            Err(FlowError::InvalidNodeData { node_id, type_name, .. }) => {
                assert_eq!(node_id, "bad");
                assert_eq!(type_name, node_type);
            }
            other => panic!("expected invalid data for {}, got {:?}", node_type, other),
        }
    }
}

#[test]
fn test_unknown_type_and_alias() {
    let json = json!({
        "nodes": [
            { "id": "t", "type": "trigger" },
            { "id": "a", "type": "textMessage", "data": { "message": "hi" } },
        ],
    })
    .to_string();

    let plain = FlowLoader::new().load_str(&json).unwrap();
    assert!(matches!(
        &plain.node("a").unwrap().kind,
        NodeKind::Unsupported { type_name } if type_name == "textMessage"
    ));

    let aliased = FlowLoader::new()
        .with_type_alias("textMessage", "sendText")
        .load_str(&json)
        .unwrap();
    assert!(matches!(aliased.node("a").unwrap().kind, NodeKind::SendText(_)));
}

#[test]
fn test_bad_json_is_reported() {
    let result = FlowLoader::new().load_str("{ not json");
    assert!(matches!(result, Err(FlowError::JsonParseError(_))));
}

#[test]
fn test_program_name() {
    let flow = FlowFixture::new().load();
    assert_eq!(flow.program_name(), "acme_flow_1");
    assert_eq!(FlowDefinition::default().program_name(), "flow");
}

// --- Registry ---

#[test]
fn test_registry_rebase_and_args() {
    let mut registry = ArgsRegistry::new();
    registry.bind("branch_id", json!("b-1"));
    registry.reserve("later");
    registry.bind_variable("answer");
    registry.reserve("answer");

    assert_eq!(registry.params(), vec!["tg", "branch_id", "later", "answer"]);
    let args = registry.call_args();
    assert_eq!(args["tg"], json!("${tg}"));
    assert_eq!(args["branch_id"], json!("b-1"));
    assert_eq!(args["later"], serde_json::Value::Null);
    assert_eq!(args["answer"], json!("${answer}"));

    let child = registry.rebased();
    assert_eq!(child.reference("branch_id"), json!("${branch_id}"));
    assert_eq!(child.reference("unknown"), json!("${unknown}"));
    assert_eq!(child.params(), registry.params());
}

// --- Verifier ---

fn program_of(routines: Vec<(&str, Vec<Step>)>) -> Program {
    let routines: IndexMap<String, Routine> = routines
        .into_iter()
        .map(|(name, steps)| (name.to_string(), Routine::new(vec!["tg".to_string()], steps)))
        .collect();
    Program::from_routines(routines)
}

#[test]
fn test_verify_reports_defects() {
    let missing_main = program_of(vec![("other", vec![])]);
    assert_eq!(verify(&missing_main), Err(ProgramError::MissingMain));

    let dangling = program_of(vec![(
        "main",
        vec![Step::call("go", CallStep::new("nowhere"))],
    )]);
    assert!(matches!(
        verify(&dangling),
        Err(ProgramError::DanglingCall { target, .. }) if target == "nowhere"
    ));

    let duplicate = program_of(vec![(
        "main",
        vec![
            Step::returns("same", json!(1)),
            Step::block("outer", vec![Step::returns("same", json!(2))]),
        ],
    )]);
    assert!(matches!(
        verify(&duplicate),
        Err(ProgramError::DuplicateStepName { step, .. }) if step == "same"
    ));

    let bad_jump = program_of(vec![(
        "main",
        vec![Step::switch("route", vec![SwitchCase::otherwise().then_next("missing")])],
    )]);
    assert!(matches!(
        verify(&bad_jump),
        Err(ProgramError::UnknownJumpTarget { target, .. }) if target == "missing"
    ));
}

#[test]
fn test_verify_accepts_primitives_and_reserved_jumps() {
    let program = program_of(vec![(
        "main",
        vec![
            Step::call("log", CallStep::new("sys.log")),
            Step::switch("route", vec![SwitchCase::otherwise().then_next("end")]),
        ],
    )]);
    assert!(verify(&program).is_ok());
}

// --- Config, lookup and sink ---

#[test]
fn test_partial_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "default_loop_limit": 7, "http_retry": { "max_retries": 1 } }"#).unwrap();

    let config = CompilerConfig::from_file(&path).unwrap();
    assert_eq!(config.default_loop_limit, 7);
    assert_eq!(config.http_retry.max_retries, 1);
    assert_eq!(config.http_retry.max_delay_secs, 60);
    assert_eq!(config.base_url_env, "FLOW_API_BASE_URL");
}

#[test]
fn test_static_branch_lookup_from_json() {
    let lookup = StaticBranchLookup::from_json(r#"{ "b-7": { "name": "Harbour" } }"#).unwrap();
    assert_eq!(lookup.lookup_branch("b-7").unwrap().name, "Harbour");
    assert!(matches!(
        lookup.lookup_branch("b-8"),
        Err(LookupError::BranchNotFound(id)) if id == "b-8"
    ));
    assert!(matches!(
        StaticBranchLookup::from_json("[]"),
        Err(LookupError::Store(_))
    ));
}

#[test]
fn test_directory_sink_writes_program() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("programs");
    let program = FlowFixture::new()
        .node("hello", "sendText", text("Hello", "Hi"))
        .then("trigger", "hello")
        .compile_ok();

    let handle = DirectorySink::new(&out).submit(&program, "acme_flow_1").unwrap();
    assert_eq!(handle.name, "acme_flow_1");

    let written = fs::read_to_string(out.join("acme_flow_1.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json, serde_json::to_value(&program).unwrap());
    assert!(json["main"]["steps"].is_array());
}

#[test]
fn test_error_messages() {
    let error = CompileError::from(FlowError::MissingTrigger {
        flow_id: "f".to_string(),
    });
    assert_eq!(error.to_string(), "Flow 'f' has no trigger node");

    let error = CompileError::NestedLoop {
        loop_id: "a".to_string(),
        nested_id: "b".to_string(),
    };
    assert!(error.to_string().contains("nested loop 'b'"));
}
