use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use std::fs;

/// A CLI tool to generate synthetic flows for stress-testing the Keiro compiler
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the generated flow JSON to
    #[arg(short, long, default_value = "generated_flow.json")]
    output: String,

    /// Number of action nodes to generate, not counting the trigger
    #[arg(short, long, default_value_t = 50)]
    nodes: usize,

    /// Seed for the random generator; the same seed yields the same flow
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Branch id written into the flow
    #[arg(long, default_value = "branch-1")]
    branch_id: String,
}

/// Grows a tree-shaped flow by attaching every new node to a random open port.
struct FlowBuilder {
    rng: StdRng,
    nodes: Vec<Value>,
    edges: Vec<Value>,
    open_ports: Vec<(String, String)>,
}

impl FlowBuilder {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            nodes: Vec::new(),
            edges: Vec::new(),
            open_ports: Vec::new(),
        }
    }

    fn add_node(&mut self, node_type: &str, data: Value) -> String {
        let id = format!("n{}", self.nodes.len());
        self.nodes.push(json!({ "id": id, "type": node_type, "data": data }));
        id
    }

    fn connect(&mut self, source: &str, handle: &str, target: &str) {
        let id = format!("e{}", self.edges.len());
        self.edges.push(json!({
            "id": id,
            "source": source,
            "target": target,
            "sourceHandle": handle,
        }));
    }

    /// Connects `target` to a random open port. Returns false once the
    /// flow has no open port left.
    fn attach(&mut self, target: &str) -> bool {
        if self.open_ports.is_empty() {
            return false;
        }
        let index = self.rng.random_range(0..self.open_ports.len());
        let (source, handle) = self.open_ports.swap_remove(index);
        self.connect(&source, &handle, target);
        true
    }

    fn open(&mut self, node: &str, handles: &[String]) {
        for handle in handles {
            self.open_ports.push((node.to_string(), handle.clone()));
        }
    }

    fn linear_action(&mut self, n: usize) -> (&'static str, Value) {
        match self.rng.random_range(0..6) {
            0 => ("sendText", json!({ "title": format!("Message {}", n), "message": format!("Hello number {}", n) })),
            1 => ("delay", json!({ "title": format!("Pause {}", n), "duration": self.rng.random_range(1..60), "unit": "minutes" })),
            2 => ("saveVariable", json!({ "title": format!("Remember {}", n), "variableName": format!("var_{}", n), "value": n })),
            3 => ("apiCall", json!({ "title": format!("Fetch {}", n), "method": "GET", "url": format!("https://api.example.com/items/{}", n) })),
            4 => ("alert", json!({ "title": format!("Notify {}", n), "message": "Flow checkpoint", "recipients": ["ops@example.com"] })),
            _ => ("saveData", json!({ "title": format!("Store {}", n), "fields": [{ "key": "step", "value": n }] })),
        }
    }

    /// Adds one node or construct and returns how many nodes it created.
    fn add_random(&mut self, n: usize, remaining: usize) -> usize {
        match self.rng.random_range(0..10) {
            0 | 1 => {
                let options: Vec<String> = (0..self.rng.random_range(2..4))
                    .map(|i| format!("opt{}_{}", n, i))
                    .collect();
                let buttons: Vec<Value> = options
                    .iter()
                    .map(|id| json!({ "id": id, "label": id.to_uppercase() }))
                    .collect();
                let id = self.add_node(
                    "sendButtons",
                    json!({ "title": format!("Ask {}", n), "message": "Pick one", "buttons": buttons }),
                );
                self.attach(&id);
                let mut handles: Vec<String> =
                    options.iter().map(|o| format!("option-{}", o)).collect();
                handles.push("no-response".to_string());
                self.open(&id, &handles);
                1
            }
            2 => {
                let id = self.add_node(
                    "conditionalSplit",
                    json!({
                        "title": format!("Check {}", n),
                        "conditions": [{ "field": "contact.tier", "operator": "equals", "value": "gold" }],
                    }),
                );
                self.attach(&id);
                self.open(&id, &["yes".to_string(), "no".to_string()]);
                1
            }
            3 => {
                let labels = ["Gold tier", "Silver tier", "Other"];
                let branches: Vec<Value> = labels.iter().map(|l| json!({ "label": l })).collect();
                let id = self.add_node(
                    "conditionalBranch",
                    json!({ "title": format!("Route {}", n), "branches": branches }),
                );
                self.attach(&id);
                let handles: Vec<String> = labels
                    .iter()
                    .map(|l| format!("branch-{}", l.to_uppercase().replace(' ', "_")))
                    .collect();
                self.open(&id, &handles);
                1
            }
            4 if remaining >= 3 => {
                let body_len = self.rng.random_range(1..=remaining.min(4) - 2);
                let count: u32 = self.rng.random_range(1..5);
                let start = self.add_node(
                    "loopStart",
                    json!({ "title": format!("Repeat {}", n), "loopValue": count }),
                );
                self.attach(&start);
                let mut previous = start;
                for i in 0..body_len {
                    let (node_type, data) = self.linear_action(n + i + 1);
                    let id = self.add_node(node_type, data);
                    self.connect(&previous, "next-step", &id);
                    previous = id;
                }
                let end = self.add_node("loopEnd", json!({ "title": format!("Repeat {} end", n) }));
                self.connect(&previous, "next-step", &end);
                self.open(&end, &["next-step".to_string()]);
                body_len + 2
            }
            _ => {
                let (node_type, data) = self.linear_action(n);
                let id = self.add_node(node_type, data);
                self.attach(&id);
                self.open(&id, &["next-step".to_string()]);
                1
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut builder = FlowBuilder::new(cli.seed);

    println!(
        "Generating a flow with {} action nodes (seed {})...",
        cli.nodes, cli.seed
    );

    let trigger = builder.add_node("trigger", json!({ "title": "Start", "event": "message.received" }));
    builder.open(&trigger, &["next-step".to_string()]);

    let mut created = 0;
    while created < cli.nodes && !builder.open_ports.is_empty() {
        created += builder.add_random(created, cli.nodes - created);
    }

    let flow = json!({
        "flowId": format!("generated-{}", cli.seed),
        "title": format!("Generated flow {}", cli.seed),
        "organisationId": "generator",
        "branchId": cli.branch_id,
        "nodes": builder.nodes,
        "edges": builder.edges,
    });

    fs::write(&cli.output, serde_json::to_string_pretty(&flow)?)?;
    println!(
        "Successfully generated {} nodes and {} edges into '{}'",
        created + 1,
        flow["edges"].as_array().map_or(0, Vec::len),
        cli.output
    );

    Ok(())
}
