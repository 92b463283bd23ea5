use clap::Parser;
use keiro::prelude::*;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Compiles a designer flow export into a workflow-engine program
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the flow JSON file
    flow_path: String,

    /// Path to a branches JSON file (`{ "<id>": { "name": "..." } }`)
    #[arg(short, long)]
    branches: Option<String>,

    /// Path to a compiler configuration JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Write the program to `<dir>/<program name>.json` instead of stdout
    #[arg(short, long)]
    out: Option<String>,

    /// Print the program as a tree instead of JSON
    #[arg(long)]
    tree: bool,

    /// Map a custom node type to a built-in one, as `custom=builtin`
    #[arg(long = "alias", value_name = "CUSTOM=BUILTIN")]
    aliases: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let total_start = Instant::now();

    // --- 1. Loading ---
    let json = std::fs::read_to_string(&cli.flow_path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read flow file '{}': {}", cli.flow_path, e))
    });

    let mut loader = FlowLoader::new();
    for alias in &cli.aliases {
        let (custom, builtin) = alias.split_once('=').unwrap_or_else(|| {
            exit_with_error(&format!("Invalid alias '{}', expected CUSTOM=BUILTIN", alias))
        });
        loader = loader.with_type_alias(custom, builtin);
    }
    let flow = loader
        .load_str(&json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load flow: {}", e)));

    let branches = match &cli.branches {
        Some(path) => StaticBranchLookup::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load branches: {}", e))),
        // Without a branch export the id doubles as the display name.
        None => StaticBranchLookup::new().with_branch(&flow.branch_id, &flow.branch_id),
    };

    let config = match &cli.config {
        Some(path) => CompilerConfig::from_file(path).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to load config '{}': {}", path, e))
        }),
        None => CompilerConfig::default(),
    };

    // --- 2. Compilation ---
    let name = flow.program_name();
    let compile_start = Instant::now();
    let program = Compiler::builder(flow, branches)
        .with_config(config)
        .build()
        .compile()
        .unwrap_or_else(|e| exit_with_error(&format!("Compilation failed: {}", e)));
    let compile_duration = compile_start.elapsed();

    // --- 3. Output ---
    if let Some(dir) = &cli.out {
        let handle = DirectorySink::new(dir)
            .submit(&program, &name)
            .unwrap_or_else(|e| exit_with_error(&e.to_string()));
        eprintln!("Program '{}' written to {}", handle.name, handle.location);
    } else if cli.tree {
        println!("{}", DisplayProgram { program: &program });
    } else {
        let json = program
            .to_json_pretty()
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize program: {}", e)));
        println!("{}", json);
    }

    eprintln!("\n--- Summary ---");
    eprintln!("Routines:     {}", program.len());
    eprintln!("Steps:        {}", program.step_count());
    eprintln!("Compilation:  {:?}", compile_duration);
    eprintln!("Total:        {:?}", total_start.elapsed());
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
