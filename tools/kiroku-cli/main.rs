use clap::Parser;
use kiroku::execution::LogLevel;
use kiroku::prelude::*;
use kiroku::recording::IgnoreReason;
use std::fs;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Replays a recorded device event log into a workflow, and optionally simulates a run of it
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON-lines file of device messages or bare interaction events
    events_path: String,

    /// Where to write the resulting workflow JSON
    #[arg(short, long, default_value = "workflow.json")]
    output: String,

    /// Optional editor configuration JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Flow id used for the recording and the simulated run
    #[arg(long, default_value = "cli-flow")]
    flow_id: String,

    /// Replay the resulting workflow through the local simulator
    #[arg(short, long)]
    simulate: bool,

    /// Make the simulated run report an error for this node id
    #[arg(long, requires = "simulate")]
    fail_on: Option<String>,
}

#[derive(Default)]
struct IngestSummary {
    appended: usize,
    coalesced: usize,
    loops_synthesized: usize,
    loops_merged: usize,
    duplicates: usize,
    ignored: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let total_start = Instant::now();

    // --- 1. Configuration and input ---
    let config = match &cli.config {
        Some(path) => EditorConfig::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load config '{}': {}", path, e))),
        None => EditorConfig::default(),
    };
    let config = EditorConfig {
        save_policy: SavePolicy::Deferred,
        ..config
    };
    let log = fs::read_to_string(&cli.events_path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read event log '{}': {}", cli.events_path, e))
    });
    let messages = parse_log(&log);
    println!("Loaded {} device messages from '{}'", messages.len(), cli.events_path);

    // --- 2. Recording ---
    let mut editor = Editor::new(&cli.flow_id, config, Box::new(MemoryPersistence::new()));
    let record_start = Instant::now();
    if !matches!(messages.first(), Some(DeviceMessage::RecordingStarted { .. })) {
        editor.handle_device_message(&DeviceMessage::RecordingStarted {
            session: "cli".to_string(),
            target_app: None,
        });
    }
    let mut summary = IngestSummary::default();
    for message in &messages {
        match editor.handle_device_message(message) {
            IngestOutcome::Appended(_) => summary.appended += 1,
            IngestOutcome::Coalesced(_) => summary.coalesced += 1,
            IngestOutcome::LoopSynthesized { .. } => summary.loops_synthesized += 1,
            IngestOutcome::LoopMerged { .. } => summary.loops_merged += 1,
            IngestOutcome::Ignored(IgnoreReason::Duplicate { .. }) => summary.duplicates += 1,
            IngestOutcome::Ignored(_) => summary.ignored += 1,
            IngestOutcome::SessionStarted(_) | IngestOutcome::SessionStopped => {}
        }
    }
    let record_duration = record_start.elapsed();

    let workflow = editor.workflow();
    println!("\nRecording Finished!");
    println!("  -> Nodes:              {}", workflow.nodes.len());
    println!("  -> Edges:              {}", workflow.edges.len());
    println!("  -> Loop nodes:         {}", workflow.loop_nodes().count());
    println!("  -> Appended:           {}", summary.appended);
    println!("  -> Coalesced text:     {}", summary.coalesced);
    println!("  -> Loops synthesized:  {}", summary.loops_synthesized);
    println!("  -> Loop merges:        {}", summary.loops_merged);
    println!("  -> Duplicates dropped: {}", summary.duplicates);
    println!("  -> Other ignored:      {}", summary.ignored);

    // --- 3. Optional simulated run ---
    if cli.simulate {
        run_simulation(&mut editor, &cli);
    }

    // --- 4. Output ---
    let json = editor
        .workflow()
        .to_json_string()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize workflow: {}", e)));
    fs::write(&cli.output, json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to write '{}': {}", cli.output, e)));

    println!("\n--- Summary ---");
    println!("Recording:        {:?}", record_duration);
    println!("Total Execution:  {:?}", total_start.elapsed());
    println!("Workflow written to '{}'", cli.output);
}

/// Each non-empty line is a device message, or a bare interaction event treated as captured.
fn parse_log(log: &str) -> Vec<DeviceMessage> {
    log.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<DeviceMessage>(line)
                .or_else(|_| serde_json::from_str::<InteractionEvent>(line).map(DeviceMessage::captured))
                .unwrap_or_else(|e| {
                    exit_with_error(&format!("Line {} is not a device message: {}", index + 1, e))
                })
        })
        .collect()
}

fn run_simulation(editor: &mut Editor, cli: &Cli) {
    println!("\nSimulating run of '{}'...", cli.flow_id);
    if !editor.start_run() {
        println!("  -> Nothing to run");
        return;
    }
    let mut simulator = Simulator::new(&cli.flow_id, editor.workflow());
    if let Some(node_id) = &cli.fail_on {
        simulator = simulator.fail_on(node_id);
    }
    println!("  -> Action executions: {}", simulator.action_count());
    for event in simulator {
        editor.handle_progress(&ProgressMessage::ActionProgress(event));
    }

    for entry in editor.execution().log().entries() {
        let marker = match entry.level {
            LogLevel::Info => " ",
            LogLevel::Success => "+",
            LogLevel::Warning => "!",
            LogLevel::Error => "x",
        };
        match &entry.node_id {
            Some(node_id) => println!("  {} #{:<4} {:<10} {}", marker, entry.ordinal, node_id, entry.message),
            None => println!("  {} #{:<4} {}", marker, entry.ordinal, entry.message),
        }
    }
    println!("  -> Final state: {:?}", editor.run_state());
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
