//! CLI entry point for kataribe
//!
//! Plays a JSON dialogue script in the terminal.

use anyhow::{Context, Result};
use kataribe::debug::{DebugConfig, StderrLogger};
use kataribe::{
    Argument, CompletionToken, DialogueConfig, DialogueOrchestrator, DialogueView,
    InMemoryVariableStorage, LocalizedLine, LocalizedOption, OptionSelector, ParamKind, ParamSpec,
    ResumeHandle, Script, ScriptedEngine, Value,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "play" => {
            if args.len() < 3 {
                eprintln!("Error: Missing script file path");
                eprintln!();
                print_usage();
                process::exit(1);
            }
            let file_path = PathBuf::from(&args[2]);
            let debug = args.get(3).map(|s| s == "--debug").unwrap_or(false);
            if let Err(err) = run_play(file_path, debug).await {
                eprintln!("Error: Player mode failed");
                eprintln!("Reason: {:#}", err);
                process::exit(1);
            }
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Error: Unknown command '{}'", command);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("kataribe - Dialogue Orchestrator");
    println!();
    println!("USAGE:");
    println!("    cargo run -- play <script.json> [--debug]");
    println!();
    println!("COMMANDS:");
    println!("    play <file> [--debug]    Play a dialogue script in the terminal");
    println!("    --help, -h               Show this help message");
    println!();
    println!("OPTIONS:");
    println!("    --debug    Log dialogue lifecycle to stderr (or set KATARIBE_DEBUG)");
    println!();
    println!("EXAMPLES:");
    println!("    cargo run -- play demos/intro.json");
    println!("    cargo run -- play demos/intro.json --debug");
}

/// Prints lines and finishes them after a short delay, like a typewriter
/// effect would
struct ConsoleView {
    delay: Duration,
    finished: Arc<Notify>,
}

impl DialogueView for ConsoleView {
    fn run_line(&self, line: &LocalizedLine, on_done: CompletionToken) {
        match line.character_name() {
            Some(name) => println!("{}: {}", name, line.text_without_character_name()),
            None => println!("{}", line.text),
        }
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_done.complete();
        });
    }

    fn run_options(&self, options: &[LocalizedOption], selector: OptionSelector) {
        for option in options {
            let marker = if option.available { " " } else { "x" };
            println!("  [{}] {}. {}", marker, option.id + 1, option.line.text);
        }
        let Some(choice) = options.iter().find(|o| o.available).map(|o| o.id) else {
            eprintln!("Error: No available option");
            return;
        };
        println!("> {}", choice + 1);
        tokio::spawn(async move {
            if let Err(err) = selector.select(choice) {
                eprintln!("Error: {}", err);
            }
        });
    }

    fn node_started(&self, node: &str) {
        println!("=== {} ===", node);
    }

    fn dialogue_complete(&self) {
        println!("[END]");
        self.finished.notify_one();
    }
}

async fn run_play(file_path: PathBuf, debug: bool) -> Result<()> {
    let mut debug_config = DebugConfig::default();
    debug_config.enabled |= debug;
    StderrLogger::init(&debug_config).context("failed to install logger")?;

    let script = Script::load(&file_path).await?;
    let engine = Arc::new(ScriptedEngine::new(script));
    let finished = Arc::new(Notify::new());

    let dialogue = DialogueOrchestrator::builder(engine.clone())
        .config(DialogueConfig {
            auto_advance_lines: true,
            verbose_logging: debug,
            ..DialogueConfig::default()
        })
        .view(Arc::new(ConsoleView {
            delay: Duration::from_millis(400),
            finished: finished.clone(),
        }))
        .variable_storage(Arc::new(InMemoryVariableStorage::new()))
        .build();
    engine.attach(dialogue.event_handler());

    dialogue.add_pausing_command_handler(
        "wait",
        vec![ParamSpec::required(ParamKind::Float)],
        |args: &[Argument], resume: ResumeHandle| {
            let seconds = args[0]
                .as_float()
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or_default();
            resume.resume_after(tokio::time::sleep(Duration::from_secs_f64(seconds)));
        },
    )?;
    dialogue.add_function("inc", 1, |args: &[Value]| {
        Value::Number(args[0].as_number().unwrap_or_default() + 1.0)
    })?;
    dialogue.on_unhandled_command(|text| println!("(command: {})", text));

    if dialogue.config().start_automatically {
        dialogue.start()?;
    }
    if dialogue.is_running() {
        finished.notified().await;
    }
    Ok(())
}
