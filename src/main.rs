//! # consensus
//!
//! Two models on an Ollama server debate a topic, taking turns, until both
//! have agreed.

mod ui;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, warn, Level};

use consensus_core::{ConsensusDetection, Participant, Slot};
use consensus_engine::{DebateRunner, EngineError, RunnerConfig};
use consensus_llm::{OllamaConfig, OllamaProvider};
use consensus_settings::{load_settings_from_path, settings_path, ConsensusSettings};
use consensus_telemetry::{init_telemetry, parse_level, LogFormat, TelemetryConfig};

/// Let two language models argue a topic until they reach consensus.
#[derive(Parser, Debug)]
#[command(name = "consensus", version, about)]
struct Cli {
    /// Settings file (defaults to ./consensus.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Topic to debate. Prompted for on stdin when omitted.
    #[arg(long)]
    topic: Option<String>,

    /// Which model speaks first, 0 or 1. A coin toss when omitted.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    start: Option<u8>,

    /// Give up after this many turns (0 for no limit).
    #[arg(long)]
    max_turns: Option<u32>,

    /// How consensus is recognised: structured, sentinel or both.
    #[arg(long)]
    detection: Option<ConsensusDetection>,

    /// Emit logs as JSON on stderr.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, settings: &mut ConsensusSettings) {
        if let Some(max_turns) = self.max_turns {
            settings.max_turns = max_turns;
        }
        if let Some(detection) = self.detection {
            settings.consensus_detection = detection;
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
    }
}

fn telemetry_config(settings: &ConsensusSettings) -> TelemetryConfig {
    TelemetryConfig {
        log_level: parse_level(&settings.logging.level).unwrap_or(Level::WARN),
        module_levels: Vec::new(),
        format: settings.logging.format,
    }
}

const TOPIC_PROMPT: &str = "Today's topic or question: ";

fn read_topic(cli_topic: Option<String>) -> Result<String> {
    let topic = match cli_topic {
        Some(topic) => topic,
        None => {
            let mut stdout = io::stdout();
            write!(stdout, "{TOPIC_PROMPT}")?;
            stdout.flush()?;
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read topic from stdin")?;
            line
        }
    };
    let topic = topic.trim().to_string();
    if topic.is_empty() {
        return Err(EngineError::EmptyTopic.into());
    }
    Ok(topic)
}

fn pick_starter(requested: Option<u8>) -> Slot {
    match requested.and_then(|i| Slot::from_index(usize::from(i))) {
        Some(slot) => slot,
        None if rand::random::<bool>() => Slot::First,
        None => Slot::Second,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("invalid configuration")?;

    init_telemetry(&telemetry_config(&settings)).context("failed to initialise logging")?;
    if parse_level(&settings.logging.level).is_none() {
        warn!(level = %settings.logging.level, "unknown log level, using warn");
    }

    let participants = Participant::pair(settings.model1.clone(), settings.model2.clone());
    let mut stdout = io::stdout();
    ui::clear_screen(&mut stdout)?;
    ui::print_banner(
        &mut stdout,
        ui::terminal_width(std::env::var("COLUMNS").ok()),
        &participants,
    )?;

    let topic = read_topic(cli.topic.clone())?;
    let start = pick_starter(cli.start);
    info!(starter = %participants[start.index()], "coin toss decided");

    let provider = OllamaProvider::new(OllamaConfig {
        base_url: settings.ollama_url.clone(),
        detection: settings.consensus_detection,
        idle_timeout: settings.idle_timeout(),
    })
    .context("failed to build HTTP client")?;
    info!(endpoint = %provider.chat_url(), "using Ollama endpoint");

    let (event_tx, event_rx) = broadcast::channel(1024);
    let printer = tokio::spawn(ui::print_events(event_rx));

    let runner = DebateRunner::shared(
        Arc::new(provider),
        participants,
        RunnerConfig {
            detection: settings.consensus_detection,
            sentinel: settings.sentinel.clone(),
            max_turns: settings.max_turns_cap(),
        },
        event_tx,
    );

    let result = tokio::select! {
        result = runner.run(&topic, start) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    // Closing the channel lets the printer drain and exit.
    drop(runner);
    if let Err(e) = printer.await {
        warn!(error = %e, "output task failed");
    }

    match result {
        Some(outcome) => {
            let outcome = outcome.context("debate aborted")?;
            let (first, second) = outcome.into_views();
            info!(
                first_view = first.len(),
                second_view = second.len(),
                "debate finished"
            );
            Ok(())
        }
        None => {
            println!();
            info!("interrupted");
            Ok(())
        }
    }
}
