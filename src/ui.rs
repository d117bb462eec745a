//! Terminal rendering of a running debate.

use std::io::{self, Write};

use consensus_core::consensus::ConsensusSource;
use consensus_core::events::DebateEvent;
use consensus_core::participant::Participant;
use tokio::sync::broadcast;
use tracing::warn;

const TITLE: &str = "ConsensusLLM";
const SUBTITLE: &str = "Using LLMs to reach a consensus";
const FALLBACK_WIDTH: usize = 80;

/// Terminal width from a `COLUMNS` value, falling back to 80.
pub fn terminal_width(columns: Option<String>) -> usize {
    columns
        .and_then(|c| c.trim().parse::<usize>().ok())
        .filter(|w| *w >= SUBTITLE.len() + 4)
        .unwrap_or(FALLBACK_WIDTH)
}

pub fn banner_lines(width: usize) -> Vec<String> {
    let rule = "-".repeat(width);
    vec![
        rule.clone(),
        format!("{TITLE:^width$}"),
        format!("{SUBTITLE:^width$}"),
        rule,
    ]
}

pub fn introduction(participants: &[Participant; 2]) -> String {
    format!(
        "Today's models are {} and {}.\nYou are the moderator and control the topic.",
        participants[0], participants[1]
    )
}

pub fn clear_screen(out: &mut impl Write) -> io::Result<()> {
    write!(out, "\x1b[2J\x1b[H")?;
    out.flush()
}

pub fn print_banner(out: &mut impl Write, width: usize, participants: &[Participant; 2]) -> io::Result<()> {
    for line in banner_lines(width) {
        writeln!(out, "{line}")?;
    }
    writeln!(out)?;
    writeln!(out, "{}", introduction(participants))?;
    writeln!(out)?;
    out.flush()
}

/// Render one event. Tokens are flushed as they arrive.
pub fn render_event(out: &mut impl Write, event: &DebateEvent) -> io::Result<()> {
    match event {
        DebateEvent::DebateStart { topic, .. } => {
            writeln!(out, "Topic: {topic}")?;
        }
        DebateEvent::TurnStart {
            participant, turn, ..
        } => {
            writeln!(out)?;
            writeln!(out, "--- [{turn}] {participant} ---")?;
        }
        DebateEvent::TextDelta { delta, .. } => {
            write!(out, "{delta}")?;
        }
        DebateEvent::ConsensusProposed {
            participant,
            summary,
            source,
            ..
        } => match (source, summary) {
            (ConsensusSource::ToolCall, Some(summary)) => {
                writeln!(out)?;
                writeln!(out, ">> {participant} proposes consensus: {summary}")?;
            }
            _ => {
                writeln!(out)?;
                writeln!(out, ">> {participant} signals consensus")?;
            }
        },
        DebateEvent::TurnComplete { .. } => {
            writeln!(out)?;
        }
        DebateEvent::DebateComplete { turns, .. } => {
            writeln!(out)?;
            writeln!(out, "Consensus reached after {turns} turns.")?;
        }
    }
    out.flush()
}

/// Print events until the runner drops its sender.
pub async fn print_events(mut rx: broadcast::Receiver<DebateEvent>) {
    let mut stdout = io::stdout();
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(e) = render_event(&mut stdout, &event) {
                    warn!(error = %e, "failed to write to stdout");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "output fell behind, events skipped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
