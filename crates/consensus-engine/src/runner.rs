use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, trace};

use consensus_core::consensus::{ConsensusDetection, ConsensusSource};
use consensus_core::events::DebateEvent;
use consensus_core::ids::DebateId;
use consensus_core::messages::ConversationView;
use consensus_core::participant::{Participant, Slot};
use consensus_core::provider::ChatProvider;
use consensus_llm::{ask_model, TurnSink};

use crate::consensus::{ends_with_sentinel, ConsensusState};
use crate::error::EngineError;
use crate::history::DualHistory;
use crate::prompts;

pub const DEFAULT_SENTINEL: &str = "CONSENSUS";

/// Configuration for the debate runner.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub detection: ConsensusDetection,
    pub sentinel: String,
    /// Stop with an error after this many turns without consensus.
    pub max_turns: Option<u32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            detection: ConsensusDetection::default(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            max_turns: None,
        }
    }
}

/// Result of a debate that reached consensus.
#[derive(Clone, Debug)]
pub struct DebateOutcome {
    pub debate_id: DebateId,
    pub views: [ConversationView; 2],
    pub turns: u32,
}

impl DebateOutcome {
    pub fn into_views(self) -> (ConversationView, ConversationView) {
        let [first, second] = self.views;
        (first, second)
    }
}

/// Drives the turn loop: one model call at a time, strictly alternating,
/// until both participants have agreed.
pub struct DebateRunner {
    providers: [Arc<dyn ChatProvider>; 2],
    participants: [Participant; 2],
    config: RunnerConfig,
    event_tx: broadcast::Sender<DebateEvent>,
}

/// What one turn produced, applied to the debate only once the stream has
/// completed.
struct TurnContext<'a> {
    debate_id: &'a DebateId,
    speaker: &'a Participant,
    event_tx: &'a broadcast::Sender<DebateEvent>,
    accept_proposals: bool,
    proposals: Vec<String>,
}

impl TurnSink for TurnContext<'_> {
    fn on_token(&mut self, token: &str) {
        publish(
            self.event_tx,
            DebateEvent::TextDelta {
                debate_id: self.debate_id.clone(),
                slot: self.speaker.slot,
                delta: token.to_string(),
            },
        );
    }

    fn on_consensus(&mut self, summary: &str) {
        if !self.accept_proposals {
            debug!("ignoring consensus function call, structured detection is off");
            return;
        }
        self.proposals.push(summary.to_string());
        publish(
            self.event_tx,
            DebateEvent::ConsensusProposed {
                debate_id: self.debate_id.clone(),
                slot: self.speaker.slot,
                participant: self.speaker.name.clone(),
                summary: Some(summary.to_string()),
                source: ConsensusSource::ToolCall,
            },
        );
    }
}

fn publish(event_tx: &broadcast::Sender<DebateEvent>, event: DebateEvent) {
    if event_tx.send(event).is_err() {
        trace!("no event receivers, event dropped");
    }
}

impl DebateRunner {
    pub fn new(
        providers: [Arc<dyn ChatProvider>; 2],
        participants: [Participant; 2],
        config: RunnerConfig,
        event_tx: broadcast::Sender<DebateEvent>,
    ) -> Self {
        Self {
            providers,
            participants,
            config,
            event_tx,
        }
    }

    /// Both participants served by the same endpoint.
    pub fn shared(
        provider: Arc<dyn ChatProvider>,
        participants: [Participant; 2],
        config: RunnerConfig,
        event_tx: broadcast::Sender<DebateEvent>,
    ) -> Self {
        Self::new([provider.clone(), provider], participants, config, event_tx)
    }

    /// Run a full debate on `topic`, `start` speaking first.
    ///
    /// Any failed model call aborts the whole run.
    #[instrument(skip(self, topic), fields(debate_id = tracing::field::Empty))]
    pub async fn run(&self, topic: &str, start: Slot) -> Result<DebateOutcome, EngineError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(EngineError::EmptyTopic);
        }

        let debate_id = DebateId::new();
        tracing::Span::current().record("debate_id", debate_id.as_str());

        let opening = prompts::opening_message(
            topic,
            &self.participants[start.index()].name,
            self.config.detection,
            &self.config.sentinel,
        );
        let mut history = DualHistory::new(self.participants.clone(), opening);
        let mut consensus = ConsensusState::new();

        info!(
            first = %self.participants[0],
            second = %self.participants[1],
            detection = %self.config.detection,
            "debate started"
        );
        publish(
            &self.event_tx,
            DebateEvent::DebateStart {
                debate_id: debate_id.clone(),
                topic: topic.to_string(),
                starting: start,
            },
        );

        let mut current = start;
        while !consensus.is_unanimous() {
            if let Some(max) = self.config.max_turns.filter(|m| *m > 0) {
                if history.turns() >= max {
                    return Err(EngineError::MaxTurnsExceeded(max));
                }
            }

            self.execute_turn(&debate_id, &mut history, &mut consensus, current)
                .await?;
            current = current.other();
        }

        let turns = history.turns();
        info!(turns, "consensus reached");
        publish(
            &self.event_tx,
            DebateEvent::DebateComplete {
                debate_id: debate_id.clone(),
                turns,
            },
        );

        Ok(DebateOutcome {
            debate_id,
            views: history.into_views(),
            turns,
        })
    }

    /// One turn: stream the speaker's reply, then apply it to the history and
    /// consensus flags together.
    ///
    /// Moderator notes for proposals land in the other view after the
    /// speaker's attributed turn, not before it.
    #[instrument(skip_all, fields(participant = %history.participant(slot), turn = history.turns() + 1))]
    async fn execute_turn(
        &self,
        debate_id: &DebateId,
        history: &mut DualHistory,
        consensus: &mut ConsensusState,
        slot: Slot,
    ) -> Result<(), EngineError> {
        let turn = history.turns() + 1;
        let speaker = &self.participants[slot.index()];

        publish(
            &self.event_tx,
            DebateEvent::TurnStart {
                debate_id: debate_id.clone(),
                slot,
                participant: speaker.name.clone(),
                turn,
            },
        );

        let mut ctx = TurnContext {
            debate_id,
            speaker,
            event_tx: &self.event_tx,
            accept_proposals: self.config.detection.uses_tool(),
            proposals: Vec::new(),
        };

        let text = ask_model(
            self.providers[slot.index()].as_ref(),
            &speaker.name,
            history.view(slot).messages(),
            &mut ctx,
        )
        .await
        .map_err(|source| EngineError::Turn {
            participant: speaker.name.clone(),
            slot,
            turn,
            source,
        })?;

        let proposals = ctx.proposals;

        let sentinel_hit = self.config.detection.uses_sentinel()
            && ends_with_sentinel(&text, &self.config.sentinel);
        if sentinel_hit {
            publish(
                &self.event_tx,
                DebateEvent::ConsensusProposed {
                    debate_id: debate_id.clone(),
                    slot,
                    participant: speaker.name.clone(),
                    summary: None,
                    source: ConsensusSource::Sentinel,
                },
            );
        }

        history.record_turn(slot, &text);
        for summary in &proposals {
            history.inject_moderator_note(slot.other(), prompts::moderator_note(&speaker.name, summary));
        }

        if (!proposals.is_empty() || sentinel_hit) && consensus.mark(slot) {
            info!(participant = %speaker, "participant agreed");
        }

        debug!(chars = text.len(), proposals = proposals.len(), sentinel_hit, "turn complete");
        publish(
            &self.event_tx,
            DebateEvent::TurnComplete {
                debate_id: debate_id.clone(),
                slot,
                turn,
                text,
            },
        );

        Ok(())
    }
}

/// Run a debate between two models on one endpoint and return both views.
///
/// `start` must be 0 or 1. Events are discarded; use [`DebateRunner`]
/// directly to observe the debate as it streams.
pub async fn run_conversation(
    provider: Arc<dyn ChatProvider>,
    participants: [Participant; 2],
    topic: &str,
    start: usize,
    config: RunnerConfig,
) -> Result<(ConversationView, ConversationView), EngineError> {
    let start = Slot::from_index(start).ok_or(EngineError::InvalidStart(start))?;
    let (event_tx, _) = broadcast::channel(16);
    let runner = DebateRunner::shared(provider, participants, config, event_tx);
    Ok(runner.run(topic, start).await?.into_views())
}
