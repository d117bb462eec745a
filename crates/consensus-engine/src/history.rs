use consensus_core::messages::{ConversationView, Message};
use consensus_core::participant::{Participant, Slot};

/// The two participants' views of the same debate.
///
/// A speaker's own turns are `assistant` messages in its view and
/// name-prefixed `user` messages in the other's. Keeping the views separate
/// is what lets each model see itself as the assistant.
#[derive(Clone, Debug)]
pub struct DualHistory {
    participants: [Participant; 2],
    views: [ConversationView; 2],
    turns: u32,
}

impl DualHistory {
    /// Both views start with the same opening message.
    pub fn new(participants: [Participant; 2], opening: Message) -> Self {
        Self {
            participants,
            views: [
                ConversationView::seeded(opening.clone()),
                ConversationView::seeded(opening),
            ],
            turns: 0,
        }
    }

    pub fn view(&self, slot: Slot) -> &ConversationView {
        &self.views[slot.index()]
    }

    pub fn participant(&self, slot: Slot) -> &Participant {
        &self.participants[slot.index()]
    }

    /// Completed turns recorded so far.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Append one finished turn to both views.
    pub fn record_turn(&mut self, speaker: Slot, text: &str) {
        let listener = speaker.other();
        let attributed = format!("{}: {}", self.participant(speaker).name, text);

        self.views[speaker.index()].push(Message::assistant(text));
        self.views[listener.index()].push(Message::user(attributed));
        self.turns += 1;
    }

    /// Address an unprefixed moderator message to one view only.
    pub fn inject_moderator_note(&mut self, target: Slot, text: impl Into<String>) {
        self.views[target.index()].push(Message::user(text));
    }

    pub fn into_views(self) -> [ConversationView; 2] {
        self.views
    }
}
