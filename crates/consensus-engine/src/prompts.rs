use consensus_core::consensus::ConsensusDetection;
use consensus_core::messages::Message;
use consensus_core::tools::PROPOSE_CONSENSUS;

/// The moderator's opening framing, seeded into both views.
pub fn opening_message(
    topic: &str,
    starter: &str,
    detection: ConsensusDetection,
    sentinel: &str,
) -> Message {
    let mut content = format!(
        "MODERATOR: The topic of the conversation is: {topic}. {starter} has won the coin toss, \
         and may begin. I hope the conversation is respectful and leads to a consensus."
    );
    content.push_str(&consensus_instructions(detection, sentinel));
    Message::user(content)
}

fn consensus_instructions(detection: ConsensusDetection, sentinel: &str) -> String {
    match detection {
        ConsensusDetection::Structured => format!(
            " When you genuinely agree with the other participant, call the {PROPOSE_CONSENSUS} \
             function with a short summary of the shared position."
        ),
        ConsensusDetection::Sentinel => format!(
            " When you genuinely agree with the other participant, end your reply with the \
             single word {sentinel}."
        ),
        ConsensusDetection::Both => format!(
            " When you genuinely agree with the other participant, call the {PROPOSE_CONSENSUS} \
             function with a short summary of the shared position, or end your reply with the \
             single word {sentinel}."
        ),
    }
}

/// Tells the listener that the speaker proposed consensus.
pub fn moderator_note(proposer: &str, summary: &str) -> String {
    format!(
        "MODERATOR: {proposer} has proposed a consensus: \"{summary}\". If you agree, \
         propose consensus as well. If you do not, explain what you still disagree with."
    )
}
