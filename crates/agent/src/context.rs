//! Context builder — turns stored history plus a new prompt into the
//! message sequence sent to the provider.

use streambot_core::history::HistoryStore;
use streambot_core::message::Message;
use tracing::{debug, warn};

/// Build the conversation for `prompt`.
///
/// Replays up to `window` of the user's most recent turns (oldest first),
/// skipping any without both a question and an answer. Recorded tool
/// messages are spliced back in between the question and the answer. The
/// result always ends with the new prompt, so it is never empty.
pub async fn build_context(history: &dyn HistoryStore, user_id: &str, prompt: &str, window: usize) -> Vec<Message> {
    let turns = match history.fetch_recent(user_id, window).await {
        Ok(turns) => turns,
        Err(e) => {
            warn!(user_id, error = %e, "History fetch failed; continuing without history");
            Vec::new()
        }
    };

    let mut messages = Vec::with_capacity(turns.len() * 2 + 1);
    for turn in turns.iter().filter(|t| t.is_answered()) {
        messages.push(Message::user(turn.question.clone()));

        match turn.decode_tool_messages() {
            Ok(tool_messages) => messages.extend(tool_messages),
            Err(e) => {
                warn!(user_id, error = %e, "Skipping unreadable tool messages in history");
            }
        }

        messages.push(Message::assistant(turn.answer.clone()));
    }
    messages.push(Message::user(prompt));

    debug!(user_id, turns = turns.len(), messages = messages.len(), "Built context");
    messages
}
