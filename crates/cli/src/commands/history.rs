//! `streambot history` — show a user's stored turns.

use streambot_config::AppConfig;
use streambot_core::history::ConversationTurn;

pub async fn run(user: &str, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = super::open_history(&config).await?;
    let turns = store.fetch_recent(user, limit).await?;

    println!("History for '{user}' ({} backend)", store.name());
    println!("====================");

    if turns.is_empty() {
        println!("  No turns stored yet.");
        return Ok(());
    }

    for turn in &turns {
        println!("{}", format_turn(turn));
    }

    Ok(())
}

fn format_turn(turn: &ConversationTurn) -> String {
    let tool_messages = turn.decode_tool_messages().map(|m| m.len()).unwrap_or(0);
    format!(
        "[{}] tokens={} tool_messages={}\n  Q: {}\n  A: {}\n",
        turn.created_at.format("%Y-%m-%d %H:%M:%S"),
        turn.token_count,
        tool_messages,
        preview(&turn.question, 120),
        preview(&turn.answer, 240),
    )
}

/// First `max` characters of `text` on one line.
fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("two\nlines", 20), "two lines");
    }

    #[test]
    fn turn_formatting() {
        let turn = ConversationTurn {
            user_id: "u1".into(),
            question: "what time is it?".into(),
            answer: "noon".into(),
            tool_messages: String::new(),
            token_count: 17,
            is_final: true,
            created_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        let text = format_turn(&turn);
        assert!(text.starts_with("[2024-05-01 12:00:00] tokens=17 tool_messages=0"));
        assert!(text.contains("Q: what time is it?"));
        assert!(text.contains("A: noon"));
    }
}
