//! Generation prompt assembly.
//!
//! Context is a sliding window over the most recent turns. Truncation is by
//! turn count only; long turns are passed through whole.

use crate::session::Turn;

/// Number of trailing turns included as conversation context.
pub const CONTEXT_WINDOW: usize = 5;

pub const DEFAULT_PERSONA: &str = "You are a helpful Dubai real estate assistant.";

/// The last `CONTEXT_WINDOW` turns, oldest first, one `Speaker: text` per line.
pub fn context_window(history: &[Turn]) -> String {
    let start = history.len().saturating_sub(CONTEXT_WINDOW);
    history[start..]
        .iter()
        .map(Turn::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fixed instructional template around the context, utterance and lookup result.
pub fn assemble_prompt(
    persona: &str,
    history: &[Turn],
    utterance: &str,
    property_info: &str,
) -> String {
    format!(
        "\n{persona}\n\nConversation so far:\n{context}\n\nUser asked: {utterance}\n\n\
         Use this property data to answer clearly and professionally:\n{property_info}\n\nAnswer:\n",
        context = context_window(history),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<Turn> {
        (1..=n)
            .map(|i| {
                if i % 2 == 1 {
                    Turn::user(format!("question {i}"))
                } else {
                    Turn::assistant(format!("answer {i}"))
                }
            })
            .collect()
    }

    #[test]
    fn window_keeps_last_five_of_ten() {
        let turns = history(10);
        let ctx = context_window(&turns);
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(
            lines,
            [
                "AI: answer 6",
                "User: question 7",
                "AI: answer 8",
                "User: question 9",
                "AI: answer 10",
            ]
        );
        assert!(!ctx.contains("question 1"));
        assert!(!ctx.contains("answer 4"));
        assert!(!ctx.contains("question 5"));
    }

    #[test]
    fn short_history_is_used_whole() {
        let turns = history(2);
        assert_eq!(context_window(&turns), "User: question 1\nAI: answer 2");
        assert_eq!(context_window(&[]), "");
    }

    #[test]
    fn template_interpolates_all_parts() {
        let turns = vec![Turn::user("any villas?")];
        let prompt = assemble_prompt(
            DEFAULT_PERSONA,
            &turns,
            "any villas?",
            "Sorry, no properties matched your request.",
        );
        assert_eq!(
            prompt,
            "\nYou are a helpful Dubai real estate assistant.\n\n\
             Conversation so far:\nUser: any villas?\n\n\
             User asked: any villas?\n\n\
             Use this property data to answer clearly and professionally:\n\
             Sorry, no properties matched your request.\n\n\
             Answer:\n"
        );
    }
}
