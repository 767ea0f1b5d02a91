//! Prompt builders: RAG prompt assembly and the standalone-question prompt.

use crate::types::AugmentedPrompt;
use handlebars::Handlebars;
use ragprompt_core::{AppError, AppResult, ContentChunk, ConversationTurn, Role};
use std::collections::HashMap;

/// Line separating independent pieces of retrieved information.
pub const CHUNK_SEPARATOR: &str = "~~~~~~";

/// Substituted when there is no usable conversation history.
pub const NO_HISTORY_PLACEHOLDER: &str = "No previous conversation history.";

const RAG_TEMPLATE: &str = "Using the following information, answer the question.
Different pieces of information are separated by \"{{separator}}\".

<Information>
{{context}}
<End information>

<Question>
{{question}}
<End Question>";

const STANDALONE_TEMPLATE: &str = "Given a conversation (between USER and ASSISTANT) and a follow up message from USER, output an object conforming to the given TypeScript type.

<Conversation History>
{{history}}


<USER Follow Up Message>
{{query}}

<Standalone question>";

/// Combine the user's message with retrieved chunks.
///
/// Pure: identical inputs always produce identical output. Chunks keep the
/// order they are given in.
///
/// # Example
/// ```
/// use ragprompt_prompt::assemble;
/// use ragprompt_core::ContentChunk;
///
/// let chunks = vec![ContentChunk::new("Atlas is a cloud database.", "doc-1", vec![])];
/// let prompt = assemble("What is Atlas?", &chunks, Vec::new()).unwrap();
/// assert_eq!(prompt.original_text, "What is Atlas?");
/// assert!(prompt.llm_text.contains("<Question>\nWhat is Atlas?\n<End Question>"));
/// ```
pub fn assemble(
    original_text: &str,
    chunks: &[ContentChunk],
    embedding: Vec<f32>,
) -> AppResult<AugmentedPrompt> {
    let context_block = chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", CHUNK_SEPARATOR));

    let mut variables = HashMap::new();
    variables.insert("separator", CHUNK_SEPARATOR);
    variables.insert("context", context_block.as_str());
    variables.insert("question", original_text);

    let llm_text = render_template(RAG_TEMPLATE, &variables)?;

    tracing::debug!(
        "Assembled prompt with {} chunks ({} context bytes)",
        chunks.len(),
        context_block.len()
    );

    Ok(AugmentedPrompt {
        original_text: original_text.to_string(),
        context_block,
        llm_text,
        embedding,
    })
}

/// Format the most recent non-system turns as `ROLE:\ntext` blocks.
///
/// Keeps the last `max_turns` turns, oldest first. Returns the placeholder
/// when nothing is left after filtering.
pub fn format_history(history: &[ConversationTurn], max_turns: usize) -> String {
    let turns: Vec<&ConversationTurn> = history
        .iter()
        .filter(|turn| turn.role != Role::System)
        .collect();
    let window = &turns[turns.len().saturating_sub(max_turns)..];

    let formatted = window
        .iter()
        .map(|turn| format!("{}:\n{}", turn.role.as_str().to_uppercase(), turn.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let formatted = formatted.trim();
    if formatted.is_empty() {
        NO_HISTORY_PLACEHOLDER.to_string()
    } else {
        formatted.to_string()
    }
}

/// Build the prompt asking for a standalone rewrite of a follow-up message.
pub fn build_standalone_prompt(
    history: &[ConversationTurn],
    query: &str,
    max_turns: usize,
) -> AppResult<String> {
    let history_block = format_history(history, max_turns);

    let mut variables = HashMap::new();
    variables.insert("history", history_block.as_str());
    variables.insert("query", query);

    render_template(STANDALONE_TEMPLATE, &variables)
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<&str, &str>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, never HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, score: f32) -> ContentChunk {
        ContentChunk::new(text, "test-source", vec![]).with_score(score)
    }

    #[test]
    fn test_assemble_preserves_original_text() {
        let original = "  How do I  create an index?\n";
        let prompt = assemble(original, &[chunk("Use createIndex.", 0.95)], vec![0.1]).unwrap();

        assert_eq!(prompt.original_text, original);
        assert_eq!(prompt.embedding, vec![0.1]);
    }

    #[test]
    fn test_assemble_layout() {
        let chunks = vec![chunk("first", 0.95), chunk("second", 0.92)];
        let prompt = assemble("question?", &chunks, Vec::new()).unwrap();

        let expected = "Using the following information, answer the question.
Different pieces of information are separated by \"~~~~~~\".

<Information>
first
~~~~~~
second
<End information>

<Question>
question?
<End Question>";
        assert_eq!(prompt.llm_text, expected);
        assert_eq!(prompt.context_block, "first\n~~~~~~\nsecond");
    }

    #[test]
    fn test_separator_count_matches_chunk_count() {
        for n in 0..5usize {
            let chunks: Vec<ContentChunk> =
                (0..n).map(|i| chunk(&format!("chunk {}", i), 0.9)).collect();
            let prompt = assemble("q", &chunks, Vec::new()).unwrap();

            assert_eq!(
                prompt.context_block.matches(CHUNK_SEPARATOR).count(),
                n.saturating_sub(1)
            );
        }
    }

    #[test]
    fn test_assemble_without_chunks() {
        let prompt = assemble("anything?", &[], Vec::new()).unwrap();

        assert_eq!(prompt.context_block, "");
        assert!(!prompt.has_context());
        assert!(prompt.llm_text.contains("<Information>\n\n<End information>"));
        assert!(prompt.llm_text.contains("<Question>\nanything?\n<End Question>"));
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let chunks = vec![chunk("a {{not a template}}", 0.99), chunk("<b>", 0.98)];
        let first = assemble("q & a", &chunks, vec![1.0]).unwrap();
        let second = assemble("q & a", &chunks, vec![1.0]).unwrap();

        assert_eq!(first, second);
        // Chunk text is data, never re-rendered or escaped
        assert!(first.llm_text.contains("a {{not a template}}"));
        assert!(first.llm_text.contains("<b>"));
        assert!(first.llm_text.contains("q & a"));
    }

    #[test]
    fn test_format_history_window_and_roles() {
        let history = vec![
            ConversationTurn::system("be nice"),
            ConversationTurn::user("one"),
            ConversationTurn::assistant("two"),
            ConversationTurn::user("three"),
            ConversationTurn::assistant("four"),
            ConversationTurn::user("five"),
        ];

        let formatted = format_history(&history, 4);
        assert_eq!(
            formatted,
            "ASSISTANT:\ntwo\n\nUSER:\nthree\n\nASSISTANT:\nfour\n\nUSER:\nfive"
        );
        assert!(!formatted.contains("SYSTEM"));
        assert!(!formatted.contains("be nice"));
    }

    #[test]
    fn test_format_history_placeholder() {
        assert_eq!(format_history(&[], 4), NO_HISTORY_PLACEHOLDER);
        assert_eq!(
            format_history(&[ConversationTurn::system("only system")], 4),
            NO_HISTORY_PLACEHOLDER
        );
    }

    #[test]
    fn test_build_standalone_prompt() {
        let history = vec![
            ConversationTurn::user("what is an index?"),
            ConversationTurn::assistant("  a data structure  "),
        ];
        let prompt = build_standalone_prompt(&history, "how do I make one", 4).unwrap();

        assert!(prompt.starts_with("Given a conversation (between USER and ASSISTANT)"));
        assert!(prompt.contains(
            "<Conversation History>\nUSER:\nwhat is an index?\n\nASSISTANT:\n  a data structure\n\n\n<USER Follow Up Message>\nhow do I make one\n\n<Standalone question>"
        ));
    }
}
