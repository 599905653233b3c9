// Size-bounded prompt assembly from retrieved reference texts
//
// Budgets are counted in characters rather than tokens: a cheap bound on prompt
// size that needs no tokenizer, at the price of precision.

use crate::ai::core::providers::{ChatMessage, Role};
use std::fmt::Write;

pub const MAX_DOCUMENT_CHARACTERS: usize = 8000;
pub const MAX_COMBINED_CHARACTERS: usize = 24000;

pub const DEFAULT_PREAMBLE: &str =
    "You are a helpful assistant. Answer the user's question using the conversation history";

/// Character budgets for reference texts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    /// Each candidate is truncated to this many characters
    pub per_document: usize,
    /// Sum of included (truncated) candidates never exceeds this
    pub combined: usize,
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            per_document: MAX_DOCUMENT_CHARACTERS,
            combined: MAX_COMBINED_CHARACTERS,
        }
    }
}

/// First `limit` characters of `text`
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Builds the ordered message list sent to the chat model
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    preamble: String,
    budget: PromptBudget,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_PREAMBLE, PromptBudget::default())
    }
}

impl PromptAssembler {
    pub fn new(preamble: impl Into<String>, budget: PromptBudget) -> Self {
        Self {
            preamble: preamble.into(),
            budget,
        }
    }

    /// Greedy fill in the given order: truncate each candidate, stop at the first one
    /// that would overflow the combined budget. Empty candidates are skipped.
    pub fn select_context<'a, S: AsRef<str>>(&self, candidates: &'a [S]) -> Vec<&'a str> {
        let mut selected = Vec::new();
        let mut total = 0;

        for candidate in candidates {
            let trimmed = truncate_chars(candidate.as_ref(), self.budget.per_document);
            if trimmed.is_empty() {
                continue;
            }
            let len = trimmed.chars().count();
            if total + len > self.budget.combined {
                break;
            }
            total += len;
            selected.push(trimmed);
        }

        selected
    }

    /// The single system message: preamble plus labelled reference documents
    pub fn system_message<S: AsRef<str>>(&self, candidates: &[S]) -> ChatMessage {
        let documents = self.select_context(candidates);

        let mut content = self.preamble.clone();
        if !documents.is_empty() {
            content.push_str(" and the following reference documents.\n\n");
            for (i, doc) in documents.iter().enumerate() {
                let _ = write!(content, "Document {}:\n{}\n\n", i + 1, doc);
            }
        }

        ChatMessage::new(Role::System, content)
    }

    /// System message first, then the history verbatim in its original order
    pub fn assemble<S: AsRef<str>>(
        &self,
        history: &[ChatMessage],
        candidates: &[S],
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(self.system_message(candidates));
        messages.extend(history.iter().cloned());
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_truncated_second_included() {
        let assembler = PromptAssembler::default();
        let candidates = vec!["a".repeat(9000), "b".repeat(100)];

        let selected = assembler.select_context(&candidates);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].len(), 8000);
        assert_eq!(selected[1].len(), 100);
    }

    #[test]
    fn test_overflowing_candidate_dropped_and_assembly_stops() {
        let assembler = PromptAssembler::default();
        let candidates = vec![
            "a".repeat(9000),
            "b".repeat(100),
            "c".repeat(8000),
            "d".repeat(8000), // 8000 + 100 + 8000 + 8000 > 24000
            "e".repeat(10),   // would fit, but assembly already stopped
        ];

        let selected = assembler.select_context(&candidates);
        assert_eq!(selected.len(), 3);
        assert!(selected[2].starts_with('c'));
        let total: usize = selected.iter().map(|s| s.len()).sum();
        assert_eq!(total, 16100);
    }

    #[test]
    fn test_third_candidate_omitted_under_tight_budget() {
        let assembler = PromptAssembler::new(
            DEFAULT_PREAMBLE,
            PromptBudget {
                per_document: 8000,
                combined: 8200,
            },
        );
        let candidates = vec!["a".repeat(9000), "b".repeat(100), "c".repeat(500)];

        let selected = assembler.select_context(&candidates);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].len(), 8000);
        assert_eq!(selected[1].len(), 100);
    }

    #[test]
    fn test_empty_candidates_are_skipped() {
        let assembler = PromptAssembler::default();
        let candidates = vec!["", "real"];

        let message = assembler.system_message(&candidates);
        assert!(message.content.contains("Document 1:\nreal\n\n"));
        assert!(!message.content.contains("Document 2"));
    }

    #[test]
    fn test_no_candidates_gives_bare_preamble() {
        let assembler = PromptAssembler::default();
        let message = assembler.system_message::<String>(&[]);

        assert_eq!(message.role, Role::System);
        assert_eq!(message.content, DEFAULT_PREAMBLE);
    }

    #[test]
    fn test_assemble_keeps_history_order() {
        let assembler = PromptAssembler::default();
        let history = vec![
            ChatMessage::new(Role::User, "What is in the report?"),
            ChatMessage::new(Role::Assistant, "Revenue figures."),
            ChatMessage::new(Role::User, "Which quarter?"),
        ];

        let messages = assembler.assemble(&history, &["Q3 revenue rose 4%."]);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0]
            .content
            .ends_with("reference documents.\n\nDocument 1:\nQ3 revenue rose 4%.\n\n"));
        assert_eq!(&messages[1..], &history[..]);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
