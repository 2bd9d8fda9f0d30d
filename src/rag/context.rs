//! Context assembly under a token budget.

use crate::rag::tokenizer::TokenCounter;
use crate::types::{Context, Result, RetrievalSet};
use std::sync::Arc;
use tracing::debug;

pub const CONVERSATION_OPEN: &str = "<conversation>";
pub const CONVERSATION_CLOSE: &str = "</conversation>";
const SEPARATOR: &str = "\n\n";

/// Concatenates retrieved chunks, best first, each wrapped in
/// `<conversation>` tags, until the next chunk would exceed the budget.
#[derive(Clone)]
pub struct ContextAssembler {
    counter: Arc<dyn TokenCounter>,
    budget: usize,
}

impl ContextAssembler {
    pub fn new(counter: Arc<dyn TokenCounter>, budget: usize) -> Self {
        Self { counter, budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Build the context for `set`.
    ///
    /// Chunks are kept whole. The first chunk that does not fit ends
    /// assembly; it and every lower ranked chunk are dropped. The token count
    /// is measured on the complete context string, tags and separators
    /// included.
    pub fn assemble(&self, set: &RetrievalSet) -> Result<Context> {
        let mut context = Context::default();

        for (i, result) in set.iter().enumerate() {
            let mut candidate = context.text.clone();
            if !candidate.is_empty() {
                candidate.push_str(SEPARATOR);
            }
            candidate.push_str(CONVERSATION_OPEN);
            candidate.push_str(&result.chunk.text);
            candidate.push_str(CONVERSATION_CLOSE);

            let tokens = self.counter.count(&candidate)?;
            if tokens > self.budget {
                context.dropped = set.len() - i;
                debug!(
                    kept = context.chunk_ids.len(),
                    dropped = context.dropped,
                    budget = self.budget,
                    "Context budget reached"
                );
                break;
            }

            context.text = candidate;
            context.token_count = tokens;
            context.chunk_ids.push(result.chunk.id.clone());
        }

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::tokenizer::tests::word_tokenizer;
    use crate::types::{Chunk, RetrievalResult};

    fn set(texts: &[&str]) -> RetrievalSet {
        let candidates = texts
            .iter()
            .enumerate()
            .map(|(i, text)| RetrievalResult {
                chunk: Chunk {
                    id: format!("c{}", i),
                    ordinal: i,
                    text: text.to_string(),
                    byte_offset: None,
                },
                score: 0.9 - i as f32 * 0.01,
            })
            .collect();
        RetrievalSet::from_ranked(candidates, 20, 0.0).unwrap()
    }

    fn assembler(budget: usize) -> ContextAssembler {
        ContextAssembler::new(Arc::new(word_tokenizer()), budget)
    }

    #[test]
    fn test_wraps_chunks_in_retrieval_order() {
        let context = assembler(1000)
            .assemble(&set(&["Ana: eins", "Ben: zwei"]))
            .unwrap();
        assert_eq!(
            context.text,
            "<conversation>Ana: eins</conversation>\n\n<conversation>Ben: zwei</conversation>"
        );
        assert_eq!(context.chunk_ids, vec!["c0", "c1"]);
        assert_eq!(context.dropped, 0);
    }

    #[test]
    fn test_budget_drops_whole_chunks() {
        let tok = word_tokenizer();
        let first = "<conversation>a b c</conversation>";
        let budget = tok.count(first).unwrap() + 2;

        let context = assembler(budget)
            .assemble(&set(&["a b c", "d e f", "g"]))
            .unwrap();
        assert_eq!(context.text, first);
        assert_eq!(context.dropped, 2);
        assert!(tok.count(&context.text).unwrap() <= budget);
        assert_eq!(context.token_count, tok.count(first).unwrap());
    }

    #[test]
    fn test_stops_at_first_overflow() {
        // The third chunk would fit on its own but follows a dropped one
        let tok = word_tokenizer();
        let budget = tok.count("<conversation>x</conversation>").unwrap() + 1;
        let context = assembler(budget)
            .assemble(&set(&["x", "ein sehr langer Beitrag", "y"]))
            .unwrap();
        assert_eq!(context.chunk_ids, vec!["c0"]);
        assert_eq!(context.dropped, 2);
    }

    #[test]
    fn test_empty_set_yields_empty_context() {
        let context = assembler(100).assemble(&RetrievalSet::default()).unwrap();
        assert!(context.is_empty());
        assert_eq!(context.text, "");
        assert_eq!(context.token_count, 0);
    }

    #[test]
    fn test_first_chunk_over_budget_yields_empty_context() {
        let context = assembler(3).assemble(&set(&["viel zu lang für das Budget"])).unwrap();
        assert!(context.is_empty());
        assert_eq!(context.dropped, 1);
    }
}
