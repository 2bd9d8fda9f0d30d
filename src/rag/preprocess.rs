//! Corpus normalization.
//!
//! Turns raw thread records (HTML title, posts with HTML bodies and possibly
//! missing poster names) into the flat conversational text the chunker works
//! on:
//!
//! ```text
//! Thema: <title>
//! <poster>: <post>
//! <poster>: <post>
//!
//! Thema: <next title>
//! ...
//! ```

use crate::types::{AppError, RawThread, Result};
use scraper::Html;
use std::path::Path;
use tracing::{debug, info};

/// Poster name used when a post has none.
pub const UNKNOWN_POSTER: &str = "Unknown";

/// Prefix of each thread's topic header line.
pub const TOPIC_PREFIX: &str = "Thema: ";

#[derive(Debug, Clone)]
pub struct Preprocessor {
    placeholder: String,
    topic_prefix: String,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            placeholder: UNKNOWN_POSTER.to_string(),
            topic_prefix: TOPIC_PREFIX.to_string(),
        }
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize one thread into its header line plus one line per post.
    pub fn normalize_thread(&self, thread: &RawThread) -> String {
        let mut out = format!("{}{}", self.topic_prefix, strip_markup(&thread.title));
        for post in &thread.posts {
            let poster = post
                .poster
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .unwrap_or(self.placeholder.as_str());
            out.push('\n');
            out.push_str(poster);
            out.push_str(": ");
            out.push_str(&strip_markup(&post.post));
        }
        out
    }

    /// Normalize all threads, separated by a blank line.
    pub fn normalize_corpus(&self, threads: &[RawThread]) -> String {
        let text = threads
            .iter()
            .map(|t| self.normalize_thread(t))
            .collect::<Vec<_>>()
            .join("\n\n");
        debug!(threads = threads.len(), bytes = text.len(), "Normalized corpus");
        text
    }
}

/// Strip HTML markup and collapse redundant blank lines.
///
/// Entities are decoded, carriage returns dropped, every line trimmed, and
/// runs of empty lines removed so that a blank line only ever separates
/// threads in the normalized corpus.
pub fn strip_markup(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let text: String = fragment.root_element().text().collect();

    text.replace('\r', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a corpus file's JSON content.
///
/// The top level must be an array of `{ title, posts: [{ poster, post }] }`
/// records. The first malformed record aborts parsing with its index.
pub fn parse_corpus(raw: &str) -> Result<Vec<RawThread>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| AppError::Ingestion(format!("Corpus is not valid JSON: {}", e)))?;

    let serde_json::Value::Array(records) = value else {
        return Err(AppError::Ingestion(
            "Corpus must be a JSON array of thread records".to_string(),
        ));
    };

    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            serde_json::from_value::<RawThread>(record)
                .map_err(|e| AppError::Ingestion(format!("Malformed thread record {}: {}", i, e)))
        })
        .collect()
}

/// Read and parse a corpus file, keeping at most `limit` threads.
pub async fn read_corpus(
    path: impl AsRef<Path>,
    limit: Option<usize>,
) -> Result<Vec<RawThread>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Ingestion(format!("Failed to read corpus {}: {}", path.display(), e))
    })?;

    let mut threads = parse_corpus(&raw)?;
    if let Some(limit) = limit {
        threads.truncate(limit);
    }

    info!(path = %path.display(), threads = threads.len(), "Read corpus");
    Ok(threads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawPost;

    fn schlafen() -> RawThread {
        RawThread {
            title: "<b>Schlafen</b>".to_string(),
            posts: vec![
                RawPost {
                    poster: Some("Ana".to_string()),
                    post: "Mein Kind schläft schlecht".to_string(),
                },
                RawPost {
                    poster: None,
                    post: "Gleich hier".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_normalize_thread() {
        let text = Preprocessor::new().normalize_thread(&schlafen());
        assert_eq!(
            text,
            "Thema: Schlafen\nAna: Mein Kind schläft schlecht\nUnknown: Gleich hier"
        );
    }

    #[test]
    fn test_threads_separated_by_blank_line() {
        let mut second = schlafen();
        second.title = "Essen".to_string();
        let text = Preprocessor::new().normalize_corpus(&[schlafen(), second]);
        let threads: Vec<_> = text.split("\n\n").collect();
        assert_eq!(threads.len(), 2);
        assert!(threads[1].starts_with("Thema: Essen\n"));
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<p>Hallo <i>Welt</i></p>"), "Hallo Welt");
        assert_eq!(strip_markup("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(strip_markup("eins\r\n\r\n\r\nzwei\n \ndrei"), "eins\nzwei\ndrei");
        assert_eq!(strip_markup("  "), "");
    }

    #[test]
    fn test_blank_poster_uses_placeholder() {
        let thread = RawThread {
            title: "T".to_string(),
            posts: vec![RawPost {
                poster: Some("  ".to_string()),
                post: "x".to_string(),
            }],
        };
        assert!(Preprocessor::new()
            .normalize_thread(&thread)
            .ends_with("Unknown: x"));
    }

    #[test]
    fn test_parse_corpus() {
        let raw = r#"[
            {"title": "<b>Schlafen</b>", "posts": [
                {"poster": "Ana", "post": "Mein Kind schläft schlecht"},
                {"poster": null, "post": "Gleich hier"},
                {"post": "Ohne Namen"}
            ]}
        ]"#;
        let threads = parse_corpus(raw).unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].posts.len(), 3);
        assert_eq!(threads[0].posts[1].poster, None);
        assert_eq!(threads[0].posts[2].poster, None);
    }

    #[test]
    fn test_malformed_record_names_index() {
        let raw = r#"[
            {"title": "ok", "posts": []},
            {"posts": [{"poster": "x", "post": "y"}]}
        ]"#;
        let err = parse_corpus(raw).unwrap_err();
        match err {
            AppError::Ingestion(msg) => assert!(msg.contains("record 1"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_non_string_post_rejected() {
        let raw = r#"[{"title": "t", "posts": [{"poster": "x", "post": 42}]}]"#;
        assert!(matches!(parse_corpus(raw), Err(AppError::Ingestion(_))));
    }

    #[test]
    fn test_top_level_must_be_array() {
        assert!(matches!(
            parse_corpus(r#"{"title": "t"}"#),
            Err(AppError::Ingestion(_))
        ));
    }

    #[tokio::test]
    async fn test_read_corpus_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        let raw = serde_json::to_string(&vec![schlafen(), schlafen(), schlafen()]).unwrap();
        std::fs::write(&path, raw).unwrap();

        let threads = read_corpus(&path, Some(2)).await.unwrap();
        assert_eq!(threads.len(), 2);
    }
}
