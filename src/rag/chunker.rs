//! Token-bounded, overlapping chunking of the normalized corpus.
//!
//! Splitting is recursive over a separator hierarchy: blank-line runs first,
//! then blank lines, then single newlines, and finally hard token windows for
//! text that contains none of them. The resulting units are merged greedily
//! into chunks, and every chunk after the first starts with the trailing
//! `overlap` tokens of its predecessor.
//!
//! Chunks are always verbatim byte ranges of the input and every candidate is
//! measured by re-tokenizing exactly the text that would be emitted, so no
//! chunk ever exceeds `chunk_size` tokens of the embedding tokenizer.

use crate::rag::tokenizer::TokenCounter;
use crate::types::{AppError, Chunk, Result};
use sha2::{Digest, Sha256};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Separators tried from coarsest to finest.
pub const DEFAULT_SEPARATORS: [&str; 3] = ["\n\n\n", "\n\n", "\n"];

pub struct Chunker {
    counter: Arc<dyn TokenCounter>,
    chunk_size: usize,
    overlap: usize,
    separators: Vec<&'static str>,
}

impl Chunker {
    pub fn new(counter: Arc<dyn TokenCounter>, chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::Chunking(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(AppError::Chunking(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }

        Ok(Self {
            counter,
            chunk_size,
            overlap,
            separators: DEFAULT_SEPARATORS.to_vec(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunk strings.
    pub fn split_text(&self, text: &str) -> Result<Vec<String>> {
        Ok(self
            .split_ranges(text)?
            .into_iter()
            .map(|r| text[r].to_string())
            .collect())
    }

    /// Split `text` into identified chunks pointing back into `text`.
    pub fn chunk(&self, text: &str) -> Result<Vec<Chunk>> {
        let chunks: Vec<Chunk> = self
            .split_ranges(text)?
            .into_iter()
            .enumerate()
            .map(|(ordinal, range)| {
                let body = &text[range.clone()];
                Chunk {
                    id: chunk_id(ordinal, body),
                    ordinal,
                    text: body.to_string(),
                    byte_offset: Some(range.start),
                }
            })
            .collect();

        debug!(
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            overlap = self.overlap,
            "Chunked corpus"
        );
        Ok(chunks)
    }

    /// Chunk byte ranges over `text`, in order.
    pub fn split_ranges(&self, text: &str) -> Result<Vec<Range<usize>>> {
        let Some(whole) = trim_range(text, 0..text.len()) else {
            return Ok(Vec::new());
        };
        if self.counter.count(&text[whole.clone()])? <= self.chunk_size {
            return Ok(vec![whole]);
        }

        let mut units = Vec::new();
        self.split_units(text, 0..text.len(), 0, &mut units)?;
        self.merge_units(text, &units)
    }

    // ============= Splitting =============

    /// Largest unit the merger accepts: a unit must leave room for the
    /// overlap carried in from the previous chunk.
    fn unit_limit(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Break `range` into trimmed, non-empty units of at most
    /// `chunk_size - overlap` tokens.
    fn split_units(
        &self,
        text: &str,
        range: Range<usize>,
        level: usize,
        units: &mut Vec<Range<usize>>,
    ) -> Result<()> {
        let Some(range) = trim_range(text, range) else {
            return Ok(());
        };
        if self.counter.count(&text[range.clone()])? <= self.unit_limit() {
            units.push(range);
            return Ok(());
        }

        let segment = &text[range.clone()];
        let found = self.separators[level.min(self.separators.len())..]
            .iter()
            .enumerate()
            .find(|(_, sep)| segment.contains(**sep));

        let Some((offset, separator)) = found else {
            return self.hard_split(text, range, units);
        };
        let next_level = level + offset + 1;

        let mut start = range.start;
        for (idx, _) in segment.match_indices(*separator) {
            let end = range.start + idx;
            self.split_units(text, start..end, next_level, units)?;
            start = end + separator.len();
        }
        self.split_units(text, start..range.end, next_level, units)
    }

    /// Cut an indivisible range at token boundaries.
    ///
    /// Windows hold `chunk_size - overlap` tokens so that a window plus the
    /// overlap carried from its predecessor still fits into one chunk.
    fn hard_split(
        &self,
        text: &str,
        range: Range<usize>,
        units: &mut Vec<Range<usize>>,
    ) -> Result<()> {
        let segment = &text[range.clone()];
        let offsets = self.counter.offsets(segment)?;
        let step = self.unit_limit();

        let mut first = 0;
        while first < offsets.len() {
            let mut last = (first + step).min(offsets.len());
            loop {
                let start = range.start + offsets[first].0;
                let end = if last < offsets.len() {
                    range.start + offsets[last].0
                } else {
                    range.end
                };
                let window = trim_range(text, start..end);
                let fits = match &window {
                    Some(w) => self.counter.count(&text[w.clone()])? <= self.unit_limit(),
                    None => true,
                };
                if fits {
                    if let Some(w) = window {
                        units.push(w);
                    }
                    break;
                }
                if last - first <= 1 {
                    return Err(AppError::Chunking(format!(
                        "cannot cut text at byte {} below {} tokens",
                        start,
                        self.unit_limit()
                    )));
                }
                last -= 1;
            }
            first = last;
        }
        Ok(())
    }

    // ============= Merging =============

    fn merge_units(&self, text: &str, units: &[Range<usize>]) -> Result<Vec<Range<usize>>> {
        let mut chunks: Vec<Range<usize>> = Vec::new();
        let mut current: Option<Range<usize>> = None;

        for unit in units {
            let Some(cur) = current.take() else {
                current = Some(unit.clone());
                continue;
            };

            let extended = cur.start..unit.end;
            if self.counter.count(&text[extended.clone()])? <= self.chunk_size {
                current = Some(extended);
                continue;
            }

            let next_start = self.overlap_start(text, &cur, unit)?;
            chunks.push(cur);
            current = Some(next_start..unit.end);
        }

        if let Some(cur) = current {
            chunks.push(cur);
        }
        Ok(chunks)
    }

    /// Where the chunk following `closed` begins so that it re-includes up to
    /// `overlap` trailing tokens of `closed` and still holds `unit` within
    /// the size limit.
    fn overlap_start(
        &self,
        text: &str,
        closed: &Range<usize>,
        unit: &Range<usize>,
    ) -> Result<usize> {
        if self.overlap == 0 {
            return Ok(unit.start);
        }

        let offsets = self.counter.offsets(&text[closed.clone()])?;
        let n = offsets.len();
        let unit_tokens = self.counter.count(&text[unit.clone()])?;
        let mut take = self
            .overlap
            .min(n)
            .min(self.chunk_size.saturating_sub(unit_tokens));

        while take > 0 {
            let start = closed.start + offsets[n - take].0;
            if self.counter.count(&text[start..unit.end])? <= self.chunk_size {
                return Ok(start);
            }
            take -= 1;
        }
        Ok(unit.start)
    }
}

/// Stable chunk identifier: ordinal plus a digest of the text.
pub fn chunk_id(ordinal: usize, text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("chunk-{:06}-{}", ordinal, &hex::encode(digest)[..8])
}

fn trim_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let segment = &text[range.clone()];
    let leading = segment.len() - segment.trim_start().len();
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        None
    } else {
        let start = range.start + leading;
        Some(start..start + trimmed.len())
    }
}
