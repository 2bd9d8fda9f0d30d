//! Exact (flat) nearest-neighbor index.
//!
//! Search is exhaustive: every stored vector is scored against the query.
//! For forum corpora of a few hundred thousand chunks this stays well within
//! interactive latency and, unlike approximate graphs, returns the true
//! top-k with a deterministic order.

use crate::distance::{dot_product, is_unit, UNIT_NORM_TOLERANCE};
use crate::error::{Error, Result};
use crate::types::{IndexDescriptor, IndexEntry, SearchHit};
use std::collections::HashSet;
use tracing::debug;

/// Read-only exact vector index.
///
/// Built once from validated entries and never mutated afterwards, so it can
/// be shared between any number of concurrent searches behind an `Arc`.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    descriptor: IndexDescriptor,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    /// Build an index, validating every entry.
    ///
    /// Rejects entries whose dimension differs from the descriptor, vectors
    /// with non-finite components or without unit norm, and duplicate ids.
    pub fn build(descriptor: IndexDescriptor, entries: Vec<IndexEntry>) -> Result<Self> {
        if descriptor.dimensions == 0 {
            return Err(Error::InvalidVector(
                "index dimension must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            validate_vector(&entry.id, &entry.vector, descriptor.dimensions)?;
            if !seen.insert(entry.id.as_str()) {
                return Err(Error::DuplicateId(entry.id.clone()));
            }
        }

        debug!(
            entries = entries.len(),
            dimensions = descriptor.dimensions,
            model = %descriptor.embedding_model,
            "Built flat index"
        );

        Ok(Self {
            descriptor,
            entries,
        })
    }

    /// Return the `k` entries most similar to `query`.
    ///
    /// Results are sorted by descending score; equal scores are ordered by
    /// ascending ordinal so repeated searches return identical sequences.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.descriptor.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.descriptor.dimensions,
                actual: query.len(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidVector(
                "query contains NaN or infinite values".to_string(),
            ));
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, dot_product(query, &e.vector)))
            .collect();

        let by_rank = |a: &(usize, f32), b: &(usize, f32)| {
            b.1.total_cmp(&a.1).then_with(|| {
                self.entries[a.0]
                    .ordinal
                    .cmp(&self.entries[b.0].ordinal)
            })
        };

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_rank);

        Ok(scored
            .into_iter()
            .map(|(i, score)| {
                let e = &self.entries[i];
                SearchHit {
                    id: e.id.clone(),
                    ordinal: e.ordinal,
                    byte_offset: e.byte_offset,
                    text: e.text.clone(),
                    score,
                }
            })
            .collect())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality.
    pub fn dimensions(&self) -> usize {
        self.descriptor.dimensions
    }

    /// How the stored vectors were produced.
    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    /// All entries in corpus order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

fn validate_vector(id: &str, vector: &[f32], dimensions: usize) -> Result<()> {
    if vector.len() != dimensions {
        return Err(Error::DimensionMismatch {
            expected: dimensions,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(Error::InvalidVector(format!(
            "entry '{}' contains NaN or infinite values",
            id
        )));
    }
    if !is_unit(vector, UNIT_NORM_TOLERANCE) {
        return Err(Error::InvalidVector(format!(
            "entry '{}' does not have unit norm",
            id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::normalize;
    use rand::Rng;

    fn entry(id: &str, ordinal: usize, mut vector: Vec<f32>) -> IndexEntry {
        normalize(&mut vector);
        IndexEntry {
            id: id.to_string(),
            ordinal,
            byte_offset: None,
            text: format!("text of {}", id),
            vector,
        }
    }

    fn descriptor(dimensions: usize) -> IndexDescriptor {
        IndexDescriptor::new("test-model", dimensions)
    }

    #[test]
    fn test_search_orders_by_descending_score() {
        let index = FlatIndex::build(
            descriptor(2),
            vec![
                entry("a", 0, vec![1.0, 0.0]),
                entry("b", 1, vec![0.0, 1.0]),
                entry("c", 2, vec![1.0, 1.0]),
            ],
        )
        .unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_search_respects_k() {
        let index = FlatIndex::build(
            descriptor(2),
            vec![
                entry("a", 0, vec![1.0, 0.0]),
                entry("b", 1, vec![0.0, 1.0]),
                entry("c", 2, vec![1.0, 1.0]),
            ],
        )
        .unwrap();

        assert_eq!(index.search(&[1.0, 0.0], 2).unwrap().len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 3);
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_break_by_ordinal() {
        let index = FlatIndex::build(
            descriptor(2),
            vec![
                entry("late", 5, vec![1.0, 0.0]),
                entry("early", 1, vec![1.0, 0.0]),
            ],
        )
        .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "early");
        assert_eq!(hits[1].id, "late");
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let index = FlatIndex::build(descriptor(2), vec![entry("a", 0, vec![1.0, 0.0])]).unwrap();
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let err = FlatIndex::build(
            descriptor(2),
            vec![entry("a", 0, vec![1.0, 0.0]), entry("a", 1, vec![0.0, 1.0])],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn test_build_rejects_non_unit_vectors() {
        let raw = IndexEntry {
            id: "a".to_string(),
            ordinal: 0,
            byte_offset: None,
            text: String::new(),
            vector: vec![3.0, 4.0],
        };
        assert!(matches!(
            FlatIndex::build(descriptor(2), vec![raw]),
            Err(Error::InvalidVector(_))
        ));
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = FlatIndex::build(descriptor(3), Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_matches_brute_force_ranking() {
        let mut rng = rand::rng();
        let dims = 16;
        let entries: Vec<_> = (0..200)
            .map(|i| {
                let v: Vec<f32> = (0..dims).map(|_| rng.random::<f32>() - 0.5).collect();
                entry(&format!("e{}", i), i, v)
            })
            .collect();
        let index = FlatIndex::build(descriptor(dims), entries.clone()).unwrap();

        let mut query: Vec<f32> = (0..dims).map(|_| rng.random::<f32>() - 0.5).collect();
        normalize(&mut query);

        let mut expected: Vec<(f32, usize)> = entries
            .iter()
            .map(|e| (crate::distance::dot_product(&query, &e.vector), e.ordinal))
            .collect();
        expected.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let hits = index.search(&query, 20).unwrap();
        let got: Vec<usize> = hits.iter().map(|h| h.ordinal).collect();
        let want: Vec<usize> = expected.iter().take(20).map(|(_, o)| *o).collect();
        assert_eq!(got, want);
    }
}
