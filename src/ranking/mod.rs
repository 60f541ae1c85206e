//! Post-processing of raw similarity-search candidates.
//!
//! Raw hits from the vector store go through four steps: a score-threshold
//! filter, source-aware deduplication, a stable score-descending sort, and
//! truncation to `top_k`. Deduplication only engages when candidates span
//! more than one source document: a query touching many documents gets broad
//! coverage (one hit per document), while a query focused on a single large
//! document still returns multiple passages from it.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn empty_metadata() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One raw hit returned by a similarity search, prior to post-processing.
///
/// Hits produced by this service carry `source` and `chunk_index` in their
/// metadata, but candidates from other writers are tolerated: a missing
/// score deserializes to 0 and missing metadata to an empty object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
    /// Similarity, higher is more similar. Treated purely as an ordering
    /// key; no bounds are assumed.
    #[serde(default)]
    pub score: f32,
}

impl Candidate {
    pub fn new(text: impl Into<String>, metadata: Value, score: f32) -> Self {
        Self {
            text: text.into(),
            metadata,
            score,
        }
    }

    /// The originating document, when the metadata carries a non-empty
    /// `source` string.
    pub fn source(&self) -> Option<&str> {
        self.metadata
            .get("source")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|source| !source.is_empty())
    }
}

/// A candidate that survived filtering and ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub text: String,
    pub metadata: Value,
    pub score: f32,
}

impl From<Candidate> for RankedResult {
    fn from(candidate: Candidate) -> Self {
        Self {
            text: candidate.text,
            metadata: candidate.metadata,
            score: candidate.score,
        }
    }
}

/// Filters, deduplicates, sorts, and truncates search candidates.
///
/// Steps, in order:
/// 1. when `min_score > 0`, keep candidates with `score >= min_score`; at
///    the default of 0 (or below) no filtering happens, since scores carry
///    no assumed bounds and similarity can legitimately be negative;
/// 2. when the survivors span more than one distinct source, keep only the
///    highest-scoring candidate per source (ties keep the first encountered,
///    which is already backend-ranked order); candidates without a source
///    pass through untouched. With zero or one distinct source this step is
///    skipped entirely;
/// 3. stable sort by score, descending;
/// 4. truncate to `top_k` entries (`top_k == 0` yields an empty result).
///
/// Never fails: malformed candidates degrade to conservative defaults
/// instead of aborting the pass. Applying `rank` to its own output with the
/// same parameters returns the identical sequence.
pub fn rank(candidates: &[Candidate], top_k: usize, min_score: f32) -> Vec<RankedResult> {
    let filtered: Vec<&Candidate> = candidates
        .iter()
        .filter(|candidate| min_score <= 0.0 || candidate.score >= min_score)
        .collect();

    let distinct_sources: HashSet<&str> =
        filtered.iter().filter_map(|candidate| candidate.source()).collect();

    let survivors: Vec<&Candidate> = if distinct_sources.len() > 1 {
        let mut best: HashMap<&str, usize> = HashMap::new();
        for (index, candidate) in filtered.iter().enumerate() {
            if let Some(source) = candidate.source() {
                best.entry(source)
                    .and_modify(|kept| {
                        if candidate.score > filtered[*kept].score {
                            *kept = index;
                        }
                    })
                    .or_insert(index);
            }
        }

        let mut kept = Vec::with_capacity(filtered.len());
        for (index, candidate) in filtered.iter().enumerate() {
            let survives = match candidate.source() {
                Some(source) => best.get(source).copied() == Some(index),
                None => true,
            };
            if survives {
                kept.push(*candidate);
            }
        }
        kept
    } else {
        filtered
    };

    let mut results: Vec<RankedResult> = survivors
        .into_iter()
        .cloned()
        .map(RankedResult::from)
        .collect();
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(text: &str, source: &str, score: f32) -> Candidate {
        Candidate::new(text, json!({ "source": source, "chunk_index": 0 }), score)
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(rank(&[], 5, 0.0).is_empty());
    }

    #[test]
    fn top_k_zero_yields_empty_output() {
        let candidates = vec![candidate("a", "a.txt", 0.9)];
        assert!(rank(&candidates, 0, 0.0).is_empty());
    }

    #[test]
    fn distinct_sources_are_sorted_by_score() {
        let candidates = vec![
            candidate("a", "a.txt", 0.9),
            candidate("b", "b.txt", 0.5),
            candidate("c", "c.txt", 0.7),
        ];
        let results = rank(&candidates, 5, 0.0);
        assert_eq!(results.len(), 3);
        let scores: Vec<f32> = results.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.5]);
    }

    #[test]
    fn single_source_skips_dedup() {
        let candidates = vec![
            candidate("a", "doc.txt", 0.9),
            candidate("b", "doc.txt", 0.5),
            candidate("c", "doc.txt", 0.7),
        ];
        let results = rank(&candidates, 5, 0.0);
        assert_eq!(results.len(), 3);
        let scores: Vec<f32> = results.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.5]);
    }

    #[test]
    fn multiple_sources_keep_best_chunk_per_source() {
        let candidates = vec![
            candidate("a1", "a.txt", 0.9),
            candidate("a2", "a.txt", 0.4),
            candidate("b1", "b.txt", 0.6),
        ];
        let results = rank(&candidates, 5, 0.0);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, 0.9);
        assert_eq!(results[0].text, "a1");
        assert_eq!(results[1].score, 0.6);
        assert_eq!(results[1].text, "b1");
    }

    #[test]
    fn threshold_filters_before_dedup_and_sort() {
        let candidates = vec![
            candidate("a", "a.txt", 0.9),
            candidate("b", "b.txt", 0.2),
            candidate("c", "c.txt", 0.6),
        ];
        let results = rank(&candidates, 5, 0.5);
        let scores: Vec<f32> = results.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.6]);
    }

    #[test]
    fn dedup_ties_keep_first_encountered() {
        let candidates = vec![
            candidate("first", "a.txt", 0.8),
            candidate("second", "a.txt", 0.8),
            candidate("other", "b.txt", 0.3),
        ];
        let results = rank(&candidates, 5, 0.0);
        assert_eq!(results[0].text, "first");
    }

    #[test]
    fn truncates_to_top_k() {
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| candidate("t", &format!("{i}.txt"), i as f32 / 10.0))
            .collect();
        let results = rank(&candidates, 3, 0.0);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].score, 0.9);
    }

    #[test]
    fn sourceless_candidates_pass_through_dedup() {
        let candidates = vec![
            candidate("a", "a.txt", 0.9),
            Candidate::new("bare", json!({}), 0.7),
            candidate("b", "b.txt", 0.6),
        ];
        let results = rank(&candidates, 5, 0.0);
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].text, "bare");
    }

    #[test]
    fn malformed_candidates_degrade_to_defaults() {
        let raw = json!([
            { "text": "no score or metadata" },
            { "text": "scored", "metadata": { "source": "a.txt" }, "score": 0.4 }
        ]);
        let candidates: Vec<Candidate> = serde_json::from_value(raw).unwrap();
        assert_eq!(candidates[0].score, 0.0);
        assert!(candidates[0].metadata.as_object().unwrap().is_empty());

        let results = rank(&candidates, 5, 0.0);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, 0.4);
    }

    #[test]
    fn nan_scores_never_pass_a_threshold() {
        let candidates = vec![
            candidate("good", "a.txt", 0.9),
            candidate("bad", "b.txt", f32::NAN),
        ];
        let results = rank(&candidates, 5, 0.1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "good");
    }

    #[test]
    fn default_threshold_keeps_negative_scores() {
        let candidates = vec![
            candidate("near", "a.txt", 0.8),
            candidate("far", "b.txt", -0.2),
        ];
        let results = rank(&candidates, 5, 0.0);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].text, "far");

        let results = rank(&candidates, 5, 0.1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "near");
    }

    #[test]
    fn ranking_is_idempotent_on_its_own_output() {
        let candidates = vec![
            candidate("a1", "a.txt", 0.9),
            candidate("a2", "a.txt", 0.4),
            candidate("b1", "b.txt", 0.6),
            candidate("c1", "c.txt", 0.3),
        ];
        let first = rank(&candidates, 3, 0.2);

        let as_candidates: Vec<Candidate> = first
            .iter()
            .map(|r| Candidate::new(r.text.clone(), r.metadata.clone(), r.score))
            .collect();
        let second = rank(&as_candidates, 3, 0.2);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.score, b.score);
        }
    }
}
