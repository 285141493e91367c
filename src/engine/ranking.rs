// src/engine/ranking.rs

// Competition ("1224") ranking and percentiles over a test's population.

use std::cmp::Ordering;

use crate::models::attempt::Attempt;

/// Rank and percentile assigned to one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedAttempt {
    pub attempt_id: String,
    pub rank: u32,
    pub percentile: f64,
}

/// Ranks scores already sorted in descending order.
///
/// Ties share the rank of the first score in their run; the next distinct
/// score takes its 1-based position. Percentile is
/// `round((N - rank) / N * 10000) / 100`.
pub fn rank_sorted(sorted_desc: &[f64]) -> Vec<(u32, f64)> {
    let n = sorted_desc.len();
    let mut out = Vec::with_capacity(n);
    let mut rank = 0u32;

    for (i, score) in sorted_desc.iter().enumerate() {
        if i == 0 || *score < sorted_desc[i - 1] {
            rank = i as u32 + 1;
        }
        let percentile = ((n as f64 - rank as f64) / n as f64 * 10000.0).round() / 100.0;
        out.push((rank, percentile));
    }
    out
}

/// Ranks every attempt that has a result, highest `marks_obtained` first.
pub fn rank_attempts(attempts: &[Attempt]) -> Vec<RankedAttempt> {
    let mut scored: Vec<(&str, f64)> = attempts
        .iter()
        .filter_map(|a| a.result.as_ref().map(|r| (a.id.as_str(), r.marks_obtained)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let scores: Vec<f64> = scored.iter().map(|(_, s)| *s).collect();
    scored
        .iter()
        .zip(rank_sorted(&scores))
        .map(|((id, _), (rank, percentile))| RankedAttempt {
            attempt_id: id.to_string(),
            rank,
            percentile,
        })
        .collect()
}
