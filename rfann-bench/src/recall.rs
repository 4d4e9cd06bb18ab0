/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! k-recall-at-k against a precomputed ground truth.

use std::collections::HashSet;

/// Fraction of true neighbors recovered, averaged over all queries.
///
/// For each query, counts how many of the first `k` ground-truth ids appear in
/// the result list, and divides the total by `k * queries`. Ground-truth rows
/// shorter than `k` contribute what they have, matching the convention of the
/// dataset generators.
///
/// # Panics
///
/// Panics if the two slices have different lengths or if `k` is zero.
pub fn knn_recall(results: &[Vec<u32>], groundtruth: &[Vec<u32>], k: usize) -> f64 {
    assert_eq!(
        results.len(),
        groundtruth.len(),
        "results and groundtruth row counts differ"
    );
    assert!(k > 0, "k cannot be zero");

    let mut correct = 0usize;
    let mut found = HashSet::new();
    for (result, truth) in results.iter().zip(groundtruth) {
        found.clear();
        found.extend(result.iter().copied());
        correct += truth.iter().take(k).filter(|id| found.contains(id)).count();
    }

    correct as f64 / (k * results.len()) as f64
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_recall() {
        let rows = vec![vec![1, 2, 3], vec![4, 5, 6]];
        assert_eq!(knn_recall(&rows, &rows, 3), 1.0);
    }

    #[test]
    fn order_does_not_matter() {
        let results = vec![vec![3, 1, 2]];
        let truth = vec![vec![1, 2, 3]];
        assert_eq!(knn_recall(&results, &truth, 3), 1.0);
    }

    #[test]
    fn partial_overlap() {
        let results = vec![vec![1, 2, 9], vec![9, 9, 9]];
        let truth = vec![vec![1, 2, 3], vec![4, 5, 6]];
        // 2 of 3 correct on the first query, 0 of 3 on the second.
        assert!((knn_recall(&results, &truth, 3) - 2.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn short_groundtruth_rows_count_what_they_have() {
        let results = vec![vec![1, 2]];
        let truth = vec![vec![1]];
        assert_eq!(knn_recall(&results, &truth, 2), 0.5);
    }

    #[test]
    #[should_panic(expected = "row counts differ")]
    fn mismatched_rows_panic() {
        knn_recall(&[vec![1]], &[], 1);
    }
}
