/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The window search tree: nested bucket indices over the filter-sorted corpus
//! and the range-filtered query engine on top of them.

use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;

use crate::{
    graph::{BuildParams, QueryParams, SpatialIndex, VamanaIndex},
    layout::{BucketLayout, LayoutError},
    neighbor::Neighbor,
    store::{PointStore, StoreError},
};

/// Error type for [`WindowTree::build`].
#[derive(Debug, Error)]
pub enum TreeBuildError {
    #[error("corpus has {points} points but {filters} filter values")]
    CountMismatch { points: usize, filters: usize },
    #[error("filter value at index {index} is not finite ({value})")]
    NonFiniteFilter { index: usize, value: f32 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Error type for [`WindowTree::optimized_postfiltering_search`].
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query has dimension {actual} but the corpus has dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A single query answer: an id from the original (pre-sort) corpus order and
/// its Euclidean distance to the query.
pub type SearchResult = (u32, f32);

/// Structural parameters of the tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// Maximum bucket size that need not be split further.
    pub cutoff: usize,
    /// Number of children each split produces.
    pub split_factor: usize,
}

/// A window search tree over a filter-tagged corpus.
///
/// Construction sorts the corpus by filter value and builds one graph index
/// per bucket at every level of the [`BucketLayout`]. The tree is read-only
/// afterwards: queries take `&self`, hold no locks, and may run concurrently.
#[derive(Debug)]
pub struct WindowTree<G: SpatialIndex = VamanaIndex> {
    store: Arc<PointStore>,
    /// Filter values in sorted order; `filters[i]` belongs to sorted id `i`.
    filters: Box<[f32]>,
    /// Sorted id -> original id.
    decoding: Box<[u32]>,
    layout: BucketLayout,
    /// `buckets[level][bucket]`, aligned with the layout.
    buckets: Vec<Vec<G>>,
}

impl<G: SpatialIndex> WindowTree<G> {
    /// Build a tree over `points` (row-major, `dim` scalars per point), where
    /// `filters[i]` tags point `i`.
    ///
    /// Runs on the ambient rayon pool: the sort, the corpus reorder and every
    /// per-bucket graph build are parallel. Install a dedicated pool around
    /// this call to bound construction parallelism.
    pub fn build(
        points: Vec<f32>,
        dim: usize,
        filters: &[f32],
        tree_params: TreeParams,
        build_params: &BuildParams,
    ) -> Result<Self, TreeBuildError> {
        if dim == 0 {
            return Err(StoreError::ZeroDimension.into());
        }
        if points.len() % dim != 0 {
            return Err(StoreError::LengthNotDivisible {
                len: points.len(),
                dim,
            }
            .into());
        }
        if points.len() / dim != filters.len() {
            return Err(TreeBuildError::CountMismatch {
                points: points.len() / dim,
                filters: filters.len(),
            });
        }
        if let Some(index) = filters.iter().position(|value| !value.is_finite()) {
            return Err(TreeBuildError::NonFiniteFilter {
                index,
                value: filters[index],
            });
        }

        let n = filters.len();

        // Permutation sorting the filters non-decreasingly. Ties keep an
        // arbitrary but deterministic order.
        let mut permutation: Vec<u32> = (0..n as u32).collect();
        permutation.par_sort_unstable_by(|&a, &b| {
            filters[a as usize]
                .partial_cmp(&filters[b as usize])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        // Reorder the corpus so sorted id `i` holds the vector originally at
        // `permutation[i]`. Each destination row is written by exactly one
        // task.
        let mut sorted_points = vec![0.0f32; points.len()];
        sorted_points
            .par_chunks_mut(dim)
            .enumerate()
            .for_each(|(sorted_id, row)| {
                let original = permutation[sorted_id] as usize;
                row.copy_from_slice(&points[original * dim..(original + 1) * dim]);
            });

        let sorted_filters: Vec<f32> = permutation
            .iter()
            .map(|&original| filters[original as usize])
            .collect();

        let store = Arc::new(PointStore::from_flat(sorted_points, dim)?);
        let layout = BucketLayout::new(n, tree_params.cutoff, tree_params.split_factor)?;

        tracing::info!(
            points = n,
            dim,
            levels = layout.levels(),
            "building window search tree"
        );

        // Every (level, bucket) graph build is independent.
        let jobs: Vec<(usize, usize, std::ops::Range<usize>)> = layout.iter_buckets().collect();
        let built: Vec<G> = jobs
            .into_par_iter()
            .map(|(_, _, range)| {
                let subset = crate::store::SubsetView::contiguous(
                    Arc::clone(&store),
                    range.start,
                    range.end,
                );
                G::build(subset, &sorted_filters[range], build_params)
            })
            .collect();

        let mut buckets: Vec<Vec<G>> = Vec::with_capacity(layout.levels());
        let mut remaining = built.into_iter();
        for level in 0..layout.levels() {
            buckets.push(remaining.by_ref().take(layout.num_buckets(level)).collect());
        }

        Ok(Self {
            store,
            filters: sorted_filters.into_boxed_slice(),
            decoding: permutation.into_boxed_slice(),
            layout,
            buckets,
        })
    }

    /// Number of points in the corpus.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Dimension of the corpus vectors.
    pub fn dim(&self) -> usize {
        self.store.dim()
    }

    /// The bucket layout of the tree.
    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    /// Answer a range-filtered nearest-neighbor query.
    ///
    /// Returns up to `params.k()` original-corpus ids whose filter value lies
    /// in the closed interval `[lo, hi]`, ordered by non-decreasing Euclidean
    /// distance to `query`. Graph traversal ranks by squared distance; the
    /// square root is taken once per reported result. The search runs entirely
    /// on the calling thread.
    ///
    /// An interval containing no corpus point yields an empty result, not an
    /// error.
    pub fn optimized_postfiltering_search(
        &self,
        query: &[f32],
        (lo, hi): (f32, f32),
        params: &QueryParams,
    ) -> Result<Vec<SearchResult>, QueryError> {
        if query.len() != self.dim() {
            return Err(QueryError::DimensionMismatch {
                expected: self.dim(),
                actual: query.len(),
            });
        }
        if params.k() == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if hi < self.filters[0] || lo > self.filters[self.len() - 1] {
            return Ok(Vec::new());
        }

        let (start, end) = resolve_interval(&self.filters, lo, hi);
        if start >= end {
            return Ok(Vec::new());
        }

        let span = self.layout.covering_span(start, end);
        let offsets = self.layout.offsets(span.level);

        // Per-bucket beam searches, sequential in bucket order so that merge
        // ties are deterministic.
        let mut candidates: Vec<Neighbor> = Vec::new();
        for bucket in span.start..span.end {
            let base = offsets[bucket];
            if base == offsets[bucket + 1] {
                continue;
            }
            candidates.extend(
                self.buckets[span.level][bucket]
                    .beam_search(query, params)
                    .into_iter()
                    .map(|nbr| Neighbor::new(base as u32 + nbr.id, nbr.distance)),
            );
        }

        // Merge in distance order (stable: equal distances keep bucket
        // arrival order), drop out-of-range candidates, then take the best k.
        //
        // The range check also covers the single-bucket path: a bucket can be
        // wider than the requested interval, and every returned point must
        // satisfy the filter predicate.
        candidates.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(candidates
            .into_iter()
            .filter(|nbr| {
                let sorted_id = nbr.id as usize;
                start <= sorted_id && sorted_id < end
            })
            .take(params.k())
            .map(|nbr| (self.decoding[nbr.id as usize], nbr.distance.sqrt()))
            .collect())
    }
}

/// Translate a closed filter interval into the half-open sorted-id range
/// containing exactly the in-range points.
///
/// `filters` must be sorted non-decreasingly. Both bounds use a lower-bound
/// binary search; the end bound then advances past every point whose filter
/// equals `hi` so the closed upper bound is honored under duplicates.
fn resolve_interval(filters: &[f32], lo: f32, hi: f32) -> (usize, usize) {
    let start = filters.partition_point(|&value| value < lo);
    let mut end = filters.partition_point(|&value| value < hi);
    while end < filters.len() && filters[end] == hi {
        end += 1;
    }
    (start, end)
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::graph::ExhaustiveIndex;

    fn build_params() -> BuildParams {
        BuildParams::new(8, 16, 1.2).unwrap()
    }

    fn unit_tree() -> WindowTree {
        // Four points on a line with evenly spaced filters.
        WindowTree::build(
            vec![0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0],
            2,
            &[0.1, 0.2, 0.3, 0.4],
            TreeParams {
                cutoff: 8,
                split_factor: 2,
            },
            &build_params(),
        )
        .unwrap()
    }

    #[test]
    fn resolve_interval_basics() {
        let filters = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(resolve_interval(&filters, 3.0, 4.0), (2, 4));
        assert_eq!(resolve_interval(&filters, 2.0, 5.0), (1, 5));
        assert_eq!(resolve_interval(&filters, 0.0, 100.0), (0, 8));
        assert_eq!(resolve_interval(&filters, 2.5, 2.75), (2, 2));
    }

    #[test]
    fn resolve_interval_includes_duplicate_upper_bounds() {
        let filters = [1.0, 2.0, 3.0, 3.0, 4.0];
        assert_eq!(resolve_interval(&filters, 3.0, 3.0), (2, 4));
        assert_eq!(resolve_interval(&filters, 2.5, 3.0), (2, 4));
        assert_eq!(resolve_interval(&filters, 3.0, 3.5), (2, 4));
    }

    #[test]
    fn unit_tree_query() {
        let tree = unit_tree();
        assert_eq!(tree.layout().levels(), 1);
        assert_eq!(tree.layout().offsets(0), &[0, 4]);

        let params = QueryParams::new(2, 4).unwrap();
        let results = tree
            .optimized_postfiltering_search(&[0.5, 0.0], (0.0, 1.0), &params)
            .unwrap();
        assert_eq!(results.len(), 2);
        let ids: Vec<u32> = results.iter().map(|r| r.0).collect();
        assert!(ids.contains(&0) && ids.contains(&1));
        for &(_, distance) in &results {
            assert_eq!(distance, 0.5);
        }
    }

    #[test]
    fn empty_interval_returns_empty() {
        let tree = unit_tree();
        let params = QueryParams::new(2, 4).unwrap();
        assert!(
            tree.optimized_postfiltering_search(&[0.5, 0.0], (10.0, 20.0), &params)
                .unwrap()
                .is_empty()
        );
        assert!(
            tree.optimized_postfiltering_search(&[0.5, 0.0], (-5.0, -1.0), &params)
                .unwrap()
                .is_empty()
        );
        // An interval between two consecutive filter values is also empty.
        assert!(
            tree.optimized_postfiltering_search(&[0.5, 0.0], (0.21, 0.29), &params)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn zero_k_returns_empty() {
        let tree = unit_tree();
        let params = QueryParams::new(0, 4).unwrap();
        assert!(
            tree.optimized_postfiltering_search(&[0.5, 0.0], (0.0, 1.0), &params)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let tree = unit_tree();
        let params = QueryParams::new(2, 4).unwrap();
        assert!(matches!(
            tree.optimized_postfiltering_search(&[0.5], (0.0, 1.0), &params),
            Err(QueryError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn count_mismatch_is_an_error() {
        let result = WindowTree::<VamanaIndex>::build(
            vec![0.0; 8],
            2,
            &[0.1, 0.2, 0.3],
            TreeParams {
                cutoff: 8,
                split_factor: 2,
            },
            &build_params(),
        );
        assert!(matches!(
            result,
            Err(TreeBuildError::CountMismatch {
                points: 4,
                filters: 3
            })
        ));
    }

    #[test]
    fn non_finite_filters_are_rejected() {
        let result = WindowTree::<VamanaIndex>::build(
            vec![0.0; 4],
            2,
            &[0.1, f32::NAN],
            TreeParams {
                cutoff: 8,
                split_factor: 2,
            },
            &build_params(),
        );
        assert!(matches!(
            result,
            Err(TreeBuildError::NonFiniteFilter { index: 1, .. })
        ));
    }

    /// An eight-point corpus whose filters are their original positions,
    /// supplied in reverse so the builder has to sort.
    fn strict_split_tree() -> WindowTree<ExhaustiveIndex> {
        let points: Vec<f32> = (0..8).rev().map(|x| x as f32).collect();
        let filters: Vec<f32> = (0..8).rev().map(|x| x as f32 + 1.0).collect();
        WindowTree::build(
            points,
            1,
            &filters,
            TreeParams {
                cutoff: 2,
                split_factor: 2,
            },
            &build_params(),
        )
        .unwrap()
    }

    #[test]
    fn sort_produces_nondecreasing_filters_and_a_bijection() {
        let tree = strict_split_tree();
        assert!(tree.filters.windows(2).all(|pair| pair[0] <= pair[1]));

        let mut seen = vec![false; tree.len()];
        for &original in tree.decoding.iter() {
            assert!(!seen[original as usize]);
            seen[original as usize] = true;
        }
        assert!(seen.into_iter().all(|v| v));

        // Sorted id i holds the vector whose filter is i + 1.
        for i in 0..tree.len() {
            assert_eq!(tree.filters[i], i as f32 + 1.0);
            assert_eq!(tree.store.point(i), &[i as f32]);
        }
    }

    #[test]
    fn straddling_query_post_filters_to_the_requested_range() {
        let tree = strict_split_tree();
        let params = QueryParams::new(8, 8).unwrap();

        // Range [2, 5] covers sorted ids [1, 5); the level-2 span that serves
        // it also covers id 5 (filter 6), which must not leak into the result.
        let results = tree
            .optimized_postfiltering_search(&[4.9], (2.0, 5.0), &params)
            .unwrap();
        assert_eq!(results.len(), 4);
        for &(original_id, _) in &results {
            let sorted_id = tree
                .decoding
                .iter()
                .position(|&o| o == original_id)
                .unwrap();
            let filter = tree.filters[sorted_id];
            assert!((2.0..=5.0).contains(&filter), "filter {filter} leaked");
        }

        // Closest in-range point to 4.9 has filter 5.
        assert_eq!(tree.filters.len() - 1 - results[0].0 as usize, 4);
    }

    #[test]
    fn distances_are_nondecreasing_and_ids_unique() {
        let tree = strict_split_tree();
        let params = QueryParams::new(8, 8).unwrap();
        let results = tree
            .optimized_postfiltering_search(&[3.2], (1.0, 8.0), &params)
            .unwrap();

        assert!(results.windows(2).all(|p| p[0].1 <= p[1].1));
        let mut ids: Vec<u32> = results.iter().map(|r| r.0).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
    }

    #[test]
    fn exact_filter_match_returns_only_that_value() {
        let points: Vec<f32> = (0..5).map(|x| x as f32).collect();
        let filters = [1.0, 2.0, 3.0, 3.0, 4.0];
        let tree: WindowTree<ExhaustiveIndex> = WindowTree::build(
            points,
            1,
            &filters,
            TreeParams {
                cutoff: 2,
                split_factor: 2,
            },
            &build_params(),
        )
        .unwrap();

        let params = QueryParams::new(5, 5).unwrap();
        let results = tree
            .optimized_postfiltering_search(&[0.0], (3.0, 3.0), &params)
            .unwrap();
        assert_eq!(results.len(), 2);
        for &(original_id, _) in &results {
            assert_eq!(filters[original_id as usize], 3.0);
        }
    }

    #[test]
    fn full_range_matches_root_bucket_search() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 64;
        let dim = 4;
        let points: Vec<f32> = (0..n * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let filters: Vec<f32> = (0..n).map(|_| rng.gen_range(0.0..100.0)).collect();

        let tree: WindowTree<ExhaustiveIndex> = WindowTree::build(
            points,
            dim,
            &filters,
            TreeParams {
                cutoff: 8,
                split_factor: 2,
            },
            &build_params(),
        )
        .unwrap();

        let params = QueryParams::new(5, 16).unwrap();
        let query: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let full = tree
            .optimized_postfiltering_search(&query, (f32::NEG_INFINITY, f32::INFINITY), &params)
            .unwrap();

        // The full range resolves to the root bucket, so the result is the
        // top-k of a single search over the whole corpus.
        let root = tree.buckets[0][0].beam_search(&query, &params);
        assert_eq!(full.len(), 5);
        for (result, expected) in full.iter().zip(root.iter()) {
            assert_eq!(result.0, tree.decoding[expected.id as usize]);
            assert_eq!(result.1, expected.distance.sqrt());
        }
    }

    #[test]
    fn rebuild_reproduces_offsets_and_decoding() {
        let a = strict_split_tree();
        let b = strict_split_tree();
        assert_eq!(a.layout(), b.layout());
        assert_eq!(a.decoding, b.decoding);
    }

    #[test]
    fn filtered_recall_against_brute_force() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 1000;
        let dim = 8;
        let k = 10;
        let points: Vec<f32> = (0..n * dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let filters: Vec<f32> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();

        let tree: WindowTree<VamanaIndex> = WindowTree::build(
            points.clone(),
            dim,
            &filters,
            TreeParams {
                cutoff: 125,
                split_factor: 2,
            },
            &BuildParams::new(24, 48, 1.2).unwrap(),
        )
        .unwrap();

        // Beam well above 4k, per the accuracy contract of the tree.
        let params = QueryParams::new(k, 4 * k + 24).unwrap();

        let mut hits = 0usize;
        let mut expected_total = 0usize;
        for _ in 0..40 {
            let query: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let a = rng.gen_range(0.0..1.0);
            let b = rng.gen_range(0.0..1.0);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

            // Brute-force ground truth over the filtered corpus.
            let distance = crate::distance::SquaredL2;
            let mut truth: Vec<(u32, f32)> = (0..n)
                .filter(|&i| lo <= filters[i] && filters[i] <= hi)
                .map(|i| {
                    use crate::distance::DistanceFunction;
                    (
                        i as u32,
                        distance.evaluate(&query, &points[i * dim..(i + 1) * dim]),
                    )
                })
                .collect();
            truth.sort_by(|x, y| x.1.partial_cmp(&y.1).unwrap());
            truth.truncate(k);

            let found: std::collections::HashSet<u32> = tree
                .optimized_postfiltering_search(&query, (lo, hi), &params)
                .unwrap()
                .into_iter()
                .map(|r| r.0)
                .collect();

            hits += truth.iter().filter(|t| found.contains(&t.0)).count();
            expected_total += truth.len();
        }

        let recall = hits as f64 / expected_total.max(1) as f64;
        assert!(recall > 0.9, "average recall {recall} too low");
    }
}
