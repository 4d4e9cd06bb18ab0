/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! A flat-scan index. Exact within its subset, and the reference oracle for
//! graph-index tests.

use crate::{
    distance::{DistanceFunction, SquaredL2},
    graph::{BuildParams, QueryParams, SpatialIndex},
    neighbor::Neighbor,
    store::SubsetView,
};

/// An index that answers searches by scanning every point of its subset.
#[derive(Debug)]
pub struct ExhaustiveIndex {
    subset: SubsetView,
}

impl ExhaustiveIndex {
    /// Number of points in the index.
    pub fn len(&self) -> usize {
        self.subset.len()
    }

    /// Whether the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.subset.is_empty()
    }
}

impl SpatialIndex for ExhaustiveIndex {
    fn build(subset: SubsetView, _filters: &[f32], _params: &BuildParams) -> Self {
        Self { subset }
    }

    /// Scan the subset and return the closest `beam_size` points.
    ///
    /// `limit` still bounds the number of distance computations: a scan capped
    /// below the subset size returns the best of the prefix it managed to
    /// evaluate.
    fn beam_search(&self, query: &[f32], params: &QueryParams) -> Vec<Neighbor> {
        let distance = SquaredL2;
        let scanned = self.subset.len().min(params.limit());
        let mut candidates: Vec<Neighbor> = (0..scanned)
            .map(|i| Neighbor::new(i as u32, distance.evaluate(query, self.subset.point(i))))
            .collect();
        candidates.sort_unstable_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        candidates.truncate(params.beam_size());
        candidates
    }
}

///////////
// Tests //
///////////
