/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! A Vamana-style proximity graph built over a point subset.
//!
//! Construction inserts points in doubling batches: each point in a batch runs
//! a greedy search over the graph built so far, prunes the expanded candidates
//! into a degree-bounded edge list, and then adds reverse edges (pruning again
//! on overflow). Batches are processed in parallel; the adjacency lists sit
//! behind per-vertex locks until the graph is frozen into a flat layout.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::RwLock;

use rayon::prelude::*;

use crate::{
    distance::{DistanceFunction, SquaredL2},
    graph::{
        BuildParams, QueryParams, SpatialIndex,
        search::{NeighborSource, SearchLimits, greedy_search},
    },
    neighbor::Neighbor,
    store::SubsetView,
};

/// Step applied to the pruning parameter on each relaxation round.
const ALPHA_STEP: f32 = 1.2;

/// A frozen Vamana graph over a [`SubsetView`].
#[derive(Debug)]
pub struct VamanaIndex {
    subset: SubsetView,
    start: u32,
    /// Adjacency offsets; the neighbors of vertex `v` are
    /// `edges[offsets[v]..offsets[v + 1]]`.
    offsets: Box<[u32]>,
    edges: Box<[u32]>,
}

impl VamanaIndex {
    /// Number of points in the index.
    pub fn len(&self) -> usize {
        self.subset.len()
    }

    /// Whether the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.subset.is_empty()
    }

    /// Total number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The view this index was built over.
    pub fn subset(&self) -> &SubsetView {
        &self.subset
    }
}

impl NeighborSource for VamanaIndex {
    fn neighbors_into(&self, id: u32, out: &mut Vec<u32>) {
        let lo = self.offsets[id as usize] as usize;
        let hi = self.offsets[id as usize + 1] as usize;
        out.clear();
        out.extend_from_slice(&self.edges[lo..hi]);
    }
}

impl SpatialIndex for VamanaIndex {
    fn build(subset: SubsetView, _filters: &[f32], params: &BuildParams) -> Self {
        let n = subset.len();
        if n <= 1 {
            return Self {
                start: 0,
                offsets: vec![0u32; n + 1].into_boxed_slice(),
                edges: Box::default(),
                subset,
            };
        }

        let start = medoid(&subset);
        let graph = BuildGraph {
            adjacency: (0..n).map(|_| RwLock::new(Vec::new())).collect(),
        };
        let limits = SearchLimits::for_build(params.l_build());

        let mut processed = 0usize;
        while processed < n {
            let batch_end = (processed + processed.max(1)).min(n);

            // Candidate generation: independent greedy searches over the graph
            // of previously inserted points.
            let batch: Vec<(usize, Vec<u32>)> = (processed..batch_end)
                .into_par_iter()
                .map(|i| {
                    let mut expanded = Vec::new();
                    let frontier = greedy_search(
                        &graph,
                        &subset,
                        subset.point(i),
                        start,
                        &limits,
                        Some(&mut expanded),
                    );
                    expanded.extend(frontier.iter());
                    let pruned = robust_prune(&subset, i as u32, expanded, params);
                    (i, pruned)
                })
                .collect();

            // Forward edges. Merging (rather than overwriting) preserves
            // reverse edges that earlier batches may have added to the start
            // point before its own insertion round.
            batch.par_iter().for_each(|(i, pruned)| {
                graph.add_edges(&subset, *i as u32, pruned, params);
            });

            // Reverse edges.
            batch.par_iter().for_each(|(i, pruned)| {
                for &j in pruned {
                    graph.add_edges(&subset, j, &[*i as u32], params);
                }
            });

            processed = batch_end;
        }

        let index = graph.freeze(subset, start);
        tracing::debug!(
            points = index.len(),
            edges = index.edge_count(),
            "vamana graph built"
        );
        index
    }

    fn beam_search(&self, query: &[f32], params: &QueryParams) -> Vec<Neighbor> {
        if self.subset.is_empty() {
            return Vec::new();
        }
        let limits = SearchLimits::for_query(params);
        let frontier = greedy_search(self, &self.subset, query, self.start, &limits, None);
        frontier.iter().collect()
    }
}

/// The under-construction graph: one locked edge list per vertex.
struct BuildGraph {
    adjacency: Vec<RwLock<Vec<u32>>>,
}

impl BuildGraph {
    /// Add `edges` to the adjacency of `vertex`, pruning on degree overflow.
    ///
    /// The lock is held across the prune so concurrent inserts never observe a
    /// half-rewritten list. No other lock is taken while it is held.
    fn add_edges(&self, subset: &SubsetView, vertex: u32, edges: &[u32], params: &BuildParams) {
        #[allow(clippy::expect_used)]
        let mut list = self.adjacency[vertex as usize]
            .write()
            .expect("lock was poisoned");
        for &edge in edges {
            if edge != vertex && !list.contains(&edge) {
                list.push(edge);
            }
        }
        if list.len() > params.max_degree() {
            let distance = SquaredL2;
            let here = subset.point(vertex as usize);
            let pool = list
                .iter()
                .map(|&id| Neighbor::new(id, distance.evaluate(here, subset.point(id as usize))))
                .collect();
            *list = robust_prune(subset, vertex, pool, params);
        }
    }

    /// Freeze the adjacency lists into their flat read-only layout.
    fn freeze(self, subset: SubsetView, start: u32) -> VamanaIndex {
        let mut offsets = Vec::with_capacity(self.adjacency.len() + 1);
        offsets.push(0u32);
        let mut edges = Vec::new();
        for lock in self.adjacency {
            #[allow(clippy::expect_used)]
            let list = lock.into_inner().expect("lock was poisoned");
            edges.extend_from_slice(&list);
            offsets.push(edges.len() as u32);
        }
        VamanaIndex {
            subset,
            start,
            offsets: offsets.into_boxed_slice(),
            edges: edges.into_boxed_slice(),
        }
    }
}

impl NeighborSource for BuildGraph {
    fn neighbors_into(&self, id: u32, out: &mut Vec<u32>) {
        #[allow(clippy::expect_used)]
        let list = self.adjacency[id as usize]
            .read()
            .expect("lock was poisoned");
        out.clear();
        out.extend_from_slice(&list);
    }
}

/// Order candidates by distance, breaking ties by id for determinism.
fn by_distance_then_id(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .partial_cmp(&b.distance)
        .unwrap_or(Ordering::Equal)
        .then(a.id.cmp(&b.id))
}

/// The point of the subset closest to the centroid.
fn medoid(subset: &SubsetView) -> u32 {
    let n = subset.len();
    let mut centroid = vec![0.0f64; subset.dim()];
    for i in 0..n {
        for (acc, &value) in centroid.iter_mut().zip(subset.point(i)) {
            *acc += value as f64;
        }
    }
    let scale = 1.0 / n as f64;
    let centroid: Vec<f32> = centroid.into_iter().map(|acc| (acc * scale) as f32).collect();

    let distance = SquaredL2;
    (0..n)
        .into_par_iter()
        .map(|i| Neighbor::new(i as u32, distance.evaluate(&centroid, subset.point(i))))
        .min_by(by_distance_then_id)
        .map(|nearest| nearest.id)
        .unwrap_or(0)
}

/// The Vamana pruning rule: select a degree-bounded, direction-diverse subset
/// of `pool` as the neighbors of `location`.
///
/// Candidates are visited in ascending distance order. A candidate is occluded
/// once some already-selected neighbor is `alpha` times closer to it than
/// `location` is. The selection relaxes `alpha` from 1.0 upward until either
/// the degree bound is met or the configured `alpha` is exceeded.
fn robust_prune(
    subset: &SubsetView,
    location: u32,
    mut pool: Vec<Neighbor>,
    params: &BuildParams,
) -> Vec<u32> {
    pool.retain(|candidate| candidate.id != location);
    pool.sort_unstable_by(by_distance_then_id);
    let mut unique = HashSet::with_capacity(pool.len());
    pool.retain(|candidate| unique.insert(candidate.id));

    if pool.is_empty() {
        return Vec::new();
    }

    let distance = SquaredL2;
    let alpha = params.alpha();
    let degree = params.max_degree();

    // occlude_factor[i] is the highest observed ratio between the candidate's
    // distance to `location` and its distance to a selected neighbor. Selected
    // candidates are marked with f32::MAX.
    let mut occlude_factor = vec![0.0f32; pool.len()];
    let mut result = Vec::with_capacity(degree);

    let mut current_alpha = 1.0f32;
    while current_alpha <= alpha && result.len() < degree {
        for i in 0..pool.len() {
            if result.len() >= degree {
                break;
            }
            if occlude_factor[i] > current_alpha {
                continue;
            }

            occlude_factor[i] = f32::MAX;
            result.push(pool[i].id);

            let selected = subset.point(pool[i].id as usize);
            for j in (i + 1)..pool.len() {
                if occlude_factor[j] > alpha {
                    continue;
                }
                let between = distance.evaluate(selected, subset.point(pool[j].id as usize));
                occlude_factor[j] = if between == 0.0 {
                    f32::MAX
                } else {
                    occlude_factor[j].max(pool[j].distance / between)
                };
            }
        }
        current_alpha *= ALPHA_STEP;
    }
    result
}

///////////
// Tests //
///////////
