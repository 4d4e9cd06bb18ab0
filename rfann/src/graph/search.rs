/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The greedy beam-search loop shared by graph construction and querying.

use std::collections::HashSet;

use crate::{
    distance::{DistanceFunction, SquaredL2},
    graph::QueryParams,
    neighbor::{Neighbor, NeighborQueue},
    store::SubsetView,
};

/// Adjacency access for [`greedy_search`].
///
/// Construction traverses a graph behind per-vertex locks while queries
/// traverse the frozen adjacency; this seam lets both share one search loop.
pub(crate) trait NeighborSource {
    /// Replace the contents of `out` with the adjacency of `id`.
    fn neighbors_into(&self, id: u32, out: &mut Vec<u32>);
}

/// Internal knobs of the search loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchLimits {
    /// Frontier capacity (`L`).
    pub l: usize,
    /// Early-termination factor; `f32::INFINITY` disables it.
    pub cut: f32,
    /// Rank used by the cut rule; 0 disables it.
    pub cut_k: usize,
    /// Soft cap on distance computations.
    pub limit: usize,
    /// Cap on adjacency entries expanded per vertex.
    pub degree_limit: usize,
}

impl SearchLimits {
    /// Limits for a build-time search: no early termination, no caps.
    pub fn for_build(l_build: usize) -> Self {
        Self {
            l: l_build,
            cut: f32::INFINITY,
            cut_k: 0,
            limit: usize::MAX,
            degree_limit: usize::MAX,
        }
    }

    /// Limits for a query-time search.
    pub fn for_query(params: &QueryParams) -> Self {
        Self {
            l: params.beam_size(),
            cut: params.cut(),
            cut_k: params.k(),
            limit: params.limit(),
            degree_limit: params.degree_limit(),
        }
    }
}

/// Greedy best-first traversal from `start` towards `query`.
///
/// Maintains a bounded frontier of the best candidates found so far and
/// repeatedly expands the closest unexpanded one. Terminates when no
/// unexpanded candidate remains within the frontier window, when the cut rule
/// fires, or when the cap on distance computations is reached.
///
/// When `expanded` is provided, every expanded candidate is recorded there in
/// expansion order; construction uses this set as the pruning pool.
pub(crate) fn greedy_search<G: NeighborSource>(
    graph: &G,
    subset: &SubsetView,
    query: &[f32],
    start: u32,
    limits: &SearchLimits,
    mut expanded: Option<&mut Vec<Neighbor>>,
) -> NeighborQueue {
    let distance = SquaredL2;
    let mut frontier = NeighborQueue::new(limits.l);
    let mut seen: HashSet<u32> = HashSet::with_capacity(4 * limits.l);

    frontier.insert(Neighbor::new(
        start,
        distance.evaluate(query, subset.point(start as usize)),
    ));
    seen.insert(start);
    let mut computations = 1usize;

    let mut adjacency = Vec::new();
    'traversal: while frontier.has_unexpanded() {
        let current = frontier.closest_unexpanded();

        if limits.cut_k > 0 && frontier.len() >= limits.cut_k {
            let kth = frontier.get(limits.cut_k - 1).distance;
            if current.distance > limits.cut * kth {
                break;
            }
        }

        if let Some(record) = expanded.as_mut() {
            record.push(current);
        }

        graph.neighbors_into(current.id, &mut adjacency);
        adjacency.truncate(limits.degree_limit);
        for &next in &adjacency {
            if !seen.insert(next) {
                continue;
            }
            if computations >= limits.limit {
                break 'traversal;
            }
            let d = distance.evaluate(query, subset.point(next as usize));
            computations += 1;
            frontier.insert(Neighbor::new(next, d));
        }
    }

    frontier
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::PointStore;

    /// A hand-written adjacency list graph.
    struct FixedGraph(Vec<Vec<u32>>);

    impl NeighborSource for FixedGraph {
        fn neighbors_into(&self, id: u32, out: &mut Vec<u32>) {
            out.clear();
            out.extend_from_slice(&self.0[id as usize]);
        }
    }

    /// Five points on a line at x = 0, 1, 2, 3, 4, chained left to right.
    fn line_fixture() -> (SubsetView, FixedGraph) {
        let store = Arc::new(
            PointStore::from_flat(vec![0.0, 1.0, 2.0, 3.0, 4.0], 1).unwrap(),
        );
        let n = store.len();
        let graph = FixedGraph(
            (0..n as u32)
                .map(|i| {
                    let mut adj = Vec::new();
                    if i > 0 {
                        adj.push(i - 1);
                    }
                    if (i as usize) < n - 1 {
                        adj.push(i + 1);
                    }
                    adj
                })
                .collect(),
        );
        (SubsetView::contiguous(store, 0, n), graph)
    }

    #[test]
    fn walks_towards_the_query() {
        let (subset, graph) = line_fixture();
        let limits = SearchLimits::for_build(3);
        let frontier = greedy_search(&graph, &subset, &[3.9], 0, &limits, None);

        let best: Vec<u32> = frontier.iter().map(|n| n.id).collect();
        assert_eq!(best, vec![4, 3, 2]);
    }

    #[test]
    fn records_expansion_order() {
        let (subset, graph) = line_fixture();
        let limits = SearchLimits::for_build(3);
        let mut expanded = Vec::new();
        let _ = greedy_search(&graph, &subset, &[3.9], 0, &limits, Some(&mut expanded));

        // The walk moves monotonically towards the query.
        let order: Vec<u32> = expanded.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn computation_limit_stops_the_walk() {
        let (subset, graph) = line_fixture();
        let limits = SearchLimits {
            limit: 2,
            ..SearchLimits::for_build(3)
        };
        let frontier = greedy_search(&graph, &subset, &[3.9], 0, &limits, None);

        // Only the start and one neighbor were ever evaluated.
        assert_eq!(frontier.len(), 2);
    }
}
