/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! # rfann
//!
//! Range-filtered approximate nearest-neighbor search over a static corpus.
//!
//! Every corpus vector is tagged with a scalar filter value. A query supplies
//! a vector, a closed interval on the filter axis, and a neighbor count `k`;
//! the answer is the (approximately) `k` closest in-range vectors under
//! Euclidean distance.
//!
//! The corpus is sorted by filter value and decomposed into the nested buckets
//! of a [`layout::BucketLayout`]; each bucket carries its own Vamana-style
//! proximity graph. A query translates its interval into a sorted-id range,
//! picks the tightest covering run of buckets, beam-searches each, and merges
//! the candidates under the filter predicate.
//!
//! Construction is parallel over the ambient rayon pool; the query path runs
//! on the calling thread and takes no locks.

pub mod distance;
pub mod graph;
pub mod layout;
pub mod neighbor;
pub mod store;
pub mod tree;

// Top level exports.
pub use graph::{BuildParams, QueryParams, SpatialIndex, VamanaIndex};
pub use neighbor::Neighbor;
pub use store::{PointStore, SubsetView};
pub use tree::{QueryError, SearchResult, TreeBuildError, TreeParams, WindowTree};
