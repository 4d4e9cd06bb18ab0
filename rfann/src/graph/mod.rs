/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Proximity-graph indices over point subsets.
//!
//! The window search tree only requires the two operations of [`SpatialIndex`]
//! and is otherwise oblivious to the graph algorithm behind them.

pub mod config;
pub use config::{BuildParams, BuildParamsError, QueryParams, QueryParamsError};

mod search;

pub mod exhaustive;
pub use exhaustive::ExhaustiveIndex;

pub mod vamana;
pub use vamana::VamanaIndex;

use crate::{neighbor::Neighbor, store::SubsetView};

/// An approximate nearest-neighbor index over the points of a [`SubsetView`].
///
/// Implementations are built once and never mutated, so searches may run
/// concurrently over a shared reference.
pub trait SpatialIndex: Send + Sync + Sized {
    /// Build an index over `subset`.
    ///
    /// `filters` carries the filter value of each subset point in local-id
    /// order; index kinds that do not discriminate on filters ignore it.
    fn build(subset: SubsetView, filters: &[f32], params: &BuildParams) -> Self;

    /// Return up to `params.beam_size()` candidates sorted by ascending
    /// distance to `query`, addressed by subset-local ids.
    ///
    /// Fewer than `beam_size` results may be returned; callers must tolerate
    /// short lists.
    fn beam_search(&self, query: &[f32], params: &QueryParams) -> Vec<Neighbor>;
}
