/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Validated parameter sets for graph construction and search.

use thiserror::Error;

/// Error type for [`BuildParams`] validation.
#[derive(Debug, Error)]
pub enum BuildParamsError {
    #[error("max degree cannot be zero")]
    DegreeZero,
    #[error("build list size cannot be zero")]
    LBuildZero,
    #[error("alpha ({0}) must be a finite value of at least 1.0")]
    AlphaTooSmall(f32),
}

/// Graph construction parameters: the degree bound `R`, the build-time search
/// list size `L`, and the pruning parameter `alpha`.
///
/// Higher `alpha` values keep more long-range edges, trading graph density for
/// recall.
#[derive(Debug, Clone, Copy)]
pub struct BuildParams {
    max_degree: usize,
    l_build: usize,
    alpha: f32,
}

impl BuildParams {
    /// Create new build parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_degree` or `l_build` is zero, or if `alpha` is
    /// not a finite value of at least 1.0.
    pub fn new(max_degree: usize, l_build: usize, alpha: f32) -> Result<Self, BuildParamsError> {
        if max_degree == 0 {
            return Err(BuildParamsError::DegreeZero);
        }
        if l_build == 0 {
            return Err(BuildParamsError::LBuildZero);
        }
        if !(alpha.is_finite() && alpha >= 1.0) {
            return Err(BuildParamsError::AlphaTooSmall(alpha));
        }
        Ok(Self {
            max_degree,
            l_build,
            alpha,
        })
    }

    /// The maximum out-degree of any vertex (`R`).
    #[inline]
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    /// The search list size used while inserting points (`L`).
    #[inline]
    pub fn l_build(&self) -> usize {
        self.l_build
    }

    /// The pruning parameter.
    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

/// Error type for [`QueryParams`] validation.
#[derive(Debug, Error)]
pub enum QueryParamsError {
    #[error("beam size cannot be zero")]
    BeamSizeZero,
    #[error("cut ({0}) must be a positive finite value")]
    InvalidCut(f32),
    #[error("distance computation limit cannot be zero")]
    LimitZero,
    #[error("degree limit cannot be zero")]
    DegreeLimitZero,
}

/// Per-query search parameters.
///
/// `k` is the number of neighbors requested from the merged result;
/// `beam_size` bounds the search frontier of each per-bucket beam search.
/// Useful configurations keep `k <= beam_size`, though this is not enforced:
/// a single beam search simply never yields more than `beam_size` candidates.
#[derive(Debug, Clone, Copy)]
pub struct QueryParams {
    k: usize,
    beam_size: usize,
    cut: f32,
    limit: usize,
    degree_limit: usize,
}

impl QueryParams {
    /// Default early-termination factor.
    pub const DEFAULT_CUT: f32 = 1.35;
    /// Default soft cap on distance computations per beam search.
    pub const DEFAULT_LIMIT: usize = 10_000_000;
    /// Default cap on the adjacency entries expanded per vertex.
    pub const DEFAULT_DEGREE_LIMIT: usize = 10_000;

    /// Create query parameters with the default `cut`, `limit` and
    /// `degree_limit`.
    ///
    /// `k == 0` is allowed and yields an empty result at the query engine.
    ///
    /// # Errors
    ///
    /// Returns an error if `beam_size` is zero.
    pub fn new(k: usize, beam_size: usize) -> Result<Self, QueryParamsError> {
        if beam_size == 0 {
            return Err(QueryParamsError::BeamSizeZero);
        }
        Ok(Self {
            k,
            beam_size,
            cut: Self::DEFAULT_CUT,
            limit: Self::DEFAULT_LIMIT,
            degree_limit: Self::DEFAULT_DEGREE_LIMIT,
        })
    }

    /// Replace the early-termination factor.
    pub fn with_cut(mut self, cut: f32) -> Result<Self, QueryParamsError> {
        if !(cut.is_finite() && cut > 0.0) {
            return Err(QueryParamsError::InvalidCut(cut));
        }
        self.cut = cut;
        Ok(self)
    }

    /// Replace the soft cap on distance computations.
    pub fn with_limit(mut self, limit: usize) -> Result<Self, QueryParamsError> {
        if limit == 0 {
            return Err(QueryParamsError::LimitZero);
        }
        self.limit = limit;
        Ok(self)
    }

    /// Replace the per-vertex expansion cap.
    pub fn with_degree_limit(mut self, degree_limit: usize) -> Result<Self, QueryParamsError> {
        if degree_limit == 0 {
            return Err(QueryParamsError::DegreeLimitZero);
        }
        self.degree_limit = degree_limit;
        Ok(self)
    }

    /// Number of neighbors requested.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Beam width of each per-bucket search.
    #[inline]
    pub fn beam_size(&self) -> usize {
        self.beam_size
    }

    /// Early-termination factor: the search stops expanding once the closest
    /// unexpanded candidate is further than `cut` times the current `k`-th
    /// best distance.
    #[inline]
    pub fn cut(&self) -> f32 {
        self.cut
    }

    /// Soft cap on distance computations per beam search.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Cap on the adjacency entries expanded per vertex.
    #[inline]
    pub fn degree_limit(&self) -> usize {
        self.degree_limit
    }
}

///////////
// Tests //
///////////
