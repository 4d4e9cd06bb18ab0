/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Nested bucket decomposition of the filter-sorted corpus.
//!
//! The corpus `[0, n)` is tiled at multiple resolutions: level 0 is a single
//! bucket, and each deeper level splits every bucket of the previous level into
//! `split_factor` children of near-equal size. Levels are added while the
//! largest bucket of the deepest level exceeds `cutoff`.
//!
//! The layout is stored as one offset array per level rather than as an owning
//! tree of nodes, which keeps per-bucket index construction a flat parallel
//! loop over `(level, bucket)` pairs.

use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("cutoff must be at least 1")]
    ZeroCutoff,
    #[error("split factor {0} must be at least 2")]
    SplitFactorTooSmall(usize),
}

/// A contiguous run of buckets `[start, end)` at a single level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpan {
    pub level: usize,
    pub start: usize,
    pub end: usize,
}

impl BucketSpan {
    /// Number of buckets in the span.
    pub fn num_buckets(&self) -> usize {
        self.end - self.start
    }
}

/// The bucket offsets for every level of the window search tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLayout {
    /// `offsets[l]` tiles `[0, n)`: bucket `b` of level `l` spans
    /// `offsets[l][b]..offsets[l][b + 1]`.
    offsets: Vec<Vec<usize>>,
    n: usize,
}

impl BucketLayout {
    /// Compute the layout for a corpus of `n` points.
    ///
    /// Children of a parent of size `s` are sized as evenly as possible: with
    /// `large = ceil(s / split_factor)` and `small = large - 1`, the first
    /// `s - small * split_factor` children have size `large` and the remainder
    /// have size `small`.
    pub fn new(n: usize, cutoff: usize, split_factor: usize) -> Result<Self, LayoutError> {
        if cutoff == 0 {
            return Err(LayoutError::ZeroCutoff);
        }
        if split_factor < 2 {
            return Err(LayoutError::SplitFactorTooSmall(split_factor));
        }

        let mut offsets: Vec<Vec<usize>> = Vec::new();
        let mut deepest = vec![0, n];
        loop {
            let largest = deepest
                .windows(2)
                .map(|pair| pair[1] - pair[0])
                .max()
                .unwrap_or(0);
            if largest <= cutoff {
                offsets.push(deepest);
                break;
            }

            let mut next = Vec::with_capacity((deepest.len() - 1) * split_factor + 1);
            next.push(0);
            for parent in deepest.windows(2) {
                let (parent_start, size) = (parent[0], parent[1] - parent[0]);
                let large = size.div_ceil(split_factor);
                let small = large.saturating_sub(1);
                let num_large = size - small * split_factor;

                let mut child_start = parent_start;
                for child in 0..split_factor {
                    child_start += if child < num_large { large } else { small };
                    next.push(child_start);
                }
            }
            debug_assert_eq!(*next.last().unwrap_or(&0), n);
            offsets.push(std::mem::replace(&mut deepest, next));
        }

        Ok(Self { offsets, n })
    }

    /// Number of points covered by the layout.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of levels, including the single-bucket root level.
    pub fn levels(&self) -> usize {
        self.offsets.len()
    }

    /// The offset array of `level`.
    pub fn offsets(&self, level: usize) -> &[usize] {
        &self.offsets[level]
    }

    /// Number of buckets at `level`.
    pub fn num_buckets(&self, level: usize) -> usize {
        self.offsets[level].len() - 1
    }

    /// The sorted-id range covered by bucket `bucket` of `level`.
    pub fn bucket_range(&self, level: usize, bucket: usize) -> Range<usize> {
        self.offsets[level][bucket]..self.offsets[level][bucket + 1]
    }

    /// Iterate over every `(level, bucket)` pair together with its id range.
    pub fn iter_buckets(&self) -> impl Iterator<Item = (usize, usize, Range<usize>)> + '_ {
        self.offsets.iter().enumerate().flat_map(|(level, offs)| {
            offs.windows(2)
                .enumerate()
                .map(move |(bucket, pair)| (level, bucket, pair[0]..pair[1]))
        })
    }

    /// Select the bucket span to search for the sorted-id range `[start, end)`.
    ///
    /// Every level has a contiguous span of buckets covering the range; the
    /// spans differ in how much slack they cover outside of it. The query
    /// should scan as little out-of-range volume as possible while touching few
    /// buckets, so the lookup picks the span covering the fewest points,
    /// breaking ties towards fewer buckets and then towards the shallower
    /// level. A range that exactly matches one bucket therefore resolves to
    /// that bucket alone, and a full-corpus range resolves to the root.
    ///
    /// # Panics
    ///
    /// Panics if `start >= end` or `end > n`.
    pub fn covering_span(&self, start: usize, end: usize) -> BucketSpan {
        assert!(
            start < end && end <= self.n,
            "invalid id range {start}..{end} for a layout over {} points",
            self.n
        );

        let mut best = BucketSpan {
            level: 0,
            start: 0,
            end: 1,
        };
        let mut best_cost = (self.n, 1usize);

        for (level, offs) in self.offsets.iter().enumerate() {
            // First bucket whose end lies beyond `start`; empty buckets that
            // merely touch `start` are skipped by the strict comparison.
            let first = offs.partition_point(|&o| o <= start) - 1;
            // One past the last bucket needed to reach `end`.
            let last = offs.partition_point(|&o| o < end);
            debug_assert!(first < last);

            let cost = (offs[last] - offs[first], last - first);
            if cost < best_cost {
                best = BucketSpan {
                    level,
                    start: first,
                    end: last,
                };
                best_cost = cost;
            }
        }
        best
    }
}

///////////
// Tests //
///////////
