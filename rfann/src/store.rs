/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Immutable, random-access storage for a corpus of fixed-dimension vectors.
//!
//! A [`PointStore`] owns a dense row-major buffer. Many graph indices are built
//! over subsets of one store; each holds a [`SubsetView`] that shares the store
//! through an [`Arc`] and remaps bucket-local ids to store ids. The store is
//! never mutated after construction, so concurrent reads need no locks.

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("data length {len} is not divisible by dimension {dim}")]
    LengthNotDivisible { len: usize, dim: usize },
    #[error("dimension cannot be zero")]
    ZeroDimension,
}

/// An immutable collection of `len` vectors in `R^dim`, stored row-major.
#[derive(Debug)]
pub struct PointStore {
    data: Box<[f32]>,
    dim: usize,
    len: usize,
}

impl PointStore {
    /// Construct a store over a flat row-major buffer.
    ///
    /// The buffer length must be a multiple of `dim`.
    pub fn from_flat(data: Vec<f32>, dim: usize) -> Result<Self, StoreError> {
        if dim == 0 {
            return Err(StoreError::ZeroDimension);
        }
        let len = data.len();
        if len % dim != 0 {
            return Err(StoreError::LengthNotDivisible { len, dim });
        }
        Ok(Self {
            data: data.into_boxed_slice(),
            dim,
            len: len / dim,
        })
    }

    /// Number of vectors in the store.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the store holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Dimension of every vector in the store.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Return the `i`-th vector as a slice. O(1), no copy.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    pub fn point(&self, i: usize) -> &[f32] {
        assert!(
            i < self.len,
            "tried to access point {i} of a store with {} points",
            self.len
        );
        &self.data[i * self.dim..(i + 1) * self.dim]
    }
}

/// A cheap, read-only restriction of a [`PointStore`] to a subset of its points.
///
/// The view is addressed by local ids `0..len`, each mapping to a store id
/// through an owned remap table. Shared ownership of the store guarantees the
/// vector data outlives every index built over the view.
#[derive(Debug, Clone)]
pub struct SubsetView {
    store: Arc<PointStore>,
    ids: Box<[u32]>,
}

impl SubsetView {
    /// Restrict `store` to the given store ids, addressed by their position in `ids`.
    ///
    /// # Panics
    ///
    /// Panics if any id is out of range for the store.
    pub fn new(store: Arc<PointStore>, ids: Box<[u32]>) -> Self {
        if let Some(&bad) = ids.iter().find(|&&id| (id as usize) >= store.len()) {
            panic!(
                "subset id {bad} is out of range for a store with {} points",
                store.len()
            );
        }
        Self { store, ids }
    }

    /// Restrict `store` to the contiguous id range `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end` or `end > store.len()`.
    pub fn contiguous(store: Arc<PointStore>, start: usize, end: usize) -> Self {
        assert!(
            start <= end && end <= store.len(),
            "invalid subset range {start}..{end} for a store with {} points",
            store.len()
        );
        let ids = (start as u32..end as u32).collect();
        Self { store, ids }
    }

    /// Number of points in the view.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the view holds no points.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Dimension of every vector in the view.
    pub fn dim(&self) -> usize {
        self.store.dim()
    }

    /// Return the vector for the view-local id `local`.
    ///
    /// # Panics
    ///
    /// Panics if `local >= self.len()`.
    pub fn point(&self, local: usize) -> &[f32] {
        self.store.point(self.ids[local] as usize)
    }

    /// Translate a view-local id into the parent store id.
    ///
    /// # Panics
    ///
    /// Panics if `local >= self.len()`.
    pub fn resolve(&self, local: usize) -> u32 {
        self.ids[local]
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    fn store_3x2() -> Arc<PointStore> {
        Arc::new(PointStore::from_flat(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 2).unwrap())
    }

    #[test]
    fn from_flat_validates_shape() {
        assert!(matches!(
            PointStore::from_flat(vec![0.0; 5], 2),
            Err(StoreError::LengthNotDivisible { len: 5, dim: 2 })
        ));
        assert!(matches!(
            PointStore::from_flat(vec![], 0),
            Err(StoreError::ZeroDimension)
        ));

        let store = PointStore::from_flat(vec![], 4).unwrap();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn point_access() {
        let store = store_3x2();
        assert_eq!(store.len(), 3);
        assert_eq!(store.dim(), 2);
        assert_eq!(store.point(0), &[0.0, 1.0]);
        assert_eq!(store.point(2), &[4.0, 5.0]);
    }

    #[test]
    #[should_panic(expected = "tried to access point 3 of a store with 3 points")]
    fn point_out_of_range_panics() {
        store_3x2().point(3);
    }

    #[test]
    fn subset_remaps_local_ids() {
        let store = store_3x2();
        let view = SubsetView::new(store, vec![2, 0].into_boxed_slice());
        assert_eq!(view.len(), 2);
        assert_eq!(view.point(0), &[4.0, 5.0]);
        assert_eq!(view.point(1), &[0.0, 1.0]);
        assert_eq!(view.resolve(0), 2);
        assert_eq!(view.resolve(1), 0);
    }

    #[test]
    fn contiguous_subset() {
        let store = store_3x2();
        let view = SubsetView::contiguous(store, 1, 3);
        assert_eq!(view.len(), 2);
        assert_eq!(view.resolve(0), 1);
        assert_eq!(view.point(1), &[4.0, 5.0]);
    }

    #[test]
    #[should_panic(expected = "subset id 3 is out of range")]
    fn subset_validates_ids() {
        SubsetView::new(store_3x2(), vec![0, 3].into_boxed_slice());
    }
}
