// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point collections used by the scan assembler.
//!
//! [`PointCloud`] is the append-only output container. [`ScanBuffers`] holds
//! the two clouds the assembler rotates between: the *active* cloud for the
//! rotation being assembled and the *overflow* cloud collecting points that
//! already belong to the next rotation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScanBuffers                            │
//! │  ┌──────────────────┐     ┌──────────────────┐              │
//! │  │   Cloud A        │     │   Cloud B        │              │
//! │  │  (active)        │ ←→  │  (overflow)      │              │
//! │  └──────────────────┘     └──────────────────┘              │
//! │            active_idx selects which one is active           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use edgefirst_pandarqt::{buffer::ScanBuffers, point::Point};
//!
//! let mut buffers = ScanBuffers::new(1024);
//! buffers.active_mut().push(Point::default());
//! buffers.overflow_mut().push(Point::default());
//! buffers.overflow_mut().push(Point::default());
//!
//! // Overflow becomes the active cloud, the new overflow is empty
//! buffers.rotate();
//! assert_eq!(buffers.active().len(), 2);
//! assert!(buffers.overflow().is_empty());
//! ```

use crate::point::Point;

/// Append-only sequence of points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Point>,
}

impl PointCloud {
    /// Create an empty cloud with room for `capacity` points.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.points.capacity()
    }

    /// Remove all points, retaining the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.points.clear();
    }

    #[inline]
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Move all points of `other` to the end of this cloud, leaving `other`
    /// empty.
    #[inline]
    pub fn append(&mut self, other: &mut PointCloud) {
        self.points.append(&mut other.points);
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Active/overflow cloud pair selected by index.
///
/// Rotation only flips the index and clears the cloud that becomes the new
/// overflow; points are never copied between the two.
#[derive(Debug)]
pub struct ScanBuffers {
    buffers: [PointCloud; 2],
    active_idx: usize,
}

impl ScanBuffers {
    /// Create both clouds with room for `capacity` points each.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: [
                PointCloud::with_capacity(capacity),
                PointCloud::with_capacity(capacity),
            ],
            active_idx: 0,
        }
    }

    #[inline]
    pub fn active(&self) -> &PointCloud {
        &self.buffers[self.active_idx]
    }

    #[inline]
    pub fn active_mut(&mut self) -> &mut PointCloud {
        &mut self.buffers[self.active_idx]
    }

    #[inline]
    pub fn overflow(&self) -> &PointCloud {
        &self.buffers[1 - self.active_idx]
    }

    #[inline]
    pub fn overflow_mut(&mut self) -> &mut PointCloud {
        &mut self.buffers[1 - self.active_idx]
    }

    /// Promote the overflow cloud to active and empty the previous active
    /// cloud, which becomes the new overflow.
    #[inline]
    pub fn rotate(&mut self) {
        self.active_idx = 1 - self.active_idx;
        self.buffers[1 - self.active_idx].clear();
    }

    /// Empty the active cloud.
    #[inline]
    pub fn clear_active(&mut self) {
        self.buffers[self.active_idx].clear();
    }
}

impl Default for ScanBuffers {
    fn default() -> Self {
        Self::new(0)
    }
}
