// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Segmentation of the block stream into full rotations.
//!
//! All angles are integer centidegrees. The assembler runs in one of two
//! modes, fixed at construction:
//!
//! - **Overflow mode**, used when the output window covers the full circle or
//!   contains the scan phase. The rotation boundary is the block at which the
//!   azimuth phase relative to the scan phase stops increasing. Blocks past
//!   the boundary go to the overflow cloud and become the start of the next
//!   scan once the current one has been retrieved.
//! - **Window mode** otherwise. Blocks are kept only while their phase
//!   relative to the window start is inside the window; everything else is
//!   dropped. The scan is complete once the sweep leaves the window after
//!   having kept at least one block.

use crate::buffer::{PointCloud, ScanBuffers};
use log::trace;

/// Azimuth steps in one revolution.
const FULL_CIRCLE: i32 = 36000;

/// A retrieved scan.
#[derive(Clone, Copy, Debug)]
pub struct Scan<'a> {
    /// Sequence number of the scan, wraps at `u32::MAX`
    pub frame_id: u32,
    /// Host time of retrieval in nanoseconds
    pub timestamp: u64,
    pub points: &'a PointCloud,
}

/// Scan boundary state machine.
#[derive(Debug)]
pub struct ScanAssembler {
    buffers: ScanBuffers,
    scan_phase: i32,
    angle_start: i32,
    /// Width of the output window, 0 for the full circle
    max_angle: i32,
    use_overflow: bool,
    last_phase: i32,
    has_scanned: bool,
    pending_reset: bool,
    frame_id: u32,
}

impl ScanAssembler {
    /// Create an assembler.
    ///
    /// `scan_phase` and `angle_range` (start, end) are in centidegrees;
    /// `capacity` presizes both point clouds.
    pub fn new(scan_phase: i32, angle_range: [i32; 2], capacity: usize) -> Self {
        let scan_phase = scan_phase.rem_euclid(FULL_CIRCLE);
        let angle_range = angle_range.map(|angle| angle.rem_euclid(FULL_CIRCLE));
        let max_angle = (angle_range[1] - angle_range[0]).rem_euclid(FULL_CIRCLE);
        let scan_angle = (scan_phase - angle_range[0]).rem_euclid(FULL_CIRCLE);
        let use_overflow = max_angle == 0 || scan_angle < max_angle;

        Self {
            buffers: ScanBuffers::new(capacity),
            scan_phase,
            angle_start: angle_range[0],
            max_angle,
            use_overflow,
            last_phase: 0,
            has_scanned: false,
            pending_reset: false,
            frame_id: 0,
        }
    }

    /// Whether rotations are split at the scan phase with overflow buffering.
    pub fn use_overflow(&self) -> bool {
        self.use_overflow
    }

    /// Whether the rotation being assembled has crossed its boundary.
    pub fn has_scanned(&self) -> bool {
        self.has_scanned
    }

    /// Whether a retrieval is waiting to recycle the buffers.
    pub fn pending_reset(&self) -> bool {
        self.pending_reset
    }

    /// Points accepted for the next rotation so far.
    pub fn overflow(&self) -> &PointCloud {
        self.buffers.overflow()
    }

    /// Apply a reset armed by [`ScanAssembler::get_scan`].
    ///
    /// Called once per accepted packet before its blocks are added.
    pub fn begin_packet(&mut self) {
        if !self.pending_reset {
            return;
        }

        if self.use_overflow {
            self.buffers.rotate();
        } else {
            self.buffers.clear_active();
        }
        self.has_scanned = false;
        self.pending_reset = false;
        self.frame_id = self.frame_id.wrapping_add(1);
    }

    /// Move the points of one block (or dual return block pair) into the
    /// active or overflow cloud according to the block azimuth.
    ///
    /// `points` is left empty. Returns the number of points kept.
    pub fn add_block(&mut self, azimuth: u16, points: &mut PointCloud) -> usize {
        let azimuth = azimuth as i32;
        let count = points.len();

        if self.use_overflow {
            let phase = (azimuth - self.scan_phase).rem_euclid(FULL_CIRCLE);
            if phase > self.last_phase && !self.has_scanned {
                self.buffers.active_mut().append(points);
            } else {
                self.buffers.overflow_mut().append(points);
                self.has_scanned = true;
            }
            self.last_phase = phase;
            count
        } else {
            let phase = (azimuth - self.angle_start).rem_euclid(FULL_CIRCLE);
            if phase < self.max_angle {
                self.buffers.active_mut().append(points);
                count
            } else {
                if !self.buffers.active().is_empty() {
                    self.has_scanned = true;
                }
                points.clear();
                0
            }
        }
    }

    /// Return the active cloud and arm the buffer reset for the next packet.
    ///
    /// Nothing is cleared here; calling this again before the next packet
    /// returns the same cloud.
    pub fn get_scan(&mut self, timestamp: u64) -> Scan<'_> {
        self.pending_reset = true;
        let points = self.buffers.active();
        trace!(
            "scan {} retrieved with {} points",
            self.frame_id,
            points.len()
        );
        Scan {
            frame_id: self.frame_id,
            timestamp,
            points,
        }
    }
}
