// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Hesai PandarQT decoder.
//!
//! The PandarQT is a 64 channel short range mechanical LiDAR with:
//! - 360° horizontal FOV at 0.6° resolution (10 Hz)
//! - 104.2° vertical FOV
//! - 0.1m to 60m range
//! - Single or dual return
//!
//! # Packet Structure
//!
//! Data packets are 1072 bytes (1068 without the trailing UDP sequence
//! number), sent to port 2368:
//! - Header: 12 bytes
//! - Body: 4 blocks × (2 byte azimuth + 64 units × 4 bytes)
//! - Tail: 28 bytes (timestamp, return mode, UTC date and time, sequence)
//!
//! In dual return mode blocks 0/1 and 2/3 hold the first and last echo of
//! the same firing.

use crate::{
    buffer::PointCloud,
    calibration::{Calibration, CalibrationTables},
    lidar::{Error, LidarDriver, MonotonicClock, ReturnMode, TimeSource},
    packet::{RawPacket, UNIT_NUM},
    point::packet_time,
    returns::ReturnResolver,
    scan::{Scan, ScanAssembler},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Points in a full dual return rotation (600 firings × 64 lasers × 2).
const POINTS_PER_SCAN: usize = 76_800;

/// Decoder settings.
///
/// Angles are in degrees and distances in metres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Azimuth at which a rotation starts
    pub scan_phase: f64,
    /// Output window as (start, end); equal ends select the full circle
    pub angle_range: [f64; 2],
    /// Usable distances as (exclusive min, inclusive max)
    pub distance_range: [f64; 2],
    /// Dual returns closer than this are merged into one point
    pub dual_return_distance_threshold: f64,
    pub return_mode: ReturnMode,
    /// Lasers whose measurements are discarded
    pub disable_rings: Vec<u16>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            scan_phase: 0.0,
            angle_range: [0.0, 360.0],
            distance_range: [0.1, 200.0],
            dual_return_distance_threshold: 0.1,
            return_mode: ReturnMode::Dual,
            disable_rings: Vec::new(),
        }
    }
}

impl DecoderConfig {
    /// Load a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|err| Error::Config(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), Error> {
        let angles = [self.scan_phase, self.angle_range[0], self.angle_range[1]];
        if angles.iter().any(|angle| !angle.is_finite()) {
            return Err(Error::Config("angles must be finite".to_string()));
        }

        let [min, max] = self.distance_range;
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(Error::Config(format!(
                "invalid distance range: {} to {}",
                min, max
            )));
        }

        let threshold = self.dual_return_distance_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::Config(format!(
                "invalid dual return distance threshold: {}",
                threshold
            )));
        }

        if let Some(ring) = self.disable_rings.iter().find(|&&r| r as usize >= UNIT_NUM) {
            return Err(Error::Config(format!(
                "disabled ring {} out of range 0-{}",
                ring,
                UNIT_NUM - 1
            )));
        }

        Ok(())
    }
}

/// Degrees to centidegrees within one turn, truncating.
fn centidegrees(degrees: f64) -> i32 {
    ((degrees * 100.0) as i64).rem_euclid(36000) as i32
}

/// Hesai PandarQT LiDAR decoder
pub struct PandarQtDecoder {
    tables: CalibrationTables,
    resolver: ReturnResolver,
    assembler: ScanAssembler,
    /// Reused packet record
    packet: RawPacket,
    /// Points of the block being resolved
    block_points: PointCloud,
    clock: Box<dyn TimeSource>,
    /// Whether the last single return packet disagreed with the configured
    /// return mode
    mode_mismatch: bool,
}

impl PandarQtDecoder {
    /// Create a decoder stamping scans with [`MonotonicClock`].
    pub fn new(config: &DecoderConfig, calibration: &Calibration) -> Result<Self, Error> {
        Self::with_time_source(config, calibration, Box::new(MonotonicClock))
    }

    pub fn with_time_source(
        config: &DecoderConfig,
        calibration: &Calibration,
        clock: Box<dyn TimeSource>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let tables = CalibrationTables::new(calibration)?;

        let resolver = ReturnResolver::new(
            config.distance_range,
            config.dual_return_distance_threshold,
            config.return_mode,
            &config.disable_rings,
        );
        let assembler = ScanAssembler::new(
            centidegrees(config.scan_phase),
            [
                centidegrees(config.angle_range[0]),
                centidegrees(config.angle_range[1]),
            ],
            POINTS_PER_SCAN,
        );

        Ok(Self {
            tables,
            resolver,
            assembler,
            packet: RawPacket::default(),
            block_points: PointCloud::with_capacity(2 * UNIT_NUM),
            clock,
            mode_mismatch: false,
        })
    }

    pub fn return_mode(&self) -> ReturnMode {
        self.resolver.return_mode()
    }

    /// Whether rotations are split at the scan phase with overflow buffering.
    pub fn use_overflow(&self) -> bool {
        self.assembler.use_overflow()
    }

    /// The most recently accepted packet.
    pub fn last_packet(&self) -> &RawPacket {
        &self.packet
    }

    fn check_return_mode(&mut self) {
        let mismatch = self.resolver.mismatches_sensor_mode(self.packet.return_mode);
        if mismatch && !self.mode_mismatch {
            warn!(
                "sensor return mode {:#04x} does not match requested {} return mode",
                self.packet.return_mode,
                self.resolver.return_mode()
            );
        }
        self.mode_mismatch = mismatch;
    }
}

impl LidarDriver for PandarQtDecoder {
    fn unpack(&mut self, data: &[u8]) -> Result<usize, Error> {
        if let Err(err) = self.packet.parse_into(data) {
            debug!("dropping packet: {}", err);
            return Err(err);
        }

        let time = packet_time(&self.packet);

        let dual_return = self.packet.is_dual_return();
        if !dual_return {
            self.check_return_mode();
        }

        self.assembler.begin_packet();

        let step = if dual_return { 2 } else { 1 };
        let blocks = self.packet.blocks().len();
        let mut appended = 0;

        // A trailing unpaired block in dual return mode is skipped
        for block in (0..blocks.saturating_sub(step - 1)).step_by(step) {
            if dual_return {
                self.resolver.resolve_dual(
                    &self.packet,
                    &self.tables,
                    time,
                    block,
                    &mut self.block_points,
                );
            } else {
                self.resolver.resolve_single(
                    &self.packet,
                    &self.tables,
                    time,
                    block,
                    &mut self.block_points,
                );
            }

            let azimuth = self.packet.blocks[block].azimuth;
            appended += self.assembler.add_block(azimuth, &mut self.block_points);
        }

        Ok(appended)
    }

    fn has_scanned(&self) -> bool {
        self.assembler.has_scanned()
    }

    fn get_scan(&mut self) -> Scan<'_> {
        let now = self.clock.now_ns();
        self.assembler.get_scan(now)
    }
}
