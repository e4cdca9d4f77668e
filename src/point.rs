// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Calibrated output points.

use crate::{calibration::CalibrationTables, packet::RawPacket};

/// Which echo of a laser firing a point was built from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReturnType {
    #[default]
    Invalid = 0,
    SingleFirst = 1,
    SingleLast = 2,
    DualFirst = 3,
    DualLast = 4,
    /// Both echoes were close enough to be merged into one point
    DualOnly = 5,
}

/// A single calibrated LiDAR measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: u8,
    /// Range in metres
    pub distance: f32,
    /// Laser index
    pub ring: u16,
    /// Resolved azimuth in centidegrees, 0-35999
    pub azimuth: u16,
    pub return_type: ReturnType,
    /// Firing time in unix seconds
    pub timestamp: f64,
}

/// Unix time of a packet in seconds.
pub fn packet_time(packet: &RawPacket) -> f64 {
    packet.utc.unix_seconds() as f64 + packet.usec as f64 / 1_000_000.0
}

/// Build the point measured by `laser` in `block` of `packet`.
///
/// `packet_time` is the result of [`packet_time`] for the same packet. The
/// caller guarantees `block` and `laser` are within the packet's counts.
pub fn build_point(
    packet: &RawPacket,
    tables: &CalibrationTables,
    packet_time: f64,
    block: usize,
    laser: usize,
    return_type: ReturnType,
) -> Point {
    let raw_block = &packet.blocks[block];
    let unit = &raw_block.units[laser];

    let azimuth = tables.azimuth_index(raw_block.azimuth, laser);
    let xy_distance = unit.distance * tables.elev_cos(laser);
    let x = xy_distance * tables.azim_sin(azimuth);
    let y = xy_distance * tables.azim_cos(azimuth);
    let z = unit.distance * tables.elev_sin(laser);

    let firing_delay =
        tables.block_offset(block, packet.is_dual_return()) + tables.firing_offset(laser);

    Point {
        x: x as f32,
        y: y as f32,
        z: z as f32,
        intensity: unit.intensity,
        distance: unit.distance as f32,
        ring: laser as u16,
        azimuth: azimuth as u16,
        return_type,
        timestamp: packet_time + firing_delay / 1_000_000.0,
    }
}
