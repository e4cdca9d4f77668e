// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Selection of the measurements that become output points.
//!
//! In single return mode every block is an independent firing. In dual return
//! mode the ranging data of one firing is stored in two adjacent blocks: the
//! even block holds the first return and the odd block the last return, and
//! the azimuth changes every two blocks.

use crate::{
    buffer::PointCloud,
    calibration::CalibrationTables,
    lidar::ReturnMode,
    packet::{FIRST_RETURN, LAST_RETURN, RawPacket, UNIT_NUM, Unit},
    point::{ReturnType, build_point},
};

/// Filters measurements by distance and ring, and resolves dual returns
/// according to the configured [`ReturnMode`].
#[derive(Clone, Debug)]
pub struct ReturnResolver {
    /// Exclusive minimum distance in metres
    min_distance: f64,
    /// Inclusive maximum distance in metres
    max_distance: f64,
    dual_return_distance_threshold: f64,
    return_mode: ReturnMode,
    disabled: [bool; UNIT_NUM],
}

impl ReturnResolver {
    /// Rings outside `0..UNIT_NUM` in `disable_rings` are ignored.
    pub fn new(
        distance_range: [f64; 2],
        dual_return_distance_threshold: f64,
        return_mode: ReturnMode,
        disable_rings: &[u16],
    ) -> Self {
        let mut disabled = [false; UNIT_NUM];
        for &ring in disable_rings {
            if let Some(flag) = disabled.get_mut(ring as usize) {
                *flag = true;
            }
        }

        Self {
            min_distance: distance_range[0],
            max_distance: distance_range[1],
            dual_return_distance_threshold,
            return_mode,
            disabled,
        }
    }

    pub fn return_mode(&self) -> ReturnMode {
        self.return_mode
    }

    /// Whether a single return sensor mode byte contradicts the configured
    /// mode. Dual return packets never mismatch.
    pub fn mismatches_sensor_mode(&self, sensor_mode: u8) -> bool {
        (sensor_mode == FIRST_RETURN && self.return_mode != ReturnMode::First)
            || (sensor_mode == LAST_RETURN && self.return_mode != ReturnMode::Last)
    }

    #[inline]
    pub fn is_disabled(&self, laser: usize) -> bool {
        self.disabled[laser]
    }

    #[inline]
    fn in_range(&self, unit: &Unit) -> bool {
        unit.distance > self.min_distance && unit.distance <= self.max_distance
    }

    /// Whether a measurement of `laser` may become a point.
    #[inline]
    pub fn is_usable(&self, laser: usize, unit: &Unit) -> bool {
        !self.is_disabled(laser) && self.in_range(unit)
    }

    /// Push one point per usable unit of `block`.
    ///
    /// The tag follows the sensor's return mode byte.
    pub fn resolve_single(
        &self,
        packet: &RawPacket,
        tables: &CalibrationTables,
        packet_time: f64,
        block: usize,
        out: &mut PointCloud,
    ) {
        let return_type = if packet.return_mode == FIRST_RETURN {
            ReturnType::SingleFirst
        } else {
            ReturnType::SingleLast
        };

        let units = &packet.blocks[block].units[..packet.laser_count()];
        for (laser, unit) in units.iter().enumerate() {
            if self.is_usable(laser, unit) {
                out.push(build_point(
                    packet,
                    tables,
                    packet_time,
                    block,
                    laser,
                    return_type,
                ));
            }
        }
    }

    /// Push the points of the block pair starting at `even_block`.
    ///
    /// The caller guarantees `even_block + 1` is a valid block.
    pub fn resolve_dual(
        &self,
        packet: &RawPacket,
        tables: &CalibrationTables,
        packet_time: f64,
        even_block: usize,
        out: &mut PointCloud,
    ) {
        let odd_block = even_block + 1;
        let even_units = &packet.blocks[even_block].units;
        let odd_units = &packet.blocks[odd_block].units;

        for laser in 0..packet.laser_count() {
            if self.is_disabled(laser) {
                continue;
            }

            let even = &even_units[laser];
            let odd = &odd_units[laser];
            let even_usable = self.in_range(even);
            let odd_usable = self.in_range(odd);

            let mut emit = |block: usize, return_type: ReturnType| {
                out.push(build_point(
                    packet,
                    tables,
                    packet_time,
                    block,
                    laser,
                    return_type,
                ))
            };

            match self.return_mode {
                ReturnMode::First => {
                    if even_usable {
                        emit(even_block, ReturnType::SingleFirst);
                    }
                }
                ReturnMode::Last => {
                    // Last return validity follows the first return slot
                    if even_usable {
                        emit(odd_block, ReturnType::SingleLast);
                    }
                }
                ReturnMode::Dual => {
                    let close = (even.distance - odd.distance).abs()
                        < self.dual_return_distance_threshold;
                    if close && odd_usable {
                        emit(odd_block, ReturnType::DualOnly);
                    } else {
                        if even_usable {
                            emit(even_block, ReturnType::DualFirst);
                        }
                        if odd_usable {
                            emit(odd_block, ReturnType::DualLast);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calibration::Calibration,
        packet::{BLOCK_NUM, DUAL_RETURN, Header, UtcTime},
    };

    fn tables() -> CalibrationTables {
        CalibrationTables::new(&Calibration::new(vec![0.0; UNIT_NUM], vec![0.0; UNIT_NUM]))
            .unwrap()
    }

    fn packet(return_mode: u8) -> RawPacket {
        RawPacket {
            header: Header {
                laser_count: UNIT_NUM as u8,
                block_count: BLOCK_NUM as u8,
                dis_unit: 4,
                ..Default::default()
            },
            return_mode,
            utc: UtcTime {
                year: 24,
                month: 1,
                day: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn set_distance(packet: &mut RawPacket, block: usize, laser: usize, distance: f64) {
        packet.blocks[block].units[laser].distance = distance;
    }

    fn resolver(mode: ReturnMode, disable_rings: &[u16]) -> ReturnResolver {
        ReturnResolver::new([0.1, 200.0], 0.04, mode, disable_rings)
    }

    #[test]
    fn test_distance_bounds() {
        let resolver = resolver(ReturnMode::First, &[]);
        let unit = |distance| Unit {
            distance,
            ..Default::default()
        };
        assert!(!resolver.is_usable(0, &unit(0.0)));
        assert!(!resolver.is_usable(0, &unit(0.1)));
        assert!(resolver.is_usable(0, &unit(0.1001)));
        assert!(resolver.is_usable(0, &unit(200.0)));
        assert!(!resolver.is_usable(0, &unit(200.001)));
    }

    #[test]
    fn test_disabled_rings() {
        let resolver = resolver(ReturnMode::First, &[3, 63, 500]);
        assert!(resolver.is_disabled(3));
        assert!(resolver.is_disabled(63));
        assert!(!resolver.is_disabled(4));

        let mut packet = packet(FIRST_RETURN);
        for laser in 0..UNIT_NUM {
            set_distance(&mut packet, 0, laser, 5.0);
        }
        let mut out = PointCloud::default();
        resolver.resolve_single(&packet, &tables(), 0.0, 0, &mut out);
        assert_eq!(out.len(), UNIT_NUM - 2);
        assert!(out.iter().all(|p| p.ring != 3 && p.ring != 63));
    }

    #[test]
    fn test_single_return_tags() {
        let resolver = resolver(ReturnMode::First, &[]);
        let mut out = PointCloud::default();

        let mut first = packet(FIRST_RETURN);
        set_distance(&mut first, 2, 10, 3.0);
        resolver.resolve_single(&first, &tables(), 0.0, 2, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out.points()[0].return_type, ReturnType::SingleFirst);
        assert_eq!(out.points()[0].ring, 10);

        out.clear();
        let mut last = packet(LAST_RETURN);
        set_distance(&mut last, 2, 10, 3.0);
        resolver.resolve_single(&last, &tables(), 0.0, 2, &mut out);
        assert_eq!(out.points()[0].return_type, ReturnType::SingleLast);
    }

    #[test]
    fn test_single_respects_laser_count() {
        let resolver = resolver(ReturnMode::First, &[]);
        let mut packet = packet(FIRST_RETURN);
        packet.header.laser_count = 8;
        for laser in 0..UNIT_NUM {
            set_distance(&mut packet, 0, laser, 5.0);
        }
        let mut out = PointCloud::default();
        resolver.resolve_single(&packet, &tables(), 0.0, 0, &mut out);
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn test_dual_merge_close_returns() {
        let resolver = resolver(ReturnMode::Dual, &[]);
        let mut packet = packet(DUAL_RETURN);
        set_distance(&mut packet, 0, 0, 5.00);
        set_distance(&mut packet, 1, 0, 5.02);

        let mut out = PointCloud::default();
        resolver.resolve_dual(&packet, &tables(), 0.0, 0, &mut out);
        assert_eq!(out.len(), 1);
        let point = out.points()[0];
        assert_eq!(point.return_type, ReturnType::DualOnly);
        assert!((point.distance - 5.02).abs() < 1e-6);
    }

    #[test]
    fn test_dual_separate_returns() {
        let resolver = resolver(ReturnMode::Dual, &[]);
        let mut packet = packet(DUAL_RETURN);
        set_distance(&mut packet, 2, 7, 4.0);
        set_distance(&mut packet, 3, 7, 9.0);
        // Only the first return is in range
        set_distance(&mut packet, 2, 8, 4.0);
        set_distance(&mut packet, 3, 8, 500.0);
        // Close returns but the last one is out of range: nothing merges and
        // the first return survives
        set_distance(&mut packet, 2, 9, 199.99);
        set_distance(&mut packet, 3, 9, 200.01);

        let mut out = PointCloud::default();
        resolver.resolve_dual(&packet, &tables(), 0.0, 2, &mut out);
        let tags: Vec<(u16, ReturnType)> = out.iter().map(|p| (p.ring, p.return_type)).collect();
        assert_eq!(
            tags,
            vec![
                (7, ReturnType::DualFirst),
                (7, ReturnType::DualLast),
                (8, ReturnType::DualFirst),
                (9, ReturnType::DualFirst),
            ]
        );
    }

    #[test]
    fn test_dual_first_and_last_policies() {
        let mut packet = packet(DUAL_RETURN);
        set_distance(&mut packet, 0, 0, 4.0);
        set_distance(&mut packet, 1, 0, 9.0);
        // Last return present but first return out of range
        set_distance(&mut packet, 0, 1, 0.0);
        set_distance(&mut packet, 1, 1, 9.0);

        let mut out = PointCloud::default();
        resolver(ReturnMode::First, &[]).resolve_dual(&packet, &tables(), 0.0, 0, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out.points()[0].return_type, ReturnType::SingleFirst);
        assert_eq!(out.points()[0].distance, 4.0);

        out.clear();
        resolver(ReturnMode::Last, &[]).resolve_dual(&packet, &tables(), 0.0, 0, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out.points()[0].return_type, ReturnType::SingleLast);
        assert_eq!(out.points()[0].distance, 9.0);
        assert_eq!(out.points()[0].ring, 0);
    }

    #[test]
    fn test_sensor_mode_mismatch() {
        let first = resolver(ReturnMode::First, &[]);
        let last = resolver(ReturnMode::Last, &[]);
        let dual = resolver(ReturnMode::Dual, &[]);

        assert!(!first.mismatches_sensor_mode(FIRST_RETURN));
        assert!(first.mismatches_sensor_mode(LAST_RETURN));
        assert!(!last.mismatches_sensor_mode(LAST_RETURN));
        assert!(last.mismatches_sensor_mode(FIRST_RETURN));
        assert!(dual.mismatches_sensor_mode(FIRST_RETURN));
        assert!(!dual.mismatches_sensor_mode(DUAL_RETURN));
    }
}
