// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-laser calibration and the precomputed lookup tables used to project
//! raw measurements into Cartesian space.
//!
//! # Calibration file
//!
//! Hesai ships the angle correction as a small CSV file, one line per laser
//! with 1-based laser ids:
//!
//! ```text
//! Laser id,Elevation,Azimuth
//! 1,-52.121,1.471
//! 2,-49.785,1.479
//! ...
//! ```
//!
//! Elevation is the fixed vertical angle of the laser and Azimuth the
//! horizontal offset added to the block azimuth, both in degrees.

use crate::{
    lidar::Error,
    packet::{BLOCK_NUM, UNIT_NUM},
};
use std::{path::Path, str::FromStr};

/// Angular resolution of the azimuth tables in degrees.
pub const AZIMUTH_RESOLUTION: f64 = 0.01;

/// Number of azimuth steps in one revolution (centidegrees).
pub const MAX_AZIMUTH: usize = 36000;

/// Firing delay of each laser within a block, in microseconds.
const FIRING_OFFSET: [f64; UNIT_NUM] = [
    12.31, 14.37, 16.43, 18.49, 20.54, 22.6, 24.66, 26.71, 29.16, 31.22, 33.28, 35.34, 37.39,
    39.45, 41.5, 43.56, 46.61, 48.67, 50.73, 52.78, 54.84, 56.9, 58.95, 61.01, 63.45, 65.52,
    67.58, 69.63, 71.69, 73.74, 75.8, 77.86, 80.9, 82.97, 85.02, 87.08, 89.14, 91.19, 93.25,
    95.3, 97.75, 99.82, 101.87, 103.93, 105.98, 108.04, 110.1, 112.15, 115.2, 117.26, 119.32,
    121.38, 123.43, 125.49, 127.54, 129.6, 132.05, 134.11, 136.17, 138.22, 140.28, 142.34,
    144.39, 146.45,
];

/// Delay of the first block firing after the packet timestamp, in microseconds.
const BLOCK_BASE_OFFSET: f64 = 25.71;

/// Time between two consecutive firing sequences, in microseconds.
const BLOCK_PERIOD: f64 = 500.0 / 3.0;

/// Per-laser angle correction as delivered by the sensor vendor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Calibration {
    /// Elevation angle of each laser in degrees
    pub elevation: Vec<f64>,
    /// Azimuth offset of each laser in degrees
    pub azimuth_offset: Vec<f64>,
}

impl Calibration {
    pub fn new(elevation: Vec<f64>, azimuth_offset: Vec<f64>) -> Self {
        Self {
            elevation,
            azimuth_offset,
        }
    }

    /// Load an angle correction CSV file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path.as_ref())?;
        text.parse()
    }

    /// Number of lasers described by this calibration.
    pub fn len(&self) -> usize {
        self.elevation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elevation.is_empty()
    }
}

impl FromStr for Calibration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rows: Vec<(usize, f64, f64)> = Vec::new();

        let mut header_allowed = true;

        for (lineno, line) in s.lines().enumerate() {
            let line = line.trim_start_matches('\u{feff}').trim();
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            // Header line
            if header_allowed && fields[0].parse::<usize>().is_err() {
                header_allowed = false;
                continue;
            }
            header_allowed = false;
            if fields.len() < 3 {
                return Err(Error::InvalidCalibration(format!(
                    "line {}: expected 3 fields, got {}",
                    lineno + 1,
                    fields.len()
                )));
            }

            let parse_err = |what: &str| {
                Error::InvalidCalibration(format!("line {}: invalid {}", lineno + 1, what))
            };
            let id = fields[0].parse::<usize>().map_err(|_| parse_err("laser id"))?;
            let elevation = fields[1].parse::<f64>().map_err(|_| parse_err("elevation"))?;
            let azimuth = fields[2].parse::<f64>().map_err(|_| parse_err("azimuth"))?;
            rows.push((id, elevation, azimuth));
        }

        rows.sort_by_key(|row| row.0);
        for (index, row) in rows.iter().enumerate() {
            if row.0 != index + 1 {
                return Err(Error::InvalidCalibration(format!(
                    "laser ids must be contiguous from 1, found {} at position {}",
                    row.0,
                    index + 1
                )));
            }
        }

        Ok(Calibration {
            elevation: rows.iter().map(|row| row.1).collect(),
            azimuth_offset: rows.iter().map(|row| row.2).collect(),
        })
    }
}

/// Lookup tables built once from a [`Calibration`].
///
/// All per-point trigonometry is replaced by table reads: one sine/cosine
/// pair per laser elevation and one per 0.01° azimuth step.
#[derive(Clone, Debug)]
pub struct CalibrationTables {
    azimuth_offset: [i32; UNIT_NUM],
    elev_sin: [f64; UNIT_NUM],
    elev_cos: [f64; UNIT_NUM],
    azim_sin: Vec<f64>,
    azim_cos: Vec<f64>,
    block_offset_single: [f64; BLOCK_NUM],
    block_offset_dual: [f64; BLOCK_NUM],
}

impl CalibrationTables {
    /// Build the tables, rejecting calibrations that do not describe exactly
    /// [`UNIT_NUM`] lasers with finite angles.
    pub fn new(calibration: &Calibration) -> Result<Self, Error> {
        if calibration.elevation.len() != UNIT_NUM
            || calibration.azimuth_offset.len() != UNIT_NUM
        {
            return Err(Error::InvalidCalibration(format!(
                "expected {} lasers, got {} elevations and {} azimuth offsets",
                UNIT_NUM,
                calibration.elevation.len(),
                calibration.azimuth_offset.len()
            )));
        }

        let mut azimuth_offset = [0i32; UNIT_NUM];
        let mut elev_sin = [0.0; UNIT_NUM];
        let mut elev_cos = [0.0; UNIT_NUM];
        for laser in 0..UNIT_NUM {
            let elevation = calibration.elevation[laser];
            let azimuth = calibration.azimuth_offset[laser];
            if !elevation.is_finite() || !azimuth.is_finite() {
                return Err(Error::InvalidCalibration(format!(
                    "laser {} has a non-finite angle",
                    laser + 1
                )));
            }

            let centidegrees = (azimuth * 100.0).round();
            if !centidegrees.is_finite() {
                return Err(Error::InvalidCalibration(format!(
                    "laser {} azimuth offset out of range: {}",
                    laser + 1,
                    azimuth
                )));
            }
            azimuth_offset[laser] = centidegrees.rem_euclid(MAX_AZIMUTH as f64) as i32;
            let (sin, cos) = elevation.to_radians().sin_cos();
            elev_sin[laser] = sin;
            elev_cos[laser] = cos;
        }

        let (azim_sin, azim_cos): (Vec<f64>, Vec<f64>) = (0..MAX_AZIMUTH)
            .map(|idx| (AZIMUTH_RESOLUTION * idx as f64).to_radians().sin_cos())
            .unzip();

        let mut block_offset_single = [0.0; BLOCK_NUM];
        let mut block_offset_dual = [0.0; BLOCK_NUM];
        for block in 0..BLOCK_NUM {
            block_offset_single[block] = BLOCK_BASE_OFFSET + BLOCK_PERIOD * block as f64;
            block_offset_dual[block] = BLOCK_BASE_OFFSET + BLOCK_PERIOD * (block / 2) as f64;
        }

        Ok(Self {
            azimuth_offset,
            elev_sin,
            elev_cos,
            azim_sin,
            azim_cos,
            block_offset_single,
            block_offset_dual,
        })
    }

    /// Resolve the azimuth table index of a laser firing in a block.
    ///
    /// The result is always in `0..MAX_AZIMUTH`.
    #[inline]
    pub fn azimuth_index(&self, block_azimuth: u16, laser: usize) -> usize {
        (block_azimuth as i32 + self.azimuth_offset[laser]).rem_euclid(MAX_AZIMUTH as i32) as usize
    }

    /// Azimuth offset of a laser in centidegrees, `0..MAX_AZIMUTH`.
    #[inline]
    pub fn azimuth_offset(&self, laser: usize) -> i32 {
        self.azimuth_offset[laser]
    }

    #[inline]
    pub fn elev_sin(&self, laser: usize) -> f64 {
        self.elev_sin[laser]
    }

    #[inline]
    pub fn elev_cos(&self, laser: usize) -> f64 {
        self.elev_cos[laser]
    }

    #[inline]
    pub fn azim_sin(&self, index: usize) -> f64 {
        self.azim_sin[index]
    }

    #[inline]
    pub fn azim_cos(&self, index: usize) -> f64 {
        self.azim_cos[index]
    }

    /// Firing delay of a laser relative to its block, in microseconds.
    #[inline]
    pub fn firing_offset(&self, laser: usize) -> f64 {
        FIRING_OFFSET[laser]
    }

    /// Delay of a block relative to the packet timestamp, in microseconds.
    ///
    /// In dual return mode both blocks of a pair share one firing sequence.
    #[inline]
    pub fn block_offset(&self, block: usize, dual_return: bool) -> f64 {
        if dual_return {
            self.block_offset_dual[block]
        } else {
            self.block_offset_single[block]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat() -> Calibration {
        Calibration::new(vec![0.0; UNIT_NUM], vec![0.0; UNIT_NUM])
    }

    #[test]
    fn test_tables_from_flat_calibration() {
        let tables = CalibrationTables::new(&flat()).unwrap();
        assert_eq!(tables.azim_sin.len(), MAX_AZIMUTH);
        assert_eq!(tables.azim_cos.len(), MAX_AZIMUTH);
        assert_eq!(tables.elev_sin(0), 0.0);
        assert_eq!(tables.elev_cos(63), 1.0);
        assert!((tables.azim_sin(9000) - 1.0).abs() < 1e-12);
        assert!((tables.azim_cos(18000) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_azimuth_offset_rounding() {
        let mut calibration = flat();
        calibration.azimuth_offset[0] = 1.4715;
        calibration.azimuth_offset[1] = -3.386;
        calibration.azimuth_offset[2] = 0.004;
        let tables = CalibrationTables::new(&calibration).unwrap();
        assert_eq!(tables.azimuth_offset(0), 147);
        assert_eq!(tables.azimuth_offset(1), 36000 - 339);
        assert_eq!(tables.azimuth_offset(2), 0);
    }

    #[test]
    fn test_large_azimuth_offset() {
        let mut calibration = flat();
        calibration.azimuth_offset[0] = 3.6e7;
        calibration.azimuth_offset[1] = -725.0;
        calibration.azimuth_offset[2] = 3.0e7;
        let tables = CalibrationTables::new(&calibration).unwrap();

        assert_eq!(tables.azimuth_offset(0), 0);
        assert_eq!(tables.azimuth_index(u16::MAX, 0), 65535 - 36000);
        assert_eq!(tables.azimuth_offset(1), 35500);
        assert_eq!(tables.azimuth_index(600, 1), 100);
        assert_eq!(tables.azimuth_offset(2), 12000);
        assert_eq!(tables.azimuth_index(u16::MAX, 2), (65535 + 12000) % 36000);

        calibration.azimuth_offset[3] = f64::MAX;
        assert!(matches!(
            CalibrationTables::new(&calibration),
            Err(Error::InvalidCalibration(_))
        ));
    }

    #[test]
    fn test_azimuth_index_wraps() {
        let mut calibration = flat();
        calibration.azimuth_offset[0] = -3.0;
        calibration.azimuth_offset[1] = 3.0;
        calibration.azimuth_offset[2] = -400.0;
        let tables = CalibrationTables::new(&calibration).unwrap();

        assert_eq!(tables.azimuth_index(100, 0), 35800);
        assert_eq!(tables.azimuth_index(35900, 1), 200);
        assert_eq!(tables.azimuth_index(0, 2), 32000);
        // Block azimuths past a full turn still land inside the table
        for azimuth in [0u16, 17999, 35999, 36000, u16::MAX] {
            for laser in 0..3 {
                assert!(tables.azimuth_index(azimuth, laser) < MAX_AZIMUTH);
            }
        }
    }

    #[test]
    fn test_block_offsets() {
        let tables = CalibrationTables::new(&flat()).unwrap();
        assert!((tables.block_offset(0, false) - 25.71).abs() < 1e-9);
        assert!((tables.block_offset(3, false) - (25.71 + 500.0)).abs() < 1e-9);
        assert_eq!(tables.block_offset(0, true), tables.block_offset(1, true));
        assert_eq!(tables.block_offset(2, true), tables.block_offset(1, false));
        assert_eq!(tables.firing_offset(0), 12.31);
        assert_eq!(tables.firing_offset(63), 146.45);
    }

    #[test]
    fn test_invalid_calibration() {
        let short = Calibration::new(vec![0.0; 32], vec![0.0; 32]);
        assert!(matches!(
            CalibrationTables::new(&short),
            Err(Error::InvalidCalibration(_))
        ));

        let mut nan = flat();
        nan.elevation[5] = f64::NAN;
        assert!(matches!(
            CalibrationTables::new(&nan),
            Err(Error::InvalidCalibration(_))
        ));
    }

    #[test]
    fn test_parse_csv() {
        let csv = "Laser id,Elevation,Azimuth\n2,-49.785,1.479\n1,-52.121,1.471\n\n3,-47.577,-1.5\n";
        let calibration: Calibration = csv.parse().unwrap();
        assert_eq!(calibration.len(), 3);
        assert_eq!(calibration.elevation, vec![-52.121, -49.785, -47.577]);
        assert_eq!(calibration.azimuth_offset, vec![1.471, 1.479, -1.5]);
    }

    #[test]
    fn test_parse_csv_leading_blank_and_bom() {
        let csv = "\u{feff}\n\r\nLaser id,Elevation,Azimuth\r\n1,-52.121,1.471\r\n2,-49.785,1.479\r\n";
        let calibration: Calibration = csv.parse().unwrap();
        assert_eq!(calibration.elevation, vec![-52.121, -49.785]);

        let csv = "\u{feff}1,-52.121,1.471\n2,-49.785,1.479\n";
        let calibration: Calibration = csv.parse().unwrap();
        assert_eq!(calibration.len(), 2);

        // Only the first non-empty line may be a header
        assert!("\nLaser id,Elevation,Azimuth\nid,Elevation,Azimuth\n1,0.0,0.0\n"
            .parse::<Calibration>()
            .is_err());
    }

    #[test]
    fn test_parse_csv_errors() {
        assert!("Laser id,Elevation,Azimuth\n1,abc,0.0\n"
            .parse::<Calibration>()
            .is_err());
        assert!("1,0.0\n".parse::<Calibration>().is_err());
        // Gap in laser ids
        assert!("1,0.0,0.0\n3,0.0,0.0\n".parse::<Calibration>().is_err());
    }
}
