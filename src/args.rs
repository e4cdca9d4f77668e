// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_pandarqt::{DecoderConfig, Error, ReturnMode, packet_source::DATA_PORT};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Local address to receive sensor packets on, or a pcap file.  If target
    /// is an existing file it is replayed, otherwise it is bound as a UDP
    /// address.
    #[arg(env, default_value = "0.0.0.0")]
    pub target: String,

    /// UDP data port, also used to filter pcap replays
    #[arg(long, env, default_value_t = DATA_PORT)]
    pub port: u16,

    /// Angle correction CSV of the sensor
    #[arg(long, env)]
    pub calibration: PathBuf,

    /// JSON decoder configuration.  Options given on the command line take
    /// precedence over the file.
    #[arg(long, env)]
    pub config: Option<PathBuf>,

    /// Azimuth in degrees at which a rotation starts
    #[arg(long, env)]
    pub scan_phase: Option<f64>,

    /// Azimuth output window start and stop angles in degrees
    #[arg(long, env, num_args = 2, value_names = ["START", "STOP"], value_delimiter = ' ')]
    pub angle_range: Option<Vec<f64>>,

    /// Minimum and maximum point distance in metres
    #[arg(long, env, num_args = 2, value_names = ["MIN", "MAX"], value_delimiter = ' ')]
    pub distance_range: Option<Vec<f64>>,

    /// Dual returns closer than this distance in metres are merged
    #[arg(long, env)]
    pub dual_return_distance_threshold: Option<f64>,

    /// Echoes to keep
    #[arg(long, env)]
    pub return_mode: Option<ReturnMode>,

    /// Lasers to discard, comma separated
    #[arg(long, env, value_delimiter = ',')]
    pub disable_rings: Vec<u16>,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}

fn pair(values: &[f64]) -> [f64; 2] {
    [values[0], values[1]]
}

impl Args {
    /// Build the decoder configuration from `--config` and the overrides.
    pub fn decoder_config(&self) -> Result<DecoderConfig, Error> {
        let mut config = match &self.config {
            Some(path) => DecoderConfig::from_file(path)?,
            None => DecoderConfig::default(),
        };

        if let Some(scan_phase) = self.scan_phase {
            config.scan_phase = scan_phase;
        }
        if let Some(angle_range) = &self.angle_range {
            config.angle_range = pair(angle_range);
        }
        if let Some(distance_range) = &self.distance_range {
            config.distance_range = pair(distance_range);
        }
        if let Some(threshold) = self.dual_return_distance_threshold {
            config.dual_return_distance_threshold = threshold;
        }
        if let Some(return_mode) = self.return_mode {
            config.return_mode = return_mode;
        }
        if !self.disable_rings.is_empty() {
            config.disable_rings = self.disable_rings.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
