// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common types shared by the PandarQT decoding pipeline.
//!
//! This module holds the crate-wide [`Error`] type, the configured
//! [`ReturnMode`], the [`LidarDriver`] trait implemented by the decoder and
//! the [`TimeSource`] capability used to stamp retrieved scans.

use crate::scan::Scan;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Common error type for PandarQT decoding.
#[derive(Debug)]
pub enum Error {
    /// I/O error (socket, file operations)
    Io(std::io::Error),
    /// Packet length is neither of the two accepted fixed sizes
    SizeMismatch { len: usize },
    /// Start-of-frame marker is not `0xEEFF`
    BadFraming(u16),
    /// Header declares more lasers or blocks than the packet layout holds
    InvalidHeader { lasers: u8, blocks: u8 },
    /// Calibration does not match the sensor laser layout
    InvalidCalibration(String),
    /// Configuration error
    Config(String),
    /// System time error
    SystemTime(std::time::SystemTimeError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::SizeMismatch { len } => write!(f, "unexpected packet size: {} bytes", len),
            Error::BadFraming(sob) => write!(f, "invalid start of packet: {:#06x}", sob),
            Error::InvalidHeader { lasers, blocks } => write!(
                f,
                "invalid packet header: {} lasers, {} blocks",
                lasers, blocks
            ),
            Error::InvalidCalibration(msg) => write!(f, "invalid calibration: {}", msg),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
            Error::SystemTime(err) => write!(f, "system time error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(err: std::time::SystemTimeError) -> Self {
        Error::SystemTime(err)
    }
}

/// Requested return mode.
///
/// This is the caller's choice of which echoes to keep and is distinct from
/// the return mode the sensor reports in each packet.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReturnMode {
    /// Keep the first echo of each firing
    First,
    /// Keep the last echo of each firing
    Last,
    /// Keep both echoes, merging them when they are too close together
    #[default]
    Dual,
}

impl fmt::Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReturnMode::First => write!(f, "first"),
            ReturnMode::Last => write!(f, "last"),
            ReturnMode::Dual => write!(f, "dual"),
        }
    }
}

/// Source of host time in nanoseconds.
pub trait TimeSource: Send {
    fn now_ns(&self) -> u64;
}

/// [`TimeSource`] backed by [`timestamp`].
///
/// Falls back to zero when the clock cannot be read.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl TimeSource for MonotonicClock {
    fn now_ns(&self) -> u64 {
        timestamp().unwrap_or(0)
    }
}

/// Trait for LiDAR packet decoders that assemble full rotations.
///
/// Packets are pushed with [`LidarDriver::unpack`]. Once
/// [`LidarDriver::has_scanned`] reports a completed rotation the caller
/// retrieves it with [`LidarDriver::get_scan`]; buffers are recycled lazily
/// on the next call to `unpack`.
pub trait LidarDriver: Send {
    /// Decode one UDP payload.
    ///
    /// # Returns
    /// - `Ok(n)` with the number of points appended to the scan buffers
    /// - `Err` if the packet was rejected, in which case no state changed
    fn unpack(&mut self, data: &[u8]) -> Result<usize, Error>;

    /// Whether the rotation currently being assembled has completed.
    fn has_scanned(&self) -> bool;

    /// Retrieve the current scan and arm the buffer reset.
    fn get_scan(&mut self) -> Scan<'_>;
}

/// Get current timestamp in nanoseconds.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` for best accuracy.
/// On other platforms, falls back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000_000 + tp.tv_nsec as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH)?;
    Ok(duration.as_nanos() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::SizeMismatch { len: 12 }.to_string(),
            "unexpected packet size: 12 bytes"
        );
        assert_eq!(
            Error::BadFraming(0x1234).to_string(),
            "invalid start of packet: 0x1234"
        );
        assert_eq!(
            Error::InvalidHeader {
                lasers: 80,
                blocks: 4
            }
            .to_string(),
            "invalid packet header: 80 lasers, 4 blocks"
        );
    }

    #[test]
    fn test_return_mode_serde() {
        let mode: ReturnMode = serde_json::from_str("\"last\"").unwrap();
        assert_eq!(mode, ReturnMode::Last);
        assert_eq!(serde_json::to_string(&ReturnMode::Dual).unwrap(), "\"dual\"");
        assert_eq!(ReturnMode::default(), ReturnMode::Dual);
        assert_eq!(ReturnMode::First.to_string(), "first");
    }

    #[test]
    fn test_monotonic_clock() {
        let clock = MonotonicClock;
        let a = clock.now_ns();
        let b = clock.now_ns();
        assert!(b >= a);
    }
}
