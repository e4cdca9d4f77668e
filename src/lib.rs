// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst PandarQT Decoder Library
//!
//! This library decodes Hesai PandarQT UDP data packets into calibrated 3D
//! points and assembles them into full-rotation scans.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │  PacketSource   │ ──► │  RawPacket     │ ──► │  ReturnResolver  │
//! │  (UDP/pcap/test)│     │  (parse)       │     │  (filter, dual)  │
//! └─────────────────┘     └────────────────┘     └──────────────────┘
//!                                                         │
//!                                                         ▼
//!                         ┌────────────────┐     ┌──────────────────┐
//!                         │  Scan          │ ◄── │  ScanAssembler   │
//!                         │  (borrowed)    │     │  (ScanBuffers)   │
//!                         └────────────────┘     └──────────────────┘
//! ```
//!
//! The decoder owns both scan buffers. A retrieved [`scan::Scan`] borrows the
//! active buffer, so it cannot outlive the next call to
//! [`lidar::LidarDriver::unpack`], which is where the buffers are recycled.
//!
//! # Modules
//!
//! - [`lidar`]: Common types, traits, and error handling
//! - [`calibration`]: Calibration file loader and lookup tables
//! - [`packet`]: Wire format parsing and encoding
//! - [`point`]: Point construction
//! - [`returns`]: Distance filtering and dual return resolution
//! - [`scan`]: Rotation segmentation
//! - [`decoder`]: The [`decoder::PandarQtDecoder`] tying it all together
//! - [`packet_source`]: Packet source abstraction for testing
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_pandarqt::{
//!     Calibration, DecoderConfig, LidarDriver, PandarQtDecoder,
//! };
//!
//! let calibration = Calibration::from_file("PandarQT.csv")?;
//! let mut decoder = PandarQtDecoder::new(&DecoderConfig::default(), &calibration)?;
//!
//! loop {
//!     let len = socket.recv(&mut buf)?;
//!     if decoder.unpack(&buf[..len]).is_ok() && decoder.has_scanned() {
//!         let scan = decoder.get_scan();
//!         for point in scan.points {
//!             println!("{} {} {}", point.x, point.y, point.z);
//!         }
//!     }
//! }
//! ```

pub mod buffer;
pub mod calibration;
pub mod decoder;
pub mod lidar;
pub mod packet;
pub mod packet_source;
#[cfg(feature = "pcap")]
pub mod pcap_source;
pub mod point;
pub mod returns;
pub mod scan;

// Re-exports for convenience
pub use buffer::PointCloud;
pub use calibration::Calibration;
pub use decoder::{DecoderConfig, PandarQtDecoder};
pub use lidar::{Error, LidarDriver, ReturnMode};
pub use point::{Point, ReturnType};
pub use scan::Scan;
