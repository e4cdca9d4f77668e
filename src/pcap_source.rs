// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Offline replay of PandarQT captures.
//!
//! [`PcapSource`] loads the UDP payloads of a PCAP or PCAPNG file into memory
//! and hands them out through [`PacketSource`]. Frames may be Ethernet or raw
//! IP; anything that is not UDP is ignored.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_pandarqt::{packet_source::PacketSource, pcap_source::PcapSource};
//!
//! let mut source = PcapSource::data_packets("pandarqt.pcap")?;
//! let mut buf = [0u8; 1500];
//! while source.has_more() {
//!     let len = source.recv(&mut buf).await?;
//!     decoder.unpack(&buf[..len])?;
//! }
//! ```

use crate::{
    lidar::Error,
    packet_source::{DATA_PORT, PacketSource, RecvFuture, ReplaySource},
};
use etherparse::{SlicedPacket, TransportSlice};
use log::debug;
use pcap_parser::{Block, PcapBlockOwned, PcapError, create_reader, traits::PcapReaderIterator};
use std::{io, path::Path};

fn capture_error(msg: String) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, msg))
}

/// Capture file replayed once.
#[derive(Clone, Debug)]
pub struct PcapSource {
    replay: ReplaySource,
}

impl PcapSource {
    /// Load the PandarQT data packets of a capture, those sent from or to
    /// [`DATA_PORT`].
    pub fn data_packets<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_file(path, Some(DATA_PORT))
    }

    /// Load every UDP payload of a capture, or only those whose source or
    /// destination port is `port`.
    pub fn from_file<P: AsRef<Path>>(path: P, port: Option<u16>) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data, port)
    }

    /// Same as [`PcapSource::from_file`] for a capture already in memory.
    pub fn from_bytes(data: &[u8], port: Option<u16>) -> Result<Self, Error> {
        let payloads = read_payloads(data, port)?;
        debug!("loaded {} UDP payloads from capture", payloads.len());
        Ok(Self {
            replay: ReplaySource::new(payloads),
        })
    }

    pub fn len(&self) -> usize {
        self.replay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replay.is_empty()
    }

    /// Packets not yet delivered.
    pub fn remaining(&self) -> usize {
        self.replay.len().saturating_sub(self.replay.position())
    }

    pub fn rewind(&mut self) {
        self.replay.rewind();
    }
}

impl PacketSource for PcapSource {
    fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> RecvFuture<'a> {
        self.replay.recv(buf)
    }

    fn has_more(&self) -> bool {
        self.replay.has_more()
    }
}

/// Walk all records of a legacy or NG capture.
fn read_payloads(data: &[u8], port: Option<u16>) -> Result<Vec<Vec<u8>>, Error> {
    // The reader buffer holds the whole file so records never straddle a
    // refill.
    let mut reader = create_reader(data.len().max(64), data)
        .map_err(|err| capture_error(format!("unrecognized capture format: {:?}", err)))?;

    let mut payloads = Vec::new();
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let frame = match block {
                    PcapBlockOwned::Legacy(record) => Some(record.data),
                    PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => Some(epb.data),
                    PcapBlockOwned::NG(Block::SimplePacket(spb)) => Some(spb.data),
                    _ => None,
                };
                if let Some(payload) = frame.and_then(|frame| udp_payload(frame, port)) {
                    payloads.push(payload);
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) | Err(PcapError::Incomplete(_)) => break,
            Err(err) => return Err(capture_error(format!("capture parse error: {:?}", err))),
        }
    }

    Ok(payloads)
}

/// UDP payload of an Ethernet or raw IP frame matching the port filter.
fn udp_payload(frame: &[u8], port: Option<u16>) -> Option<Vec<u8>> {
    let sliced = SlicedPacket::from_ethernet(frame)
        .ok()
        .filter(|sliced| sliced.transport.is_some())
        .or_else(|| SlicedPacket::from_ip(frame).ok())?;

    let Some(TransportSlice::Udp(udp)) = sliced.transport else {
        return None;
    };

    if let Some(port) = port {
        if udp.source_port() != port && udp.destination_port() != port {
            return None;
        }
    }

    let payload = udp.payload();
    (!payload.is_empty()).then(|| payload.to_vec())
}
