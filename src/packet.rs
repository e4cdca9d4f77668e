// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PandarQT UDP data packet parser.
//!
//! # Packet Structure
//!
//! 1072 bytes (1068 when the UDP sequence number is disabled), all multi-byte
//! fields little-endian except the start-of-packet marker:
//!
//! ```text
//! ┌──────────────┬────────────────────────────────────┬─────────────────┐
//! │ Header 12B   │ 4 × Block (2B azimuth + 64 × 4B)   │ Tail 28B / 24B  │
//! └──────────────┴────────────────────────────────────┴─────────────────┘
//! ```
//!
//! - Header: `0xEE 0xFF`, protocol major/minor, 2 reserved, laser count,
//!   block count, return type, distance unit, 2 reserved
//! - Unit: range (u16, in `distance unit` millimetres), intensity, confidence
//! - Tail: 10 reserved, engine velocity (2), microseconds (u32), return mode,
//!   factory information, UTC (year, month, day, hour, minute, second),
//!   optional UDP sequence (u32)

use crate::lidar::Error;
use chrono::NaiveDate;

/// Start-of-packet marker, first byte high.
pub const SOB: u16 = 0xEEFF;

pub const HEAD_SIZE: usize = 12;
pub const BLOCK_HEADER_AZIMUTH: usize = 2;
pub const UNIT_SIZE: usize = 4;

/// Number of lasers (units per block).
pub const UNIT_NUM: usize = 64;

/// Number of blocks per packet.
pub const BLOCK_NUM: usize = 4;

pub const BLOCK_SIZE: usize = BLOCK_HEADER_AZIMUTH + UNIT_SIZE * UNIT_NUM;
pub const BODY_SIZE: usize = BLOCK_SIZE * BLOCK_NUM;
pub const RESERVED_SIZE: usize = 10;
pub const ENGINE_VELOCITY: usize = 2;
pub const TIMESTAMP_SIZE: usize = 4;
pub const RETURN_SIZE: usize = 1;
pub const FACTORY_SIZE: usize = 1;
pub const UTC_SIZE: usize = 6;
pub const SEQUENCE_SIZE: usize = 4;
pub const TAIL_SIZE: usize = RESERVED_SIZE
    + ENGINE_VELOCITY
    + TIMESTAMP_SIZE
    + RETURN_SIZE
    + FACTORY_SIZE
    + UTC_SIZE
    + SEQUENCE_SIZE;

/// Packet size with the trailing UDP sequence number.
pub const PACKET_SIZE: usize = HEAD_SIZE + BODY_SIZE + TAIL_SIZE;

/// Packet size without the trailing UDP sequence number.
pub const PACKET_WITHOUT_UDPSEQ_SIZE: usize = PACKET_SIZE - SEQUENCE_SIZE;

/// Sensor return mode bytes.
pub const FIRST_RETURN: u8 = 0x33;
pub const LAST_RETURN: u8 = 0x38;
pub const DUAL_RETURN: u8 = 0x39;

/// One laser measurement within a block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Unit {
    /// Raw range code
    pub range: u16,
    /// Range in metres (`range * dis_unit / 1000`)
    pub distance: f64,
    pub intensity: u8,
    pub confidence: u8,
}

impl Unit {
    const EMPTY: Unit = Unit {
        range: 0,
        distance: 0.0,
        intensity: 0,
        confidence: 0,
    };
}

/// One firing sequence: an azimuth and one unit per laser.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Block {
    /// Azimuth in centidegrees, 0-35999
    pub azimuth: u16,
    pub units: [Unit; UNIT_NUM],
}

impl Default for Block {
    fn default() -> Self {
        Self {
            azimuth: 0,
            units: [Unit::EMPTY; UNIT_NUM],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// Start of packet, always [`SOB`] once parsed
    pub sob: u16,
    pub protocol_major: u8,
    pub protocol_minor: u8,
    pub laser_count: u8,
    pub block_count: u8,
    /// Return type as reported in the header
    pub return_type: u8,
    /// Distance unit in millimetres
    pub dis_unit: u8,
}

/// Packet UTC time as sent by the sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UtcTime {
    /// Raw year byte
    pub year: u8,
    /// Month, 1-based
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl UtcTime {
    /// Years since 1900.
    ///
    /// The year byte is normally two digits since 2000; firmware that sends
    /// years since 1900 instead is corrected.
    pub fn tm_year(&self) -> i32 {
        let tm_year = self.year as i32 + 100;
        if tm_year >= 200 {
            tm_year - 100
        } else {
            tm_year
        }
    }

    /// Seconds since the unix epoch.
    ///
    /// Every field past its range rolls over into the next unit, and month or
    /// day 0 step back into the previous year or month, so any field values
    /// give a time.
    pub fn unix_seconds(&self) -> i64 {
        // Month 0 is December of the previous year
        let months = self.month as i32 - 1;
        let year = 1900 + self.tm_year() + months.div_euclid(12);
        let month = months.rem_euclid(12) as u32 + 1;

        // Years 1999 to 2176 are always representable
        let first_of_month = NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc().timestamp())
            .unwrap_or_default();

        first_of_month
            + (self.day as i64 - 1) * 86400
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64
    }
}

/// Parsed data packet.
///
/// The record has room for the maximum number of blocks and lasers; only the
/// first `block_count` blocks and `laser_count` units per block are valid.
#[derive(Clone, Debug, PartialEq)]
pub struct RawPacket {
    pub header: Header,
    pub blocks: [Block; BLOCK_NUM],
    /// Microsecond part of the packet timestamp
    pub usec: u32,
    /// Return mode byte from the tail ([`FIRST_RETURN`], [`LAST_RETURN`] or
    /// [`DUAL_RETURN`])
    pub return_mode: u8,
    pub utc: UtcTime,
    /// UDP sequence number, when the sensor sends it
    pub udp_sequence: Option<u32>,
}

impl Default for RawPacket {
    fn default() -> Self {
        Self {
            header: Header::default(),
            blocks: [Block::default(); BLOCK_NUM],
            usec: 0,
            return_mode: 0,
            utc: UtcTime::default(),
            udp_sequence: None,
        }
    }
}

/// Parse a data packet into a new record.
pub fn parse(data: &[u8]) -> Result<RawPacket, Error> {
    let mut packet = RawPacket::default();
    packet.parse_into(data)?;
    Ok(packet)
}

impl RawPacket {
    /// The valid blocks of the packet.
    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks[..self.header.block_count as usize]
    }

    /// Number of valid units in each block.
    #[inline]
    pub fn laser_count(&self) -> usize {
        self.header.laser_count as usize
    }

    /// Whether the sensor is firing in dual return mode.
    #[inline]
    pub fn is_dual_return(&self) -> bool {
        self.return_mode == DUAL_RETURN
    }

    /// Parse a data packet in place, overwriting the previous contents.
    ///
    /// Size, start-of-packet and the declared laser/block counts are checked
    /// before anything is written; on error the record is left untouched.
    pub fn parse_into(&mut self, data: &[u8]) -> Result<(), Error> {
        if data.len() != PACKET_SIZE && data.len() != PACKET_WITHOUT_UDPSEQ_SIZE {
            return Err(Error::SizeMismatch { len: data.len() });
        }

        let sob = u16::from_be_bytes([data[0], data[1]]);
        if sob != SOB {
            return Err(Error::BadFraming(sob));
        }

        let lasers = data[6];
        let blocks = data[7];
        if lasers as usize > UNIT_NUM || blocks as usize > BLOCK_NUM {
            return Err(Error::InvalidHeader { lasers, blocks });
        }

        self.header = Header {
            sob,
            protocol_major: data[2],
            protocol_minor: data[3],
            laser_count: lasers,
            block_count: blocks,
            return_type: data[8],
            dis_unit: data[9],
        };
        let dis_unit = self.header.dis_unit as f64;

        let mut index = HEAD_SIZE;
        for block in self.blocks.iter_mut().take(blocks as usize) {
            block.azimuth = u16::from_le_bytes([data[index], data[index + 1]]);
            index += BLOCK_HEADER_AZIMUTH;

            for unit in block.units.iter_mut().take(lasers as usize) {
                let range = u16::from_le_bytes([data[index], data[index + 1]]);
                unit.range = range;
                unit.distance = range as f64 * dis_unit / 1000.0;
                unit.intensity = data[index + 2];
                unit.confidence = data[index + 3];
                index += UNIT_SIZE;
            }
        }

        index += RESERVED_SIZE + ENGINE_VELOCITY;

        self.usec = u32::from_le_bytes([
            data[index],
            data[index + 1],
            data[index + 2],
            data[index + 3],
        ]);
        index += TIMESTAMP_SIZE;

        self.return_mode = data[index];
        index += RETURN_SIZE + FACTORY_SIZE;

        self.utc = UtcTime {
            year: data[index],
            month: data[index + 1],
            day: data[index + 2],
            hour: data[index + 3],
            minute: data[index + 4],
            second: data[index + 5],
        };
        index += UTC_SIZE;

        self.udp_sequence = if data.len() == PACKET_SIZE {
            data.get(index..index + SEQUENCE_SIZE)
                .map(|seq| u32::from_le_bytes([seq[0], seq[1], seq[2], seq[3]]))
        } else {
            None
        };

        Ok(())
    }

    /// Write the packet back into its wire layout.
    ///
    /// Reserved, engine velocity and factory bytes are written as zero. The
    /// packet is [`PACKET_SIZE`] bytes when `udp_sequence` is set and
    /// [`PACKET_WITHOUT_UDPSEQ_SIZE`] otherwise.
    pub fn encode(&self) -> Vec<u8> {
        let size = match self.udp_sequence {
            Some(_) => PACKET_SIZE,
            None => PACKET_WITHOUT_UDPSEQ_SIZE,
        };
        let mut data = vec![0u8; size];

        data[0..2].copy_from_slice(&SOB.to_be_bytes());
        data[2] = self.header.protocol_major;
        data[3] = self.header.protocol_minor;
        data[6] = self.header.laser_count;
        data[7] = self.header.block_count;
        data[8] = self.header.return_type;
        data[9] = self.header.dis_unit;

        let mut index = HEAD_SIZE;
        for block in self.blocks() {
            data[index..index + 2].copy_from_slice(&block.azimuth.to_le_bytes());
            index += BLOCK_HEADER_AZIMUTH;

            for unit in &block.units[..self.laser_count()] {
                data[index..index + 2].copy_from_slice(&unit.range.to_le_bytes());
                data[index + 2] = unit.intensity;
                data[index + 3] = unit.confidence;
                index += UNIT_SIZE;
            }
        }

        index += RESERVED_SIZE + ENGINE_VELOCITY;
        data[index..index + 4].copy_from_slice(&self.usec.to_le_bytes());
        index += TIMESTAMP_SIZE;
        data[index] = self.return_mode;
        index += RETURN_SIZE + FACTORY_SIZE;

        data[index] = self.utc.year;
        data[index + 1] = self.utc.month;
        data[index + 2] = self.utc.day;
        data[index + 3] = self.utc.hour;
        data[index + 4] = self.utc.minute;
        data[index + 5] = self.utc.second;
        index += UTC_SIZE;

        if let Some(seq) = self.udp_sequence {
            data[index..index + 4].copy_from_slice(&seq.to_le_bytes());
        }

        data
    }
}
