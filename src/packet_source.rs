// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sources of raw PandarQT data packets.
//!
//! The decoder only ever sees byte slices. A [`PacketSource`] fills a caller
//! provided buffer with the next datagram, either from the sensor's UDP
//! stream ([`UdpSource`]), from memory ([`ReplaySource`]) or from a capture
//! file (`PcapSource`, behind the `pcap` feature).
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_pandarqt::packet_source::{PacketSource, UdpSource, DATA_PORT};
//!
//! let mut source = UdpSource::bind(("0.0.0.0", DATA_PORT)).await?;
//! let mut buf = [0u8; 1500];
//! while source.has_more() {
//!     let len = source.recv(&mut buf).await?;
//!     decoder.unpack(&buf[..len])?;
//! }
//! ```

use crate::{lidar::Error, packet::RawPacket};
use std::{future::Future, io, net::SocketAddr, pin::Pin};
use tokio::net::{ToSocketAddrs, UdpSocket};

/// Default UDP destination port of PandarQT data packets.
pub const DATA_PORT: u16 = 2368;

/// Boxed future returned by [`PacketSource::recv`].
pub type RecvFuture<'a> = Pin<Box<dyn Future<Output = Result<usize, Error>> + Send + 'a>>;

/// A stream of datagrams.
pub trait PacketSource: Send {
    /// Copy the next packet into `buf`, truncating it to the buffer length.
    ///
    /// # Returns
    /// - `Ok(len)` with the number of bytes written
    /// - `Err` on I/O failure or when a finite source is exhausted
    fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> RecvFuture<'a>;

    /// `false` once a finite source has delivered its last packet.
    fn has_more(&self) -> bool;
}

/// Live sensor stream.
pub struct UdpSource {
    socket: UdpSocket,
}

impl UdpSource {
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }

    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }
}

impl PacketSource for UdpSource {
    fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> RecvFuture<'a> {
        Box::pin(async move { Ok(self.socket.recv(buf).await?) })
    }

    fn has_more(&self) -> bool {
        true
    }
}

/// In-memory packet sequence, played once or in a loop.
#[derive(Clone, Debug, Default)]
pub struct ReplaySource {
    packets: Vec<Vec<u8>>,
    position: usize,
    looping: bool,
}

impl ReplaySource {
    /// Play `packets` once.
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self {
            packets,
            position: 0,
            looping: false,
        }
    }

    /// Play `packets` repeatedly. Useful for benchmarks and soak tests.
    pub fn looping(packets: Vec<Vec<u8>>) -> Self {
        Self {
            looping: true,
            ..Self::new(packets)
        }
    }

    /// Play the wire encoding of `packets` once.
    pub fn from_packets<'p>(packets: impl IntoIterator<Item = &'p RawPacket>) -> Self {
        Self::new(packets.into_iter().map(RawPacket::encode).collect())
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Number of packets delivered so far, counting repeats.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn rewind(&mut self) {
        self.position = 0;
    }

    fn next_packet(&mut self) -> Option<&[u8]> {
        let index = if self.looping && !self.packets.is_empty() {
            self.position % self.packets.len()
        } else {
            self.position
        };
        let packet = self.packets.get(index)?;
        self.position += 1;
        Some(packet)
    }
}

impl PacketSource for ReplaySource {
    fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> RecvFuture<'a> {
        Box::pin(async move {
            let packet = self
                .next_packet()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more packets"))?;
            let len = packet.len().min(buf.len());
            buf[..len].copy_from_slice(&packet[..len]);
            Ok(len)
        })
    }

    fn has_more(&self) -> bool {
        if self.looping {
            !self.packets.is_empty()
        } else {
            self.position < self.packets.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PACKET_SIZE, PACKET_WITHOUT_UDPSEQ_SIZE};

    #[tokio::test]
    async fn test_replay_once() {
        let mut source = ReplaySource::new(vec![vec![1, 2, 3], vec![4, 5]]);
        assert_eq!(source.len(), 2);
        let mut buf = [0u8; 16];

        let len = source.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[1, 2, 3]);
        assert!(source.has_more());
        let len = source.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[4, 5]);

        assert!(!source.has_more());
        assert!(matches!(
            source.recv(&mut buf).await,
            Err(Error::Io(err)) if err.kind() == io::ErrorKind::UnexpectedEof
        ));

        source.rewind();
        assert!(source.has_more());
        let len = source.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_replay_looping() {
        let mut source = ReplaySource::looping(vec![vec![1], vec![2]]);
        let mut buf = [0u8; 4];
        let mut seen = Vec::new();
        for _ in 0..5 {
            assert!(source.has_more());
            let len = source.recv(&mut buf).await.unwrap();
            seen.push(buf[..len][0]);
        }
        assert_eq!(seen, vec![1, 2, 1, 2, 1]);
        assert_eq!(source.position(), 5);
    }

    #[tokio::test]
    async fn test_replay_empty() {
        let mut source = ReplaySource::looping(Vec::new());
        assert!(source.is_empty());
        assert!(!source.has_more());
        let mut buf = [0u8; 4];
        assert!(source.recv(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_replay_truncates_to_buffer() {
        let mut source = ReplaySource::new(vec![vec![9; 32]]);
        let mut buf = [0u8; 8];
        assert_eq!(source.recv(&mut buf).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_replay_from_packets() {
        let with_sequence = RawPacket {
            udp_sequence: Some(7),
            ..Default::default()
        };
        let without_sequence = RawPacket::default();
        let mut source = ReplaySource::from_packets([&with_sequence, &without_sequence]);

        let mut buf = [0u8; 1500];
        assert_eq!(source.recv(&mut buf).await.unwrap(), PACKET_SIZE);
        assert_eq!(
            source.recv(&mut buf).await.unwrap(),
            PACKET_WITHOUT_UDPSEQ_SIZE
        );
    }

    #[tokio::test]
    async fn test_udp_source() {
        let mut source = UdpSource::bind("127.0.0.1:0").await.unwrap();
        let addr = source.local_addr().unwrap();
        assert!(source.has_more());

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[0xEE, 0xFF, 1, 2], addr).await.unwrap();

        let mut buf = [0u8; 64];
        let len = source.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[0xEE, 0xFF, 1, 2]);
    }
}
