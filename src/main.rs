// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use edgefirst_pandarqt::{
    Calibration, Error, LidarDriver, PandarQtDecoder,
    packet_source::{PacketSource, UdpSource},
};
use log::{debug, info};
use std::{path::Path, time::Instant};

/// Large enough for any datagram on a standard MTU link.
const RECV_BUFFER_SIZE: usize = 1500;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.rust_log)
        .init();

    let config = args.decoder_config()?;
    let calibration = Calibration::from_file(&args.calibration)?;
    let decoder = PandarQtDecoder::new(&config, &calibration)?;
    info!(
        "decoding {} returns, scan phase {}°, window {}° to {}°",
        config.return_mode, config.scan_phase, config.angle_range[0], config.angle_range[1]
    );
    if !decoder.use_overflow() {
        info!("scan phase outside the output window, scans are cut at the window edge");
    }

    let source = open_source(&args).await?;
    run(decoder, source).await?;
    Ok(())
}

async fn open_source(args: &Args) -> Result<Box<dyn PacketSource>, Error> {
    if Path::new(&args.target).is_file() {
        return open_capture(args);
    }

    let source = UdpSource::bind((args.target.as_str(), args.port)).await?;
    info!("listening on {}", source.local_addr()?);
    Ok(Box::new(source))
}

#[cfg(feature = "pcap")]
fn open_capture(args: &Args) -> Result<Box<dyn PacketSource>, Error> {
    let source =
        edgefirst_pandarqt::pcap_source::PcapSource::from_file(&args.target, Some(args.port))?;
    info!("replaying {} packets from {}", source.len(), args.target);
    Ok(Box::new(source))
}

#[cfg(not(feature = "pcap"))]
fn open_capture(args: &Args) -> Result<Box<dyn PacketSource>, Error> {
    Err(Error::Config(format!(
        "{} is a file but pcap replay requires the pcap feature",
        args.target
    )))
}

/// Decode packets until the source runs dry, reporting every completed scan.
async fn run<D: LidarDriver>(mut driver: D, mut source: Box<dyn PacketSource>) -> Result<(), Error> {
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    let mut packets = 0usize;
    let mut dropped = 0usize;
    let mut last_scan = Instant::now();

    while source.has_more() {
        let len = source.recv(&mut buf).await?;
        packets += 1;

        if let Err(err) = driver.unpack(&buf[..len]) {
            dropped += 1;
            debug!("packet {} rejected: {}", packets, err);
            continue;
        }

        if driver.has_scanned() {
            let elapsed = last_scan.elapsed();
            last_scan = Instant::now();
            let scan = driver.get_scan();
            info!(
                "scan {}: {} points, {:.1} ms since previous",
                scan.frame_id,
                scan.points.len(),
                elapsed.as_secs_f64() * 1000.0
            );
        }
    }

    info!("{} packets received, {} rejected", packets, dropped);
    Ok(())
}
