// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Minimal synthetic producer for exercising the table pipeline.
//!
//! Connects to the store, writes image metadata for an RGB camera key and a
//! 16-bit depth key, then publishes N frames to each:
//! - RGB: a horizontal gradient that scrolls one column per frame
//! - depth: a ramp from 0 to 2500 mm (past the display ceiling)
//!
//! Usage: `publish_frames [--host H] [--port P] [--camera KEY] [--frames N] [--delay-ms MS]`

use anyhow::{Context, Result};
use clap::Parser;
use natar_store_client::{LinkConfig, StoreHandle, StoreLink};
use natar_store_proto::{suffix, ChannelKey, DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

const WIDTH: usize = 64;
const HEIGHT: usize = 48;

#[derive(Parser, Debug)]
#[command(about = "Publish synthetic RGB and depth frames")]
struct Args {
    /// Store host
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    /// Store port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Base key of the RGB camera; depth goes to `<camera>:depth`
    #[arg(long, default_value = "camera0")]
    camera: String,
    /// Frames to publish per key
    #[arg(long, default_value_t = 30)]
    frames: u64,
    /// Pause between frames in milliseconds
    #[arg(long, default_value_t = 33)]
    delay_ms: u64,
}

fn main() -> Result<()> {
    let Args {
        host,
        port,
        camera,
        frames,
        delay_ms,
    } = Args::parse();
    let camera = ChannelKey::new(camera);

    let mut link = StoreLink::new(LinkConfig::new(host, port));
    link.connect()
        .with_context(|| format!("connect {}", link.config().address()))?;
    let mut session = link.create_session().context("open session")?;

    let depth = camera.join("depth");
    for (key, channels, format) in [(&camera, "3", "RGB"), (&depth, "2", "GRAY16")] {
        session.set(key.join(suffix::WIDTH).as_str(), WIDTH.to_string().as_bytes())?;
        session.set(key.join(suffix::HEIGHT).as_str(), HEIGHT.to_string().as_bytes())?;
        session.set(key.join(suffix::CHANNELS).as_str(), channels.as_bytes())?;
        session.set(key.join(suffix::PIXEL_FORMAT).as_str(), format.as_bytes())?;
    }

    let mut rgb = vec![0u8; WIDTH * HEIGHT * 3];
    let mut gray = vec![0u8; WIDTH * HEIGHT * 2];
    for i in 0..frames {
        for (p, px) in rgb.chunks_exact_mut(3).enumerate() {
            let x = (p % WIDTH + i as usize) % WIDTH;
            let v = (x * 255 / (WIDTH - 1)) as u8;
            px.copy_from_slice(&[v, 255 - v, 128]);
        }
        for (p, sample) in gray.chunks_exact_mut(2).enumerate() {
            let mm = (p % WIDTH * 2500 / (WIDTH - 1)) as u16;
            sample.copy_from_slice(&mm.to_le_bytes());
        }
        session.set(camera.as_str(), &rgb).context("store rgb frame")?;
        session.publish(camera.as_str(), &rgb).context("publish rgb")?;
        session.set(depth.as_str(), &gray).context("store depth frame")?;
        session.publish(depth.as_str(), &gray).context("publish depth")?;
        std::thread::sleep(Duration::from_millis(delay_ms));
    }

    Ok(())
}
