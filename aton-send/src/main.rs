//! aton-send: streams a generated gradient to an Aton listener.
//!
//! ```text
//! aton-send                              640x480 to 127.0.0.1:9201
//! aton-send --addr host:9300 -W 1920 -H 1080 --bucket 64
//! aton-send --shutdown                   Ask the listener to stop afterwards
//! ```

use std::time::{Duration, Instant};

use aton_core::{DEFAULT_PORT, RenderSender, TileData};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aton-send", about = "Send a synthetic render to an Aton listener")]
struct Cli {
    /// Listener address.
    #[arg(short, long, default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"))]
    addr: String,

    /// Image width in pixels.
    #[arg(short = 'W', long, default_value_t = 640)]
    width: u32,

    /// Image height in pixels.
    #[arg(short = 'H', long, default_value_t = 480)]
    height: u32,

    /// Bucket edge length in pixels.
    #[arg(short, long, default_value_t = 32, value_parser = clap::value_parser!(u32).range(1..))]
    bucket: u32,

    /// Samples per pixel (1 to 4).
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=4))]
    spp: u32,

    /// Pause between buckets in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Send Shutdown after the image is closed.
    #[arg(long)]
    shutdown: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut sender = RenderSender::connect(cli.addr.as_str()).await?;
    info!("connected to {}", cli.addr);

    let area = cli.width.saturating_mul(cli.height);
    sender.open_image(cli.width, cli.height, area).await?;

    let started = Instant::now();
    let mut buckets = 0u32;
    for y in (0..cli.height).step_by(cli.bucket as usize) {
        for x in (0..cli.width).step_by(cli.bucket as usize) {
            let width = cli.bucket.min(cli.width - x);
            let height = cli.bucket.min(cli.height - y);
            let mut tile = gradient_bucket(&cli, x, y, width, height);
            tile.ram = 64 * 1024 * 1024 + u64::from(buckets) * 4096;
            tile.elapsed_ms = u32::try_from(started.elapsed().as_millis()).unwrap_or(u32::MAX);
            sender.send_tile(tile).await?;
            buckets += 1;

            if cli.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(cli.delay_ms)).await;
            }
        }
    }

    sender.close_image().await?;
    info!(
        "sent {buckets} buckets for {}x{} in {:?}",
        cli.width,
        cli.height,
        started.elapsed()
    );

    if cli.shutdown {
        sender.shutdown().await?;
        info!("shutdown sent");
    }
    sender.finish().await?;
    Ok(())
}

/// Red ramps left to right, green bottom to top, blue is constant.
fn gradient_bucket(cli: &Cli, x: u32, y: u32, width: u32, height: u32) -> TileData {
    let mut pixels = Vec::with_capacity((width * height * cli.spp) as usize);
    for row in 0..height {
        for col in 0..width {
            let r = (x + col) as f32 / cli.width.max(1) as f32;
            let g = (y + row) as f32 / cli.height.max(1) as f32;
            let rgba = [r, g, 0.25, 1.0];
            pixels.extend_from_slice(&rgba[..cli.spp as usize]);
        }
    }

    TileData {
        x: x as i32,
        y: y as i32,
        width,
        height,
        samples_per_pixel: cli.spp,
        ram: 0,
        elapsed_ms: 0,
        pixels,
    }
}
