//! wstream reference producer.
//!
//! ```text
//! wstream-producer <name>                 Publish a gradient at 30 fps
//! wstream-producer <name> --fps 60 --pattern bar
//! wstream-producer <name> --no-checksum   Rely on the sequence counter only
//! ```
//!
//! The consumer owns the channel: until it has created the region the
//! producer keeps retrying, and whenever the consumer tears the region down
//! (resize, rename, exit) the producer drops its mapping and reopens.
//! Frames always match the size the consumer last asked for.

mod pattern;

use std::time::Duration;

use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::EnvFilter;
use wstream_core::ChannelProducer;

use crate::pattern::Pattern;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "wstream-producer", about = "Publish test frames into a wstream channel")]
struct Cli {
    /// Channel name, as given to `setStreamName`.
    name: String,

    /// Frames per second (1-240).
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Frame content.
    #[arg(long, value_enum, default_value_t = Pattern::Gradient)]
    pattern: Pattern,

    /// Do not checksum payloads.
    #[arg(long)]
    no_checksum: bool,

    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

// ── Publisher ────────────────────────────────────────────────────

/// Opens, reopens and publishes into one channel.
struct Publisher {
    name: String,
    pattern: Pattern,
    checksum: bool,
    producer: Option<ChannelProducer>,
    frame_no: u64,
    published: u64,
    waiting_logged: bool,
}

impl Publisher {
    fn new(name: String, pattern: Pattern, checksum: bool) -> Self {
        Self {
            name,
            pattern,
            checksum,
            producer: None,
            frame_no: 0,
            published: 0,
            waiting_logged: false,
        }
    }

    /// One frame period. Returns `true` if a frame was published.
    fn tick(&mut self) -> bool {
        if self
            .producer
            .as_ref()
            .is_some_and(ChannelProducer::is_torn_down)
        {
            info!(channel = %self.name, "channel torn down by consumer; reopening");
            self.producer = None;
        }

        if self.producer.is_none() {
            match ChannelProducer::open(&self.name) {
                Ok(producer) => {
                    let producer = if self.checksum {
                        producer
                    } else {
                        producer.without_checksum()
                    };
                    info!(
                        channel = %self.name,
                        capacity = producer.capacity(),
                        "channel open"
                    );
                    self.producer = Some(producer);
                    self.waiting_logged = false;
                }
                Err(e) => {
                    if !self.waiting_logged {
                        info!(channel = %self.name, "waiting for consumer: {e}");
                        self.waiting_logged = true;
                    }
                    return false;
                }
            }
        }
        let Some(producer) = self.producer.as_mut() else {
            return false;
        };

        let Some(dims) = producer.requested_dimensions() else {
            debug!(channel = %self.name, "consumer has not requested a size yet");
            return false;
        };
        let frame = pattern::render(self.pattern, dims, self.frame_no);
        match producer.publish(dims, frame.as_bytes()) {
            Ok(seq) => {
                trace!(seq, %dims, "frame published");
                self.frame_no += 1;
                self.published += 1;
                true
            }
            Err(e) => {
                warn!(channel = %self.name, %dims, "publish failed: {e}");
                false
            }
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let fps = cli.fps.clamp(1, 240);
    info!("wstream-producer v{}", env!("CARGO_PKG_VERSION"));
    info!(channel = %cli.name, fps, pattern = ?cli.pattern, "starting");

    let mut publisher = Publisher::new(cli.name, cli.pattern, !cli.no_checksum);
    let mut ticker = tokio::time::interval(Duration::from_secs(1) / fps);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Ctrl-C received");
                break;
            }
            _ = ticker.tick() => {
                publisher.tick();
            }
        }
    }

    info!(published = publisher.published, "producer stopped");
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
