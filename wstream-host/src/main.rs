//! wstream host entry point.
//!
//! ```text
//! wstream-host                     Open a window, read commands from stdin
//! wstream-host --headless          No window; frames are counted and dropped
//! wstream-host --stream <name>     Start reading the named shared channel
//! wstream-host --window <handle>   Start capturing a window
//! wstream-host --config <path>     Load a custom config TOML
//! wstream-host --gen-config        Write default config to stdout
//! ```
//!
//! Control commands (`setWindowHandle`, `setStreamName`, `setDefaultColor`,
//! `clearWindowHandle`, `clearStreamName`) are read one per line from stdin.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wstream_core::FrameSource;

use wstream_host::app::{EventLoop, ExitReason};
use wstream_host::config::HostConfig;
use wstream_host::display::GdiPresenter;
use wstream_host::surface::{HeadlessPresenter, Presenter};

/// Longest accepted control line.
const MAX_LINE: usize = 4096;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "wstream-host", about = "Live window / shared-memory frame viewer")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "wstream-host.toml")]
    config: PathBuf,

    /// Window handle to capture (overrides config).
    #[arg(short, long)]
    window: Option<u64>,

    /// Shared channel name to read (overrides config).
    #[arg(short, long)]
    stream: Option<String>,

    /// Run without a presentation window.
    #[arg(long)]
    headless: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&HostConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = HostConfig::load(&cli.config);
    if let Some(handle) = cli.window {
        config.stream.window_handle = handle;
    }
    if let Some(name) = cli.stream {
        config.stream.stream_name = name;
    }
    if cli.headless {
        config.surface.headless = true;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("wstream-host v{}", env!("CARGO_PKG_VERSION"));
    info!("update interval: {} ms", config.stream.update_interval_ms);
    info!("view: {}", config.view_dimensions());
    info!("source: {}", config.to_source_config().kind());

    let reason = if config.surface.headless {
        run(HeadlessPresenter::new(), &config).await
    } else {
        let presenter = GdiPresenter::open(&config.view.title, config.view_dimensions())?;
        run(presenter, &config).await
    };

    info!(?reason, "shutting down");
    Ok(())
}

async fn run<P: Presenter>(presenter: P, config: &HostConfig) -> ExitReason {
    let settings = config.to_stream_settings();
    let source = FrameSource::new(config.to_source_config());
    let mut event_loop = EventLoop::new(presenter, source, &settings, config.ack_latency());

    let commands = FramedRead::new(tokio::io::stdin(), LinesCodec::new_with_max_length(MAX_LINE));
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received");
    };

    event_loop
        .run(config.view_dimensions(), commands, shutdown)
        .await
}
