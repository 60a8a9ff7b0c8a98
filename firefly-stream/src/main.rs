//! Firefly stream: entry point.
//!
//! ```text
//! firefly-stream                  Run with firefly-stream.toml (or defaults)
//! firefly-stream --config <path>  Load a custom config TOML
//! firefly-stream --scene <path>   Play a JSON scene instead of the configured one
//! firefly-stream --gen-config     Write the example config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use firefly_stream::config::StreamConfig;
use firefly_stream::service::StreamService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "firefly-stream", about = "Play a Firefly scene onto LED strips")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "firefly-stream.toml")]
    config: PathBuf,

    /// JSON scene to play; overrides `playback.scene`.
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Print the example configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump the example and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&StreamConfig::example())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = StreamConfig::load(&cli.config);
    if let Some(scene) = cli.scene {
        config.playback.scene = Some(scene);
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("firefly-stream v{}", env!("CARGO_PKG_VERSION"));
    info!("target FPS: {}", config.playback.fps);
    info!(
        "playback: {}s .. {}s, looping: {}",
        config.playback.start, config.playback.end, config.playback.looping
    );
    if config.streamers.is_empty() {
        info!("no streamers configured; frames are only scanned");
    }

    let service = StreamService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    service.run().await?;

    Ok(())
}
