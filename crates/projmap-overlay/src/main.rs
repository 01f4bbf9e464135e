//! ProjMap overlay: entry point.
//!
//! Speaks the ProjMap line protocol on stdin/stdout.  A controller process
//! starts this binary with piped stdio, sends commands (one JSON object per
//! line) and reads replies.  Logs go to stderr so they never mix with
//! protocol lines.
//!
//! # Usage
//!
//! ```text
//! projmap-overlay [OPTIONS]
//!
//! Options:
//!   --config <PATH>             Config file [env: PROJMAP_CONFIG]
//!   --log-level <FILTER>        Log filter when RUST_LOG is unset [env: PROJMAP_LOG]
//!   --calibrate-without-size    Calibrate against the unit square without SetInitSize
//! ```
//!
//! # Architecture overview
//!
//! ```text
//! controller  (JSON lines over stdin/stdout)
//!       ↕
//! projmap-overlay  ← this process
//!   application/     Command dispatch onto the Session
//!   infrastructure/
//!     line_transport/  stdin reader, stdout writer
//!     session_actor/   single owner of the Session
//!     render_bridge/   snapshots for a renderer
//! ```

use std::path::PathBuf;
use std::sync::{atomic::Ordering, Arc};

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use projmap_overlay::infrastructure::line_transport::running_flag;
use projmap_overlay::infrastructure::storage::{load_config, OverlayConfig};
use projmap_overlay::infrastructure::OverlayRuntime;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// ProjMap overlay process.
///
/// Reads protocol commands on stdin and writes replies on stdout.
#[derive(Debug, Parser)]
#[command(
    name = "projmap-overlay",
    about = "Projector overlay driven by a JSON line protocol on stdin/stdout",
    version
)]
struct Cli {
    /// Path to overlay.toml.  Defaults to the platform config directory.
    #[arg(long, env = "PROJMAP_CONFIG")]
    config: Option<PathBuf>,

    /// `tracing` filter used when `RUST_LOG` is unset; overrides the config
    /// file's `logging.level`.
    #[arg(long, env = "PROJMAP_LOG")]
    log_level: Option<String>,

    /// Calibrate as soon as four markers exist, even before SetInitSize.
    #[arg(long)]
    calibrate_without_size: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded config.
    fn apply_overrides(&self, mut config: OverlayConfig) -> OverlayConfig {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.calibrate_without_size {
            config.calibration.calibrate_without_size = true;
        }
        config
    }

    /// Loads the config file and applies overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting values are invalid.
    fn into_overlay_config(self) -> anyhow::Result<OverlayConfig> {
        let loaded = load_config(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("failed to load config from {}", path.display()),
            None => "failed to load config from the platform config directory".to_string(),
        })?;
        let config = self.apply_overrides(loaded);
        config.validate().context("invalid overlay configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_overlay_config()?;

    // stdout carries protocol lines; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        calibrate_without_size = config.calibration.calibrate_without_size,
        rect_size = config.pointer.rect_size,
        "ProjMap overlay starting"
    );

    let running = running_flag();
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let runtime = OverlayRuntime::start(tokio::io::stdout(), &config);

    // Stand-in for a renderer: log each mode change.
    let mut snapshots = runtime.subscribe();
    tokio::spawn(async move {
        let mut last_mode = snapshots.borrow().mode;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if snapshot.mode != last_mode {
                info!(
                    mode = %snapshot.mode,
                    rectangles = snapshot.shapes.len(),
                    "overlay mode changed"
                );
                last_mode = snapshot.mode;
            }
        }
    });

    let run = runtime
        .serve(BufReader::new(tokio::io::stdin()), &running)
        .await
        .context("overlay transport failed")?;

    info!(
        end = ?run.end,
        rectangles = run.service.rectangles().len(),
        "ProjMap overlay stopped"
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
