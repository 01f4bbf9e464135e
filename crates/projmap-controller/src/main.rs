//! ProjMap controller: entry point.
//!
//! Spawns the overlay process with piped stdio, pushes a layout file to it and
//! keeps it running until this process's stdin reaches end-of-file (or Ctrl+C
//! arrives).  Then it sends `Quit` and waits for the overlay to exit.
//!
//! # Usage
//!
//! ```text
//! projmap-controller --layout <PATH> [OPTIONS]
//!
//! Options:
//!   --layout <PATH>            Layout TOML file [env: PROJMAP_LAYOUT]
//!   --overlay-bin <PATH>       Overlay executable [env: PROJMAP_OVERLAY_BIN] [default: projmap-overlay]
//!   --log-level <FILTER>       Log filter when RUST_LOG is unset [env: PROJMAP_LOG] [default: info]
//!   --verify                   Query the rectangles back after pushing
//!   --quit-timeout-ms <MS>     How long to wait for the overlay after Quit [default: 2000]
//! ```

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use projmap_controller::{load_layout, OverlayClient};

/// ProjMap controller.
#[derive(Debug, Parser)]
#[command(
    name = "projmap-controller",
    about = "Launches the ProjMap overlay and pushes a layout to it",
    version
)]
struct Cli {
    /// Layout file describing size, keys and an optional transformation.
    #[arg(long, env = "PROJMAP_LAYOUT")]
    layout: PathBuf,

    /// Overlay executable to spawn.
    #[arg(long, env = "PROJMAP_OVERLAY_BIN", default_value = "projmap-overlay")]
    overlay_bin: PathBuf,

    /// `tracing` filter used when `RUST_LOG` is unset.
    #[arg(long, env = "PROJMAP_LOG", default_value = "info")]
    log_level: String,

    /// Read the rectangles back with `GetRects` after pushing the layout.
    #[arg(long)]
    verify: bool,

    /// Milliseconds to wait for the overlay to exit after `Quit` before
    /// killing it.
    #[arg(long, default_value_t = 2000)]
    quit_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let layout = load_layout(&cli.layout)
        .with_context(|| format!("failed to load layout from {}", cli.layout.display()))?;

    let mut child = tokio::process::Command::new(&cli.overlay_bin)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn overlay {}", cli.overlay_bin.display()))?;
    info!(overlay = %cli.overlay_bin.display(), pid = ?child.id(), "overlay started");

    let stdin = child.stdin.take().context("overlay stdin is not piped")?;
    let stdout = child.stdout.take().context("overlay stdout is not piped")?;
    let mut client = OverlayClient::new(stdin, BufReader::new(stdout));

    let sent = client
        .push_layout(&layout)
        .await
        .context("failed to push layout to overlay")?;
    info!(commands = sent, keys = layout.keys.len(), "layout pushed");

    if cli.verify {
        let rects = client
            .get_rects()
            .await
            .context("failed to read rectangles back")?;
        if rects == layout.keys {
            info!(rectangles = rects.len(), "overlay confirmed layout");
        } else {
            warn!(
                expected = layout.keys.len(),
                got = rects.len(),
                "overlay rectangles differ from layout"
            );
        }
    }

    tokio::select! {
        result = wait_for_end_of_input() => {
            result.context("failed to read controller stdin")?;
            info!("stdin closed; stopping overlay");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C signal")?;
            info!("received Ctrl+C; stopping overlay");
        }
    }

    if let Err(e) = client.quit().await {
        warn!("could not send Quit to overlay: {e}");
    }
    drop(client);

    let grace = Duration::from_millis(cli.quit_timeout_ms);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            let status = status.context("failed to wait for overlay")?;
            info!(%status, "overlay exited");
        }
        Err(_) => {
            warn!(timeout_ms = cli.quit_timeout_ms, "overlay did not exit; killing it");
            child.kill().await.context("failed to kill overlay")?;
        }
    }
    Ok(())
}

/// Reads this process's stdin until end-of-file.
async fn wait_for_end_of_input() -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        debug!(%line, "ignoring controller input");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_layout() {
        let result = Cli::try_parse_from(["projmap-controller"]);

        assert!(result.is_err() || std::env::var_os("PROJMAP_LAYOUT").is_some());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["projmap-controller", "--layout", "keys.toml"]);

        assert_eq!(cli.layout, PathBuf::from("keys.toml"));
        assert_eq!(cli.quit_timeout_ms, 2000);
        assert!(!cli.verify);
    }

    #[test]
    fn test_cli_custom_overlay_and_verify() {
        let cli = Cli::parse_from([
            "projmap-controller",
            "--layout",
            "keys.toml",
            "--overlay-bin",
            "/opt/projmap/projmap-overlay",
            "--verify",
            "--quit-timeout-ms",
            "500",
        ]);

        assert_eq!(cli.overlay_bin, PathBuf::from("/opt/projmap/projmap-overlay"));
        assert!(cli.verify);
        assert_eq!(cli.quit_timeout_ms, 500);
    }
}
