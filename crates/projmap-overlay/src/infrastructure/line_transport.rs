//! Newline-delimited transport: the inbound reader and the single writer.
//!
//! Production wires stdin and stdout in here; tests use scripted streams.
//!
//! # Single writer
//!
//! Outbound lines travel over a bounded channel to [`run_writer`], the only
//! code that touches the output stream.  Each line goes out with one
//! `write_all` of `line + "\n"` followed by a flush, so two lines can never
//! interleave.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::application::Flow;
use crate::infrastructure::session_actor::{ActorStopped, SessionHandle};

/// How long the reader waits for a line before re-checking the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Errors from the transport tasks.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to read inbound line: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write outbound line: {0}")]
    Write(#[source] std::io::Error),

    #[error(transparent)]
    Actor(#[from] ActorStopped),

    #[error("transport task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Why the reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The inbound stream reached end-of-file.
    EndOfStream,
    /// The controller sent `Quit`.
    Quit,
    /// The shutdown flag was cleared (Ctrl+C).
    Shutdown,
}

/// Reads lines from `reader` and submits each to the session actor.
///
/// Returns when the stream ends, the controller quits, or `running` is
/// cleared.  Lines are submitted one at a time; the next line is not read
/// until the actor has handled the previous one.  A line that is not valid
/// UTF-8 is reported to the actor as unreadable and reading continues.
///
/// # Errors
///
/// Returns [`TransportError::Read`] on an I/O error and
/// [`TransportError::Actor`] if the actor has stopped.
pub async fn read_lines<R>(
    mut reader: R,
    handle: &SessionHandle,
    running: &AtomicBool,
) -> Result<ReadEnd, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    // Partial input survives a timed-out read; it is only cleared once a
    // whole line has been handed on.
    let mut buf = Vec::new();
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping reader");
            return Ok(ReadEnd::Shutdown);
        }

        let read = match timeout(SHUTDOWN_POLL, reader.read_until(b'\n', &mut buf)).await {
            Err(_) => continue,
            Ok(result) => result.map_err(TransportError::Read)?,
        };
        if read == 0 && buf.is_empty() {
            info!("inbound stream closed");
            return Ok(ReadEnd::EndOfStream);
        }

        let bytes = std::mem::take(&mut buf);
        let flow = match String::from_utf8(bytes) {
            Ok(mut line) => {
                strip_line_ending(&mut line);
                handle.submit_line(line).await?
            }
            Err(e) => {
                let lossy = String::from_utf8_lossy(e.as_bytes()).trim_end().to_string();
                handle
                    .report_unreadable(lossy, e.utf8_error().to_string())
                    .await?;
                Flow::Continue
            }
        };

        if flow == Flow::Quit {
            info!("controller sent Quit");
            return Ok(ReadEnd::Quit);
        }
    }
}

fn strip_line_ending(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

/// Writes every line received on `outbound` to `writer`, one at a time.
///
/// Returns the number of lines written once every sender has been dropped.
///
/// # Errors
///
/// Returns [`TransportError::Write`] if the stream fails; remaining lines are
/// dropped.
pub async fn run_writer<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<String>,
) -> Result<usize, TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(mut line) = outbound.recv().await {
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(TransportError::Write)?;
        writer.flush().await.map_err(TransportError::Write)?;
        written += 1;
    }
    debug!(written, "outbound channel closed");
    Ok(written)
}

/// Shared shutdown flag, set to `false` on Ctrl+C.
pub fn running_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
