//! Wires the reader, the session actor and the writer together.
//!
//! ```text
//! stdin ─▶ read_lines ─▶ SessionActor ─▶ run_writer ─▶ stdout
//!                             │
//!                             └─▶ watch<RenderSnapshot>
//! ```
//!
//! Shutdown order: the reader stops (EOF, `Quit` or Ctrl+C), the actor drains
//! its inbox and exits, and the writer flushes what the actor produced and
//! exits when the outbound channel closes.

use std::sync::atomic::AtomicBool;

use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::application::OverlayService;
use crate::infrastructure::line_transport::{read_lines, run_writer, ReadEnd, TransportError};
use crate::infrastructure::render_bridge::RenderSnapshot;
use crate::infrastructure::session_actor::{SessionActor, SessionHandle};
use crate::infrastructure::storage::OverlayConfig;

/// Summary of a finished run.
#[derive(Debug)]
pub struct OverlayRun {
    pub end: ReadEnd,
    pub lines_written: usize,
    /// The service as the actor left it.
    pub service: OverlayService,
}

/// A started overlay: actor and writer are running, the reader is not.
pub struct OverlayRuntime {
    actor: SessionActor,
    writer: JoinHandle<Result<usize, TransportError>>,
}

impl OverlayRuntime {
    /// Spawns the session actor and the writer task for `writer`.
    ///
    /// `config` must have passed [`OverlayConfig::validate`].
    pub fn start<W>(writer: W, config: &OverlayConfig) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let service = OverlayService::new(config.calibration_policy(), config.pointer.rect_size);
        let capacity = config.protocol.inbound_capacity;
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let writer = tokio::spawn(run_writer(writer, outbound_rx));
        let actor = SessionActor::spawn(service, capacity, outbound_tx);
        Self { actor, writer }
    }

    /// A handle for host events (pointer clicks, marker clearing).
    pub fn handle(&self) -> SessionHandle {
        self.actor.handle().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RenderSnapshot> {
        self.actor.subscribe()
    }

    /// Reads `reader` until it ends, then shuts everything down in order.
    ///
    /// Host handles obtained from [`OverlayRuntime::handle`] must be dropped
    /// for the actor to exit.
    ///
    /// # Errors
    ///
    /// Returns the first transport failure.  The actor and writer are still
    /// shut down before a read error is returned.
    pub async fn serve<R>(self, reader: R, running: &AtomicBool) -> Result<OverlayRun, TransportError>
    where
        R: AsyncBufRead + Unpin,
    {
        let end = read_lines(reader, self.actor.handle(), running).await;

        let service = self.actor.shutdown().await?;
        let lines_written = self.writer.await??;
        let end = end?;

        info!(?end, lines_written, "overlay stopped");
        Ok(OverlayRun {
            end,
            lines_written,
            service,
        })
    }
}
