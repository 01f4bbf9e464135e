//! Typed client for the overlay's line protocol.
//!
//! [`OverlayClient`] writes one JSON command per line to the overlay's input
//! and, for the two queries, reads back one reply line.  Mutating commands
//! are fire-and-forget: the overlay never answers them.
//!
//! # Example
//!
//! ```no_run
//! use projmap_controller::client::OverlayClient;
//! use projmap_core::{LogicalSize, Rectangle};
//!
//! # async fn example() -> Result<(), projmap_controller::client::ClientError> {
//! let mut child = tokio::process::Command::new("projmap-overlay")
//!     .stdin(std::process::Stdio::piped())
//!     .stdout(std::process::Stdio::piped())
//!     .spawn()?;
//! let stdin = child.stdin.take().unwrap();
//! let stdout = tokio::io::BufReader::new(child.stdout.take().unwrap());
//!
//! let mut client = OverlayClient::new(stdin, stdout);
//! client.set_init_size(LogicalSize::new(10.0, 5.0)).await?;
//! client.add_rect(Rectangle::new(0.0, 0.0, 1.0, 1.0), None).await?;
//! let rects = client.get_rects().await?;
//! # Ok(())
//! # }
//! ```

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use projmap_core::{
    encode_line, Color, Command, LogicalSize, Mode, Outbound, ProtocolError, RectId, Rectangle,
    Reply, Transformation,
};

use crate::layout::OverlayLayout;

/// Errors returned by [`OverlayClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to encode command: {0}")]
    Encode(#[from] ProtocolError),

    #[error("overlay I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The overlay closed its output before answering.
    #[error("overlay closed the stream before answering {op}")]
    Closed { op: &'static str },

    /// The reply line was not valid JSON of any known reply shape.
    #[error("unreadable reply to {op}: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The overlay answered with an error reply.
    #[error("overlay rejected {op}: {message}")]
    Remote { op: String, message: String },

    /// A well-formed reply of the wrong kind, e.g. rectangles for a
    /// transformation query.
    #[error("unexpected reply to {op}")]
    UnexpectedReply { op: &'static str },
}

/// Client side of one overlay connection.
#[derive(Debug)]
pub struct OverlayClient<W, R> {
    writer: W,
    reader: R,
    line: String,
}

impl<W, R> OverlayClient<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    /// Wraps the overlay's input (`writer`) and output (`reader`).
    pub fn new(writer: W, reader: R) -> Self {
        Self {
            writer,
            reader,
            line: String::new(),
        }
    }

    /// Sends one command as a single line.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Encode`] or [`ClientError::Io`].
    pub async fn send(&mut self, command: &Command) -> Result<(), ClientError> {
        let mut line = encode_line(command)?;
        debug!(op = command.op(), "sending command");
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn set_init_size(&mut self, size: LogicalSize) -> Result<(), ClientError> {
        self.send(&Command::SetInitSize { size }).await
    }

    /// Replaces the overlay's transformation; the overlay switches to draw
    /// mode.
    pub async fn set_transformation(&mut self, t: &Transformation) -> Result<(), ClientError> {
        self.send(&Command::set_transformation(t)).await
    }

    pub async fn clear_rects(&mut self) -> Result<(), ClientError> {
        self.send(&Command::ClearRects).await
    }

    pub async fn add_rect(
        &mut self,
        rectangle: Rectangle,
        color: Option<Color>,
    ) -> Result<(), ClientError> {
        self.send(&Command::AddRect { rectangle, color }).await
    }

    pub async fn add_rects(
        &mut self,
        rectangles: Vec<Rectangle>,
        color: Option<Color>,
    ) -> Result<(), ClientError> {
        self.send(&Command::AddRects { rectangles, color }).await
    }

    /// Clears the overlay and adds `rectangles`, so their ids start at 0.
    pub async fn set_rects(&mut self, rectangles: Vec<Rectangle>) -> Result<(), ClientError> {
        self.clear_rects().await?;
        self.add_rects(rectangles, None).await
    }

    pub async fn set_mode(&mut self, mode: Mode) -> Result<(), ClientError> {
        self.send(&Command::SetMode { mode }).await
    }

    pub async fn set_rect_color(&mut self, id: RectId, color: Color) -> Result<(), ClientError> {
        self.send(&Command::SetRectColor { id, color }).await
    }

    /// Sends every command of `layout` in order and returns how many were
    /// sent.
    pub async fn push_layout(&mut self, layout: &OverlayLayout) -> Result<usize, ClientError> {
        let commands = layout.commands();
        for command in &commands {
            self.send(command).await?;
        }
        Ok(commands.len())
    }

    /// Asks the overlay to stop reading.
    pub async fn quit(&mut self) -> Result<(), ClientError> {
        self.send(&Command::Quit).await
    }

    /// Queries the overlay's rectangles in id order.
    ///
    /// # Errors
    ///
    /// Besides transport errors, returns [`ClientError::Remote`] if the
    /// overlay answered with an error reply.
    pub async fn get_rects(&mut self) -> Result<Vec<Rectangle>, ClientError> {
        match self.query(&Command::GetRects).await? {
            Reply::Rects(rects) => Ok(rects),
            Reply::Transformation { .. } => Err(ClientError::UnexpectedReply { op: "GetRects" }),
        }
    }

    /// Queries the overlay's current transformation.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] when the overlay has not been
    /// calibrated yet.
    pub async fn get_transformation(&mut self) -> Result<Transformation, ClientError> {
        self.query(&Command::GetTransformation)
            .await?
            .transformation()
            .ok_or(ClientError::UnexpectedReply {
                op: "GetTransformation",
            })
    }

    async fn query(&mut self, command: &Command) -> Result<Reply, ClientError> {
        let op = command.op();
        self.send(command).await?;

        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Err(ClientError::Closed { op });
            }
            if !self.line.trim().is_empty() {
                break;
            }
        }

        let outbound: Outbound = serde_json::from_str(self.line.trim())
            .map_err(|source| ClientError::Decode { op, source })?;
        match outbound {
            Outbound::Reply(reply) => Ok(reply),
            Outbound::Error(e) => Err(ClientError::Remote {
                op: e.error.op,
                message: e.error.message,
            }),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
