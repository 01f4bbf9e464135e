//! The overlay service: one inbound line in, zero or more outbound lines out.
//!
//! [`OverlayService`] owns the [`Session`] and is the host-facing surface of
//! the protocol.  It decodes each line, dispatches it, encodes any reply and
//! hands anything it could not handle to a [`DiagnosticObserver`].  It never
//! performs I/O, so a single actor task can drive it.
//!
//! # Error policy
//!
//! | failure                         | observer | reply line            |
//! |---------------------------------|----------|-----------------------|
//! | line is not a valid message     | `Parse`  | none                  |
//! | op is not recognised            | `UnknownOp` | none               |
//! | query cannot be answered        | `Command` | `{"error": {...}}`   |
//! | mutating command rejected       | `Command` | none                 |
//!
//! No failure stops the loop; only `Quit` does.

use projmap_core::{
    decode_line, encode_line, CalibrationPolicy, ErrorReply, Mode, Point, PointerOutcome,
    RectSummary, Session, Transformation,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::application::dispatch::{dispatch, Dispatched};

/// Default logical size of a rectangle placed by a pointer click.
pub const DEFAULT_POINTER_RECT_SIZE: f64 = 1.2;

/// What kind of input could not be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The line was not a decodable message.
    Parse,
    /// The message named an op the overlay does not know.
    UnknownOp,
    /// The message decoded but the session rejected it.
    Command,
}

/// A report about input that was skipped or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// The offending input, for logs.
    pub line: String,
}

/// Receives diagnostics about unhandled input.
///
/// The production implementation is [`TracingObserver`]; tests substitute a
/// generated mock.
#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticObserver: Send {
    fn on_unhandled(&self, diagnostic: &Diagnostic);
}

/// Logs every diagnostic at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DiagnosticObserver for TracingObserver {
    fn on_unhandled(&self, diagnostic: &Diagnostic) {
        warn!(
            kind = ?diagnostic.kind,
            line = %diagnostic.line,
            "{}",
            diagnostic.message
        );
    }
}

/// Whether the host should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The result of [`OverlayService::submit_line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    /// Complete lines to send, without terminators.
    pub outbound: Vec<String>,
    pub flow: Flow,
}

impl LineOutcome {
    fn silent() -> Self {
        Self {
            outbound: Vec::new(),
            flow: Flow::Continue,
        }
    }

    fn send(outbound: Vec<String>) -> Self {
        Self {
            outbound,
            flow: Flow::Continue,
        }
    }
}

/// Owns the session and turns protocol lines into session operations.
pub struct OverlayService {
    session: Session,
    observer: Box<dyn DiagnosticObserver>,
    pointer_rect_size: f64,
}

impl OverlayService {
    /// Creates a service that logs diagnostics through `tracing`.
    pub fn new(policy: CalibrationPolicy, pointer_rect_size: f64) -> Self {
        Self::with_observer(policy, pointer_rect_size, Box::new(TracingObserver))
    }

    pub fn with_observer(
        policy: CalibrationPolicy,
        pointer_rect_size: f64,
        observer: Box<dyn DiagnosticObserver>,
    ) -> Self {
        Self {
            session: Session::new(policy),
            observer,
            pointer_rect_size,
        }
    }

    /// Handles one inbound line.
    ///
    /// Blank lines are ignored.  Undecodable lines and unknown ops go to the
    /// observer and produce no output.
    pub fn submit_line(&mut self, line: &str) -> LineOutcome {
        let command = match decode_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return LineOutcome::silent(),
            Err(e) => {
                let kind = if e.is_unknown_op() {
                    DiagnosticKind::UnknownOp
                } else {
                    DiagnosticKind::Parse
                };
                self.report(kind, e.to_string(), line);
                return LineOutcome::silent();
            }
        };

        let op = command.op();
        let is_query = command.is_query();
        debug!(op, "command received");

        match dispatch(&mut self.session, command) {
            Ok(Dispatched::Done) => LineOutcome::silent(),
            Ok(Dispatched::Quit) => LineOutcome {
                outbound: Vec::new(),
                flow: Flow::Quit,
            },
            Ok(Dispatched::Reply(reply)) => LineOutcome::send(encode_reply(op, &reply)),
            Err(e) => {
                let message = e.to_string();
                self.report(DiagnosticKind::Command, format!("{op}: {message}"), line);
                if is_query {
                    LineOutcome::send(encode_reply(op, &ErrorReply::new(op, message)))
                } else {
                    LineOutcome::silent()
                }
            }
        }
    }

    /// Reports an inbound line that could not be read as text.  The session
    /// is untouched and the loop continues.
    pub fn reject_unreadable(&self, line: &str, reason: &str) {
        self.report(
            DiagnosticKind::Parse,
            format!("line is not valid UTF-8: {reason}"),
            line,
        );
    }

    /// Handles a pointer click at screen position `p`.
    ///
    /// Returns `None` if the session rejected the click; the reason goes to
    /// the observer.
    pub fn pointer_click(&mut self, p: Point) -> Option<PointerOutcome> {
        match self.session.pointer_click(p, self.pointer_rect_size) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.report(
                    DiagnosticKind::Command,
                    format!("pointer click: {e}"),
                    &format!("click at ({}, {})", p.x, p.y),
                );
                None
            }
        }
    }

    /// Drops the collected calibration markers.
    ///
    /// Returns `false` outside calibrate mode.
    pub fn clear_markers(&mut self) -> bool {
        match self.session.clear_markers() {
            Ok(()) => true,
            Err(e) => {
                self.report(DiagnosticKind::Command, e.to_string(), "clear markers");
                false
            }
        }
    }

    pub fn mode(&self) -> Mode {
        self.session.mode()
    }

    pub fn transformation(&self) -> Option<Transformation> {
        self.session.transformation().copied()
    }

    /// A copy of the current rectangles in id order.
    pub fn rectangles(&self) -> Vec<RectSummary> {
        self.session.rectangles().list()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn report(&self, kind: DiagnosticKind, message: String, line: &str) {
        self.observer.on_unhandled(&Diagnostic {
            kind,
            message,
            line: line.trim_end().to_string(),
        });
    }
}

impl Default for OverlayService {
    fn default() -> Self {
        Self::new(CalibrationPolicy::default(), DEFAULT_POINTER_RECT_SIZE)
    }
}

impl std::fmt::Debug for OverlayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayService")
            .field("session", &self.session)
            .field("pointer_rect_size", &self.pointer_rect_size)
            .finish_non_exhaustive()
    }
}

fn encode_reply<T: Serialize>(op: &str, value: &T) -> Vec<String> {
    match encode_line(value) {
        Ok(line) => vec![line],
        Err(e) => {
            error!(op, "dropping reply: {e}");
            Vec::new()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
