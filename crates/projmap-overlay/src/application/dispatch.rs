//! Applies decoded protocol commands to a [`Session`].
//!
//! Every handler runs to completion synchronously.  A failing command leaves
//! the session exactly as it was before that command, apart from
//! `SetInitSize`, whose size is kept even when the calibration it triggers
//! fails.

use projmap_core::domain::homography::from_rows;
use projmap_core::{
    CalibrationOutcome, Command, ModeChange, RectangleError, Reply, Session, SessionError,
    Transformation,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// `forward · reverse` may differ from a multiple of the identity by this much
/// before an externally supplied transformation is logged as inconsistent.
const CONSISTENCY_TOLERANCE: f64 = 1e-6;

/// Errors from applying one command.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Rectangle(#[from] RectangleError),
}

/// What the caller must do after a command was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// Nothing to send.
    Done,
    /// Send this reply.
    Reply(Reply),
    /// The controller asked the overlay to terminate.
    Quit,
}

/// Applies `command` to `session`.
///
/// # Errors
///
/// Returns [`CommandError`] when the session rejects the command.  Queries
/// fail with [`SessionError::NoTransformation`] when there is nothing to
/// report.
pub fn dispatch(session: &mut Session, command: Command) -> Result<Dispatched, CommandError> {
    match command {
        Command::SetInitSize { size } => {
            let outcome = session.set_logical_size(size.width, size.height)?;
            if outcome == CalibrationOutcome::Calibrated {
                info!(width = size.width, height = size.height, "calibrated on size");
            }
            Ok(Dispatched::Done)
        }

        Command::Quit => Ok(Dispatched::Quit),

        Command::GetTransformation => session
            .transformation()
            .map(|t| Dispatched::Reply(Reply::from_transformation(t)))
            .ok_or(CommandError::Session(SessionError::NoTransformation)),

        Command::SetTransformation {
            matrix,
            reverse_matrix,
        } => {
            let t = Transformation::from_matrices(from_rows(&matrix), from_rows(&reverse_matrix));
            if !t.is_consistent(CONSISTENCY_TOLERANCE) {
                warn!("reverseMatrix is not the inverse of matrix; using the pair as given");
            }
            session.force_calibrating();
            session.set_transformation(t)?;
            Ok(Dispatched::Done)
        }

        Command::GetRects => Ok(Dispatched::Reply(Reply::from_rectangles(
            session.rectangles(),
        ))),

        Command::AddRect { rectangle, color } => {
            let id = session
                .rectangles_mut()
                .add(rectangle, color.unwrap_or_default());
            debug!(id = id.0, "rectangle added");
            Ok(Dispatched::Done)
        }

        Command::AddRects { rectangles, color } => {
            let ids = session
                .rectangles_mut()
                .add_batch(rectangles, color.unwrap_or_default());
            debug!(first = ids.start, end = ids.end, "rectangles added");
            Ok(Dispatched::Done)
        }

        Command::ClearRects => {
            session.rectangles_mut().clear();
            debug!("rectangles cleared");
            Ok(Dispatched::Done)
        }

        Command::SetMode { mode } => {
            if session.request_mode(mode)? == ModeChange::Unchanged {
                debug!(%mode, "mode unchanged");
            }
            Ok(Dispatched::Done)
        }

        Command::SetRectColor { id, color } => {
            session.rectangles_mut().set_color(id, color)?;
            Ok(Dispatched::Done)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
