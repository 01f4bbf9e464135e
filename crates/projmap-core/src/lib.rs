//! # projmap-core
//!
//! Shared library for ProjMap containing the homography engine, the
//! calibration state machine, the rectangle store and the line protocol.
//!
//! This crate is used by both the overlay process and the controller.
//! It has zero dependencies on OS APIs, async runtimes, windowing toolkits or
//! byte streams.
//!
//! # Architecture overview (for beginners)
//!
//! ProjMap draws coloured rectangles onto a physical surface through a
//! projector.  The controller thinks in *logical* coordinates (for example
//! "key 3 sits at 4.8 cm, 0 cm on the keyboard"); the projector thinks in
//! *screen* pixels.  A perspective transform (a homography) bridges the two.
//!
//! - **`domain`** – Pure business logic.  The `homography` module builds the
//!   transform from four point pairs, `rectangles` owns the overlay shapes,
//!   and `session` is the calibration/draw state machine that ties them
//!   together.
//!
//! - **`protocol`** – How commands travel.  Every message is one line of JSON
//!   carrying an `"op"` tag; the codec turns a line into a typed [`Command`]
//!   and replies back into a line.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `projmap_core::Session` instead of `projmap_core::domain::session::Session`.
pub use domain::geometry::{ArrayLengthError, LogicalSize, Point};
pub use domain::homography::{
    apply, canonical_source_quad, compute_transformation, correspondence_matrix,
    HomographyError, Transformation,
};
pub use domain::rectangles::{
    Color, RectId, RectSummary, Rectangle, RectangleError, RectangleShape, RectangleStore,
};
pub use domain::session::{
    CalibrationOutcome, CalibrationPolicy, Mode, ModeChange, PointerOutcome, Session,
    SessionError,
};
pub use protocol::codec::{decode_line, encode_line, ProtocolError};
pub use protocol::messages::{Command, ErrorBody, ErrorReply, MatrixRows, Outbound, Reply};
