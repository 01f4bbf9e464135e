//! Calibration/draw state machine: the aggregate root.
//!
//! A [`Session`] owns the mode, the calibration markers, the logical canvas
//! size, the current [`Transformation`] and the [`RectangleStore`].  It is the
//! only place a transformation is created or replaced.
//!
//! # Calibration flow (for beginners)
//!
//! Calibration needs two things that can arrive in either order:
//!
//! 1. Four screen markers, clicked (or sent) at the projected corners of the
//!    physical surface, top-left first and clockwise.
//! 2. The logical size of that surface, e.g. `23.7 × 9.0` centimetres.
//!
//! Whichever arrives last triggers the computation.  On success the session
//! switches to [`Mode::Drawing`] and rectangles can be placed in logical
//! coordinates.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::geometry::{LogicalSize, Point};
use super::homography::{canonical_source_quad, compute_transformation, HomographyError, Transformation};
use super::rectangles::{Color, RectId, Rectangle, RectangleError, RectangleStore};

/// Number of markers needed to define a transformation.
pub const MARKER_COUNT: usize = 4;

/// Errors returned by [`Session`] operations.
///
/// None of these leave the session in a partially updated state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Homography(#[from] HomographyError),

    #[error(transparent)]
    Rectangle(#[from] RectangleError),

    /// A transformation was committed while already drawing.
    #[error("cannot commit a transformation in {0} mode; switch to calibrate first")]
    InvariantViolation(Mode),

    /// Drawing mode was requested but no transformation exists.
    #[error("no transformation available")]
    NoTransformation,

    /// The operation is only valid while calibrating.
    #[error("operation requires calibrate mode")]
    NotCalibrating,
}

/// The two operating modes.
///
/// On the wire they are spelled `"calibrate"` and `"draw"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "calibrate")]
    Calibrating,
    #[serde(rename = "draw")]
    Drawing,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Calibrating => f.write_str("calibrate"),
            Mode::Drawing => f.write_str("draw"),
        }
    }
}

/// How calibration behaves before a logical size is known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationPolicy {
    /// Calibrate against the unit square as soon as four markers exist,
    /// instead of waiting for a logical size.
    pub calibrate_without_size: bool,
}

/// Result of feeding one calibration input to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome {
    /// No transformation was committed by this call.
    Pending { markers: usize },
    /// A fifth marker was offered and dropped.
    Ignored,
    /// A transformation was computed and the session is now drawing.
    Calibrated,
}

/// Whether a mode request changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChange {
    Unchanged,
    Changed { from: Mode, to: Mode },
}

/// Result of a host pointer click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerOutcome {
    /// The click became a calibration marker.
    Marker(CalibrationOutcome),
    /// The click placed a rectangle at this logical position.
    Rectangle { id: RectId, logical: Point },
}

/// The overlay session.
#[derive(Debug, Clone)]
pub struct Session {
    policy: CalibrationPolicy,
    mode: Mode,
    logical_size: Option<LogicalSize>,
    markers: Vec<Point>,
    transformation: Option<Transformation>,
    rectangles: RectangleStore,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(CalibrationPolicy::default())
    }
}

impl Session {
    /// Creates a session in calibrate mode with no markers, size, transform
    /// or rectangles.
    pub fn new(policy: CalibrationPolicy) -> Self {
        Self {
            policy,
            mode: Mode::Calibrating,
            logical_size: None,
            markers: Vec::with_capacity(MARKER_COUNT),
            transformation: None,
            rectangles: RectangleStore::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn logical_size(&self) -> Option<LogicalSize> {
        self.logical_size
    }

    pub fn markers(&self) -> &[Point] {
        &self.markers
    }

    pub fn transformation(&self) -> Option<&Transformation> {
        self.transformation.as_ref()
    }

    pub fn rectangles(&self) -> &RectangleStore {
        &self.rectangles
    }

    pub fn rectangles_mut(&mut self) -> &mut RectangleStore {
        &mut self.rectangles
    }

    /// Stores the logical canvas size, in either mode.
    ///
    /// While calibrating with four markers already placed, this computes and
    /// commits the transformation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Homography`] if the markers are degenerate.
    /// The size stays stored and the markers are kept.
    pub fn set_logical_size(
        &mut self,
        width: f64,
        height: f64,
    ) -> Result<CalibrationOutcome, SessionError> {
        debug!(width, height, "logical size set");
        self.logical_size = Some(LogicalSize::new(width, height));
        self.calibrate_when_ready()
    }

    /// Records a screen-space calibration marker.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotCalibrating`] outside calibrate mode.
    /// - [`SessionError::Homography`] if this was the fourth marker and the
    ///   quadrilateral is degenerate.  All four markers are kept; see
    ///   [`Session::clear_markers`].
    pub fn add_marker(&mut self, p: Point) -> Result<CalibrationOutcome, SessionError> {
        if self.mode != Mode::Calibrating {
            return Err(SessionError::NotCalibrating);
        }
        if self.markers.len() >= MARKER_COUNT {
            debug!(x = p.x, y = p.y, "marker ignored: already have four");
            return Ok(CalibrationOutcome::Ignored);
        }
        self.markers.push(p);
        debug!(x = p.x, y = p.y, markers = self.markers.len(), "marker added");
        self.calibrate_when_ready()
    }

    /// Drops the collected markers without touching anything else.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotCalibrating`] outside calibrate mode.
    pub fn clear_markers(&mut self) -> Result<(), SessionError> {
        if self.mode != Mode::Calibrating {
            return Err(SessionError::NotCalibrating);
        }
        self.markers.clear();
        debug!("markers cleared");
        Ok(())
    }

    /// Commits `t` and switches to draw mode.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvariantViolation`] while drawing; call
    /// [`Session::force_calibrating`] first.
    pub fn set_transformation(&mut self, t: Transformation) -> Result<(), SessionError> {
        if self.mode != Mode::Calibrating {
            return Err(SessionError::InvariantViolation(self.mode));
        }
        self.transformation = Some(t);
        self.mode = Mode::Drawing;
        info!("transformation committed, mode -> draw");
        Ok(())
    }

    /// Switches to `target`.
    ///
    /// Requesting the current mode changes nothing.  Switching to calibrate
    /// discards the transformation and the markers.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoTransformation`] if draw mode is requested
    /// without a transformation.  The mode is left as it was.
    pub fn request_mode(&mut self, target: Mode) -> Result<ModeChange, SessionError> {
        let from = self.mode;
        if target == from {
            return Ok(ModeChange::Unchanged);
        }
        match target {
            Mode::Calibrating => self.force_calibrating(),
            Mode::Drawing => {
                if self.transformation.is_none() {
                    return Err(SessionError::NoTransformation);
                }
                self.mode = Mode::Drawing;
                info!("mode -> draw");
            }
        }
        Ok(ModeChange::Changed { from, to: target })
    }

    /// Resets to calibrate mode, clearing markers and transformation even if
    /// already calibrating.  Rectangles and the logical size are kept.
    pub fn force_calibrating(&mut self) {
        self.markers.clear();
        self.transformation = None;
        if self.mode != Mode::Calibrating {
            info!("mode -> calibrate");
        }
        self.mode = Mode::Calibrating;
    }

    /// Handles a pointer click at screen position `p`.
    ///
    /// While calibrating the click is a marker.  While drawing a
    /// `default_size × default_size` rectangle is placed at the logical
    /// position under the pointer.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`Session::add_marker`], and
    /// [`HomographyError::PointAtInfinity`] if the click cannot be mapped.
    pub fn pointer_click(
        &mut self,
        p: Point,
        default_size: f64,
    ) -> Result<PointerOutcome, SessionError> {
        match self.mode {
            Mode::Calibrating => self.add_marker(p).map(PointerOutcome::Marker),
            Mode::Drawing => {
                let t = self.transformation.ok_or(SessionError::NoTransformation)?;
                let logical = t.to_logical(p)?;
                let rect = Rectangle::new(logical.x, logical.y, default_size, default_size);
                let id = self.rectangles.add(rect, Color::default());
                debug!(id = id.0, x = logical.x, y = logical.y, "rectangle placed by pointer");
                Ok(PointerOutcome::Rectangle { id, logical })
            }
        }
    }

    fn calibrate_when_ready(&mut self) -> Result<CalibrationOutcome, SessionError> {
        let pending = CalibrationOutcome::Pending {
            markers: self.markers.len(),
        };
        if self.mode != Mode::Calibrating || self.markers.len() < MARKER_COUNT {
            return Ok(pending);
        }
        if self.logical_size.is_none() && !self.policy.calibrate_without_size {
            return Ok(pending);
        }

        let dst = [self.markers[0], self.markers[1], self.markers[2], self.markers[3]];
        let src = canonical_source_quad(self.logical_size);
        let t = compute_transformation(&dst, &src)?;
        self.set_transformation(t)?;
        Ok(CalibrationOutcome::Calibrated)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
