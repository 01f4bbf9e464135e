//! Read-only view of the session for a renderer.
//!
//! The session actor publishes a [`RenderSnapshot`] after every request.  A
//! renderer holds a `watch::Receiver` and repaints from the latest snapshot;
//! it never sees a half-applied command.

use projmap_core::{Color, Mode, Point, RectId, Rectangle, Session, Transformation};

use crate::application::OverlayService;

/// One rectangle as a renderer needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeView {
    pub id: RectId,
    pub rect: Rectangle,
    pub color: Color,
    /// The rectangle's corners in screen coordinates, when a transformation
    /// exists and every corner maps to a finite point.
    pub polygon: Option<[Point; 4]>,
}

/// An immutable copy of everything a renderer draws.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSnapshot {
    pub mode: Mode,
    /// Calibration markers in screen coordinates.
    pub markers: Vec<Point>,
    pub transformation: Option<Transformation>,
    pub shapes: Vec<ShapeView>,
}

impl RenderSnapshot {
    pub fn capture(session: &Session) -> Self {
        let transformation = session.transformation().copied();
        let shapes = session
            .rectangles()
            .shapes()
            .iter()
            .enumerate()
            .map(|(i, shape)| ShapeView {
                id: RectId(i),
                rect: *shape.rect(),
                color: shape.color().clone(),
                polygon: transformation
                    .as_ref()
                    .and_then(|t| screen_polygon(t, shape.rect())),
            })
            .collect();

        Self {
            mode: session.mode(),
            markers: session.markers().to_vec(),
            transformation,
            shapes,
        }
    }
}

impl Default for RenderSnapshot {
    fn default() -> Self {
        Self::capture(&Session::default())
    }
}

impl OverlayService {
    /// Captures the current state for a renderer.
    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot::capture(self.session())
    }
}

fn screen_polygon(t: &Transformation, rect: &Rectangle) -> Option<[Point; 4]> {
    let [a, b, c, d] = rect.corners();
    Some([
        t.to_screen(a).ok()?,
        t.to_screen(b).ok()?,
        t.to_screen(c).ok()?,
        t.to_screen(d).ok()?,
    ])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
