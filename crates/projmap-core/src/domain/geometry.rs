//! Plain geometric value types.
//!
//! A [`Point`] carries no notion of which coordinate space it lives in; the
//! surrounding API says whether it is logical or screen space.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A numeric array on the wire was shorter than the value it encodes.
///
/// Longer arrays are accepted and their extra entries ignored.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("expected at least {expected} numbers, got {got}")]
pub struct ArrayLengthError {
    pub expected: usize,
    pub got: usize,
}

/// A point in either logical or screen coordinates.
///
/// Serialized as a two-element array `[x, y]` so it matches the shape the
/// controller uses for sizes and rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Width and height of the design canvas, in logical units.
///
/// On the wire this is `[width, height]`; trailing entries are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct LogicalSize {
    pub width: f64,
    pub height: f64,
}

impl LogicalSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

impl TryFrom<Vec<f64>> for LogicalSize {
    type Error = ArrayLengthError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [width, height, ..] => Ok(Self::new(*width, *height)),
            _ => Err(ArrayLengthError {
                expected: 2,
                got: values.len(),
            }),
        }
    }
}

impl From<LogicalSize> for [f64; 2] {
    fn from(s: LogicalSize) -> Self {
        [s.width, s.height]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
