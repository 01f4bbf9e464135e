//! Rectangle store: the overlay's coloured rectangles.
//!
//! Rectangles are kept in insertion order.  A rectangle's id is its index in
//! that order, so ids are stable while the store grows and start again at 0
//! after [`RectangleStore::clear`].

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::{ArrayLengthError, Point};

/// Colour used when the controller does not name one.
pub const DEFAULT_COLOR: &str = "white";

/// Errors that can occur when editing the rectangle store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RectangleError {
    /// The id does not refer to a rectangle currently in the store.
    #[error("rectangle id {id} out of range (store holds {len})")]
    OutOfRange { id: usize, len: usize },
}

/// Identifier of a rectangle: its insertion index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RectId(pub usize);

/// An axis-aligned rectangle in logical coordinates.
///
/// Width and height may be negative; a negative size describes a flipped
/// rectangle and is stored as given.  On the wire a rectangle is
/// `[x, y, w, h]`; trailing entries are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 4]")]
pub struct Rectangle {
    pub pos_x: f64,
    pub pos_y: f64,
    pub size_x: f64,
    pub size_y: f64,
}

impl Rectangle {
    pub const fn new(pos_x: f64, pos_y: f64, size_x: f64, size_y: f64) -> Self {
        Self {
            pos_x,
            pos_y,
            size_x,
            size_y,
        }
    }

    /// The four corners in drawing order: origin, +x, +x+y, +y.
    pub fn corners(&self) -> [Point; 4] {
        let x1 = self.pos_x + self.size_x;
        let y1 = self.pos_y + self.size_y;
        [
            Point::new(self.pos_x, self.pos_y),
            Point::new(x1, self.pos_y),
            Point::new(x1, y1),
            Point::new(self.pos_x, y1),
        ]
    }

    /// The `[x, y, w, h]` wire layout.
    pub fn to_array(&self) -> [f64; 4] {
        [self.pos_x, self.pos_y, self.size_x, self.size_y]
    }
}

impl From<[f64; 4]> for Rectangle {
    fn from([x, y, w, h]: [f64; 4]) -> Self {
        Self::new(x, y, w, h)
    }
}

impl From<Rectangle> for [f64; 4] {
    fn from(rect: Rectangle) -> Self {
        rect.to_array()
    }
}

impl TryFrom<Vec<f64>> for Rectangle {
    type Error = ArrayLengthError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [x, y, w, h, ..] => Ok(Self::new(*x, *y, *w, *h)),
            _ => Err(ArrayLengthError {
                expected: 4,
                got: values.len(),
            }),
        }
    }
}

/// A fill colour: a symbolic name (`"red"`) or an RGB triple (`[255, 0, 0]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    Named(String),
    Rgb([u8; 3]),
}

impl Default for Color {
    fn default() -> Self {
        Color::Named(DEFAULT_COLOR.to_string())
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Named(name) => f.write_str(name),
            Color::Rgb([r, g, b]) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

/// A rectangle together with its fill colour.
///
/// Only the colour can change after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct RectangleShape {
    rect: Rectangle,
    color: Color,
}

impl RectangleShape {
    pub fn new(rect: Rectangle, color: Color) -> Self {
        Self { rect, color }
    }

    pub fn rect(&self) -> &Rectangle {
        &self.rect
    }

    pub fn color(&self) -> &Color {
        &self.color
    }
}

/// One row of [`RectangleStore::list`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectSummary {
    pub id: RectId,
    pub rect: Rectangle,
}

/// The ordered collection of overlay rectangles.
#[derive(Debug, Clone, Default)]
pub struct RectangleStore {
    shapes: Vec<RectangleShape>,
}

impl RectangleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rectangle and returns its id.
    pub fn add(&mut self, rect: Rectangle, color: Color) -> RectId {
        let id = RectId(self.shapes.len());
        self.shapes.push(RectangleShape::new(rect, color));
        id
    }

    /// Appends every rectangle in order, all in the same colour.
    ///
    /// Returns the range of ids that were assigned, so a caller can issue one
    /// repaint for the whole batch.
    pub fn add_batch<I>(&mut self, rects: I, color: Color) -> Range<usize>
    where
        I: IntoIterator<Item = Rectangle>,
    {
        let start = self.shapes.len();
        self.shapes.extend(
            rects
                .into_iter()
                .map(|rect| RectangleShape::new(rect, color.clone())),
        );
        start..self.shapes.len()
    }

    /// Removes every rectangle.  The next [`add`](Self::add) returns id 0.
    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    /// Changes the colour of an existing rectangle.
    ///
    /// # Errors
    ///
    /// Returns [`RectangleError::OutOfRange`] if `id` is not a current index;
    /// the store is left untouched.
    pub fn set_color(&mut self, id: RectId, color: Color) -> Result<(), RectangleError> {
        let len = self.shapes.len();
        let shape = self
            .shapes
            .get_mut(id.0)
            .ok_or(RectangleError::OutOfRange { id: id.0, len })?;
        shape.color = color;
        Ok(())
    }

    /// Returns a copy of every rectangle with its id, in insertion order.
    pub fn list(&self) -> Vec<RectSummary> {
        self.shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| RectSummary {
                id: RectId(i),
                rect: shape.rect,
            })
            .collect()
    }

    pub fn get(&self, id: RectId) -> Option<&RectangleShape> {
        self.shapes.get(id.0)
    }

    pub fn shapes(&self) -> &[RectangleShape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
