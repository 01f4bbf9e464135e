//! Message types for the ProjMap line protocol.
//!
//! Every inbound message is a JSON object whose `"op"` field names the
//! operation.  The remaining fields depend on the op:
//!
//! | op                  | fields                          | reply           |
//! |---------------------|---------------------------------|-----------------|
//! | `SetInitSize`       | `size: [w, h]`                  | –               |
//! | `Quit`              | –                               | –               |
//! | `GetTransformation` | –                               | [`Reply::Transformation`] |
//! | `SetTransformation` | `matrix`, `reverseMatrix`       | –               |
//! | `GetRects`          | –                               | [`Reply::Rects`] |
//! | `AddRect`           | `rectangle: [x, y, w, h]`       | –               |
//! | `AddRects`          | `rectangles: [[x, y, w, h], …]` | –               |
//! | `ClearRects`        | –                               | –               |
//! | `SetMode`           | `mode: "calibrate" \| "draw"`   | –               |
//! | `SetRectColor`      | `id`, `color`                   | –               |
//!
//! Matrices are row-major nested arrays `[[a, b, c], [d, e, f], [g, h, i]]`.

use serde::{Deserialize, Serialize};

use crate::domain::geometry::LogicalSize;
use crate::domain::homography::{from_rows, to_rows, Transformation};
use crate::domain::rectangles::{Color, RectId, Rectangle, RectangleStore};
use crate::domain::session::Mode;

/// A 3×3 matrix in row-major wire layout.
pub type MatrixRows = [[f64; 3]; 3];

/// A decoded inbound command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Command {
    SetInitSize {
        size: LogicalSize,
    },
    Quit,
    GetTransformation,
    SetTransformation {
        matrix: MatrixRows,
        #[serde(rename = "reverseMatrix")]
        reverse_matrix: MatrixRows,
    },
    GetRects,
    AddRect {
        rectangle: Rectangle,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Color>,
    },
    AddRects {
        rectangles: Vec<Rectangle>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Color>,
    },
    ClearRects,
    SetMode {
        mode: Mode,
    },
    SetRectColor {
        id: RectId,
        color: Color,
    },
}

impl Command {
    /// Every op name the protocol understands.
    pub const OPS: [&'static str; 10] = [
        "SetInitSize",
        "Quit",
        "GetTransformation",
        "SetTransformation",
        "GetRects",
        "AddRect",
        "AddRects",
        "ClearRects",
        "SetMode",
        "SetRectColor",
    ];

    /// The `"op"` tag of this command.
    pub fn op(&self) -> &'static str {
        match self {
            Command::SetInitSize { .. } => "SetInitSize",
            Command::Quit => "Quit",
            Command::GetTransformation => "GetTransformation",
            Command::SetTransformation { .. } => "SetTransformation",
            Command::GetRects => "GetRects",
            Command::AddRect { .. } => "AddRect",
            Command::AddRects { .. } => "AddRects",
            Command::ClearRects => "ClearRects",
            Command::SetMode { .. } => "SetMode",
            Command::SetRectColor { .. } => "SetRectColor",
        }
    }

    /// Returns `true` for the ops that are answered with a reply line.
    pub fn is_query(&self) -> bool {
        matches!(self, Command::GetTransformation | Command::GetRects)
    }

    /// Builds a `SetTransformation` command carrying `t`.
    pub fn set_transformation(t: &Transformation) -> Self {
        Command::SetTransformation {
            matrix: to_rows(t.forward()),
            reverse_matrix: to_rows(t.reverse()),
        }
    }
}

/// A successful reply to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// Answer to `GetTransformation`.
    Transformation {
        matrix: MatrixRows,
        #[serde(rename = "reverseMatrix")]
        reverse_matrix: MatrixRows,
    },
    /// Answer to `GetRects`: `[[x, y, w, h], …]` in id order.
    Rects(Vec<Rectangle>),
}

impl Reply {
    pub fn from_transformation(t: &Transformation) -> Self {
        Reply::Transformation {
            matrix: to_rows(t.forward()),
            reverse_matrix: to_rows(t.reverse()),
        }
    }

    pub fn from_rectangles(store: &RectangleStore) -> Self {
        Reply::Rects(store.list().into_iter().map(|row| row.rect).collect())
    }

    /// Rebuilds the transformation carried by a `Transformation` reply.
    pub fn transformation(&self) -> Option<Transformation> {
        match self {
            Reply::Transformation {
                matrix,
                reverse_matrix,
            } => Some(Transformation::from_matrices(
                from_rows(matrix),
                from_rows(reverse_matrix),
            )),
            Reply::Rects(_) => None,
        }
    }
}

/// Sent instead of a [`Reply`] when a query cannot be answered.
///
/// Serialized as `{"error": {"op": "...", "message": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub op: String,
    pub message: String,
}

impl ErrorReply {
    pub fn new(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                op: op.into(),
                message: message.into(),
            },
        }
    }
}

/// Any line the overlay writes back.  Used by readers of the outbound stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outbound {
    Error(ErrorReply),
    Reply(Reply),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
