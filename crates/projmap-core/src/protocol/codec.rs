//! Line codec for the ProjMap protocol.
//!
//! Wire format: one JSON value per line, UTF-8, `\n` terminated.  The codec
//! works on a single line without its terminator; framing belongs to the
//! transport.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::messages::Command;

/// Errors that can occur while decoding or encoding a line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line is not valid JSON.
    #[error("malformed line: {0}")]
    Malformed(String),

    /// The line is valid JSON but not an object.
    #[error("message is not a JSON object")]
    NotAnObject,

    /// The object has no string `"op"` field.
    #[error("message has no string \"op\" field")]
    MissingOp,

    /// The `"op"` value is not one of [`Command::OPS`].
    #[error("unknown op: {0}")]
    UnknownOp(String),

    /// The op is known but its fields are missing or have the wrong shape.
    #[error("invalid fields for {op}: {reason}")]
    InvalidFields { op: String, reason: String },

    /// An outbound value could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// `true` for a well-formed message whose op is not recognised, as
    /// opposed to a line that could not be parsed at all.
    pub fn is_unknown_op(&self) -> bool {
        matches!(self, ProtocolError::UnknownOp(_))
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes one inbound line into a [`Command`].
///
/// Returns `Ok(None)` for a blank line.
///
/// # Errors
///
/// Returns the first [`ProtocolError`] found, checking in order: JSON syntax,
/// object shape, presence of `"op"`, op name, then the op's fields.
///
/// # Examples
///
/// ```rust
/// use projmap_core::protocol::{decode_line, Command};
/// use projmap_core::LogicalSize;
///
/// let cmd = decode_line(r#"{"op":"SetInitSize","size":[10,5]}"#).unwrap();
/// assert_eq!(cmd, Some(Command::SetInitSize { size: LogicalSize::new(10.0, 5.0) }));
/// ```
pub fn decode_line(line: &str) -> Result<Option<Command>, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(line).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
    let op = object
        .get("op")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingOp)?
        .to_owned();
    if !Command::OPS.contains(&op.as_str()) {
        return Err(ProtocolError::UnknownOp(op));
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ProtocolError::InvalidFields {
            op,
            reason: e.to_string(),
        })
}

/// Encodes an outbound value as a single line, without the terminator.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if `value` cannot be represented as JSON.
pub fn encode_line<T: Serialize + ?Sized>(value: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(value).map_err(|e| ProtocolError::Encode(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
