//! Overlay layout files.
//!
//! A layout describes what the controller pushes to a fresh overlay: the
//! logical size of the surface, the key rectangles and, when the projector
//! has been calibrated before, the transformation to reuse.
//!
//! ```toml
//! size = [23.7, 9.0]
//! keys = [[0.0, 0.0, 1.0, 1.0], [1.2, 0.0, 1.0, 1.0]]
//! color = "white"
//!
//! [transformation]
//! matrix = [[60.0, 0.0, 100.0], [0.0, 80.0, 100.0], [0.0, 0.0, 1.0]]
//! reverseMatrix = [[0.0166667, 0.0, -1.6666667], [0.0, 0.0125, -1.25], [0.0, 0.0, 1.0]]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use projmap_core::domain::homography::from_rows;
use projmap_core::{Color, Command, LogicalSize, MatrixRows, Rectangle, Transformation};

/// Round-trip tolerance used to warn about a mismatched matrix pair.
const CONSISTENCY_TOLERANCE: f64 = 1e-6;

/// Error type for layout file operations.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("I/O error reading layout at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse layout TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid layout: {0}")]
    Invalid(String),
}

/// A stored projector transformation, in wire layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredTransformation {
    pub matrix: MatrixRows,
    #[serde(rename = "reverseMatrix")]
    pub reverse_matrix: MatrixRows,
}

impl StoredTransformation {
    pub fn to_transformation(&self) -> Transformation {
        Transformation::from_matrices(from_rows(&self.matrix), from_rows(&self.reverse_matrix))
    }
}

/// What to show on the overlay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverlayLayout {
    /// Logical width and height of the surface.
    pub size: LogicalSize,
    #[serde(default)]
    pub keys: Vec<Rectangle>,
    /// Colour for every key; the overlay's default when absent.
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub transformation: Option<StoredTransformation>,
}

impl OverlayLayout {
    /// Parses a layout from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Parse`] for malformed TOML and
    /// [`LayoutError::Invalid`] for non-finite numbers.
    pub fn from_toml(text: &str) -> Result<Self, LayoutError> {
        let layout: OverlayLayout = toml::from_str(text)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Checks that every number is finite.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if !(self.size.width.is_finite() && self.size.height.is_finite()) {
            return Err(LayoutError::Invalid("size must be finite".to_string()));
        }
        if let Some(index) = self
            .keys
            .iter()
            .position(|k| !k.to_array().iter().all(|v| v.is_finite()))
        {
            return Err(LayoutError::Invalid(format!("keys[{index}] must be finite")));
        }
        if let Some(t) = &self.transformation {
            let finite = |rows: &MatrixRows| rows.iter().flatten().all(|v| v.is_finite());
            if !(finite(&t.matrix) && finite(&t.reverse_matrix)) {
                return Err(LayoutError::Invalid(
                    "transformation matrices must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The commands that bring a fresh overlay to this layout, in order.
    ///
    /// The stored transformation, when present, is sent after the size so
    /// the overlay skips calibration.
    pub fn commands(&self) -> Vec<Command> {
        let mut commands = vec![Command::SetInitSize { size: self.size }];
        if let Some(stored) = &self.transformation {
            let t = stored.to_transformation();
            if !t.is_consistent(CONSISTENCY_TOLERANCE) {
                warn!("layout transformation matrices are not inverses of each other");
            }
            commands.push(Command::set_transformation(&t));
        }
        commands.push(Command::ClearRects);
        if !self.keys.is_empty() {
            commands.push(Command::AddRects {
                rectangles: self.keys.clone(),
                color: self.color.clone(),
            });
        }
        commands
    }
}

/// Loads and validates the layout at `path`.
///
/// # Errors
///
/// Returns [`LayoutError::Io`] if the file cannot be read, plus the errors of
/// [`OverlayLayout::from_toml`].
pub fn load_layout(path: &Path) -> Result<OverlayLayout, LayoutError> {
    let text = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let layout = OverlayLayout::from_toml(&text)?;
    debug!(path = %path.display(), keys = layout.keys.len(), "layout loaded");
    Ok(layout)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const KEYBOARD: &str = r#"
size = [23.7, 9.0]
keys = [[0.0, 0.0, 1.0, 1.0], [1.2, 0, 1, 1]]
"#;

    #[test]
    fn test_minimal_layout_parses() {
        let layout = OverlayLayout::from_toml("size = [10, 5]").unwrap();

        assert_eq!(layout.size, LogicalSize::new(10.0, 5.0));
        assert!(layout.keys.is_empty());
        assert!(layout.transformation.is_none());
    }

    #[test]
    fn test_commands_without_transformation() {
        // Arrange
        let layout = OverlayLayout::from_toml(KEYBOARD).unwrap();

        // Act
        let ops: Vec<&str> = layout.commands().iter().map(Command::op).collect();

        // Assert
        assert_eq!(ops, ["SetInitSize", "ClearRects", "AddRects"]);
    }

    #[test]
    fn test_commands_with_transformation_skip_calibration() {
        // Arrange
        let text = format!(
            "{KEYBOARD}color = \"red\"\n\n[transformation]\n\
             matrix = [[2, 0, 5], [0, 2, 7], [0, 0, 1]]\n\
             reverseMatrix = [[0.5, 0, -2.5], [0, 0.5, -3.5], [0, 0, 1]]\n"
        );
        let layout = OverlayLayout::from_toml(&text).unwrap();

        // Act
        let commands = layout.commands();

        // Assert
        assert_eq!(commands[1].op(), "SetTransformation");
        let Command::AddRects { rectangles, color } = &commands[3] else {
            panic!("expected AddRects, got {:?}", commands[3]);
        };
        assert_eq!(rectangles.len(), 2);
        assert_eq!(color, &Some(Color::Named("red".to_string())));
    }

    #[test]
    fn test_layout_without_keys_only_clears() {
        let layout = OverlayLayout::from_toml("size = [1, 1]").unwrap();

        let ops: Vec<&str> = layout.commands().iter().map(Command::op).collect();

        assert_eq!(ops, ["SetInitSize", "ClearRects"]);
    }

    #[test]
    fn test_missing_size_is_a_parse_error() {
        let result = OverlayLayout::from_toml("keys = []");

        assert!(matches!(result, Err(LayoutError::Parse(_))));
    }

    #[test]
    fn test_short_key_is_a_parse_error() {
        let result = OverlayLayout::from_toml("size = [1, 1]\nkeys = [[0, 0, 1]]");

        assert!(matches!(result, Err(LayoutError::Parse(_))));
    }

    #[test]
    fn test_non_finite_key_is_invalid() {
        let result = OverlayLayout::from_toml("size = [1, 1]\nkeys = [[0, 0, 1, inf]]");

        assert!(matches!(result, Err(LayoutError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = load_layout(Path::new("/nonexistent/projmap/layout.toml"));

        assert!(matches!(result, Err(LayoutError::Io { .. })));
    }
}
