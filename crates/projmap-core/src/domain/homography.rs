//! Homography engine: perspective transforms from four point correspondences.
//!
//! # How the transform is built (for beginners)
//!
//! Any four points in general position (no three on one line) can be reached
//! from the four *canonical basis directions* of the projective plane by a
//! single 3×3 matrix.  [`correspondence_matrix`] builds that matrix for one
//! quadrilateral.  Mapping quad A onto quad B is then "undo A, apply B":
//!
//! ```text
//! forward = M_dst · M_src⁻¹      (logical → screen)
//! reverse = M_src · M_dst⁻¹      (screen  → logical)
//! ```
//!
//! Points are lifted to homogeneous coordinates `(x, y, 1)`, multiplied, and
//! projected back by dividing by the third component.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use super::geometry::{LogicalSize, Point};

/// Below this Hadamard ratio a matrix is treated as singular.
///
/// The ratio `|det M| / (‖c0‖·‖c1‖·‖c2‖)` lies in `[0, 1]` and does not
/// depend on the magnitude of the coordinates, so pixel-space and
/// logical-space quads share one threshold.
const SINGULAR_EPSILON: f64 = 1e-10;

/// Homogeneous weights with a smaller magnitude project to infinity.
const POINT_AT_INFINITY_EPSILON: f64 = 1e-12;

/// Errors produced by the homography engine.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum HomographyError {
    /// The four points are degenerate: three are collinear or two coincide.
    #[error("singular correspondence: three points are collinear or two coincide")]
    Singular,

    /// The transformed point has a zero homogeneous weight.
    #[error("point ({x}, {y}) maps to infinity")]
    PointAtInfinity { x: f64, y: f64 },
}

/// An immutable forward/reverse pair of projective maps.
///
/// `forward` maps logical coordinates to screen coordinates and `reverse`
/// maps back.  Both matrices are set together at construction and never
/// change afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transformation {
    forward: Matrix3<f64>,
    reverse: Matrix3<f64>,
}

impl Transformation {
    /// Wraps an externally supplied matrix pair without recomputing it.
    ///
    /// The controller may push a transformation it stored earlier; the pair
    /// is taken as given.  Use [`Transformation::is_consistent`] to check it.
    pub fn from_matrices(forward: Matrix3<f64>, reverse: Matrix3<f64>) -> Self {
        Self { forward, reverse }
    }

    /// The logical → screen matrix.
    pub fn forward(&self) -> &Matrix3<f64> {
        &self.forward
    }

    /// The screen → logical matrix.
    pub fn reverse(&self) -> &Matrix3<f64> {
        &self.reverse
    }

    /// Maps a logical point to screen coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`HomographyError::PointAtInfinity`] if the point lies on the
    /// line the transform sends to infinity.
    pub fn to_screen(&self, p: Point) -> Result<Point, HomographyError> {
        apply(p, &self.forward)
    }

    /// Maps a screen point back to logical coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`HomographyError::PointAtInfinity`] as for [`Self::to_screen`].
    pub fn to_logical(&self, p: Point) -> Result<Point, HomographyError> {
        apply(p, &self.reverse)
    }

    /// Returns `true` if `forward · reverse` is a multiple of the identity
    /// within `tolerance` (projective matrices are only defined up to scale).
    pub fn is_consistent(&self, tolerance: f64) -> bool {
        let product = self.forward * self.reverse;
        let lambda = product.trace() / 3.0;
        if !lambda.is_finite() || lambda.abs() <= f64::EPSILON {
            return false;
        }
        let deviation = product / lambda - Matrix3::identity();
        deviation.amax() <= tolerance
    }
}

/// Builds the matrix that maps the canonical projective basis onto `points`.
///
/// The first three points become the columns of `M`; the fourth fixes the
/// per-column scale `s` by solving `M · s = (x₃, y₃, 1)`.
///
/// # Errors
///
/// Returns [`HomographyError::Singular`] if three of the points are collinear
/// or two coincide.
pub fn correspondence_matrix(points: &[Point; 4]) -> Result<Matrix3<f64>, HomographyError> {
    let [p0, p1, p2, p3] = *points;

    #[rustfmt::skip]
    let basis = Matrix3::new(
        p0.x, p1.x, p2.x,
        p0.y, p1.y, p2.y,
        1.0,  1.0,  1.0,
    );
    if is_degenerate(&basis) {
        return Err(HomographyError::Singular);
    }

    let scale = basis
        .lu()
        .solve(&Vector3::new(p3.x, p3.y, 1.0))
        .ok_or(HomographyError::Singular)?;

    // A zero scale means the fourth point is collinear with two of the others.
    let matrix = basis * Matrix3::from_diagonal(&scale);
    if is_degenerate(&matrix) {
        return Err(HomographyError::Singular);
    }
    Ok(matrix)
}

/// Computes the transform that maps `src` (logical) onto `dst` (screen).
///
/// # Errors
///
/// Returns [`HomographyError::Singular`] if either quadrilateral is
/// degenerate or one of the correspondence matrices cannot be inverted.
pub fn compute_transformation(
    dst: &[Point; 4],
    src: &[Point; 4],
) -> Result<Transformation, HomographyError> {
    let dst_matrix = correspondence_matrix(dst)?;
    let src_matrix = correspondence_matrix(src)?;

    let dst_inverse = dst_matrix.try_inverse().ok_or(HomographyError::Singular)?;
    let src_inverse = src_matrix.try_inverse().ok_or(HomographyError::Singular)?;

    Ok(Transformation {
        forward: dst_matrix * src_inverse,
        reverse: src_matrix * dst_inverse,
    })
}

/// The logical quadrilateral the screen markers are matched against.
///
/// Corner order is top-left, top-right, bottom-right, bottom-left, the same
/// order the markers are expected in.  Without a size the unit square is used.
pub fn canonical_source_quad(size: Option<LogicalSize>) -> [Point; 4] {
    let (w, h) = size.map_or((1.0, 1.0), |s| (s.width, s.height));
    [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ]
}

/// Applies `matrix` to `point` in homogeneous coordinates.
///
/// # Errors
///
/// Returns [`HomographyError::PointAtInfinity`] if the homogeneous weight of
/// the result is zero (or not finite).
pub fn apply(point: Point, matrix: &Matrix3<f64>) -> Result<Point, HomographyError> {
    let v = matrix * Vector3::new(point.x, point.y, 1.0);
    let w = v[2];
    if !w.is_finite() || w.abs() <= POINT_AT_INFINITY_EPSILON {
        return Err(HomographyError::PointAtInfinity {
            x: point.x,
            y: point.y,
        });
    }
    Ok(Point::new(v[0] / w, v[1] / w))
}

/// Converts a matrix into row-major nested arrays (the wire layout).
pub fn to_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

/// Builds a matrix from row-major nested arrays.
pub fn from_rows(rows: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_fn(|r, c| rows[r][c])
}

fn is_degenerate(m: &Matrix3<f64>) -> bool {
    let norms = m.column(0).norm() * m.column(1).norm() * m.column(2).norm();
    let det = m.determinant();
    !det.is_finite() || norms <= f64::MIN_POSITIVE || (det / norms).abs() <= SINGULAR_EPSILON
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn screen_rect() -> [Point; 4] {
        [
            Point::new(100.0, 100.0),
            Point::new(700.0, 100.0),
            Point::new(700.0, 500.0),
            Point::new(100.0, 500.0),
        ]
    }

    fn skewed_quad() -> [Point; 4] {
        [
            Point::new(120.0, 80.0),
            Point::new(690.0, 130.0),
            Point::new(650.0, 520.0),
            Point::new(90.0, 470.0),
        ]
    }

    #[test]
    fn test_correspondence_matrix_maps_basis_directions_onto_points() {
        // Arrange
        let quad = skewed_quad();

        // Act
        let m = correspondence_matrix(&quad).unwrap();

        // Assert: e0, e1, e2 and (1,1,1) land on the four points.
        let basis = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
        ];
        for (dir, expected) in basis.iter().zip(quad.iter()) {
            let v = m * dir;
            assert_relative_eq!(v[0] / v[2], expected.x, epsilon = 1e-9);
            assert_relative_eq!(v[1] / v[2], expected.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_identity_correspondence_yields_identity_matrices() {
        let quad = skewed_quad();

        let t = compute_transformation(&quad, &quad).unwrap();

        assert_abs_diff_eq!(*t.forward(), Matrix3::identity(), epsilon = 1e-9);
        assert_abs_diff_eq!(*t.reverse(), Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn test_forward_maps_logical_corners_onto_screen_corners() {
        // Arrange
        let src = canonical_source_quad(Some(LogicalSize::new(10.0, 5.0)));

        // Act
        let t = compute_transformation(&screen_rect(), &src).unwrap();

        // Assert
        let origin = t.to_screen(Point::new(0.0, 0.0)).unwrap();
        let far = t.to_screen(Point::new(10.0, 5.0)).unwrap();
        assert_relative_eq!(origin.x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(origin.y, 100.0, epsilon = 1e-9);
        assert_relative_eq!(far.x, 700.0, epsilon = 1e-9);
        assert_relative_eq!(far.y, 500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_round_trip_through_skewed_quad_returns_original_point() {
        // Arrange: a genuinely perspective (non-affine) mapping.
        let size = LogicalSize::new(23.7, 9.0);
        let t = compute_transformation(&skewed_quad(), &canonical_source_quad(Some(size))).unwrap();

        // Act / Assert: sample a grid covering the logical canvas.
        for i in 0..=10 {
            for j in 0..=10 {
                let p = Point::new(size.width * i as f64 / 10.0, size.height * j as f64 / 10.0);
                let back = t.to_logical(t.to_screen(p).unwrap()).unwrap();
                assert_relative_eq!(back.x, p.x, epsilon = 1e-9, max_relative = 1e-6);
                assert_relative_eq!(back.y, p.y, epsilon = 1e-9, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn test_round_trip_holds_for_mirrored_and_non_convex_quads() {
        // Arrange
        let size = LogicalSize::new(10.0, 5.0);
        let src = canonical_source_quad(Some(size));
        let quads = [
            // Mirrored left to right.
            [
                Point::new(700.0, 100.0),
                Point::new(100.0, 100.0),
                Point::new(100.0, 500.0),
                Point::new(700.0, 500.0),
            ],
            // Mirrored top to bottom and rotated.
            [
                Point::new(90.0, 470.0),
                Point::new(650.0, 520.0),
                Point::new(690.0, 130.0),
                Point::new(120.0, 80.0),
            ],
            // Non-convex: the third corner sits inside the other three.
            [
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(3.0, 3.0),
                Point::new(0.0, 10.0),
            ],
            // Large projector coordinates with a strong keystone.
            [
                Point::new(1000.0, 800.0),
                Point::new(3500.0, 700.0),
                Point::new(3700.0, 2000.0),
                Point::new(900.0, 2100.0),
            ],
        ];

        for dst in &quads {
            // Act
            let t = compute_transformation(dst, &src).unwrap();

            // Assert: grid offset from the corners so no sample lands exactly
            // on a vanishing line.
            for i in 0..10 {
                for j in 0..10 {
                    let p = Point::new(
                        size.width * (i as f64 + 0.37) / 10.0,
                        size.height * (j as f64 + 0.61) / 10.0,
                    );
                    let w = (t.forward() * Vector3::new(p.x, p.y, 1.0))[2];
                    if w.abs() < 1e-6 {
                        continue;
                    }
                    let back = t.to_logical(t.to_screen(p).unwrap()).unwrap();
                    assert_relative_eq!(back.x, p.x, epsilon = 1e-7, max_relative = 1e-6);
                    assert_relative_eq!(back.y, p.y, epsilon = 1e-7, max_relative = 1e-6);
                }
            }
            for (corner, expected) in src.iter().zip(dst) {
                let screen = t.to_screen(*corner).unwrap();
                assert_relative_eq!(screen.x, expected.x, epsilon = 1e-7, max_relative = 1e-9);
                assert_relative_eq!(screen.y, expected.y, epsilon = 1e-7, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn test_computed_transformation_is_consistent() {
        let t = compute_transformation(&skewed_quad(), &canonical_source_quad(None)).unwrap();
        assert!(t.is_consistent(1e-9));
    }

    #[test]
    fn test_mismatched_matrix_pair_is_not_consistent() {
        let t = Transformation::from_matrices(
            Matrix3::new(2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0),
            Matrix3::identity(),
        );
        assert!(!t.is_consistent(1e-6));
    }

    #[test]
    fn test_three_collinear_points_are_singular() {
        let quad = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(5.0, 5.0),
        ];

        assert_eq!(correspondence_matrix(&quad), Err(HomographyError::Singular));
    }

    #[test]
    fn test_fourth_point_collinear_with_two_others_is_singular() {
        // (0,0), (10,0) and (5,0) are collinear; the first three are fine.
        let quad = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(5.0, 0.0),
        ];

        assert_eq!(correspondence_matrix(&quad), Err(HomographyError::Singular));
    }

    #[test]
    fn test_coincident_points_are_singular() {
        let quad = [
            Point::new(3.0, 4.0),
            Point::new(3.0, 4.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];

        let result = compute_transformation(&quad, &canonical_source_quad(None));

        assert_eq!(result, Err(HomographyError::Singular));
    }

    #[test]
    fn test_degenerate_source_quad_is_singular() {
        // A zero-width logical canvas collapses the source quad onto a line.
        let src = canonical_source_quad(Some(LogicalSize::new(0.0, 5.0)));

        assert_eq!(
            compute_transformation(&screen_rect(), &src),
            Err(HomographyError::Singular)
        );
    }

    #[test]
    fn test_apply_reports_point_at_infinity() {
        // The third row picks x, so every point with x = 0 has weight 0.
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);

        let result = apply(Point::new(0.0, 3.0), &m);

        assert_eq!(result, Err(HomographyError::PointAtInfinity { x: 0.0, y: 3.0 }));
    }

    #[test]
    fn test_canonical_source_quad_defaults_to_unit_square() {
        let quad = canonical_source_quad(None);
        assert_eq!(quad[2], Point::new(1.0, 1.0));
        assert_eq!(quad[3], Point::new(0.0, 1.0));
    }

    #[test]
    fn test_rows_round_trip_preserves_row_major_layout() {
        let rows = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let m = from_rows(&rows);
        assert_eq!(m[(0, 2)], 3.0);
        assert_eq!(m[(2, 0)], 7.0);
        assert_eq!(to_rows(&m), rows);
    }
}
