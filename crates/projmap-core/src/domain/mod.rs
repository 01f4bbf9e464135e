//! Domain entities for ProjMap.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain** (or "entities" layer).  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from OS APIs, pipes, async runtimes, or UI toolkits.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Here the rules are: how four point pairs become a perspective transform,
//! when a transform may be computed or replaced, and how overlay rectangles
//! are numbered.

/// Points and sizes shared by every other domain module.
pub mod geometry;

/// Perspective transforms from four point correspondences.
pub mod homography;

/// The overlay rectangle collection.
pub mod rectangles;

/// The calibration/draw state machine, the aggregate root.
///
/// See [`session::Session`] for the main type.
pub mod session;
