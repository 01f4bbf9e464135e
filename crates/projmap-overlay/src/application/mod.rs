//! Application layer for projmap-overlay.
//!
//! Knows *what* each protocol command does to the session; knows nothing
//! about where lines come from or go to.
//!
//! # Responsibilities
//!
//! - Applying decoded [`projmap_core::Command`]s to the [`projmap_core::Session`]
//! - Building reply lines for queries
//! - Reporting unhandled lines and failed commands to a [`DiagnosticObserver`]
//!
//! # What does NOT belong here?
//!
//! - Reading stdin or writing stdout (infrastructure)
//! - Tokio tasks and channels (infrastructure)

pub mod dispatch;
pub mod overlay_service;

pub use dispatch::{dispatch, CommandError, Dispatched};
pub use overlay_service::{
    Diagnostic, DiagnosticKind, DiagnosticObserver, Flow, LineOutcome, OverlayService,
    TracingObserver,
};
