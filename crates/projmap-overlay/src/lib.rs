//! projmap-overlay library crate.
//!
//! The overlay process receives commands from a controller over stdin, keeps
//! the calibration session, and answers queries over stdout.  Drawing is left
//! to a renderer that watches [`infrastructure::render_bridge::RenderSnapshot`]s.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Controller (JSON lines over stdin/stdout)
//!         ↕
//! [projmap-overlay]
//!   ├── application/        Command dispatch onto the Session, diagnostics
//!   └── infrastructure/
//!         ├── line_transport/  stdin reader, single stdout writer
//!         ├── session_actor/   the one task that owns the Session
//!         ├── render_bridge/   snapshots for a renderer
//!         └── storage/         overlay.toml
//! ```
//!
//! # Layer rules
//!
//! - `application` depends on `projmap-core` only; it never awaits.
//! - `infrastructure` adds `tokio`, the file system and the byte streams.

/// Application layer: command dispatch and the overlay service.
pub mod application;

/// Infrastructure layer: transport, session actor, render bridge, config.
pub mod infrastructure;
