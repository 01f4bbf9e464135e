//! Infrastructure layer for projmap-overlay.
//!
//! Handles all I/O and concurrency: reading protocol lines, writing replies,
//! owning the session on a single task, publishing snapshots for a renderer,
//! and loading `overlay.toml`.
//!
//! # What does NOT belong here?
//!
//! - What a command does to the session (that is the application layer)
//! - Homography math and the wire codec (that is `projmap-core`)

pub mod line_transport;
pub mod render_bridge;
pub mod runtime;
pub mod session_actor;
pub mod storage;

pub use line_transport::{ReadEnd, TransportError};
pub use render_bridge::{RenderSnapshot, ShapeView};
pub use runtime::{OverlayRun, OverlayRuntime};
pub use session_actor::{ActorStopped, SessionActor, SessionHandle};
