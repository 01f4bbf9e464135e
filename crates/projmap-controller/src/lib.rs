//! # projmap-controller
//!
//! The controller side of ProjMap.  It does not draw anything; it tells an
//! overlay process what to draw.
//!
//! - **`client`** – [`client::OverlayClient`], a typed wrapper around the
//!   overlay's stdin/stdout that writes commands and reads query replies.
//! - **`layout`** – [`layout::OverlayLayout`], a TOML description of the
//!   surface size, the key rectangles and an optional stored transformation.
//!
//! The `projmap-controller` binary combines the two: it spawns the overlay,
//! pushes a layout and keeps the overlay alive until its own stdin closes.

pub mod client;
pub mod layout;

pub use client::{ClientError, OverlayClient};
pub use layout::{load_layout, LayoutError, OverlayLayout, StoredTransformation};
