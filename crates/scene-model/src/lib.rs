//! QuoteMe Scene Model
//!
//! Defines the data contracts shared by the placement engine, the
//! compositor, and whatever shell drives them:
//! - **Geometry:** `Vec2`, `Rect`, `Size` in logical (CSS) pixels
//! - **Style:** `StyleState`, the read-only content and presentation input
//! - **Color:** palette tokens and hex colors
//! - **Events:** Timestamped pointer/touch input for the drag state machine
//!
//! Coordinates are logical pixels. Client-space rectangles are what a
//! platform bounding-box query returns; offsets are container-local.

pub mod color;
pub mod event;
pub mod geometry;
pub mod style;

pub use color::*;
pub use event::*;
pub use geometry::*;
pub use style::*;
