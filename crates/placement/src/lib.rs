//! QuoteMe Placement Engine
//!
//! Converts raw pointer and touch input into a stable top-left offset for
//! the draggable text overlay, relative to its container.
//!
//! - **Engine:** the offset math and the single active drag session
//! - **Listeners:** document-level move/end listener registration, scoped
//!   to the session and released exactly once
//! - **Controller:** the `Idle -> Dragging -> Idle` state machine that
//!   feeds recorded or live events through the engine in arrival order
//!
//! Offsets are never clamped: the overlay may be dragged partly or fully
//! outside the container.

pub mod controller;
pub mod engine;
pub mod listener;

pub use controller::*;
pub use engine::*;
pub use listener::*;
