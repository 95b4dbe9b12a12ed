//! QuoteMe editor session.
//!
//! Owns the style and overlay position, routes pointer input through the
//! drag controller, keeps the render target current, and runs exports.

pub mod queue;
pub mod session;

pub use queue::{InputQueue, InputSender};
pub use session::*;
