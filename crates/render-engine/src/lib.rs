//! QuoteMe Render Engine
//!
//! Turns a style plus an overlay offset into a live scene, and a displayed
//! scene into a PNG.
//!
//! # Pipeline Architecture
//!
//! ```text
//! StyleState ──┐
//!              ├── render() ── LiveScene ── RenderTarget (displayed)
//! offset ──────┘                                  │
//!                                                 ├── wait for images/fonts
//! ResourceCache ──────────────────────────────────┘         │
//!                                                           ├── rasterize @ scale
//! FontRegistry ─────────────────────────────────────────────┘         │
//!                                                                     ▼
//!                                                           ExportArtifact (RGBA)
//!                                                                     │
//!                                                                     ▼
//!                                                           SaveSink (quote-me.png)
//! ```

pub mod compositor;
pub mod export;
pub mod fonts;
pub mod layout;
pub mod raster;
pub mod resources;
pub mod target;

pub use compositor::*;
pub use export::*;
pub use fonts::{FaceKey, FontRegistry};
pub use resources::{Readiness, ResourceCache, ResourceState};
pub use target::RenderTarget;
