//! Export artifacts, delivery sinks and the single-flight export trigger.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use image::{ImageFormat, RgbaImage};
use quoteme_common::error::{QuotemeError, QuotemeResult};
use quoteme_scene_model::style::ResourceKey;

use crate::compositor::{Compositor, SnapshotSource};

/// Why an export did not produce a delivered file.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("render target is not mounted or has zero size")]
    NotReady,

    #[error("resource {resource} failed to load: {reason}")]
    ResourceLoadFailed { resource: ResourceKey, reason: String },

    #[error("an export is already in progress")]
    Busy,

    #[error("invalid scale factor: {0}")]
    InvalidScale(f64),

    #[error("rasterization failed: {0}")]
    Raster(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("delivery failed: {0}")]
    Delivery(#[from] QuotemeError),
}

/// A resource left out of a best-effort export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OmittedResource {
    pub resource: ResourceKey,
    pub reason: String,
}

/// A freshly rasterized export.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub bitmap: RgbaImage,
    pub suggested_filename: String,
    pub scale: f64,
    pub omitted: Vec<OmittedResource>,
}

impl ExportArtifact {
    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    /// PNG bytes of the bitmap, without extra metadata.
    pub fn encode_png(&self) -> Result<Vec<u8>, ExportError> {
        let mut bytes = Vec::new();
        self.bitmap
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| ExportError::Encode(e.to_string()))?;
        Ok(bytes)
    }
}

/// Platform hand-off for a finished export.
pub trait SaveSink: Send + Sync {
    /// Deliver `png` (the encoded `artifact`). Returns where it went.
    fn deliver(&self, artifact: &ExportArtifact, png: &[u8]) -> QuotemeResult<String>;

    /// Sink name for logs.
    fn name(&self) -> &str;
}

/// Writes exports into a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveSink for FileSink {
    fn deliver(&self, artifact: &ExportArtifact, png: &[u8]) -> QuotemeResult<String> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.suggested_filename);
        // Write next to the target and rename so a failed write never
        // leaves a truncated PNG under the final name.
        let partial = self.dir.join(format!(".{}.part", artifact.suggested_filename));
        std::fs::write(&partial, png)?;
        if let Err(e) = std::fs::rename(&partial, &path) {
            std::fs::remove_file(&partial).ok();
            return Err(e.into());
        }
        Ok(path.display().to_string())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// A delivered export held in memory.
#[derive(Debug, Clone)]
pub struct DeliveredFile {
    pub filename: String,
    pub png: Vec<u8>,
    pub bitmap: RgbaImage,
}

/// Keeps delivered exports in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    delivered: Arc<Mutex<Vec<DeliveredFile>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<DeliveredFile> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SaveSink for MemorySink {
    fn deliver(&self, artifact: &ExportArtifact, png: &[u8]) -> QuotemeResult<String> {
        let mut delivered = self.delivered.lock().unwrap_or_else(PoisonError::into_inner);
        delivered.push(DeliveredFile {
            filename: artifact.suggested_filename.clone(),
            png: png.to_vec(),
            bitmap: artifact.bitmap.clone(),
        });
        Ok(format!("memory:{}#{}", artifact.suggested_filename, delivered.len()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Completion signal for a delivered export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReceipt {
    pub location: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub bytes: usize,
    pub omitted: Vec<OmittedResource>,
}

/// Clears the in-flight flag when the export finishes, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs exports one at a time and hands results to a sink.
///
/// A trigger while an export is running fails with [`ExportError::Busy`];
/// nothing is queued.
pub struct ExportController<S> {
    compositor: Arc<Compositor>,
    sink: S,
    in_flight: AtomicBool,
}

impl<S: SaveSink> ExportController<S> {
    pub fn new(compositor: Arc<Compositor>, sink: S) -> Self {
        Self {
            compositor,
            sink,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn compositor(&self) -> &Arc<Compositor> {
        &self.compositor
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Export at the configured default scale.
    pub async fn trigger_export(
        &self,
        target: &dyn SnapshotSource,
    ) -> Result<ExportReceipt, ExportError> {
        let scale = self.compositor.settings().default_scale;
        self.trigger_export_at(target, scale).await
    }

    /// Export at `scale_factor` and deliver the PNG exactly once.
    pub async fn trigger_export_at(
        &self,
        target: &dyn SnapshotSource,
        scale_factor: f64,
    ) -> Result<ExportReceipt, ExportError> {
        let Some(_flight) = InFlight::acquire(&self.in_flight) else {
            tracing::warn!("Export requested while another is in progress");
            return Err(ExportError::Busy);
        };

        let started = Instant::now();
        tracing::info!(scale = scale_factor, sink = self.sink.name(), "Starting export");

        let artifact = self.compositor.export(target, scale_factor).await?;
        let png = artifact.encode_png()?;
        let location = self.sink.deliver(&artifact, &png)?;

        tracing::info!(
            location = %location,
            width = artifact.width(),
            height = artifact.height(),
            bytes = png.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Export delivered"
        );

        Ok(ExportReceipt {
            location,
            filename: artifact.suggested_filename,
            width: artifact.bitmap.width(),
            height: artifact.bitmap.height(),
            scale: artifact.scale,
            bytes: png.len(),
            omitted: artifact.omitted,
        })
    }
}

impl<S: SaveSink> std::fmt::Debug for ExportController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportController")
            .field("sink", &self.sink.name())
            .field("busy", &self.is_busy())
            .finish()
    }
}
