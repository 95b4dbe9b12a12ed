//! Scene composition and export.
//!
//! [`render`] is a pure function from (container size, style, offset) to a
//! [`LiveScene`]. Export never looks at the style: it reads whatever scene
//! a [`SnapshotSource`] currently displays and rasterizes that.

use std::sync::Arc;
use std::time::{Duration, Instant};

use quoteme_common::config::ExportSettings;
use quoteme_scene_model::color::Rgba8;
use quoteme_scene_model::geometry::{Rect, Size, Vec2};
use quoteme_scene_model::style::{FontWeight, ResourceKey, StyleState, TextAlign};

use crate::export::{ExportArtifact, ExportError, OmittedResource};
use crate::fonts::{FaceKey, FontRegistry, ResolvedFace};
use crate::layout::{line_metrics, wrap_pre_line, LineLayout};
use crate::raster;
use crate::resources::ResourceCache;

/// Vertical gap between the quote and the author line.
pub const AUTHOR_GAP_PX: f64 = 8.0;

/// The visual tree for one frame, in container-local logical pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveScene {
    pub container: Size,
    pub background: BackgroundLayer,
    /// `None` when there is no quote and no author.
    pub overlay: Option<OverlayLayer>,
    /// Images and fonts this frame depends on.
    pub resources: Vec<ResourceKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundLayer {
    /// Always painted; visible wherever the image is missing.
    pub color: Rgba8,
    /// Drawn with object-fit cover when ready.
    pub image: Option<ResourceKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayer {
    /// Top-left of the overlay box.
    pub offset: Vec2,
    pub size: Size,
    pub backdrop: Option<Rgba8>,
    pub align: TextAlign,
    pub lines: Vec<SceneLine>,
}

impl OverlayLayer {
    /// Box in container-local coordinates.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.offset, self.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Quote,
    Author,
}

/// One line of text as displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLine {
    pub role: LineRole,
    pub text: String,
    /// Face actually used.
    pub face: FaceKey,
    /// The requested family was unavailable.
    pub fallback: bool,
    pub size_px: f64,
    pub color: Rgba8,
    /// Left edge and baseline, relative to the overlay box.
    pub origin: Vec2,
    pub width: f64,
}

impl LiveScene {
    pub fn lines(&self) -> &[SceneLine] {
        self.overlay
            .as_ref()
            .map(|overlay| overlay.lines.as_slice())
            .unwrap_or(&[])
    }
}

/// Build the scene for `style` with the overlay at `offset`.
pub fn render(container: Size, style: &StyleState, offset: Vec2, fonts: &FontRegistry) -> LiveScene {
    let mut resources = Vec::new();
    let image = style.background.image.as_ref().map(|source| source.key());
    if let Some(key) = &image {
        resources.push(key.clone());
    }

    let overlay = if style.has_overlay() {
        compose_overlay(container, style, offset, fonts, &mut resources)
    } else {
        None
    };

    LiveScene {
        container,
        background: BackgroundLayer {
            color: style.background.color.rgba(),
            image,
        },
        overlay,
        resources,
    }
}

struct TextBlock {
    role: LineRole,
    face: ResolvedFace,
    size_px: f64,
    lines: Vec<LineLayout>,
}

fn compose_overlay(
    container: Size,
    style: &StyleState,
    offset: Vec2,
    fonts: &FontRegistry,
    resources: &mut Vec<ResourceKey>,
) -> Option<OverlayLayer> {
    let text = &style.text;
    let padding = text.padding_px;
    // Wrap width depends on the container only, so dragging never reflows.
    let max_width = (container.width - 2.0 * padding).max(1.0);

    let mut blocks = Vec::new();
    if !style.quote.is_empty() {
        blocks.push((LineRole::Quote, style.quote.clone(), text.font_weight, text.font_size_px));
    }
    if let Some(author) = style.author_line() {
        blocks.push((
            LineRole::Author,
            author,
            FontWeight::Light,
            text.font_size_px * text.author_scale,
        ));
    }

    let mut laid_out = Vec::with_capacity(blocks.len());
    for (role, content, weight, size_px) in blocks {
        let Some(face) = fonts.resolve(&text.font_family, weight) else {
            tracing::error!("No font faces available, overlay not drawn");
            return None;
        };
        if let Some(pending) = &face.pending {
            if !resources.contains(pending) {
                resources.push(pending.clone());
            }
        }
        let lines = wrap_pre_line(&face.font, size_px, &content, max_width);
        laid_out.push(TextBlock {
            role,
            face,
            size_px,
            lines,
        });
    }

    let inner_width = laid_out
        .iter()
        .flat_map(|block| block.lines.iter().map(|line| line.width))
        .fold(0.0, f64::max);

    let color = text.color.rgba();
    let mut lines = Vec::new();
    let mut y = padding;
    for (index, block) in laid_out.iter().enumerate() {
        if index > 0 {
            y += AUTHOR_GAP_PX;
        }
        let metrics = line_metrics(&block.face.font, block.size_px);
        for line in &block.lines {
            let x = padding
                + match text.text_align {
                    TextAlign::Left => 0.0,
                    TextAlign::Center => (inner_width - line.width) / 2.0,
                    TextAlign::Right => inner_width - line.width,
                };
            lines.push(SceneLine {
                role: block.role,
                text: line.text.clone(),
                face: block.face.key.clone(),
                fallback: block.face.fallback,
                size_px: block.size_px,
                color,
                origin: Vec2::new(x, y + metrics.ascent),
                width: line.width,
            });
            y += metrics.line_height;
        }
    }

    Some(OverlayLayer {
        offset,
        size: Size::new(inner_width + 2.0 * padding, y + padding),
        backdrop: text.backdrop.map(|token| token.rgba()),
        align: text.text_align,
        lines,
    })
}

/// Anything that displays a scene and can be exported.
pub trait SnapshotSource: Send + Sync {
    /// The scene as currently displayed, or `None` when not mounted.
    fn snapshot(&self) -> Option<LiveScene>;

    /// Re-render from the presented inputs, e.g. after a resource loaded.
    fn refresh(&self) {}
}

/// Export knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorSettings {
    pub default_scale: f64,
    pub max_scale_factor: f64,
    pub resource_timeout: Duration,
    /// Fail the export instead of omitting a missing resource.
    pub strict_resources: bool,
    pub filename: String,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self::from(&ExportSettings::default())
    }
}

impl From<&ExportSettings> for CompositorSettings {
    fn from(settings: &ExportSettings) -> Self {
        Self {
            default_scale: settings.scale_factor,
            max_scale_factor: settings.max_scale_factor,
            resource_timeout: Duration::from_millis(settings.resource_timeout_ms),
            strict_resources: settings.strict_resources,
            filename: settings.filename.clone(),
        }
    }
}

/// Renders scenes and rasterizes displayed ones.
#[derive(Debug)]
pub struct Compositor {
    fonts: Arc<FontRegistry>,
    cache: Arc<ResourceCache>,
    settings: CompositorSettings,
}

impl Compositor {
    pub fn new(fonts: Arc<FontRegistry>, cache: Arc<ResourceCache>, settings: CompositorSettings) -> Self {
        Self {
            fonts,
            cache,
            settings,
        }
    }

    pub fn fonts(&self) -> &Arc<FontRegistry> {
        &self.fonts
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    pub fn settings(&self) -> &CompositorSettings {
        &self.settings
    }

    /// [`render`] with this compositor's fonts.
    pub fn render(&self, container: Size, style: &StyleState, offset: Vec2) -> LiveScene {
        render(container, style, offset, &self.fonts)
    }

    /// Rasterize what `target` displays at `scale_factor`.
    ///
    /// Waits for the scene's images and fonts to settle (bounded by the
    /// resource timeout). If any became ready meanwhile, the target is
    /// refreshed and the refreshed scene is captured. Resources that still
    /// failed are omitted and listed, or fail the export in strict mode.
    pub async fn export(
        &self,
        target: &dyn SnapshotSource,
        scale_factor: f64,
    ) -> Result<ExportArtifact, ExportError> {
        let scene = displayed(target)?;
        self.check_scale(scale_factor)?;

        let started = Instant::now();
        let readiness = self
            .cache
            .wait_settled(&scene.resources, self.settings.resource_timeout)
            .await;
        tracing::debug!(
            ready = readiness.ready.len(),
            failed = readiness.failed.len(),
            waited_ms = started.elapsed().as_millis() as u64,
            "Export resources settled"
        );

        let scene = if readiness.ready.is_empty() {
            scene
        } else {
            target.refresh();
            displayed(target)?
        };

        let mut omitted = Vec::new();
        for key in &scene.resources {
            let reason = match readiness.failure(key) {
                Some(reason) => reason.to_string(),
                None if readiness.ready.contains(key) => continue,
                None => "appeared after the readiness wait".to_string(),
            };
            if self.settings.strict_resources {
                return Err(ExportError::ResourceLoadFailed {
                    resource: key.clone(),
                    reason,
                });
            }
            tracing::warn!(resource = %key, %reason, "Exporting without resource");
            omitted.push(OmittedResource {
                resource: key.clone(),
                reason,
            });
        }

        let background = scene
            .background
            .image
            .as_ref()
            .and_then(|key| self.cache.image(key));
        let fonts = Arc::clone(&self.fonts);
        let bitmap = tokio::task::spawn_blocking(move || {
            raster::rasterize(&scene, scale_factor, &fonts, background.as_deref())
        })
        .await
        .map_err(|e| ExportError::Raster(e.to_string()))?;

        tracing::info!(
            width = bitmap.width(),
            height = bitmap.height(),
            scale = scale_factor,
            omitted = omitted.len(),
            "Scene rasterized"
        );

        Ok(ExportArtifact {
            bitmap,
            suggested_filename: self.settings.filename.clone(),
            scale: scale_factor,
            omitted,
        })
    }

    fn check_scale(&self, scale_factor: f64) -> Result<(), ExportError> {
        if scale_factor.is_finite()
            && scale_factor > 0.0
            && scale_factor <= self.settings.max_scale_factor
        {
            Ok(())
        } else {
            Err(ExportError::InvalidScale(scale_factor))
        }
    }
}

fn displayed(target: &dyn SnapshotSource) -> Result<LiveScene, ExportError> {
    match target.snapshot() {
        Some(scene) if !scene.container.is_empty() => Ok(scene),
        _ => Err(ExportError::NotReady),
    }
}
