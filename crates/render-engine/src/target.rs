//! In-process render target: the "mounted container" that displays a scene.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use quoteme_scene_model::geometry::{Rect, Vec2};
use quoteme_scene_model::style::StyleState;

use crate::compositor::{render, LiveScene, SnapshotSource};
use crate::fonts::FontRegistry;
use crate::resources::ResourceCache;

#[derive(Debug, Default)]
struct TargetState {
    /// Client-space bounds; `None` while unmounted.
    bounds: Option<Rect>,
    style: StyleState,
    offset: Vec2,
    scene: Option<LiveScene>,
}

/// Holds the last presented inputs and the scene rendered from them.
///
/// Every `present` re-renders the whole scene. Presenting a style with a
/// background image starts loading that image; switching away from a
/// background evicts it from the cache.
#[derive(Debug)]
pub struct RenderTarget {
    fonts: Arc<FontRegistry>,
    cache: Arc<ResourceCache>,
    state: RwLock<TargetState>,
}

impl RenderTarget {
    pub fn new(fonts: Arc<FontRegistry>, cache: Arc<ResourceCache>) -> Self {
        Self {
            fonts,
            cache,
            state: RwLock::new(TargetState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TargetState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TargetState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach at `bounds` (or move/resize) and render.
    pub fn mount(&self, bounds: Rect) -> LiveScene {
        let mut state = self.write();
        state.bounds = Some(bounds);
        tracing::debug!(
            x = bounds.x,
            y = bounds.y,
            width = bounds.width,
            height = bounds.height,
            "Render target mounted"
        );
        self.rerender(&mut state)
    }

    /// Detach. The presented inputs are kept for a later mount.
    pub fn unmount(&self) {
        let mut state = self.write();
        state.bounds = None;
        state.scene = None;
        tracing::debug!("Render target unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.read().bounds.is_some()
    }

    /// Display `style` with the overlay at `offset`.
    ///
    /// Returns the new scene, or `None` while unmounted.
    pub fn present(&self, style: &StyleState, offset: Vec2) -> Option<LiveScene> {
        let next = style.background.image.as_ref().map(|source| self.cache.request_image(source));
        let mut state = self.write();
        if let Some(previous) = state.style.background.image.as_ref().map(|source| source.key()) {
            if next.as_ref() != Some(&previous) {
                self.cache.evict(&previous);
            }
        }
        state.style = style.clone();
        state.offset = offset;
        state.bounds?;
        Some(self.rerender(&mut state))
    }

    /// Move the overlay without touching the style.
    pub fn present_offset(&self, offset: Vec2) -> Option<LiveScene> {
        let mut state = self.write();
        state.offset = offset;
        state.bounds?;
        Some(self.rerender(&mut state))
    }

    fn rerender(&self, state: &mut TargetState) -> LiveScene {
        let size = state.bounds.map(|b| b.size()).unwrap_or_default();
        let scene = render(size, &state.style, state.offset, &self.fonts);
        state.scene = Some(scene.clone());
        scene
    }

    /// The displayed scene.
    pub fn scene(&self) -> Option<LiveScene> {
        self.read().scene.clone()
    }

    /// Last presented style.
    pub fn style(&self) -> StyleState {
        self.read().style.clone()
    }

    /// Last presented overlay offset.
    pub fn offset(&self) -> Vec2 {
        self.read().offset
    }

    /// Client-space container bounds.
    pub fn container_bounds(&self) -> Option<Rect> {
        self.read().bounds
    }

    /// Client-space overlay bounds, when an overlay is displayed.
    pub fn overlay_bounds(&self) -> Option<Rect> {
        let state = self.read();
        let origin = state.bounds?.top_left();
        let overlay = state.scene.as_ref()?.overlay.as_ref()?;
        Some(overlay.bounds().translate(origin))
    }
}

impl SnapshotSource for RenderTarget {
    fn snapshot(&self) -> Option<LiveScene> {
        let state = self.read();
        state.bounds?;
        state.scene.clone()
    }

    fn refresh(&self) {
        let mut state = self.write();
        if state.bounds.is_some() {
            self.rerender(&mut state);
        }
    }
}
