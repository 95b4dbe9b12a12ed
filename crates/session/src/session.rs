//! Editor session management.

use std::sync::Arc;

use quoteme_common::config::AppConfig;
use quoteme_placement::{DocumentListeners, DragController, DragState, DragUpdate, LayoutProbe};
use quoteme_render_engine::{
    Compositor, CompositorSettings, ExportController, ExportError, ExportReceipt, FontRegistry,
    LiveScene, RenderTarget, ResourceCache, SaveSink,
};
use quoteme_scene_model::event::InputEvent;
use quoteme_scene_model::geometry::{Rect, Size, Vec2};
use quoteme_scene_model::style::{ResourceKey, StyleState};

use crate::queue::{InputQueue, InputSender};

/// Configuration for a new editor session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Client-space bounds the render target mounts at.
    pub container: Rect,

    /// Export defaults.
    pub compositor: CompositorSettings,
}

impl SessionConfig {
    /// Container at the origin with the configured canvas size.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            container: Rect::from_origin_size(
                Vec2::ZERO,
                Size::new(config.canvas.width, config.canvas.height),
            ),
            compositor: CompositorSettings::from(&config.export),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

/// Counts from [`Session::replay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub started: usize,
    pub moved: usize,
    pub ended: usize,
    pub ignored: usize,
}

impl ReplaySummary {
    fn record(&mut self, update: DragUpdate) {
        self.events += 1;
        match update {
            DragUpdate::Started(_) => self.started += 1,
            DragUpdate::Moved(_) => self.moved += 1,
            DragUpdate::Ended => self.ended += 1,
            DragUpdate::Ignored => self.ignored += 1,
        }
    }
}

/// Adapts a render target to the drag controller's hit-testing needs.
struct TargetProbe<'a>(&'a RenderTarget);

impl LayoutProbe for TargetProbe<'_> {
    fn overlay_bounds(&self) -> Option<Rect> {
        self.0.overlay_bounds()
    }

    fn container_bounds(&self) -> Rect {
        self.0.container_bounds().unwrap_or_default()
    }
}

/// One editing session: style, overlay position, input and export.
///
/// The session is the only writer of the style and the overlay position.
/// Every change is presented to the render target immediately, so the
/// displayed scene is always current when an export snapshots it.
pub struct Session<S> {
    style: StyleState,
    position: Vec2,
    listeners: Arc<DocumentListeners>,
    drag: DragController,
    target: RenderTarget,
    exporter: ExportController<S>,
    queue: InputQueue,
    font_loads: Vec<ResourceKey>,
}

impl<S: SaveSink> Session<S> {
    /// Create a session with bundled fonts and mount it.
    pub fn new(config: SessionConfig, sink: S) -> Self {
        Self::with_resources(config, FontRegistry::shared(), ResourceCache::shared(), sink)
    }

    /// Create a session from the application config, loading its font files.
    ///
    /// Font files load in the background; call this inside a tokio runtime.
    pub fn from_app_config(config: &AppConfig, sink: S) -> Self {
        let fonts = FontRegistry::shared();
        let cache = ResourceCache::shared();
        let font_loads = fonts.load_configured(&cache, &config.fonts);
        let mut session =
            Self::with_resources(SessionConfig::from_app_config(config), fonts, cache, sink);
        session.font_loads = font_loads;
        session
    }

    /// Create a session over an existing font registry and resource cache.
    pub fn with_resources(
        config: SessionConfig,
        fonts: Arc<FontRegistry>,
        cache: Arc<ResourceCache>,
        sink: S,
    ) -> Self {
        let listeners = DocumentListeners::shared();
        let target = RenderTarget::new(Arc::clone(&fonts), Arc::clone(&cache));
        let compositor = Arc::new(Compositor::new(fonts, cache, config.compositor));
        target.mount(config.container);

        Self {
            style: StyleState::default(),
            position: Vec2::ZERO,
            drag: DragController::new(listeners.clone()),
            listeners,
            target,
            exporter: ExportController::new(compositor, sink),
            queue: InputQueue::new(),
            font_loads: Vec::new(),
        }
    }

    pub fn style(&self) -> &StyleState {
        &self.style
    }

    /// Current overlay offset relative to the container.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn drag_state(&self) -> DragState {
        self.drag.state()
    }

    pub fn listeners(&self) -> &Arc<DocumentListeners> {
        &self.listeners
    }

    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    pub fn exporter(&self) -> &ExportController<S> {
        &self.exporter
    }

    /// Resource keys of config font files started by [`Session::from_app_config`].
    pub fn font_loads(&self) -> &[ResourceKey] {
        &self.font_loads
    }

    /// The displayed scene, while mounted.
    pub fn scene(&self) -> Option<LiveScene> {
        self.target.scene()
    }

    /// Handle for queueing input from outside the session.
    pub fn input_sender(&self) -> InputSender {
        self.queue.sender()
    }

    /// Replace the style and re-render.
    ///
    /// An active drag keeps its grab offset. If the new style has nothing to
    /// draw, the overlay is gone and the drag ends.
    pub fn set_style(&mut self, style: StyleState) {
        self.style = style;
        self.target.present(&self.style, self.position);
        if !self.style.has_overlay() && self.drag.cancel() {
            tracing::debug!("Overlay removed during drag");
        }
    }

    /// Mount (or move/resize) the container.
    pub fn mount(&mut self, bounds: Rect) -> LiveScene {
        self.target.present(&self.style, self.position);
        self.target.mount(bounds)
    }

    /// Unmount the container. Any drag in progress ends.
    pub fn unmount(&mut self) {
        self.drag.cancel();
        self.target.unmount();
    }

    /// Move the overlay back to the container origin.
    pub fn reset_position(&mut self) {
        self.commit_position(Vec2::ZERO);
        tracing::debug!("Overlay position reset");
    }

    fn commit_position(&mut self, offset: Vec2) {
        self.position = offset;
        self.target.present_offset(offset);
    }

    /// Apply one event now.
    pub fn handle_event(&mut self, event: &InputEvent) -> DragUpdate {
        let update = self.drag.handle(event, &TargetProbe(&self.target));
        if let DragUpdate::Moved(offset) = update {
            self.commit_position(offset);
        }
        update
    }

    /// Apply every queued event in arrival order.
    pub fn pump(&mut self) -> ReplaySummary {
        let mut summary = ReplaySummary::default();
        for event in self.queue.drain() {
            summary.record(self.handle_event(&event));
        }
        if summary.events > 0 {
            tracing::trace!(events = summary.events, "Applied queued input");
        }
        summary
    }

    /// Apply a recorded event stream in order.
    pub fn replay(&mut self, events: &[InputEvent]) -> ReplaySummary {
        let mut summary = ReplaySummary::default();
        for event in events {
            summary.record(self.handle_event(event));
        }
        tracing::info!(
            events = summary.events,
            moves = summary.moved,
            x = self.position.x,
            y = self.position.y,
            "Replayed input"
        );
        summary
    }

    /// Export the displayed scene at the configured scale.
    pub async fn export(&mut self) -> Result<ExportReceipt, ExportError> {
        let scale = self.exporter.compositor().settings().default_scale;
        self.export_at(scale).await
    }

    /// Export the displayed scene at `scale`.
    ///
    /// Input queued before the call is applied first. Input queued while the
    /// export waits is held back and applied, in order, once it finishes.
    pub async fn export_at(&mut self, scale: f64) -> Result<ExportReceipt, ExportError> {
        self.pump();
        let result = self.exporter.trigger_export_at(&self.target, scale).await;
        let applied = self.pump();
        if applied.events > 0 {
            tracing::debug!(events = applied.events, "Applied input held during export");
        }
        result
    }
}

impl<S: SaveSink> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("position", &self.position)
            .field("drag", &self.drag.state())
            .field("mounted", &self.target.is_mounted())
            .field("exporter", &self.exporter)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quoteme_render_engine::MemorySink;
    use quoteme_scene_model::event::PointerPhase;

    fn session() -> Session<MemorySink> {
        let config = SessionConfig {
            container: Rect::new(0.0, 0.0, 400.0, 500.0),
            compositor: CompositorSettings::default(),
        };
        let mut session = Session::new(config, MemorySink::new());
        session.set_style(StyleState::with_quote("Drag me"));
        session
    }

    fn mouse(t: u64, phase: PointerPhase, x: f64, y: f64) -> InputEvent {
        InputEvent::mouse(t, phase, x, y)
    }

    #[test]
    fn test_drag_commits_position() {
        let mut session = session();
        session.handle_event(&mouse(0, PointerPhase::Down, 20.0, 20.0));
        assert_eq!(session.drag_state(), DragState::Dragging);
        session.handle_event(&mouse(1, PointerPhase::Move, 50.0, 10.0));
        session.handle_event(&mouse(2, PointerPhase::Up, 50.0, 10.0));

        assert_eq!(session.position(), Vec2::new(30.0, -10.0));
        assert_eq!(session.target().offset(), Vec2::new(30.0, -10.0));
        assert_eq!(session.drag_state(), DragState::Idle);
        assert_eq!(session.listeners().active_count(), 0);
    }

    #[test]
    fn test_reset_position() {
        let mut session = session();
        session.replay(&[
            mouse(0, PointerPhase::Down, 10.0, 10.0),
            mouse(1, PointerPhase::Move, 110.0, 60.0),
            mouse(2, PointerPhase::Up, 110.0, 60.0),
        ]);
        assert_eq!(session.position(), Vec2::new(100.0, 50.0));

        session.reset_position();
        assert_eq!(session.position(), Vec2::ZERO);
        let overlay = session.scene().unwrap().overlay.unwrap();
        assert_eq!(overlay.offset, Vec2::ZERO);
    }

    #[test]
    fn test_clearing_text_ends_drag() {
        let mut session = session();
        session.handle_event(&mouse(0, PointerPhase::Down, 10.0, 10.0));
        assert_eq!(session.listeners().active_count(), 3);

        session.set_style(StyleState::default());
        assert_eq!(session.drag_state(), DragState::Idle);
        assert_eq!(session.listeners().active_count(), 0);
        assert_eq!(
            session.handle_event(&mouse(1, PointerPhase::Move, 90.0, 90.0)),
            DragUpdate::Ignored
        );
    }

    #[test]
    fn test_style_change_keeps_grab_offset() {
        let mut session = session();
        session.handle_event(&mouse(0, PointerPhase::Down, 12.0, 14.0));
        session.set_style(StyleState::with_quote("Edited mid-drag"));
        session.handle_event(&mouse(1, PointerPhase::Move, 22.0, 24.0));
        assert_eq!(session.position(), Vec2::new(10.0, 10.0));
    }

    #[test]
    fn test_unmount_ends_drag() {
        let mut session = session();
        session.handle_event(&mouse(0, PointerPhase::Down, 10.0, 10.0));
        session.unmount();
        assert_eq!(session.drag_state(), DragState::Idle);
        assert_eq!(session.listeners().active_count(), 0);
        assert!(session.scene().is_none());
    }

    #[test]
    fn test_pump_applies_in_order() {
        let mut session = session();
        let sender = session.input_sender();
        sender.send(mouse(0, PointerPhase::Down, 5.0, 5.0));
        sender.send(mouse(1, PointerPhase::Move, 15.0, 5.0));
        sender.send(mouse(2, PointerPhase::Move, 25.0, 45.0));
        sender.send(mouse(3, PointerPhase::Up, 25.0, 45.0));
        assert_eq!(session.position(), Vec2::ZERO);

        let summary = session.pump();
        assert_eq!(
            summary,
            ReplaySummary {
                events: 4,
                started: 1,
                moved: 2,
                ended: 1,
                ignored: 0
            }
        );
        assert_eq!(session.position(), Vec2::new(20.0, 40.0));
    }

    #[tokio::test]
    async fn test_export_after_drag() {
        let mut session = session();
        session.replay(&[
            mouse(0, PointerPhase::Down, 10.0, 10.0),
            mouse(1, PointerPhase::Move, 40.0, 0.0),
            mouse(2, PointerPhase::Up, 40.0, 0.0),
        ]);
        let receipt = session.export().await.unwrap();
        assert_eq!((receipt.width, receipt.height), (800, 1000));
        assert_eq!(receipt.filename, "quote-me.png");
        assert_eq!(session.exporter().sink().count(), 1);
    }

    #[tokio::test]
    async fn test_unmounted_export_is_not_ready() {
        let mut session = session();
        session.unmount();
        assert!(matches!(session.export().await, Err(ExportError::NotReady)));
        assert_eq!(session.exporter().sink().count(), 0);
    }
}
