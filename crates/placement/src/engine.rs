//! Drag sessions and overlay offset math.
//!
//! All positions are client-space logical pixels. The overlay offset is
//! container-local: `offset = pointer - container.top_left - grab_offset`,
//! where `grab_offset` is where inside the overlay the pointer grabbed it.

use std::sync::Arc;

use quoteme_scene_model::event::PointerId;
use quoteme_scene_model::geometry::{Rect, Vec2};

use crate::listener::{ListenerGuard, ListenerHub, ListenerKind, ListenerScope};

/// Which kind of device owns a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputDevice {
    Mouse,
    Touch,
}

impl InputDevice {
    /// Document listeners a drag from this device needs.
    pub fn drag_listeners(&self) -> &'static [ListenerKind] {
        match self {
            InputDevice::Mouse => &[
                ListenerKind::PointerMove,
                ListenerKind::PointerUp,
                ListenerKind::PointerLeave,
            ],
            InputDevice::Touch => &[
                ListenerKind::TouchMove,
                ListenerKind::TouchEnd,
                ListenerKind::TouchCancel,
            ],
        }
    }
}

/// One drag interaction.
///
/// `grab_offset` is captured at drag start and never recomputed, so
/// style changes mid-drag (a longer quote, a bigger font) do not make the
/// overlay jump under the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub active: bool,
    pub grab_offset: Vec2,
    pub pointer_id: PointerId,
    pub device: InputDevice,
}

impl DragSession {
    /// Start a session for a pointer pressed at `pointer_pos` on an overlay
    /// currently occupying `overlay_bounds`.
    pub fn begin(
        pointer_id: PointerId,
        device: InputDevice,
        pointer_pos: Vec2,
        overlay_bounds: Rect,
    ) -> Self {
        Self {
            active: true,
            grab_offset: pointer_pos - overlay_bounds.top_left(),
            pointer_id,
            device,
        }
    }

    /// Overlay offset for the pointer at `pointer_pos`.
    ///
    /// Not clamped to the container. Returns `None` once the session ended.
    pub fn continue_drag(&self, pointer_pos: Vec2, container_bounds: Rect) -> Option<Vec2> {
        if !self.active {
            return None;
        }
        Some(pointer_pos - container_bounds.top_left() - self.grab_offset)
    }

    /// Invalidate the session. Idempotent.
    pub fn end(&mut self) {
        self.active = false;
    }
}

struct ActiveDrag {
    session: DragSession,
    listeners: ListenerGuard,
}

/// Owns the single drag session an overlay may have.
pub struct PlacementEngine {
    hub: Arc<dyn ListenerHub>,
    active: Option<ActiveDrag>,
}

impl PlacementEngine {
    /// Create an engine that registers drag listeners on `hub`.
    pub fn new(hub: Arc<dyn ListenerHub>) -> Self {
        Self { hub, active: None }
    }

    /// Begin dragging.
    ///
    /// Returns `None` without side effects when no overlay is mounted
    /// (`overlay_bounds` is `None`), when the position is not finite, or
    /// when another pointer already owns the session.
    pub fn begin_drag(
        &mut self,
        pointer_id: PointerId,
        device: InputDevice,
        pointer_pos: Vec2,
        overlay_bounds: Option<Rect>,
    ) -> Option<DragSession> {
        if let Some(active) = &self.active {
            tracing::trace!(
                owner = active.session.pointer_id,
                pointer_id,
                "Drag already owned, ignoring"
            );
            return None;
        }
        let Some(overlay_bounds) = overlay_bounds else {
            tracing::trace!(pointer_id, "No overlay mounted, ignoring drag start");
            return None;
        };
        if !pointer_pos.is_finite() {
            return None;
        }

        let session = DragSession::begin(pointer_id, device, pointer_pos, overlay_bounds);
        let listeners = ListenerGuard::acquire(
            self.hub.clone(),
            ListenerScope::Document,
            device.drag_listeners(),
        );
        tracing::debug!(
            pointer_id,
            ?device,
            grab_x = session.grab_offset.x,
            grab_y = session.grab_offset.y,
            "Drag started"
        );
        self.active = Some(ActiveDrag { session, listeners });
        Some(session)
    }

    /// New overlay offset for a move of the owning pointer.
    ///
    /// Returns `None` when idle, for non-owning pointers, or for a
    /// non-finite position.
    pub fn continue_drag(
        &self,
        pointer_id: PointerId,
        pointer_pos: Vec2,
        container_bounds: Rect,
    ) -> Option<Vec2> {
        let active = self.active.as_ref()?;
        if active.session.pointer_id != pointer_id || !pointer_pos.is_finite() {
            return None;
        }
        active.session.continue_drag(pointer_pos, container_bounds)
    }

    /// End the current session, releasing its listeners.
    ///
    /// Returns whether a session was actually ended; calling it again is a
    /// no-op.
    pub fn end_drag(&mut self) -> bool {
        match self.active.take() {
            Some(mut active) => {
                active.session.end();
                active.listeners.release();
                tracing::debug!(pointer_id = active.session.pointer_id, "Drag ended");
                true
            }
            None => false,
        }
    }

    /// The overlay left the tree; any drag on it is over.
    pub fn overlay_unmounted(&mut self) -> bool {
        self.end_drag()
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&DragSession> {
        self.active.as_ref().map(|active| &active.session)
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }
}

impl std::fmt::Debug for PlacementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementEngine")
            .field("session", &self.session())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::DocumentListeners;

    fn container() -> Rect {
        Rect::new(100.0, 50.0, 400.0, 500.0)
    }

    #[test]
    fn test_identity_without_movement() {
        let offset = Vec2::new(20.0, 30.0);
        let overlay = Rect::from_origin_size(container().top_left() + offset, Default::default());
        let p0 = Vec2::new(135.0, 95.0);

        let session = DragSession::begin(0, InputDevice::Mouse, p0, overlay);
        assert_eq!(session.grab_offset, Vec2::new(15.0, 15.0));
        assert_eq!(session.continue_drag(p0, container()), Some(offset));
    }

    #[test]
    fn test_no_clamp_outside_container() {
        let overlay = Rect::new(100.0, 50.0, 80.0, 40.0);
        let session = DragSession::begin(0, InputDevice::Mouse, Vec2::new(110.0, 60.0), overlay);

        let left_of = session
            .continue_drag(Vec2::new(0.0, 0.0), container())
            .unwrap();
        assert_eq!(left_of, Vec2::new(-110.0, -60.0));

        let beyond = session
            .continue_drag(Vec2::new(900.0, 900.0), container())
            .unwrap();
        assert!(beyond.x > container().width);
        assert!(beyond.y > container().height);
    }

    #[test]
    fn test_ended_session_yields_nothing() {
        let mut session =
            DragSession::begin(0, InputDevice::Touch, Vec2::ZERO, Rect::new(0.0, 0.0, 1.0, 1.0));
        session.end();
        session.end();
        assert!(!session.active);
        assert_eq!(session.continue_drag(Vec2::ZERO, container()), None);
    }

    #[test]
    fn test_engine_lifecycle_registers_document_listeners() {
        let hub = DocumentListeners::shared();
        let mut engine = PlacementEngine::new(hub.clone());

        let overlay = Some(Rect::new(120.0, 70.0, 50.0, 20.0));
        let session = engine
            .begin_drag(7, InputDevice::Mouse, Vec2::new(130.0, 75.0), overlay)
            .unwrap();
        assert_eq!(session.grab_offset, Vec2::new(10.0, 5.0));
        assert_eq!(hub.active_in(ListenerScope::Document).len(), 3);
        assert!(hub.active_in(ListenerScope::Overlay).is_empty());

        let moved = engine
            .continue_drag(7, Vec2::new(160.0, 65.0), container())
            .unwrap();
        assert_eq!(moved, Vec2::new(50.0, 10.0));
        assert_eq!(engine.continue_drag(8, Vec2::new(160.0, 65.0), container()), None);

        assert!(engine.end_drag());
        assert!(!engine.end_drag());
        assert_eq!(hub.active_count(), 0);
        assert_eq!(hub.removed(), 3);
        assert_eq!(hub.stale_removals(), 0);
    }

    #[test]
    fn test_begin_without_overlay_is_noop() {
        let hub = DocumentListeners::shared();
        let mut engine = PlacementEngine::new(hub.clone());
        assert!(engine
            .begin_drag(0, InputDevice::Mouse, Vec2::new(1.0, 1.0), None)
            .is_none());
        assert!(!engine.is_dragging());
        assert_eq!(hub.added(), 0);
    }

    #[test]
    fn test_second_pointer_cannot_steal_session() {
        let hub = DocumentListeners::shared();
        let mut engine = PlacementEngine::new(hub.clone());
        let overlay = Some(Rect::new(0.0, 0.0, 100.0, 100.0));

        engine
            .begin_drag(1, InputDevice::Touch, Vec2::new(10.0, 10.0), overlay)
            .unwrap();
        assert!(engine
            .begin_drag(2, InputDevice::Touch, Vec2::new(50.0, 50.0), overlay)
            .is_none());
        assert_eq!(engine.session().unwrap().pointer_id, 1);
        assert_eq!(hub.added(), 3);
    }

    #[test]
    fn test_drop_releases_listeners() {
        let hub = DocumentListeners::shared();
        {
            let mut engine = PlacementEngine::new(hub.clone());
            engine
                .begin_drag(0, InputDevice::Mouse, Vec2::ZERO, Some(Rect::new(0.0, 0.0, 5.0, 5.0)))
                .unwrap();
            assert_eq!(hub.active_count(), 3);
        }
        assert_eq!(hub.active_count(), 0);
        assert_eq!(hub.removed(), 3);
    }

    #[test]
    fn test_unmount_ends_drag() {
        let hub = DocumentListeners::shared();
        let mut engine = PlacementEngine::new(hub.clone());
        engine
            .begin_drag(0, InputDevice::Mouse, Vec2::ZERO, Some(Rect::new(0.0, 0.0, 5.0, 5.0)))
            .unwrap();
        assert!(engine.overlay_unmounted());
        assert!(engine.session().is_none());
        assert!(!engine.end_drag());
        assert_eq!(hub.removed(), 3);
    }
}
