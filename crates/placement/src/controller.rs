//! Drag state machine over raw input events.
//!
//! `Idle -> Dragging -> Idle`. Events are consumed in arrival order; the
//! controller turns them into offset updates for the shell to commit.

use std::sync::Arc;

use quoteme_scene_model::event::{EventKind, InputEvent, PointerId, PointerPhase, TouchPoint};
use quoteme_scene_model::geometry::{Rect, Vec2};

use crate::engine::{DragSession, InputDevice, PlacementEngine};
use crate::listener::ListenerHub;

/// Live layout queries answered by whatever renders the overlay.
pub trait LayoutProbe {
    /// Client-space bounds of the overlay, or `None` when it is not mounted.
    fn overlay_bounds(&self) -> Option<Rect>;

    /// Client-space bounds of the container.
    fn container_bounds(&self) -> Rect;
}

/// Coarse controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging,
}

/// Result of feeding one event to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragUpdate {
    /// A session began; the offset is unchanged until the first move.
    Started(DragSession),
    /// New overlay offset to commit.
    Moved(Vec2),
    /// The session ended.
    Ended,
    /// Nothing to do.
    Ignored,
}

/// Feeds pointer and touch events through a [`PlacementEngine`].
#[derive(Debug)]
pub struct DragController {
    engine: PlacementEngine,
}

impl DragController {
    pub fn new(hub: Arc<dyn ListenerHub>) -> Self {
        Self {
            engine: PlacementEngine::new(hub),
        }
    }

    pub fn state(&self) -> DragState {
        if self.engine.is_dragging() {
            DragState::Dragging
        } else {
            DragState::Idle
        }
    }

    pub fn engine(&self) -> &PlacementEngine {
        &self.engine
    }

    /// Apply one event.
    pub fn handle(&mut self, event: &InputEvent, probe: &dyn LayoutProbe) -> DragUpdate {
        if self.engine.is_dragging() && probe.overlay_bounds().is_none() {
            tracing::debug!("Overlay unmounted mid-drag");
            self.engine.overlay_unmounted();
            return DragUpdate::Ended;
        }

        match &event.kind {
            EventKind::Mouse {
                pointer_id,
                phase,
                x,
                y,
            } => self.handle_pointer(*pointer_id, *phase, Vec2::new(*x, *y), probe),
            EventKind::Touch { phase, touches } => self.handle_touch(*phase, touches, probe),
            EventKind::Leave { pointer_id } => {
                if self.owns(*pointer_id, InputDevice::Mouse) {
                    self.end()
                } else {
                    DragUpdate::Ignored
                }
            }
        }
    }

    /// End any active drag, e.g. when the overlay is torn down.
    pub fn cancel(&mut self) -> bool {
        self.engine.end_drag()
    }

    fn handle_pointer(
        &mut self,
        pointer_id: PointerId,
        phase: PointerPhase,
        pos: Vec2,
        probe: &dyn LayoutProbe,
    ) -> DragUpdate {
        match phase {
            PointerPhase::Down => self.start(pointer_id, InputDevice::Mouse, pos, probe),
            PointerPhase::Move => {
                if !self.owns(pointer_id, InputDevice::Mouse) {
                    return DragUpdate::Ignored;
                }
                self.engine
                    .continue_drag(pointer_id, pos, probe.container_bounds())
                    .map_or(DragUpdate::Ignored, DragUpdate::Moved)
            }
            PointerPhase::Up | PointerPhase::Cancel => {
                if self.owns(pointer_id, InputDevice::Mouse) {
                    self.end()
                } else {
                    DragUpdate::Ignored
                }
            }
        }
    }

    fn handle_touch(
        &mut self,
        phase: PointerPhase,
        touches: &[TouchPoint],
        probe: &dyn LayoutProbe,
    ) -> DragUpdate {
        let owner = self
            .engine
            .session()
            .filter(|session| session.device == InputDevice::Touch)
            .map(|session| session.pointer_id);

        match (phase, owner) {
            (PointerPhase::Down, None) => match touches.first() {
                Some(primary) => {
                    self.start(primary.id, InputDevice::Touch, primary.position(), probe)
                }
                None => DragUpdate::Ignored,
            },
            (PointerPhase::Move, Some(owner)) => {
                match touches.iter().find(|touch| touch.id == owner) {
                    Some(touch) => self
                        .engine
                        .continue_drag(owner, touch.position(), probe.container_bounds())
                        .map_or(DragUpdate::Ignored, DragUpdate::Moved),
                    None => self.end(),
                }
            }
            (PointerPhase::Up | PointerPhase::Cancel, Some(owner)) => {
                if touches.iter().any(|touch| touch.id == owner) {
                    DragUpdate::Ignored
                } else {
                    self.end()
                }
            }
            _ => DragUpdate::Ignored,
        }
    }

    fn start(
        &mut self,
        pointer_id: PointerId,
        device: InputDevice,
        pos: Vec2,
        probe: &dyn LayoutProbe,
    ) -> DragUpdate {
        let overlay = probe.overlay_bounds().filter(|bounds| bounds.contains(pos));
        match self.engine.begin_drag(pointer_id, device, pos, overlay) {
            Some(session) => DragUpdate::Started(session),
            None => DragUpdate::Ignored,
        }
    }

    fn end(&mut self) -> DragUpdate {
        if self.engine.end_drag() {
            DragUpdate::Ended
        } else {
            DragUpdate::Ignored
        }
    }

    fn owns(&self, pointer_id: PointerId, device: InputDevice) -> bool {
        self.engine
            .session()
            .is_some_and(|session| session.pointer_id == pointer_id && session.device == device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{DocumentListeners, ListenerScope};

    struct FixedLayout {
        container: Rect,
        overlay: Option<Rect>,
    }

    impl LayoutProbe for FixedLayout {
        fn overlay_bounds(&self) -> Option<Rect> {
            self.overlay
        }

        fn container_bounds(&self) -> Rect {
            self.container
        }
    }

    fn layout() -> FixedLayout {
        FixedLayout {
            container: Rect::new(10.0, 20.0, 400.0, 500.0),
            overlay: Some(Rect::new(10.0, 20.0, 120.0, 40.0)),
        }
    }

    fn touch(id: PointerId, x: f64, y: f64) -> TouchPoint {
        TouchPoint { id, x, y }
    }

    #[test]
    fn test_mouse_drag_cycle() {
        let hub = DocumentListeners::shared();
        let mut controller = DragController::new(hub.clone());
        let probe = layout();

        let started = controller.handle(&InputEvent::mouse(0, PointerPhase::Down, 40.0, 40.0), &probe);
        assert!(matches!(started, DragUpdate::Started(s) if s.grab_offset == Vec2::new(30.0, 20.0)));
        assert_eq!(controller.state(), DragState::Dragging);

        let moved = controller.handle(&InputEvent::mouse(1, PointerPhase::Move, 70.0, 30.0), &probe);
        assert_eq!(moved, DragUpdate::Moved(Vec2::new(30.0, -10.0)));

        let ended = controller.handle(&InputEvent::mouse(2, PointerPhase::Up, 70.0, 30.0), &probe);
        assert_eq!(ended, DragUpdate::Ended);
        assert_eq!(controller.state(), DragState::Idle);
        assert_eq!(hub.added(), hub.removed());
    }

    #[test]
    fn test_down_outside_overlay_is_ignored() {
        let hub = DocumentListeners::shared();
        let mut controller = DragController::new(hub.clone());
        let update =
            controller.handle(&InputEvent::mouse(0, PointerPhase::Down, 300.0, 300.0), &layout());
        assert_eq!(update, DragUpdate::Ignored);
        assert_eq!(hub.added(), 0);
    }

    #[test]
    fn test_moves_while_idle_are_ignored() {
        let mut controller = DragController::new(DocumentListeners::shared());
        let update =
            controller.handle(&InputEvent::mouse(0, PointerPhase::Move, 40.0, 40.0), &layout());
        assert_eq!(update, DragUpdate::Ignored);
        let update = controller.handle(&InputEvent::leave(1), &layout());
        assert_eq!(update, DragUpdate::Ignored);
    }

    #[test]
    fn test_leave_ends_mouse_drag() {
        let hub = DocumentListeners::shared();
        let mut controller = DragController::new(hub.clone());
        let probe = layout();
        controller.handle(&InputEvent::mouse(0, PointerPhase::Down, 40.0, 40.0), &probe);
        assert_eq!(hub.active_in(ListenerScope::Document).len(), 3);

        assert_eq!(controller.handle(&InputEvent::leave(5), &probe), DragUpdate::Ended);
        assert_eq!(hub.active_count(), 0);
    }

    #[test]
    fn test_mouse_cancel_ends_drag() {
        let hub = DocumentListeners::shared();
        let mut controller = DragController::new(hub.clone());
        let probe = layout();
        controller.handle(&InputEvent::mouse(0, PointerPhase::Down, 40.0, 40.0), &probe);
        controller.handle(&InputEvent::mouse(1, PointerPhase::Move, 50.0, 45.0), &probe);

        let update = controller.handle(&InputEvent::mouse(2, PointerPhase::Cancel, 50.0, 45.0), &probe);
        assert_eq!(update, DragUpdate::Ended);
        assert_eq!(controller.state(), DragState::Idle);
        assert_eq!(hub.active_count(), 0);
        assert_eq!(hub.added(), hub.removed());

        // A second cancel has nothing to end.
        let update = controller.handle(&InputEvent::mouse(3, PointerPhase::Cancel, 50.0, 45.0), &probe);
        assert_eq!(update, DragUpdate::Ignored);
    }

    #[test]
    fn test_touch_move_without_owner_ends_drag() {
        let hub = DocumentListeners::shared();
        let mut controller = DragController::new(hub.clone());
        let probe = layout();
        controller.handle(
            &InputEvent::touch(0, PointerPhase::Down, vec![touch(7, 20.0, 30.0)]),
            &probe,
        );
        assert_eq!(controller.state(), DragState::Dragging);

        let stray = InputEvent::touch(1, PointerPhase::Move, vec![touch(8, 60.0, 60.0)]);
        assert_eq!(controller.handle(&stray, &probe), DragUpdate::Ended);
        assert_eq!(controller.state(), DragState::Idle);
        assert_eq!(hub.active_count(), 0);

        // The lost contact coming back does not resume the drag.
        let resumed = InputEvent::touch(2, PointerPhase::Move, vec![touch(7, 25.0, 35.0)]);
        assert_eq!(controller.handle(&resumed, &probe), DragUpdate::Ignored);
    }

    #[test]
    fn test_touch_uses_first_contact_and_ignores_others() {
        let hub = DocumentListeners::shared();
        let mut controller = DragController::new(hub.clone());
        let probe = layout();

        let down = InputEvent::touch(0, PointerPhase::Down, vec![touch(4, 20.0, 30.0)]);
        assert!(matches!(controller.handle(&down, &probe), DragUpdate::Started(_)));

        // A second finger lands; the first keeps the session.
        let second = InputEvent::touch(
            1,
            PointerPhase::Down,
            vec![touch(4, 20.0, 30.0), touch(9, 50.0, 50.0)],
        );
        assert_eq!(controller.handle(&second, &probe), DragUpdate::Ignored);

        let moved = InputEvent::touch(
            2,
            PointerPhase::Move,
            vec![touch(9, 200.0, 200.0), touch(4, 25.0, 35.0)],
        );
        assert_eq!(
            controller.handle(&moved, &probe),
            DragUpdate::Moved(Vec2::new(5.0, 5.0))
        );

        // Second finger lifts, owner still down.
        let lift_other = InputEvent::touch(3, PointerPhase::Up, vec![touch(4, 25.0, 35.0)]);
        assert_eq!(controller.handle(&lift_other, &probe), DragUpdate::Ignored);
        assert_eq!(controller.state(), DragState::Dragging);

        let lift_owner = InputEvent::touch(4, PointerPhase::Up, vec![]);
        assert_eq!(controller.handle(&lift_owner, &probe), DragUpdate::Ended);
        assert_eq!(hub.added(), 3);
        assert_eq!(hub.removed(), 3);
    }

    #[test]
    fn test_mouse_cannot_interrupt_touch_drag() {
        let mut controller = DragController::new(DocumentListeners::shared());
        let probe = layout();
        controller.handle(
            &InputEvent::touch(0, PointerPhase::Down, vec![touch(0, 20.0, 30.0)]),
            &probe,
        );
        let update = controller.handle(&InputEvent::mouse(1, PointerPhase::Up, 20.0, 30.0), &probe);
        assert_eq!(update, DragUpdate::Ignored);
        assert_eq!(controller.state(), DragState::Dragging);
    }

    #[test]
    fn test_overlay_vanishing_ends_drag() {
        let hub = DocumentListeners::shared();
        let mut controller = DragController::new(hub.clone());
        let mut probe = layout();
        controller.handle(&InputEvent::mouse(0, PointerPhase::Down, 40.0, 40.0), &probe);

        probe.overlay = None;
        let update = controller.handle(&InputEvent::mouse(1, PointerPhase::Move, 50.0, 50.0), &probe);
        assert_eq!(update, DragUpdate::Ended);
        assert_eq!(hub.active_count(), 0);
        assert!(!controller.cancel());
    }
}
