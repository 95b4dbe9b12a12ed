//! Input that arrives while an export is waiting on resources.

use std::sync::Arc;
use std::time::Duration;

use quoteme_render_engine::raster::rasterize;
use quoteme_render_engine::{
    CompositorSettings, FontRegistry, MemorySink, RenderTarget, ResourceCache,
};
use quoteme_scene_model::color::ColorToken;
use quoteme_scene_model::event::{InputEvent, PointerPhase};
use quoteme_scene_model::geometry::{Rect, Vec2};
use quoteme_scene_model::style::{ImageSource, StyleState};
use quoteme_session::{Session, SessionConfig};

fn settings(timeout_ms: u64) -> CompositorSettings {
    CompositorSettings {
        default_scale: 1.0,
        resource_timeout: Duration::from_millis(timeout_ms),
        ..CompositorSettings::default()
    }
}

fn quote_on_red() -> StyleState {
    let mut style = StyleState::with_quote("Hold still");
    style.background.color = ColorToken::RED;
    style
}

#[tokio::test]
async fn input_during_export_is_applied_afterwards_in_order() {
    let fonts = FontRegistry::shared();
    let cache = ResourceCache::shared();
    let config = SessionConfig {
        container: Rect::new(0.0, 0.0, 200.0, 120.0),
        compositor: settings(200),
    };
    let mut session =
        Session::with_resources(config, fonts.clone(), cache.clone(), MemorySink::new());

    // A background that never finishes loading keeps the export waiting.
    let source = ImageSource::from_path("/nonexistent/slow-background.png");
    cache.insert_pending(&source.key());
    let mut style = quote_on_red();
    style.background.image = Some(source);
    session.set_style(style.clone());

    session.replay(&[
        InputEvent::mouse(0, PointerPhase::Down, 10.0, 10.0),
        InputEvent::mouse(1, PointerPhase::Move, 40.0, 0.0),
    ]);
    assert_eq!(session.position(), Vec2::new(30.0, -10.0));

    let sender = session.input_sender();
    let producer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        sender.send(InputEvent::mouse(2, PointerPhase::Move, 70.0, 20.0));
        sender.send(InputEvent::mouse(3, PointerPhase::Move, 90.0, 30.0));
        sender.send(InputEvent::mouse(4, PointerPhase::Up, 90.0, 30.0));
    });

    let receipt = session.export().await.unwrap();
    producer.await.unwrap();

    assert_eq!(receipt.omitted.len(), 1);
    assert_eq!(session.position(), Vec2::new(80.0, 20.0));
    assert_eq!(session.listeners().active_count(), 0);

    // The export shows the overlay where it was when the export started.
    let reference = RenderTarget::new(fonts.clone(), Arc::new(ResourceCache::new()));
    reference.mount(Rect::new(0.0, 0.0, 200.0, 120.0));
    let scene = reference
        .present(&quote_on_red(), Vec2::new(30.0, -10.0))
        .unwrap();
    let expected = rasterize(&scene, 1.0, &fonts, None);
    let delivered = session.exporter().sink().delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].bitmap, expected);
}

#[tokio::test]
async fn queued_input_before_export_is_applied_first() {
    let mut session = Session::new(
        SessionConfig {
            container: Rect::new(0.0, 0.0, 200.0, 120.0),
            compositor: settings(100),
        },
        MemorySink::new(),
    );
    session.set_style(quote_on_red());

    let sender = session.input_sender();
    sender.send(InputEvent::mouse(0, PointerPhase::Down, 5.0, 5.0));
    sender.send(InputEvent::mouse(1, PointerPhase::Move, 25.0, 15.0));
    sender.send(InputEvent::mouse(2, PointerPhase::Up, 25.0, 15.0));

    let receipt = session.export().await.unwrap();
    assert_eq!((receipt.width, receipt.height), (200, 120));
    assert_eq!(session.position(), Vec2::new(20.0, 10.0));
    let overlay = session.scene().unwrap().overlay.unwrap();
    assert_eq!(overlay.offset, Vec2::new(20.0, 10.0));
}
