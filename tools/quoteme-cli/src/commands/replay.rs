//! Replay a recorded drag against a style, then export.

use std::path::PathBuf;

use anyhow::Context;
use quoteme_common::config::AppConfig;
use quoteme_scene_model::event::parse_events;

use super::{export_session, load_style, open_session};
use crate::RenderArgs;

pub async fn run(
    config: &AppConfig,
    style_path: PathBuf,
    events_path: PathBuf,
    no_export: bool,
    args: RenderArgs,
) -> anyhow::Result<()> {
    let style = load_style(&style_path, &args)?;
    let jsonl = std::fs::read_to_string(&events_path)
        .with_context(|| format!("Failed to read events {}", events_path.display()))?;
    let events = parse_events(&jsonl)
        .with_context(|| format!("Invalid event recording {}", events_path.display()))?;

    let mut session = open_session(config, &args);
    session.set_style(style);

    let summary = session.replay(&events);
    let position = session.position();
    println!(
        "Replayed {} events ({} drags, {} moves, {} ignored)",
        summary.events, summary.started, summary.moved, summary.ignored
    );
    println!("Final offset: ({}, {})", position.x, position.y);

    if !no_export {
        export_session(&mut session, &args).await?;
    }
    Ok(())
}
