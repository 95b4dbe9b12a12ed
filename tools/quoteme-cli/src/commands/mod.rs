pub mod check;
pub mod export;
pub mod init;
pub mod replay;

use std::path::Path;

use anyhow::Context;
use quoteme_common::config::AppConfig;
use quoteme_render_engine::{ExportReceipt, FileSink};
use quoteme_scene_model::color::ColorToken;
use quoteme_scene_model::style::{ImageSource, StyleState};
use quoteme_session::Session;

use crate::RenderArgs;

/// Read a style file and apply command-line overrides.
pub fn load_style(path: &Path, args: &RenderArgs) -> anyhow::Result<StyleState> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read style file {}", path.display()))?;
    let mut style = StyleState::from_json(&json)
        .with_context(|| format!("Invalid style file {}", path.display()))?;

    if let Some(background) = &args.background {
        anyhow::ensure!(
            background.exists(),
            "Background image not found: {}",
            background.display()
        );
        style.background.image = Some(ImageSource::from_path(background));
    }
    if let Some(color) = &args.color {
        style.background.color = color
            .parse::<ColorToken>()
            .with_context(|| format!("Invalid --color {color}"))?;
    }
    Ok(style)
}

/// Build a session writing into the configured (or overridden) directory.
pub fn open_session(config: &AppConfig, args: &RenderArgs) -> Session<FileSink> {
    let mut config = config.clone();
    if let Some(out) = &args.out {
        config.export.output_dir = out.clone();
    }
    if args.strict {
        config.export.strict_resources = true;
    }
    let sink = FileSink::new(&config.export.output_dir);
    Session::from_app_config(&config, sink)
}

/// Export the session's current scene and report where it went.
pub async fn export_session(
    session: &mut Session<FileSink>,
    args: &RenderArgs,
) -> anyhow::Result<ExportReceipt> {
    let result = match args.scale {
        Some(scale) => session.export_at(scale).await,
        None => session.export().await,
    };
    let receipt = result.context("Export failed")?;

    println!("Exported {}", receipt.location);
    println!("  Size: {}x{} (scale {})", receipt.width, receipt.height, receipt.scale);
    println!("  Bytes: {}", receipt.bytes);
    for omitted in &receipt.omitted {
        println!("  [WARN] Omitted {}: {}", omitted.resource, omitted.reason);
    }
    Ok(receipt)
}
