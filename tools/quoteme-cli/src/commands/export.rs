//! Render a style file and export it.

use std::path::PathBuf;

use quoteme_common::config::AppConfig;

use super::{export_session, load_style, open_session};
use crate::RenderArgs;

pub async fn run(config: &AppConfig, style_path: PathBuf, args: RenderArgs) -> anyhow::Result<()> {
    let style = load_style(&style_path, &args)?;
    let mut session = open_session(config, &args);
    session.set_style(style);

    export_session(&mut session, &args).await?;
    Ok(())
}
