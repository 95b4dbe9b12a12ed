//! Write a starter style file.

use std::path::PathBuf;

use anyhow::Context;
use quoteme_scene_model::style::StyleState;

pub fn run(path: PathBuf, quote: String, author: String, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let mut style = StyleState::with_quote(quote);
    style.author = author;
    style.validate()?;

    let json = serde_json::to_string_pretty(&style)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created style file {}", path.display());
    println!("  Quote: {}", style.quote);
    if let Some(line) = style.author_line() {
        println!("  Author: {line}");
    }
    println!();
    println!("Next: quoteme export {}", path.display());

    Ok(())
}
