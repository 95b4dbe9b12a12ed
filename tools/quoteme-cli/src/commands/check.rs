//! Show available fonts and the effective configuration.

use std::path::Path;
use std::time::Duration;

use quoteme_common::config::{config_file_path, AppConfig};
use quoteme_render_engine::{FontRegistry, ResourceCache};

pub async fn run(config: &AppConfig, config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("QuoteMe Check");
    println!("{}", "=".repeat(50));

    let path = config_path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    if path.exists() {
        println!("[OK] Config file: {}", path.display());
    } else {
        println!("[--] Config file: {} (not found, using defaults)", path.display());
    }

    let fonts = FontRegistry::shared();
    let cache = ResourceCache::shared();
    let keys = fonts.load_configured(&cache, &config.fonts);
    let timeout = Duration::from_millis(config.export.resource_timeout_ms);
    let readiness = cache.wait_settled(&keys, timeout).await;

    println!();
    println!("Font files from config: {}", config.fonts.len());
    for (entry, key) in config.fonts.iter().zip(&keys) {
        match readiness.failure(key) {
            None => println!("  [OK] {} ({}) {}", entry.family, entry.weight, entry.path.display()),
            Some(reason) => println!(
                "  [FAIL] {} ({}) {}: {reason}",
                entry.family,
                entry.weight,
                entry.path.display()
            ),
        }
    }

    println!();
    println!("Font families:");
    for (family, weights) in fonts.families() {
        let weights: Vec<&str> = weights.iter().map(|w| w.keyword()).collect();
        println!("  {family}: {}", weights.join(", "));
    }
    println!("  (sans-serif, serif and monospace map to the DejaVu faces)");

    println!();
    println!("Effective configuration:");
    println!("{}", serde_json::to_string_pretty(config)?);

    println!();
    if readiness.all_ready() {
        println!("All fonts loaded. QuoteMe is ready.");
    } else {
        println!("Some font files failed to load; styles using them fall back to DejaVu Sans.");
    }

    Ok(())
}
