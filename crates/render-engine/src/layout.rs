//! Text measurement and `pre-line` wrapping.
//!
//! Explicit newlines start a new line, runs of whitespace collapse to a
//! single space, and words wrap greedily at the available width. A word
//! wider than the available width gets its own line and overflows.

use rusttype::{point, Font, Scale};

/// A laid-out line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineLayout {
    pub text: String,
    /// Advance width in pixels at the size it was measured at.
    pub width: f64,
}

/// Vertical metrics of a face at a size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Distance from the line top to the baseline.
    pub ascent: f64,
    /// Distance between consecutive baselines.
    pub line_height: f64,
}

pub fn line_metrics(font: &Font<'_>, px: f64) -> LineMetrics {
    let v = font.v_metrics(Scale::uniform(px as f32));
    LineMetrics {
        ascent: v.ascent as f64,
        line_height: (v.ascent - v.descent + v.line_gap) as f64,
    }
}

/// Advance width of `text`, kerning included.
pub fn text_width(font: &Font<'_>, px: f64, text: &str) -> f64 {
    let scale = Scale::uniform(px as f32);
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
        .map_or(0.0, f64::from)
}

/// Wrap `text` into lines no wider than `max_width` where possible.
pub fn wrap_pre_line(font: &Font<'_>, px: f64, text: &str, max_width: f64) -> Vec<LineLayout> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if text_width(font, px, &candidate) <= max_width {
                current = candidate;
            } else {
                let width = text_width(font, px, &current);
                lines.push(LineLayout {
                    text: std::mem::replace(&mut current, word.to_string()),
                    width,
                });
            }
        }
        let width = text_width(font, px, &current);
        lines.push(LineLayout {
            text: current,
            width,
        });
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontRegistry;
    use quoteme_scene_model::style::FontWeight;

    fn sans() -> std::sync::Arc<Font<'static>> {
        FontRegistry::bundled()
            .resolve("sans-serif", FontWeight::Regular)
            .unwrap()
            .font
    }

    #[test]
    fn test_width_grows_with_text() {
        let font = sans();
        let short = text_width(&font, 20.0, "Hi");
        let long = text_width(&font, 20.0, "Hi there");
        assert!(short > 0.0);
        assert!(long > short);
        assert_eq!(text_width(&font, 20.0, ""), 0.0);
    }

    #[test]
    fn test_width_scales_linearly() {
        let font = sans();
        let w1 = text_width(&font, 20.0, "Hello");
        let w2 = text_width(&font, 40.0, "Hello");
        assert!((w2 - 2.0 * w1).abs() < 0.01);
    }

    #[test]
    fn test_collapses_spaces_and_keeps_newlines() {
        let font = sans();
        let lines = wrap_pre_line(&font, 20.0, "  to   be\n\nor  not ", 10_000.0);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["to be", "", "or not"]);
        assert_eq!(lines[1].width, 0.0);
    }

    #[test]
    fn test_wraps_at_width() {
        let font = sans();
        let one_word = text_width(&font, 20.0, "alpha");
        let two_words = text_width(&font, 20.0, "alpha beta");
        let limit = (one_word + two_words) / 2.0;

        let lines = wrap_pre_line(&font, 20.0, "alpha beta delta", limit);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.width <= limit));
    }

    #[test]
    fn test_long_word_overflows_on_its_own_line() {
        let font = sans();
        let lines = wrap_pre_line(&font, 20.0, "a supercalifragilistic b", 30.0);
        assert_eq!(lines[1].text, "supercalifragilistic");
        assert!(lines[1].width > 30.0);
    }

    #[test]
    fn test_metrics_positive() {
        let metrics = line_metrics(&sans(), 20.0);
        assert!(metrics.ascent > 0.0);
        assert!(metrics.line_height > metrics.ascent);
    }
}
