//! CPU rasterization of a [`LiveScene`].
//!
//! Logical coordinates are multiplied by the scale factor and snapped to
//! whole device pixels. The overlay origin and each line origin are
//! snapped separately and glyphs are rasterized relative to their line
//! origin, so moving the overlay by a whole logical pixel amount moves
//! every text pixel by exactly that amount times the scale.

use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, Blend};
use imageproc::rect::Rect as PixelRect;
use quoteme_scene_model::color::Rgba8;
use rusttype::{point, Font, Scale};

use crate::compositor::{LiveScene, OverlayLayer};
use crate::fonts::FontRegistry;

/// Round half up to a device pixel.
pub fn snap(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Draw `scene` at `scale`. `background` is the decoded background image,
/// when the scene has one and it is ready.
pub fn rasterize(
    scene: &LiveScene,
    scale: f64,
    fonts: &FontRegistry,
    background: Option<&RgbaImage>,
) -> RgbaImage {
    let (width, height) = scene.container.scaled_pixels(scale);
    let mut canvas = Blend(RgbaImage::from_pixel(
        width,
        height,
        pixel(scene.background.color),
    ));

    if let Some(image) = background {
        paint_cover(&mut canvas.0, image);
    }
    if let Some(overlay) = &scene.overlay {
        paint_overlay(&mut canvas, overlay, scale, fonts);
    }

    canvas.0
}

fn pixel(color: Rgba8) -> Rgba<u8> {
    Rgba(color.to_array())
}

/// Source rectangle `(x, y, w, h)` that fills `dst` with object-fit cover.
pub fn cover_crop(src: (u32, u32), dst: (u32, u32)) -> (u32, u32, u32, u32) {
    let (sw, sh) = (src.0 as f64, src.1 as f64);
    let (dw, dh) = (dst.0 as f64, dst.1 as f64);
    let factor = (dw / sw).max(dh / sh);
    let w = ((dw / factor).round() as u32).clamp(1, src.0);
    let h = ((dh / factor).round() as u32).clamp(1, src.1);
    ((src.0 - w) / 2, (src.1 - h) / 2, w, h)
}

fn paint_cover(canvas: &mut RgbaImage, image: &RgbaImage) {
    let (dw, dh) = canvas.dimensions();
    let (sw, sh) = image.dimensions();
    if dw == 0 || dh == 0 || sw == 0 || sh == 0 {
        return;
    }
    let (x, y, w, h) = cover_crop((sw, sh), (dw, dh));
    let cropped = imageops::crop_imm(image, x, y, w, h).to_image();
    let fitted = imageops::resize(&cropped, dw, dh, FilterType::Triangle);
    for (dst, src) in canvas.pixels_mut().zip(fitted.pixels()) {
        match src.0[3] {
            255 => *dst = *src,
            0 => {}
            _ => dst.blend(src),
        }
    }
}

fn paint_overlay(canvas: &mut Blend<RgbaImage>, overlay: &OverlayLayer, scale: f64, fonts: &FontRegistry) {
    let origin_x = snap(overlay.offset.x * scale);
    let origin_y = snap(overlay.offset.y * scale);

    if let Some(backdrop) = overlay.backdrop {
        let w = snap(overlay.size.width * scale);
        let h = snap(overlay.size.height * scale);
        if w > 0 && h > 0 {
            let rect = PixelRect::at(origin_x as i32, origin_y as i32).of_size(w as u32, h as u32);
            draw_filled_rect_mut(canvas, rect, pixel(backdrop));
        }
    }

    for line in &overlay.lines {
        if line.text.is_empty() {
            continue;
        }
        let Some(font) = fonts.face(&line.face) else {
            tracing::warn!(family = %line.face.family, "Face vanished before rasterization");
            continue;
        };
        let x = origin_x + snap(line.origin.x * scale);
        let baseline = origin_y + snap(line.origin.y * scale);
        let drawn = draw_line(&mut canvas.0, &font, line.size_px * scale, &line.text, x, baseline, line.color);
        tracing::trace!(drawn, text = %line.text, "Line drawn");
    }
}

/// Draw one line of text with its left edge at `x`. Returns how many
/// glyphs touched the canvas.
///
/// Glyphs entirely off the canvas are skipped before rasterization, so a
/// huge line dragged out of view costs nothing.
fn draw_line(
    canvas: &mut RgbaImage,
    font: &Font<'_>,
    px: f64,
    text: &str,
    x: i64,
    baseline: i64,
    color: Rgba8,
) -> usize {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    let scale = Scale::uniform(px as f32);
    let mut drawn = 0;

    for glyph in font.layout(text, scale, point(0.0, 0.0)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        let (left, top) = (x + bb.min.x as i64, baseline + bb.min.y as i64);
        let (right, bottom) = (x + bb.max.x as i64, baseline + bb.max.y as i64);
        if right <= 0 || bottom <= 0 || left >= width || top >= height {
            continue;
        }
        glyph.draw(|gx, gy, coverage| {
            let cx = left + gx as i64;
            let cy = top + gy as i64;
            if cx < 0 || cy < 0 || cx >= width || cy >= height {
                return;
            }
            blend_coverage(canvas.get_pixel_mut(cx as u32, cy as u32), color, coverage);
        });
        drawn += 1;
    }
    drawn
}

fn blend_coverage(dst: &mut Rgba<u8>, color: Rgba8, coverage: f32) {
    let sa = coverage.clamp(0.0, 1.0) * color.a as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let inv = 1.0 - sa;
    let src = [color.r, color.g, color.b];
    for (channel, value) in dst.0.iter_mut().take(3).zip(src) {
        *channel = (value as f32 * sa + *channel as f32 * inv).round() as u8;
    }
    let da = dst.0[3] as f32 / 255.0;
    dst.0[3] = ((sa + da * inv) * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::render;
    use quoteme_scene_model::color::ColorToken;
    use quoteme_scene_model::geometry::{Size, Vec2};
    use quoteme_scene_model::style::{FontWeight, StyleState};

    #[test]
    fn test_snap_is_shift_consistent() {
        assert_eq!(snap(2.5), 3);
        assert_eq!(snap(-2.5), -2);
        assert_eq!(snap(-0.4), 0);
        for v in [0.3, 1.5, -7.5, 12.49] {
            assert_eq!(snap(v + 30.0), snap(v) + 30);
        }
    }

    #[test]
    fn test_cover_crop() {
        // Wide source into a portrait target: crop the sides.
        assert_eq!(cover_crop((1000, 500), (400, 500)), (300, 0, 400, 500));
        // Tall source into a square target: crop top and bottom.
        assert_eq!(cover_crop((100, 300), (50, 50)), (0, 100, 100, 100));
        // Same aspect: no crop.
        assert_eq!(cover_crop((800, 1000), (400, 500)), (0, 0, 800, 1000));
    }

    #[test]
    fn test_flat_background_dimensions() {
        let fonts = FontRegistry::bundled();
        let mut style = StyleState::default();
        style.background.color = ColorToken::RED;
        let scene = render(Size::new(40.0, 50.0), &style, Vec2::ZERO, &fonts);

        let img = rasterize(&scene, 2.0, &fonts, None);
        assert_eq!(img.dimensions(), (80, 100));
        assert!(img.pixels().all(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn test_cover_image_fills_canvas() {
        let fonts = FontRegistry::bundled();
        let scene = render(Size::new(10.0, 10.0), &StyleState::default(), Vec2::ZERO, &fonts);
        let source = RgbaImage::from_pixel(30, 10, Rgba([0, 0, 255, 255]));

        let img = rasterize(&scene, 1.0, &fonts, Some(&source));
        assert!(img.pixels().all(|p| p.0 == [0, 0, 255, 255]));
    }

    #[test]
    fn test_backdrop_blends_over_background() {
        let fonts = FontRegistry::bundled();
        let mut style = StyleState::with_quote("x");
        style.background.color = ColorToken::WHITE;
        style.text.backdrop = Some("#00000080".parse().unwrap());
        let scene = render(Size::new(200.0, 200.0), &style, Vec2::new(10.0, 10.0), &fonts);

        let img = rasterize(&scene, 1.0, &fonts, None);
        // Inside the box, in the padding: half-dark.
        let inside = img.get_pixel(12, 12).0;
        assert!(inside[0] > 100 && inside[0] < 160, "{inside:?}");
        assert_eq!(img.get_pixel(5, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_offscreen_glyphs_are_skipped() {
        let fonts = FontRegistry::bundled();
        let face = fonts.resolve("sans-serif", FontWeight::Bold).unwrap();
        let mut canvas = RgbaImage::from_pixel(40, 50, Rgba([0, 0, 0, 255]));

        // A 60000 px glyph would need gigabytes of coverage buffer.
        let drawn = draw_line(&mut canvas, &face.font, 60000.0, "W", 5000, 5000, Rgba8::rgb(255, 255, 255));
        assert_eq!(drawn, 0);
        let drawn = draw_line(&mut canvas, &face.font, 60000.0, "W", -200000, 20, Rgba8::rgb(255, 255, 255));
        assert_eq!(drawn, 0);
        assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0, 255]));

        let drawn = draw_line(&mut canvas, &face.font, 20.0, "Hi", 2, 30, Rgba8::rgb(255, 255, 255));
        assert_eq!(drawn, 2);
    }

    #[test]
    fn test_far_offscreen_overlay_leaves_background() {
        let fonts = FontRegistry::bundled();
        let mut style = StyleState::with_quote("W");
        style.background.color = ColorToken::RED;
        style.text.font_size_px = 1000.0;
        let scene = render(Size::new(40.0, 50.0), &style, Vec2::new(5000.0, 5000.0), &fonts);

        let img = rasterize(&scene, 8.0, &fonts, None);
        assert_eq!(img.dimensions(), (320, 400));
        assert!(img.pixels().all(|p| p.0 == [255, 0, 0, 255]));
    }

    #[test]
    fn test_glyphs_are_drawn_in_text_color() {
        let fonts = FontRegistry::bundled();
        let mut style = StyleState::with_quote("Hello");
        style.background.color = ColorToken::BLACK;
        let scene = render(Size::new(200.0, 100.0), &style, Vec2::ZERO, &fonts);

        let img = rasterize(&scene, 1.0, &fonts, None);
        let lit = img.pixels().filter(|p| p.0[0] > 200).count();
        assert!(lit > 20);
        assert!(img.pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
    }
}
