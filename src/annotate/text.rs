use std::sync::LazyLock;

use image::{Rgb, RgbImage};
use rusttype::{Font, Scale, point};

static FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono.ttf");

static FONT: LazyLock<Option<Font<'static>>> = LazyLock::new(|| {
    let font = Font::try_from_bytes(FONT_BYTES);
    if font.is_none() {
        tracing::warn!("embedded font failed to load; annotations will have no text");
    }
    font
});

/// Draws `text` with its baseline starting at `origin`, alpha-blending glyph
/// coverage over the canvas. Glyphs falling outside the canvas are clipped.
pub fn draw_text(canvas: &mut RgbImage, text: &str, origin: (f32, f32), height_px: f32, color: Rgb<u8>) {
    let Some(font) = FONT.as_ref() else {
        return;
    };
    let scale = Scale::uniform(height_px.max(1.0));
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);

    for glyph in font.layout(text, scale, point(origin.0, origin.1)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let x = bb.min.x + gx as i32;
            let y = bb.min.y + gy as i32;
            if x < 0 || y < 0 || x >= width || y >= height || coverage <= 0.0 {
                return;
            }
            let px = canvas.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                let blended = px[c] as f32 * (1.0 - coverage) + color[c] as f32 * coverage;
                px[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        });
    }
}

/// Horizontal advance of `text` at `height_px`.
pub fn text_width(text: &str, height_px: f32) -> f32 {
    let Some(font) = FONT.as_ref() else {
        return 0.0;
    };
    let scale = Scale::uniform(height_px.max(1.0));
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}
