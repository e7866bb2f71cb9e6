//! Overlays on the canonical image: bubble outcome rings, identifier choices,
//! the alignment check and the summary text. Drawing never feeds back into
//! classification.

pub mod text;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as PixelBox;

use crate::config::{AnnotationConfig, Palette};
use crate::id_decode::DecodedId;
use crate::scoring::{QuestionOutcome, QuestionStatus};
use crate::template::{IdentifierSection, Question, Rect, Template};
pub use text::{draw_text, text_width};

const LINE_SPACING_PX: f32 = 30.0;
const TEXT_LEFT_PX: f32 = 10.0;
const LABEL_SCALE: f32 = 0.6;
const BOX_THICKNESS: u32 = 2;

/// Ring color role of one bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingMark {
    Correct,
    Wrong,
    /// The keyed bubble when the student missed it.
    Highlight,
}

impl RingMark {
    fn color(self, palette: &Palette) -> Rgb<u8> {
        match self {
            RingMark::Correct => Rgb(palette.correct),
            RingMark::Wrong => Rgb(palette.wrong),
            RingMark::Highlight => Rgb(palette.highlight),
        }
    }
}

/// Rings to draw for one graded question, as `(bubble index, mark)`.
pub fn answer_marks(outcome: &QuestionOutcome) -> Vec<(usize, RingMark)> {
    let key = outcome.key;
    match outcome.status {
        QuestionStatus::Skipped => vec![(key, RingMark::Highlight)],
        QuestionStatus::Correct => vec![(key, RingMark::Correct)],
        QuestionStatus::Wrong => outcome
            .filled
            .iter()
            .map(|&i| (i, RingMark::Wrong))
            .chain([(key, RingMark::Highlight)])
            .collect(),
        QuestionStatus::Multiple => {
            let key_mark = if outcome.filled.contains(&key) {
                RingMark::Correct
            } else {
                RingMark::Highlight
            };
            outcome
                .filled
                .iter()
                .filter(|&&i| i != key)
                .map(|&i| (i, RingMark::Wrong))
                .chain([(key, key_mark)])
                .collect()
        }
    }
}

/// Solid ring of `thickness` pixels centered on the circle of `radius`.
pub fn draw_ring(canvas: &mut RgbImage, center: (f32, f32), radius: f32, thickness: u32, color: Rgb<u8>) {
    let (cx, cy) = center;
    let half_stroke = thickness.max(1) as f32 * 0.5;
    let max_r = (radius + half_stroke + 1.0).ceil() as i32;

    let cx_i = cx.round() as i32;
    let cy_i = cy.round() as i32;
    let width = canvas.width() as i32;
    let height = canvas.height() as i32;

    let min_x = (cx_i - max_r).max(0);
    let max_x = (cx_i + max_r).min(width - 1);
    let min_y = (cy_i - max_r).max(0);
    let max_y = (cy_i + max_r).min(height - 1);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let dist = (dx * dx + dy * dy).sqrt();
            if (dist - radius).abs() <= half_stroke {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Rectangle outline growing outward by `thickness` pixels.
pub fn draw_box(canvas: &mut RgbImage, rect: Rect, thickness: u32, color: Rgb<u8>) {
    let (x, y) = (rect.x.round() as i32, rect.y.round() as i32);
    let (w, h) = (rect.w.round().max(1.0) as u32, rect.h.round().max(1.0) as u32);
    for i in 0..thickness.max(1) {
        let outline = PixelBox::at(x - i as i32, y - i as i32).of_size(w + 2 * i, h + 2 * i);
        draw_hollow_rect_mut(canvas, outline, color);
    }
}

pub fn annotate_question(
    canvas: &mut RgbImage,
    question: &Question,
    outcome: &QuestionOutcome,
    config: &AnnotationConfig,
) {
    for (index, mark) in answer_marks(outcome) {
        if let Some(bubble) = question.bubbles.get(index) {
            draw_ring(
                canvas,
                bubble.position,
                bubble.radius,
                config.ring_thickness,
                mark.color(&config.palette),
            );
        }
    }
}

/// Green rings on the winning bubble of every resolved column.
pub fn annotate_identifier(
    canvas: &mut RgbImage,
    section: &IdentifierSection,
    decoded: &DecodedId,
    config: &AnnotationConfig,
) {
    for (column, reading) in section.columns.iter().zip(&decoded.columns) {
        let Some(bubble) = reading.winner.and_then(|i| column.bubbles.get(i)) else {
            continue;
        };
        draw_ring(
            canvas,
            bubble.position,
            bubble.radius,
            config.id_ring_thickness,
            Rgb(config.palette.correct),
        );
    }
}

/// Stacks `lines` in the top-left corner.
pub fn draw_summary(canvas: &mut RgbImage, lines: &[String], config: &AnnotationConfig) {
    let spacing = LINE_SPACING_PX.max(config.text_height_px * 1.25);
    for (i, line) in lines.iter().enumerate() {
        let baseline = LINE_SPACING_PX + i as f32 * spacing;
        draw_text(
            canvas,
            line,
            (TEXT_LEFT_PX, baseline),
            config.text_height_px,
            Rgb(config.palette.text),
        );
    }
}

/// Template markers and section boxes drawn where the template places them,
/// for checking a rectified sheet by eye.
pub fn draw_alignment_overlay(canvas: &mut RgbImage, template: &Template, config: &AnnotationConfig) {
    let palette = &config.palette;
    let label_px = config.text_height_px * LABEL_SCALE;

    for marker in &template.markers {
        let half = marker.size / 2.0;
        let (cx, cy) = marker.position;
        let outline = Rect {
            x: cx - half,
            y: cy - half,
            w: marker.size,
            h: marker.size,
        };
        draw_box(canvas, outline, BOX_THICKNESS, Rgb(palette.marker));
        draw_text(
            canvas,
            &marker.id.to_string(),
            (cx - 10.0, cy - 10.0),
            label_px,
            Rgb(palette.marker),
        );
    }

    for (name, rect) in &template.sections {
        let color = Rgb(palette.section(name));
        draw_box(canvas, *rect, BOX_THICKNESS, color);
        draw_text(canvas, name, (rect.x, rect.y - 5.0), label_px, color);
    }
}
