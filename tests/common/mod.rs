#![allow(dead_code)]

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};
use imageproc::geometric_transformations::{Interpolation, Projection, warp};
use serde_json::{Value, json};

use omr_sheet_reader::config::FillThresholds;
use omr_sheet_reader::marker::{MarkerDictionary, render_marker};
use omr_sheet_reader::{AnswerKey, GraderConfig, Template};

pub const PAGE: (u32, u32) = (800, 1100);
pub const MARKER_CELL_PX: u32 = 12;
pub const MARKER_SIDE: u32 = 6 * MARKER_CELL_PX;

/// Top-left corners of the eight printed markers; ids follow the order.
pub const MARKER_ORIGINS: [(u32, u32); 8] = [
    (40, 40),
    (364, 40),
    (688, 40),
    (40, 500),
    (688, 500),
    (40, 988),
    (364, 988),
    (688, 988),
];

pub const ANSWER_RADIUS: f32 = 14.0;
pub const ID_RADIUS: f32 = 13.0;
pub const QUESTIONS: usize = 5;
pub const CHOICES: usize = 5;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const OUTLINE: Rgb<u8> = Rgb([120, 120, 120]);
const PENCIL: Rgb<u8> = Rgb([40, 40, 40]);

pub const KEY: [usize; QUESTIONS] = [1, 3, 0, 4, 2];

pub fn marker_center(id: usize) -> (f32, f32) {
    let (x, y) = MARKER_ORIGINS[id];
    let half = (MARKER_SIDE - 1) as f32 / 2.0;
    (x as f32 + half, y as f32 + half)
}

pub fn answer_bubble(question: usize, choice: usize) -> (f32, f32) {
    (200.0 + 50.0 * choice as f32, 620.0 + 60.0 * question as f32)
}

fn id_origin(kind: &str) -> f32 {
    match kind {
        "student" => 160.0,
        "quiz" => 460.0,
        _ => 620.0,
    }
}

pub fn id_bubble(kind: &str, column: usize, digit: u8) -> (f32, f32) {
    (
        id_origin(kind) + 40.0 * column as f32,
        150.0 + 34.0 * digit as f32,
    )
}

fn id_section(kind: &str, columns: usize) -> Value {
    let columns: Vec<Value> = (0..columns)
        .map(|c| {
            let bubbles: Vec<Value> = (0..10u8)
                .map(|d| {
                    let (x, y) = id_bubble(kind, c, d);
                    json!({"x": x, "y": y, "radius": ID_RADIUS, "value": d})
                })
                .collect();
            json!({ "bubbles": bubbles })
        })
        .collect();
    let x = id_origin(kind) - 20.0;
    json!({"x": x, "y": 130, "w": 40 * columns.len(), "h": 346, "columns": columns})
}

pub fn template_json() -> Value {
    let markers: Vec<Value> = (0..MARKER_ORIGINS.len())
        .map(|id| {
            let (x, y) = marker_center(id);
            json!({"id": id, "x": x, "y": y, "size": MARKER_SIDE})
        })
        .collect();
    let questions: Vec<Value> = (0..QUESTIONS)
        .map(|q| {
            let bubbles: Vec<Value> = (0..CHOICES)
                .map(|c| {
                    let (x, y) = answer_bubble(q, c);
                    json!({"x": x, "y": y, "radius": ANSWER_RADIUS})
                })
                .collect();
            json!({"question": q + 1, "bubbles": bubbles})
        })
        .collect();

    json!({
        "page": {"width": PAGE.0, "height": PAGE.1},
        "markers": markers,
        "sections": {"info_section": {"x": 140, "y": 120, "w": 560, "h": 370}},
        "answerArea": {"x": 170, "y": 590, "w": 260, "h": 300, "questions": questions},
        "studentIdSection": id_section("student", 6),
        "quizIdSection": id_section("quiz", 3),
        "classIdSection": id_section("class", 2),
    })
}

pub fn template() -> Template {
    Template::from_json_str(&template_json().to_string()).expect("fixture template is valid")
}

pub fn key() -> AnswerKey {
    AnswerKey::from_choices(KEY)
}

/// Thresholds scaled to the fixture's bubble sizes.
pub fn config() -> GraderConfig {
    GraderConfig {
        fill: FillThresholds {
            answer: 350,
            student: 300,
            quiz: 300,
            class: 300,
        },
        ..GraderConfig::default()
    }
}

/// What the student marked. `None` leaves an identifier column blank.
#[derive(Debug, Clone)]
pub struct Marks {
    pub answers: Vec<Vec<usize>>,
    pub student: Vec<Option<u8>>,
    pub quiz: Vec<Option<u8>>,
    pub class: Vec<Option<u8>>,
}

pub fn digits(text: &str) -> Vec<Option<u8>> {
    text.chars().map(|c| c.to_digit(10).map(|d| d as u8)).collect()
}

impl Default for Marks {
    fn default() -> Self {
        Self {
            answers: vec![vec![1], vec![0], vec![], vec![4, 1], vec![2]],
            student: digits("314159"),
            quiz: digits("042"),
            class: digits("07"),
        }
    }
}

fn bubble(canvas: &mut RgbImage, (x, y): (f32, f32), radius: f32, filled: bool) {
    let center = (x.round() as i32, y.round() as i32);
    draw_hollow_circle_mut(canvas, center, radius as i32, OUTLINE);
    if filled {
        draw_filled_circle_mut(canvas, center, radius as i32, PENCIL);
    }
}

fn id_column(canvas: &mut RgbImage, kind: &str, marks: &[Option<u8>], columns: usize) {
    for c in 0..columns {
        let chosen = marks.get(c).copied().flatten();
        for d in 0..10u8 {
            bubble(canvas, id_bubble(kind, c, d), ID_RADIUS, chosen == Some(d));
        }
    }
}

/// Renders the sheet directly in template coordinates.
pub fn render_sheet(marks: &Marks) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(PAGE.0, PAGE.1, WHITE);
    let dict = MarkerDictionary::aruco_4x4_50();
    for (id, &(ox, oy)) in MARKER_ORIGINS.iter().enumerate() {
        let marker = render_marker(&dict, id as u32, MARKER_CELL_PX).expect("fixture ids are in the dictionary");
        for (x, y, p) in marker.enumerate_pixels() {
            let v = p[0];
            canvas.put_pixel(ox + x, oy + y, Rgb([v, v, v]));
        }
    }

    for q in 0..QUESTIONS {
        let filled = marks.answers.get(q).cloned().unwrap_or_default();
        for c in 0..CHOICES {
            bubble(&mut canvas, answer_bubble(q, c), ANSWER_RADIUS, filled.contains(&c));
        }
    }
    id_column(&mut canvas, "student", &marks.student, 6);
    id_column(&mut canvas, "quiz", &marks.quiz, 3);
    id_column(&mut canvas, "class", &marks.class, 2);
    canvas
}

/// Paints over a printed marker, as if it were torn off or covered.
pub fn hide_marker(canvas: &mut RgbImage, id: usize) {
    let (ox, oy) = MARKER_ORIGINS[id];
    for y in oy.saturating_sub(4)..(oy + MARKER_SIDE + 4).min(PAGE.1) {
        for x in ox.saturating_sub(4)..(ox + MARKER_SIDE + 4).min(PAGE.0) {
            canvas.put_pixel(x, y, WHITE);
        }
    }
}

/// A mild keystone, roughly what a handheld phone shot does to the page.
pub fn photograph(sheet: &RgbImage) -> RgbImage {
    let (w, h) = (sheet.width() as f32, sheet.height() as f32);
    let from = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let to = [(30.0, 20.0), (w - 30.0, 45.0), (w - 15.0, h - 20.0), (10.0, h - 30.0)];
    let projection = Projection::from_control_points(from, to).expect("keystone is not degenerate");
    warp(sheet, &projection, Interpolation::Bilinear, WHITE)
}
