use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use omr_sheet_reader::bubble::{classify_bubbles, filled_indices, ink_count};
use omr_sheet_reader::region::{PixelRect, threshold_region};
use omr_sheet_reader::scoring::{QuestionOutcome, summarize};
use omr_sheet_reader::template::Bubble;

fn bubble(x: f32, y: f32) -> Bubble {
    Bubble {
        position: (x, y),
        radius: 12.0,
        value: None,
    }
}

fn page() -> GrayImage {
    GrayImage::from_pixel(200, 60, Luma([245]))
}

#[test]
fn more_ink_never_reads_as_less() {
    let target = bubble(50.0, 30.0);
    let rect = PixelRect {
        x0: 20,
        y0: 0,
        x1: 180,
        y1: 60,
    };
    // A dark reference mark keeps the local threshold stable across steps.
    let mut gray = page();
    draw_filled_circle_mut(&mut gray, (150, 30), 12, Luma([20]));

    let mut previous = 0;
    let mut flags = Vec::new();
    for r in [0, 3, 6, 9, 12] {
        if r > 0 {
            draw_filled_circle_mut(&mut gray, (50, 30), r, Luma([20]));
        }
        let region = threshold_region(&gray, rect).expect("threshold");
        let count = ink_count(&region, &target);
        assert!(count >= previous, "radius {r}: {count} < {previous}");
        previous = count;
        flags.push(classify_bubbles(&region, std::slice::from_ref(&target), 300)[0].filled);
    }
    assert!(previous > 400, "full disc only {previous}");

    // Once filled, a bubble stays filled as ink grows.
    assert_eq!(flags.first(), Some(&false));
    assert_eq!(flags.last(), Some(&true));
    let flips = flags.windows(2).filter(|w| w[0] != w[1]).count();
    assert_eq!(flips, 1, "filled flags {flags:?}");
}

#[test]
fn fill_threshold_is_inclusive() {
    let bubbles = [bubble(30.0, 30.0), bubble(80.0, 30.0), bubble(130.0, 30.0)];
    let mut gray = page();
    draw_filled_circle_mut(&mut gray, (30, 30), 12, Luma([30]));
    draw_filled_circle_mut(&mut gray, (130, 30), 12, Luma([30]));
    let rect = PixelRect {
        x0: 0,
        y0: 0,
        x1: 200,
        y1: 60,
    };
    let region = threshold_region(&gray, rect).expect("threshold");
    let exact = ink_count(&region, &bubbles[0]);

    let readings = classify_bubbles(&region, &bubbles, exact);
    assert_eq!(filled_indices(&readings), vec![0, 2]);
    let readings = classify_bubbles(&region, &bubbles, exact + 1);
    assert!(filled_indices(&readings).is_empty());
}

#[test]
fn score_counts_only_correct_answers() {
    let outcomes = vec![
        QuestionOutcome::new(1, 0, vec![0]),
        QuestionOutcome::new(2, 1, vec![1]),
        QuestionOutcome::new(3, 2, vec![]),
        QuestionOutcome::new(4, 3, vec![3, 0]),
        QuestionOutcome::new(5, 4, vec![1]),
        QuestionOutcome::new(6, 0, vec![0]),
    ];
    let summary = summarize(&outcomes);
    assert_eq!((summary.score, summary.total), (3, 6));
    assert!((summary.percentage - 50.0).abs() < 1e-9);

    let empty = summarize(&[]);
    assert_eq!((empty.score, empty.total), (0, 0));
    assert_eq!(empty.percentage, 0.0);
}
