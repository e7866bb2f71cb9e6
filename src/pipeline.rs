//! One sheet from photograph to grading result and annotated image.

use std::collections::BTreeMap;

use image::{DynamicImage, RgbImage};
use serde::Serialize;

use crate::annotate::{annotate_identifier, annotate_question, draw_alignment_overlay, draw_summary};
use crate::answer_key::KeySource;
use crate::bubble::{classify_bubbles, filled_indices};
use crate::config::{ConfigurationError, GraderConfig};
use crate::id_decode::{DecodedId, decode_identifier};
use crate::imaging::{ImagingError, rgb_to_gray};
use crate::marker::{DetectedMarker, DetectionError, detect_markers};
use crate::rectify::{Alignment, AlignmentError, Rectified, rectify};
use crate::region::{bubble_bounds, threshold_region};
use crate::scoring::{QuestionOutcome, QuestionStatus, summarize};
use crate::template::{SectionKind, Template};

#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    #[error("marker detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("alignment failed: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("image processing failed: {0}")]
    Imaging(#[from] ImagingError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Structured outcome of one sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    pub score: usize,
    pub total: usize,
    pub percentage: f64,
    pub student_id: Option<String>,
    pub quiz_id: Option<String>,
    pub class_id: Option<String>,
    pub per_question_status: Vec<QuestionStatus>,
    /// Filled bubble indices per question, in template order.
    pub answers: Vec<Vec<usize>>,
    /// Identifiers that could not be fully read, with `?` for empty columns.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub partial_ids: BTreeMap<SectionKind, String>,
}

impl GradingResult {
    pub fn identifier(&self, kind: SectionKind) -> Option<&str> {
        match kind {
            SectionKind::Answer => None,
            SectionKind::Student => self.student_id.as_deref(),
            SectionKind::Quiz => self.quiz_id.as_deref(),
            SectionKind::Class => self.class_id.as_deref(),
        }
    }

    /// Overlay text: score line, then one line per identifier that was read.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Score: {}/{} = {:.2}%",
            self.score, self.total, self.percentage
        )];
        let labels = [
            (SectionKind::Student, "Student ID: "),
            (SectionKind::Quiz, "Quiz ID:    "),
            (SectionKind::Class, "Class ID:   "),
        ];
        for (kind, label) in labels {
            let shown = self
                .identifier(kind)
                .or_else(|| self.partial_ids.get(&kind).map(String::as_str));
            if let Some(value) = shown {
                lines.push(format!("{label}{value}"));
            }
        }
        lines
    }
}

#[derive(Debug, Clone)]
pub struct GradedSheet {
    pub result: GradingResult,
    pub outcomes: Vec<QuestionOutcome>,
    pub identifiers: Vec<DecodedId>,
    /// `None` when grading started from an already rectified image.
    pub alignment: Option<Alignment>,
    pub annotated: RgbImage,
}

#[derive(Debug, Clone)]
pub struct AlignmentCheck {
    pub markers: Vec<DetectedMarker>,
    pub alignment: Alignment,
    pub overlay: RgbImage,
}

/// Grades sheets of one template against one key source.
///
/// A `Grader` holds no mutable state, so one instance can be shared across
/// threads and used for many sheets at once.
#[derive(Debug, Clone)]
pub struct Grader {
    template: Template,
    keys: KeySource,
    config: GraderConfig,
}

impl Grader {
    /// Fails when any answer key disagrees with the template's questions.
    pub fn new(
        template: Template,
        keys: impl Into<KeySource>,
        config: GraderConfig,
    ) -> Result<Self, ConfigurationError> {
        let keys = keys.into();
        keys.validate_against(&template)?;
        Ok(Self {
            template,
            keys,
            config,
        })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    /// Detects markers, rectifies and grades a photographed sheet.
    pub fn grade(&self, image: &DynamicImage) -> Result<GradedSheet, GradeError> {
        let (_, rectified) = detect_and_rectify(image, &self.template, &self.config)?;
        let mut sheet = self.grade_canonical(rectified.image)?;
        sheet.alignment = Some(rectified.alignment);
        Ok(sheet)
    }

    /// Grades an image that is already in canonical template coordinates.
    pub fn grade_canonical(&self, canonical: RgbImage) -> Result<GradedSheet, GradeError> {
        let gray = rgb_to_gray(&canonical)?;
        let fill = &self.config.fill;

        let mut identifiers = Vec::new();
        for kind in SectionKind::IDENTIFIERS {
            if let Some(section) = self.template.identifier(kind) {
                identifiers.push(decode_identifier(section, &gray, fill.for_kind(kind))?);
            }
        }
        let id_value = |kind: SectionKind| {
            identifiers
                .iter()
                .find(|d| d.kind == kind)
                .and_then(|d| d.value().ok())
        };

        let exam_code = if self.keys.needs_exam_code() {
            id_value(SectionKind::Quiz)
        } else {
            None
        };
        let key = self.keys.resolve(exam_code.as_deref())?;

        let threshold = fill.for_kind(SectionKind::Answer);
        let mut outcomes = Vec::with_capacity(self.template.question_count());
        for question in &self.template.answer_area.questions {
            let bounds = bubble_bounds(&question.bubbles, gray.width(), gray.height());
            let region = threshold_region(&gray, bounds)?;
            let readings = classify_bubbles(&region, &question.bubbles, threshold);
            let choice = key
                .get(question.key_index())
                .ok_or(ConfigurationError::MissingQuestion {
                    question: question.number,
                })?;
            let outcome = QuestionOutcome::new(question.number, choice, filled_indices(&readings));
            tracing::trace!(
                question = question.number,
                status = ?outcome.status,
                inks = ?readings.iter().map(|r| r.ink_count).collect::<Vec<_>>(),
                "question graded"
            );
            outcomes.push(outcome);
        }

        let summary = summarize(&outcomes);
        let partial_ids = identifiers
            .iter()
            .filter(|d| !d.is_complete())
            .map(|d| (d.kind, d.partial()))
            .collect();
        let result = GradingResult {
            score: summary.score,
            total: summary.total,
            percentage: summary.percentage,
            student_id: id_value(SectionKind::Student),
            quiz_id: id_value(SectionKind::Quiz),
            class_id: id_value(SectionKind::Class),
            per_question_status: outcomes.iter().map(|o| o.status).collect(),
            answers: outcomes.iter().map(|o| o.filled.clone()).collect(),
            partial_ids,
        };
        tracing::debug!(
            score = result.score,
            total = result.total,
            student = ?result.student_id,
            quiz = ?result.quiz_id,
            class = ?result.class_id,
            "sheet graded"
        );

        let annotated = self.annotate(canonical, &outcomes, &identifiers, &result);
        Ok(GradedSheet {
            result,
            outcomes,
            identifiers,
            alignment: None,
            annotated,
        })
    }

    fn annotate(
        &self,
        mut canvas: RgbImage,
        outcomes: &[QuestionOutcome],
        identifiers: &[DecodedId],
        result: &GradingResult,
    ) -> RgbImage {
        let style = &self.config.annotation;
        for (question, outcome) in self.template.answer_area.questions.iter().zip(outcomes) {
            annotate_question(&mut canvas, question, outcome, style);
        }
        for decoded in identifiers {
            if let Some(section) = self.template.identifier(decoded.kind) {
                annotate_identifier(&mut canvas, section, decoded, style);
            }
        }
        draw_summary(&mut canvas, &result.summary_lines(), style);
        canvas
    }

    /// Same as [`check_alignment`] with this grader's template and config.
    pub fn verify_alignment(&self, image: &DynamicImage) -> Result<AlignmentCheck, GradeError> {
        check_alignment(image, &self.template, &self.config)
    }
}

fn detect_and_rectify(
    image: &DynamicImage,
    template: &Template,
    config: &GraderConfig,
) -> Result<(Vec<DetectedMarker>, Rectified), GradeError> {
    let markers = detect_markers(image, &config.marker)?;
    tracing::debug!(markers = markers.len(), "detected markers");
    let rectified = rectify(
        image,
        &markers,
        &template.markers,
        template.page_size,
        &config.ransac,
        config.interpolation,
    );
    match rectified {
        Ok(rectified) => Ok((markers, rectified)),
        Err(e) => {
            let ids: Vec<u32> = markers.iter().map(|m| m.id).collect();
            tracing::warn!(?ids, "markers seen before alignment failed");
            Err(e.into())
        }
    }
}

/// Rectifies `image` and draws the template's markers and sections over it.
///
/// Needs no answer key, so a template can be checked before any key exists.
pub fn check_alignment(
    image: &DynamicImage,
    template: &Template,
    config: &GraderConfig,
) -> Result<AlignmentCheck, GradeError> {
    let (markers, rectified) = detect_and_rectify(image, template, config)?;
    let mut overlay = rectified.image;
    draw_alignment_overlay(&mut overlay, template, &config.annotation);
    Ok(AlignmentCheck {
        markers,
        alignment: rectified.alignment,
        overlay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> GradingResult {
        GradingResult {
            score: 3,
            total: 4,
            percentage: 75.0,
            student_id: Some("314159".into()),
            quiz_id: None,
            class_id: Some("07".into()),
            per_question_status: vec![
                QuestionStatus::Correct,
                QuestionStatus::Correct,
                QuestionStatus::Multiple,
                QuestionStatus::Correct,
            ],
            answers: vec![vec![0], vec![1], vec![0, 2], vec![3]],
            partial_ids: BTreeMap::from([(SectionKind::Quiz, "1?3".to_string())]),
        }
    }

    #[test]
    fn summary_lines_show_partial_ids() {
        let lines = result().summary_lines();
        assert_eq!(
            lines,
            vec![
                "Score: 3/4 = 75.00%".to_string(),
                "Student ID: 314159".to_string(),
                "Quiz ID:    1?3".to_string(),
                "Class ID:   07".to_string(),
            ]
        );
    }

    #[test]
    fn result_json_is_camel_case() {
        let json = serde_json::to_value(result()).expect("serialize");
        assert_eq!(json["studentId"], "314159");
        assert!(json["quizId"].is_null());
        assert_eq!(json["perQuestionStatus"][2], "multiple");
        assert_eq!(json["partialIds"]["quiz"], "1?3");
        assert_eq!(json["answers"][2][1], 2);
    }

    #[test]
    fn grader_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Grader>();
    }
}
