//! Grader configuration. Every field has a default, so a config file only
//! needs the values it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::marker::MarkerConfig;
use crate::rectify::WarpInterpolation;
use crate::rectify::ransac::RansacConfig;
use crate::template::SectionKind;

const MIN_ANSWER_PIXELS: u32 = 1200;
const MIN_STUDENT_PIXELS: u32 = 700;
const MIN_QUIZ_PIXELS: u32 = 600;
const MIN_CLASS_PIXELS: u32 = 600;

const RING_THICKNESS: u32 = 3;
const ID_RING_THICKNESS: u32 = 2;
const TEXT_HEIGHT_PX: f32 = 24.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("answer key has no entry for question {question}")]
    MissingQuestion { question: u32 },

    #[error("answer key entry {index} matches no question in the template")]
    ExtraQuestion { index: usize },

    #[error("question {question} has {choices} choices, key names choice {choice}")]
    ChoiceOutOfRange {
        question: u32,
        choice: usize,
        choices: usize,
    },

    #[error("no answer key for exam code {code}")]
    UnknownExamCode { code: String },

    #[error("exam code could not be read and no default answer key is set")]
    ExamCodeUnavailable,
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigurationError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Minimum ink pixels inside a bubble disc for it to count as filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillThresholds {
    pub answer: u32,
    pub student: u32,
    pub quiz: u32,
    pub class: u32,
}

impl Default for FillThresholds {
    fn default() -> Self {
        Self {
            answer: MIN_ANSWER_PIXELS,
            student: MIN_STUDENT_PIXELS,
            quiz: MIN_QUIZ_PIXELS,
            class: MIN_CLASS_PIXELS,
        }
    }
}

impl FillThresholds {
    pub fn for_kind(&self, kind: SectionKind) -> u32 {
        match kind {
            SectionKind::Answer => self.answer,
            SectionKind::Student => self.student,
            SectionKind::Quiz => self.quiz,
            SectionKind::Class => self.class,
        }
    }
}

/// RGB colors of the annotation overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub correct: [u8; 3],
    pub wrong: [u8; 3],
    pub highlight: [u8; 3],
    pub text: [u8; 3],
    pub marker: [u8; 3],
    pub info_section: [u8; 3],
    pub answer_section: [u8; 3],
    pub student_section: [u8; 3],
    pub quiz_section: [u8; 3],
    pub class_section: [u8; 3],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            correct: [0, 255, 0],
            wrong: [255, 0, 0],
            highlight: [255, 255, 0],
            text: [255, 0, 0],
            marker: [255, 0, 0],
            info_section: [0, 255, 0],
            answer_section: [255, 0, 255],
            student_section: [0, 0, 255],
            quiz_section: [255, 0, 0],
            class_section: [255, 255, 0],
        }
    }
}

impl Palette {
    /// Outline color for a named section box.
    pub fn section(&self, name: &str) -> [u8; 3] {
        match SectionKind::from_section_name(name) {
            Some(SectionKind::Answer) => self.answer_section,
            Some(SectionKind::Student) => self.student_section,
            Some(SectionKind::Quiz) => self.quiz_section,
            Some(SectionKind::Class) => self.class_section,
            None => self.info_section,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub palette: Palette,
    pub ring_thickness: u32,
    pub id_ring_thickness: u32,
    /// Glyph height of the summary text in canonical pixels.
    pub text_height_px: f32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            ring_thickness: RING_THICKNESS,
            id_ring_thickness: ID_RING_THICKNESS,
            text_height_px: TEXT_HEIGHT_PX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    pub fill: FillThresholds,
    pub marker: MarkerConfig,
    pub ransac: RansacConfig,
    pub interpolation: WarpInterpolation,
    pub annotation: AnnotationConfig,
}

impl GraderConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        read_json(path.as_ref())
    }
}
