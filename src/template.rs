//! Sheet layout templates.
//!
//! A template places the fiducial markers, the answer bubbles and the
//! identifier grids in canonical page coordinates. Two JSON spellings are
//! accepted: the camelCase form with `x`/`y` fields, and the older layout
//! files that use `aruco_marker`, snake_case section names and `position`
//! arrays.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CANONICAL_WIDTH: u32 = 2481;
pub const CANONICAL_HEIGHT: u32 = 3508;
pub const DEFAULT_MARKER_SIZE: f32 = 50.0;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed template JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{context} has no position")]
    MissingPosition { context: String },

    #[error("{context} has a malformed box")]
    MalformedBox { context: String },

    #[error("{context} has non-positive radius {radius}")]
    InvalidRadius { context: String, radius: f32 },

    #[error("{context} has no bubbles")]
    NoBubbles { context: String },

    #[error("{context} needs a digit value 0-9")]
    MissingValue { context: String },

    #[error("marker id {0} appears more than once")]
    DuplicateMarker(u32),

    #[error("template declares {0} markers, at least 4 are required")]
    TooFewMarkers(usize),

    #[error("question {0} appears more than once")]
    DuplicateQuestion(u32),

    #[error("question numbers start at 1")]
    QuestionZero,

    #[error("template has no answer area")]
    MissingAnswerArea,

    #[error("page size {width}x{height} is not usable")]
    InvalidPage { width: u32, height: u32 },
}

/// Region kinds on a sheet. Each kind has its own fill threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKind {
    Answer,
    Student,
    Quiz,
    Class,
}

impl SectionKind {
    pub const IDENTIFIERS: [SectionKind; 3] = [SectionKind::Student, SectionKind::Quiz, SectionKind::Class];

    /// Key of the section box in the template's `sections` map.
    pub fn section_name(self) -> &'static str {
        match self {
            SectionKind::Answer => "answer_area",
            SectionKind::Student => "student_id_section",
            SectionKind::Quiz => "quiz_id_section",
            SectionKind::Class => "class_id_section",
        }
    }

    pub fn from_section_name(name: &str) -> Option<Self> {
        match name {
            "answer_area" | "answerArea" => Some(SectionKind::Answer),
            "student_id_section" | "studentIdSection" => Some(SectionKind::Student),
            "quiz_id_section" | "quizIdSection" => Some(SectionKind::Quiz),
            "class_id_section" | "classIdSection" => Some(SectionKind::Class),
            _ => None,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionKind::Answer => "answer",
            SectionKind::Student => "student",
            SectionKind::Quiz => "quiz",
            SectionKind::Class => "class",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub id: u32,
    pub position: (f32, f32),
    pub size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bubble {
    pub position: (f32, f32),
    pub radius: f32,
    /// Digit carried by identifier bubbles.
    pub value: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    /// 1-based; the answer key is indexed by `number - 1`.
    pub number: u32,
    pub bubbles: Vec<Bubble>,
}

impl Question {
    pub fn key_index(&self) -> usize {
        self.number.saturating_sub(1) as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub bubbles: Vec<Bubble>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierSection {
    pub kind: SectionKind,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerArea {
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub page_size: (u32, u32),
    pub markers: Vec<Marker>,
    pub sections: BTreeMap<String, Rect>,
    pub answer_area: AnswerArea,
    pub student_id: Option<IdentifierSection>,
    pub quiz_id: Option<IdentifierSection>,
    pub class_id: Option<IdentifierSection>,
}

impl Template {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, TemplateError> {
        let raw: RawTemplate = serde_json::from_str(text)?;
        raw.resolve()
    }

    pub fn identifier(&self, kind: SectionKind) -> Option<&IdentifierSection> {
        match kind {
            SectionKind::Answer => None,
            SectionKind::Student => self.student_id.as_ref(),
            SectionKind::Quiz => self.quiz_id.as_ref(),
            SectionKind::Class => self.class_id.as_ref(),
        }
    }

    pub fn question_count(&self) -> usize {
        self.answer_area.questions.len()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTemplate {
    #[serde(default)]
    page: Option<RawPage>,
    #[serde(default, alias = "aruco_marker", alias = "arucoMarkers")]
    markers: Vec<RawMarker>,
    #[serde(default)]
    sections: BTreeMap<String, RawRect>,
    #[serde(default, alias = "info_section")]
    info_section: Option<RawRect>,
    #[serde(default, alias = "answer_area")]
    answer_area: Option<RawAnswerArea>,
    #[serde(default, alias = "student_id_section")]
    student_id_section: Option<RawIdSection>,
    #[serde(default, alias = "quiz_id_section")]
    quiz_id_section: Option<RawIdSection>,
    #[serde(default, alias = "class_id_section")]
    class_id_section: Option<RawIdSection>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    width: u32,
    height: u32,
}

#[derive(Debug, Default, Deserialize)]
struct RawRect {
    x: Option<f32>,
    y: Option<f32>,
    #[serde(alias = "width")]
    w: Option<f32>,
    #[serde(alias = "height")]
    h: Option<f32>,
    position: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct RawMarker {
    id: u32,
    x: Option<f32>,
    y: Option<f32>,
    position: Option<Vec<f32>>,
    size: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDigit {
    Number(u8),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawBubble {
    x: Option<f32>,
    y: Option<f32>,
    position: Option<Vec<f32>>,
    radius: Option<f32>,
    value: Option<RawDigit>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(alias = "number")]
    question: u32,
    bubbles: Vec<RawBubble>,
}

#[derive(Debug, Deserialize)]
struct RawAnswerArea {
    #[serde(default)]
    questions: Vec<RawQuestion>,
    #[serde(flatten)]
    bounds: RawRect,
}

#[derive(Debug, Deserialize)]
struct RawColumn {
    bubbles: Vec<RawBubble>,
}

#[derive(Debug, Deserialize)]
struct RawIdSection {
    #[serde(default)]
    columns: Vec<RawColumn>,
    #[serde(flatten)]
    bounds: RawRect,
}

fn point(
    x: Option<f32>,
    y: Option<f32>,
    position: Option<&[f32]>,
    context: impl Fn() -> String,
) -> Result<(f32, f32), TemplateError> {
    match (position, x, y) {
        (Some([px, py]), _, _) => Ok((*px, *py)),
        (Some(_), _, _) => Err(TemplateError::MissingPosition { context: context() }),
        (None, Some(x), Some(y)) => Ok((x, y)),
        _ => Err(TemplateError::MissingPosition { context: context() }),
    }
}

impl RawRect {
    fn resolve(&self, context: &str) -> Result<Option<Rect>, TemplateError> {
        if let Some(position) = &self.position {
            return match position.as_slice() {
                &[x, y, w, h] => Ok(Some(Rect { x, y, w, h })),
                _ => Err(TemplateError::MalformedBox {
                    context: context.to_string(),
                }),
            };
        }
        match (self.x, self.y, self.w, self.h) {
            (Some(x), Some(y), Some(w), Some(h)) => Ok(Some(Rect { x, y, w, h })),
            (None, None, None, None) => Ok(None),
            _ => Err(TemplateError::MalformedBox {
                context: context.to_string(),
            }),
        }
    }
}

impl RawBubble {
    fn resolve(&self, digit_required: bool, context: impl Fn() -> String) -> Result<Bubble, TemplateError> {
        let position = point(self.x, self.y, self.position.as_deref(), &context)?;
        let radius = self.radius.unwrap_or(0.0);
        if radius.is_nan() || radius <= 0.0 {
            return Err(TemplateError::InvalidRadius {
                context: context(),
                radius,
            });
        }
        let value = match &self.value {
            Some(RawDigit::Number(d)) if *d <= 9 => Some(*d),
            Some(RawDigit::Text(s)) => s.trim().parse::<u8>().ok().filter(|d| *d <= 9),
            _ => None,
        };
        if digit_required && value.is_none() {
            return Err(TemplateError::MissingValue { context: context() });
        }
        Ok(Bubble {
            position,
            radius,
            value,
        })
    }
}

impl RawIdSection {
    fn resolve(&self, kind: SectionKind) -> Result<IdentifierSection, TemplateError> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for (c, raw) in self.columns.iter().enumerate() {
            if raw.bubbles.is_empty() {
                return Err(TemplateError::NoBubbles {
                    context: format!("{kind} id column {c}"),
                });
            }
            let bubbles = raw
                .bubbles
                .iter()
                .enumerate()
                .map(|(b, bubble)| bubble.resolve(true, || format!("{kind} id column {c} bubble {b}")))
                .collect::<Result<Vec<_>, _>>()?;
            columns.push(Column { bubbles });
        }
        Ok(IdentifierSection { kind, columns })
    }
}

impl RawTemplate {
    fn resolve(self) -> Result<Template, TemplateError> {
        let page_size = match &self.page {
            Some(page) => (page.width, page.height),
            None => (CANONICAL_WIDTH, CANONICAL_HEIGHT),
        };
        if page_size.0 == 0 || page_size.1 == 0 {
            return Err(TemplateError::InvalidPage {
                width: page_size.0,
                height: page_size.1,
            });
        }

        let mut seen = BTreeSet::new();
        let mut markers = Vec::with_capacity(self.markers.len());
        for raw in &self.markers {
            if !seen.insert(raw.id) {
                return Err(TemplateError::DuplicateMarker(raw.id));
            }
            let position = point(raw.x, raw.y, raw.position.as_deref(), || format!("marker {}", raw.id))?;
            markers.push(Marker {
                id: raw.id,
                position,
                size: raw.size.unwrap_or(DEFAULT_MARKER_SIZE),
            });
        }
        if markers.len() < 4 {
            return Err(TemplateError::TooFewMarkers(markers.len()));
        }

        let mut sections = BTreeMap::new();
        for (name, raw) in &self.sections {
            if let Some(rect) = raw.resolve(name)? {
                sections.insert(name.clone(), rect);
            }
        }
        if let Some(raw) = &self.info_section {
            if let Some(rect) = raw.resolve("info_section")? {
                sections.entry("info_section".to_string()).or_insert(rect);
            }
        }

        let raw_area = self.answer_area.as_ref().ok_or(TemplateError::MissingAnswerArea)?;
        if let Some(rect) = raw_area.bounds.resolve(SectionKind::Answer.section_name())? {
            sections
                .entry(SectionKind::Answer.section_name().to_string())
                .or_insert(rect);
        }

        let mut numbers = BTreeSet::new();
        let mut questions = Vec::with_capacity(raw_area.questions.len());
        for raw in &raw_area.questions {
            if raw.question == 0 {
                return Err(TemplateError::QuestionZero);
            }
            if !numbers.insert(raw.question) {
                return Err(TemplateError::DuplicateQuestion(raw.question));
            }
            if raw.bubbles.is_empty() {
                return Err(TemplateError::NoBubbles {
                    context: format!("question {}", raw.question),
                });
            }
            let bubbles = raw
                .bubbles
                .iter()
                .enumerate()
                .map(|(b, bubble)| bubble.resolve(false, || format!("question {} bubble {b}", raw.question)))
                .collect::<Result<Vec<_>, _>>()?;
            questions.push(Question {
                number: raw.question,
                bubbles,
            });
        }

        let mut identifiers = [None, None, None];
        let raw_ids = [
            &self.student_id_section,
            &self.quiz_id_section,
            &self.class_id_section,
        ];
        for ((slot, raw), kind) in identifiers.iter_mut().zip(raw_ids).zip(SectionKind::IDENTIFIERS) {
            if let Some(raw) = raw {
                if let Some(rect) = raw.bounds.resolve(kind.section_name())? {
                    sections.entry(kind.section_name().to_string()).or_insert(rect);
                }
                *slot = Some(raw.resolve(kind)?);
            }
        }
        let [student_id, quiz_id, class_id] = identifiers;

        Ok(Template {
            page_size,
            markers,
            sections,
            answer_area: AnswerArea { questions },
            student_id,
            quiz_id,
            class_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKERS: &str = r#"[{"id":0,"x":100,"y":100},{"id":1,"x":2381,"y":100},
        {"id":2,"x":2381,"y":3408},{"id":3,"x":100,"y":3408,"size":80}]"#;

    #[test]
    fn parses_camel_case_layout() {
        let json = format!(
            r#"{{
                "markers": {MARKERS},
                "sections": {{"info": {{"x": 10, "y": 20, "w": 300, "h": 40}}}},
                "answerArea": {{"questions": [
                    {{"question": 1, "bubbles": [{{"x": 500, "y": 900, "radius": 20}},
                                                {{"x": 560, "y": 900, "radius": 20}}]}}
                ]}},
                "studentIdSection": {{"columns": [
                    {{"bubbles": [{{"x": 300, "y": 400, "radius": 15, "value": 0}},
                                 {{"x": 300, "y": 440, "radius": 15, "value": "1"}}]}}
                ]}}
            }}"#
        );
        let t = Template::from_json_str(&json).expect("valid template");
        assert_eq!(t.page_size, (CANONICAL_WIDTH, CANONICAL_HEIGHT));
        assert_eq!(t.markers[3].size, 80.0);
        assert_eq!(t.markers[0].size, DEFAULT_MARKER_SIZE);
        assert_eq!(t.question_count(), 1);
        assert_eq!(t.answer_area.questions[0].key_index(), 0);
        let student = t.identifier(SectionKind::Student).expect("student grid");
        assert_eq!(student.columns[0].bubbles[1].value, Some(1));
        assert!(t.quiz_id.is_none());
        assert_eq!(t.sections["info"].w, 300.0);
    }

    #[test]
    fn parses_legacy_layout() {
        let json = r#"{
            "aruco_marker": [
                {"id": 4, "position": [80, 80]}, {"id": 5, "position": [2400, 80]},
                {"id": 6, "position": [2400, 3420]}, {"id": 7, "position": [80, 3420]}
            ],
            "info_section": {"position": [100, 150, 900, 200]},
            "answer_area": {
                "position": [100, 1200, 2200, 2000],
                "questions": [{"question": 2, "bubbles": [{"position": [300, 1300], "radius": 22}]}]
            },
            "class_id_section": {
                "position": [1500, 400, 300, 500],
                "columns": [{"bubbles": [{"position": [1550, 450], "radius": 18, "value": 7}]}]
            }
        }"#;
        let t = Template::from_json_str(json).expect("valid legacy template");
        assert_eq!(t.markers[1].position, (2400.0, 80.0));
        assert_eq!(t.sections["info_section"].h, 200.0);
        assert_eq!(t.sections["answer_area"].y, 1200.0);
        assert_eq!(t.sections["class_id_section"].x, 1500.0);
        assert_eq!(t.answer_area.questions[0].key_index(), 1);
        assert_eq!(t.class_id.as_ref().map(|s| s.kind), Some(SectionKind::Class));
    }

    #[test]
    fn rejects_inconsistent_layouts() {
        let dup = r#"{"markers": [{"id":1,"x":0,"y":0},{"id":1,"x":5,"y":5},
            {"id":2,"x":0,"y":9},{"id":3,"x":9,"y":9}], "answerArea": {"questions": []}}"#;
        assert!(matches!(
            Template::from_json_str(dup),
            Err(TemplateError::DuplicateMarker(1))
        ));

        let no_value = format!(
            r#"{{"markers": {MARKERS}, "answerArea": {{"questions": []}},
                "quizIdSection": {{"columns": [{{"bubbles": [{{"x": 1, "y": 1, "radius": 5}}]}}]}}}}"#
        );
        assert!(matches!(
            Template::from_json_str(&no_value),
            Err(TemplateError::MissingValue { .. })
        ));

        let bad_radius = format!(
            r#"{{"markers": {MARKERS}, "answerArea": {{"questions": [
                {{"question": 1, "bubbles": [{{"x": 1, "y": 1, "radius": 0}}]}}]}}}}"#
        );
        assert!(matches!(
            Template::from_json_str(&bad_radius),
            Err(TemplateError::InvalidRadius { .. })
        ));

        let missing_area = format!(r#"{{"markers": {MARKERS}}}"#);
        assert!(matches!(
            Template::from_json_str(&missing_area),
            Err(TemplateError::MissingAnswerArea)
        ));
    }
}
