//! Answer keys and exam-code keyed answer-key books.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigurationError, read_json};
use crate::template::Template;

/// Accepted JSON spellings of an [`AnswerKey`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawKey {
    List(Vec<usize>),
    Map(BTreeMap<String, usize>),
}

/// Question index (0-based) to correct choice index (0-based).
///
/// Reads either an array of choices or an object keyed by the question index
/// as a string, e.g. `{"0": 2, "1": 0}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKey", into = "BTreeMap<String, usize>")]
pub struct AnswerKey {
    answers: BTreeMap<usize, usize>,
}

impl TryFrom<RawKey> for AnswerKey {
    type Error = String;

    fn try_from(raw: RawKey) -> Result<Self, Self::Error> {
        let answers = match raw {
            RawKey::List(choices) => choices.into_iter().enumerate().collect(),
            RawKey::Map(map) => map
                .into_iter()
                .map(|(k, v)| {
                    k.trim()
                        .parse::<usize>()
                        .map(|i| (i, v))
                        .map_err(|_| format!("answer key index {k:?} is not a number"))
                })
                .collect::<Result<_, _>>()?,
        };
        Ok(Self { answers })
    }
}

impl From<AnswerKey> for BTreeMap<String, usize> {
    fn from(key: AnswerKey) -> Self {
        key.answers.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

impl AnswerKey {
    pub fn from_choices(choices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            answers: choices.into_iter().enumerate().collect(),
        }
    }

    pub fn get(&self, question_index: usize) -> Option<usize> {
        self.answers.get(&question_index).copied()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// One entry per question, each naming an existing bubble.
    pub fn validate_against(&self, template: &Template) -> Result<(), ConfigurationError> {
        for question in &template.answer_area.questions {
            let choice = self
                .get(question.key_index())
                .ok_or(ConfigurationError::MissingQuestion {
                    question: question.number,
                })?;
            if choice >= question.bubbles.len() {
                return Err(ConfigurationError::ChoiceOutOfRange {
                    question: question.number,
                    choice,
                    choices: question.bubbles.len(),
                });
            }
        }
        for &index in self.answers.keys() {
            let known = template
                .answer_area
                .questions
                .iter()
                .any(|q| q.key_index() == index);
            if !known {
                return Err(ConfigurationError::ExtraQuestion { index });
            }
        }
        Ok(())
    }
}

/// Several keys of one exam, selected by the exam code read from the quiz id grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKeyBook {
    pub keys: BTreeMap<String, AnswerKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AnswerKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySource {
    Book(AnswerKeyBook),
    Single(AnswerKey),
}

impl From<AnswerKey> for KeySource {
    fn from(key: AnswerKey) -> Self {
        KeySource::Single(key)
    }
}

impl KeySource {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        read_json(path.as_ref())
    }

    /// Whether the key depends on the decoded exam code.
    pub fn needs_exam_code(&self) -> bool {
        matches!(self, KeySource::Book(_))
    }

    pub fn resolve(&self, exam_code: Option<&str>) -> Result<&AnswerKey, ConfigurationError> {
        match self {
            KeySource::Single(key) => Ok(key),
            KeySource::Book(book) => match exam_code {
                Some(code) => book
                    .keys
                    .get(code)
                    .or(book.default.as_ref())
                    .ok_or_else(|| ConfigurationError::UnknownExamCode {
                        code: code.to_string(),
                    }),
                None => book.default.as_ref().ok_or(ConfigurationError::ExamCodeUnavailable),
            },
        }
    }

    pub fn validate_against(&self, template: &Template) -> Result<(), ConfigurationError> {
        match self {
            KeySource::Single(key) => key.validate_against(template),
            KeySource::Book(book) => {
                for key in book.keys.values().chain(book.default.iter()) {
                    key.validate_against(template)?;
                }
                Ok(())
            }
        }
    }
}
