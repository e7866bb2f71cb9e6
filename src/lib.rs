//! Optical mark recognition for printed multiple-choice answer sheets.
//!
//! A photographed sheet is located through its fiducial markers, warped into
//! the coordinate space of a [`template::Template`], and every answer and
//! identifier bubble is measured for ink. [`pipeline::Grader`] ties the stages
//! together and produces a [`pipeline::GradingResult`] plus an annotated image.

pub mod annotate;
pub mod answer_key;
pub mod bubble;
pub mod config;
pub mod id_decode;
pub mod imaging;
pub mod marker;
pub mod pipeline;
pub mod rectify;
pub mod region;
pub mod scoring;
pub mod template;

pub use answer_key::{AnswerKey, AnswerKeyBook, KeySource};
pub use config::{ConfigurationError, GraderConfig};
pub use id_decode::DecodeIncomplete;
pub use pipeline::{AlignmentCheck, GradeError, GradedSheet, Grader, GradingResult, check_alignment};
pub use rectify::AlignmentError;
pub use scoring::QuestionStatus;
pub use template::{SectionKind, Template, TemplateError};
