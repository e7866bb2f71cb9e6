//! Identifier grids: one digit per column, read top to bottom.

use image::GrayImage;

use crate::bubble::{BubbleReading, classify_bubbles, strongest_filled};
use crate::imaging::ImagingError;
use crate::region::{PixelRect, bubble_bounds, threshold_region};
use crate::template::{IdentifierSection, SectionKind};

pub const UNRESOLVED: char = '?';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReading {
    pub bounds: PixelRect,
    pub readings: Vec<BubbleReading>,
    /// Index of the winning bubble in the column.
    pub winner: Option<usize>,
    pub value: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} id incomplete, unresolved columns {missing_columns:?} (read {partial})")]
pub struct DecodeIncomplete {
    pub kind: SectionKind,
    pub missing_columns: Vec<usize>,
    pub partial: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedId {
    pub kind: SectionKind,
    pub columns: Vec<ColumnReading>,
}

impl DecodedId {
    pub fn missing_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.value.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.columns.iter().all(|c| c.value.is_some())
    }

    /// Digits read so far with `?` for unresolved columns.
    pub fn partial(&self) -> String {
        self.columns
            .iter()
            .map(|c| match c.value {
                Some(d) => char::from(b'0' + d),
                None => UNRESOLVED,
            })
            .collect()
    }

    pub fn value(&self) -> Result<String, DecodeIncomplete> {
        if self.is_complete() {
            Ok(self.partial())
        } else {
            Err(DecodeIncomplete {
                kind: self.kind,
                missing_columns: self.missing_columns(),
                partial: self.partial(),
            })
        }
    }
}

/// Reads each column of `section` from the canonical grayscale image.
///
/// Every column is thresholded on its own bounding box. Among bubbles with at
/// least `min_pixels` of ink the one with the most ink wins; a column with no
/// such bubble stays unresolved rather than guessed.
pub fn decode_identifier(
    section: &IdentifierSection,
    gray: &GrayImage,
    min_pixels: u32,
) -> Result<DecodedId, ImagingError> {
    let mut columns = Vec::with_capacity(section.columns.len());
    for column in &section.columns {
        let bounds = bubble_bounds(&column.bubbles, gray.width(), gray.height());
        let region = threshold_region(gray, bounds)?;
        let readings = classify_bubbles(&region, &column.bubbles, min_pixels);
        let winner = strongest_filled(&readings).map(|r| r.index);
        let value = winner.and_then(|i| column.bubbles[i].value);
        columns.push(ColumnReading {
            bounds,
            readings,
            winner,
            value,
        });
    }

    let decoded = DecodedId {
        kind: section.kind,
        columns,
    };
    if !decoded.is_complete() {
        tracing::warn!(
            kind = %section.kind,
            partial = %decoded.partial(),
            "identifier not fully decoded"
        );
    }
    Ok(decoded)
}
