//! 4x4 fiducial codebooks.
//!
//! A code is the 16-bit payload read row-major from the top-left cell, most
//! significant bit first, with white cells as `1`. Printed markers carry a
//! one-cell black border, so a rendered marker is 6x6 cells.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

pub const PAYLOAD_SIDE: usize = 4;
pub const MARKER_CELLS: usize = PAYLOAD_SIDE + 2;

/// OpenCV `DICT_4X4_50`, rotation-0 payloads. Any two codes differ in at
/// least 4 bits under every rotation.
const ARUCO_4X4_50: [u16; 50] = [
    0xB532, 0x0F9A, 0x332D, 0x9946, 0x549E, 0x79CD, 0x9E2E, 0xC4F2, 0xFEDA, 0xCF56,
    0xF991, 0x11A7, 0x0EB7, 0x2A0F, 0x24B1, 0x263E, 0x4665, 0x6600, 0x6C5E, 0x76AF,
    0x868B, 0xB02B, 0xCCD5, 0xDD82, 0xFE47, 0x9471, 0xACE4, 0xA554, 0x2123, 0x346F,
    0x4415, 0x57B2, 0x9ECF, 0xF0CB, 0x08AE, 0x0929, 0x1875, 0x04FF, 0x0DF6, 0x1C5A,
    0x1718, 0x2A28, 0x328C, 0x38B2, 0x24E8, 0x2EEB, 0x2D3F, 0x4B64, 0x502E, 0x5013,
];

/// A decoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeMatch {
    pub id: u32,
    /// Clockwise quarter turns applied to the sampled payload to match the code.
    pub rotation: u8,
    pub bit_errors: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerDictionary {
    codes: Vec<u16>,
}

impl Default for MarkerDictionary {
    fn default() -> Self {
        Self::aruco_4x4_50()
    }
}

impl MarkerDictionary {
    /// The dictionary printed sheets carry.
    pub fn aruco_4x4_50() -> Self {
        Self {
            codes: ARUCO_4X4_50.to_vec(),
        }
    }

    /// Codebook supplied by the caller, e.g. the rotation-0 payloads of a
    /// published ArUco 4x4 table. The index of a code is its marker id.
    pub fn from_codes(codes: Vec<u16>) -> Self {
        Self { codes }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code(&self, id: u32) -> Option<u16> {
        self.codes.get(id as usize).copied()
    }

    /// Nearest code under all four rotations, if within `max_bit_errors`.
    pub fn decode(&self, payload: u16, max_bit_errors: u32) -> Option<CodeMatch> {
        let mut best: Option<CodeMatch> = None;
        let mut rotated = payload;
        for rotation in 0..4u8 {
            for (id, &code) in self.codes.iter().enumerate() {
                let bit_errors = (rotated ^ code).count_ones();
                if best.is_none_or(|b| bit_errors < b.bit_errors) {
                    best = Some(CodeMatch {
                        id: id as u32,
                        rotation,
                        bit_errors,
                    });
                }
            }
            rotated = rotate_cw(rotated);
        }
        best.filter(|m| m.bit_errors <= max_bit_errors)
    }
}

/// Rotates a payload a quarter turn clockwise.
pub fn rotate_cw(code: u16) -> u16 {
    let n = PAYLOAD_SIDE;
    let mut out = 0u16;
    for row in 0..n {
        for col in 0..n {
            if payload_bit(code, row, col) {
                let (new_row, new_col) = (col, n - 1 - row);
                out |= 1 << (15 - (new_row * n + new_col));
            }
        }
    }
    out
}

pub fn payload_bit(code: u16, row: usize, col: usize) -> bool {
    (code >> (15 - (row * PAYLOAD_SIDE + col))) & 1 == 1
}

/// Draws marker `id` as a `6 * cell_px` square (border included, no quiet zone).
pub fn render_marker(dictionary: &MarkerDictionary, id: u32, cell_px: u32) -> Option<GrayImage> {
    let code = dictionary.code(id)?;
    let side = MARKER_CELLS as u32 * cell_px;
    let mut img = GrayImage::from_pixel(side, side, Luma([0]));

    for row in 0..PAYLOAD_SIDE {
        for col in 0..PAYLOAD_SIDE {
            if !payload_bit(code, row, col) {
                continue;
            }
            let x0 = (col as u32 + 1) * cell_px;
            let y0 = (row as u32 + 1) * cell_px;
            for y in y0..y0 + cell_px {
                for x in x0..x0 + cell_px {
                    img.put_pixel(x, y, Luma([255]));
                }
            }
        }
    }
    Some(img)
}
