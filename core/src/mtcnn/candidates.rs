// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use ndarray::{ArrayView2, ArrayView3};

use super::face_box::FaceBox;

/// Pixel step between adjacent proposal network outputs.
const STRIDE: f32 = 2.0;

/// Proposal window edge less one, as edges are inclusive.
const CELL_EXTENT: f32 = 11.0;

/// Turns the proposal network's score and offset grids for one pyramid
/// level into candidate boxes in source image coordinates.
///
/// Every cell scoring above `threshold` yields one box. Cells are visited
/// row by row.
///
/// # Panics
///
/// `offsets` must have shape (rows, cols, 4) for a (rows, cols) `scores` grid.
pub fn generate_candidates(
    scores: ArrayView2<'_, f32>,
    offsets: ArrayView3<'_, f32>,
    scale: f32,
    threshold: f32,
) -> Vec<FaceBox> {
    scores
        .indexed_iter()
        .filter(|(_, score)| **score > threshold)
        .map(|((y, x), score)| {
            let bbr: [f32; 4] = std::array::from_fn(|i| offsets[[y, x, i]]);

            let x = x as f32;
            let y = y as f32;

            FaceBox {
                left: (x * STRIDE / scale).round() as i32,
                top: (y * STRIDE / scale).round() as i32,
                right: ((x * STRIDE + CELL_EXTENT) / scale).round() as i32,
                bottom: ((y * STRIDE + CELL_EXTENT) / scale).round() as i32,
                score: *score,
                bbr,
                ..FaceBox::default()
            }
        })
        .collect()
}
