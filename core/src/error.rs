// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use strum::{AsRefStr, Display};
use thiserror::Error;

use crate::mtcnn::oracle::OracleError;

/// Cascade stage, used to report where a detection failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Proposal,
    Refine,
    Output,
}

/// Errors that abort a whole detection call.
///
/// A detector without a model is not an error: it finds no faces.
#[derive(Error, Debug)]
pub enum Error {
    /// The inference oracle failed while running a batch.
    #[error("Inference failed in {stage} stage: {source}")]
    Oracle {
        stage: Stage,
        #[source]
        source: OracleError,
    },

    /// The inference oracle returned tensors of an unexpected shape.
    #[error("Inference output for {stage} stage has shape {actual:?}, expected {expected:?}")]
    OutputShape {
        stage: Stage,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Image buffer error: {0}")]
    ImageBuffer(#[from] fast_image_resize::ImageBufferError),

    #[error("Image resize error: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("Tensor shape error: {0}")]
    Tensor(#[from] ndarray::ShapeError),
}
