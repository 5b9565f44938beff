// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use ndarray::{Array2, Array3, ArrayView4};

/// Error raised by an inference backend.
pub type OracleError = Box<dyn std::error::Error + Send + Sync>;

/// Output of the proposal network for one pyramid level.
#[derive(Debug, Clone)]
pub struct ProposalMaps {
    /// Face probability per grid cell, shape (H', W').
    pub scores: Array2<f32>,

    /// Regression deltas per grid cell, shape (H', W', 4).
    pub offsets: Array3<f32>,
}

/// Output of the refinement network for a batch of 24x24 crops.
#[derive(Debug, Clone)]
pub struct RefineBatch {
    /// Shape (N, 2). Column 1 is the face probability.
    pub probabilities: Array2<f32>,

    /// Shape (N, 4).
    pub offsets: Array2<f32>,
}

/// Output of the output network for a batch of 48x48 crops.
#[derive(Debug, Clone)]
pub struct OutputBatch {
    /// Shape (N, 2). Column 1 is the face probability.
    pub probabilities: Array2<f32>,

    /// Shape (N, 4).
    pub offsets: Array2<f32>,

    /// Shape (N, 10). Columns 0..5 are x offsets and 5..10 are y offsets
    /// of the five landmarks, relative to the box, in [0, 1].
    pub landmarks: Array2<f32>,
}

/// A trained three-stage network.
///
/// Inputs are normalised pixels laid out as (batch, x, y, channel), i.e.
/// every image is transposed. Calls are blocking and the cascade never
/// makes two at once, although implementations may use threads internally.
pub trait InferenceOracle {
    /// Stage 1. Input shape (1, W, H, 3).
    /// Outputs have H' = ceil(H * 0.5 - 5) rows and W' = ceil(W * 0.5 - 5) columns.
    fn propose(&self, image: ArrayView4<'_, f32>) -> Result<ProposalMaps, OracleError>;

    /// Stage 2. Input shape (N, 24, 24, 3).
    fn refine(&self, crops: ArrayView4<'_, f32>) -> Result<RefineBatch, OracleError>;

    /// Stage 3. Input shape (N, 48, 48, 3).
    fn output(&self, crops: ArrayView4<'_, f32>) -> Result<OutputBatch, OracleError>;
}

impl<T: InferenceOracle + ?Sized> InferenceOracle for Box<T> {
    fn propose(&self, image: ArrayView4<'_, f32>) -> Result<ProposalMaps, OracleError> {
        (**self).propose(image)
    }

    fn refine(&self, crops: ArrayView4<'_, f32>) -> Result<RefineBatch, OracleError> {
        (**self).refine(crops)
    }

    fn output(&self, crops: ArrayView4<'_, f32>) -> Result<OutputBatch, OracleError> {
        (**self).output(crops)
    }
}
