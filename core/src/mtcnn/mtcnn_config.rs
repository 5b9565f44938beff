// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use super::face_box::IouMode;
use super::sampling::DEFAULT_SCALE_FACTOR;

/// Input edge of the refinement network.
pub(crate) const REFINE_INPUT_SIZE: u32 = 24;

/// Input edge of the output network.
pub(crate) const OUTPUT_INPUT_SIZE: u32 = 48;

/// Suppression applied within each pyramid level.
pub(crate) const PER_SCALE_NMS_MODE: IouMode = IouMode::Union;
/// Suppression applied to the proposals pooled across all levels.
pub(crate) const POOLED_NMS_MODE: IouMode = IouMode::Union;
pub(crate) const REFINE_NMS_MODE: IouMode = IouMode::Union;
/// The output stage divides overlap by the smaller area.
pub(crate) const OUTPUT_NMS_MODE: IouMode = IouMode::Min;

/// Tuning for the face detection cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct MtCnnParams {
    /// Smallest face, in source pixels, worth looking for.
    pub min_face_size: f32,

    /// Ratio between face sizes of consecutive pyramid levels, in (0, 1).
    pub scale_factor: f32,

    /// Score thresholds for the proposal, refine and output stages.
    pub thresholds: [f32; 3],

    /// Overlap thresholds for per-level, pooled, refine and output suppression.
    pub nms_thresholds: [f32; 4],
}

impl Default for MtCnnParams {
    fn default() -> Self {
        Self {
            min_face_size: 20.0,
            scale_factor: DEFAULT_SCALE_FACTOR,
            thresholds: [0.6, 0.7, 0.7],
            nms_thresholds: [0.5, 0.7, 0.7, 0.7],
        }
    }
}

impl MtCnnParams {
    pub fn proposal_threshold(&self) -> f32 {
        self.thresholds[0]
    }

    pub fn refine_threshold(&self) -> f32 {
        self.thresholds[1]
    }

    pub fn output_threshold(&self) -> f32 {
        self.thresholds[2]
    }
}
