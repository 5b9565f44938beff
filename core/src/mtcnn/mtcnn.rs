// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use image::RgbImage;
use itertools::Itertools;
use ndarray::Array4;
use tracing::{debug, error, warn};

use super::calibration::{calibrate_all, square_and_clamp_all};
use super::candidates::generate_candidates;
use super::face_box::{FaceBox, Landmark, LANDMARK_COUNT};
use super::mtcnn_config::*;
use super::non_max_suppression::{compact, suppress};
use super::oracle::{InferenceOracle, OracleError};
use super::sampling::{build_pyramid, crop_and_resize, image_to_tensor, transpose};
use crate::{Error, Result, Stage};

/// Multi-task cascaded face detector.
///
/// Runs a proposal, a refine and an output stage over an image, each
/// stage pruning and tightening the boxes of the one before. Holds no
/// state between calls, so one detector can serve many threads when its
/// oracle can.
pub struct MtCnn<O> {
    /// None when the model could not be loaded.
    oracle: Option<O>,
    params: MtCnnParams,
}

impl<O: InferenceOracle> MtCnn<O> {
    pub fn new(oracle: O, params: MtCnnParams) -> Self {
        Self {
            oracle: Some(oracle),
            params,
        }
    }

    /// Builds a detector from a model loader.
    ///
    /// A loader failure is logged and yields a detector that finds no faces.
    pub fn load<F>(loader: F, params: MtCnnParams) -> Self
    where
        F: FnOnce() -> std::result::Result<O, OracleError>,
    {
        match loader() {
            Ok(oracle) => Self::new(oracle, params),
            Err(e) => {
                error!("Failed loading face detection model: {}", e);
                Self {
                    oracle: None,
                    params,
                }
            }
        }
    }

    /// True if a model is loaded.
    pub fn is_available(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn params(&self) -> &MtCnnParams {
        &self.params
    }

    /// Detects faces at least as large as the configured minimum face size.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>> {
        self.detect_faces(image, self.params.min_face_size)
    }

    /// Detects faces of `min_face_size` pixels or larger.
    ///
    /// Returned boxes are live, calibrated, and carry landmarks.
    pub fn detect_faces(&self, image: &RgbImage, min_face_size: f32) -> Result<Vec<FaceBox>> {
        let Some(oracle) = self.oracle.as_ref() else {
            warn!("Face detection model unavailable. Reporting no faces.");
            return Ok(Vec::new());
        };

        let start = std::time::Instant::now();

        let boxes = self.propose(oracle, image, min_face_size)?;
        debug!("Proposal stage kept {} boxes", boxes.len());

        let boxes = self.refine(oracle, image, boxes)?;
        debug!("Refine stage kept {} boxes", boxes.len());

        let faces = self.output(oracle, image, boxes)?;
        debug!(
            "Output stage kept {} faces from {}x{} image in {} ms",
            faces.len(),
            image.width(),
            image.height(),
            start.elapsed().as_millis()
        );

        Ok(faces)
    }

    fn propose(&self, oracle: &O, image: &RgbImage, min_face_size: f32) -> Result<Vec<FaceBox>> {
        let [per_scale_nms, pooled_nms, _, _] = self.params.nms_thresholds;
        let threshold = self.params.proposal_threshold();

        let mut pooled = Vec::new();

        for level in build_pyramid(image, min_face_size, self.params.scale_factor) {
            let (scaled, scale) = level?;

            let input = image_to_tensor(&scaled);
            let maps = oracle
                .propose(input.view())
                .map_err(|source| Error::Oracle {
                    stage: Stage::Proposal,
                    source,
                })?;

            let (rows, cols) = maps.scores.dim();
            check_shape(Stage::Proposal, maps.offsets.shape(), &[rows, cols, 4])?;

            let mut candidates =
                generate_candidates(maps.scores.view(), maps.offsets.view(), scale, threshold);
            suppress(&mut candidates, per_scale_nms, PER_SCALE_NMS_MODE);
            let candidates = compact(candidates);

            debug!("Scale {:.4} proposed {} boxes", scale, candidates.len());
            pooled.extend(candidates);
        }

        suppress(&mut pooled, pooled_nms, POOLED_NMS_MODE);
        calibrate_all(&mut pooled);
        square_and_clamp_all(&mut pooled, image.width(), image.height());

        Ok(compact(pooled))
    }

    fn refine(&self, oracle: &O, image: &RgbImage, boxes: Vec<FaceBox>) -> Result<Vec<FaceBox>> {
        if boxes.is_empty() {
            return Ok(boxes);
        }

        let count = boxes.len();
        let input = crops_to_tensor(image, &boxes, REFINE_INPUT_SIZE)?;
        let batch = oracle.refine(input.view()).map_err(|source| Error::Oracle {
            stage: Stage::Refine,
            source,
        })?;

        check_shape(Stage::Refine, batch.probabilities.shape(), &[count, 2])?;
        check_shape(Stage::Refine, batch.offsets.shape(), &[count, 4])?;

        let threshold = self.params.refine_threshold();
        let mut boxes = boxes
            .into_iter()
            .zip(batch.probabilities.rows())
            .zip(batch.offsets.rows())
            .filter_map(|((mut face_box, probabilities), offsets)| {
                face_box.score = probabilities[1];
                face_box.bbr = [offsets[0], offsets[1], offsets[2], offsets[3]];
                (face_box.score >= threshold).then_some(face_box)
            })
            .collect_vec();

        suppress(&mut boxes, self.params.nms_thresholds[2], REFINE_NMS_MODE);
        calibrate_all(&mut boxes);
        square_and_clamp_all(&mut boxes, image.width(), image.height());

        Ok(compact(boxes))
    }

    fn output(&self, oracle: &O, image: &RgbImage, boxes: Vec<FaceBox>) -> Result<Vec<FaceBox>> {
        if boxes.is_empty() {
            return Ok(boxes);
        }

        let count = boxes.len();
        let input = crops_to_tensor(image, &boxes, OUTPUT_INPUT_SIZE)?;
        let batch = oracle.output(input.view()).map_err(|source| Error::Oracle {
            stage: Stage::Output,
            source,
        })?;

        check_shape(Stage::Output, batch.probabilities.shape(), &[count, 2])?;
        check_shape(Stage::Output, batch.offsets.shape(), &[count, 4])?;
        check_shape(Stage::Output, batch.landmarks.shape(), &[count, 2 * LANDMARK_COUNT])?;

        let threshold = self.params.output_threshold();
        let mut boxes = boxes
            .into_iter()
            .zip(batch.probabilities.rows())
            .zip(batch.offsets.rows())
            .zip(batch.landmarks.rows())
            .filter_map(|(((mut face_box, probabilities), offsets), landmarks)| {
                face_box.score = probabilities[1];
                face_box.bbr = [offsets[0], offsets[1], offsets[2], offsets[3]];

                let left = face_box.left as f32;
                let top = face_box.top as f32;
                let width = face_box.width() as f32;
                let height = face_box.height() as f32;
                for (i, landmark) in face_box.landmarks.iter_mut().enumerate() {
                    *landmark = Landmark::new(
                        left + landmarks[i] * width,
                        top + landmarks[i + LANDMARK_COUNT] * height,
                    );
                }

                (face_box.score >= threshold).then_some(face_box)
            })
            .collect_vec();

        calibrate_all(&mut boxes);
        suppress(&mut boxes, self.params.nms_thresholds[3], OUTPUT_NMS_MODE);

        Ok(compact(boxes))
    }
}

/// Crops and resizes every box into one (N, size, size, 3) batch, each
/// crop transposed to match the proposal input layout.
fn crops_to_tensor(image: &RgbImage, boxes: &[FaceBox], size: u32) -> Result<Array4<f32>> {
    let edge = size as usize;
    let mut data = Vec::with_capacity(boxes.len() * edge * edge * 3);

    for face_box in boxes {
        let crop = crop_and_resize(image, face_box, size)?;
        data.extend(transpose(&crop, edge, edge, 3));
    }

    Ok(Array4::from_shape_vec((boxes.len(), edge, edge, 3), data)?)
}

fn check_shape(stage: Stage, actual: &[usize], expected: &[usize]) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::OutputShape {
            stage,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}
