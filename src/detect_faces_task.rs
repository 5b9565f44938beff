// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::*;
use rayon::prelude::*;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use fotema_mtcnn_core::InferenceOracle;

use crate::face_extractor::{Face, FaceExtractor};
use crate::photo::{PhotoSource, PictureId};

/// Detects faces for a batch of pictures on the rayon thread pool.
pub struct DetectFacesTask<O, S> {
    // Stop flag
    stop: Arc<AtomicBool>,

    extractor: FaceExtractor<O>,

    source: S,
}

impl<O, S> DetectFacesTask<O, S>
where
    O: InferenceOracle + Sync,
    S: PhotoSource + Sync,
{
    pub fn new(stop: Arc<AtomicBool>, extractor: FaceExtractor<O>, source: S) -> Self {
        DetectFacesTask {
            stop,
            extractor,
            source,
        }
    }

    /// Detects faces in one picture.
    pub fn detect_for_one(&self, picture_id: PictureId) -> Result<Vec<Face>> {
        self.extractor.extract(&self.source, picture_id)
    }

    /// Detects faces in every picture, in no particular order.
    ///
    /// Once the stop flag is raised no further pictures are started, so
    /// the result may hold fewer entries than `pictures`. Pictures already
    /// in progress run to completion.
    pub fn detect(&self, pictures: &[PictureId]) -> Vec<(PictureId, Result<Vec<Face>>)> {
        let start = std::time::Instant::now();

        let count = pictures.len();
        info!("Found {} photos as candidates for face detection", count);

        if count == 0 {
            return Vec::new();
        }

        let results: Vec<(PictureId, Result<Vec<Face>>)> = pictures
            .par_iter()
            .take_any_while(|_| !self.stop.load(Ordering::Relaxed))
            .map(|picture_id| {
                let result = self.detect_for_one(*picture_id);
                if let Err(ref e) = result {
                    error!(
                        "Failed detecting faces: Picture {}. Error: {:?}",
                        picture_id, e
                    );
                }
                (*picture_id, result)
            })
            .collect();

        info!(
            "Detected faces in {} of {} photos in {} seconds.",
            results.len(),
            count,
            start.elapsed().as_secs()
        );

        results
    }
}
