// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::photo::{PhotoSource, PictureId};
use anyhow::*;

use std::result::Result::Ok;

use fast_image_resize as fr;
use fr::images::{Image, ImageRef};
use fr::{PixelType, ResizeOptions, Resizer};

use fotema_mtcnn_core::{FaceBox, InferenceOracle, Landmark, LandmarkKind, MtCnn, LANDMARK_COUNT};
use image::{DynamicImage, RgbImage};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct Face {
    /// Bounds of detected face.
    pub bounds: Rect,

    /// Confidence (0.0 to 1.0) that the detected face is actually a face.
    pub confidence: f32,

    /// Facial landmarks in source image coordinates.
    landmarks: [Landmark; LANDMARK_COUNT],

    /// Square image around the face.
    /// Expanded beyond the bounds to capture the whole head.
    pub thumbnail: RgbImage,
}

impl Face {
    fn landmark(&self, kind: LandmarkKind) -> (f32, f32) {
        let landmark = self.landmarks[kind.index()];
        (landmark.x, landmark.y)
    }

    pub fn left_eye(&self) -> (f32, f32) {
        self.landmark(LandmarkKind::LeftEye)
    }

    pub fn right_eye(&self) -> (f32, f32) {
        self.landmark(LandmarkKind::RightEye)
    }

    pub fn nose(&self) -> (f32, f32) {
        self.landmark(LandmarkKind::Nose)
    }

    pub fn left_mouth_corner(&self) -> (f32, f32) {
        self.landmark(LandmarkKind::LeftMouthCorner)
    }

    pub fn right_mouth_corner(&self) -> (f32, f32) {
        self.landmark(LandmarkKind::RightMouthCorner)
    }

    /// Midpoint between the eyes.
    pub fn centre(&self) -> (f32, f32) {
        eye_midpoint(&self.landmarks)
    }
}

fn eye_midpoint(landmarks: &[Landmark; LANDMARK_COUNT]) -> (f32, f32) {
    let left = landmarks[LandmarkKind::LeftEye.index()];
    let right = landmarks[LandmarkKind::RightEye.index()];
    ((left.x + right.x) / 2.0, (left.y + right.y) / 2.0)
}

/// Tuning for face extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorParams {
    /// Faces the detector is less sure of than this are discarded.
    pub min_confidence: f32,

    /// Edge of the square face thumbnail, in pixels.
    pub thumbnail_edge: u32,

    /// Thumbnail edge relative to the longest side of the face bounds.
    pub thumbnail_expansion: f32,
}

impl Default for ExtractorParams {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            thumbnail_edge: 200,
            thumbnail_expansion: 1.6,
        }
    }
}

pub struct FaceExtractor<O> {
    mtcnn: MtCnn<O>,
    params: ExtractorParams,
}

impl<O: InferenceOracle> FaceExtractor<O> {
    pub fn build(mtcnn: MtCnn<O>, params: ExtractorParams) -> FaceExtractor<O> {
        if !mtcnn.is_available() {
            debug!("Face extractor built without a face detection model");
        }
        FaceExtractor { mtcnn, params }
    }

    /// Loads a picture from `source` and identifies the faces in it.
    pub fn extract(&self, source: &impl PhotoSource, picture_id: PictureId) -> Result<Vec<Face>> {
        let image = source.load(picture_id)?;
        self.extract_faces(picture_id, &image)
    }

    /// Identify faces in a picture.
    pub fn extract_faces(&self, picture_id: PictureId, image: &DynamicImage) -> Result<Vec<Face>> {
        let image = image.to_rgb8();

        let detected = self.mtcnn.detect(&image)?;

        let faces = detected
            .into_iter()
            .filter(|f| f.score >= self.params.min_confidence)
            .filter_map(|f| match self.to_face(&image, f) {
                Ok(face) => Some(face),
                Err(e) => {
                    warn!("Skipping face in picture {}: {:?}", picture_id, e);
                    None
                }
            })
            .collect::<Vec<Face>>();

        debug!("Picture {} has {} faces", picture_id, faces.len());

        Ok(faces)
    }

    fn to_face(&self, image: &RgbImage, face_box: FaceBox) -> Result<Face> {
        // Output calibration may push edges past the picture, so clip them.
        let left = face_box.left.max(0);
        let top = face_box.top.max(0);
        let right = face_box.right.min(image.width() as i32 - 1);
        let bottom = face_box.bottom.min(image.height() as i32 - 1);

        let bounds = Rect {
            x: left as u32,
            y: top as u32,
            width: (right - left + 1).max(0) as u32,
            height: (bottom - top + 1).max(0) as u32,
        };

        let centre = eye_midpoint(&face_box.landmarks);
        let thumbnail = self.thumbnail(image, &bounds, centre)?;

        Ok(Face {
            bounds,
            confidence: face_box.score,
            landmarks: face_box.landmarks,
            thumbnail,
        })
    }

    /// Extract face and scale it to a thumbnail.
    /// The bounding box is pretty tight, so make it a bit bigger.
    /// Also, make the box a square, moved inside the picture if the
    /// face is near an edge.
    fn thumbnail(&self, image: &RgbImage, bounds: &Rect, centre: (f32, f32)) -> Result<RgbImage> {
        let image_width = image.width() as f32;
        let image_height = image.height() as f32;

        let (centre_x, centre_y) = centre;
        if !centre_x.is_finite() || !centre_y.is_finite() {
            bail!("Face at {:?} has no usable centre", bounds);
        }

        let longest = f32::max(bounds.width as f32, bounds.height as f32);
        let edge = (longest * self.params.thumbnail_expansion)
            .min(image_width)
            .min(image_height)
            .max(1.0);

        if edge > image_width || edge > image_height {
            bail!("Picture {}x{} is too small for a thumbnail", image.width(), image.height());
        }

        let x = (centre_x - edge / 2.0).clamp(0.0, image_width - edge);
        let y = (centre_y - edge / 2.0).clamp(0.0, image_height - edge);

        let src = ImageRef::new(image.width(), image.height(), image.as_raw(), PixelType::U8x3)?;
        let size = self.params.thumbnail_edge;
        let mut dst = Image::new(size, size, PixelType::U8x3);

        let options = ResizeOptions::new().crop(x as f64, y as f64, edge as f64, edge as f64);
        let mut resizer = Resizer::new();
        resizer.resize(&src, &mut dst, &options)?;

        RgbImage::from_raw(size, size, dst.into_vec())
            .ok_or_else(|| anyhow!("Thumbnail buffer is not {}x{}", size, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fotema_mtcnn_core::{
        MtCnnParams, OracleError, OutputBatch, ProposalMaps, RefineBatch,
    };
    use image::Rgb;
    use ndarray::{Array2, Array3, ArrayView4};

    struct OneFace {
        score: f32,
    }

    impl InferenceOracle for OneFace {
        fn propose(&self, image: ArrayView4<'_, f32>) -> Result<ProposalMaps, OracleError> {
            let rows = (image.shape()[2] as f32 * 0.5 - 5.0).ceil() as usize;
            let cols = (image.shape()[1] as f32 * 0.5 - 5.0).ceil() as usize;
            let mut scores = Array2::zeros((rows, cols));
            scores[[rows / 2, cols / 2]] = self.score;
            Ok(ProposalMaps {
                scores,
                offsets: Array3::zeros((rows, cols, 4)),
            })
        }

        fn refine(&self, crops: ArrayView4<'_, f32>) -> Result<RefineBatch, OracleError> {
            let n = crops.shape()[0];
            Ok(RefineBatch {
                probabilities: Array2::from_elem((n, 2), self.score),
                offsets: Array2::zeros((n, 4)),
            })
        }

        fn output(&self, crops: ArrayView4<'_, f32>) -> Result<OutputBatch, OracleError> {
            let n = crops.shape()[0];
            let points = [0.3, 0.7, 0.5, 0.35, 0.65, 0.4, 0.4, 0.6, 0.8, 0.8];
            Ok(OutputBatch {
                probabilities: Array2::from_elem((n, 2), self.score),
                offsets: Array2::zeros((n, 4)),
                landmarks: Array2::from_shape_fn((n, 10), |(_, c)| points[c]),
            })
        }
    }

    fn extractor(score: f32, params: ExtractorParams) -> FaceExtractor<OneFace> {
        let mtcnn = MtCnn::new(
            OneFace { score },
            MtCnnParams {
                min_face_size: 40.0,
                ..MtCnnParams::default()
            },
        );
        FaceExtractor::build(mtcnn, params)
    }

    fn picture() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 100, Rgb([200, 150, 100])))
    }

    #[test]
    fn test_extract_faces() {
        let extractor = extractor(0.9, ExtractorParams::default());

        let faces = extractor.extract_faces(PictureId::new(1), &picture()).unwrap();

        assert_eq!(faces.len(), 1);
        let face = &faces[0];
        assert_eq!(face.confidence, 0.9);
        assert_eq!(face.bounds.width, face.bounds.height);
        assert_eq!(face.thumbnail.dimensions(), (200, 200));
        assert!(face.left_eye().0 < face.right_eye().0);
        assert!(face.nose().1 < face.left_mouth_corner().1);
        assert_eq!(face.left_mouth_corner().1, face.right_mouth_corner().1);
    }

    #[test]
    fn test_min_confidence_filters_faces() {
        let params = ExtractorParams {
            min_confidence: 0.95,
            ..ExtractorParams::default()
        };
        let extractor = extractor(0.9, params);

        let faces = extractor.extract_faces(PictureId::new(1), &picture()).unwrap();

        assert!(faces.is_empty());
    }

    #[test]
    fn test_centre_is_between_eyes() {
        let extractor = extractor(0.9, ExtractorParams::default());

        let faces = extractor.extract_faces(PictureId::new(1), &picture()).unwrap();

        let face = &faces[0];
        let (x, y) = face.centre();
        assert_eq!(x, (face.left_eye().0 + face.right_eye().0) / 2.0);
        assert_eq!(y, face.left_eye().1);
    }

    /// Scores the rightmost middle cell on every level, widens boxes to
    /// the right while refining, and puts both eyes on the right edge.
    struct RightEdgeFace;

    impl InferenceOracle for RightEdgeFace {
        fn propose(&self, image: ArrayView4<'_, f32>) -> Result<ProposalMaps, OracleError> {
            let rows = (image.shape()[2] as f32 * 0.5 - 5.0).ceil() as usize;
            let cols = (image.shape()[1] as f32 * 0.5 - 5.0).ceil() as usize;
            let mut scores = Array2::zeros((rows, cols));
            scores[[rows / 2, cols - 1]] = 0.9;
            Ok(ProposalMaps {
                scores,
                offsets: Array3::zeros((rows, cols, 4)),
            })
        }

        fn refine(&self, crops: ArrayView4<'_, f32>) -> Result<RefineBatch, OracleError> {
            let n = crops.shape()[0];
            Ok(RefineBatch {
                probabilities: Array2::from_elem((n, 2), 0.9),
                offsets: Array2::from_shape_fn((n, 4), |(_, c)| if c == 2 { 0.3 } else { 0.0 }),
            })
        }

        fn output(&self, crops: ArrayView4<'_, f32>) -> Result<OutputBatch, OracleError> {
            let n = crops.shape()[0];
            let points = [1.0, 1.0, 0.5, 0.35, 0.65, 0.4, 0.4, 0.6, 0.8, 0.8];
            Ok(OutputBatch {
                probabilities: Array2::from_elem((n, 2), 0.9),
                offsets: Array2::zeros((n, 4)),
                landmarks: Array2::from_shape_fn((n, 10), |(_, c)| points[c]),
            })
        }
    }

    #[test]
    fn test_face_with_centre_on_picture_edge() {
        let mtcnn = MtCnn::new(
            RightEdgeFace,
            MtCnnParams {
                min_face_size: 40.0,
                ..MtCnnParams::default()
            },
        );
        let extractor = FaceExtractor::build(mtcnn, ExtractorParams::default());
        let picture = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([200, 150, 100])));

        let faces = extractor.extract_faces(PictureId::new(1), &picture).unwrap();

        assert!(!faces.is_empty());
        for face in &faces {
            assert_eq!(face.centre().0, 100.0);
            assert!(face.bounds.x + face.bounds.width <= 100);
            assert_eq!(face.thumbnail.dimensions(), (200, 200));
        }
    }

    #[test]
    fn test_thumbnail_at_picture_corner() {
        let extractor = extractor(0.9, ExtractorParams::default());
        let image = picture().to_rgb8();
        let face_box = FaceBox {
            landmarks: [Landmark::new(120.0, 100.0); LANDMARK_COUNT],
            ..FaceBox::new(80, 60, 119, 99, 0.9)
        };

        let face = extractor.to_face(&image, face_box).unwrap();

        assert_eq!(face.centre(), (120.0, 100.0));
        assert_eq!(face.thumbnail.dimensions(), (200, 200));
    }

    #[test]
    fn test_bounds_are_clipped_to_picture() {
        let extractor = extractor(0.9, ExtractorParams::default());
        let image = picture().to_rgb8();

        let top_left = extractor
            .to_face(&image, FaceBox::new(-10, -5, 29, 34, 0.9))
            .unwrap();
        assert_eq!(
            top_left.bounds,
            Rect {
                x: 0,
                y: 0,
                width: 30,
                height: 35
            }
        );

        let bottom_right = extractor
            .to_face(&image, FaceBox::new(100, 80, 129, 109, 0.9))
            .unwrap();
        assert_eq!(
            bottom_right.bounds,
            Rect {
                x: 100,
                y: 80,
                width: 20,
                height: 20
            }
        );
    }
}
