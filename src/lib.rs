// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod detect_faces_task;
pub mod face_extractor;
pub mod photo;

pub use detect_faces_task::DetectFacesTask;
pub use face_extractor::{ExtractorParams, Face, FaceExtractor, Rect};
pub use photo::{PathPhotoSource, PhotoSource, PictureId};
