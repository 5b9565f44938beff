// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod calibration;
pub mod candidates;
pub mod face_box;
#[allow(clippy::module_inception)]
pub mod mtcnn;
pub mod mtcnn_config;
pub mod non_max_suppression;
pub mod oracle;
pub mod sampling;

pub use face_box::FaceBox;
pub use mtcnn::MtCnn;
