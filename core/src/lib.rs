// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod error;
pub mod mtcnn;

pub use error::Error;
pub use error::Stage;
pub use mtcnn::face_box::{FaceBox, IouMode, Landmark, LandmarkKind, LANDMARK_COUNT};
pub use mtcnn::mtcnn_config::MtCnnParams;
pub use mtcnn::oracle::{InferenceOracle, OracleError, OutputBatch, ProposalMaps, RefineBatch};
pub use mtcnn::MtCnn;

/// A typedef of the result returned by many methods.
pub type Result<T, E = Error> = std::result::Result<T, E>;
