// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::*;
use image::{DynamicImage, ImageReader};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::result::Result::Ok;

/// Identifier of a picture in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PictureId(i64);

impl PictureId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> i64 {
        self.0
    }
}

impl Display for PictureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Somewhere decoded pictures can be fetched from.
pub trait PhotoSource {
    fn load(&self, picture_id: PictureId) -> Result<DynamicImage>;
}

/// Pictures on the local file system, looked up by ID.
#[derive(Debug, Clone, Default)]
pub struct PathPhotoSource {
    paths: HashMap<PictureId, PathBuf>,
}

impl PathPhotoSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, picture_id: PictureId, path: impl Into<PathBuf>) {
        self.paths.insert(picture_id, path.into());
    }

    pub fn get_picture_path(&self, picture_id: PictureId) -> Option<&Path> {
        self.paths.get(&picture_id).map(|p| p.as_path())
    }
}

impl FromIterator<(PictureId, PathBuf)> for PathPhotoSource {
    fn from_iter<I: IntoIterator<Item = (PictureId, PathBuf)>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

impl PhotoSource for PathPhotoSource {
    fn load(&self, picture_id: PictureId) -> Result<DynamicImage> {
        let path = self
            .get_picture_path(picture_id)
            .ok_or_else(|| anyhow!("No file for picture {}", picture_id))?;

        let image = ImageReader::open(path)
            .with_context(|| format!("open picture {:?}", path))?
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("decode picture {:?}", path))?;

        Ok(image)
    }
}
