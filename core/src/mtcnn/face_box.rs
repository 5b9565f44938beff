// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use strum::{AsRefStr, EnumIter};

/// Number of landmarks the output stage produces per face.
pub const LANDMARK_COUNT: usize = 5;

/// Facial landmarks in the order the output stage emits them.
/// Left/right are from the observer's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    Nose,
    LeftMouthCorner,
    RightMouthCorner,
}

impl LandmarkKind {
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A point in source image pixel space.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// How overlap between two boxes is normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IouMode {
    /// Overlap divided by the union of both areas.
    Union,
    /// Overlap divided by the smaller of the two areas.
    Min,
}

/// A candidate or detected face.
///
/// Edges are inclusive pixel coordinates, so a box with `left == right`
/// is one pixel wide. A `deleted` box is a tombstone: it keeps its slot
/// in the candidate set so that positional indices stay stable for the
/// duration of a suppression pass, and is dropped when the set is
/// compacted.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FaceBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,

    /// Confidence (0.0 to 1.0) that the box holds a face.
    pub score: f32,

    /// Regression deltas for left, top, right and bottom, relative to
    /// width and height. Zeroed once applied.
    pub bbr: [f32; 4],

    /// Only populated by the output stage.
    pub landmarks: [Landmark; LANDMARK_COUNT],

    pub deleted: bool,
}

impl FaceBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32, score: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
            score,
            ..Self::default()
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.right - self.left + 1
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.bottom - self.top + 1
    }

    /// Area from the current edges.
    #[inline]
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// True when the box has collapsed to a line or inverted.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub fn landmark(&self, kind: LandmarkKind) -> Landmark {
        self.landmarks[kind.index()]
    }

    /// Overlap ratio between two live boxes. Zero when they do not overlap.
    pub fn intersection_over_union(&self, other: &FaceBox, mode: IouMode) -> f32 {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right);
        let bottom = self.bottom.min(other.bottom);

        let width = right - left + 1;
        let height = bottom - top + 1;
        if width <= 0 || height <= 0 {
            return 0.0;
        }

        let overlap = width as f32 * height as f32;
        let denominator = match mode {
            IouMode::Union => self.area() as f32 + other.area() as f32 - overlap,
            IouMode::Min => self.area().min(other.area()) as f32,
        };

        if denominator <= 0.0 {
            0.0
        } else {
            overlap / denominator
        }
    }

    /// Grows the shorter side to match the longer one, keeping the centre.
    pub fn to_square(&mut self) {
        let width = self.width();
        let height = self.height();
        if width > height {
            let diff = width - height;
            self.top -= diff / 2;
            self.bottom += (diff + 1) / 2;
        } else {
            let diff = height - width;
            self.left -= diff / 2;
            self.right += (diff + 1) / 2;
        }
    }

    /// Moves the edges inside `[0, width) x [0, height)`.
    ///
    /// The corners are pulled in along the diagonal so a square box stays
    /// square. Only a box larger than the image is clipped at the image
    /// bounds, and one that collapses is marked deleted.
    pub fn clamp_to_image(&mut self, width: u32, height: u32) {
        let width = width as i32;
        let height = height as i32;

        if self.left < 0 || self.top < 0 {
            let shift = i32::max(-self.left, -self.top);
            self.left += shift;
            self.top += shift;
        }

        if self.right >= width || self.bottom >= height {
            let shift = i32::max(self.right - width + 1, self.bottom - height + 1);
            self.right -= shift;
            self.bottom -= shift;
        }

        self.left = self.left.clamp(0, width - 1);
        self.top = self.top.clamp(0, height - 1);
        self.right = self.right.clamp(0, width - 1);
        self.bottom = self.bottom.clamp(0, height - 1);

        if self.is_degenerate() {
            self.deleted = true;
        }
    }
}
