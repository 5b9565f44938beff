// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use fast_image_resize as fr;
use fr::images::{Image, ImageRef};
use fr::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};

use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use tracing::debug;

use super::face_box::FaceBox;
use crate::Result;

/// Edge, in pixels, of the window the proposal network slides over an image.
pub const PROPOSAL_WINDOW: f32 = 12.0;

/// Ratio between the face sizes of two consecutive pyramid levels.
pub const DEFAULT_SCALE_FACTOR: f32 = 0.709;

/// Maps an 8-bit channel value into roughly [-1, 1].
#[inline]
pub fn normalize_pixel(value: u8) -> f32 {
    (value as f32 - 127.5) / 128.0
}

fn bilinear() -> ResizeOptions {
    ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear))
}

/// Bilinear resize of a whole image.
pub fn resize(image: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let src = ImageRef::new(image.width(), image.height(), image.as_raw(), PixelType::U8x3)?;
    let mut dst = DynamicImage::new_rgb8(width, height);

    let mut resizer = Resizer::new();
    resizer.resize(&src, &mut dst, &bilinear())?;

    Ok(dst.into_rgb8())
}

/// Lazily produces scaled copies of an image, paired with their scale,
/// so that faces of `min_face_size` pixels and larger fill the proposal
/// window on some level. Levels are ordered from the largest scale down.
#[derive(Debug)]
pub struct Pyramid<'a> {
    image: &'a RgbImage,
    face_size: f64,
    factor: f64,
    max_face_size: f64,
}

/// Builds the image pyramid. `factor` must lie in (0, 1); anything else
/// yields at most one level.
pub fn build_pyramid(image: &RgbImage, min_face_size: f32, factor: f32) -> Pyramid<'_> {
    let max_face_size = if min_face_size > 0.0 {
        image.width().min(image.height()) as f64
    } else {
        f64::NEG_INFINITY
    };

    Pyramid {
        image,
        face_size: min_face_size as f64,
        factor: factor as f64,
        max_face_size,
    }
}

impl Iterator for Pyramid<'_> {
    type Item = Result<(RgbImage, f32)>;

    fn next(&mut self) -> Option<Self::Item> {
        // Also stops on a NaN face size.
        if !(self.face_size <= self.max_face_size) {
            return None;
        }

        let scale = PROPOSAL_WINDOW as f64 / self.face_size;

        if self.factor > 0.0 && self.factor < 1.0 {
            self.face_size /= self.factor;
        } else {
            self.max_face_size = f64::NEG_INFINITY;
        }

        // Sizes are computed in f64 so that exact products such as 100 * 0.3
        // do not round up past an integer.
        let width = ((self.image.width() as f64 * scale).ceil() as u32).max(1);
        let height = ((self.image.height() as f64 * scale).ceil() as u32).max(1);
        debug!("Pyramid level at scale {:.4} is {}x{}", scale, width, height);

        let scale = scale as f32;
        Some(resize(self.image, width, height).map(|scaled| (scaled, scale)))
    }
}

/// Normalised pixels of a whole image as a (1, W, H, 3) tensor.
pub fn image_to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    Array4::from_shape_fn(
        (1, width as usize, height as usize, 3),
        |(_, x, y, c)| normalize_pixel(image.get_pixel(x as u32, y as u32)[c]),
    )
}

/// Crops `face_box` out of `image` and resizes it to `target_size` square.
///
/// Returns normalised values, row by row, three channels per pixel.
/// The box must already be clamped to the image.
pub fn crop_and_resize(image: &RgbImage, face_box: &FaceBox, target_size: u32) -> Result<Vec<f32>> {
    let src = ImageRef::new(image.width(), image.height(), image.as_raw(), PixelType::U8x3)?;
    let mut dst = Image::new(target_size, target_size, PixelType::U8x3);

    let options = bilinear().crop(
        face_box.left as f64,
        face_box.top as f64,
        face_box.width() as f64,
        face_box.height() as f64,
    );

    let mut resizer = Resizer::new();
    resizer.resize(&src, &mut dst, &options)?;

    Ok(dst.buffer().iter().map(|v| normalize_pixel(*v)).collect())
}

/// Swaps the x and y axes of a row-major, channel-last buffer.
pub fn transpose(buffer: &[f32], width: usize, height: usize, channels: usize) -> Vec<f32> {
    let mut transposed = Vec::with_capacity(buffer.len());
    for x in 0..width {
        for y in 0..height {
            let start = (y * width + x) * channels;
            transposed.extend_from_slice(&buffer[start..start + channels]);
        }
    }
    transposed
}
