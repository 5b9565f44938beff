// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use super::face_box::FaceBox;

/// Applies a box's regression deltas to its edges, then zeroes them.
///
/// Deltas are fractions of the box's width (left, right) and height
/// (top, bottom). A box that ends up with no area is marked deleted.
pub fn calibrate(face_box: &mut FaceBox) {
    let width = face_box.width() as f32;
    let height = face_box.height() as f32;
    let [dl, dt, dr, db] = face_box.bbr;

    face_box.left = (face_box.left as f32 + dl * width) as i32;
    face_box.top = (face_box.top as f32 + dt * height) as i32;
    face_box.right = (face_box.right as f32 + dr * width) as i32;
    face_box.bottom = (face_box.bottom as f32 + db * height) as i32;
    face_box.bbr = [0.0; 4];

    if face_box.is_degenerate() {
        face_box.deleted = true;
    }
}

/// Calibrates every live box.
pub fn calibrate_all(boxes: &mut [FaceBox]) {
    boxes
        .iter_mut()
        .filter(|b| !b.deleted)
        .for_each(calibrate);
}

/// Squares every live box and clamps it inside a `width` x `height` image.
pub fn square_and_clamp_all(boxes: &mut [FaceBox], width: u32, height: u32) {
    for b in boxes.iter_mut().filter(|b| !b.deleted) {
        b.to_square();
        b.clamp_to_image(width, height);
    }
}
