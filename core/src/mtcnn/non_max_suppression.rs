// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use super::face_box::{FaceBox, IouMode};

/// Non-maximum suppression over a candidate set.
///
/// Every live pair `(i, j)` with `i < j` is compared once, in index order.
/// When their overlap reaches `threshold` the lower scoring box is marked
/// deleted, or box `j` on a tie. Boxes are tombstoned rather than removed,
/// so indices are stable for the whole pass. Use [`compact`] afterwards to
/// drop the tombstones.
pub fn suppress(boxes: &mut [FaceBox], threshold: f32, mode: IouMode) {
    for i in 0..boxes.len() {
        if boxes[i].deleted {
            continue;
        }

        for j in (i + 1)..boxes.len() {
            if boxes[j].deleted {
                continue;
            }

            let iou = boxes[i].intersection_over_union(&boxes[j], mode);
            if iou >= threshold {
                if boxes[i].score < boxes[j].score {
                    boxes[i].deleted = true;
                    break;
                }
                boxes[j].deleted = true;
            }
        }
    }
}

/// Drops deleted boxes, keeping the order of the rest.
pub fn compact(boxes: Vec<FaceBox>) -> Vec<FaceBox> {
    boxes.into_iter().filter(|b| !b.deleted).collect()
}
