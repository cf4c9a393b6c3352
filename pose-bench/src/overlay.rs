//! Drawing the scoring feedback onto a frame.
//!
//! Landmarks are normalized to [0, 1] and mapped to pixels with
//! [`Landmark::to_pixel`]. Every function here tolerates landmarks outside
//! the image and non-finite values. Landmarks more than one image size past
//! an edge are not drawn at all, which keeps line and circle rasterization
//! away from `i32` overflow.

use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;
use pose_score::angles::blazepose::*;
use pose_score::{Landmark, PoseAnnotation, Verdict};

/// Body skeleton as landmark index pairs (face landmarks are not drawn).
pub const POSE_CONNECTIONS: [(usize, usize); 12] = [
    // Upper body
    (LEFT_SHOULDER, RIGHT_SHOULDER),
    (LEFT_SHOULDER, LEFT_ELBOW),
    (LEFT_ELBOW, LEFT_WRIST),
    (RIGHT_SHOULDER, RIGHT_ELBOW),
    (RIGHT_ELBOW, RIGHT_WRIST),
    // Torso
    (LEFT_SHOULDER, LEFT_HIP),
    (RIGHT_SHOULDER, RIGHT_HIP),
    (LEFT_HIP, RIGHT_HIP),
    // Lower body
    (LEFT_HIP, LEFT_KNEE),
    (LEFT_KNEE, LEFT_ANKLE),
    (RIGHT_HIP, RIGHT_KNEE),
    (RIGHT_KNEE, RIGHT_ANKLE),
];

pub const SKELETON_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
pub const KEYPOINT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const ERROR_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const BANNER_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const SCORE_BAR_COLOR: Rgb<u8> = Rgb([40, 90, 220]);
pub const PERFECT_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
pub const CORRECTING_COLOR: Rgb<u8> = Rgb([255, 140, 0]);

/// Height of the banner across the top of the frame.
pub const BANNER_HEIGHT: u32 = 50;
/// Radius of the circle around a joint in error.
pub const ERROR_MARKER_RADIUS: i32 = 25;
/// Ring thickness of the error circle in pixels.
pub const ERROR_MARKER_THICKNESS: i32 = 4;

const KEYPOINT_RADIUS: i32 = 3;
const BANNER_MARGIN: u32 = 8;

fn pixel(landmark: &Landmark, width: u32, height: u32) -> Option<(i32, i32)> {
    let (w, h) = (width as f64, height as f64);
    let x = landmark.x * w;
    let y = landmark.y * h;
    let near = (-w..=2.0 * w).contains(&x) && (-h..=2.0 * h).contains(&y);
    (landmark.is_finite() && near).then(|| landmark.to_pixel(width, height))
}

/// `Rect::of_size` rejects zero sizes, so those become `None`.
fn rect(x: i32, y: i32, width: u32, height: u32) -> Option<Rect> {
    (width > 0 && height > 0).then(|| Rect::at(x, y).of_size(width, height))
}

/// Draw skeleton lines and keypoints for the body landmarks.
pub fn draw_skeleton(image: &mut RgbImage, landmarks: &[Landmark]) {
    let (width, height) = image.dimensions();
    let point = |i: usize| landmarks.get(i).and_then(|lm| pixel(lm, width, height));

    for &(from, to) in &POSE_CONNECTIONS {
        if let (Some(p1), Some(p2)) = (point(from), point(to)) {
            draw_line_segment_mut(
                image,
                (p1.0 as f32, p1.1 as f32),
                (p2.0 as f32, p2.1 as f32),
                SKELETON_COLOR,
            );
        }
    }

    let mut joints: Vec<usize> = POSE_CONNECTIONS
        .iter()
        .flat_map(|&(from, to)| [from, to])
        .collect();
    joints.sort_unstable();
    joints.dedup();

    for p in joints.into_iter().filter_map(point) {
        draw_filled_circle_mut(image, p, KEYPOINT_RADIUS, KEYPOINT_COLOR);
    }
}

/// Circle every joint in error with a thick red ring.
pub fn draw_error_markers(image: &mut RgbImage, markers: &[Landmark]) {
    let (width, height) = image.dimensions();
    let inner = ERROR_MARKER_RADIUS - ERROR_MARKER_THICKNESS / 2;

    for center in markers.iter().filter_map(|lm| pixel(lm, width, height)) {
        for radius in inner..inner + ERROR_MARKER_THICKNESS {
            draw_hollow_circle_mut(image, center, radius, ERROR_COLOR);
        }
    }
}

/// White banner across the top with a bar proportional to the score and a
/// square colored by the verdict.
///
/// A non-finite score leaves the bar empty.
pub fn draw_score_banner(image: &mut RgbImage, score: f64, verdict: Verdict) {
    let (width, height) = image.dimensions();
    let banner_height = BANNER_HEIGHT.min(height);
    if let Some(banner) = rect(0, 0, width, banner_height) {
        draw_filled_rect_mut(image, banner, BANNER_COLOR);
    }

    let inner_height = banner_height.saturating_sub(2 * BANNER_MARGIN);
    let square = inner_height;
    let bar_span = width.saturating_sub(3 * BANNER_MARGIN + square);

    if score.is_finite() {
        let fraction = (score / 100.0).clamp(0.0, 1.0);
        let bar_width = (bar_span as f64 * fraction).round() as u32;
        if let Some(bar) = rect(
            BANNER_MARGIN as i32,
            BANNER_MARGIN as i32,
            bar_width,
            inner_height,
        ) {
            draw_filled_rect_mut(image, bar, SCORE_BAR_COLOR);
        }
    }

    let color = match verdict {
        Verdict::Perfect => PERFECT_COLOR,
        Verdict::Correcting => CORRECTING_COLOR,
    };
    let square_x = width.saturating_sub(BANNER_MARGIN + square) as i32;
    if let Some(indicator) = rect(square_x, BANNER_MARGIN as i32, square, square) {
        draw_filled_rect_mut(image, indicator, color);
    }
}

/// Full overlay for one scored frame: skeleton, error rings, score banner.
pub fn annotate_frame(
    image: &mut RgbImage,
    landmarks: &[Landmark],
    annotation: &PoseAnnotation,
    score: f64,
) {
    draw_skeleton(image, landmarks);
    draw_error_markers(image, &annotation.markers);
    draw_score_banner(image, score, annotation.verdict);
}
