use arrayvec::ArrayVec;

use crate::{frame::DepthFrame, msg::CameraIntrinsics, util::{Mat33, Point2D, Quaternion, Vec3}};

/// Half-width of the window sampled around a point
const SAMPLE_RADIUS: usize = 2;
const WINDOW: usize = (2 * SAMPLE_RADIUS + 1) * (2 * SAMPLE_RADIUS + 1);

/// Maps points in a color image onto a depth map of possibly different resolution
#[derive(Debug, Clone, Copy)]
pub(super) struct DepthSampler<'a> {
	depth: &'a DepthFrame,
	scale_x: f64,
	scale_y: f64,
}

impl<'a> DepthSampler<'a> {
	pub(super) fn new(depth: &'a DepthFrame, color_width: usize, color_height: usize) -> Self {
		let ratio = |d: usize, c: usize| if c == 0 { 1. } else { d as f64 / c as f64 };
		Self {
			depth,
			scale_x: ratio(depth.width(), color_width),
			scale_y: ratio(depth.height(), color_height),
		}
	}

	/// Median of the valid depths in a small window around `p` (color coordinates)
	pub(super) fn median_at(&self, p: &Point2D) -> Option<f32> {
		let (cx, cy) = Point2D::of(p.x() * self.scale_x, p.y() * self.scale_y).to_pixel()?;
		if cx >= self.depth.width() || cy >= self.depth.height() {
			return None;
		}

		let mut samples = ArrayVec::<f32, WINDOW>::new();
		let ys = cy.saturating_sub(SAMPLE_RADIUS)..=(cy + SAMPLE_RADIUS);
		for y in ys {
			let xs = cx.saturating_sub(SAMPLE_RADIUS)..=(cx + SAMPLE_RADIUS);
			for x in xs {
				if let Some(d) = self.depth.get(x, y) {
					samples.push(d);
				}
			}
		}
		if samples.is_empty() {
			return None;
		}
		samples.sort_unstable_by(f32::total_cmp);
		Some(samples[samples.len() / 2])
	}
}

/// Rotation of a tag from the camera-space positions of its corners
///
/// The tag's x axis runs from corner 0 to corner 1, its y axis from
/// corner 1 to corner 2, and z is their normal.
pub(super) fn orientation_from_corners(corners: &[Vec3; 4]) -> Option<Quaternion> {
	let [c0, c1, c2, c3] = *corners;
	let x = ((c1 - c0) + (c2 - c3)).normalized()?;
	let y_raw = (c2 - c1) + (c3 - c0);
	let z = x.cross(&y_raw).normalized()?;
	let y = z.cross(&x);
	Some(Quaternion::from_rotation(&Mat33::from_columns(x, y, z)).normalized())
}

/// Camera-space position of every corner, if all of them have depth
pub(super) fn corner_positions(sampler: &DepthSampler, intrinsics: &CameraIntrinsics, corners: &[Point2D; 4]) -> Option<[Vec3; 4]> {
	let mut out = [Vec3::zero(); 4];
	for (dst, corner) in out.iter_mut().zip(corners.iter()) {
		let d = sampler.median_at(corner)?;
		*dst = intrinsics.unproject(corner.x(), corner.y(), d as f64);
	}
	Some(out)
}
