//! Messages exchanged with the camera driver and with consumers
use std::fmt::Display;

use crate::util::{Point2D, Quaternion, Vec3};

/// Capture time, nanoseconds since the epoch of the camera clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
	pub const fn from_nanos(nanos: u64) -> Self {
		Self(nanos)
	}

	pub fn from_secs_f64(secs: f64) -> Self {
		Self((secs * 1e9).max(0.) as u64)
	}

	pub const fn as_nanos(&self) -> u64 {
		self.0
	}

	pub fn as_secs_f64(&self) -> f64 {
		self.0 as f64 / 1e9
	}
}

impl Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
	}
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
	pub stamp: Timestamp,
	/// Coordinate frame the data is expressed in
	pub frame_id: String,
}

/// Image as it arrives on the wire
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawImage {
	pub header: Header,
	pub width: u32,
	pub height: u32,
	/// Pixel encoding name (`rgb8`, `bgr8`, `mono8`, `16UC1`, `32FC1`, ...)
	pub encoding: String,
	pub is_bigendian: bool,
	/// Row length in bytes
	pub step: u32,
	pub data: Vec<u8>,
}

/// Annotated output image (always `rgb8`)
pub type AnnotatedImage = RawImage;

/// Pinhole intrinsics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
	/// Focal length, in pixels
	pub fx: f64,
	pub fy: f64,
	/// Principal point, in pixels
	pub cx: f64,
	pub cy: f64,
}

impl CameraIntrinsics {
	/// Back-project pixel `(u, v)` at depth `z` (meters) into the camera frame
	pub fn unproject(&self, u: f64, v: f64, z: f64) -> Vec3 {
		Vec3::of((u - self.cx) / self.fx * z, (v - self.cy) / self.fy * z, z)
	}

	/// Are the focal lengths usable for back-projection?
	pub fn is_valid(&self) -> bool {
		self.fx.is_normal() && self.fy.is_normal() && self.cx.is_finite() && self.cy.is_finite()
	}
}

/// Calibration delivered alongside every color frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CameraInfo {
	pub header: Header,
	pub width: u32,
	pub height: u32,
	/// Row-major 3x3 camera matrix
	pub k: [f64; 9],
	/// Distortion coefficients
	pub d: Vec<f64>,
}

impl CameraInfo {
	pub fn intrinsics(&self) -> CameraIntrinsics {
		CameraIntrinsics {
			fx: self.k[0],
			fy: self.k[4],
			cx: self.k[2],
			cy: self.k[5],
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
	/// Meters, in the camera frame
	pub position: Vec3,
	pub orientation: Quaternion,
}

/// One detected tag
#[derive(Debug, Clone, PartialEq)]
pub struct TagDetection {
	pub id: u32,
	/// Tag family name (e.g. `tag36h11`)
	pub family: String,
	/// Edge length in meters, if the tag is described in the configuration
	pub size: Option<f64>,
	/// Name of the tag's coordinate frame
	pub frame_name: String,
	/// How many error bits were corrected
	pub hamming: u16,
	/// Quality of the binary decode; higher is better
	pub decision_margin: f32,
	pub center: Point2D,
	/// Corners in pixel coordinates, counter-clockwise
	pub corners: [Point2D; 4],
	/// Depth sampled at the tag center, in meters
	pub depth: f32,
	pub pose: Pose,
}

/// All tags found in one color frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionSet {
	pub header: Header,
	pub detections: Vec<TagDetection>,
}

impl DetectionSet {
	pub fn len(&self) -> usize {
		self.detections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.detections.is_empty()
	}

	pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
		self.detections.iter().map(|det| det.id)
	}
}

/// Camera-to-tag transform, broadcast when `publish_tf` is enabled
#[derive(Debug, Clone, PartialEq)]
pub struct TagTransform {
	/// Parent (camera) frame and capture time
	pub header: Header,
	pub child_frame_id: String,
	pub pose: Pose,
}
