//! Decoded frames
use crate::{convert::{decode_color, decode_depth, ConversionError, ImageEncoding}, msg::{CameraInfo, CameraIntrinsics, Header, RawImage, Timestamp}, util::{ImageDepth, ImageRGB8}};

/// A decoded color image, with the calibration it arrived with
#[derive(Debug, Clone)]
pub struct ColorFrame {
	pub header: Header,
	pub image: ImageRGB8,
	pub intrinsics: CameraIntrinsics,
}

impl ColorFrame {
	/// Decode a color image (in `expected` encoding, or its own if `None`)
	pub fn decode(image: &RawImage, info: &CameraInfo, expected: Option<ImageEncoding>) -> Result<Self, ConversionError> {
		Ok(Self {
			header: image.header.clone(),
			image: decode_color(image, expected)?,
			intrinsics: info.intrinsics(),
		})
	}

	pub fn stamp(&self) -> Timestamp {
		self.header.stamp
	}
}

/// A decoded depth map, in meters
#[derive(Debug, Clone)]
pub struct DepthFrame {
	pub header: Header,
	pub depth: ImageDepth,
}

impl DepthFrame {
	pub fn decode(raw: &RawImage) -> Result<Self, ConversionError> {
		Ok(Self {
			header: raw.header.clone(),
			depth: decode_depth(raw)?,
		})
	}

	pub fn stamp(&self) -> Timestamp {
		self.header.stamp
	}

	pub fn width(&self) -> usize {
		self.depth.width()
	}

	pub fn height(&self) -> usize {
		self.depth.height()
	}

	/// Depth at `(x, y)`, if in bounds and a usable measurement
	#[inline]
	pub fn get(&self, x: usize, y: usize) -> Option<f32> {
		self.depth.get(x, y)
			.copied()
			.filter(|d| d.is_finite() && *d > 0.)
	}
}
