//! Conversion between wire images and decoded frames
mod error;

pub use error::ConversionError;

use std::{fmt::Display, str::FromStr};

use crate::{msg::{Header, RawImage}, util::{ImageDepth, ImageRGB8}};

/// Pixel encodings understood by the decoder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageEncoding {
	Rgb8,
	Bgr8,
	Rgba8,
	Bgra8,
	Mono8,
	/// 16-bit unsigned, millimeters when used for depth
	Mono16,
	/// `16UC1` depth, millimeters
	Depth16,
	/// `32FC1` depth, meters
	Depth32F,
}

impl ImageEncoding {
	pub const fn name(&self) -> &'static str {
		match self {
			Self::Rgb8 => "rgb8",
			Self::Bgr8 => "bgr8",
			Self::Rgba8 => "rgba8",
			Self::Bgra8 => "bgra8",
			Self::Mono8 => "mono8",
			Self::Mono16 => "mono16",
			Self::Depth16 => "16UC1",
			Self::Depth32F => "32FC1",
		}
	}

	pub const fn bytes_per_pixel(&self) -> usize {
		match self {
			Self::Rgb8 | Self::Bgr8 => 3,
			Self::Rgba8 | Self::Bgra8 | Self::Depth32F => 4,
			Self::Mono8 => 1,
			Self::Mono16 | Self::Depth16 => 2,
		}
	}

	/// Can this encoding carry a color (or grayscale) camera image?
	pub const fn is_color(&self) -> bool {
		matches!(self, Self::Rgb8 | Self::Bgr8 | Self::Rgba8 | Self::Bgra8 | Self::Mono8)
	}

	/// Can this encoding carry a depth map?
	pub const fn is_depth(&self) -> bool {
		matches!(self, Self::Mono16 | Self::Depth16 | Self::Depth32F)
	}
}

impl FromStr for ImageEncoding {
	type Err = ConversionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let res = match s {
			"rgb8" | "8UC3" => Self::Rgb8,
			"bgr8" => Self::Bgr8,
			"rgba8" | "8UC4" => Self::Rgba8,
			"bgra8" => Self::Bgra8,
			"mono8" | "8UC1" => Self::Mono8,
			"mono16" => Self::Mono16,
			"16UC1" => Self::Depth16,
			"32FC1" => Self::Depth32F,
			other => return Err(ConversionError::UnsupportedEncoding(other.into())),
		};
		Ok(res)
	}
}

impl Display for ImageEncoding {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// Validate dimensions and return the rows of `raw`, each trimmed to `width * bpp` bytes
fn packed_rows(raw: &RawImage, encoding: ImageEncoding) -> Result<impl Iterator<Item = &[u8]>, ConversionError> {
	if raw.width == 0 || raw.height == 0 {
		return Err(ConversionError::EmptyImage { width: raw.width, height: raw.height });
	}
	let row_len = (raw.width as usize).saturating_mul(encoding.bytes_per_pixel());
	let step = raw.step as usize;
	if step < row_len {
		return Err(ConversionError::StepTooSmall { actual: step, minimum: row_len });
	}
	// The last row doesn't need padding
	let minimum = step
		.saturating_mul(raw.height as usize - 1)
		.saturating_add(row_len);
	if raw.data.len() < minimum {
		return Err(ConversionError::BufferTooShort { actual: raw.data.len(), minimum });
	}
	Ok(raw.data
		.chunks(step)
		.take(raw.height as usize)
		.map(move |row| &row[..row_len]))
}

/// Decode a color camera image into RGB
///
/// If `expected` is `None`, the image's own encoding is used.
pub fn decode_color(raw: &RawImage, expected: Option<ImageEncoding>) -> Result<ImageRGB8, ConversionError> {
	let actual = ImageEncoding::from_str(&raw.encoding)?;
	if let Some(expected) = expected {
		if expected != actual {
			return Err(ConversionError::EncodingMismatch { expected, actual });
		}
	}
	if !actual.is_color() {
		return Err(ConversionError::EncodingMismatch { expected: ImageEncoding::Rgb8, actual });
	}

	let rows = packed_rows(raw, actual)?;
	let mut buf = Vec::with_capacity(raw.width as usize * raw.height as usize);
	for row in rows {
		match actual {
			ImageEncoding::Rgb8 => buf.extend_from_slice(bytemuck::cast_slice::<u8, [u8; 3]>(row)),
			ImageEncoding::Bgr8 => buf.extend(row.chunks_exact(3).map(|px| [px[2], px[1], px[0]])),
			ImageEncoding::Rgba8 => buf.extend(row.chunks_exact(4).map(|px| [px[0], px[1], px[2]])),
			ImageEncoding::Bgra8 => buf.extend(row.chunks_exact(4).map(|px| [px[2], px[1], px[0]])),
			ImageEncoding::Mono8 => buf.extend(row.iter().map(|&v| [v, v, v])),
			_ => unreachable!("not a color encoding"),
		}
	}

	Ok(ImageRGB8 {
		width: raw.width as usize,
		height: raw.height as usize,
		stride: raw.width as usize,
		buf: buf.into_boxed_slice(),
	})
}

/// Decode a depth image into meters, passing the source encoding through
///
/// Zero (16-bit) and non-finite (float) samples become `NaN`.
pub fn decode_depth(raw: &RawImage) -> Result<ImageDepth, ConversionError> {
	let actual = ImageEncoding::from_str(&raw.encoding)?;
	if !actual.is_depth() {
		return Err(ConversionError::EncodingMismatch { expected: ImageEncoding::Depth32F, actual });
	}
	let big_endian = raw.is_bigendian;

	let rows = packed_rows(raw, actual)?;
	let mut buf = Vec::with_capacity(raw.width as usize * raw.height as usize);
	for row in rows {
		match actual {
			ImageEncoding::Mono16 | ImageEncoding::Depth16 => {
				buf.extend(row.chunks_exact(2).map(|px| {
					let px = [px[0], px[1]];
					let mm = if big_endian { u16::from_be_bytes(px) } else { u16::from_le_bytes(px) };
					if mm == 0 {
						f32::NAN
					} else {
						mm as f32 / 1000.
					}
				}))
			},
			ImageEncoding::Depth32F => {
				buf.extend(row.chunks_exact(4).map(|px| {
					let px = [px[0], px[1], px[2], px[3]];
					let m = if big_endian { f32::from_be_bytes(px) } else { f32::from_le_bytes(px) };
					if m.is_finite() { m } else { f32::NAN }
				}))
			},
			_ => unreachable!("not a depth encoding"),
		}
	}

	Ok(ImageDepth {
		width: raw.width as usize,
		height: raw.height as usize,
		stride: raw.width as usize,
		buf: buf.into_boxed_slice(),
	})
}

/// Encode an RGB image for publishing
pub fn encode_rgb8(image: &ImageRGB8, header: Header) -> RawImage {
	let mut data = Vec::with_capacity(image.len() * 3);
	for row in image.rows() {
		data.extend_from_slice(bytemuck::cast_slice::<[u8; 3], u8>(row));
	}
	RawImage {
		header,
		width: image.width() as u32,
		height: image.height() as u32,
		encoding: ImageEncoding::Rgb8.name().into(),
		is_bigendian: false,
		step: image.width() as u32 * 3,
		data,
	}
}
