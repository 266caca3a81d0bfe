use thiserror::Error;

use super::ImageEncoding;

/// Error generated when decoding a [wire image](crate::msg::RawImage)
#[derive(Clone, Debug, PartialEq, Error)]
#[non_exhaustive]
pub enum ConversionError {
	#[error("Unsupported image encoding {0:?}")]
	UnsupportedEncoding(String),
	#[error("Encoding {actual} can't be used here (expected: {expected})")]
	EncodingMismatch {
		expected: ImageEncoding,
		actual: ImageEncoding,
	},
	#[error("Image has no pixels ({width}x{height})")]
	EmptyImage {
		width: u32,
		height: u32,
	},
	#[error("Row step too small (actual: {actual}, minimum: {minimum})")]
	StepTooSmall {
		actual: usize,
		minimum: usize,
	},
	#[error("Image buffer too short (actual: {actual}, minimum: {minimum})")]
	BufferTooShort {
		actual: usize,
		minimum: usize,
	},
}
