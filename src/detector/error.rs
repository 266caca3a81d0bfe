use thiserror::Error;

/// Error reported by a [TagDetector](super::TagDetector)
#[derive(Clone, Debug, PartialEq, Error)]
#[non_exhaustive]
pub enum DetectError {
	#[error("Input image was too small ({width}x{height})")]
	ImageTooSmall {
		width: usize,
		height: usize,
	},
	#[error("Tag detection failed: {0}")]
	Failed(String),
}
