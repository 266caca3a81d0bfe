//! Tag detection with depth fusion
mod config;
mod depth;
mod engine;
mod error;

pub use config::{DepthRange, DetectorConfig, DetectorSettings, TagDescription, FAMILY_NAMES};
pub use engine::{DepthTagEngine, DepthTagEngineBuilder};
pub use error::DetectError;

use crate::{params::ConfigError, util::{ImageY8, Point2D, Quaternion}};

/// A tag found in a 2D image, before any depth is known
#[derive(Debug, Clone, PartialEq)]
pub struct TagObservation {
	/// Family the tag was decoded from
	pub family: String,
	/// The decoded ID of the tag
	pub id: u32,
	/// How many error bits were corrected?
	pub hamming: u16,
	/// A measure of the quality of the binary decoding process
	pub decision_margin: f32,
	/// The center of the detection in image pixel coordinates
	pub center: Point2D,
	/// The corners of the tag in image pixel coordinates. These always
	/// wrap counter-clock wise around the tag.
	pub corners: [Point2D; 4],
	/// Orientation estimated by the detector, if it does pose estimation
	pub orientation: Option<Quaternion>,
}

/// Finds tags in a grayscale image
pub trait TagDetector: Send + Sync {
	fn detect(&self, image: &ImageY8) -> Result<Vec<TagObservation>, DetectError>;
}

impl<D: TagDetector + ?Sized> TagDetector for Box<D> {
	fn detect(&self, image: &ImageY8) -> Result<Vec<TagObservation>, DetectError> {
		(**self).detect(image)
	}
}

/// Creates a [TagDetector] for some settings
pub trait DetectorFactory: Send + Sync {
	type Detector: TagDetector;

	fn create(&self, settings: &DetectorSettings) -> Result<Self::Detector, ConfigError>;
}

impl<D: TagDetector, F: Fn(&DetectorSettings) -> Result<D, ConfigError> + Send + Sync> DetectorFactory for F {
	type Detector = D;

	fn create(&self, settings: &DetectorSettings) -> Result<D, ConfigError> {
		self(settings)
	}
}
