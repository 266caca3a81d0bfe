//! The seam between the coordinator and the tag-detection algorithm
use crate::{detector::DepthRange, frame::{ColorFrame, DepthFrame}, msg::{CameraIntrinsics, DetectionSet}, params::{ConfigError, ParameterSource}};

/// A configured tag-detection algorithm
///
/// An engine's configuration is fixed for its lifetime; to change it, build
/// a new one.
pub trait Engine: Send {
	/// Find tags in `color`, using `depth` for ranging
	///
	/// Tags whose depth is outside `min_depth..=max_depth` are not reported.
	fn detect(&self, color: &ColorFrame, depth: &DepthFrame, intrinsics: &CameraIntrinsics, min_depth: f64, max_depth: f64) -> DetectionSet;

	/// Does this engine produce pose output (transforms) as a side effect of
	/// detection? If so, detection must run even with no subscribers.
	fn publish_tf(&self) -> bool;

	/// Valid depth window this engine was configured with
	fn depth_range(&self) -> DepthRange;
}

/// Creates [Engine]s from the current configuration
pub trait EngineBuilder: Send + Sync {
	type Engine: Engine;

	/// Read every tunable from `params` and build an engine
	fn build(&self, params: &dyn ParameterSource) -> Result<Self::Engine, ConfigError>;
}
