//! Topic wiring for a continuously-running depth tag detector
use std::sync::Arc;

use tracing::info;

use crate::{
	coordinator::{CycleOutcome, DetectionCoordinator},
	engine::EngineBuilder,
	msg::{AnnotatedImage, CameraInfo, DetectionSet, RawImage},
	params::{get_or, ConfigError, ParameterSource},
	publish::{Publisher, Sink, Subscriber},
};

/// Color images (with camera info) are expected on this topic
pub const COLOR_TOPIC: &str = "color/image_rect";
/// Registered depth images are expected on this topic
pub const DEPTH_TOPIC: &str = "depth/image_rect";
pub const DETECTIONS_TOPIC: &str = "tag_detections";
pub const DETECTIONS_IMAGE_TOPIC: &str = "tag_detections_image";
pub const REFRESH_SERVICE: &str = "refresh_tag_params";

/// Settings read once, when the node starts
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOptions {
	/// Messages buffered per subscriber
	pub queue_size: usize,
	pub transport_hint: String,
	pub depth_transport_hint: String,
	/// Publish annotated images on [DETECTIONS_IMAGE_TOPIC]
	pub publish_tag_detections_image: bool,
}

impl Default for NodeOptions {
	fn default() -> Self {
		Self {
			queue_size: 1,
			transport_hint: "raw".into(),
			depth_transport_hint: "raw".into(),
			publish_tag_detections_image: false,
		}
	}
}

impl NodeOptions {
	pub fn from_params(params: &dyn ParameterSource) -> Result<Self, ConfigError> {
		let defaults = Self::default();
		let queue_size = get_or(params, "queue_size", defaults.queue_size as i64)?;
		let queue_size = usize::try_from(queue_size)
			.ok()
			.filter(|size| *size > 0)
			.ok_or_else(|| ConfigError::invalid("queue_size", format!("{queue_size} is not a positive size")))?;

		Ok(Self {
			queue_size,
			transport_hint: get_or(params, "transport_hint", defaults.transport_hint)?,
			depth_transport_hint: get_or(params, "depth_transport_hint", defaults.depth_transport_hint)?,
			publish_tag_detections_image: get_or(params, "publish_tag_detections_image", defaults.publish_tag_detections_image)?,
		})
	}
}

/// Detects tags in a color stream, ranging them with a depth stream
pub struct DepthDetectorNode<B: EngineBuilder> {
	options: NodeOptions,
	detections: Arc<Publisher<DetectionSet>>,
	images: Option<Arc<Publisher<AnnotatedImage>>>,
	coordinator: DetectionCoordinator<B>,
}

impl<B: EngineBuilder> DepthDetectorNode<B> {
	/// Read options, open the output topics, and build the first engine
	pub fn new(builder: B, params: Arc<dyn ParameterSource>) -> Result<Self, ConfigError> {
		let options = NodeOptions::from_params(&*params)?;

		let detections = Arc::new(Publisher::new(DETECTIONS_TOPIC));
		let images = options.publish_tag_detections_image
			.then(|| Arc::new(Publisher::new(DETECTIONS_IMAGE_TOPIC)));

		let coordinator = DetectionCoordinator::new(
			builder,
			params,
			detections.clone(),
			images.clone().map(|images| images as Arc<dyn Sink<AnnotatedImage>>),
		)?;

		info!(
			"Detecting tags from {COLOR_TOPIC} ({}) and {DEPTH_TOPIC} ({}), publishing on {DETECTIONS_TOPIC}{}",
			options.transport_hint,
			options.depth_transport_hint,
			if images.is_some() { format!(" and {DETECTIONS_IMAGE_TOPIC}") } else { String::new() },
		);

		Ok(Self {
			options,
			detections,
			images,
			coordinator,
		})
	}

	pub fn options(&self) -> &NodeOptions {
		&self.options
	}

	pub fn coordinator(&self) -> &DetectionCoordinator<B> {
		&self.coordinator
	}

	/// A color image and its calibration arrived
	pub fn image_callback(&self, image: &RawImage, info: &CameraInfo) -> CycleOutcome {
		self.coordinator.on_color_frame(image, info)
	}

	/// A depth image arrived
	pub fn depth_callback(&self, depth: &RawImage) {
		// Failures are logged by the coordinator, and the previous frame kept
		let _ = self.coordinator.on_depth_frame(depth);
	}

	/// Re-read the detector parameters
	///
	/// Always reports success; if the new parameters are unusable the
	/// previous detector keeps running.
	pub fn refresh_params_service(&self) -> bool {
		let _ = self.coordinator.refresh();
		true
	}

	pub fn subscribe_detections(&self) -> Subscriber<DetectionSet> {
		self.detections.subscribe(self.options.queue_size)
	}

	/// `None` unless annotated images are enabled
	pub fn subscribe_images(&self) -> Option<Subscriber<AnnotatedImage>> {
		self.images.as_ref()
			.map(|images| images.subscribe(self.options.queue_size))
	}
}
