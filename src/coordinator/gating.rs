use crate::{msg::{AnnotatedImage, DetectionSet}, publish::Sink};

/// Who wants the output of a detection cycle right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Demand {
	pub detection_consumers: usize,
	pub image_consumers: usize,
	/// Engine emits transforms as a side effect of detecting
	pub publish_tf: bool,
}

impl Demand {
	/// Sample consumer counts from the sinks
	pub(super) fn sample(detections: &dyn Sink<DetectionSet>, images: Option<&dyn Sink<AnnotatedImage>>, publish_tf: bool) -> Self {
		Self {
			detection_consumers: detections.active_consumer_count(),
			image_consumers: images.map_or(0, |images| images.active_consumer_count()),
			publish_tf,
		}
	}

	/// Is detection worth running?
	pub const fn is_active(&self) -> bool {
		self.detection_consumers > 0 || self.image_consumers > 0 || self.publish_tf
	}
}
