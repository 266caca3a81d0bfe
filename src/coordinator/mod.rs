//! Fuses the color and depth streams into gated detection cycles
mod annotate;
mod gating;
#[cfg(test)]
mod test;

pub use gating::Demand;

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::{
	convert::{ConversionError, ImageEncoding},
	dbg::{TimeProfile, TimeProfileStatistics},
	depth_cache::DepthCache,
	engine::{Engine, EngineBuilder},
	frame::ColorFrame,
	msg::{AnnotatedImage, CameraInfo, DetectionSet, RawImage},
	params::{ConfigError, ParameterSource},
	publish::Sink,
	util::throttle::{Once, Throttle},
};

/// Minimum time between "no depth" warnings
const NO_DEPTH_WARN_PERIOD: Duration = Duration::from_secs(2);

/// What happened to a color frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
	/// Nobody wanted the output
	NoDemand,
	/// The color image couldn't be decoded
	ConversionFailed,
	/// No depth frame has arrived yet
	NoDepth,
	/// Detection ran and its results were published
	Published {
		detections: usize,
	},
}

/// Owns the detection engine and the latest depth frame
///
/// Color and depth frames may arrive on any threads, in any order. Every
/// color frame runs one detection cycle against the newest depth frame, while
/// holding the detection lock; [refresh](Self::refresh) takes the same lock
/// to replace the engine. Depth frames only touch the [DepthCache].
pub struct DetectionCoordinator<B: EngineBuilder> {
	builder: B,
	params: Arc<dyn ParameterSource>,
	engine: Mutex<B::Engine>,
	depth: DepthCache,
	detections: Arc<dyn Sink<DetectionSet>>,
	images: Option<Arc<dyn Sink<AnnotatedImage>>>,
	color_encoding: Option<ImageEncoding>,
	no_depth_warning: Throttle,
	first_depth: Once,
	stats: Mutex<TimeProfileStatistics>,
}

impl<B: EngineBuilder> DetectionCoordinator<B> {
	/// Build the first engine and start coordinating
	///
	/// Annotated images are drawn and published only if `images` is given.
	pub fn new(builder: B, params: Arc<dyn ParameterSource>, detections: Arc<dyn Sink<DetectionSet>>, images: Option<Arc<dyn Sink<AnnotatedImage>>>) -> Result<Self, ConfigError> {
		let engine = builder.build(&*params)?;
		Ok(Self {
			builder,
			params,
			engine: Mutex::new(engine),
			depth: DepthCache::new(),
			detections,
			images,
			color_encoding: None,
			no_depth_warning: Throttle::new(NO_DEPTH_WARN_PERIOD),
			first_depth: Once::default(),
			stats: Mutex::new(TimeProfileStatistics::default()),
		})
	}

	/// Require color frames in this encoding, instead of taking each frame's own
	pub fn with_color_encoding(mut self, encoding: ImageEncoding) -> Self {
		self.color_encoding = Some(encoding);
		self
	}

	pub fn depth_cache(&self) -> &DepthCache {
		&self.depth
	}

	/// Run `f` on the current engine, holding the detection lock
	pub fn with_engine<R>(&self, f: impl FnOnce(&B::Engine) -> R) -> R {
		f(&self.engine.lock())
	}

	/// Timing of every cycle so far
	pub fn statistics(&self) -> TimeProfileStatistics {
		self.stats.lock().clone()
	}

	/// Handle a new depth frame
	///
	/// Never waits on a detection cycle. On failure the previous depth frame
	/// stays current.
	pub fn on_depth_frame(&self, depth: &RawImage) -> Result<(), ConversionError> {
		match self.depth.update(depth) {
			Ok(()) => {
				if self.first_depth.first() {
					info!("Depth image for tags received.");
				}
				Ok(())
			},
			Err(e) => {
				error!("Unable to convert depth image: {e}");
				Err(e)
			}
		}
	}

	/// Handle a new color frame, running one detection cycle
	pub fn on_color_frame(&self, image: &RawImage, info: &CameraInfo) -> CycleOutcome {
		let mut tp = TimeProfile::default();
		let outcome = self.run_cycle(image, info, &mut tp);

		trace!("Cycle {outcome:?} took {:?}", tp.total_duration());
		#[cfg(feature="profile")]
		trace!("{tp}");

		self.stats.lock().add(&tp);
		outcome
	}

	fn run_cycle(&self, image: &RawImage, info: &CameraInfo, tp: &mut TimeProfile) -> CycleOutcome {
		let engine = self.engine.lock();
		// Newer depth frames arriving during the cycle are not seen by it
		let depth = self.depth.read();
		tp.stamp("lock");

		let demand = Demand::sample(&*self.detections, self.images.as_deref(), engine.publish_tf());
		if !demand.is_active() {
			return CycleOutcome::NoDemand;
		}

		let color = match ColorFrame::decode(image, info, self.color_encoding) {
			Ok(color) => color,
			Err(e) => {
				error!("Unable to convert color image: {e}");
				return CycleOutcome::ConversionFailed;
			}
		};
		tp.stamp("convert");

		let Some(depth) = depth else {
			if self.no_depth_warning.ready() {
				warn!("No depth image received. Can't find tags.");
			}
			return CycleOutcome::NoDepth;
		};

		let range = engine.depth_range();
		let detections = engine.detect(&color, &depth, &color.intrinsics, range.min, range.max);
		tp.stamp("detect");

		let count = detections.len();
		debug!("Found {count} tags at {}", color.stamp());
		match &self.images {
			Some(images) => {
				self.detections.publish(detections.clone());
				tp.stamp("publish");
				images.publish(annotate::render(&color, &detections));
				tp.stamp("annotate");
			},
			None => {
				self.detections.publish(detections);
				tp.stamp("publish");
			}
		}

		CycleOutcome::Published { detections: count }
	}

	/// Rebuild the engine from the current parameters
	///
	/// Waits for any running cycle. If the build fails, the previous engine
	/// stays in use.
	pub fn refresh(&self) -> Result<(), ConfigError> {
		let mut engine = self.engine.lock();
		match self.builder.build(&*self.params) {
			Ok(next) => {
				*engine = next;
				info!("Refreshed tag detector parameters");
				Ok(())
			},
			Err(e) => {
				error!("Unable to refresh tag detector parameters, keeping the previous ones: {e}");
				Err(e)
			}
		}
	}
}
