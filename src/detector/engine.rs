use std::sync::Arc;

use hashbrown::HashMap;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::{
	engine::{Engine, EngineBuilder},
	frame::{ColorFrame, DepthFrame},
	msg::{CameraIntrinsics, DetectionSet, Header, Pose, TagDetection, TagTransform},
	params::{ConfigError, ParameterSource},
	publish::Sink,
};

use super::{depth::{corner_positions, orientation_from_corners, DepthSampler}, DepthRange, DetectorConfig, DetectorFactory, TagDetector, TagObservation};

/// Fuse observations on the thread pool above this many
const PARALLEL_THRESHOLD: usize = 32;

/// [Engine] that runs a 2D [TagDetector] and places its tags with a depth map
pub struct DepthTagEngine<D> {
	config: DetectorConfig,
	detector: D,
	transforms: Option<Arc<dyn Sink<TagTransform>>>,
	wp: ThreadPool,
}

impl<D: TagDetector> DepthTagEngine<D> {
	pub fn new(config: DetectorConfig, detector: D, transforms: Option<Arc<dyn Sink<TagTransform>>>) -> Result<Self, ConfigError> {
		let wp = ThreadPoolBuilder::new()
			.num_threads(config.detector.nthreads)
			.thread_name(|i| format!("tag-fuse-{i}"))
			.build()
			.map_err(|e| ConfigError::Detector(e.to_string()))?;

		Ok(Self {
			config,
			detector,
			transforms,
			wp,
		})
	}

	fn fuse(&self, obs: &TagObservation, sampler: &DepthSampler, intrinsics: &CameraIntrinsics, range: &DepthRange) -> Option<TagDetection> {
		let (size, frame_name) = self.config.describe(obs.id)?;

		let depth = match sampler.median_at(&obs.center) {
			Some(depth) => depth,
			None => {
				debug!("Tag {} has no depth", obs.id);
				return None;
			}
		};
		if !range.contains(depth as f64) {
			debug!("Tag {} at {depth}m is outside {}..={}m", obs.id, range.min, range.max);
			return None;
		}

		let position = intrinsics.unproject(obs.center.x(), obs.center.y(), depth as f64);
		let orientation = corner_positions(sampler, intrinsics, &obs.corners)
			.and_then(|corners| orientation_from_corners(&corners))
			.or(obs.orientation)
			.unwrap_or_default();

		Some(TagDetection {
			id: obs.id,
			family: obs.family.clone(),
			size,
			frame_name,
			hamming: obs.hamming,
			decision_margin: obs.decision_margin,
			center: obs.center,
			corners: obs.corners,
			depth,
			pose: Pose { position, orientation },
		})
	}
}

/// Drop every detection whose id appears more than once
fn remove_duplicates(detections: &mut Vec<TagDetection>) {
	let mut counts = HashMap::<u32, usize>::new();
	for det in detections.iter() {
		*counts.entry(det.id).or_default() += 1;
	}
	for (id, count) in counts.iter().filter(|(_, count)| **count > 1) {
		warn!("Found {count} tags with id {id}; ignoring all of them");
	}
	detections.retain(|det| counts.get(&det.id).copied() == Some(1));
}

impl<D: TagDetector> Engine for DepthTagEngine<D> {
	fn detect(&self, color: &ColorFrame, depth: &DepthFrame, intrinsics: &CameraIntrinsics, min_depth: f64, max_depth: f64) -> DetectionSet {
		let header = Header {
			stamp: color.header.stamp,
			frame_id: if color.header.frame_id.is_empty() { self.config.camera_frame.clone() } else { color.header.frame_id.clone() },
		};

		if !intrinsics.is_valid() {
			warn!("Unusable camera intrinsics {intrinsics:?}");
			return DetectionSet { header, detections: Vec::new() };
		}

		let gray = color.image.to_gray();
		let observations = match self.detector.detect(&gray) {
			Ok(observations) => observations,
			Err(e) => {
				warn!("Tag detector failed: {e}");
				return DetectionSet { header, detections: Vec::new() };
			}
		};

		let sampler = DepthSampler::new(depth, color.image.width(), color.image.height());
		let range = DepthRange { min: min_depth, max: max_depth };

		let mut detections = if observations.len() > PARALLEL_THRESHOLD && self.config.detector.nthreads > 1 {
			self.wp.install(|| {
				observations.par_iter()
					.filter_map(|obs| self.fuse(obs, &sampler, intrinsics, &range))
					.collect::<Vec<_>>()
			})
		} else {
			observations.iter()
				.filter_map(|obs| self.fuse(obs, &sampler, intrinsics, &range))
				.collect::<Vec<_>>()
		};

		if self.config.remove_duplicates {
			remove_duplicates(&mut detections);
		}
		detections.sort_by_key(|det| det.id);

		if self.config.publish_tf {
			if let Some(sink) = &self.transforms {
				for det in detections.iter() {
					sink.publish(TagTransform {
						header: header.clone(),
						child_frame_id: det.frame_name.clone(),
						pose: det.pose,
					});
				}
			}
		}

		DetectionSet { header, detections }
	}

	fn publish_tf(&self) -> bool {
		self.config.publish_tf
	}

	fn depth_range(&self) -> DepthRange {
		self.config.depth_range
	}
}

/// Builds a [DepthTagEngine] from the live parameters
pub struct DepthTagEngineBuilder<F> {
	factory: F,
	transforms: Option<Arc<dyn Sink<TagTransform>>>,
}

impl<F: DetectorFactory> DepthTagEngineBuilder<F> {
	pub fn new(factory: F) -> Self {
		Self {
			factory,
			transforms: None,
		}
	}

	/// Where transforms go when `publish_tf` is set
	pub fn with_transform_sink(mut self, sink: Arc<dyn Sink<TagTransform>>) -> Self {
		self.transforms = Some(sink);
		self
	}
}

impl<F: DetectorFactory> EngineBuilder for DepthTagEngineBuilder<F> {
	type Engine = DepthTagEngine<F::Detector>;

	fn build(&self, params: &dyn ParameterSource) -> Result<Self::Engine, ConfigError> {
		let config = DetectorConfig::from_params(params)?;
		let detector = self.factory.create(&config.detector)?;
		DepthTagEngine::new(config, detector, self.transforms.clone())
	}
}
