use std::{sync::{atomic::{AtomicBool, AtomicUsize, Ordering}, Arc}, thread, time::Duration};

use parking_lot::Mutex;

use super::{CycleOutcome, DetectionCoordinator};
use crate::{
	convert::ImageEncoding,
	detector::{DepthRange, DepthTagEngineBuilder, DetectError, DetectorSettings, TagDetector, TagObservation},
	engine::{Engine, EngineBuilder},
	frame::{ColorFrame, DepthFrame},
	msg::{AnnotatedImage, CameraInfo, CameraIntrinsics, DetectionSet, Header, RawImage, Timestamp},
	params::{get_or, ConfigError, ParameterSource, ParameterStore},
	publish::{Publisher, Sink},
	util::{ImageY8, Point2D},
};

/// Sink with a settable consumer count that keeps everything published to it
struct TestSink<T> {
	consumers: AtomicUsize,
	received: Mutex<Vec<T>>,
}

impl<T> TestSink<T> {
	fn new(consumers: usize) -> Arc<Self> {
		Arc::new(Self {
			consumers: AtomicUsize::new(consumers),
			received: Mutex::new(Vec::new()),
		})
	}

	fn len(&self) -> usize {
		self.received.lock().len()
	}
}

impl<T: Send> Sink<T> for TestSink<T> {
	fn publish(&self, message: T) {
		self.received.lock().push(message);
	}

	fn active_consumer_count(&self) -> usize {
		self.consumers.load(Ordering::SeqCst)
	}
}

/// Records what engines see, and catches builds and detections overlapping
#[derive(Default)]
struct Recorder {
	busy: AtomicBool,
	overlaps: AtomicUsize,
	detects: AtomicUsize,
	builds: AtomicUsize,
	depth_stamps: Mutex<Vec<Timestamp>>,
	generations: Mutex<Vec<u64>>,
}

impl Recorder {
	fn enter(&self) {
		if self.busy.swap(true, Ordering::SeqCst) {
			self.overlaps.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn exit(&self) {
		self.busy.store(false, Ordering::SeqCst);
	}
}

struct MockEngine {
	/// Written in two steps during construction; a half-built engine has them differ
	generation: u64,
	generation_copy: u64,
	publish_tf: bool,
	recorder: Arc<Recorder>,
	work: Duration,
}

impl Engine for MockEngine {
	fn detect(&self, color: &ColorFrame, depth: &DepthFrame, _intrinsics: &CameraIntrinsics, _min_depth: f64, _max_depth: f64) -> DetectionSet {
		self.recorder.enter();
		self.recorder.detects.fetch_add(1, Ordering::SeqCst);
		self.recorder.depth_stamps.lock().push(depth.stamp());
		assert_eq!(self.generation, self.generation_copy);
		self.recorder.generations.lock().push(self.generation);
		thread::sleep(self.work);
		self.recorder.exit();
		DetectionSet {
			header: color.header.clone(),
			detections: Vec::new(),
		}
	}

	fn publish_tf(&self) -> bool {
		self.publish_tf
	}

	fn depth_range(&self) -> DepthRange {
		DepthRange::default()
	}
}

struct MockBuilder {
	recorder: Arc<Recorder>,
	delay: Duration,
}

impl MockBuilder {
	fn read(&self, params: &dyn ParameterSource) -> Result<MockEngine, ConfigError> {
		let generation = get_or(params, "generation", 0i64)? as u64;
		let publish_tf = get_or(params, "publish_tf", false)?;
		let mut engine = MockEngine {
			generation,
			generation_copy: u64::MAX,
			publish_tf,
			recorder: self.recorder.clone(),
			work: self.delay,
		};
		thread::sleep(self.delay);
		if get_or(params, "fail", false)? {
			return Err(ConfigError::Detector("refusing to build".into()));
		}
		engine.generation_copy = generation;
		Ok(engine)
	}
}

impl EngineBuilder for MockBuilder {
	type Engine = MockEngine;

	fn build(&self, params: &dyn ParameterSource) -> Result<MockEngine, ConfigError> {
		self.recorder.enter();
		self.recorder.builds.fetch_add(1, Ordering::SeqCst);
		let result = self.read(params);
		self.recorder.exit();
		result
	}
}

struct Fixture {
	params: Arc<ParameterStore>,
	recorder: Arc<Recorder>,
	detections: Arc<TestSink<DetectionSet>>,
	images: Arc<TestSink<AnnotatedImage>>,
	coordinator: DetectionCoordinator<MockBuilder>,
}

fn fixture_with(params: ParameterStore, detection_consumers: usize, image_consumers: usize, delay: Duration) -> Fixture {
	let params = Arc::new(params);
	let recorder = Arc::new(Recorder::default());
	let detections = TestSink::new(detection_consumers);
	let images = TestSink::new(image_consumers);
	let builder = MockBuilder { recorder: recorder.clone(), delay };
	let coordinator = DetectionCoordinator::new(
		builder,
		params.clone(),
		detections.clone(),
		Some(images.clone() as Arc<dyn Sink<AnnotatedImage>>),
	).unwrap();
	Fixture { params, recorder, detections, images, coordinator }
}

fn fixture() -> Fixture {
	fixture_with(ParameterStore::new(), 1, 0, Duration::ZERO)
}

fn color_image(stamp: u64) -> RawImage {
	RawImage {
		header: Header { stamp: Timestamp::from_nanos(stamp), frame_id: "camera_color".into() },
		width: 8,
		height: 8,
		encoding: "rgb8".into(),
		is_bigendian: false,
		step: 24,
		data: vec![0; 8 * 8 * 3],
	}
}

fn camera_info() -> CameraInfo {
	CameraInfo {
		width: 8,
		height: 8,
		k: [10., 0., 4., 0., 10., 4., 0., 0., 1.],
		..Default::default()
	}
}

fn depth_image(stamp: u64, width: u32, height: u32, meters: impl Fn(u32, u32) -> f32) -> RawImage {
	let mut data = Vec::with_capacity((width * height * 4) as usize);
	for y in 0..height {
		for x in 0..width {
			data.extend_from_slice(&meters(x, y).to_le_bytes());
		}
	}
	RawImage {
		header: Header { stamp: Timestamp::from_nanos(stamp), frame_id: "camera_depth".into() },
		width,
		height,
		encoding: "32FC1".into(),
		is_bigendian: false,
		step: width * 4,
		data,
	}
}

fn flat_depth(stamp: u64) -> RawImage {
	depth_image(stamp, 8, 8, |_, _| 1.0)
}

#[test]
fn gating_all_combinations() {
	for bits in 0..8u8 {
		let detection_consumers = (bits & 1) as usize;
		let image_consumers = ((bits >> 1) & 1) as usize;
		let publish_tf = bits & 4 != 0;

		let params = ParameterStore::new();
		params.set("publish_tf", publish_tf);
		let f = fixture_with(params, detection_consumers, image_consumers, Duration::ZERO);
		f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();

		let outcome = f.coordinator.on_color_frame(&color_image(2), &camera_info());
		let detects = f.recorder.detects.load(Ordering::SeqCst);
		if bits == 0 {
			assert_eq!(outcome, CycleOutcome::NoDemand);
			assert_eq!(detects, 0);
			assert_eq!(f.detections.len(), 0);
		} else {
			assert_eq!(outcome, CycleOutcome::Published { detections: 0 }, "bits {bits:03b}");
			assert_eq!(detects, 1);
			// Published even to nobody, when only the transform flag is set
			assert_eq!(f.detections.len(), 1);
			assert_eq!(f.images.len(), 1);
		}
	}
}

#[test]
fn consumers_counted_each_cycle() {
	let f = fixture_with(ParameterStore::new(), 0, 0, Duration::ZERO);
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();
	assert_eq!(f.coordinator.on_color_frame(&color_image(2), &camera_info()), CycleOutcome::NoDemand);

	f.images.consumers.store(2, Ordering::SeqCst);
	assert_eq!(f.coordinator.on_color_frame(&color_image(3), &camera_info()), CycleOutcome::Published { detections: 0 });

	f.images.consumers.store(0, Ordering::SeqCst);
	assert_eq!(f.coordinator.on_color_frame(&color_image(4), &camera_info()), CycleOutcome::NoDemand);
	assert_eq!(f.recorder.detects.load(Ordering::SeqCst), 1);
}

#[test]
fn uses_newest_depth() {
	let f = fixture();
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();
	f.coordinator.on_depth_frame(&flat_depth(2)).unwrap();
	f.coordinator.on_color_frame(&color_image(3), &camera_info());

	assert_eq!(*f.recorder.depth_stamps.lock(), vec![Timestamp::from_nanos(2)]);
}

#[test]
fn depth_may_arrive_after_color() {
	let f = fixture();
	f.coordinator.on_depth_frame(&flat_depth(10)).unwrap();
	// Older color frame still pairs with whatever depth is newest
	f.coordinator.on_color_frame(&color_image(5), &camera_info());
	f.coordinator.on_depth_frame(&flat_depth(11)).unwrap();
	f.coordinator.on_color_frame(&color_image(6), &camera_info());

	assert_eq!(*f.recorder.depth_stamps.lock(), vec![Timestamp::from_nanos(10), Timestamp::from_nanos(11)]);
}

#[test]
fn skips_without_depth() {
	for bits in 0..8u8 {
		let params = ParameterStore::new();
		params.set("publish_tf", bits & 4 != 0);
		let f = fixture_with(params, (bits & 1) as usize, ((bits >> 1) & 1) as usize, Duration::ZERO);

		for stamp in 0..3 {
			let outcome = f.coordinator.on_color_frame(&color_image(stamp), &camera_info());
			assert_ne!(outcome, CycleOutcome::Published { detections: 0 });
			if bits != 0 {
				assert_eq!(outcome, CycleOutcome::NoDepth);
			}
		}
		assert_eq!(f.recorder.detects.load(Ordering::SeqCst), 0);
		assert_eq!(f.detections.len(), 0);
		assert_eq!(f.images.len(), 0);
	}

	// Recovers once depth shows up
	let f = fixture();
	assert_eq!(f.coordinator.on_color_frame(&color_image(1), &camera_info()), CycleOutcome::NoDepth);
	f.coordinator.on_depth_frame(&flat_depth(2)).unwrap();
	assert_eq!(f.coordinator.on_color_frame(&color_image(3), &camera_info()), CycleOutcome::Published { detections: 0 });
}

#[test]
fn bad_color_frame_only_aborts_its_cycle() {
	let f = fixture();
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();

	let mut bad = color_image(2);
	bad.encoding = "yuv422".into();
	assert_eq!(f.coordinator.on_color_frame(&bad, &camera_info()), CycleOutcome::ConversionFailed);

	let mut short = color_image(3);
	short.data.truncate(10);
	assert_eq!(f.coordinator.on_color_frame(&short, &camera_info()), CycleOutcome::ConversionFailed);
	assert_eq!(f.recorder.detects.load(Ordering::SeqCst), 0);
	assert_eq!(f.detections.len(), 0);

	assert_eq!(f.coordinator.on_color_frame(&color_image(4), &camera_info()), CycleOutcome::Published { detections: 0 });
	assert_eq!(f.detections.len(), 1);
}

#[test]
fn pinned_color_encoding_rejects_others() {
	let recorder = Arc::new(Recorder::default());
	let detections = TestSink::new(1);
	let builder = MockBuilder { recorder: recorder.clone(), delay: Duration::ZERO };
	let coordinator = DetectionCoordinator::new(builder, Arc::new(ParameterStore::new()), detections.clone(), None)
		.unwrap()
		.with_color_encoding(ImageEncoding::Rgb8);
	coordinator.on_depth_frame(&flat_depth(1)).unwrap();

	let mut bgr = color_image(2);
	bgr.encoding = "bgr8".into();
	assert_eq!(coordinator.on_color_frame(&bgr, &camera_info()), CycleOutcome::ConversionFailed);
	assert_eq!(recorder.detects.load(Ordering::SeqCst), 0);
	assert_eq!(detections.len(), 0);

	assert_eq!(coordinator.on_color_frame(&color_image(3), &camera_info()), CycleOutcome::Published { detections: 0 });
	assert_eq!(detections.len(), 1);
}

#[test]
fn oversized_frames_are_rejected() {
	let f = fixture();
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();

	let mut huge = color_image(2);
	(huge.width, huge.height, huge.step) = (u32::MAX, u32::MAX, u32::MAX);
	huge.data = vec![0; 16];
	assert_eq!(f.coordinator.on_color_frame(&huge, &camera_info()), CycleOutcome::ConversionFailed);

	let mut huge_depth = flat_depth(3);
	(huge_depth.width, huge_depth.height, huge_depth.step) = (u32::MAX, u32::MAX, u32::MAX);
	huge_depth.data = vec![0; 16];
	assert!(f.coordinator.on_depth_frame(&huge_depth).is_err());
	assert_eq!(f.coordinator.depth_cache().read().map(|d| d.stamp()), Some(Timestamp::from_nanos(1)));
}

#[test]
fn bad_depth_frame_keeps_previous() {
	let f = fixture();
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();

	let mut bad = flat_depth(2);
	bad.encoding = "bgr8".into();
	assert!(f.coordinator.on_depth_frame(&bad).is_err());
	let mut short = flat_depth(3);
	short.data.truncate(4);
	assert!(f.coordinator.on_depth_frame(&short).is_err());

	f.coordinator.on_color_frame(&color_image(4), &camera_info());
	assert_eq!(*f.recorder.depth_stamps.lock(), vec![Timestamp::from_nanos(1)]);
}

#[test]
fn refresh_applies_new_parameters() {
	let f = fixture();
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();
	f.coordinator.on_color_frame(&color_image(2), &camera_info());

	f.params.set("generation", 7i64);
	// Parameters are only read when building
	f.coordinator.on_color_frame(&color_image(3), &camera_info());
	f.coordinator.refresh().unwrap();
	f.coordinator.on_color_frame(&color_image(4), &camera_info());

	assert_eq!(*f.recorder.generations.lock(), vec![0, 0, 7]);
	assert_eq!(f.recorder.builds.load(Ordering::SeqCst), 2);
}

#[test]
fn refresh_can_enable_transforms() {
	let f = fixture_with(ParameterStore::new(), 0, 0, Duration::ZERO);
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();
	assert_eq!(f.coordinator.on_color_frame(&color_image(2), &camera_info()), CycleOutcome::NoDemand);

	f.params.set("publish_tf", true);
	f.coordinator.refresh().unwrap();
	assert!(f.coordinator.with_engine(|e| e.publish_tf()));
	assert_eq!(f.coordinator.on_color_frame(&color_image(3), &camera_info()), CycleOutcome::Published { detections: 0 });
}

#[test]
fn failed_refresh_keeps_engine() {
	let f = fixture();
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();
	f.params.set("generation", 3i64);
	f.coordinator.refresh().unwrap();

	f.params.set("generation", 4i64);
	f.params.set("fail", true);
	assert_eq!(f.coordinator.refresh(), Err(ConfigError::Detector("refusing to build".into())));

	f.params.set("generation", "five");
	assert!(matches!(f.coordinator.refresh(), Err(ConfigError::TypeMismatch { .. })));

	assert_eq!(f.coordinator.on_color_frame(&color_image(2), &camera_info()), CycleOutcome::Published { detections: 0 });
	assert_eq!(*f.recorder.generations.lock(), vec![3]);
}

#[test]
fn initial_build_error_is_returned() {
	let params = Arc::new(ParameterStore::new());
	params.set("fail", true);
	let builder = MockBuilder { recorder: Default::default(), delay: Duration::ZERO };
	let result = DetectionCoordinator::new(builder, params, TestSink::<DetectionSet>::new(1), None);
	assert!(result.is_err());
}

#[test]
fn refresh_excludes_cycles() {
	let f = fixture_with(ParameterStore::new(), 1, 1, Duration::from_millis(1));
	f.coordinator.on_depth_frame(&flat_depth(0)).unwrap();

	thread::scope(|s| {
		for t in 0..3u64 {
			let f = &f;
			s.spawn(move || {
				for i in 0..20 {
					f.coordinator.on_color_frame(&color_image(t * 100 + i), &camera_info());
				}
			});
		}
		s.spawn(|| {
			for i in 0..20 {
				f.coordinator.on_depth_frame(&flat_depth(i + 1)).unwrap();
			}
		});
		s.spawn(|| {
			for generation in 1..=10i64 {
				f.params.set("generation", generation);
				f.params.set("fail", generation % 3 == 0);
				let _ = f.coordinator.refresh();
			}
		});
	});

	assert_eq!(f.recorder.overlaps.load(Ordering::SeqCst), 0);
	assert_eq!(f.recorder.detects.load(Ordering::SeqCst), 60);
	assert_eq!(f.detections.len(), 60);
	assert_eq!(f.images.len(), 60);
	// Generations only move forward, and failed builds were never used
	let generations = f.recorder.generations.lock();
	assert!(generations.windows(2).all(|w| w[0] <= w[1]));
	assert!(generations.iter().all(|g| g % 3 != 0 || *g == 0));
}

#[test]
fn depth_updates_do_not_wait_for_cycles() {
	let f = fixture_with(ParameterStore::new(), 1, 0, Duration::from_millis(50));
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();

	thread::scope(|s| {
		let cycle = s.spawn(|| f.coordinator.on_color_frame(&color_image(2), &camera_info()));
		// Wait for the cycle to be inside the engine
		while f.recorder.detects.load(Ordering::SeqCst) == 0 {
			thread::yield_now();
		}
		f.coordinator.on_depth_frame(&flat_depth(3)).unwrap();
		assert_eq!(f.coordinator.depth_cache().read().map(|d| d.stamp()), Some(Timestamp::from_nanos(3)));
		assert!(f.recorder.busy.load(Ordering::SeqCst));
		assert_eq!(cycle.join().unwrap(), CycleOutcome::Published { detections: 0 });
	});

	// The running cycle kept the frame it started with
	assert_eq!(*f.recorder.depth_stamps.lock(), vec![Timestamp::from_nanos(1)]);
}

#[test]
fn statistics_cover_cycles() {
	let f = fixture();
	f.coordinator.on_depth_frame(&flat_depth(1)).unwrap();
	for i in 0..4 {
		f.coordinator.on_color_frame(&color_image(i), &camera_info());
	}
	let stats = f.coordinator.statistics();
	assert_eq!(stats.profiles(), 4);
	assert_eq!(stats.names().collect::<Vec<_>>(), vec!["lock", "convert", "detect", "publish", "annotate"]);
	assert_eq!(stats.get("detect").unwrap().count, 4);
}

/// Reports one tag at each of the given centers
struct ScriptedDetector(Vec<(u32, Point2D)>);

impl TagDetector for ScriptedDetector {
	fn detect(&self, _image: &ImageY8) -> Result<Vec<TagObservation>, DetectError> {
		Ok(self.0.iter()
			.map(|(id, c)| TagObservation {
				family: "tag36h11".into(),
				id: *id,
				hamming: 0,
				decision_margin: 100.,
				center: *c,
				corners: [*c + (-1., -1.), *c + (1., -1.), *c + (1., 1.), *c + (-1., 1.)],
				orientation: None,
			})
			.collect())
	}
}

fn depth_coordinator(params: ParameterStore) -> (DetectionCoordinator<impl EngineBuilder>, Arc<Publisher<DetectionSet>>) {
	let detections = Arc::new(Publisher::new("tag_detections"));
	let builder = DepthTagEngineBuilder::new(|_: &DetectorSettings| -> Result<ScriptedDetector, ConfigError> {
		Ok(ScriptedDetector(vec![(1, Point2D::of(1.5, 4.)), (2, Point2D::of(6.5, 4.))]))
	});
	let coordinator = DetectionCoordinator::new(builder, Arc::new(params), detections.clone(), None).unwrap();
	(coordinator, detections)
}

/// 0.2m on the left half, 5m on the right
fn split_depth() -> RawImage {
	depth_image(1, 8, 8, |x, _| if x < 4 { 0.2 } else { 5.0 })
}

#[test]
fn keeps_tags_within_default_bounds() {
	let (coordinator, detections) = depth_coordinator(ParameterStore::new());
	let sub = detections.subscribe(1);
	coordinator.on_depth_frame(&split_depth()).unwrap();

	assert_eq!(coordinator.on_color_frame(&color_image(2), &camera_info()), CycleOutcome::Published { detections: 2 });
	let set = sub.try_recv().unwrap();
	assert_eq!(set.ids().collect::<Vec<_>>(), vec![1, 2]);
	assert_eq!(set.detections[0].depth, 0.2);
	assert_eq!(set.detections[1].depth, 5.0);
}

#[test]
fn drops_tags_outside_bounds() {
	let params = ParameterStore::new();
	params.set("depth_max_range", 1.0);
	let (coordinator, detections) = depth_coordinator(params);
	let sub = detections.subscribe(1);
	coordinator.on_depth_frame(&split_depth()).unwrap();

	assert_eq!(coordinator.on_color_frame(&color_image(2), &camera_info()), CycleOutcome::Published { detections: 1 });
	let set = sub.try_recv().unwrap();
	assert_eq!(set.ids().collect::<Vec<_>>(), vec![1]);
	assert_eq!(set.header.frame_id, "camera_color");
}
