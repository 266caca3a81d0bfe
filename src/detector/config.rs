use hashbrown::HashSet;

use crate::params::{get_or, ConfigError, FromParam, ParamValue, ParameterSource};

/// Tag families a detector can be asked for
pub const FAMILY_NAMES: [&str; 9] = [
	"tag16h5",
	"tag25h9",
	"tag36h10",
	"tag36h11",
	"tagCircle21h7",
	"tagCircle49h12",
	"tagCustom48h12",
	"tagStandard41h12",
	"tagStandard52h13",
];

/// Settings for the 2D [TagDetector](super::TagDetector)
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
	/// Tag family to decode (one of [FAMILY_NAMES])
	pub family: String,

	/// How many threads should be used?
	/// - One will be single-threaded
	pub nthreads: usize,

	/// Detection of quads can be done on a lower-resolution image,
	/// improving speed at a cost of pose accuracy and a slight
	/// decrease in detection rate. Decoding the binary payload is
	/// still done at full resolution.
	pub quad_decimate: f32,

	/// What Gaussian blur should be applied to the segmented image.
	/// Parameter is the standard deviation in pixels. Very noisy images
	/// benefit from non-zero values (e.g. 0.8). Negative values sharpen.
	pub quad_sigma: f32,

	/// When true, the edges of the each quad are adjusted to "snap
	/// to" strong gradients nearby.
	pub refine_edges: bool,

	/// Write debugging images (slow)
	pub debug: bool,

	/// Detect tags with up to this many bit errors
	pub max_hamming: u8,
}

impl Default for DetectorSettings {
	fn default() -> Self {
		Self {
			family: "tag36h11".into(),
			nthreads: 4,
			quad_decimate: 1.0,
			quad_sigma: 0.0,
			refine_edges: true,
			debug: false,
			max_hamming: 2,
		}
	}
}

/// Window of depths a tag may be reported at, in meters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
	pub min: f64,
	pub max: f64,
}

impl Default for DepthRange {
	fn default() -> Self {
		Self { min: 0.0, max: 10.0 }
	}
}

impl DepthRange {
	pub fn new(min: f64, max: f64) -> Result<Self, ConfigError> {
		if !(min.is_finite() && max.is_finite() && 0. <= min && min < max) {
			return Err(ConfigError::InvalidDepthRange { min, max });
		}
		Ok(Self { min, max })
	}

	#[inline]
	pub fn contains(&self, depth: f64) -> bool {
		self.min <= depth && depth <= self.max
	}
}

/// A tag we expect to see
#[derive(Debug, Clone, PartialEq)]
pub struct TagDescription {
	pub id: u32,
	/// Edge length, in meters
	pub size: f64,
	/// Name of the tag's coordinate frame
	pub frame_name: String,
}

impl TagDescription {
	/// Default frame name for a tag
	pub fn default_frame_name(id: u32) -> String {
		format!("tag_{id}")
	}

	fn from_param(index: usize, value: &ParamValue) -> Result<Self, ConfigError> {
		let invalid = |reason: &str| ConfigError::InvalidTagDescription { index, reason: reason.into() };

		let ParamValue::Map(fields) = value else {
			return Err(invalid("expected a table"));
		};

		let id = fields.get("id")
			.and_then(i64::from_param)
			.ok_or_else(|| invalid("missing integer 'id'"))?;
		let id = u32::try_from(id)
			.map_err(|_| invalid("'id' out of range"))?;

		let size = fields.get("size")
			.and_then(f64::from_param)
			.ok_or_else(|| invalid("missing number 'size'"))?;
		if !(size > 0. && size.is_finite()) {
			return Err(invalid("'size' must be positive"));
		}

		let frame_name = match fields.get("name") {
			None => Self::default_frame_name(id),
			Some(name) => String::from_param(name)
				.ok_or_else(|| invalid("'name' must be a string"))?,
		};

		Ok(Self { id, size, frame_name })
	}
}

/// Everything an engine is built from
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
	pub detector: DetectorSettings,
	/// Broadcast a transform per detected tag
	pub publish_tf: bool,
	/// Parent frame for transforms, if the image doesn't name one
	pub camera_frame: String,
	/// Drop every tag whose id was seen more than once in a frame
	pub remove_duplicates: bool,
	pub depth_range: DepthRange,
	/// Tags to report. Empty means every tag.
	pub standalone_tags: Vec<TagDescription>,
}

impl Default for DetectorConfig {
	fn default() -> Self {
		Self {
			detector: DetectorSettings::default(),
			publish_tf: false,
			camera_frame: "camera".into(),
			remove_duplicates: true,
			depth_range: DepthRange::default(),
			standalone_tags: Vec::new(),
		}
	}
}

fn get_int_in<T: TryFrom<i64> + Into<i64>>(params: &dyn ParameterSource, key: &str, default: T, min: i64, max: i64) -> Result<T, ConfigError> {
	let value = get_or::<i64>(params, key, default.into())?;
	if value < min || value > max {
		return Err(ConfigError::invalid(key, format!("{value} is outside {min}..={max}")));
	}
	T::try_from(value)
		.map_err(|_| ConfigError::invalid(key, format!("{value} is out of range")))
}

impl DetectorConfig {
	/// Read the configuration from `params`
	///
	/// Unset keys take their defaults; set keys are validated.
	pub fn from_params(params: &dyn ParameterSource) -> Result<Self, ConfigError> {
		let defaults = Self::default();

		let family = get_or(params, "tag_family", defaults.detector.family)?;
		if !FAMILY_NAMES.contains(&family.as_str()) {
			return Err(ConfigError::UnknownFamily(family));
		}

		let nthreads = get_int_in::<u32>(params, "tag_threads", defaults.detector.nthreads as u32, 1, 256)? as usize;
		let max_hamming = get_int_in::<u8>(params, "max_hamming_dist", defaults.detector.max_hamming, 0, 3)?;

		let quad_decimate = get_or(params, "tag_decimate", defaults.detector.quad_decimate as f64)?;
		if !(quad_decimate >= 1.) {
			return Err(ConfigError::invalid("tag_decimate", "must be at least 1"));
		}
		let quad_sigma = get_or(params, "tag_blur", defaults.detector.quad_sigma as f64)?;
		if !quad_sigma.is_finite() {
			return Err(ConfigError::invalid("tag_blur", "must be finite"));
		}

		let detector = DetectorSettings {
			family,
			nthreads,
			quad_decimate: quad_decimate as f32,
			quad_sigma: quad_sigma as f32,
			refine_edges: get_or(params, "tag_refine_edges", defaults.detector.refine_edges)?,
			debug: get_or(params, "tag_debug", defaults.detector.debug)?,
			max_hamming,
		};

		let depth_range = DepthRange::new(
			get_or(params, "depth_min_range", defaults.depth_range.min)?,
			get_or(params, "depth_max_range", defaults.depth_range.max)?,
		)?;

		let standalone_tags = get_or(params, "standalone_tags", Vec::new())?
			.iter()
			.enumerate()
			.map(|(i, v)| TagDescription::from_param(i, v))
			.collect::<Result<Vec<_>, _>>()?;
		let mut seen = HashSet::new();
		for (index, tag) in standalone_tags.iter().enumerate() {
			if !seen.insert(tag.id) {
				return Err(ConfigError::InvalidTagDescription { index, reason: format!("duplicate id {}", tag.id) });
			}
		}

		Ok(Self {
			detector,
			publish_tf: get_or(params, "publish_tf", defaults.publish_tf)?,
			camera_frame: get_or(params, "camera_frame", defaults.camera_frame)?,
			remove_duplicates: get_or(params, "remove_duplicates", defaults.remove_duplicates)?,
			depth_range,
			standalone_tags,
		})
	}

	/// Description for tag `id`
	///
	/// With no descriptions configured, every tag gets an implicit one
	/// without a size.
	pub fn describe(&self, id: u32) -> Option<(Option<f64>, String)> {
		if self.standalone_tags.is_empty() {
			return Some((None, TagDescription::default_frame_name(id)));
		}
		self.standalone_tags.iter()
			.find(|tag| tag.id == id)
			.map(|tag| (Some(tag.size), tag.frame_name.clone()))
	}
}
