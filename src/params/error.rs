use thiserror::Error;

/// Error generated when reading configuration, or when
/// [building an engine](crate::EngineBuilder::build) from it
#[derive(Clone, Debug, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigError {
	#[error("Parameter {key} has the wrong type (expected: {expected}, actual: {actual})")]
	TypeMismatch {
		key: String,
		expected: &'static str,
		actual: &'static str,
	},
	#[error("Parameter {key} is invalid: {reason}")]
	InvalidValue {
		key: String,
		reason: String,
	},
	#[error("Unknown tag family {0:?}")]
	UnknownFamily(String),
	#[error("Invalid depth range (min: {min}, max: {max})")]
	InvalidDepthRange {
		min: f64,
		max: f64,
	},
	#[error("Tag description #{index} is invalid: {reason}")]
	InvalidTagDescription {
		index: usize,
		reason: String,
	},
	#[error("Unable to build tag detector: {0}")]
	Detector(String),
	#[error("Unable to parse parameters: {0}")]
	Parse(String),
}

impl ConfigError {
	pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
		Self::InvalidValue { key: key.into(), reason: reason.into() }
	}
}
