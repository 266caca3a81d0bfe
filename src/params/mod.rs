//! Live key-value configuration
mod error;
mod store;

pub use error::ConfigError;
pub use store::ParameterStore;

use std::{collections::BTreeMap, sync::Arc};

/// A single parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
	Bool(bool),
	Int(i64),
	Double(f64),
	String(String),
	List(Vec<ParamValue>),
	Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
	pub const fn type_name(&self) -> &'static str {
		match self {
			Self::Bool(_) => "bool",
			Self::Int(_) => "int",
			Self::Double(_) => "double",
			Self::String(_) => "string",
			Self::List(_) => "list",
			Self::Map(_) => "map",
		}
	}
}

impl From<bool> for ParamValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for ParamValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<i32> for ParamValue {
	fn from(value: i32) -> Self {
		Self::Int(value as i64)
	}
}

impl From<f64> for ParamValue {
	fn from(value: f64) -> Self {
		Self::Double(value)
	}
}

impl From<&str> for ParamValue {
	fn from(value: &str) -> Self {
		Self::String(value.into())
	}
}

impl From<String> for ParamValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<Vec<ParamValue>> for ParamValue {
	fn from(value: Vec<ParamValue>) -> Self {
		Self::List(value)
	}
}

impl From<BTreeMap<String, ParamValue>> for ParamValue {
	fn from(value: BTreeMap<String, ParamValue>) -> Self {
		Self::Map(value)
	}
}

/// Somewhere to look up configuration at the moment it's needed
///
/// Lookups are synchronous, and always see the latest value.
pub trait ParameterSource: Send + Sync {
	fn get(&self, key: &str) -> Option<ParamValue>;
}

impl<P: ParameterSource + ?Sized> ParameterSource for Arc<P> {
	fn get(&self, key: &str) -> Option<ParamValue> {
		(**self).get(key)
	}
}

impl<P: ParameterSource + ?Sized> ParameterSource for &P {
	fn get(&self, key: &str) -> Option<ParamValue> {
		(**self).get(key)
	}
}

/// Types that can be read out of a [ParamValue]
pub trait FromParam: Sized {
	const TYPE_NAME: &'static str;

	fn from_param(value: &ParamValue) -> Option<Self>;
}

impl FromParam for bool {
	const TYPE_NAME: &'static str = "bool";

	fn from_param(value: &ParamValue) -> Option<Self> {
		match value {
			ParamValue::Bool(v) => Some(*v),
			// Integer flags (0/1) are common in detector settings
			ParamValue::Int(v) => Some(*v != 0),
			_ => None,
		}
	}
}

impl FromParam for i64 {
	const TYPE_NAME: &'static str = "int";

	fn from_param(value: &ParamValue) -> Option<Self> {
		match value {
			ParamValue::Int(v) => Some(*v),
			_ => None,
		}
	}
}

impl FromParam for f64 {
	const TYPE_NAME: &'static str = "double";

	fn from_param(value: &ParamValue) -> Option<Self> {
		match value {
			ParamValue::Double(v) => Some(*v),
			ParamValue::Int(v) => Some(*v as f64),
			_ => None,
		}
	}
}

impl FromParam for String {
	const TYPE_NAME: &'static str = "string";

	fn from_param(value: &ParamValue) -> Option<Self> {
		match value {
			ParamValue::String(v) => Some(v.clone()),
			_ => None,
		}
	}
}

impl FromParam for Vec<ParamValue> {
	const TYPE_NAME: &'static str = "list";

	fn from_param(value: &ParamValue) -> Option<Self> {
		match value {
			ParamValue::List(v) => Some(v.clone()),
			_ => None,
		}
	}
}

/// Read `key`, falling back to `default` when it isn't set
///
/// A value of the wrong type is an error, not a fallback.
pub fn get_or<T: FromParam>(source: &(impl ParameterSource + ?Sized), key: &str, default: T) -> Result<T, ConfigError> {
	match source.get(key) {
		None => Ok(default),
		Some(value) => T::from_param(&value)
			.ok_or_else(|| ConfigError::TypeMismatch {
				key: key.into(),
				expected: T::TYPE_NAME,
				actual: value.type_name(),
			}),
	}
}
