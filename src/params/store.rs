use std::collections::BTreeMap;

use hashbrown::HashMap;
use parking_lot::RwLock;

use super::{ConfigError, ParamValue, ParameterSource};

/// In-memory parameter server
///
/// Values can be changed at any time; readers see the change on their
/// next lookup.
#[derive(Default, Debug)]
pub struct ParameterStore {
	values: RwLock<HashMap<String, ParamValue>>,
}

impl ParameterStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parse a TOML document
	///
	/// Nested tables become `/`-separated keys (`[detector] tag_family = ...`
	/// is stored as `detector/tag_family`). Tables inside arrays are kept as
	/// [maps](ParamValue::Map).
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		let store = Self::new();
		store.merge_toml_str(text)?;
		Ok(store)
	}

	/// Set every value in a TOML document, keeping values it doesn't mention
	pub fn merge_toml_str(&self, text: &str) -> Result<(), ConfigError> {
		let table = text.parse::<toml::Table>()
			.map_err(|e| ConfigError::Parse(e.to_string()))?;

		let mut flat = Vec::new();
		flatten_table("", table, &mut flat)?;

		let mut values = self.values.write();
		for (key, value) in flat {
			values.insert(key, value);
		}
		Ok(())
	}

	pub fn set(&self, key: &str, value: impl Into<ParamValue>) {
		self.values.write().insert(key.into(), value.into());
	}

	pub fn remove(&self, key: &str) -> Option<ParamValue> {
		self.values.write().remove(key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.values.read().contains_key(key)
	}

	/// All keys, sorted
	pub fn keys(&self) -> Vec<String> {
		let mut keys = self.values.read().keys().cloned().collect::<Vec<_>>();
		keys.sort_unstable();
		keys
	}
}

impl ParameterSource for ParameterStore {
	fn get(&self, key: &str) -> Option<ParamValue> {
		self.values.read().get(key).cloned()
	}
}

fn flatten_table(prefix: &str, table: toml::Table, out: &mut Vec<(String, ParamValue)>) -> Result<(), ConfigError> {
	for (key, value) in table {
		let key = if prefix.is_empty() { key } else { format!("{prefix}/{key}") };
		match value {
			toml::Value::Table(inner) => flatten_table(&key, inner, out)?,
			other => {
				let value = convert_value(&key, other)?;
				out.push((key, value));
			}
		}
	}
	Ok(())
}

fn convert_value(key: &str, value: toml::Value) -> Result<ParamValue, ConfigError> {
	let res = match value {
		toml::Value::String(v) => ParamValue::String(v),
		toml::Value::Integer(v) => ParamValue::Int(v),
		toml::Value::Float(v) => ParamValue::Double(v),
		toml::Value::Boolean(v) => ParamValue::Bool(v),
		toml::Value::Datetime(_) => return Err(ConfigError::invalid(key, "datetimes are not supported")),
		toml::Value::Array(items) => ParamValue::List(items
			.into_iter()
			.map(|item| convert_value(key, item))
			.collect::<Result<Vec<_>, _>>()?),
		toml::Value::Table(table) => ParamValue::Map(table
			.into_iter()
			.map(|(k, v)| Ok((k, convert_value(key, v)?)))
			.collect::<Result<BTreeMap<_, _>, ConfigError>>()?),
	};
	Ok(res)
}

#[cfg(test)]
mod test {
	use super::ParameterStore;
	use crate::params::{ConfigError, ParamValue, ParameterSource};

	#[test]
	fn toml_document() {
		let store = ParameterStore::from_toml_str(r#"
			tag_family = "tag25h9"
			depth_max_range = 4.5
			publish_tf = true
			standalone_tags = [
				{ id = 1, size = 0.05 },
				{ id = 2, size = 0.1, name = "dock" },
			]

			[camera]
			frame = "cam0"
		"#).unwrap();

		assert_eq!(store.get("tag_family"), Some(ParamValue::String("tag25h9".into())));
		assert_eq!(store.get("depth_max_range"), Some(ParamValue::Double(4.5)));
		assert_eq!(store.get("camera/frame"), Some(ParamValue::String("cam0".into())));
		match store.get("standalone_tags") {
			Some(ParamValue::List(tags)) => {
				assert_eq!(tags.len(), 2);
				assert!(matches!(&tags[1], ParamValue::Map(m) if m.get("name") == Some(&ParamValue::String("dock".into()))));
			},
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn merge_overrides() {
		let store = ParameterStore::from_toml_str("a = 1\nb = 2").unwrap();
		store.merge_toml_str("b = 3").unwrap();
		assert_eq!(store.get("a"), Some(ParamValue::Int(1)));
		assert_eq!(store.get("b"), Some(ParamValue::Int(3)));
		assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
	}

	#[test]
	fn parse_error() {
		assert!(matches!(ParameterStore::from_toml_str("a = "), Err(ConfigError::Parse(_))));
	}

	#[test]
	fn live_updates() {
		let store = ParameterStore::new();
		assert!(!store.contains("x"));
		store.set("x", 1.5);
		assert_eq!(store.get("x"), Some(ParamValue::Double(1.5)));
		store.remove("x");
		assert_eq!(store.get("x"), None);
	}
}
