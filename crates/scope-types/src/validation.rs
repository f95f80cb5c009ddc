//! Checks for the per-backend tables under `[storage.implementations.<name>]`.
//!
//! A backend describes the keys it understands as a [`Schema`]; the config
//! loader and the backend factory both run it before anything is opened.

use thiserror::Error;

/// Why a backend table was rejected. Field names are dotted paths.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: String,
	},
}

impl ValidationError {
	fn nested_under(self, parent: &str) -> Self {
		match self {
			Self::MissingField(f) => Self::MissingField(format!("{parent}.{f}")),
			Self::InvalidValue { field, message } => Self::InvalidValue {
				field: format!("{parent}.{field}"),
				message,
			},
			Self::TypeMismatch {
				field,
				expected,
				actual,
			} => Self::TypeMismatch {
				field: format!("{parent}.{field}"),
				expected,
				actual,
			},
		}
	}
}

/// Accepted shape of a single key.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	Table(Schema),
}

impl FieldType {
	fn check(&self, path: &str, value: &toml::Value) -> Result<(), ValidationError> {
		let mismatch = |expected| ValidationError::TypeMismatch {
			field: path.to_string(),
			expected,
			actual: value.type_str().to_string(),
		};
		match self {
			FieldType::String => value.as_str().map(|_| ()).ok_or_else(|| mismatch("string")),
			FieldType::Boolean => value.as_bool().map(|_| ()).ok_or_else(|| mismatch("boolean")),
			FieldType::Integer { min, max } => {
				let n = value.as_integer().ok_or_else(|| mismatch("integer"))?;
				let out_of_range = |message: String| ValidationError::InvalidValue {
					field: path.to_string(),
					message,
				};
				match (min, max) {
					(Some(lo), _) if n < *lo => Err(out_of_range(format!("{n} is below {lo}"))),
					(_, Some(hi)) if n > *hi => Err(out_of_range(format!("{n} is above {hi}"))),
					_ => Ok(()),
				}
			},
			FieldType::Table(schema) => schema.validate(value).map_err(|e| e.nested_under(path)),
		}
	}
}

type Rule = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named key plus an optional extra rule run after the type check.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	rule: Option<Rule>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Field({}: {:?})", self.name, self.field_type)
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			rule: None,
		}
	}

	pub fn with_validator<F>(mut self, rule: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.rule = Some(Box::new(rule));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		self.field_type.check(&self.name, value)?;
		match &self.rule {
			Some(rule) => rule(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			}),
			None => Ok(()),
		}
	}
}

/// Required and optional keys of one table. Unknown keys are ignored.
#[derive(Debug, Default)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config.as_table().ok_or_else(|| ValidationError::TypeMismatch {
			field: "root".to_string(),
			expected: "table",
			actual: config.type_str().to_string(),
		})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}
		self.optional
			.iter()
			.filter_map(|field| table.get(&field.name).map(|value| (field, value)))
			.try_for_each(|(field, value)| field.check(value))
	}
}

/// Implemented by each storage backend for its own table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
