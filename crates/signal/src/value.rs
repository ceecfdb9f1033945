//! Dynamically typed scalars carried by signals and composed methods.

use std::fmt;

/// A scalar value stored in a [`crate::Signal`] and passed to and from
/// composed methods.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
	/// No value (the result of a method that returns nothing).
	#[default]
	Unit,
	/// Boolean value.
	Bool(bool),
	/// Integer value.
	Int(i64),
	/// Floating point value.
	Float(f64),
	/// String value.
	Str(String),
}

impl Value {
	/// Returns the boolean value if this is a `Bool` variant.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the integer value if this is an `Int` variant.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the numeric value of an `Int` or `Float` variant.
	pub fn as_float(&self) -> Option<f64> {
		match self {
			Value::Float(v) => Some(*v),
			Value::Int(v) => Some(*v as f64),
			_ => None,
		}
	}

	/// Returns the string value if this is a `Str` variant.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(v) => Some(v),
			_ => None,
		}
	}

	pub fn is_unit(&self) -> bool {
		matches!(self, Value::Unit)
	}

	/// Truthiness used by bare signal references in conditions.
	///
	/// `Unit`, `false`, zero and the empty string are falsy.
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Unit => false,
			Value::Bool(v) => *v,
			Value::Int(v) => *v != 0,
			Value::Float(v) => *v != 0.0,
			Value::Str(v) => !v.is_empty(),
		}
	}

	/// Returns the type name of this value.
	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Unit => "unit",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::Str(_) => "string",
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Unit => write!(f, "()"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v}"),
			Value::Str(v) => write!(f, "{v:?}"),
		}
	}
}

impl From<()> for Value {
	fn from(_: ()) -> Self {
		Value::Unit
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v.into())
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Str(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Str(v)
	}
}
