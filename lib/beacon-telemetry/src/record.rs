use serde_json::{Map, Number, Value as JsonValue};
use snafu::Snafu;

/// An error from contributing a record to a JSON document.
#[derive(Debug, Snafu, Eq, PartialEq)]
#[snafu(context(suffix(false)))]
pub enum ContributeError {
    /// The record is empty and carries nothing to serialize.
    #[snafu(display("empty record cannot be serialized"))]
    EmptyRecord,

    /// The value cannot be represented in JSON.
    #[snafu(display("non-finite value for key '{}' cannot be represented in JSON", key))]
    NonFiniteFloat {
        /// Key of the offending record.
        key: String,
    },
}

/// The value of a data point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value<'a> {
    /// No value. Marks a record that failed construction and must not be serialized.
    Empty,

    /// A boolean value.
    Bool(bool),

    /// An integer value.
    Integer(i64),

    /// A floating point value.
    Float(f64),

    /// A text value, borrowed from the caller.
    Text(&'a str),
}

/// A single named telemetry or attribute data point.
///
/// The key and any text value are borrowed from the caller and never copied until the record is
/// contributed to a document. Records are built immediately before use and never mutated.
///
/// Construction is total: an invalid input (an empty key) collapses the record to the
/// [`Value::Empty`] state instead of failing. Callers must check [`is_empty`](Self::is_empty)
/// before serializing; empty records are skipped by aggregation and rejected by
/// [`contribute`](Self::contribute).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataPoint<'a> {
    key: &'a str,
    value: Value<'a>,
}

impl<'a> DataPoint<'a> {
    fn build(key: &'a str, value: Value<'a>) -> Self {
        if key.is_empty() {
            Self::empty()
        } else {
            Self { key, value }
        }
    }

    /// Creates an empty record.
    pub fn empty() -> Self {
        Self {
            key: "",
            value: Value::Empty,
        }
    }

    /// Creates a boolean record.
    pub fn bool(key: &'a str, value: bool) -> Self {
        Self::build(key, Value::Bool(value))
    }

    /// Creates an integer record.
    pub fn integer(key: &'a str, value: i64) -> Self {
        Self::build(key, Value::Integer(value))
    }

    /// Creates a floating point record.
    pub fn float(key: &'a str, value: f64) -> Self {
        Self::build(key, Value::Float(value))
    }

    /// Creates a text record.
    pub fn text(key: &'a str, value: &'a str) -> Self {
        Self::build(key, Value::Text(value))
    }

    /// Returns the key of this record.
    pub fn key(&self) -> &'a str {
        self.key
    }

    /// Returns the value of this record.
    pub fn value(&self) -> Value<'a> {
        self.value
    }

    /// Returns `true` if this record is empty.
    ///
    /// Empty records carry nothing to serialize and must never reach a document.
    pub fn is_empty(&self) -> bool {
        matches!(self.value, Value::Empty)
    }

    /// Contributes this record's key/value pair to the given document fields.
    ///
    /// # Errors
    ///
    /// Fails if the record is empty, or if the value has no JSON representation (a non-finite
    /// float). On failure the document is left untouched.
    pub fn contribute(&self, fields: &mut Map<String, JsonValue>) -> Result<(), ContributeError> {
        let value = match self.value {
            Value::Empty => return Err(ContributeError::EmptyRecord),
            Value::Bool(value) => JsonValue::Bool(value),
            Value::Integer(value) => JsonValue::Number(value.into()),
            Value::Float(value) => match Number::from_f64(value) {
                Some(number) => JsonValue::Number(number),
                None => {
                    return Err(ContributeError::NonFiniteFloat {
                        key: self.key.to_string(),
                    })
                }
            },
            Value::Text(value) => JsonValue::String(value.to_string()),
        };

        fields.insert(self.key.to_string(), value);
        Ok(())
    }
}

impl<'a> From<(&'a str, bool)> for DataPoint<'a> {
    fn from((key, value): (&'a str, bool)) -> Self {
        Self::bool(key, value)
    }
}

impl<'a> From<(&'a str, i64)> for DataPoint<'a> {
    fn from((key, value): (&'a str, i64)) -> Self {
        Self::integer(key, value)
    }
}

impl<'a> From<(&'a str, f64)> for DataPoint<'a> {
    fn from((key, value): (&'a str, f64)) -> Self {
        Self::float(key, value)
    }
}

impl<'a> From<(&'a str, &'a str)> for DataPoint<'a> {
    fn from((key, value): (&'a str, &'a str)) -> Self {
        Self::text(key, value)
    }
}
