//! Loosely typed column values and their conversions to record fields.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Core value types exchanged with the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

/// One database record at the result boundary: column name to value.
pub type Row = HashMap<String, Value>;

impl Value {
    /// Short name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Boolean(_) => "boolean",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A value could not be converted into the declared field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot convert {from} to {to}")]
pub struct ConversionError {
    pub from: &'static str,
    pub to: &'static str,
}

impl ConversionError {
    fn new<T: ColumnValue>(value: &Value) -> Self {
        Self {
            from: value.kind(),
            to: T::TYPE_NAME,
        }
    }
}

/// Types that can be stored in a mapped record field.
///
/// `to_value` returns `None` when the field is absent (an unset optional),
/// which keeps the column out of encoded rows.
pub trait ColumnValue: Sized {
    const TYPE_NAME: &'static str;

    fn to_value(&self) -> Option<Value>;

    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

macro_rules! integer_column {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ColumnValue for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn to_value(&self) -> Option<Value> {
                    Some(Value::Integer(i64::from(*self)))
                }

                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::Integer(i) => {
                            <$ty>::try_from(i).map_err(|_| ConversionError::new::<Self>(&value))
                        }
                        Value::Boolean(b) => Ok(<$ty>::from(b)),
                        other => Err(ConversionError::new::<Self>(&other)),
                    }
                }
            }
        )*
    };
}

integer_column!(i64, i32, i16, u32);

impl ColumnValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn to_value(&self) -> Option<Value> {
        Some(Value::Real(*self))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Real(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => Err(ConversionError::new::<Self>(&other)),
        }
    }
}

impl ColumnValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn to_value(&self) -> Option<Value> {
        Some(Value::Real(f64::from(*self)))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Real(f) => Ok(f as f32),
            Value::Integer(i) => Ok(i as f32),
            other => Err(ConversionError::new::<Self>(&other)),
        }
    }
}

impl ColumnValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn to_value(&self) -> Option<Value> {
        Some(Value::Boolean(*self))
    }

    // SQLite has no boolean storage class, flags come back as 0/1.
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Boolean(b) => Ok(b),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            other => Err(ConversionError::new::<Self>(&other)),
        }
    }
}

impl ColumnValue for String {
    const TYPE_NAME: &'static str = "String";

    fn to_value(&self) -> Option<Value> {
        Some(Value::Text(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(ConversionError::new::<Self>(&other)),
        }
    }
}

impl ColumnValue for Vec<u8> {
    const TYPE_NAME: &'static str = "Vec<u8>";

    fn to_value(&self) -> Option<Value> {
        Some(Value::Blob(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Blob(b) => Ok(b),
            other => Err(ConversionError::new::<Self>(&other)),
        }
    }
}

impl ColumnValue for Value {
    const TYPE_NAME: &'static str = "Value";

    fn to_value(&self) -> Option<Value> {
        Some(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn to_value(&self) -> Option<Value> {
        self.as_ref().and_then(ColumnValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_conversions() {
        assert_eq!(i64::from_value(Value::Integer(7)), Ok(7));
        assert_eq!(i32::from_value(Value::Boolean(true)), Ok(1));
        assert_eq!(f64::from_value(Value::Integer(2)), Ok(2.0));

        let err = i16::from_value(Value::Integer(i64::from(i16::MAX) + 1)).unwrap_err();
        assert_eq!(err, ConversionError { from: "integer", to: "i16" });

        let err = u32::from_value(Value::Integer(-1)).unwrap_err();
        assert_eq!(err.to, "u32");
    }

    #[test]
    fn test_null_only_fits_optionals() {
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert_eq!(
            Option::<String>::from_value(Value::Text("a".into())),
            Ok(Some("a".to_string()))
        );

        let err = String::from_value(Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert null to String");
    }

    #[test]
    fn test_bool_from_sqlite_integers() {
        assert_eq!(bool::from_value(Value::Integer(0)), Ok(false));
        assert_eq!(bool::from_value(Value::Integer(1)), Ok(true));
        assert!(bool::from_value(Value::Integer(2)).is_err());
        assert!(bool::from_value(Value::Text("true".into())).is_err());
    }

    #[test]
    fn test_absent_optional_has_no_value() {
        let email: Option<String> = None;
        assert_eq!(email.to_value(), None);
        assert_eq!(Some(3i64).to_value(), Some(Value::Integer(3)));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_value_serializes_with_serde() {
        let json = serde_json::to_string(&Value::Text("Ann".into())).unwrap();
        assert_eq!(json, r#"{"Text":"Ann"}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Text("Ann".into()));
    }
}
