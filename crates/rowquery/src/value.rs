//! Scalar values carried by restrictions and bound as statement parameters.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::cmp::Ordering;
use std::error::Error;
use std::hash::{Hash, Hasher};
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::error::{QueryError, QueryResult};

type BoxError = Box<dyn Error + Sync + Send>;

/// A typed scalar value.
///
/// Equality and hashing are structural: floats compare by bit pattern and JSON
/// documents by their canonical text, so values can key hash maps and make
/// [`Restriction`](crate::Restriction) hashable.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Json(_) => "json",
        }
    }

    /// Strict comparator for orderable values of the same kind.
    ///
    /// Integers and floats compare numerically with each other. Returns `None`
    /// for NULL, JSON, and mismatched kinds.
    pub fn strict_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Like [`Value::strict_cmp`], but only for kinds whose database order does
    /// not depend on a collation.
    ///
    /// Text compares by collation in the database, so it yields `None` here.
    /// Anything that predicts or rejects SQL results goes through this.
    pub fn collation_free_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Text(_), _) | (_, Value::Text(_)) => None,
            _ => self.strict_cmp(other),
        }
    }

    /// Convert untyped request input into a value.
    ///
    /// Arrays and objects are kept as JSON; use [`Value::list_from_json`] for
    /// set payloads.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }

    /// Convert a JSON array into a list of values.
    pub fn list_from_json(json: serde_json::Value) -> QueryResult<Vec<Value>> {
        match json {
            serde_json::Value::Array(items) => Ok(items.into_iter().map(Value::from_json).collect()),
            other => Err(QueryError::invalid_argument(format!(
                "expected an array of values, got {other}"
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Text(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Json(v) => v.to_string().hash(state),
        }
    }
}

// ==================== Conversions into Value ====================

macro_rules! impl_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v $(as $cast)?)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    String => Text,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

// ==================== Conversions out of Value ====================

/// Decode a Rust value from a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

fn mismatch(expected: &str, got: &Value) -> String {
    format!("expected {expected}, got {}", got.type_name())
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(v) => Ok(*v),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(v) => Ok(*v),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let v = i64::from_value(value)?;
        i32::try_from(v).map_err(|_| format!("{v} does not fit in i32"))
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let v = i64::from_value(value)?;
        i16::try_from(v).map_err(|_| format!("{v} does not fit in i16"))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            other => Err(mismatch("text", other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Uuid(v) => Ok(*v),
            other => Err(mismatch("uuid", other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(v) => Ok(*v),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Date(v) => Ok(*v),
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            other => Err(mismatch("json", other)),
        }
    }
}

// ==================== tokio-postgres bindings ====================

fn is_text_type(ty: &Type) -> bool {
    *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::Int(v) => {
                if *ty == Type::INT2 {
                    i16::try_from(*v)?.to_sql_checked(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*v)?.to_sql_checked(ty, out)
                } else if *ty == Type::FLOAT8 {
                    (*v as f64).to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            Value::Text(v) => {
                // Request input arrives as text; coerce to the column's type.
                if *ty == Type::UUID {
                    Uuid::parse_str(v)?.to_sql_checked(ty, out)
                } else if *ty == Type::TIMESTAMPTZ {
                    DateTime::parse_from_rfc3339(v)?
                        .with_timezone(&Utc)
                        .to_sql_checked(ty, out)
                } else if *ty == Type::DATE {
                    NaiveDate::parse_from_str(v, "%Y-%m-%d")?.to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            Value::Uuid(v) => {
                if is_text_type(ty) {
                    v.to_string().to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            Value::Timestamp(v) => {
                if *ty == Type::TIMESTAMP {
                    v.naive_utc().to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            Value::Date(v) => v.to_sql_checked(ty, out),
            Value::Json(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        <bool as ToSql>::accepts(ty)
            || <i16 as ToSql>::accepts(ty)
            || <i32 as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <f32 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <Uuid as ToSql>::accepts(ty)
            || <DateTime<Utc> as ToSql>::accepts(ty)
            || <NaiveDateTime as ToSql>::accepts(ty)
            || <NaiveDate as ToSql>::accepts(ty)
            || <serde_json::Value as ToSql>::accepts(ty)
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        if *ty == Type::BOOL {
            Ok(Value::Bool(bool::from_sql(ty, raw)?))
        } else if *ty == Type::INT2 {
            Ok(Value::Int(i16::from_sql(ty, raw)?.into()))
        } else if *ty == Type::INT4 {
            Ok(Value::Int(i32::from_sql(ty, raw)?.into()))
        } else if *ty == Type::INT8 {
            Ok(Value::Int(i64::from_sql(ty, raw)?))
        } else if *ty == Type::FLOAT4 {
            Ok(Value::Float(f32::from_sql(ty, raw)?.into()))
        } else if *ty == Type::FLOAT8 {
            Ok(Value::Float(f64::from_sql(ty, raw)?))
        } else if is_text_type(ty) {
            Ok(Value::Text(String::from_sql(ty, raw)?))
        } else if *ty == Type::UUID {
            Ok(Value::Uuid(Uuid::from_sql(ty, raw)?))
        } else if *ty == Type::TIMESTAMPTZ {
            Ok(Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?))
        } else if *ty == Type::TIMESTAMP {
            Ok(Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?.and_utc()))
        } else if *ty == Type::DATE {
            Ok(Value::Date(NaiveDate::from_sql(ty, raw)?))
        } else if *ty == Type::JSON || *ty == Type::JSONB {
            Ok(Value::Json(serde_json::Value::from_sql(ty, raw)?))
        } else {
            Err(format!("unsupported column type {ty}").into())
        }
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::BOOL
            || *ty == Type::INT2
            || *ty == Type::INT4
            || *ty == Type::INT8
            || *ty == Type::FLOAT4
            || *ty == Type::FLOAT8
            || is_text_type(ty)
            || *ty == Type::UUID
            || *ty == Type::TIMESTAMPTZ
            || *ty == Type::TIMESTAMP
            || *ty == Type::DATE
            || *ty == Type::JSON
            || *ty == Type::JSONB
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn float_equality_is_structural() {
        assert_eq!(Value::Float(1.5), Value::Float(1.5));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(1.0), Value::Int(1));
    }

    #[test]
    fn values_are_hashable() {
        let mut set = HashSet::new();
        set.insert(Value::from("a"));
        set.insert(Value::from("a"));
        set.insert(Value::Json(serde_json::json!({"k": 1})));
        set.insert(Value::Json(serde_json::json!({"k": 1})));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn strict_cmp_orders_same_kind_only() {
        assert_eq!(Value::Int(1).strict_cmp(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(
            Value::Int(3).strict_cmp(&Value::Float(2.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::from("b").strict_cmp(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::Int(1).strict_cmp(&Value::from("1")), None);
        assert_eq!(Value::Null.strict_cmp(&Value::Null), None);
    }

    #[test]
    fn collation_free_cmp_leaves_text_unordered() {
        assert_eq!(Value::from("a").collation_free_cmp(&Value::from("B")), None);
        assert_eq!(
            Value::Int(2).collation_free_cmp(&Value::Float(2.0)),
            Some(Ordering::Equal)
        );
        let d = chrono::NaiveDate::from_ymd_opt(2024, 1, 2);
        let e = chrono::NaiveDate::from_ymd_opt(2024, 1, 1);
        assert_eq!(
            Value::from(d).collation_free_cmp(&Value::from(e)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(7_i32)), Value::Int(7));
    }

    #[test]
    fn from_json_maps_scalars() {
        assert_eq!(Value::from_json(serde_json::json!(null)), Value::Null);
        assert_eq!(Value::from_json(serde_json::json!(42)), Value::Int(42));
        assert_eq!(Value::from_json(serde_json::json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from_json(serde_json::json!("x")), Value::from("x"));
        assert!(matches!(
            Value::from_json(serde_json::json!({"a": 1})),
            Value::Json(_)
        ));
    }

    #[test]
    fn list_from_json_requires_array() {
        let values = Value::list_from_json(serde_json::json!([1, "a"])).unwrap();
        assert_eq!(values, vec![Value::Int(1), Value::from("a")]);
        assert!(Value::list_from_json(serde_json::json!(1)).is_err());
    }

    #[test]
    fn from_value_decodes_and_reports_mismatch() {
        assert_eq!(i32::from_value(&Value::Int(5)), Ok(5));
        assert_eq!(Option::<String>::from_value(&Value::Null), Ok(None));
        assert!(String::from_value(&Value::Int(1)).is_err());
        assert!(i16::from_value(&Value::Int(100_000)).is_err());
    }

    #[test]
    fn to_sql_narrows_integers() {
        let mut buf = BytesMut::new();
        Value::Int(7).to_sql_checked(&Type::INT4, &mut buf).unwrap();
        assert_eq!(buf.len(), 4);

        let mut buf = BytesMut::new();
        assert!(Value::Int(i64::MAX).to_sql_checked(&Type::INT2, &mut buf).is_err());
    }

    #[test]
    fn to_sql_rejects_kind_mismatch() {
        let mut buf = BytesMut::new();
        assert!(Value::Int(7).to_sql_checked(&Type::TEXT, &mut buf).is_err());
        let mut buf = BytesMut::new();
        assert!(matches!(
            Value::Null.to_sql_checked(&Type::TEXT, &mut buf),
            Ok(IsNull::Yes)
        ));
    }
}
