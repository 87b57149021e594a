//! String-keyed filters from request input.
//!
//! A [`Filter`] names a field and an operation with an untyped JSON payload.
//! It only becomes a [`Restriction`] after the field has been resolved against
//! row metadata ([`Query::apply_filter`](crate::Query::apply_filter)), so a
//! request can never name a column the row type does not declare.
//!
//! ```ignore
//! let filters: Vec<Filter> = serde_json::from_str(r#"[
//!     {"field": "age", "op": "between", "value": [18, 65]},
//!     {"field": "status", "op": "in", "value": ["active", "invited"]},
//!     {"field": "lastName", "op": "starts_with", "value": "Mc", "not": true}
//! ]"#)?;
//! let query = Query::<Person>::new().apply_filters(&filters)?;
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::restriction::Restriction;
use crate::value::Value;

/// Filter operation names as they appear in request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Between,
    In,
    NotIn,
    Like,
    Contains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    IsTrue,
    IsFalse,
    Empty,
    NotEmpty,
    LengthLt,
    LengthLte,
    LengthGt,
    LengthGte,
    LengthBetween,
}

/// One string-keyed filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: serde_json::Value,
    /// Negate the resulting restriction.
    #[serde(default)]
    pub not: bool,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
            not: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.not = !self.not;
        self
    }

    /// Build the restriction this filter describes.
    pub fn to_restriction(&self) -> QueryResult<Restriction> {
        let r = match self.op {
            FilterOp::Eq => Restriction::equals(self.scalar()),
            FilterOp::Ne => Restriction::not_equals(self.scalar()),
            FilterOp::Lt => Restriction::less(self.scalar())?,
            FilterOp::Lte => Restriction::less_or_equal(self.scalar())?,
            FilterOp::Gt => Restriction::greater(self.scalar())?,
            FilterOp::Gte => Restriction::greater_or_equal(self.scalar())?,
            FilterOp::Between => {
                let (lo, hi) = self.pair()?;
                Restriction::between(lo, hi)?
            }
            FilterOp::In => Restriction::in_list(self.list()?)?,
            FilterOp::NotIn => Restriction::not_in(self.list()?)?,
            FilterOp::Like => Restriction::like(self.text()?),
            FilterOp::Contains => Restriction::contains(self.text()?),
            FilterOp::StartsWith => Restriction::starts_with(self.text()?),
            FilterOp::EndsWith => Restriction::ends_with(self.text()?),
            FilterOp::IsNull => Restriction::is_null(),
            FilterOp::IsNotNull => Restriction::is_not_null(),
            FilterOp::IsTrue => Restriction::is_true(),
            FilterOp::IsFalse => Restriction::is_false(),
            FilterOp::Empty => Restriction::empty(),
            FilterOp::NotEmpty => Restriction::not_empty(),
            FilterOp::LengthLt => Restriction::length_less(self.int(&self.value)?)?,
            FilterOp::LengthLte => Restriction::length_less_or_equal(self.int(&self.value)?)?,
            FilterOp::LengthGt => Restriction::length_greater(self.int(&self.value)?)?,
            FilterOp::LengthGte => Restriction::length_greater_or_equal(self.int(&self.value)?)?,
            FilterOp::LengthBetween => {
                let items = self.array(2)?;
                Restriction::length_between(self.int(&items[0])?, self.int(&items[1])?)?
            }
        };
        Ok(if self.not { r.not() } else { r })
    }

    fn scalar(&self) -> Value {
        Value::from_json(self.value.clone())
    }

    fn text(&self) -> QueryResult<String> {
        match &self.value {
            serde_json::Value::String(s) => Ok(s.clone()),
            other => Err(self.bad_payload(format!("expected a string, got {other}"))),
        }
    }

    fn list(&self) -> QueryResult<Vec<Value>> {
        Value::list_from_json(self.value.clone())
            .map_err(|e| self.bad_payload(e.to_string()))
    }

    fn array(&self, len: usize) -> QueryResult<&[serde_json::Value]> {
        match &self.value {
            serde_json::Value::Array(items) if items.len() == len => Ok(items),
            other => Err(self.bad_payload(format!("expected an array of {len} values, got {other}"))),
        }
    }

    fn pair(&self) -> QueryResult<(Value, Value)> {
        let items = self.array(2)?;
        Ok((
            Value::from_json(items[0].clone()),
            Value::from_json(items[1].clone()),
        ))
    }

    fn int(&self, json: &serde_json::Value) -> QueryResult<i64> {
        json.as_i64()
            .ok_or_else(|| self.bad_payload(format!("expected an integer, got {json}")))
    }

    fn bad_payload(&self, message: String) -> QueryError {
        QueryError::invalid_argument(format!(
            "filter '{}' ({:?}): {message}",
            self.field, self.op
        ))
    }
}
