//! Restriction primitives: one predicate on one field, optionally negated.
//!
//! A [`Restriction`] is a tagged [`Predicate`] plus a `negated` flag. Negation
//! is an attribute, not a separate kind, so `r.not().not() == r` for every
//! restriction and every predicate has exactly one negated form.
//!
//! # Example
//! ```ignore
//! use rowquery::Restriction;
//!
//! Restriction::equals("active");
//! Restriction::equals("active").not();        // NotEquals
//! Restriction::between(18, 65)?;
//! Restriction::in_list(vec![1, 2, 3]);
//! Restriction::starts_with("Mc");
//! Restriction::is_null().not();               // IsNotNull
//! Restriction::length_between(1, 64)?;
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// The logical shape of a restriction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `field = value`
    Equals(Value),
    /// `field < value`
    Less(Value),
    /// `field <= value`
    LessOrEqual(Value),
    /// `field > value`
    Greater(Value),
    /// `field >= value`
    GreaterOrEqual(Value),
    /// `lower <= field <= upper`
    Between(Value, Value),
    /// `field IN (values...)`; an empty set matches nothing.
    In(Vec<Value>),
    /// `field LIKE pattern` with caller-supplied wildcards
    Like(String),
    /// substring match, wildcards in the needle are literal
    Contains(String),
    /// prefix match, wildcards in the prefix are literal
    StartsWith(String),
    /// suffix match, wildcards in the suffix are literal
    EndsWith(String),
    /// `field IS NULL`
    IsNull,
    /// `field IS TRUE`
    IsTrue,
    /// `field IS FALSE`
    IsFalse,
    /// NULL or the empty string
    Empty,
    /// character length `< n`
    LengthLess(i64),
    /// character length `<= n`
    LengthLessOrEqual(i64),
    /// character length `> n`
    LengthGreater(i64),
    /// character length `>= n`
    LengthGreaterOrEqual(i64),
    /// `lower <= character length <= upper`
    LengthBetween(i64, i64),
}

impl Predicate {
    /// Name of the predicate, and of its negated form.
    fn names(&self) -> (&'static str, &'static str) {
        match self {
            Predicate::Equals(_) => ("Equals", "NotEquals"),
            Predicate::Less(_) => ("Less", "NotLess"),
            Predicate::LessOrEqual(_) => ("LessOrEqual", "NotLessOrEqual"),
            Predicate::Greater(_) => ("Greater", "NotGreater"),
            Predicate::GreaterOrEqual(_) => ("GreaterOrEqual", "NotGreaterOrEqual"),
            Predicate::Between(..) => ("Between", "NotBetween"),
            Predicate::In(_) => ("In", "NotIn"),
            Predicate::Like(_) => ("Like", "NotLike"),
            Predicate::Contains(_) => ("Contains", "NotContains"),
            Predicate::StartsWith(_) => ("StartsWith", "NotStartsWith"),
            Predicate::EndsWith(_) => ("EndsWith", "NotEndsWith"),
            Predicate::IsNull => ("IsNull", "IsNotNull"),
            Predicate::IsTrue => ("IsTrue", "IsNotTrue"),
            Predicate::IsFalse => ("IsFalse", "IsNotFalse"),
            Predicate::Empty => ("Empty", "NotEmpty"),
            Predicate::LengthLess(_) => ("StringLengthLess", "NotStringLengthLess"),
            Predicate::LengthLessOrEqual(_) => ("StringLengthLessOrEqual", "NotStringLengthLessOrEqual"),
            Predicate::LengthGreater(_) => ("StringLengthGreater", "NotStringLengthGreater"),
            Predicate::LengthGreaterOrEqual(_) => {
                ("StringLengthGreaterOrEqual", "NotStringLengthGreaterOrEqual")
            }
            Predicate::LengthBetween(..) => ("StringLengthBetween", "NotStringLengthBetween"),
        }
    }

    /// Whether the predicate yields a definite answer for NULL.
    ///
    /// Total predicates negate without a NULL guard; the others compare a
    /// value and are unknown for NULL.
    pub fn is_total(&self) -> bool {
        matches!(
            self,
            Predicate::IsNull | Predicate::IsTrue | Predicate::IsFalse | Predicate::Empty
        )
    }
}

/// A single predicate applicable to one field, optionally negated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Restriction {
    predicate: Predicate,
    negated: bool,
}

fn require_not_null(value: &Value, what: &str) -> QueryResult<()> {
    if value.is_null() {
        return Err(QueryError::invalid_argument(format!(
            "{what} requires a non-null value (use is_null for NULL checks)"
        )));
    }
    Ok(())
}

impl Restriction {
    fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            negated: false,
        }
    }

    // ==================== Equality ====================

    /// `field = value`; equality with NULL is an `IsNull` check.
    pub fn equals(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => Self::new(Predicate::IsNull),
            v => Self::new(Predicate::Equals(v)),
        }
    }

    pub fn not_equals(value: impl Into<Value>) -> Self {
        Self::equals(value).not()
    }

    // ==================== Comparison ====================

    pub fn less(value: impl Into<Value>) -> QueryResult<Self> {
        let v = value.into();
        require_not_null(&v, "less")?;
        Ok(Self::new(Predicate::Less(v)))
    }

    pub fn less_or_equal(value: impl Into<Value>) -> QueryResult<Self> {
        let v = value.into();
        require_not_null(&v, "less_or_equal")?;
        Ok(Self::new(Predicate::LessOrEqual(v)))
    }

    pub fn greater(value: impl Into<Value>) -> QueryResult<Self> {
        let v = value.into();
        require_not_null(&v, "greater")?;
        Ok(Self::new(Predicate::Greater(v)))
    }

    pub fn greater_or_equal(value: impl Into<Value>) -> QueryResult<Self> {
        let v = value.into();
        require_not_null(&v, "greater_or_equal")?;
        Ok(Self::new(Predicate::GreaterOrEqual(v)))
    }

    // ==================== Range ====================

    /// `lower <= field <= upper`. Fails unless the bounds are of comparable
    /// kinds and `lower <= upper`.
    ///
    /// Text bounds are ordered by the column's collation, so their order is
    /// left to the database.
    pub fn between(lower: impl Into<Value>, upper: impl Into<Value>) -> QueryResult<Self> {
        let (lower, upper) = (lower.into(), upper.into());
        require_not_null(&lower, "between")?;
        require_not_null(&upper, "between")?;
        if let (Value::Text(_), Value::Text(_)) = (&lower, &upper) {
            return Ok(Self::new(Predicate::Between(lower, upper)));
        }
        match lower.collation_free_cmp(&upper) {
            Some(Ordering::Greater) => Err(QueryError::invalid_argument(format!(
                "between requires lower <= upper, got {lower:?} > {upper:?}"
            ))),
            Some(_) => Ok(Self::new(Predicate::Between(lower, upper))),
            None => Err(QueryError::invalid_argument(format!(
                "between bounds are not comparable: {} and {}",
                lower.type_name(),
                upper.type_name()
            ))),
        }
    }

    pub fn not_between(lower: impl Into<Value>, upper: impl Into<Value>) -> QueryResult<Self> {
        Ok(Self::between(lower, upper)?.not())
    }

    // ==================== Set membership ====================

    /// `field IN (values...)`. Duplicates are dropped keeping first-seen order.
    ///
    /// An empty set is legal: the restriction then predicts an empty result.
    pub fn in_list<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> QueryResult<Self> {
        let mut out: Vec<Value> = Vec::new();
        for v in values {
            let v = v.into();
            require_not_null(&v, "in_list")?;
            if !out.contains(&v) {
                out.push(v);
            }
        }
        Ok(Self::new(Predicate::In(out)))
    }

    pub fn not_in<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> QueryResult<Self> {
        Ok(Self::in_list(values)?.not())
    }

    // ==================== String shape ====================

    pub fn like(pattern: impl Into<String>) -> Self {
        Self::new(Predicate::Like(pattern.into()))
    }

    pub fn not_like(pattern: impl Into<String>) -> Self {
        Self::like(pattern).not()
    }

    pub fn contains(needle: impl Into<String>) -> Self {
        Self::new(Predicate::Contains(needle.into()))
    }

    pub fn not_contains(needle: impl Into<String>) -> Self {
        Self::contains(needle).not()
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Self::new(Predicate::StartsWith(prefix.into()))
    }

    pub fn not_starts_with(prefix: impl Into<String>) -> Self {
        Self::starts_with(prefix).not()
    }

    pub fn ends_with(suffix: impl Into<String>) -> Self {
        Self::new(Predicate::EndsWith(suffix.into()))
    }

    pub fn not_ends_with(suffix: impl Into<String>) -> Self {
        Self::ends_with(suffix).not()
    }

    // ==================== Null / boolean / empty ====================

    pub fn is_null() -> Self {
        Self::new(Predicate::IsNull)
    }

    pub fn is_not_null() -> Self {
        Self::is_null().not()
    }

    pub fn is_true() -> Self {
        Self::new(Predicate::IsTrue)
    }

    pub fn is_false() -> Self {
        Self::new(Predicate::IsFalse)
    }

    pub fn empty() -> Self {
        Self::new(Predicate::Empty)
    }

    pub fn not_empty() -> Self {
        Self::empty().not()
    }

    // ==================== Length ====================

    /// Character length `< n`; `n` must be strictly positive.
    pub fn length_less(n: i64) -> QueryResult<Self> {
        if n <= 0 {
            return Err(QueryError::invalid_argument(format!(
                "length_less requires a positive bound, got {n}"
            )));
        }
        Ok(Self::new(Predicate::LengthLess(n)))
    }

    /// Character length `<= n`; `n` must be non-negative.
    pub fn length_less_or_equal(n: i64) -> QueryResult<Self> {
        check_non_negative(n, "length_less_or_equal")?;
        Ok(Self::new(Predicate::LengthLessOrEqual(n)))
    }

    /// Character length `> n`; `n` must be non-negative.
    pub fn length_greater(n: i64) -> QueryResult<Self> {
        check_non_negative(n, "length_greater")?;
        Ok(Self::new(Predicate::LengthGreater(n)))
    }

    /// Character length `>= n`; `n` must be non-negative.
    pub fn length_greater_or_equal(n: i64) -> QueryResult<Self> {
        check_non_negative(n, "length_greater_or_equal")?;
        Ok(Self::new(Predicate::LengthGreaterOrEqual(n)))
    }

    /// `lower <= character length <= upper` with `0 <= lower <= upper`.
    pub fn length_between(lower: i64, upper: i64) -> QueryResult<Self> {
        check_non_negative(lower, "length_between")?;
        if lower > upper {
            return Err(QueryError::invalid_argument(format!(
                "length_between requires lower <= upper, got {lower} > {upper}"
            )));
        }
        Ok(Self::new(Predicate::LengthBetween(lower, upper)))
    }

    // ==================== Negation and accessors ====================

    /// Toggle negation. Applying it twice restores the original restriction.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Toggle negation in place.
    pub fn negate(&mut self) {
        self.negated = !self.negated;
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Name of this restriction's kind, e.g. `"NotEquals"`.
    pub fn kind_name(&self) -> &'static str {
        let (pos, neg) = self.predicate.names();
        if self.negated { neg } else { pos }
    }

    /// Returns `true` if no row can satisfy this restriction.
    ///
    /// Only a non-negated `In` with an empty set qualifies; `NotIn` over an
    /// empty set matches every row.
    pub fn predicts_empty_result(&self) -> bool {
        !self.negated && matches!(&self.predicate, Predicate::In(values) if values.is_empty())
    }

    /// Returns `true` if this restriction holds for every row and contributes
    /// nothing to a WHERE clause.
    pub fn is_vacuous(&self) -> bool {
        self.negated && matches!(&self.predicate, Predicate::In(values) if values.is_empty())
    }

    /// Evaluate the restriction against a single field value.
    ///
    /// Mirrors the compiled SQL: a positive value predicate never matches
    /// NULL, and the negated restriction matches exactly the values the
    /// positive one rejects.
    pub fn matches(&self, value: &Value) -> bool {
        match eval(&self.predicate, value) {
            Some(hit) => hit != self.negated,
            None => self.negated,
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_name())
    }
}

fn check_non_negative(n: i64, what: &str) -> QueryResult<()> {
    if n < 0 {
        return Err(QueryError::invalid_argument(format!(
            "{what} requires a non-negative bound, got {n}"
        )));
    }
    Ok(())
}

// Three-valued evaluation: `None` means unknown (NULL or incomparable).
fn eval(predicate: &Predicate, value: &Value) -> Option<bool> {
    match predicate {
        Predicate::IsNull => return Some(value.is_null()),
        Predicate::IsTrue => return Some(matches!(value, Value::Bool(true))),
        Predicate::IsFalse => return Some(matches!(value, Value::Bool(false))),
        Predicate::Empty => {
            return Some(match value {
                Value::Null => true,
                Value::Text(s) => s.is_empty(),
                _ => false,
            });
        }
        _ => {}
    }
    if value.is_null() {
        return None;
    }

    match predicate {
        Predicate::Equals(x) => value.strict_cmp(x).map(Ordering::is_eq).or(Some(value == x)),
        Predicate::Less(x) => value.strict_cmp(x).map(Ordering::is_lt),
        Predicate::LessOrEqual(x) => value.strict_cmp(x).map(Ordering::is_le),
        Predicate::Greater(x) => value.strict_cmp(x).map(Ordering::is_gt),
        Predicate::GreaterOrEqual(x) => value.strict_cmp(x).map(Ordering::is_ge),
        Predicate::Between(lo, hi) => {
            let above = value.strict_cmp(lo)?.is_ge();
            let below = value.strict_cmp(hi)?.is_le();
            Some(above && below)
        }
        Predicate::In(values) => Some(values.iter().any(|x| {
            value
                .strict_cmp(x)
                .map(Ordering::is_eq)
                .unwrap_or(value == x)
        })),
        Predicate::Like(pattern) => Some(like_match(value.as_str()?, pattern)),
        Predicate::Contains(needle) => Some(value.as_str()?.contains(needle.as_str())),
        Predicate::StartsWith(prefix) => Some(value.as_str()?.starts_with(prefix.as_str())),
        Predicate::EndsWith(suffix) => Some(value.as_str()?.ends_with(suffix.as_str())),
        Predicate::LengthLess(n) => Some(char_len(value)? < *n),
        Predicate::LengthLessOrEqual(n) => Some(char_len(value)? <= *n),
        Predicate::LengthGreater(n) => Some(char_len(value)? > *n),
        Predicate::LengthGreaterOrEqual(n) => Some(char_len(value)? >= *n),
        Predicate::LengthBetween(lo, hi) => {
            let len = char_len(value)?;
            Some(*lo <= len && len <= *hi)
        }
        Predicate::IsNull | Predicate::IsTrue | Predicate::IsFalse | Predicate::Empty => {
            unreachable!("total predicates are handled above")
        }
    }
}

fn char_len(value: &Value) -> Option<i64> {
    value.as_str().map(|s| s.chars().count() as i64)
}

/// SQL `LIKE` matching: `%` matches any run of characters, `_` exactly one.
fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || (p[pi] != '%' && p[pi] == t[ti])) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}
