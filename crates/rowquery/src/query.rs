//! Query: a conjunction of restrictions scoped to one row type.
//!
//! A [`Query`] maps fields to ordered lists of [`Restriction`]s; every
//! restriction of every field must hold. Field insertion order is kept so the
//! compiled SQL is reproducible, while equality ignores it.
//!
//! ```ignore
//! use rowquery::Query;
//!
//! let q = Query::<Person>::new()
//!     .eq(Person::STATUS, "active")
//!     .between(Person::AGE, 18, 65)?
//!     .starts_with(Person::LAST_NAME, "Mc")
//!     .not(); // NOT starts with "Mc"
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::error::QueryResult;
use crate::filter::Filter;
use crate::joined_row::Record;
use crate::restriction::{Predicate, Restriction};
use crate::schema::{Field, RowMeta, RowType};
use crate::value::Value;

/// Restrictions keyed by column, in insertion order, without a row type.
#[derive(Debug, Clone, Default)]
pub(crate) struct Conditions {
    fields: Vec<(&'static str, Vec<Restriction>)>,
    last: Option<(usize, usize)>,
}

impl Conditions {
    fn push(&mut self, column: &'static str, restriction: Restriction) {
        let idx = match self.fields.iter().position(|(c, _)| *c == column) {
            Some(idx) => idx,
            None => {
                self.fields.push((column, Vec::new()));
                self.fields.len() - 1
            }
        };
        self.fields[idx].1.push(restriction);
        self.last = Some((idx, self.fields[idx].1.len() - 1));
    }

    fn negate_last(&mut self) {
        if let Some((f, r)) = self.last {
            self.fields[f].1[r].negate();
        }
    }

    pub(crate) fn fields(&self) -> &[(&'static str, Vec<Restriction>)] {
        &self.fields
    }

    fn get(&self, column: &str) -> &[Restriction] {
        self.fields
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, rs)| rs.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fails if a restricted column is not declared by `meta`.
    pub(crate) fn check_columns(&self, meta: &RowMeta) -> QueryResult<()> {
        self.fields
            .iter()
            .try_for_each(|(column, _)| meta.check_column(column))
    }

    pub(crate) fn predicts_empty_result(&self) -> bool {
        self.fields.iter().any(|(_, rs)| {
            rs.iter().any(Restriction::predicts_empty_result) || contradictory_range(rs)
        })
    }

    pub(crate) fn matches(&self, record: &Record) -> bool {
        self.fields.iter().all(|(column, rs)| {
            let value = record.get(column).unwrap_or(&Value::Null);
            rs.iter().all(|r| r.matches(value))
        })
    }

    fn same_as(&self, other: &Conditions) -> bool {
        self.fields.len() == other.fields.len()
            && self.fields.iter().all(|(c, rs)| other.get(c) == rs.as_slice())
    }

    fn hash_unordered<H: Hasher>(&self, state: &mut H) {
        let mut sorted: Vec<&(&'static str, Vec<Restriction>)> = self.fields.iter().collect();
        sorted.sort_by_key(|(c, _)| *c);
        sorted.len().hash(state);
        for (c, rs) in sorted {
            c.hash(state);
            rs.hash(state);
        }
    }
}

#[derive(Clone, Copy)]
struct Bound<'a> {
    value: &'a Value,
    inclusive: bool,
}

fn incl(value: &Value) -> Bound<'_> {
    Bound {
        value,
        inclusive: true,
    }
}

fn excl(value: &Value) -> Bound<'_> {
    Bound {
        value,
        inclusive: false,
    }
}

// Tighter bound wins; `None` when the bounds cannot be compared.
fn tighten<'a>(
    current: Option<Bound<'a>>,
    new: Bound<'a>,
    want: Ordering,
) -> Option<Option<Bound<'a>>> {
    let Some(cur) = current else {
        return Some(Some(new));
    };
    match new.value.collation_free_cmp(cur.value)? {
        o if o == want => Some(Some(new)),
        Ordering::Equal => Some(Some(Bound {
            value: cur.value,
            inclusive: cur.inclusive && new.inclusive,
        })),
        _ => Some(Some(cur)),
    }
}

/// Whether the non-negated range restrictions on one field exclude every value.
fn contradictory_range(restrictions: &[Restriction]) -> bool {
    let mut lower: Option<Bound<'_>> = None;
    let mut upper: Option<Bound<'_>> = None;

    for r in restrictions.iter().filter(|r| !r.is_negated()) {
        let (lo, hi) = match r.predicate() {
            Predicate::Equals(v) => (Some(incl(v)), Some(incl(v))),
            Predicate::Greater(v) => (Some(excl(v)), None),
            Predicate::GreaterOrEqual(v) => (Some(incl(v)), None),
            Predicate::Less(v) => (None, Some(excl(v))),
            Predicate::LessOrEqual(v) => (None, Some(incl(v))),
            Predicate::Between(a, b) => (Some(incl(a)), Some(incl(b))),
            _ => continue,
        };
        if let Some(lo) = lo {
            match tighten(lower, lo, Ordering::Greater) {
                Some(b) => lower = b,
                None => return false,
            }
        }
        if let Some(hi) = hi {
            match tighten(upper, hi, Ordering::Less) {
                Some(b) => upper = b,
                None => return false,
            }
        }
    }

    match (lower, upper) {
        (Some(lo), Some(hi)) => match lo.value.collation_free_cmp(hi.value) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => !(lo.inclusive && hi.inclusive),
            _ => false,
        },
        _ => false,
    }
}

/// A conjunction of restrictions over the fields of row type `R`.
pub struct Query<R> {
    conditions: Conditions,
    _row: PhantomData<fn() -> R>,
}

impl<R: RowType> Query<R> {
    pub fn new() -> Self {
        Self {
            conditions: Conditions::default(),
            _row: PhantomData,
        }
    }

    pub fn meta(&self) -> &'static RowMeta {
        R::meta()
    }

    /// Add a restriction on `field`.
    pub fn restrict(mut self, field: Field<R>, restriction: Restriction) -> Self {
        self.conditions.push(field.column(), restriction);
        self
    }

    /// Add a restriction on a field named at runtime.
    ///
    /// The name is resolved through the row metadata first, so only declared
    /// columns can reach SQL.
    pub fn restrict_by_name(self, name: &str, restriction: Restriction) -> QueryResult<Self> {
        let field = R::field(name)?;
        Ok(self.restrict(field, restriction))
    }

    /// Negate the most recently added restriction. No-op on an empty query.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.conditions.negate_last();
        self
    }

    // ==================== Shorthands ====================

    pub fn eq(self, field: Field<R>, value: impl Into<Value>) -> Self {
        self.restrict(field, Restriction::equals(value))
    }

    pub fn ne(self, field: Field<R>, value: impl Into<Value>) -> Self {
        self.restrict(field, Restriction::not_equals(value))
    }

    pub fn lt(self, field: Field<R>, value: impl Into<Value>) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::less(value)?))
    }

    pub fn lte(self, field: Field<R>, value: impl Into<Value>) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::less_or_equal(value)?))
    }

    pub fn gt(self, field: Field<R>, value: impl Into<Value>) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::greater(value)?))
    }

    pub fn gte(self, field: Field<R>, value: impl Into<Value>) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::greater_or_equal(value)?))
    }

    pub fn between(
        self,
        field: Field<R>,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
    ) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::between(lower, upper)?))
    }

    pub fn in_list<T: Into<Value>>(
        self,
        field: Field<R>,
        values: impl IntoIterator<Item = T>,
    ) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::in_list(values)?))
    }

    pub fn not_in<T: Into<Value>>(
        self,
        field: Field<R>,
        values: impl IntoIterator<Item = T>,
    ) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::not_in(values)?))
    }

    pub fn like(self, field: Field<R>, pattern: impl Into<String>) -> Self {
        self.restrict(field, Restriction::like(pattern))
    }

    pub fn contains(self, field: Field<R>, needle: impl Into<String>) -> Self {
        self.restrict(field, Restriction::contains(needle))
    }

    pub fn starts_with(self, field: Field<R>, prefix: impl Into<String>) -> Self {
        self.restrict(field, Restriction::starts_with(prefix))
    }

    pub fn ends_with(self, field: Field<R>, suffix: impl Into<String>) -> Self {
        self.restrict(field, Restriction::ends_with(suffix))
    }

    pub fn is_null(self, field: Field<R>) -> Self {
        self.restrict(field, Restriction::is_null())
    }

    pub fn is_not_null(self, field: Field<R>) -> Self {
        self.restrict(field, Restriction::is_not_null())
    }

    pub fn is_true(self, field: Field<R>) -> Self {
        self.restrict(field, Restriction::is_true())
    }

    pub fn is_false(self, field: Field<R>) -> Self {
        self.restrict(field, Restriction::is_false())
    }

    pub fn empty(self, field: Field<R>) -> Self {
        self.restrict(field, Restriction::empty())
    }

    pub fn not_empty(self, field: Field<R>) -> Self {
        self.restrict(field, Restriction::not_empty())
    }

    pub fn length_less(self, field: Field<R>, n: i64) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::length_less(n)?))
    }

    pub fn length_less_or_equal(self, field: Field<R>, n: i64) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::length_less_or_equal(n)?))
    }

    pub fn length_greater(self, field: Field<R>, n: i64) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::length_greater(n)?))
    }

    pub fn length_greater_or_equal(self, field: Field<R>, n: i64) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::length_greater_or_equal(n)?))
    }

    pub fn length_between(self, field: Field<R>, lower: i64, upper: i64) -> QueryResult<Self> {
        Ok(self.restrict(field, Restriction::length_between(lower, upper)?))
    }

    // ==================== Dynamic filters ====================

    /// Apply one string-keyed filter from request input.
    pub fn apply_filter(self, filter: &Filter) -> QueryResult<Self> {
        let field = R::field(&filter.field)?;
        Ok(self.restrict(field, filter.to_restriction()?))
    }

    /// Apply string-keyed filters in order. The first bad filter aborts.
    pub fn apply_filters<'a>(
        self,
        filters: impl IntoIterator<Item = &'a Filter>,
    ) -> QueryResult<Self> {
        filters
            .into_iter()
            .try_fold(self, |q, filter| q.apply_filter(filter))
    }

    // ==================== Inspection ====================

    /// Restrictions on `field`, in insertion order.
    pub fn restrictions(&self, field: Field<R>) -> &[Restriction] {
        self.conditions.get(field.column())
    }

    /// `(column, restrictions)` pairs in field insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[Restriction])> {
        self.conditions
            .fields()
            .iter()
            .map(|(c, rs)| (*c, rs.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Number of restricted fields.
    pub fn len(&self) -> usize {
        self.conditions.fields().len()
    }

    /// Returns `true` if no row can satisfy this query: a restriction predicts
    /// an empty result, or the range restrictions on one field contradict each
    /// other (e.g. `age > 10 AND age < 5`).
    pub fn predicts_empty_result(&self) -> bool {
        self.conditions.predicts_empty_result()
    }

    /// Evaluate the query against a row held in memory.
    ///
    /// Missing columns read as NULL.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.matches(record)
    }

    pub(crate) fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    pub(crate) fn into_conditions(self) -> Conditions {
        self.conditions
    }
}

impl<R: RowType> Default for Query<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for Query<R> {
    fn clone(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            _row: PhantomData,
        }
    }
}

impl<R> PartialEq for Query<R> {
    fn eq(&self, other: &Self) -> bool {
        self.conditions.same_as(&other.conditions)
    }
}

impl<R> Eq for Query<R> {}

impl<R> Hash for Query<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.conditions.hash_unordered(state);
    }
}

impl<R: RowType> fmt::Debug for Query<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &R::meta().table)
            .field("fields", &self.conditions.fields())
            .finish()
    }
}
