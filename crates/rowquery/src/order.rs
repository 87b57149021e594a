//! ORDER BY items and their compilation.
//!
//! Items are emitted in the order given, duplicates included. An empty
//! [`OrderBy`] produces no clause at all.
//!
//! ```ignore
//! use rowquery::{OrderBy, OrderItem};
//!
//! let order = OrderBy::new()
//!     .add(OrderItem::asc(Person::LAST_NAME).collate("und")?.nulls_last())
//!     .asc(Person::FIRST_NAME);
//! // ORDER BY last_name COLLATE "und" ASC NULLS LAST, first_name ASC
//! ```

use crate::dialect::Dialect;
use crate::error::{QueryError, QueryResult};
use crate::ident::{check_quoted_ident, write_column};
use crate::schema::{Field, RowMeta, RowType};
use crate::sql::SqlText;

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn to_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// NULLS placement for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn to_sql(self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }
}

/// A single ORDER BY element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderItem {
    table: &'static str,
    column: &'static str,
    dir: SortDir,
    collation: Option<String>,
    nulls: Option<NullsOrder>,
}

impl OrderItem {
    pub fn new<R: RowType>(field: Field<R>, dir: SortDir) -> Self {
        Self {
            table: field.table(),
            column: field.column(),
            dir,
            collation: None,
            nulls: None,
        }
    }

    pub fn asc<R: RowType>(field: Field<R>) -> Self {
        Self::new(field, SortDir::Asc)
    }

    pub fn desc<R: RowType>(field: Field<R>) -> Self {
        Self::new(field, SortDir::Desc)
    }

    /// Compare with the named collation. The name is written as a quoted
    /// identifier and may not be empty or contain NUL.
    pub fn collate(mut self, collation: impl Into<String>) -> QueryResult<Self> {
        let collation = collation.into();
        check_quoted_ident(&collation, "collation")?;
        self.collation = Some(collation);
        Ok(self)
    }

    pub fn nulls(mut self, order: NullsOrder) -> Self {
        self.nulls = Some(order);
        self
    }

    pub fn nulls_first(self) -> Self {
        self.nulls(NullsOrder::First)
    }

    pub fn nulls_last(self) -> Self {
        self.nulls(NullsOrder::Last)
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn column(&self) -> &'static str {
        self.column
    }

    pub fn dir(&self) -> SortDir {
        self.dir
    }

    pub fn collation(&self) -> Option<&str> {
        self.collation.as_deref()
    }

    pub fn nulls_order(&self) -> Option<NullsOrder> {
        self.nulls
    }

    fn append_to(&self, out: &mut SqlText, dialect: &dyn Dialect, alias: Option<&str>) {
        let mut col = String::new();
        write_column(&mut col, alias, self.column);
        out.push(&col);
        if let Some(collation) = &self.collation {
            dialect.append_collation(out, collation);
        }
        out.push(" ");
        out.push(self.dir.to_sql());
        if let Some(nulls) = self.nulls {
            dialect.append_nulls_handling(out, nulls);
        }
    }
}

/// Ordered list of ORDER BY elements (primary, secondary, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct OrderBy {
    items: Vec<OrderItem>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc<R: RowType>(self, field: Field<R>) -> Self {
        self.add(OrderItem::asc(field))
    }

    pub fn desc<R: RowType>(self, field: Field<R>) -> Self {
        self.add(OrderItem::desc(field))
    }

    /// Order by a field named at runtime (e.g. a request's `sort` parameter).
    pub fn by_name<R: RowType>(self, name: &str, dir: SortDir) -> QueryResult<Self> {
        let field = R::field(name)?;
        Ok(self.add(OrderItem::new(field, dir)))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, item: OrderItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Append the comma-separated elements without the `ORDER BY` keyword.
    ///
    /// `qualify` maps an item to the alias its column is written with; `None`
    /// leaves the column unqualified.
    pub(crate) fn append_elements(
        &self,
        out: &mut SqlText,
        dialect: &dyn Dialect,
        qualify: &dyn Fn(&OrderItem) -> QueryResult<Option<String>>,
    ) -> QueryResult<()> {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.push(", ");
            }
            let alias = qualify(item)?;
            item.append_to(out, dialect, alias.as_deref());
        }
        Ok(())
    }

    /// Append ` ORDER BY ...`, or nothing when empty.
    pub(crate) fn append_clause(
        &self,
        out: &mut SqlText,
        dialect: &dyn Dialect,
        qualify: &dyn Fn(&OrderItem) -> QueryResult<Option<String>>,
    ) -> QueryResult<()> {
        if self.items.is_empty() {
            return Ok(());
        }
        out.push(" ORDER BY ");
        self.append_elements(out, dialect, qualify)
    }

    /// The ORDER BY subclause for a single table, with unqualified columns.
    ///
    /// Returns an empty string for an empty OrderBy.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> QueryResult<String> {
        if self.items.is_empty() {
            return Ok(String::new());
        }
        let mut out = SqlText::new("ORDER BY ");
        self.append_elements(&mut out, dialect, &|_| Ok(None))?;
        Ok(out.to_named())
    }

    /// Check that every item orders by a column of `meta`.
    pub(crate) fn check_columns(&self, meta: &RowMeta) -> QueryResult<()> {
        for item in &self.items {
            if item.table != meta.table {
                return Err(QueryError::invalid_argument(format!(
                    "cannot order '{}' rows by '{}.{}'",
                    meta.table, item.table, item.column
                )));
            }
            meta.check_column(item.column)?;
        }
        Ok(())
    }
}
