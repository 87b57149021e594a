//! Row type metadata and field resolution.
//!
//! Every row type exposes a static [`RowMeta`]: its table, columns, identifier
//! column, optional modification-timestamp column and declared references to
//! other row types. This metadata is the only source of identifiers in
//! compiled SQL.
//!
//! # Example
//!
//! ```rust
//! use rowquery::{Column, Reference, RowMeta, RowType};
//!
//! struct Order;
//!
//! const COLUMNS: &[Column] = &[
//!     Column::new("id"),
//!     Column::new("status"),
//!     Column::new("shipment_id").nullable(),
//! ];
//! const REFERENCES: &[Reference] = &[Reference::new("shipment_id", "shipments")];
//!
//! static ORDER: RowMeta = RowMeta::new("orders", COLUMNS).with_references(REFERENCES);
//!
//! impl RowType for Order {
//!     fn meta() -> &'static RowMeta {
//!         &ORDER
//!     }
//! }
//!
//! let status = Order::field("status").unwrap();
//! assert_eq!(status.column(), "status");
//! assert!(Order::field("nope").is_err());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{QueryError, QueryResult};
use crate::ident::check_plain_ident;

/// A column of a row type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Rust-side field name used by callers (defaults to the column name).
    pub field: &'static str,
    /// Database column name.
    pub name: &'static str,
    /// Whether the column admits NULL.
    pub nullable: bool,
}

impl Column {
    pub const fn new(name: &'static str) -> Self {
        Self {
            field: name,
            name,
            nullable: false,
        }
    }

    /// Map a Rust field name onto a differently named column.
    pub const fn mapped(field: &'static str, name: &'static str) -> Self {
        Self {
            field,
            name,
            nullable: false,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// A declared reference: `column` holds the identifier of a row in `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub column: &'static str,
    pub target: &'static str,
}

impl Reference {
    pub const fn new(column: &'static str, target: &'static str) -> Self {
        Self { column, target }
    }
}

/// Static metadata for one row type.
#[derive(Debug, Clone, Copy)]
pub struct RowMeta {
    pub table: &'static str,
    pub columns: &'static [Column],
    pub id: &'static str,
    pub modified_at: Option<&'static str>,
    pub references: &'static [Reference],
}

impl RowMeta {
    pub const fn new(table: &'static str, columns: &'static [Column]) -> Self {
        Self {
            table,
            columns,
            id: "id",
            modified_at: None,
            references: &[],
        }
    }

    pub const fn with_id(mut self, column: &'static str) -> Self {
        self.id = column;
        self
    }

    pub const fn with_modified_at(mut self, column: &'static str) -> Self {
        self.modified_at = Some(column);
        self
    }

    pub const fn with_references(mut self, references: &'static [Reference]) -> Self {
        self.references = references;
        self
    }

    /// Look up a column by its database name.
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Resolve a Rust field name or a column name to a column.
    pub fn resolve(&self, name: &str) -> QueryResult<&'static Column> {
        self.columns
            .iter()
            .find(|c| c.field == name)
            .or_else(|| self.column(name))
            .ok_or_else(|| QueryError::unknown_field(self.table, name))
    }

    /// The reference declared on `column`, if any.
    pub fn reference(&self, column: &str) -> Option<&'static Reference> {
        self.references.iter().find(|r| r.column == column)
    }

    /// Fails unless `column` is one of this row type's columns.
    pub fn check_column(&self, column: &str) -> QueryResult<()> {
        match self.column(column) {
            Some(_) => Ok(()),
            None => Err(QueryError::unknown_field(self.table, column)),
        }
    }

    /// Validate every identifier and cross-reference in this metadata.
    pub fn validate(&self) -> QueryResult<()> {
        check_plain_ident(self.table, "table name")?;
        if self.columns.is_empty() {
            return Err(QueryError::InvalidIdentifier(format!(
                "table '{}' declares no columns",
                self.table
            )));
        }
        for col in self.columns {
            check_plain_ident(col.name, "column name")?;
        }
        if self.column(self.id).is_none() {
            return Err(QueryError::InvalidIdentifier(format!(
                "id column '{}' is not a column of '{}'",
                self.id, self.table
            )));
        }
        if let Some(modified_at) = self.modified_at {
            if self.column(modified_at).is_none() {
                return Err(QueryError::InvalidIdentifier(format!(
                    "modified-at column '{modified_at}' is not a column of '{}'",
                    self.table
                )));
            }
        }
        for r in self.references {
            if self.column(r.column).is_none() {
                return Err(QueryError::InvalidIdentifier(format!(
                    "reference column '{}' is not a column of '{}'",
                    r.column, self.table
                )));
            }
            check_plain_ident(r.target, "referenced table")?;
        }
        Ok(())
    }
}

/// A row type with static metadata.
///
/// Usually derived with `#[derive(RowType)]`.
pub trait RowType: 'static {
    fn meta() -> &'static RowMeta;

    /// Resolve a field (or column) name to a typed field reference.
    fn field(name: &str) -> QueryResult<Field<Self>>
    where
        Self: Sized,
    {
        let col = Self::meta().resolve(name)?;
        Ok(Field::declared(col.name))
    }
}

/// A typed reference to one column of row type `R`.
pub struct Field<R> {
    column: &'static str,
    _row: PhantomData<fn() -> R>,
}

impl<R> Field<R> {
    /// Field constant for a declared column.
    ///
    /// Used by generated code; prefer [`RowType::field`] for names that come
    /// from outside the program.
    #[doc(hidden)]
    pub const fn declared(column: &'static str) -> Self {
        Self {
            column,
            _row: PhantomData,
        }
    }

    pub fn column(&self) -> &'static str {
        self.column
    }
}

impl<R: RowType> Field<R> {
    pub fn table(&self) -> &'static str {
        R::meta().table
    }
}

impl<R> Clone for Field<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Field<R> {}

impl<R> PartialEq for Field<R> {
    fn eq(&self, other: &Self) -> bool {
        self.column == other.column
    }
}

impl<R> Eq for Field<R> {}

impl<R> fmt::Debug for Field<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.column).finish()
    }
}

/// Registration record submitted by `#[derive(RowType)]`.
pub struct RowRegistration {
    /// Function returning the row type's metadata.
    pub meta_fn: fn() -> &'static RowMeta,
}

inventory::collect!(RowRegistration);

/// Registry of row metadata keyed by table name.
///
/// Used to resolve string-keyed field references (for example filter
/// parameters coming from request input) when the row type is only known by
/// its table name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: HashMap<&'static str, &'static RowMeta>,
}

impl Schema {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every row type registered through `#[derive(RowType)]`.
    pub fn registered() -> QueryResult<Self> {
        let mut schema = Self::new();
        for reg in inventory::iter::<RowRegistration> {
            schema.add_meta((reg.meta_fn)())?;
        }
        Ok(schema)
    }

    /// Register a row type.
    pub fn register<R: RowType>(&mut self) -> QueryResult<()> {
        self.add_meta(R::meta())
    }

    fn add_meta(&mut self, meta: &'static RowMeta) -> QueryResult<()> {
        meta.validate()?;
        if let Some(existing) = self.tables.get(meta.table) {
            if !std::ptr::eq(*existing, meta) {
                return Err(QueryError::InvalidIdentifier(format!(
                    "table '{}' is registered by two row types",
                    meta.table
                )));
            }
        }
        self.tables.insert(meta.table, meta);
        Ok(())
    }

    pub fn get(&self, table: &str) -> Option<&'static RowMeta> {
        self.tables.get(table).copied()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Resolve `table.field` to a column.
    pub fn resolve(&self, table: &str, field: &str) -> QueryResult<&'static Column> {
        let meta = self
            .get(table)
            .ok_or_else(|| QueryError::unknown_field(table, field))?;
        meta.resolve(field)
    }

    /// Check that every declared reference targets a registered table.
    pub fn check_references(&self) -> QueryResult<()> {
        for meta in self.tables.values() {
            for r in meta.references {
                if !self.has_table(r.target) {
                    return Err(QueryError::graph(format!(
                        "'{}.{}' references unregistered table '{}'",
                        meta.table, r.column, r.target
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
