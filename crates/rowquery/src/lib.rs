//! # rowquery
//!
//! Typed query restrictions and a deterministic SQL compiler.
//!
//! ## Features
//!
//! - **Composable restrictions**: equality, ranges, sets, string shapes, null
//!   and boolean checks, string length; every one negatable with `not()`
//! - **Parameter-safe SQL**: values only ever reach SQL as bound parameters;
//!   identifiers only come from row metadata
//! - **Join graphs**: INNER/LEFT joins and EXISTS/NOT EXISTS subqueries with
//!   join conditions derived from declared references
//! - **Paging**: paged selects with a COUNT companion over the same rows, and
//!   short-circuiting of queries that cannot match anything
//! - **Dialects**: PostgreSQL, MySQL, SQLite and ANSI placeholder, collation,
//!   NULLS placement and LIMIT/OFFSET forms
//!
//! ## Example
//!
//! ```ignore
//! use rowquery::{FromRecord, OrderBy, Pagination, Query, RowType, SqlBuilder};
//!
//! #[derive(RowType, FromRecord)]
//! #[row(table = "people")]
//! struct Person {
//!     #[row(id)]
//!     id: i64,
//!     last_name: Option<String>,
//!     age: Option<i32>,
//! }
//!
//! let builder = SqlBuilder::postgres();
//! let query = Query::<Person>::new().between(Person::AGE, 18, 65)?;
//! let data = builder.select(&query, &OrderBy::new().asc(Person::LAST_NAME), Pagination::page(1, 20)?)?;
//!
//! if let Some(page) = data.short_circuit::<Person>() {
//!     return Ok(page);
//! }
//! let stmt = data.render(builder.dialect())?;
//! let rows = client.query(stmt.sql(), &stmt.params_ref()).await?;
//! ```

pub mod builder;
pub mod config;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod ident;
pub mod join;
pub mod joined_row;
pub mod order;
pub mod pagination;
pub mod param;
pub mod query;
pub mod restriction;
pub mod schema;
pub mod sql;
pub mod value;

#[cfg(test)]
mod test_rows;

pub use builder::{CompileContext, FromAndWhere, QueryData, SqlBuilder};
pub use config::{BuilderConfig, SqlLogConfig};
pub use dialect::{Ansi, Dialect, DialectKind, MySql, PlaceholderStyle, Postgres, Sqlite};
pub use error::{QueryError, QueryResult};
pub use filter::{Filter, FilterOp};
pub use join::{JoinKind, JoinNode, JoinQuery, JoinQueryBuilder, Link, NodeId};
pub use joined_row::{FromRecord, JoinedRow, Record, column_label};
pub use order::{NullsOrder, OrderBy, OrderItem, SortDir};
pub use pagination::{Page, Pagination};
pub use param::{ParamIdxIncrementer, Params};
pub use query::Query;
pub use restriction::{Predicate, Restriction};
pub use schema::{Column, Field, Reference, RowMeta, RowRegistration, RowType, Schema};
pub use sql::{SqlText, Statement};
pub use value::{FromValue, Value};

// Used by the derive macros to submit row registrations.
pub use inventory;

#[cfg(feature = "derive")]
pub use rowquery_derive::{FromRecord, RowType};
