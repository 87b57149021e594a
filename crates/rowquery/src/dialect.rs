//! Per-database variation points.
//!
//! The compiler only varies by dialect in a handful of places: collation
//! quoting, NULLS placement, the LIMIT/OFFSET window, the placeholder style, the
//! string-length function, and classifying "table does not exist" errors.

use std::error::Error;
use std::fmt;

use tracing::warn;

use crate::ident::write_quoted;
use crate::order::NullsOrder;
use crate::sql::SqlText;

/// Positional placeholder style used when rendering a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...`
    Dollar,
    /// `?`
    Question,
}

/// Supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DialectKind {
    #[default]
    Postgres,
    MySql,
    Sqlite,
    Ansi,
}

impl DialectKind {
    pub fn dialect(self) -> &'static dyn Dialect {
        match self {
            DialectKind::Postgres => &Postgres,
            DialectKind::MySql => &MySql,
            DialectKind::Sqlite => &Sqlite,
            DialectKind::Ansi => &Ansi,
        }
    }
}

/// Dialect-specific SQL fragments.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn kind(&self) -> DialectKind;

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    /// Append ` COLLATE <quoted name>`.
    fn append_collation(&self, out: &mut SqlText, collation: &str) {
        let mut s = String::from(" COLLATE ");
        write_quoted(&mut s, collation, '"');
        out.push(&s);
    }

    /// Append ` NULLS FIRST` / ` NULLS LAST`.
    fn append_nulls_handling(&self, out: &mut SqlText, nulls: NullsOrder) {
        out.push(" ");
        out.push(nulls.to_sql());
    }

    /// Append the paging window using the given parameter names.
    fn append_limit_offset(&self, out: &mut SqlText, limit: Option<&str>, offset: Option<&str>) {
        if let Some(limit) = limit {
            out.push(" LIMIT ").push_param(limit);
        }
        if let Some(offset) = offset {
            out.push(" OFFSET ").push_param(offset);
        }
    }

    /// Function returning a string's length in characters.
    fn length_function(&self) -> &'static str {
        "CHAR_LENGTH"
    }

    /// Whether `err` (or anything in its source chain) reports a missing table.
    fn is_table_missing(&self, err: &(dyn Error + 'static)) -> bool;
}

fn source_chain<'a>(err: &'a (dyn Error + 'static)) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }

    fn is_table_missing(&self, err: &(dyn Error + 'static)) -> bool {
        source_chain(err).any(|e| {
            if let Some(pg) = e.downcast_ref::<tokio_postgres::Error>() {
                return pg
                    .as_db_error()
                    .is_some_and(|db| db.code().code() == "42P01");
            }
            let msg = e.to_string();
            msg.contains("42P01") || (msg.contains("relation") && msg.contains("does not exist"))
        })
    }
}

/// MySQL / MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn append_collation(&self, out: &mut SqlText, collation: &str) {
        let mut s = String::from(" COLLATE ");
        write_quoted(&mut s, collation, '`');
        out.push(&s);
    }

    fn append_nulls_handling(&self, _out: &mut SqlText, nulls: NullsOrder) {
        warn!(
            nulls = nulls.to_sql(),
            "MySQL has no NULLS FIRST/LAST; using the database default placement"
        );
    }

    fn append_limit_offset(&self, out: &mut SqlText, limit: Option<&str>, offset: Option<&str>) {
        match (limit, offset) {
            (Some(limit), _) => {
                out.push(" LIMIT ").push_param(limit);
            }
            // OFFSET requires LIMIT in MySQL.
            (None, Some(_)) => {
                out.push(" LIMIT 18446744073709551615");
            }
            (None, None) => {}
        }
        if let Some(offset) = offset {
            out.push(" OFFSET ").push_param(offset);
        }
    }

    fn is_table_missing(&self, err: &(dyn Error + 'static)) -> bool {
        // Error 1146 (SQLSTATE 42S02), as the client libraries format it:
        // `ERROR 1146 (42S02): ...`, `1146 (42S02): ...`, `ERROR 42S02 (1146): ...`.
        source_chain(err).any(|e| {
            let msg = e.to_string();
            msg.contains("ERROR 1146")
                || msg.contains("1146 (")
                || msg.contains("(1146)")
                || (msg.contains("Table '") && msg.contains("' doesn't exist"))
        })
    }
}

/// SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn append_limit_offset(&self, out: &mut SqlText, limit: Option<&str>, offset: Option<&str>) {
        match (limit, offset) {
            (Some(limit), _) => {
                out.push(" LIMIT ").push_param(limit);
            }
            (None, Some(_)) => {
                out.push(" LIMIT -1");
            }
            (None, None) => {}
        }
        if let Some(offset) = offset {
            out.push(" OFFSET ").push_param(offset);
        }
    }

    fn length_function(&self) -> &'static str {
        "LENGTH"
    }

    fn is_table_missing(&self, err: &(dyn Error + 'static)) -> bool {
        source_chain(err).any(|e| e.to_string().contains("no such table"))
    }
}

/// Standard SQL (`OFFSET ... ROWS FETCH NEXT ... ROWS ONLY`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Ansi;

impl Dialect for Ansi {
    fn kind(&self) -> DialectKind {
        DialectKind::Ansi
    }

    fn append_limit_offset(&self, out: &mut SqlText, limit: Option<&str>, offset: Option<&str>) {
        if let Some(offset) = offset {
            out.push(" OFFSET ").push_param(offset).push(" ROWS");
        }
        if let Some(limit) = limit {
            let keyword = if offset.is_some() { "NEXT" } else { "FIRST" };
            out.push(" FETCH ")
                .push(keyword)
                .push(" ")
                .push_param(limit)
                .push(" ROWS ONLY");
        }
    }

    fn is_table_missing(&self, err: &(dyn Error + 'static)) -> bool {
        source_chain(err).any(|e| {
            let msg = e.to_string().to_ascii_lowercase();
            msg.contains("42s02") || msg.contains("table") && msg.contains("not found")
        })
    }
}
