//! Structured SQL text.
//!
//! [`SqlText`] keeps raw SQL fragments and named parameter slots apart, so the
//! compiler never writes a bound value into SQL text. Rendering happens at the
//! very end:
//!
//! - [`SqlText::to_named`] writes `:name` placeholders (stable, readable form
//!   used by snapshots and logs);
//! - [`SqlText::render`] writes positional placeholders (`$1` or `?`) and
//!   returns the values in placeholder order, ready for a driver.

use std::fmt;

use tokio_postgres::types::ToSql;

use crate::dialect::PlaceholderStyle;
use crate::error::{QueryError, QueryResult};
use crate::param::Params;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SqlPart {
    Raw(String),
    Param(String),
}

/// SQL text with named parameter slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlText {
    parts: Vec<SqlPart>,
}

impl SqlText {
    pub fn new(initial: impl Into<String>) -> Self {
        let mut text = Self::default();
        text.push(&initial.into());
        text
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Append raw SQL.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a named parameter slot.
    pub fn push_param(&mut self, name: impl Into<String>) -> &mut Self {
        self.parts.push(SqlPart::Param(name.into()));
        self
    }

    /// Append another fragment.
    pub fn push_text(&mut self, other: &SqlText) -> &mut Self {
        for part in &other.parts {
            match part {
                SqlPart::Raw(s) => {
                    self.push(s);
                }
                SqlPart::Param(name) => {
                    self.push_param(name.clone());
                }
            }
        }
        self
    }

    /// Append `items` separated by `sep`.
    pub fn push_joined<'a>(
        &mut self,
        items: impl IntoIterator<Item = &'a SqlText>,
        sep: &str,
    ) -> &mut Self {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            self.push_text(item);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Names of the parameter slots, in order of appearance.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            SqlPart::Param(name) => Some(name.as_str()),
            SqlPart::Raw(_) => None,
        })
    }

    /// Render with `:name` placeholders.
    pub fn to_named(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param(name) => {
                    out.push(':');
                    out.push_str(name);
                }
            }
        }
        out
    }

    /// Render with positional placeholders, resolving each slot in `params`.
    ///
    /// With `$N` placeholders a parameter used twice keeps its first number;
    /// with `?` placeholders its value is repeated.
    pub fn render(&self, style: PlaceholderStyle, params: &Params) -> QueryResult<Statement> {
        let mut sql = String::new();
        let mut values: Vec<Value> = Vec::new();
        let mut numbered: Vec<&str> = Vec::new();

        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => sql.push_str(s),
                SqlPart::Param(name) => {
                    let value = params.get(name).ok_or_else(|| {
                        QueryError::invalid_argument(format!("parameter '{name}' is not bound"))
                    })?;
                    match style {
                        PlaceholderStyle::Dollar => {
                            let idx = match numbered.iter().position(|n| n == name) {
                                Some(i) => i + 1,
                                None => {
                                    numbered.push(name);
                                    values.push(value.clone());
                                    values.len()
                                }
                            };
                            sql.push('$');
                            sql.push_str(&idx.to_string());
                        }
                        PlaceholderStyle::Question => {
                            sql.push('?');
                            values.push(value.clone());
                        }
                    }
                }
            }
        }

        Ok(Statement { sql, values })
    }
}

impl fmt::Display for SqlText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_named())
    }
}

/// Driver-ready statement: SQL with positional placeholders and its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    values: Vec<Value>,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Parameter references in the form `tokio-postgres` expects.
    ///
    /// ```ignore
    /// let stmt = data.render(&Postgres)?;
    /// let rows = client.query(stmt.sql(), &stmt.params_ref()).await?;
    /// ```
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect()
    }
}
