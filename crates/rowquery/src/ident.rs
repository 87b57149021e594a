//! SQL identifier validation and quoting.
//!
//! Table and column names only ever reach SQL text through row metadata, and
//! every name is checked here before it is written:
//!
//! - Plain identifiers must match `[A-Za-z_][A-Za-z0-9_]*`.
//! - Quoted identifiers (collations) allow any character except NUL; the quote
//!   character is escaped by doubling it.

use crate::error::{QueryError, QueryResult};

/// Returns `true` if `s` is a plain SQL identifier.
pub fn is_plain_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return false;
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Validate a plain identifier, naming what it is in the error.
pub fn check_plain_ident(s: &str, what: &str) -> QueryResult<()> {
    if s.is_empty() {
        return Err(QueryError::InvalidIdentifier(format!("{what} is empty")));
    }
    if !is_plain_ident(s) {
        return Err(QueryError::InvalidIdentifier(format!(
            "{what} '{s}' is not a valid identifier (expected [A-Za-z_][A-Za-z0-9_]*)"
        )));
    }
    Ok(())
}

/// Validate a name that will be written as a quoted identifier.
pub fn check_quoted_ident(s: &str, what: &str) -> QueryResult<()> {
    if s.is_empty() {
        return Err(QueryError::InvalidIdentifier(format!("{what} is empty")));
    }
    if s.contains('\0') {
        return Err(QueryError::InvalidIdentifier(format!(
            "{what} cannot contain NUL character"
        )));
    }
    Ok(())
}

/// Write `name` surrounded by `quote`, doubling any embedded quote character.
pub(crate) fn write_quoted(out: &mut String, name: &str, quote: char) {
    out.push(quote);
    for ch in name.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
}

/// Write `alias.column` (or just `column` when there is no alias).
pub(crate) fn write_column(out: &mut String, alias: Option<&str>, column: &str) {
    if let Some(alias) = alias {
        out.push_str(alias);
        out.push('.');
    }
    out.push_str(column);
}
