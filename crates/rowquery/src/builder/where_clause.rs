//! Restriction → WHERE condition.
//!
//! This is the only place restriction payloads are written, and they are
//! always written as parameter slots.

use super::CompileContext;
use crate::ident::write_column;
use crate::restriction::{Predicate, Restriction};
use crate::sql::SqlText;
use crate::value::Value;

/// Escape character used for literal string-shape matches.
const LIKE_ESCAPE: char = '!';

/// Escape LIKE wildcards (and the escape character itself).
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == LIKE_ESCAPE || ch == '%' || ch == '_' {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

fn comparison(predicate: &Predicate, negated: bool) -> Option<(&'static str, &Value)> {
    let (pos, neg, value) = match predicate {
        Predicate::Equals(v) => ("=", "<>", v),
        Predicate::Less(v) => ("<", ">=", v),
        Predicate::LessOrEqual(v) => ("<=", ">", v),
        Predicate::Greater(v) => (">", "<=", v),
        Predicate::GreaterOrEqual(v) => (">=", "<", v),
        _ => return None,
    };
    Some((if negated { neg } else { pos }, value))
}

fn length_comparison(predicate: &Predicate, negated: bool) -> Option<(&'static str, i64)> {
    let (pos, neg, n) = match predicate {
        Predicate::LengthLess(n) => ("<", ">=", *n),
        Predicate::LengthLessOrEqual(n) => ("<=", ">", *n),
        Predicate::LengthGreater(n) => (">", "<=", *n),
        Predicate::LengthGreaterOrEqual(n) => (">=", "<", *n),
        _ => return None,
    };
    Some((if negated { neg } else { pos }, n))
}

impl CompileContext {
    /// Compile one restriction on `column` into a WHERE condition.
    ///
    /// Returns `None` when the restriction holds for every row (`NOT IN ()`).
    /// A negated value predicate on a nullable column also admits NULL, so a
    /// restriction and its negation partition the table.
    pub(crate) fn restriction(
        &mut self,
        alias: Option<&str>,
        column: &str,
        nullable: bool,
        restriction: &Restriction,
    ) -> Option<SqlText> {
        if restriction.is_vacuous() {
            return None;
        }
        if restriction.predicts_empty_result() {
            return Some(SqlText::new("1=0"));
        }

        let mut col = String::new();
        write_column(&mut col, alias, column);
        let negated = restriction.is_negated();
        let predicate = restriction.predicate();
        let not = if negated { "NOT " } else { "" };

        let mut out = SqlText::empty();
        if let Some((op, value)) = comparison(predicate, negated) {
            let name = self.bind(column, value.clone());
            out.push(&col).push(" ").push(op).push(" ").push_param(name);
        } else if let Some((op, n)) = length_comparison(predicate, negated) {
            let name = self.bind(column, Value::Int(n));
            let func = self.dialect().length_function();
            out.push(&format!("{func}({col}) {op} ")).push_param(name);
        } else {
            match predicate {
                Predicate::Between(lo, hi) => {
                    let lo = self.bind(column, lo.clone());
                    let hi = self.bind(column, hi.clone());
                    out.push(&format!("{col} {not}BETWEEN "))
                        .push_param(lo)
                        .push(" AND ")
                        .push_param(hi);
                }
                Predicate::LengthBetween(lo, hi) => {
                    let lo = self.bind(column, Value::Int(*lo));
                    let hi = self.bind(column, Value::Int(*hi));
                    let func = self.dialect().length_function();
                    out.push(&format!("{func}({col}) {not}BETWEEN "))
                        .push_param(lo)
                        .push(" AND ")
                        .push_param(hi);
                }
                Predicate::In(values) => {
                    out.push(&format!("{col} {not}IN ("));
                    for (i, v) in values.iter().enumerate() {
                        if i > 0 {
                            out.push(", ");
                        }
                        let name = self.bind(column, v.clone());
                        out.push_param(name);
                    }
                    out.push(")");
                }
                Predicate::Like(pattern) => {
                    let name = self.bind(column, Value::Text(pattern.clone()));
                    out.push(&format!("{col} {not}LIKE ")).push_param(name);
                }
                Predicate::Contains(s) | Predicate::StartsWith(s) | Predicate::EndsWith(s) => {
                    let escaped = escape_like(s);
                    let pattern = match predicate {
                        Predicate::Contains(_) => format!("%{escaped}%"),
                        Predicate::StartsWith(_) => format!("{escaped}%"),
                        _ => format!("%{escaped}"),
                    };
                    let name = self.bind(column, Value::Text(pattern));
                    out.push(&format!("{col} {not}LIKE "))
                        .push_param(name)
                        .push(&format!(" ESCAPE '{LIKE_ESCAPE}'"));
                }
                Predicate::IsNull => {
                    out.push(&format!("{col} IS {not}NULL"));
                }
                Predicate::IsTrue => {
                    out.push(&format!("{col} IS {not}TRUE"));
                }
                Predicate::IsFalse => {
                    out.push(&format!("{col} IS {not}FALSE"));
                }
                Predicate::Empty => {
                    if negated {
                        out.push(&format!("({col} IS NOT NULL AND {col} <> '')"));
                    } else {
                        out.push(&format!("({col} IS NULL OR {col} = '')"));
                    }
                }
                _ => unreachable!("comparisons are handled above"),
            }
        }

        if negated && nullable && !predicate.is_total() {
            let mut guarded = SqlText::new(format!("({col} IS NULL OR "));
            guarded.push_text(&out).push(")");
            return Some(guarded);
        }
        Some(out)
    }
}
