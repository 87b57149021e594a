//! Result rows: per-row-type records and the joined-row view.

use std::any::TypeId;

use tokio_postgres::Row;

use crate::error::{QueryError, QueryResult};
use crate::join::{JoinQuery, NodeId};
use crate::schema::{RowMeta, RowType};
use crate::value::{FromValue, Value};

/// Column values of one row type, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        let mut record = Self::new();
        for (column, value) in pairs {
            record.insert(column, value);
        }
        record
    }

    pub fn insert(&mut self, column: &'static str, value: Value) {
        match self.values.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.values.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    /// Decode one column. A missing column decodes like NULL.
    pub fn decode<T: FromValue>(&self, column: &str) -> QueryResult<T> {
        let value = self.get(column).unwrap_or(&Value::Null);
        T::from_value(value).map_err(|message| QueryError::decode(column, message))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(c, v)| (*c, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Typed decoding of one row type out of a [`Record`].
///
/// Usually derived with `#[derive(FromRecord)]`.
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> QueryResult<Self>;
}

/// Result-set label of a selected column: `{alias}__{column}`.
pub fn column_label(alias: &str, column: &str) -> String {
    format!("{alias}__{column}")
}

#[derive(Debug, Clone)]
struct Slot {
    node: NodeId,
    type_id: TypeId,
    record: Option<Record>,
}

/// One fetched row of a joined select, split by row type.
///
/// A node whose identifier column is NULL (the outer side of a LEFT join
/// without a match) reads as `None`.
#[derive(Debug, Clone)]
pub struct JoinedRow {
    slots: Vec<Slot>,
}

impl JoinedRow {
    /// Split a driver row fetched with [`SqlBuilder::joined_select`](crate::SqlBuilder::joined_select).
    pub fn from_pg_row(query: &JoinQuery, row: &Row) -> QueryResult<Self> {
        Self::collect(query, |label| {
            let value: Value = row.try_get(label)?;
            Ok(value)
        })
    }

    /// Split a row given as `(label, value)` pairs, e.g. from another driver.
    ///
    /// Labels that are not part of the select list are ignored; a selected
    /// label that is missing reads as NULL.
    pub fn from_values(
        query: &JoinQuery,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> QueryResult<Self> {
        let values: Vec<(String, Value)> = values.into_iter().collect();
        Self::collect(query, |label| {
            Ok(values
                .iter()
                .find(|(l, _)| l == label)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null))
        })
    }

    fn collect(
        query: &JoinQuery,
        mut read: impl FnMut(&str) -> QueryResult<Value>,
    ) -> QueryResult<Self> {
        let mut slots = Vec::new();
        for node in query.selected_nodes() {
            let meta: &RowMeta = node.meta();
            let mut record = Record::new();
            for col in meta.columns {
                let value = read(&column_label(node.alias(), col.name))?;
                record.insert(col.name, value);
            }
            let absent = node.id() != NodeId::ROOT
                && record.get(meta.id).is_none_or(Value::is_null);
            slots.push(Slot {
                node: node.id(),
                type_id: node.type_id(),
                record: (!absent).then_some(record),
            });
        }
        Ok(Self { slots })
    }

    /// The record of row type `R`, or `None` if it was not joined or the outer
    /// join found no match.
    pub fn get<R: RowType>(&self) -> Option<&Record> {
        let wanted = TypeId::of::<R>();
        self.slots
            .iter()
            .find(|s| s.type_id == wanted)
            .and_then(|s| s.record.as_ref())
    }

    /// The record selected by the node `id`.
    pub fn get_node(&self, id: NodeId) -> Option<&Record> {
        self.slots
            .iter()
            .find(|s| s.node == id)
            .and_then(|s| s.record.as_ref())
    }

    /// Decode the record of row type `R`.
    pub fn get_as<R: RowType + FromRecord>(&self) -> QueryResult<Option<R>> {
        self.get::<R>().map(R::from_record).transpose()
    }
}
