//! Bound parameter naming and storage.

use crate::value::Value;

/// Per-compilation counter that hands out unique parameter names.
///
/// Names have the form `{column}_{n}` where `n` increases monotonically across
/// the whole statement, so the same column restricted on two joined tables
/// yields `name_1` and `name_2`. A fresh incrementer is created for every
/// compilation and never shared.
#[derive(Debug, Default)]
pub struct ParamIdxIncrementer {
    next: usize,
}

impl ParamIdxIncrementer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next parameter name for `base`.
    pub fn next_name(&mut self, base: &str) -> String {
        self.next += 1;
        format!("{base}_{}", self.next)
    }

    /// Number of names handed out so far.
    pub fn issued(&self) -> usize {
        self.next
    }
}

/// Insertion-ordered map from parameter name to bound value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name`. Names come from a [`ParamIdxIncrementer`] and
    /// are therefore unique; rebinding an existing name replaces its value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Append every entry of `other`.
    pub fn extend(&mut self, other: &Params) {
        for (name, value) in &other.entries {
            self.insert(name.clone(), value.clone());
        }
    }
}
