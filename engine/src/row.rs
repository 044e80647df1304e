//! FILENAME: engine/src/row.rs
//! PURPOSE: Ordered row mappings and the table shapes exposed at the boundary.
//! CONTEXT: A `Row` is a column-id → value mapping that preserves entry order.
//! The table store keeps entries in schema position order, so rows serialize to
//! JSON objects whose key order matches the declared column order.

use std::collections::HashMap;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::{Grade, RawValue};

/// Reserved column id present in every full-table row: the empty string for
/// data rows and the statistic row's label for synthetic statistic rows.
/// Display layers use it to separate data rows from statistic rows.
pub const STAT_HDR: &str = "$stat";

/// An ordered mapping from column id to a value.
///
/// Lookup is linear, which is fine at grade-sheet widths; what matters here is
/// that iteration and serialization preserve entry order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row<V> {
    entries: Vec<(String, V)>,
}

impl<V> Row<V> {
    pub fn new() -> Self {
        Row {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(n: usize) -> Self {
        Row {
            entries: Vec::with_capacity(n),
        }
    }

    /// Builds a row from (column id, value) pairs, keeping the given order.
    /// Column ids are assumed unique.
    pub fn from_pairs(pairs: Vec<(String, V)>) -> Self {
        Row { entries: pairs }
    }

    pub fn get(&self, col_id: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(id, _)| id == col_id)
            .map(|(_, v)| v)
    }

    /// Replaces the value for `col_id` in place, or appends a new entry.
    pub fn set(&mut self, col_id: impl Into<String>, value: V) {
        let col_id = col_id.into();
        match self.entries.iter_mut().find(|(id, _)| *id == col_id) {
            Some((_, v)) => *v = value,
            None => self.entries.push((col_id, value)),
        }
    }

    /// Inserts an entry at `index`, shifting later entries right.
    pub fn insert_at(&mut self, index: usize, col_id: impl Into<String>, value: V) {
        self.entries.insert(index, (col_id.into(), value));
    }

    /// Removes the entry for `col_id`, keeping the order of the rest.
    pub fn remove(&mut self, col_id: &str) -> Option<V> {
        let at = self.entries.iter().position(|(id, _)| id == col_id)?;
        Some(self.entries.remove(at).1)
    }

    pub fn contains(&self, col_id: &str) -> bool {
        self.entries.iter().any(|(id, _)| id == col_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(id, v)| (id.as_str(), v))
    }

    pub fn col_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn into_pairs(self) -> Vec<(String, V)> {
        self.entries
    }

    /// Returns the row with entries reordered by `position` ascending.
    pub fn sorted_by_position(mut self, position: impl Fn(&str) -> usize) -> Self {
        self.entries.sort_by_key(|(id, _)| position(id));
        self
    }
}

impl<V> FromIterator<(String, V)> for Row<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Row {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<V> IntoIterator for Row<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: Serialize> Serialize for Row<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, v) in &self.entries {
            map.serialize_entry(id, v)?;
        }
        map.end()
    }
}

struct RowVisitor<V> {
    marker: std::marker::PhantomData<V>,
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for RowVisitor<V> {
    type Value = Row<V>;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a map from column id to cell value")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((id, v)) = access.next_entry::<String, V>()? {
            entries.push((id, v));
        }
        Ok(Row { entries })
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Row<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RowVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

/// A raw data row: column id → raw value, in schema position order.
pub type RawRow = Row<RawValue>;

/// A sequence of raw rows.
pub type RawTable = Vec<RawRow>;

/// A computed row: every cell is a value or an error marker.
pub type GradeRow = Row<Grade>;

/// The fully computed table: one row per data row followed by one synthetic
/// row per statistic-row descriptor.
pub type FullTable = Vec<GradeRow>;

/// Cell updates keyed by row id, then column id.
pub type Patches = HashMap<String, RawRow>;
