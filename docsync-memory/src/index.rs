//! Equality indexes over configured fields.
//!
//! For each indexed field the manager keeps a map from value to the set of document
//! identifiers currently holding that value. Values are bucketed by [`IndexKey`], which
//! applies the same numeric normalization as the evaluator, so `1` and `1.0` share a
//! bucket. A document lacking the field is in no bucket. Empty buckets are dropped.

use std::collections::{HashMap, HashSet};

use bson::Bson;

use docsync_core::record::Record;

use crate::{evaluator::Number, store::DocumentMap};

/// Hashable, normalized form of a BSON value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum IndexKey {
    Null,
    Bool(bool),
    /// Integers, and doubles with an integral value in `i64` range.
    Int(i64),
    /// Bit pattern of any other double, with NaN canonicalized.
    Float(u64),
    DateTime(i64),
    String(String),
    Array(Vec<IndexKey>),
    /// Entries sorted by key so field order does not matter.
    Map(Vec<(String, IndexKey)>),
    /// Extended JSON rendering of any other type.
    Other(String),
}

impl From<&Bson> for IndexKey {
    fn from(value: &Bson) -> Self {
        match value {
            Bson::Null => IndexKey::Null,
            Bson::Boolean(value) => IndexKey::Bool(*value),
            Bson::Int32(value) => number_key(Number::Int(i64::from(*value))),
            Bson::Int64(value) => number_key(Number::Int(*value)),
            Bson::Double(value) => number_key(Number::Float(*value)),
            Bson::DateTime(value) => IndexKey::DateTime(value.timestamp_millis()),
            Bson::String(value) => IndexKey::String(value.clone()),
            Bson::Array(items) => IndexKey::Array(items.iter().map(IndexKey::from).collect()),
            Bson::Document(doc) => {
                let mut entries = doc
                    .iter()
                    .map(|(key, value)| (key.clone(), IndexKey::from(value)))
                    .collect::<Vec<_>>();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                IndexKey::Map(entries)
            }
            other => IndexKey::Other(other.clone().into_relaxed_extjson().to_string()),
        }
    }
}

fn number_key(number: Number) -> IndexKey {
    match number.normalized() {
        Number::Int(value) => IndexKey::Int(value),
        Number::Float(value) if value.is_nan() => IndexKey::Float(f64::NAN.to_bits()),
        Number::Float(value) => IndexKey::Float(value.to_bits()),
    }
}

type Buckets = HashMap<IndexKey, HashSet<String>>;

/// Equality indexes for a fixed set of fields.
#[derive(Debug, Default)]
pub struct IndexManager {
    indexes: HashMap<String, Buckets>,
}

impl IndexManager {
    /// Creates indexes for the given fields.
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            indexes: fields
                .into_iter()
                .map(|field| (field.into(), Buckets::new()))
                .collect(),
        }
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexes.contains_key(field)
    }

    /// Returns the indexed field names, sorted.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = self.indexes.keys().cloned().collect::<Vec<_>>();
        fields.sort();
        fields
    }

    /// Files a record under its value for every indexed field.
    pub fn add(&mut self, record: &Record) {
        for (field, buckets) in self.indexes.iter_mut() {
            if let Some(value) = record.get(field) {
                buckets
                    .entry(IndexKey::from(value.as_ref()))
                    .or_default()
                    .insert(record.id().to_string());
            }
        }
    }

    /// Takes a record out of every bucket it is filed under.
    pub fn remove(&mut self, record: &Record) {
        for (field, buckets) in self.indexes.iter_mut() {
            if let Some(value) = record.get(field) {
                remove_from(buckets, &IndexKey::from(value.as_ref()), record.id());
            }
        }
    }

    /// Moves a record between buckets for the fields whose value changed.
    pub fn update(&mut self, before: &Record, after: &Record) {
        for (field, buckets) in self.indexes.iter_mut() {
            let old_key = before.get(field).map(|value| IndexKey::from(value.as_ref()));
            let new_key = after.get(field).map(|value| IndexKey::from(value.as_ref()));

            if old_key == new_key {
                continue;
            }

            if let Some(key) = old_key {
                remove_from(buckets, &key, before.id());
            }
            if let Some(key) = new_key {
                buckets.entry(key).or_default().insert(after.id().to_string());
            }
        }
    }

    /// Drops every bucket and files every stored record again.
    pub fn rebuild(&mut self, documents: &DocumentMap) {
        self.clear();
        for record in documents.iter() {
            self.add(record);
        }
    }

    /// Drops every bucket, keeping the set of indexed fields.
    pub fn clear(&mut self) {
        for buckets in self.indexes.values_mut() {
            buckets.clear();
        }
    }

    /// Returns the identifiers holding `value` in `field`.
    ///
    /// `None` means the field is not indexed; an empty set means no document holds the
    /// value.
    pub fn lookup(&self, field: &str, value: &Bson) -> Option<HashSet<&str>> {
        let buckets = self.indexes.get(field)?;

        Some(
            buckets
                .get(&IndexKey::from(value))
                .map(|ids| ids.iter().map(String::as_str).collect())
                .unwrap_or_default(),
        )
    }

    /// Returns the identifiers holding any of `values` in `field`.
    pub fn lookup_any<'v>(&self, field: &str, values: impl IntoIterator<Item = &'v Bson>) -> Option<HashSet<&str>> {
        let buckets = self.indexes.get(field)?;

        Some(
            values
                .into_iter()
                .filter_map(|value| buckets.get(&IndexKey::from(value)))
                .flat_map(|ids| ids.iter().map(String::as_str))
                .collect(),
        )
    }
}

fn remove_from(buckets: &mut Buckets, key: &IndexKey, id: &str) {
    if let Some(ids) = buckets.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            buckets.remove(key);
        }
    }
}
