//! Where-clause evaluation against stored records.
//!
//! Values are compared through [`Comparable`], which treats every numeric type as a
//! [`Number`] so that `1`, `1_i64` and `1.0` are equal. Integers compare exactly, so
//! distinct `i64` values above 2^53 stay distinct. The index manager buckets values
//! under the same normalization, so an index lookup and a full evaluation agree on
//! which documents hold a value.

use std::{borrow::Cow, cmp::Ordering, collections::HashMap};

use bson::{Bson, datetime::DateTime};

use docsync_core::{
    query::{Condition, FieldOp, Where},
    record::Record,
};

/// A BSON number, exact for integers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Returns the number held by `value`, `None` for every other type.
    pub(crate) fn of(value: &Bson) -> Option<Self> {
        match value {
            Bson::Int32(value) => Some(Number::Int(i64::from(*value))),
            Bson::Int64(value) => Some(Number::Int(*value)),
            Bson::Double(value) => Some(Number::Float(*value)),
            _ => None,
        }
    }

    /// Folds integral doubles within `i64` range into [`Number::Int`].
    pub(crate) fn normalized(self) -> Self {
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        match self {
            Number::Float(value) if value.fract() == 0.0 && (-LIMIT..LIMIT).contains(&value) => {
                Number::Int(value as i64)
            }
            other => other,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }

    /// Numeric ordering; `None` when either side is NaN.
    pub(crate) fn compare(self, other: Self) -> Option<Ordering> {
        match (self.normalized(), other.normalized()) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

/// Comparable view of a BSON value.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(Number),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON type, compared structurally.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(Number::Int(i64::from(*value))),
            Bson::Int64(value) => Comparable::Number(Number::Int(*value)),
            Bson::Double(value) => Comparable::Number(Number::Float(*value)),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a.compare(*b) == Some(Ordering::Equal),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

/// Strict value equality under numeric normalization.
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// Renders a value as the string that patterns are tested against.
pub(crate) fn render(value: &Bson) -> Cow<'_, str> {
    match value {
        Bson::String(value) => Cow::Borrowed(value),
        Bson::Int32(value) => Cow::Owned(value.to_string()),
        Bson::Int64(value) => Cow::Owned(value.to_string()),
        Bson::Double(value) => Cow::Owned(value.to_string()),
        Bson::Boolean(value) => Cow::Borrowed(if *value { "true" } else { "false" }),
        Bson::Null => Cow::Borrowed("null"),
        other => Cow::Owned(other.clone().into_relaxed_extjson().to_string()),
    }
}

/// Evaluates where-clauses against one record.
pub(crate) struct DocumentEvaluator<'a> {
    record: &'a Record,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }

    /// Returns `true` if every field condition holds, stopping at the first that fails.
    pub fn evaluate(&self, clause: &Where) -> bool {
        clause.iter().all(|(field, condition)| {
            let value = self.record.get(field);
            check_condition(value.as_deref(), condition)
        })
    }
}

fn check_condition(value: Option<&Bson>, condition: &Condition) -> bool {
    match condition {
        Condition::Literal(expected) => value.is_some_and(|value| values_equal(value, expected)),
        Condition::Pattern(regex) => value.is_some_and(|value| regex.is_match(&render(value))),
        Condition::Operators(ops) => ops.iter().all(|op| check_op(value, op)),
    }
}

fn check_op(value: Option<&Bson>, op: &FieldOp) -> bool {
    let Some(value) = value else {
        // Absent fields are unequal to everything and fail every other test.
        return matches!(op, FieldOp::NotEq(_));
    };

    match op {
        FieldOp::Eq(expected) => values_equal(value, expected),
        FieldOp::NotEq(expected) => !values_equal(value, expected),
        FieldOp::Gt(bound) => compare_numbers(value, bound, Ordering::is_gt),
        FieldOp::Gte(bound) => compare_numbers(value, bound, Ordering::is_ge),
        FieldOp::Lt(bound) => compare_numbers(value, bound, Ordering::is_lt),
        FieldOp::Lte(bound) => compare_numbers(value, bound, Ordering::is_le),
        FieldOp::Includes(needle) => match (value, needle) {
            (Bson::String(haystack), Bson::String(needle)) => haystack.contains(needle.as_str()),
            (Bson::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
            _ => false,
        },
        FieldOp::StartsWith(prefix) => match (value, prefix) {
            (Bson::String(value), Bson::String(prefix)) => value.starts_with(prefix.as_str()),
            _ => false,
        },
        FieldOp::EndsWith(suffix) => match (value, suffix) {
            (Bson::String(value), Bson::String(suffix)) => value.ends_with(suffix.as_str()),
            _ => false,
        },
        FieldOp::Match(regex) => regex.is_match(&render(value)),
        FieldOp::In(candidates) => match candidates {
            Bson::Array(candidates) => candidates.iter().any(|candidate| values_equal(value, candidate)),
            _ => false,
        },
        FieldOp::Mismatched { .. } | FieldOp::Unknown(_) => false,
    }
}

fn compare_numbers(value: &Bson, bound: &Bson, test: impl Fn(Ordering) -> bool) -> bool {
    match (Number::of(value), Number::of(bound)) {
        (Some(value), Some(bound)) => value.compare(bound).is_some_and(test),
        _ => false,
    }
}
