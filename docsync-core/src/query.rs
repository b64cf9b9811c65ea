//! Where-clauses and query options.
//!
//! A [`Where`] clause maps field names to [`Condition`]s. Every field must match, and
//! within an operator condition every operator must match. A condition is either a
//! literal (strict equality), a regular expression tested against the field's string
//! rendering, or a list of [`FieldOp`]s.
//!
//! # Building clauses
//!
//! The [`Filter`] struct provides static constructors that can be chained with
//! [`Where::and`]:
//!
//! ```ignore
//! use docsync::query::{Filter, QueryOptions, SortDirection};
//!
//! let filter = Filter::eq("status", "active")
//!     .and(Filter::gte("age", 18))
//!     .and(Filter::lt("age", 65));
//!
//! let options = QueryOptions::builder()
//!     .sort("age", SortDirection::Asc)
//!     .sort("name", SortDirection::Desc)
//!     .skip(10)
//!     .limit(10)
//!     .build();
//! ```
//!
//! Clauses can also be parsed from a BSON document, where sub-documents are operator
//! objects (`{ "age": { "gte": 18, "lt": 65 } }`), regular expressions are patterns, and
//! anything else is a literal. See [`Where::from_document`].

use bson::{Bson, Document as BsonDocument};
use regex::{Regex, RegexBuilder};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9).
    Asc,
    /// Descending order (Z to A, 9 to 0).
    Desc,
}

/// One key of a multi-field sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

/// A single operator of an operator condition.
///
/// The set of operators is closed. Operator names that are not recognized when parsing
/// a clause are kept as [`FieldOp::Unknown`], which never matches.
#[derive(Debug, Clone)]
pub enum FieldOp {
    /// Equal to.
    Eq(Bson),
    /// Not equal to. Also matches when the field is absent.
    NotEq(Bson),
    /// Greater than. Numbers only.
    Gt(Bson),
    /// Greater than or equal to. Numbers only.
    Gte(Bson),
    /// Less than. Numbers only.
    Lt(Bson),
    /// Less than or equal to. Numbers only.
    Lte(Bson),
    /// String contains substring, or array contains an equal element.
    Includes(Bson),
    /// String starts with value.
    StartsWith(Bson),
    /// String ends with value.
    EndsWith(Bson),
    /// The field's string rendering matches the pattern.
    Match(Regex),
    /// Field equals one of the values of an array operand.
    In(Bson),
    /// A known operator whose operand has the wrong type, e.g. `match` with a number.
    /// Never matches.
    Mismatched { name: String, operand: Bson },
    /// An unrecognized operator.
    Unknown(String),
}

impl FieldOp {
    /// Returns the operator name as used in parsed clauses.
    pub fn name(&self) -> &str {
        match self {
            FieldOp::Eq(_) => "eq",
            FieldOp::NotEq(_) => "notEq",
            FieldOp::Gt(_) => "gt",
            FieldOp::Gte(_) => "gte",
            FieldOp::Lt(_) => "lt",
            FieldOp::Lte(_) => "lte",
            FieldOp::Includes(_) => "includes",
            FieldOp::StartsWith(_) => "startsWith",
            FieldOp::EndsWith(_) => "endsWith",
            FieldOp::Match(_) => "match",
            FieldOp::In(_) => "in",
            FieldOp::Mismatched { name, .. } | FieldOp::Unknown(name) => name,
        }
    }

    /// Parses an operator from its name and operand.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] if a `match` pattern does not
    /// compile. Any other `match` operand parses as [`FieldOp::Mismatched`].
    pub fn parse(name: &str, operand: &Bson) -> DocumentStoreResult<Self> {
        let operand_value = || operand.clone();

        Ok(match name {
            "eq" => FieldOp::Eq(operand_value()),
            "notEq" => FieldOp::NotEq(operand_value()),
            "gt" => FieldOp::Gt(operand_value()),
            "gte" => FieldOp::Gte(operand_value()),
            "lt" => FieldOp::Lt(operand_value()),
            "lte" => FieldOp::Lte(operand_value()),
            "includes" => FieldOp::Includes(operand_value()),
            "startsWith" => FieldOp::StartsWith(operand_value()),
            "endsWith" => FieldOp::EndsWith(operand_value()),
            "in" => FieldOp::In(operand_value()),
            "match" => match operand {
                Bson::String(pattern) => FieldOp::Match(compile_pattern(pattern, "")?),
                Bson::RegularExpression(_) => FieldOp::Match(regex_from_bson(operand)?),
                other => FieldOp::Mismatched {
                    name: name.to_string(),
                    operand: other.clone(),
                },
            },
            unknown => FieldOp::Unknown(unknown.to_string()),
        })
    }
}

/// The condition a single field must satisfy.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Strict equality with a value.
    Literal(Bson),
    /// Pattern test against the field's string rendering.
    Pattern(Regex),
    /// All operators must match.
    Operators(Vec<FieldOp>),
}

impl Condition {
    pub fn literal(value: impl Into<Bson>) -> Self {
        Condition::Literal(value.into())
    }

    pub fn pattern(regex: Regex) -> Self {
        Condition::Pattern(regex)
    }

    pub fn ops(ops: impl IntoIterator<Item = FieldOp>) -> Self {
        Condition::Operators(ops.into_iter().collect())
    }

    /// Combines two conditions on the same field so that both must hold.
    pub fn and(self, other: Condition) -> Self {
        let mut ops = self.into_ops();
        ops.extend(other.into_ops());
        Condition::Operators(ops)
    }

    fn into_ops(self) -> Vec<FieldOp> {
        match self {
            Condition::Literal(value) => vec![FieldOp::Eq(value)],
            Condition::Pattern(regex) => vec![FieldOp::Match(regex)],
            Condition::Operators(ops) => ops,
        }
    }
}

/// A where-clause: per-field conditions that must all hold.
///
/// Fields are evaluated in the order they were added. An empty clause matches every
/// document.
#[derive(Debug, Clone, Default)]
pub struct Where {
    fields: Vec<(String, Condition)>,
}

impl Where {
    /// Creates an empty clause, matching every document.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Adds a condition on `field`.
    ///
    /// If the field already has a condition, both must hold.
    pub fn field(mut self, field: impl Into<String>, condition: Condition) -> Self {
        let field = field.into();

        match self.fields.iter().position(|(name, _)| *name == field) {
            Some(index) => {
                let (name, existing) = self.fields.remove(index);
                self.fields.insert(index, (name, existing.and(condition)));
            }
            None => self.fields.push((field, condition)),
        }

        self
    }

    /// Combines this clause with another so that both must hold.
    pub fn and(self, other: Where) -> Self {
        other
            .fields
            .into_iter()
            .fold(self, |clause, (field, condition)| clause.field(field, condition))
    }

    /// Returns `true` if the clause has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of constrained fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns the condition on `field`, if any.
    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, condition)| condition)
    }

    /// Iterates over the constrained fields in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.fields
            .iter()
            .map(|(field, condition)| (field.as_str(), condition))
    }

    /// Parses a clause from its BSON form.
    ///
    /// Sub-documents are operator objects keyed by operator name (`eq`, `notEq`, `gt`,
    /// `gte`, `lt`, `lte`, `includes`, `startsWith`, `endsWith`, `match`, `in`).
    /// BSON regular expressions become patterns; any other value is a literal.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] if a regular expression does not
    /// compile.
    pub fn from_document(document: &BsonDocument) -> DocumentStoreResult<Self> {
        let mut clause = Where::new();

        for (field, value) in document.iter() {
            let condition = match value {
                Bson::Document(ops) => Condition::Operators(
                    ops.iter()
                        .map(|(name, operand)| FieldOp::parse(name, operand))
                        .collect::<DocumentStoreResult<Vec<_>>>()?,
                ),
                Bson::RegularExpression(_) => Condition::Pattern(regex_from_bson(value)?),
                literal => Condition::Literal(literal.clone()),
            };

            clause = clause.field(field.as_str(), condition);
        }

        Ok(clause)
    }
}

/// Helper struct for constructing where-clauses.
///
/// Every method returns a single-field [`Where`]; combine them with [`Where::and`].
pub struct Filter;

impl Filter {
    /// Matches every document.
    pub fn all() -> Where {
        Where::new()
    }

    /// Matches documents whose field strictly equals `value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Where {
        Where::new().field(field, Condition::literal(value))
    }

    /// Matches documents whose field differs from `value` or is absent.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Where {
        Self::op(field, FieldOp::NotEq(value.into()))
    }

    /// Matches documents whose numeric field is greater than `value`.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Where {
        Self::op(field, FieldOp::Gt(value.into()))
    }

    /// Matches documents whose numeric field is greater than or equal to `value`.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Where {
        Self::op(field, FieldOp::Gte(value.into()))
    }

    /// Matches documents whose numeric field is less than `value`.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Where {
        Self::op(field, FieldOp::Lt(value.into()))
    }

    /// Matches documents whose numeric field is less than or equal to `value`.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Where {
        Self::op(field, FieldOp::Lte(value.into()))
    }

    /// Matches string fields containing `value`, or array fields holding it.
    pub fn includes(field: impl Into<String>, value: impl Into<Bson>) -> Where {
        Self::op(field, FieldOp::Includes(value.into()))
    }

    /// Matches string fields starting with `prefix`.
    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Where {
        Self::op(field, FieldOp::StartsWith(Bson::String(prefix.into())))
    }

    /// Matches string fields ending with `suffix`.
    pub fn ends_with(field: impl Into<String>, suffix: impl Into<String>) -> Where {
        Self::op(field, FieldOp::EndsWith(Bson::String(suffix.into())))
    }

    /// Matches documents whose field equals any of `values`.
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Where {
        let values = values.into_iter().map(Into::into).collect::<Vec<Bson>>();
        Self::op(field, FieldOp::In(Bson::Array(values)))
    }

    /// Matches documents whose field renders to a string matching `regex`.
    pub fn matches(field: impl Into<String>, regex: Regex) -> Where {
        Where::new().field(field, Condition::pattern(regex))
    }

    /// Matches documents satisfying a single operator.
    pub fn op(field: impl Into<String>, op: FieldOp) -> Where {
        Where::new().field(field, Condition::Operators(vec![op]))
    }

    /// Combines clauses so that all must hold.
    pub fn and(clauses: impl IntoIterator<Item = Where>) -> Where {
        clauses.into_iter().fold(Where::new(), Where::and)
    }
}

/// Ordering and pagination applied after filtering.
///
/// The pipeline is fixed: filter, then sort, then skip, then limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Sort keys in priority order.
    pub order_by: Vec<Sort>,
    /// Number of documents to skip after sorting.
    pub skip: Option<usize>,
    /// Maximum number of documents to return after skipping.
    pub limit: Option<usize>,
}

impl QueryOptions {
    /// Creates options that keep every match in store order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new builder for fluent construction.
    pub fn builder() -> QueryOptionsBuilder {
        QueryOptionsBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptionsBuilder {
    options: QueryOptions,
}

impl QueryOptionsBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self { options: QueryOptions::default() }
    }

    /// Appends a sort key. Earlier keys take priority; later keys break ties.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.order_by.push(Sort::new(field, direction));
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Builds and returns the final options.
    pub fn build(self) -> QueryOptions {
        self.options
    }
}

fn compile_pattern(pattern: &str, options: &str) -> DocumentStoreResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|err| DocumentStoreError::InvalidQuery(err.to_string()))
}

// Read through extended JSON so the pattern and flags come out as plain strings.
fn regex_from_bson(value: &Bson) -> DocumentStoreResult<Regex> {
    let extjson = value.clone().into_relaxed_extjson();
    let regex = &extjson["$regularExpression"];

    match regex["pattern"].as_str() {
        Some(pattern) => compile_pattern(pattern, regex["options"].as_str().unwrap_or_default()),
        None => Err(DocumentStoreError::InvalidQuery(format!(
            "expected a regular expression, got {value}"
        ))),
    }
}
