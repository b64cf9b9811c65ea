//! Query planning: index-assisted candidate selection followed by full evaluation.
//!
//! For every indexed field whose condition pins it to a value (a literal, an `eq`
//! operator, or an `in` list) the planner takes that value's bucket as a candidate
//! subset. Subsets are intersected smallest-first. Without any such subset the whole
//! store is scanned. Either way every candidate is checked against the complete clause,
//! so an index only ever narrows the search.

use std::collections::HashSet;

use bson::Bson;
use log::debug;

use docsync_core::{
    query::{Condition, FieldOp, Where},
    record::Record,
};

use crate::{evaluator::DocumentEvaluator, index::IndexManager, store::DocumentMap};

pub(crate) struct QueryPlanner<'a> {
    documents: &'a DocumentMap,
    indexes: &'a IndexManager,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(documents: &'a DocumentMap, indexes: &'a IndexManager) -> Self {
        Self { documents, indexes }
    }

    /// Returns the matching records in store order.
    pub fn evaluate(&self, clause: &Where) -> Vec<&'a Record> {
        if clause.is_empty() {
            return self.documents.iter().collect();
        }

        match self.candidates(clause) {
            Some(candidates) => candidates
                .into_iter()
                .filter(|record| DocumentEvaluator::new(record).evaluate(clause))
                .collect(),
            None => self
                .documents
                .iter()
                .filter(|record| DocumentEvaluator::new(record).evaluate(clause))
                .collect(),
        }
    }

    /// Returns the first matching record in store order.
    pub fn find_one(&self, clause: &Where) -> Option<&'a Record> {
        let matches = |record: &&'a Record| DocumentEvaluator::new(record).evaluate(clause);

        if clause.is_empty() {
            return self.documents.iter().next();
        }

        match self.candidates(clause) {
            Some(candidates) => candidates.into_iter().find(matches),
            None => self.documents.iter().find(matches),
        }
    }

    /// Counts matching records. A missing or empty clause counts the whole store.
    pub fn count(&self, clause: Option<&Where>) -> usize {
        match clause {
            Some(clause) if !clause.is_empty() => self.evaluate(clause).len(),
            _ => self.documents.count(),
        }
    }

    /// Narrows the search using indexes. `None` means a full scan is needed.
    fn candidates(&self, clause: &Where) -> Option<Vec<&'a Record>> {
        let mut subsets = clause
            .iter()
            .filter_map(|(field, condition)| self.index_subset(field, condition))
            .collect::<Vec<_>>();

        if subsets.is_empty() {
            debug!("no index applies to {} field(s), scanning {} document(s)", clause.len(), self.documents.count());
            return None;
        }

        subsets.sort_by_key(HashSet::len);
        let mut subsets = subsets.into_iter();
        let mut ids = subsets.next().unwrap_or_default();

        for subset in subsets {
            if ids.is_empty() {
                break;
            }
            ids.retain(|id| subset.contains(id));
        }

        debug!("index lookup narrowed the search to {} candidate(s)", ids.len());

        let mut candidates = ids
            .into_iter()
            .filter_map(|id| Some((self.documents.seq_of(id)?, self.documents.read(id)?)))
            .collect::<Vec<_>>();
        candidates.sort_by_key(|(seq, _)| *seq);

        Some(candidates.into_iter().map(|(_, record)| record).collect())
    }

    fn index_subset(&self, field: &str, condition: &Condition) -> Option<HashSet<&'a str>> {
        if !self.indexes.is_indexed(field) {
            return None;
        }

        match condition {
            Condition::Literal(value) => self.indexes.lookup(field, value),
            Condition::Pattern(_) => None,
            Condition::Operators(ops) => ops.iter().find_map(|op| match op {
                FieldOp::Eq(value) => self.indexes.lookup(field, value),
                FieldOp::In(Bson::Array(values)) => self.indexes.lookup_any(field, values),
                _ => None,
            }),
        }
    }
}
