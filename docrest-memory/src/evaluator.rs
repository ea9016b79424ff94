//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for query expressions and sort keys,
//! enabling filtering and ordering of BSON documents without a database.

use bson::{Bson, Document as BsonDocument, datetime::DateTime};
use std::{cmp::Ordering, collections::HashMap};

use docrest_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `Int32`, `Int64` and `Double` values
/// compare with each other.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            // missing values sort first, as in MongoDB
            (Comparable::Null, _) => Some(Ordering::Less),
            (_, Comparable::Null) => Some(Ordering::Greater),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Orders two documents by a list of sort keys.
pub(crate) fn compare_documents(a: &BsonDocument, b: &BsonDocument, sort: &[Sort]) -> Ordering {
    for key in sort {
        let left = a
            .get(&key.field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);
        let right = b
            .get(&key.field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => left.partial_cmp(&right),
            SortDirection::Desc => right.partial_cmp(&left),
        }
        .unwrap_or(Ordering::Equal);

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a BsonDocument) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns `true` if `document` matches `filter`; a missing filter matches everything.
    pub fn matches(document: &'a BsonDocument, filter: Option<&Expr>) -> DocumentStoreResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

fn equals(field_value: &Bson, value: &Bson) -> bool {
    let target = Comparable::from(value);

    match Comparable::from(field_value) {
        Comparable::Array(items) if !matches!(target, Comparable::Array(_)) => {
            items.iter().any(|item| item == &target)
        }
        other => other == target,
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = self.document.get(field) else {
            return Ok(false);
        };

        match op {
            FieldOp::Eq => Ok(equals(field_value, value)),
            FieldOp::In => match value {
                Bson::Array(values) => Ok(values
                    .iter()
                    .any(|candidate| equals(field_value, candidate))),
                other => Err(DocumentStoreError::Backend(format!(
                    "$in on {field} expects an array, got {other}"
                ))),
            },
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                let (left, right) = (Comparable::from(field_value), Comparable::from(value));

                // null only ever compares equal to null in a range filter
                if matches!(left, Comparable::Null) != matches!(right, Comparable::Null) {
                    return Ok(false);
                }

                Ok(match left.partial_cmp(&right) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docrest_core::query::Filter;

    fn eval(document: &BsonDocument, expr: Expr) -> bool {
        DocumentEvaluator::new(document).evaluate(&expr).unwrap()
    }

    #[test]
    fn range_operators_compare_across_numeric_types() {
        let document = doc! { "age": 15_i32 };

        assert!(eval(&document, Filter::gte("age", 10_i64).and(Filter::lt("age", 20.0))));
        assert!(!eval(&document, Filter::gt("age", 15_i64)));
        assert!(eval(&document, Filter::lte("age", 15_i64)));
    }

    #[test]
    fn equality_matches_array_elements() {
        let document = doc! { "tags": ["a", "b"] };

        assert!(eval(&document, Filter::eq("tags", "b")));
        assert!(!eval(&document, Filter::eq("tags", "c")));
    }

    #[test]
    fn membership_matches_any_value() {
        let document = doc! { "_id": "x" };

        assert!(eval(&document, Filter::is_in("_id", ["y", "x"])));
        assert!(!eval(&document, Filter::is_in("_id", Vec::<String>::new())));
    }

    #[test]
    fn missing_fields_never_match() {
        let document = doc! { "name": "a" };

        assert!(!eval(&document, Filter::eq("age", 1)));
        assert!(!eval(&document, Filter::lt("age", 1)));
    }

    #[test]
    fn multi_key_sort_breaks_ties_in_order() {
        let a = doc! { "age": 3, "name": "b" };
        let b = doc! { "age": 3, "name": "a" };
        let c = doc! { "age": 5, "name": "c" };
        let sort = [Sort::desc("age"), Sort::asc("name")];

        let mut rows = vec![a.clone(), b.clone(), c.clone()];
        rows.sort_by(|x, y| compare_documents(x, y, &sort));

        assert_eq!(rows, vec![c, b, a]);
    }
}
