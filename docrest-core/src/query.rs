//! Query construction for document stores.
//!
//! A [`Query`] bundles a filter expression, an ordered list of sort keys, a skip/limit
//! window and an optional field projection. Backends consume the filter through the
//! [`QueryVisitor`] trait, so every store interprets the same expression tree.
//!
//! # Query Building
//!
//! ```ignore
//! use docrest_core::query::{Query, Filter, Sort};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("name", "Alice").and(Filter::gte("age", 18)))
//!     .sort(Sort::desc("age"))
//!     .skip(20)
//!     .limit(20)
//!     .build();
//! ```
//!
//! Without an explicit sort, results are ordered by identity ascending. The first call to
//! [`QueryBuilder::sort`] replaces that default; later calls append further keys.

use bson::Bson;

use crate::{document::ID_FIELD, error::DocumentStoreError};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to. Against an array field, matches if any element is equal.
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Membership in a list of values.
    In,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Field comparison expression.
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: impl Into<String>, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field: field.into(), op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }
}

/// Combines an optional filter with a required one.
pub fn and_filter(filter: Option<Expr>, other: Expr) -> Expr {
    match filter {
        Some(filter) => filter.and(other),
        None => other,
    }
}

/// Helper for constructing filter expressions.
///
/// ```ignore
/// let expr = Filter::eq("name", "Alice").and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Eq, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Lte, value.into())
    }

    /// Matches documents whose field equals any of `values`.
    pub fn is_in<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(
            field,
            FieldOp::In,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches the document with the given identity.
    pub fn id(id: impl Into<Bson>) -> Expr {
        Self::eq(ID_FIELD, id)
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }
}

/// Which fields to return from a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Return only these fields, plus the identity.
    Include(Vec<String>),
    /// Return everything except these fields.
    Exclude(Vec<String>),
}

impl Projection {
    /// Applies this projection to a raw document.
    pub fn apply(&self, document: bson::Document) -> bson::Document {
        match self {
            Projection::Include(fields) => document
                .into_iter()
                .filter(|(key, _)| key == ID_FIELD || fields.iter().any(|field| field == key))
                .collect(),
            Projection::Exclude(fields) => document
                .into_iter()
                .filter(|(key, _)| !fields.iter().any(|field| field == key))
                .collect(),
        }
    }
}

/// A structured query for retrieving and filtering documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// Number of documents to skip.
    pub skip: usize,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    pub projection: Option<Projection>,
}

impl Default for Query {
    fn default() -> Self {
        Query {
            filter: None,
            sort: vec![Sort::asc(ID_FIELD)],
            skip: 0,
            limit: None,
            projection: None,
        }
    }
}

impl Query {
    /// Creates a query matching everything, ordered by identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Narrows this query with an additional filter.
    pub fn and_filter(mut self, other: Expr) -> Self {
        self.filter = Some(and_filter(self.filter.take(), other));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
    sorted: bool,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Adds a sort key. The first call replaces the default identity ordering.
    pub fn sort(mut self, sort: Sort) -> Self {
        if !self.sorted {
            self.query.sort.clear();
            self.sorted = true;
        }
        self.query.sort.push(sort);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.query.projection = Some(projection);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks a filter expression, producing a backend-specific representation.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn default_order_is_identity_ascending() {
        let query = Query::new();

        assert_eq!(query.sort, vec![Sort::asc(ID_FIELD)]);
        assert_eq!(query.skip, 0);
        assert!(query.limit.is_none());
    }

    #[test]
    fn first_sort_replaces_default() {
        let query = Query::builder()
            .sort(Sort::desc("age"))
            .sort(Sort::asc("name"))
            .build();

        assert_eq!(query.sort, vec![Sort::desc("age"), Sort::asc("name")]);
    }

    #[test]
    fn and_flattens_into_existing_conjunction() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));

        match expr {
            Expr::And(list) => assert_eq!(list.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    #[test]
    fn narrowing_an_unfiltered_query_sets_the_filter() {
        let query = Query::new().and_filter(Filter::eq("a", 1));

        assert_eq!(query.filter, Some(Filter::eq("a", 1)));
    }

    #[test]
    fn include_projection_keeps_identity() {
        let document = doc! { "_id": "x", "name": "a", "age": 3 };

        let included = Projection::Include(vec!["name".into()]).apply(document.clone());
        assert_eq!(included, doc! { "_id": "x", "name": "a" });

        let excluded = Projection::Exclude(vec!["name".into()]).apply(document);
        assert_eq!(excluded, doc! { "_id": "x", "age": 3 });
    }
}
