//! Translation of request query parameters into a [`Query`].
//!
//! Reserved parameters start with `$`:
//!
//! - `$sort` - comma-separated fields, each optionally prefixed with `+` or `-`
//! - `$page` / `$display` - zero-based page number and page size
//! - `$only` / `$exclude` - comma-separated inclusion or exclusion projection; the one
//!   given last wins
//!
//! Every other parameter is a filter on a declared field, either `field=value` for
//! equality or `field__op=value` with `op` one of `lt`, `lte`, `gt`, `gte`, `in`. Values
//! are coerced to the field's declared kind. Parameters naming undeclared fields are
//! ignored.

use bson::Bson;

use docrest_core::{
    query::{Expr, FieldOp, Projection, Query, Sort},
    schema::Schema,
};

use crate::{
    config::ResourceConfig,
    error::{RestError, RestResult},
};

pub const SORT: &str = "$sort";
pub const PAGE: &str = "$page";
pub const DISPLAY: &str = "$display";
pub const ONLY: &str = "$only";
pub const EXCLUDE: &str = "$exclude";

const OP_SEPARATOR: &str = "__";

fn parse_op(suffix: &str) -> Option<FieldOp> {
    match suffix {
        "lt" => Some(FieldOp::Lt),
        "lte" => Some(FieldOp::Lte),
        "gt" => Some(FieldOp::Gt),
        "gte" => Some(FieldOp::Gte),
        "in" => Some(FieldOp::In),
        _ => None,
    }
}

/// Splits `field__op` into its parts; a key without a known operator suffix is equality.
fn split_key(key: &str) -> (&str, FieldOp) {
    key.rsplit_once(OP_SEPARATOR)
        .and_then(|(field, suffix)| parse_op(suffix).map(|op| (field, op)))
        .unwrap_or((key, FieldOp::Eq))
}

fn parse_sort(raw: &str) -> Vec<Sort> {
    raw.split(',')
        .map(|token| token.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .map(|token| match token.strip_prefix('-') {
            Some(field) => Sort::desc(field),
            None => Sort::asc(token.strip_prefix('+').unwrap_or(&token)),
        })
        .filter(|sort| !sort.field.is_empty())
        .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(key: &str, raw: &str) -> RestResult<usize> {
    raw.trim()
        .parse()
        .map_err(|_| RestError::MalformedRequest(format!("{key}: expected a non-negative integer, got {raw:?}")))
}

fn coerce(schema: &Schema, field: &str, raw: &str) -> RestResult<Bson> {
    schema
        .value_kind(field)
        .and_then(|kind| kind.coerce(raw))
        .ok_or_else(|| RestError::MalformedRequest(format!("{field}: invalid value {raw:?}")))
}

fn parse_filter(schema: &Schema, key: &str, raw: &str) -> RestResult<Option<Expr>> {
    let (field, op) = split_key(key);

    if !schema.is_declared(field) {
        return Ok(None);
    }

    let value = match op {
        FieldOp::In => Bson::Array(
            raw.split(',')
                .map(|item| coerce(schema, field, item))
                .collect::<RestResult<Vec<_>>>()?,
        ),
        _ => coerce(schema, field, raw)?,
    };

    Ok(Some(Expr::field(field, op, value)))
}

/// Builds the query for one request from its parameters, checked against `schema`.
///
/// # Errors
///
/// Returns [`RestError::MalformedRequest`] if a page number, page size or filter value
/// does not parse.
pub fn prepare(params: &[(String, String)], schema: &Schema, config: &ResourceConfig) -> RestResult<Query> {
    let mut filters = Vec::new();
    let mut sort = Vec::new();
    let mut page = 0;
    let mut display = config.page_size;
    let mut projection = None;

    for (key, raw) in params {
        match key.as_str() {
            SORT => sort = parse_sort(raw),
            PAGE => page = parse_number(key, raw)?,
            DISPLAY => {
                display = parse_number(key, raw)?;
                if display == 0 {
                    return Err(RestError::MalformedRequest(format!("{DISPLAY}: must be positive")));
                }
            }
            ONLY => projection = Some(Projection::Include(parse_list(raw))),
            EXCLUDE => projection = Some(Projection::Exclude(parse_list(raw))),
            reserved if reserved.starts_with('$') => {}
            _ => filters.extend(parse_filter(schema, key, raw)?),
        }
    }

    let mut builder = Query::builder()
        .skip(page.saturating_mul(display))
        .limit(display);

    builder = match filters.len() {
        0 => builder,
        1 => builder.filter(filters.remove(0)),
        _ => builder.filter(Expr::And(filters)),
    };

    for key in sort {
        builder = builder.sort(key);
    }

    if let Some(projection) = projection {
        builder = builder.projection(projection);
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrest_core::{
        document::{Document, DocumentId, ID_FIELD},
        query::Filter,
        schema::{FieldSpec, ValueKind},
    };
    use serde::{Deserialize, Serialize};
    use std::sync::OnceLock;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Person {
        #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
        id: Option<DocumentId>,
        name: String,
        age: i64,
        active: bool,
    }

    impl Document for Person {
        fn id(&self) -> Option<&DocumentId> {
            self.id.as_ref()
        }

        fn set_id(&mut self, id: DocumentId) {
            self.id = Some(id);
        }

        fn collection_name() -> &'static str {
            "people"
        }

        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::builder::<Person>()
                    .field(FieldSpec::new("name", ValueKind::Text).required())
                    .field(FieldSpec::new("age", ValueKind::Integer))
                    .field(FieldSpec::new("active", ValueKind::Boolean))
                    .build()
            })
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn prepare_with(pairs: &[(&str, &str)]) -> RestResult<Query> {
        prepare(&params(pairs), Person::schema(), &ResourceConfig::default())
    }

    #[test]
    fn no_parameters_yield_the_first_default_page() {
        let query = prepare_with(&[]).unwrap();

        assert_eq!(query.filter, None);
        assert_eq!(query.sort, vec![Sort::asc(ID_FIELD)]);
        assert_eq!(query.skip, 0);
        assert_eq!(query.limit, Some(20));
        assert_eq!(query.projection, None);
    }

    #[test]
    fn range_operators_combine_into_a_conjunction() {
        let query = prepare_with(&[("age__gte", "10"), ("age__lt", "20")]).unwrap();

        assert_eq!(
            query.filter,
            Some(Expr::And(vec![Filter::gte("age", 10_i64), Filter::lt("age", 20_i64)]))
        );
    }

    #[test]
    fn values_are_coerced_to_declared_kinds() {
        let query = prepare_with(&[("active", "true"), ("name", "7")]).unwrap();

        assert_eq!(
            query.filter,
            Some(Expr::And(vec![Filter::eq("active", true), Filter::eq("name", "7")]))
        );
    }

    #[test]
    fn membership_splits_on_commas() {
        let query = prepare_with(&[("age__in", "1, 2,3")]).unwrap();

        assert_eq!(query.filter, Some(Filter::is_in("age", [1_i64, 2, 3])));
    }

    #[test]
    fn undeclared_fields_and_reserved_keys_are_ignored() {
        let query = prepare_with(&[("color", "red"), ("shape__in", "a,b"), ("$unknown", "1")]).unwrap();

        assert_eq!(query.filter, None);
    }

    #[test]
    fn unparseable_values_are_malformed() {
        assert!(matches!(prepare_with(&[("age", "old")]), Err(RestError::MalformedRequest(_))));
        assert!(matches!(prepare_with(&[("_id", "nope")]), Err(RestError::MalformedRequest(_))));
        assert!(matches!(prepare_with(&[("$page", "-1")]), Err(RestError::MalformedRequest(_))));
        assert!(matches!(prepare_with(&[("$display", "0")]), Err(RestError::MalformedRequest(_))));
    }

    #[test]
    fn sort_tokens_carry_direction_and_strip_whitespace() {
        let query = prepare_with(&[("$sort", "-age, + name ,,")]).unwrap();

        assert_eq!(query.sort, vec![Sort::desc("age"), Sort::asc("name")]);
    }

    #[test]
    fn page_and_display_set_the_window() {
        let query = prepare_with(&[("$page", "2"), ("$display", "10")]).unwrap();

        assert_eq!(query.skip, 20);
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn the_last_projection_parameter_wins() {
        let only_last = prepare_with(&[("$exclude", "age"), ("$only", "name, age")]).unwrap();
        assert_eq!(
            only_last.projection,
            Some(Projection::Include(vec!["name".into(), "age".into()]))
        );

        let exclude_last = prepare_with(&[("$only", "name"), ("$exclude", "age")]).unwrap();
        assert_eq!(exclude_last.projection, Some(Projection::Exclude(vec!["age".into()])));
    }

    #[test]
    fn configured_page_size_is_the_default_display() {
        let config = ResourceConfig::default().with_page_size(5);
        let query = prepare(&params(&[("$page", "1")]), Person::schema(), &config).unwrap();

        assert_eq!(query.skip, 5);
        assert_eq!(query.limit, Some(5));
    }
}
