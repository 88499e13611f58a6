//! Built-in search handlers.

use super::{valuable, QueryParams, SearchHandler};
use crate::record::{RecordId, DELETED_AT};
use crate::sql::{Direction, Operator, Query};
use serde_json::Value;
use std::sync::Arc;

/// `?key=desc` orders descending, any other non-empty value ascending.
pub fn sort_by(column: impl Into<String>) -> SearchHandler {
    let column = column.into();
    Arc::new(move |query: Query, values: &[String], _: &QueryParams| match valuable(values) {
        Some(v) => {
            let direction = if v.eq_ignore_ascii_case("desc") {
                Direction::Desc
            } else {
                Direction::Asc
            };
            query.order_by(column.clone(), direction)
        }
        None => query,
    })
}

/// `column {operator} value`, where `transform` converts the raw value into the bound
/// value. A transform returning `None` rejects the clause and leaves the query untouched.
pub fn keyword_statement<F>(column: impl Into<String>, operator: Operator, transform: F) -> SearchHandler
where
    F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
{
    let column = column.into();
    Arc::new(move |query: Query, values: &[String], _: &QueryParams| {
        match valuable(values).and_then(|v| transform(v)) {
            Some(bound) => query.filter(column.clone(), operator, bound),
            None => query,
        }
    })
}

/// `column = value`.
pub fn keyword_equal(column: impl Into<String>) -> SearchHandler {
    keyword_statement(column, Operator::Equal, |v| Some(Value::String(v.to_string())))
}

pub fn keyword_equal_with<F>(column: impl Into<String>, transform: F) -> SearchHandler
where
    F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
{
    keyword_statement(column, Operator::Equal, transform)
}

/// `column LIKE '%value%'`.
pub fn keyword_like(column: impl Into<String>) -> SearchHandler {
    keyword_like_with(column, str::to_string)
}

/// `column LIKE '%transform(value)%'`.
pub fn keyword_like_with<F>(column: impl Into<String>, transform: F) -> SearchHandler
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    keyword_statement(column, Operator::Like, move |v| {
        Some(Value::String(format!("%{}%", transform(v))))
    })
}

/// Comma-separated tokens, trimmed, with empty tokens dropped. Duplicates are kept.
pub fn split_tokens(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn in_list(tokens: Vec<String>) -> Value {
    Value::Array(tokens.into_iter().map(Value::String).collect())
}

/// `column IN (v1, ..., vn)` from `?key=v1,v2,...`. An empty token list leaves the query
/// unfiltered.
pub fn keyword_in(column: impl Into<String>) -> SearchHandler {
    keyword_in_with(column, |tokens| tokens)
}

/// Like [`keyword_in`], with `transform` re-filtering the token list first. If the
/// transform empties the list the clause is skipped, so the query matches everything.
pub fn keyword_in_with<F>(column: impl Into<String>, transform: F) -> SearchHandler
where
    F: Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static,
{
    keyword_statement(column, Operator::In, move |v| {
        let tokens = transform(split_tokens(v));
        if tokens.is_empty() {
            None
        } else {
            Some(in_list(tokens))
        }
    })
}

/// Like [`keyword_in_with`], but an emptied list becomes an `IN ()` that matches nothing.
pub fn keyword_in_strict_with<F>(column: impl Into<String>, transform: F) -> SearchHandler
where
    F: Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static,
{
    keyword_statement(column, Operator::In, move |v| Some(in_list(transform(split_tokens(v)))))
}

/// `column IN (ids)`; tokens that are not unsigned integers are dropped.
pub fn keyword_id_in(column: impl Into<String>) -> SearchHandler {
    keyword_statement(column, Operator::In, |v| {
        let ids: Vec<Value> = split_tokens(v)
            .iter()
            .filter_map(|t| t.parse::<RecordId>().ok())
            .map(Value::from)
            .collect();
        if ids.is_empty() {
            None
        } else {
            Some(Value::Array(ids))
        }
    })
}

/// `?deleted=false` keeps active rows (`deleted_at IS NULL`); any other non-empty value
/// keeps soft-deleted rows only.
pub fn soft_delete_filter() -> SearchHandler {
    Arc::new(|query: Query, values: &[String], _: &QueryParams| match valuable(values) {
        Some("false") => query.is_null(DELETED_AT),
        Some(_) => query.is_not_null(DELETED_AT),
        None => query,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::transform::numeric_validate;
    use serde_json::json;

    fn run(handler: &SearchHandler, values: &[&str]) -> Query {
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        handler(Query::new(), &values, &QueryParams::new())
    }

    #[test]
    fn sort_direction_is_case_insensitive() {
        let h = sort_by("created_at");
        assert_eq!(run(&h, &["DeSc"]).orders[0].direction, Direction::Desc);
        assert_eq!(run(&h, &["up"]).orders[0].direction, Direction::Asc);
        assert!(run(&h, &[""]).orders.is_empty());
        assert!(run(&h, &[]).orders.is_empty());
    }

    #[test]
    fn first_value_wins() {
        let h = keyword_equal("name");
        let q = run(&h, &["a", "b"]);
        assert_eq!(q.conditions.len(), 1);
        assert_eq!(q.conditions[0].value, json!("a"));
        assert!(run(&h, &["", "b"]).conditions.is_empty());
    }

    #[test]
    fn like_wraps_transformed_value() {
        let h = keyword_like_with("name", |v| v.to_lowercase());
        let q = run(&h, &["TeSt"]);
        assert_eq!(q.conditions[0].operator, Operator::Like);
        assert_eq!(q.conditions[0].value, json!("%test%"));
    }

    #[test]
    fn in_drops_empty_tokens_but_keeps_duplicates() {
        assert_eq!(split_tokens("1,,,3,4,5,6,2,3,4,"), vec!["1", "3", "4", "5", "6", "2", "3", "4"]);
        let q = run(&keyword_in("id"), &[" 1 , 2 "]);
        assert_eq!(q.conditions[0].value, json!(["1", "2"]));
        assert!(run(&keyword_in("id"), &[",,"]).conditions.is_empty());
    }

    #[test]
    fn emptied_in_list_skips_or_matches_nothing() {
        let drop_all = |_: Vec<String>| Vec::<String>::new();
        assert!(run(&keyword_in_with("id", drop_all), &["1,2"]).conditions.is_empty());
        let q = run(&keyword_in_strict_with("id", drop_all), &["1,2"]);
        assert_eq!(q.conditions[0].value, json!([]));
    }

    #[test]
    fn id_in_parses_ids() {
        let q = run(&keyword_id_in("id"), &["1,,x,23"]);
        assert_eq!(q.conditions[0].value, json!([1, 23]));
        assert!(run(&keyword_id_in("id"), &["x,y"]).conditions.is_empty());
    }

    #[test]
    fn statement_transform_can_reject() {
        let h = keyword_statement("age", Operator::Gte, numeric_validate);
        assert_eq!(run(&h, &["10"]).conditions[0].value, json!(10));
        assert!(run(&h, &["abc"]).conditions.is_empty());
    }

    #[test]
    fn soft_delete_filter_selects_by_value() {
        let h = soft_delete_filter();
        assert_eq!(run(&h, &["false"]).conditions[0].operator, Operator::IsNull);
        assert_eq!(run(&h, &["true"]).conditions[0].operator, Operator::IsNotNull);
        assert_eq!(run(&h, &["yes"]).conditions[0].operator, Operator::IsNotNull);
        assert!(run(&h, &[""]).conditions.is_empty());
    }
}
