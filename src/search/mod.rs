//! Search handlers: query-parameter keyed predicate builders.
//!
//! A [`SearchHandler`] receives the query being built, the raw values of its own parameter
//! and the full parameter set, and returns the query with at most one clause appended.
//! Only the first value of a parameter counts, and an empty first value makes the handler
//! a no-op (see [`valuable`]).

mod handlers;
pub mod transform;

pub use handlers::*;

use crate::sql::Query;
use std::collections::HashMap;
use std::sync::Arc;

pub type SearchHandler = Arc<dyn Fn(Query, &[String], &QueryParams) -> Query + Send + Sync>;

/// Registry keyed by exact query-parameter name.
pub type SearchHandlers = HashMap<String, SearchHandler>;

/// Multi-value query parameters in first-appearance order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// All values of `key`; empty when absent.
    pub fn get(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// First value of `key` if it is non-empty.
    pub fn first(&self, key: &str) -> Option<&str> {
        valuable(self.get(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}

/// The significant value of a parameter: its first entry, when non-empty.
pub fn valuable(values: &[String]) -> Option<&str> {
    values.first().map(String::as_str).filter(|v| !v.is_empty())
}

/// Run every registered handler whose key appears in `params`, in parameter order.
/// Unregistered keys are ignored.
pub fn apply_searches(handlers: &SearchHandlers, params: &QueryParams, mut query: Query) -> Query {
    for (key, values) in params.iter() {
        if let Some(handler) = handlers.get(key) {
            query = handler(query, values, params);
        }
    }
    query
}
