//! In-process store evaluating the same [`Query`] the PostgreSQL store compiles.
//! Comparison follows loose SQL affinity: numeric text compares as a number, NULL matches
//! nothing except IS NULL, and LIKE supports `%` and `_`.

use crate::error::StoreError;
use crate::record::{RecordId, CREATED_AT, DELETED_AT, ID, MAX_ID, UPDATED_AT};
use crate::sql::{Condition, Direction, Operator, Query};
use crate::store::{Row, SavedRow, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

struct Table {
    next_id: RecordId,
    rows: BTreeMap<RecordId, Row>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(table: &Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut out = Vec::new();
        for row in table.rows.values() {
            let mut keep = true;
            for c in &query.conditions {
                if !matches(row, c)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                out.push(row.clone());
            }
        }
        Ok(out)
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Poisoned
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

fn cell<'a>(row: &'a Row, column: &str) -> Result<&'a Value, StoreError> {
    row.get(column).ok_or_else(|| StoreError::UnknownColumn(column.to_string()))
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SQL-style comparison; `None` when either side is NULL or the types are incomparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::String(y)) | (Value::String(y), Value::Bool(x)) => {
            let y: bool = y.parse().ok()?;
            let ord = x.cmp(&y);
            Some(if a.is_boolean() { ord } else { ord.reverse() })
        }
        _ => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}

fn like(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if let Some((bp, bt)) = backtrack {
            pi = bp + 1;
            ti = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '%')
}

fn invalid(c: &Condition, message: &str) -> StoreError {
    StoreError::InvalidCondition {
        column: c.column.clone(),
        message: message.to_string(),
    }
}

fn matches(row: &Row, c: &Condition) -> Result<bool, StoreError> {
    let v = cell(row, &c.column)?;
    let cmp = |target: &Value| compare(v, target);
    Ok(match c.operator {
        Operator::IsNull => v.is_null(),
        Operator::IsNotNull => !v.is_null(),
        Operator::Equal if c.value.is_null() => v.is_null(),
        Operator::NotEqual if c.value.is_null() => !v.is_null(),
        Operator::Equal => cmp(&c.value) == Some(Ordering::Equal),
        Operator::NotEqual => matches!(cmp(&c.value), Some(o) if o != Ordering::Equal),
        Operator::Gt => cmp(&c.value) == Some(Ordering::Greater),
        Operator::Gte => matches!(cmp(&c.value), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt => cmp(&c.value) == Some(Ordering::Less),
        Operator::Lte => matches!(cmp(&c.value), Some(Ordering::Less | Ordering::Equal)),
        Operator::Like | Operator::NotLike => {
            if v.is_null() {
                false
            } else {
                like(&as_text(v), &as_text(&c.value)) == (c.operator == Operator::Like)
            }
        }
        Operator::In | Operator::NotIn => {
            let items = c.value.as_array().ok_or_else(|| invalid(c, "IN expects a list"))?;
            if v.is_null() {
                false
            } else {
                let found = items.iter().any(|i| cmp(i) == Some(Ordering::Equal));
                found == (c.operator == Operator::In)
            }
        }
        Operator::Between | Operator::NotBetween => {
            let bounds = c
                .value
                .as_array()
                .filter(|a| a.len() == 2)
                .ok_or_else(|| invalid(c, "BETWEEN expects two bounds"))?;
            match (cmp(&bounds[0]), cmp(&bounds[1])) {
                (Some(lo), Some(hi)) => {
                    let inside = lo != Ordering::Less && hi != Ordering::Greater;
                    inside == (c.operator == Operator::Between)
                }
                _ => false,
            }
        }
    })
}

/// NULLs sort last ascending and first descending, as in PostgreSQL.
fn order_rows(rows: &mut [Row], query: &Query) -> Result<(), StoreError> {
    if let Some(first) = rows.first() {
        for o in &query.orders {
            cell(first, &o.column)?;
        }
    }
    rows.sort_by(|a, b| {
        for o in &query.orders {
            let (x, y) = (a.get(&o.column).unwrap_or(&Value::Null), b.get(&o.column).unwrap_or(&Value::Null));
            let ord = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => compare(x, y).unwrap_or(Ordering::Equal),
            };
            let ord = if o.direction == Direction::Desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(())
}

fn row_id(row: &Row) -> Option<RecordId> {
    row.get(ID).and_then(Value::as_u64).filter(|id| *id > 0)
}

#[async_trait]
impl Store for MemoryStore {
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let Some(t) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let mut rows = Self::matching(t, query)?;
        order_rows(&mut rows, query)?;
        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|n| n as usize).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_id(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.get(table).and_then(|t| t.rows.get(&id)).cloned())
    }

    async fn count(&self, table: &str, query: &Query) -> Result<u64, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        match tables.get(table) {
            Some(t) => Ok(Self::matching(t, query)?.len() as u64),
            None => Ok(0),
        }
    }

    /// An update that changes no column reports zero rows affected and leaves
    /// `updated_at` untouched.
    async fn save(&self, table: &str, mut row: Row) -> Result<SavedRow, StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let t = tables.entry(table.to_string()).or_insert_with(|| Table {
            next_id: 1,
            rows: BTreeMap::new(),
        });
        let now = timestamp(Utc::now());

        if let Some(id) = row_id(&row) {
            if let Some(existing) = t.rows.get(&id) {
                for key in [CREATED_AT, UPDATED_AT, DELETED_AT] {
                    row.insert(key.to_string(), existing.get(key).cloned().unwrap_or(Value::Null));
                }
                if &row == existing {
                    return Ok(SavedRow { row, rows_affected: 0 });
                }
                row.insert(UPDATED_AT.to_string(), now);
                t.rows.insert(id, row.clone());
                return Ok(SavedRow { row, rows_affected: 1 });
            }
        }

        let id = match row_id(&row) {
            Some(id) => id,
            None => t.next_id,
        };
        let next = id
            .checked_add(1)
            .filter(|_| id <= MAX_ID)
            .ok_or(StoreError::IdOutOfRange(id))?;
        t.next_id = t.next_id.max(next);
        row.insert(ID.to_string(), Value::from(id));
        row.insert(CREATED_AT.to_string(), now.clone());
        row.insert(UPDATED_AT.to_string(), now);
        row.insert(DELETED_AT.to_string(), Value::Null);
        t.rows.insert(id, row.clone());
        Ok(SavedRow { row, rows_affected: 1 })
    }

    async fn delete(&self, table: &str, id: RecordId) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let removed = tables.get_mut(table).and_then(|t| t.rows.remove(&id));
        Ok(removed.map_or(0, |_| 1))
    }

    async fn mark_deleted(&self, table: &str, id: RecordId, at: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let Some(row) = tables.get_mut(table).and_then(|t| t.rows.get_mut(&id)) else {
            return Ok(0);
        };
        if row.get(DELETED_AT).map_or(false, |v| !v.is_null()) {
            return Ok(0);
        }
        row.insert(DELETED_AT.to_string(), timestamp(at));
        Ok(1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (name, age) in [("test1", 10), ("test2", 9), ("other", 30)] {
            store
                .save("users", row(json!({"id": 0, "name": name, "age": age})))
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn like_wildcards() {
        assert!(like("test1", "%test%"));
        assert!(like("test1", "test_"));
        assert!(like("abc", "%"));
        assert!(!like("abc", "%d%"));
        assert!(!like("test1", "Test%"));
        assert!(like("a%b", "a%b"));
        assert!(like("%ay", "%y"));
    }

    #[test]
    fn numeric_text_compares_as_number() {
        assert_eq!(compare(&json!(10), &json!("9")), Some(Ordering::Greater));
        assert_eq!(compare(&json!("abc"), &json!(1)), None);
        assert_eq!(compare(&Value::Null, &json!(1)), None);
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_and_timestamps() {
        let store = seeded().await;
        let first = store.find_by_id("users", 1).await.unwrap().unwrap();
        assert_eq!(first["name"], "test1");
        assert!(first[CREATED_AT].is_string());
        assert_eq!(first[DELETED_AT], Value::Null);
        assert_eq!(store.find_by_id("users", 3).await.unwrap().unwrap()["name"], "other");
    }

    #[tokio::test]
    async fn ids_beyond_bigint_are_rejected() {
        let store = seeded().await;
        let err = store
            .save("users", row(json!({"id": u64::MAX, "name": "x", "age": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IdOutOfRange(u64::MAX)));

        let top = store
            .save("users", row(json!({"id": MAX_ID, "name": "top", "age": 1})))
            .await
            .unwrap();
        assert_eq!(top.row[ID], json!(MAX_ID));
        let err = store
            .save("users", row(json!({"id": 0, "name": "next", "age": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IdOutOfRange(_)));
        assert_eq!(store.count("users", &Query::new()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn filters_orders_and_pages() {
        let store = seeded().await;
        let q = Query::new()
            .filter("age", Operator::Gte, json!(10))
            .order_by("age", Direction::Desc);
        let rows = store.find("users", &q).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("other"), json!("test1")]);

        let q = Query::new().offset(1).limit(1);
        let rows = store.find("users", &q).await.unwrap();
        assert_eq!(rows[0]["id"], 2);

        let q = Query::new().filter("id", Operator::In, json!(["1", "3"]));
        assert_eq!(store.count("users", &q).await.unwrap(), 2);

        let q = Query::new().filter("age", Operator::Between, json!([9, 10]));
        assert_eq!(store.count("users", &q).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unknown_columns_are_errors() {
        let store = seeded().await;
        let q = Query::new().filter("field_not_found", Operator::Like, json!("%x%"));
        assert!(matches!(store.find("users", &q).await, Err(StoreError::UnknownColumn(_))));
        let q = Query::new().order_by("nope", Direction::Asc);
        assert!(matches!(store.find("users", &q).await, Err(StoreError::UnknownColumn(_))));
    }

    #[tokio::test]
    async fn unchanged_update_affects_nothing() {
        let store = seeded().await;
        let current = store.find_by_id("users", 1).await.unwrap().unwrap();
        let saved = store.save("users", current.clone()).await.unwrap();
        assert_eq!(saved.rows_affected, 0);
        assert_eq!(saved.row[UPDATED_AT], current[UPDATED_AT]);
    }

    #[tokio::test]
    async fn saving_unknown_id_inserts_with_that_id() {
        let store = seeded().await;
        let saved = store.save("users", row(json!({"id": 10, "name": "x", "age": 1}))).await.unwrap();
        assert_eq!(saved.row["id"], 10);
        let next = store.save("users", row(json!({"name": "y", "age": 2}))).await.unwrap();
        assert_eq!(next.row["id"], 11);
    }

    #[tokio::test]
    async fn mark_deleted_is_idempotent() {
        let store = seeded().await;
        assert_eq!(store.mark_deleted("users", 2, Utc::now()).await.unwrap(), 1);
        assert_eq!(store.mark_deleted("users", 2, Utc::now()).await.unwrap(), 0);
        assert_eq!(store.mark_deleted("users", 99, Utc::now()).await.unwrap(), 0);
        let live = Query::new().is_null(DELETED_AT);
        assert_eq!(store.count("users", &live).await.unwrap(), 2);
        assert_eq!(store.delete("users", 2).await.unwrap(), 1);
        assert_eq!(store.delete("users", 2).await.unwrap(), 0);
    }
}
