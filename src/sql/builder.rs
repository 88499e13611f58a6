//! Builds parameterized PostgreSQL statements from a [`Query`] and a table name.
//! Identifiers come from record definitions and search handler configuration only; values
//! are always bound as parameters.

use crate::error::StoreError;
use crate::record::{CREATED_AT, DELETED_AT, ID, UPDATED_AT};
use crate::sql::params::PgBindValue;
use crate::sql::query::{Condition, Operator, Query};
use serde_json::{Map, Value};

/// Alias of the table in every generated statement.
const ALIAS: &str = "t";

/// LIMIT and OFFSET are bigint in PostgreSQL.
const BIGINT_MAX: u64 = i64::MAX as u64;

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified table name ("app.users" -> "app"."users").
fn qualified_table(table: &str) -> String {
    table.split('.').map(quoted).collect::<Vec<_>>().join(".")
}

fn column(name: &str) -> String {
    format!("{}.{}", ALIAS, quoted(name))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> String {
        self.params.push(v);
        format!("${}", self.params.len())
    }

    /// Binds a value, casting the column to text when the value is a string so that
    /// text input compares against any column type.
    fn push_operand(&mut self, name: &str, v: &Value) -> (String, String) {
        let lhs = if PgBindValue::from_json(v).is_text() {
            format!("{}::text", column(name))
        } else {
            column(name)
        };
        (lhs, self.push_param(v.clone()))
    }
}

fn invalid(c: &Condition, message: &str) -> StoreError {
    StoreError::InvalidCondition {
        column: c.column.clone(),
        message: message.to_string(),
    }
}

fn condition_sql(q: &mut QueryBuf, c: &Condition) -> Result<String, StoreError> {
    let op = c.operator;
    Ok(match op {
        Operator::IsNull | Operator::IsNotNull => format!("{} {}", column(&c.column), op),
        Operator::Equal | Operator::NotEqual if c.value.is_null() => {
            let null_op = if op == Operator::Equal { Operator::IsNull } else { Operator::IsNotNull };
            format!("{} {}", column(&c.column), null_op)
        }
        Operator::Like | Operator::NotLike => {
            let pattern = match &c.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let ph = q.push_param(Value::String(pattern));
            format!("{}::text {} {}", column(&c.column), op, ph)
        }
        Operator::In | Operator::NotIn => {
            let items = c.value.as_array().ok_or_else(|| invalid(c, "IN expects a list"))?;
            if items.is_empty() {
                return Ok(if op == Operator::In { "FALSE".into() } else { "TRUE".into() });
            }
            let any_text = items.iter().any(|v| v.is_string());
            let placeholders: Vec<String> = items
                .iter()
                .map(|v| {
                    let v = if any_text && !v.is_string() { Value::String(plain(v)) } else { v.clone() };
                    q.push_param(v)
                })
                .collect();
            let lhs = if any_text { format!("{}::text", column(&c.column)) } else { column(&c.column) };
            format!("{} {} ({})", lhs, op, placeholders.join(", "))
        }
        Operator::Between | Operator::NotBetween => {
            let bounds = c
                .value
                .as_array()
                .filter(|a| a.len() == 2)
                .ok_or_else(|| invalid(c, "BETWEEN expects two bounds"))?;
            let (lhs, low) = q.push_operand(&c.column, &bounds[0]);
            let high = q.push_param(bounds[1].clone());
            format!("{} {} {} AND {}", lhs, op, low, high)
        }
        Operator::Equal | Operator::NotEqual | Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let (lhs, ph) = q.push_operand(&c.column, &c.value);
            format!("{} {} {}", lhs, op, ph)
        }
    })
}

fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn where_clause(q: &mut QueryBuf, query: &Query) -> Result<String, StoreError> {
    let mut parts = Vec::with_capacity(query.conditions.len());
    for c in &query.conditions {
        parts.push(condition_sql(q, c)?);
    }
    Ok(if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    })
}

/// SELECT rows as JSONB with filters, caller orders, then ORDER BY id, optional LIMIT/OFFSET.
pub fn select_list(table: &str, query: &Query) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, query)?;
    let mut orders: Vec<String> = query
        .orders
        .iter()
        .map(|o| format!("{} {}", column(&o.column), o.direction.as_sql()))
        .collect();
    orders.push(format!("{} ASC", column(ID)));
    let limit_clause = query
        .limit
        .map(|n| format!(" LIMIT {}", n.min(BIGINT_MAX)))
        .unwrap_or_default();
    let offset_clause = query
        .offset
        .map(|n| format!(" OFFSET {}", n.min(BIGINT_MAX)))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT to_jsonb({alias}) FROM {} {alias}{} ORDER BY {}{}{}",
        qualified_table(table),
        where_sql,
        orders.join(", "),
        limit_clause,
        offset_clause,
        alias = ALIAS,
    );
    Ok(q)
}

/// SELECT COUNT(*) with filters; ordering and paging are ignored.
pub fn count(table: &str, query: &Query) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, query)?;
    q.sql = format!("SELECT COUNT(*) FROM {} {}{}", qualified_table(table), ALIAS, where_sql);
    Ok(q)
}

/// SELECT by primary key. Caller binds the id as `$1`.
pub fn select_by_id(table: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT to_jsonb({alias}) FROM {} {alias} WHERE {} = $1",
        qualified_table(table),
        column(ID),
        alias = ALIAS,
    );
    q
}

/// Upsert by id. The row is bound once as JSONB and expanded with `jsonb_populate_record`
/// so PostgreSQL converts each field to its column type. `created_at` is only written on
/// insert, `updated_at` on both paths, `deleted_at` never.
pub fn upsert(table: &str, row: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table_sql = qualified_table(table);
    let has_id = row.get(ID).map(|v| !v.is_null() && v.as_u64() != Some(0)).unwrap_or(false);
    let data_cols: Vec<&str> = row
        .keys()
        .map(String::as_str)
        .filter(|k| *k != ID && *k != CREATED_AT && *k != UPDATED_AT && *k != DELETED_AT)
        .collect();

    let mut insert_cols: Vec<String> = Vec::new();
    let mut select_exprs: Vec<String> = Vec::new();
    if has_id {
        insert_cols.push(quoted(ID));
        select_exprs.push(format!("r.{}", quoted(ID)));
    }
    for c in &data_cols {
        insert_cols.push(quoted(c));
        select_exprs.push(format!("r.{}", quoted(c)));
    }
    insert_cols.push(quoted(CREATED_AT));
    insert_cols.push(quoted(UPDATED_AT));
    select_exprs.push("NOW()".into());
    select_exprs.push("NOW()".into());

    let ph = q.push_param(Value::Object(row.clone()));
    let on_conflict = if has_id {
        let mut sets: Vec<String> = data_cols
            .iter()
            .map(|c| format!("{col} = EXCLUDED.{col}", col = quoted(c)))
            .collect();
        sets.push(format!("{} = NOW()", quoted(UPDATED_AT)));
        format!(" ON CONFLICT ({}) DO UPDATE SET {}", quoted(ID), sets.join(", "))
    } else {
        String::new()
    };
    q.sql = format!(
        "INSERT INTO {table} AS {alias} ({}) SELECT {} FROM jsonb_populate_record(NULL::{table}, {ph}) r{} RETURNING to_jsonb({alias})",
        insert_cols.join(", "),
        select_exprs.join(", "),
        on_conflict,
        table = table_sql,
        alias = ALIAS,
        ph = ph,
    );
    q
}

/// DELETE by id. Caller binds the id as `$1`.
pub fn delete(table: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("DELETE FROM {} WHERE {} = $1", qualified_table(table), quoted(ID));
    q
}

/// Set the deletion marker on a row not yet marked. Caller binds id `$1` and RFC 3339 time `$2`.
pub fn mark_deleted(table: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "UPDATE {} SET {del} = $2::timestamptz WHERE {} = $1 AND {del} IS NULL",
        qualified_table(table),
        quoted(ID),
        del = quoted(DELETED_AT),
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::query::Direction;
    use serde_json::json;

    #[test]
    fn list_appends_id_tiebreaker_and_paging() {
        let query = Query::new()
            .filter("age", Operator::Gte, json!(10))
            .order_by("created_at", Direction::Desc)
            .offset(10)
            .limit(10);
        let q = select_list("users", &query).unwrap();
        assert_eq!(
            q.sql,
            "SELECT to_jsonb(t) FROM \"users\" t WHERE t.\"age\" >= $1 ORDER BY t.\"created_at\" DESC, t.\"id\" ASC LIMIT 10 OFFSET 10"
        );
        assert_eq!(q.params, vec![json!(10)]);
    }

    #[test]
    fn paging_is_clamped_to_bigint() {
        let query = Query::new().offset(u64::MAX).limit(u64::MAX);
        let q = select_list("users", &query).unwrap();
        assert!(q
            .sql
            .ends_with("LIMIT 9223372036854775807 OFFSET 9223372036854775807"));
    }

    #[test]
    fn string_operands_compare_as_text() {
        let query = Query::new()
            .filter("name", Operator::Equal, json!("bob"))
            .filter("id", Operator::In, json!(["1", 3]))
            .filter("name", Operator::Like, json!("%te%"));
        let q = count("app.users", &query).unwrap();
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"app\".\"users\" t WHERE t.\"name\"::text = $1 AND t.\"id\"::text IN ($2, $3) AND t.\"name\"::text LIKE $4"
        );
        assert_eq!(q.params, vec![json!("bob"), json!("1"), json!("3"), json!("%te%")]);
    }

    #[test]
    fn null_and_empty_list_shortcuts() {
        let query = Query::new()
            .filter("deleted_at", Operator::Equal, Value::Null)
            .filter("id", Operator::In, json!([]))
            .is_not_null("name");
        let q = count("users", &query).unwrap();
        assert!(q.sql.ends_with("WHERE t.\"deleted_at\" IS NULL AND FALSE AND t.\"name\" IS NOT NULL"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn malformed_between_is_rejected() {
        let query = Query::new().filter("age", Operator::Between, json!([1]));
        assert!(matches!(
            select_list("users", &query),
            Err(StoreError::InvalidCondition { .. })
        ));
        let query = Query::new().filter("age", Operator::Between, json!([1, 5]));
        let q = select_list("users", &query).unwrap();
        assert!(q.sql.contains("t.\"age\" BETWEEN $1 AND $2"));
    }

    #[test]
    fn upsert_with_id_updates_on_conflict() {
        let row = json!({"id": 3, "name": "a", "created_at": null, "updated_at": null, "deleted_at": null});
        let q = upsert("users", row.as_object().unwrap());
        assert!(q.sql.starts_with("INSERT INTO \"users\" AS t (\"id\", \"name\", \"created_at\", \"updated_at\")"));
        assert!(q.sql.contains("jsonb_populate_record(NULL::\"users\", $1) r"));
        assert!(q.sql.contains("ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\", \"updated_at\" = NOW()"));
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn upsert_without_id_is_plain_insert() {
        let row = json!({"id": 0, "name": "a"});
        let q = upsert("users", row.as_object().unwrap());
        assert!(q.sql.starts_with("INSERT INTO \"users\" AS t (\"name\", \"created_at\", \"updated_at\")"));
        assert!(!q.sql.contains("ON CONFLICT"));
    }

    #[test]
    fn soft_delete_only_touches_live_rows() {
        let q = mark_deleted("users");
        assert_eq!(
            q.sql,
            "UPDATE \"users\" SET \"deleted_at\" = $2::timestamptz WHERE \"id\" = $1 AND \"deleted_at\" IS NULL"
        );
    }
}
