//! PostgreSQL store: compiles queries with the SQL builder and executes them with sqlx.

use crate::error::StoreError;
use crate::record::{RecordId, ID, MAX_ID};
use crate::sql::{self, PgBindValue, Query, QueryBuf};
use crate::store::{Row, SavedRow, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn query_rows(&self, q: &QueryBuf) -> Result<Vec<Row>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows: Vec<Value> = bind_all(sqlx::query_scalar(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().filter_map(into_row).collect())
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let result = query.execute(&self.pool).await.map_err(map_db_error)?;
        Ok(result.rows_affected())
    }
}

fn bind_all<'q, O>(
    mut query: sqlx::query::QueryScalar<'q, sqlx::Postgres, O, PgArguments>,
    params: &[Value],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, O, PgArguments> {
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

fn into_row(v: Value) -> Option<Row> {
    match v {
        Value::Object(m) => Some(m),
        _ => None,
    }
}

fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Db(e)
}

fn id_param(id: RecordId) -> Value {
    Value::from(id)
}

#[async_trait]
impl Store for PgStore {
    async fn find(&self, table: &str, query: &Query) -> Result<Vec<Row>, StoreError> {
        let q = sql::select_list(table, query)?;
        self.query_rows(&q).await
    }

    async fn find_by_id(&self, table: &str, id: RecordId) -> Result<Option<Row>, StoreError> {
        let mut q = sql::select_by_id(table);
        q.params.push(id_param(id));
        Ok(self.query_rows(&q).await?.into_iter().next())
    }

    async fn count(&self, table: &str, query: &Query) -> Result<u64, StoreError> {
        let q = sql::count(table, query)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let n: i64 = bind_all(sqlx::query_scalar(&q.sql), &q.params)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(n.max(0) as u64)
    }

    async fn save(&self, table: &str, row: Row) -> Result<SavedRow, StoreError> {
        if let Some(id) = row.get(ID).and_then(Value::as_u64).filter(|id| *id > MAX_ID) {
            return Err(StoreError::IdOutOfRange(id));
        }
        let q = sql::upsert(table, &row);
        let mut rows = self.query_rows(&q).await?;
        Ok(match rows.pop() {
            Some(saved) => SavedRow {
                row: saved,
                rows_affected: 1,
            },
            None => SavedRow { row, rows_affected: 0 },
        })
    }

    async fn delete(&self, table: &str, id: RecordId) -> Result<u64, StoreError> {
        let mut q = sql::delete(table);
        q.params.push(id_param(id));
        self.execute(&q).await
    }

    async fn mark_deleted(&self, table: &str, id: RecordId, at: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut q = sql::mark_deleted(table);
        q.params.push(id_param(id));
        q.params.push(Value::String(at.to_rfc3339()));
        self.execute(&q).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Create the database named in `database_url` if it does not exist, connecting through
/// the `postgres` maintenance database.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url);
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> (String, String) {
    let path_start = url.rfind('/').map(|i| i + 1).unwrap_or(url.len());
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    (format!("{}postgres", base), db_name.to_string())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
