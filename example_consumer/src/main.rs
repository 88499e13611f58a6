//! Demo server: a `users` resource over PostgreSQL.
//!
//! Run from repo root: `cargo run -p example-consumer`
//!
//! ```text
//! curl -X PUT localhost:3000/users -H 'content-type: application/json' -d '{"name":"test1","age":10}'
//! curl 'localhost:3000/users/page/1/10?age_gte=10&sort=desc'
//! curl 'localhost:3000/users/count?deleted=false'
//! curl -X DELETE localhost:3000/users/1
//! ```

use axum::Router;
use rest_crud::search::{keyword_id_in, keyword_in_with, keyword_like, keyword_statement, soft_delete_filter, sort_by};
use rest_crud::search::transform::{numeric_validate, trim_overflow};
use rest_crud::{
    common_routes, crud_routes, ensure_database_exists, init_tracing, recovery_layer, Base, Crud, Operation,
    Operator, Outcome, PgStore, Record, RecordId, ServerSettings, Store,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct User {
    #[serde(flatten)]
    base: Base,
    name: String,
    age: i32,
}

impl Record for User {
    const TABLE: &'static str = "users";

    fn id(&self) -> RecordId {
        self.base.id
    }
}

const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    age INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ
)"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = ServerSettings::from_env()?;
    init_tracing("rest_crud=info,example_consumer=info");

    ensure_database_exists(&settings.database_url).await?;
    let pg = PgStore::connect(&settings.database_url, settings.max_connections).await?;
    sqlx::query(CREATE_USERS).execute(pg.pool()).await?;
    let store: Arc<dyn Store> = Arc::new(pg);

    let users = Crud::<User>::builder(store.clone())
        .enable(Operation::List)
        .status_policy(settings.status_policy)
        .search("name", keyword_like("name"))
        .search("age_gte", keyword_statement("age", Operator::Gte, numeric_validate))
        .search("ids", keyword_id_in("id"))
        .search("names", keyword_in_with("name", trim_overflow(20)))
        .search("sort", sort_by("created_at"))
        .search("deleted", soft_delete_filter())
        .will_save(|ctx, user: User| async move {
            if user.name == "freak" {
                return Err(ctx.reject(Outcome::BadRequest, "name not allowed"));
            }
            Ok(user)
        })
        .soft_delete()
        .build()?;

    let app = Router::new()
        .merge(common_routes(store))
        .merge(crud_routes("/users", &users))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(recovery_layer(users.responder().clone(), settings.expose_panics));

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
