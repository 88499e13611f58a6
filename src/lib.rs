//! rest-crud: generic CRUD route generator for axum with declarative search filters,
//! lifecycle hooks and a uniform `{c, m, d}` response envelope.

pub mod client;
pub mod coder;
pub mod config;
pub mod error;
pub mod extractors;
pub mod pipeline;
pub mod record;
pub mod recovery;
pub mod response;
pub mod routes;
pub mod search;
pub mod sql;
pub mod state;
pub mod store;

pub use client::CrudClient;
pub use coder::{Code, Coder, HttpStatusCoder, Outcome, ZeroOkCoder};
pub use config::{init_tracing, PagePolicy, PageRequest, ServerSettings};
pub use error::{ClientError, ConfigError, CrudError, StoreError};
pub use pipeline::{
    hard_delete, soft_delete, Abort, Crud, CrudBuilder, CrudOptions, DeleteStrategy, HookContext, Operation,
    Operations, Saved,
};
pub use record::{Base, Record, RecordId, MAX_ID};
pub use recovery::recovery_layer;
pub use response::{Envelope, JsonWriter, Responder, ResponseWriter, StatusPolicy, DEFAULT_ERROR_MESSAGE};
pub use routes::{common_routes, crud_routes};
pub use search::{QueryParams, SearchHandler, SearchHandlers};
pub use sql::{Direction, Operator, Query};
pub use state::CrudState;
pub use store::{ensure_database_exists, MemoryStore, PgStore, Row, SavedRow, Store};
