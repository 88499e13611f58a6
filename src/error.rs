//! Typed errors and their outcome mapping.

use crate::coder::Outcome;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid page policy: {0}")]
    PagePolicy(String),
    #[error("invalid setting {key}: {message}")]
    Setting { key: &'static str, message: String },
}

/// Failures reported by a [`Store`](crate::store::Store) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("row encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no such column: {0}")]
    UnknownColumn(String),
    #[error("invalid condition on {column}: {message}")]
    InvalidCondition { column: String, message: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("id {0} is out of range")]
    IdOutOfRange(u64),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Failures of [`CrudClient`](crate::client::CrudClient) calls.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("base url is required")]
    BaseUrlRequired,
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("status code {status}: {message}")]
    Status { status: u16, message: String },
    #[error("{message}")]
    Api { code: String, message: String },
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CrudError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    MethodNotAllowed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Hook(String),
}

impl CrudError {
    pub fn outcome(&self) -> Outcome {
        match self {
            CrudError::BadRequest(_) => Outcome::BadRequest,
            CrudError::NotFound(_) => Outcome::NotFound,
            CrudError::Conflict(_) => Outcome::Conflict,
            CrudError::MethodNotAllowed(_) => Outcome::MethodNotAllowed,
            CrudError::Store(StoreError::Conflict(_)) => Outcome::Conflict,
            CrudError::Store(StoreError::IdOutOfRange(_)) => Outcome::BadRequest,
            CrudError::Store(_) | CrudError::Hook(_) => Outcome::InternalError,
        }
    }
}

impl From<serde_json::Error> for CrudError {
    fn from(e: serde_json::Error) -> Self {
        CrudError::Store(StoreError::Json(e))
    }
}
