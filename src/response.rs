//! Standard response envelope and the responder that writes it.

use crate::coder::{Code, Coder, Outcome};
use crate::error::CrudError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_ERROR_MESSAGE: &str = "Internal Server Error";

/// `{c, m, d}` body of every response, success or failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "c")]
    pub code: Code,
    #[serde(rename = "m")]
    pub message: String,
    #[serde(rename = "d")]
    pub data: T,
}

/// Transport status used to carry an envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Every envelope rides on 200; the outcome lives in `c` only.
    #[default]
    Envelope,
    /// Error envelopes carry the outcome's HTTP status.
    Reflect,
}

/// Turns a finished envelope into an HTTP response. Both methods default to a JSON body;
/// override either to change how successes or failures are written.
pub trait ResponseWriter: Send + Sync + 'static {
    fn write_ok(&self, envelope: Envelope<Value>) -> Response {
        (StatusCode::OK, Json(envelope)).into_response()
    }

    fn write_error(&self, status: StatusCode, envelope: Envelope<Value>) -> Response {
        (status, Json(envelope)).into_response()
    }
}

/// Plain JSON envelopes.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonWriter;

impl ResponseWriter for JsonWriter {}

/// Writes envelopes using one coder, one status policy and one writer.
#[derive(Clone)]
pub struct Responder {
    coder: Arc<dyn Coder>,
    policy: StatusPolicy,
    writer: Arc<dyn ResponseWriter>,
}

impl Responder {
    pub fn new(coder: Arc<dyn Coder>, policy: StatusPolicy) -> Self {
        Responder {
            coder,
            policy,
            writer: Arc::new(JsonWriter),
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn ResponseWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn coder(&self) -> &dyn Coder {
        self.coder.as_ref()
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    pub fn ok<T: Serialize>(&self, data: T) -> Response {
        match serde_json::to_value(data) {
            Ok(data) => self.writer.write_ok(Envelope {
                code: self.coder.ok(),
                message: String::new(),
                data,
            }),
            Err(e) => self.from_error(&CrudError::from(e)),
        }
    }

    /// Error envelope; an empty message falls back to [`DEFAULT_ERROR_MESSAGE`].
    pub fn error(&self, outcome: Outcome, message: impl Into<String>, data: Value) -> Response {
        let mut message = message.into();
        if message.is_empty() {
            message = DEFAULT_ERROR_MESSAGE.to_string();
        }
        let status = match self.policy {
            StatusPolicy::Envelope => StatusCode::OK,
            StatusPolicy::Reflect => outcome.status(),
        };
        self.writer.write_error(
            status,
            Envelope {
                code: self.coder.code(outcome),
                message,
                data,
            },
        )
    }

    pub fn from_error(&self, err: &CrudError) -> Response {
        let outcome = err.outcome();
        let message = err.to_string();
        if outcome == Outcome::InternalError {
            tracing::error!(error = %message, "request failed");
        } else {
            tracing::warn!(error = %message, ?outcome, "request rejected");
        }
        self.error(outcome, message.clone(), Value::String(message))
    }
}
