//! Outcome-to-wire-code mapping.
//!
//! The pipeline never writes status strings itself; it asks the configured [`Coder`] for
//! the code of an [`Outcome`]. Deployments swap codebooks by passing a different coder to
//! [`CrudBuilder::coder`](crate::pipeline::CrudBuilder::coder).

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque response code carried in the `c` field of every envelope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(pub String);

impl Code {
    pub fn new(code: impl Into<String>) -> Self {
        Code(code.into())
    }

    pub fn from_status(status: StatusCode) -> Self {
        Code(status.as_u16().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Abstract result category of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Ok,
    BadRequest,
    NotFound,
    Conflict,
    MethodNotAllowed,
    InternalError,
}

impl Outcome {
    /// HTTP status conventionally associated with the outcome.
    pub fn status(self) -> StatusCode {
        match self {
            Outcome::Ok => StatusCode::OK,
            Outcome::BadRequest => StatusCode::BAD_REQUEST,
            Outcome::NotFound => StatusCode::NOT_FOUND,
            Outcome::Conflict => StatusCode::CONFLICT,
            Outcome::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Outcome::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub trait Coder: Send + Sync + 'static {
    fn ok(&self) -> Code;

    fn bad_request(&self) -> Code {
        Code::from_status(StatusCode::BAD_REQUEST)
    }

    fn not_found(&self) -> Code {
        Code::from_status(StatusCode::NOT_FOUND)
    }

    fn conflict(&self) -> Code {
        Code::from_status(StatusCode::CONFLICT)
    }

    fn method_not_allowed(&self) -> Code {
        Code::from_status(StatusCode::METHOD_NOT_ALLOWED)
    }

    fn internal_server_error(&self) -> Code {
        Code::from_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn code(&self, outcome: Outcome) -> Code {
        match outcome {
            Outcome::Ok => self.ok(),
            Outcome::BadRequest => self.bad_request(),
            Outcome::NotFound => self.not_found(),
            Outcome::Conflict => self.conflict(),
            Outcome::MethodNotAllowed => self.method_not_allowed(),
            Outcome::InternalError => self.internal_server_error(),
        }
    }
}

/// REST-flavored codebook: every outcome is its HTTP status number ("200", "404", ...).
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpStatusCoder;

impl Coder for HttpStatusCoder {
    fn ok(&self) -> Code {
        Code::from_status(StatusCode::OK)
    }
}

/// Sentinel codebook: "0" for success, HTTP status numbers for errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroOkCoder;

impl Coder for ZeroOkCoder {
    fn ok(&self) -> Code {
        Code::new("0")
    }
}
