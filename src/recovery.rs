//! Converts handler panics into internal-error envelopes.

use crate::coder::Outcome;
use crate::response::{Responder, DEFAULT_ERROR_MESSAGE};
use axum::{body::Body, http::Response};
use serde_json::Value;
use std::any::Any;
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};

#[derive(Clone)]
pub struct PanicEnvelope {
    responder: Responder,
    expose_panic: bool,
}

fn panic_message(err: &(dyn Any + Send)) -> Option<String> {
    if let Some(s) = err.downcast_ref::<String>() {
        Some(s.clone())
    } else {
        err.downcast_ref::<&str>().map(|s| s.to_string())
    }
}

impl ResponseForPanic for PanicEnvelope {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Self::ResponseBody> {
        let detail = panic_message(err.as_ref()).unwrap_or_else(|| "unknown panic".into());
        tracing::error!(panic = %detail, "handler panicked");
        let (message, data) = if self.expose_panic {
            (detail.clone(), Value::String(detail))
        } else {
            (DEFAULT_ERROR_MESSAGE.to_string(), Value::Null)
        };
        self.responder.error(Outcome::InternalError, message, data)
    }
}

/// Layer that answers a panicking request with an internal-error envelope. The panic
/// payload is echoed only when `expose_panic` is set.
pub fn recovery_layer(responder: Responder, expose_panic: bool) -> CatchPanicLayer<PanicEnvelope> {
    CatchPanicLayer::custom(PanicEnvelope {
        responder,
        expose_panic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::HttpStatusCoder;
    use crate::response::StatusPolicy;
    use axum::{http::Request, routing::get, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn panicking() -> &'static str {
        panic!("boom")
    }

    async fn call(expose_panic: bool) -> Value {
        let responder = Responder::new(Arc::new(HttpStatusCoder), StatusPolicy::Envelope);
        let app = Router::new()
            .route("/", get(panicking))
            .layer(recovery_layer(responder, expose_panic));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn panic_becomes_internal_error_envelope() {
        let body = call(false).await;
        assert_eq!(body["c"], "500");
        assert_eq!(body["m"], DEFAULT_ERROR_MESSAGE);
        assert_eq!(body["d"], Value::Null);
    }

    #[tokio::test]
    async fn panic_payload_is_echoed_when_exposed() {
        let body = call(true).await;
        assert_eq!(body["m"], "boom");
        assert_eq!(body["d"], "boom");
    }
}
