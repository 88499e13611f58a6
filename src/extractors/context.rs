//! Builds a [`HookContext`] from request parts.

use crate::coder::Outcome;
use crate::pipeline::HookContext;
use crate::record::Record;
use crate::search::QueryParams;
use crate::state::CrudState;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query},
    http::request::Parts,
    response::Response,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Query parameters in request order, repeated keys kept.
pub fn query_params(parts: &Parts) -> Result<QueryParams, String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
        .map_err(|e| e.body_text())?;
    Ok(pairs.into_iter().collect())
}

#[async_trait]
impl<T> FromRequestParts<Arc<CrudState<T>>> for HookContext
where
    T: Record,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<CrudState<T>>) -> Result<Self, Self::Rejection> {
        let responder = state.options.responder.clone();
        // Routes without parameters have no path map to extract.
        let path = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map(|Path(p)| p)
            .unwrap_or_default();
        let params = query_params(parts).map_err(|message| {
            let data = Value::String(message.clone());
            responder.error(Outcome::BadRequest, message, data)
        })?;
        Ok(HookContext {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            path,
            params,
            store: state.store.clone(),
            responder,
            table: T::TABLE,
        })
    }
}
