//! Request context handed to hooks, and the hook slot types.

use super::Saved;
use crate::coder::Outcome;
use crate::config::PageRequest;
use crate::error::{CrudError, StoreError};
use crate::record::{RecordId, ID};
use crate::response::Responder;
use crate::search::QueryParams;
use crate::sql::Query;
use crate::store::Store;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// What a pipeline step knows about the request being served.
pub struct HookContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Named path parameters, e.g. `id`, `page_num`.
    pub path: HashMap<String, String>,
    pub params: QueryParams,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) responder: Responder,
    pub(crate) table: &'static str,
}

impl HookContext {
    /// The `:id` path parameter as a record id.
    pub fn record_id(&self) -> Result<RecordId, CrudError> {
        match self.path.get(ID).map(|s| s.trim()) {
            None | Some("") => Err(CrudError::BadRequest("empty ID".into())),
            Some(raw) => raw
                .parse()
                .map_err(|_| CrudError::BadRequest(format!("invalid ID: {}", raw))),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    /// Abort with an error envelope for `outcome`.
    pub fn reject(&self, outcome: Outcome, message: impl Into<String>) -> Abort {
        let message = message.into();
        let data = Value::String(message.clone());
        Abort::Respond(self.responder.error(outcome, message, data))
    }
}

/// Stops a pipeline before it responds normally.
pub enum Abort {
    /// The response has already been written.
    Respond(Response),
    /// Turned into an error envelope by the pipeline.
    Fail(CrudError),
}

impl Abort {
    pub(crate) fn into_response(self, responder: &Responder) -> Response {
        match self {
            Abort::Respond(response) => response,
            Abort::Fail(err) => responder.from_error(&err),
        }
    }
}

impl From<CrudError> for Abort {
    fn from(e: CrudError) -> Self {
        Abort::Fail(e)
    }
}

impl From<StoreError> for Abort {
    fn from(e: StoreError) -> Self {
        Abort::Fail(e.into())
    }
}

impl From<serde_json::Error> for Abort {
    fn from(e: serde_json::Error) -> Self {
        Abort::Fail(e.into())
    }
}

impl std::fmt::Debug for Abort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Abort::Respond(r) => f.debug_tuple("Respond").field(&r.status()).finish(),
            Abort::Fail(e) => f.debug_tuple("Fail").field(e).finish(),
        }
    }
}

/// A stored hook: takes the context and a value, returns the (possibly replaced) value.
pub type Hook<I, O = I> =
    Arc<dyn Fn(Arc<HookContext>, I) -> BoxFuture<'static, Result<O, Abort>> + Send + Sync>;

/// Decides how a record is deleted; returns whether a row changed.
pub type DeleteStrategy =
    Arc<dyn Fn(Arc<HookContext>) -> BoxFuture<'static, Result<bool, Abort>> + Send + Sync>;

pub(crate) fn hook<I, O, F, Fut>(f: F) -> Hook<I, O>
where
    I: Send + 'static,
    F: Fn(Arc<HookContext>, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, Abort>> + Send + 'static,
{
    Arc::new(move |ctx: Arc<HookContext>, input: I| f(ctx, input).boxed())
}

/// Zero-or-one hook per slot.
pub struct Hooks<T> {
    pub will_list: Option<Hook<Query>>,
    pub did_list: Option<Hook<Vec<T>>>,
    pub will_get_one: Option<Hook<()>>,
    pub did_get_one: Option<Hook<T>>,
    pub will_page: Option<Hook<(PageRequest, Query), Query>>,
    pub did_page: Option<Hook<(PageRequest, Vec<T>), Vec<T>>>,
    pub will_count: Option<Hook<Query>>,
    pub did_count: Option<Hook<u64>>,
    pub will_save: Option<Hook<T>>,
    pub did_save: Option<Hook<Saved<T>>>,
    pub will_delete: Option<Hook<()>>,
    pub did_delete: Option<Hook<bool>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Hooks {
            will_list: None,
            did_list: None,
            will_get_one: None,
            did_get_one: None,
            will_page: None,
            did_page: None,
            will_count: None,
            did_count: None,
            will_save: None,
            did_save: None,
            will_delete: None,
            did_delete: None,
        }
    }
}

/// Runs `slot` if present, else passes `input` through.
pub(crate) async fn run<I>(slot: &Option<Hook<I>>, ctx: &Arc<HookContext>, input: I) -> Result<I, Abort> {
    match slot {
        Some(h) => h(ctx.clone(), input).await,
        None => Ok(input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::ZeroOkCoder;
    use crate::response::StatusPolicy;
    use crate::store::MemoryStore;

    fn context(path: &[(&str, &str)]) -> HookContext {
        HookContext {
            method: Method::GET,
            uri: Uri::from_static("/users/one/1"),
            headers: HeaderMap::new(),
            path: path.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            params: QueryParams::new(),
            store: Arc::new(MemoryStore::new()),
            responder: Responder::new(Arc::new(ZeroOkCoder), StatusPolicy::Envelope),
            table: "users",
        }
    }

    #[test]
    fn record_id_requires_a_number() {
        assert_eq!(context(&[("id", "42")]).record_id().unwrap(), 42);
        assert!(matches!(context(&[]).record_id(), Err(CrudError::BadRequest(_))));
        assert!(matches!(context(&[("id", "")]).record_id(), Err(CrudError::BadRequest(_))));
        assert!(matches!(context(&[("id", "abc")]).record_id(), Err(CrudError::BadRequest(_))));
        assert!(matches!(context(&[("id", "-1")]).record_id(), Err(CrudError::BadRequest(_))));
    }

    #[tokio::test]
    async fn empty_slot_passes_input_through() {
        let ctx = Arc::new(context(&[]));
        let slot: Option<Hook<u64>> = None;
        assert_eq!(run(&slot, &ctx, 7).await.unwrap(), 7);
        let slot: Option<Hook<u64>> = Some(hook(|_, n: u64| async move { Ok(n * 2) }));
        assert_eq!(run(&slot, &ctx, 7).await.unwrap(), 14);
    }
}
