//! CRUD pipeline: configuration, hook registration and the generated router.
//!
//! ```rust,ignore
//! let users = Crud::<User>::builder(store)
//!     .search("name", keyword_like("name"))
//!     .search("age_gte", keyword_statement("age", Operator::Gte, numeric_validate))
//!     .will_save(|ctx, user: User| async move {
//!         if user.name == "freak" {
//!             return Err(ctx.reject(Outcome::BadRequest, "name not allowed"));
//!         }
//!         Ok(user)
//!     })
//!     .soft_delete()
//!     .build()?;
//! let app = crud_routes("/users", &users);
//! ```

pub mod delete;
pub mod hooks;
mod ops;

pub use delete::{hard_delete, soft_delete};
pub use hooks::{Abort, DeleteStrategy, Hook, HookContext, Hooks};

use crate::coder::{Coder, ZeroOkCoder};
use crate::config::{PagePolicy, PageRequest};
use crate::error::ConfigError;
use crate::record::Record;
use crate::response::{JsonWriter, Responder, ResponseWriter, StatusPolicy};
use crate::search::{SearchHandler, SearchHandlers};
use crate::sql::Query;
use crate::state::CrudState;
use crate::store::Store;
use axum::routing::{delete as delete_route, get, put};
use axum::Router;
use hooks::hook;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::future::Future;
use std::sync::Arc;

/// Payload of a save: the stored record, or `false` when the store changed nothing.
#[derive(Clone, Debug, PartialEq)]
pub enum Saved<T> {
    Record(T),
    Unchanged,
}

impl<T: Serialize> Serialize for Saved<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Saved::Record(record) => record.serialize(serializer),
            Saved::Unchanged => serializer.serialize_bool(false),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Saved<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Bool(false) => Ok(Saved::Unchanged),
            value => serde_json::from_value(value).map(Saved::Record).map_err(D::Error::custom),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Page,
    Count,
    GetOne,
    Save,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Page,
        Operation::List,
        Operation::Count,
        Operation::GetOne,
        Operation::Save,
        Operation::Delete,
    ];

    /// Method and route path relative to the entity prefix.
    pub fn route(self) -> (&'static str, &'static str) {
        match self {
            Operation::List => ("GET", "/all"),
            Operation::Page => ("GET", "/page/:page_num/:page_size"),
            Operation::Count => ("GET", "/count"),
            Operation::GetOne => ("GET", "/one/:id"),
            Operation::Save => ("PUT", "/"),
            Operation::Delete => ("DELETE", "/:id"),
        }
    }
}

/// Which operations get a route. List is off by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operations {
    pub list: bool,
    pub page: bool,
    pub count: bool,
    pub get_one: bool,
    pub save: bool,
    pub delete: bool,
}

impl Default for Operations {
    fn default() -> Self {
        Operations {
            list: false,
            page: true,
            count: true,
            get_one: true,
            save: true,
            delete: true,
        }
    }
}

impl Operations {
    pub fn is_enabled(&self, op: Operation) -> bool {
        match op {
            Operation::List => self.list,
            Operation::Page => self.page,
            Operation::Count => self.count,
            Operation::GetOne => self.get_one,
            Operation::Save => self.save,
            Operation::Delete => self.delete,
        }
    }

    pub fn set(&mut self, op: Operation, enabled: bool) {
        let flag = match op {
            Operation::List => &mut self.list,
            Operation::Page => &mut self.page,
            Operation::Count => &mut self.count,
            Operation::GetOne => &mut self.get_one,
            Operation::Save => &mut self.save,
            Operation::Delete => &mut self.delete,
        };
        *flag = enabled;
    }

    pub fn enabled(&self) -> impl Iterator<Item = Operation> + '_ {
        Operation::ALL.into_iter().filter(|op| self.is_enabled(*op))
    }
}

/// Frozen pipeline configuration.
pub struct CrudOptions<T> {
    pub page: PagePolicy,
    pub operations: Operations,
    pub searches: SearchHandlers,
    pub hooks: Hooks<T>,
    pub delete: DeleteStrategy,
    pub responder: Responder,
}

pub struct CrudBuilder<T: Record> {
    store: Arc<dyn Store>,
    page: PagePolicy,
    operations: Operations,
    searches: SearchHandlers,
    hooks: Hooks<T>,
    delete: DeleteStrategy,
    coder: Arc<dyn Coder>,
    status_policy: StatusPolicy,
    writer: Arc<dyn ResponseWriter>,
}

impl<T: Record> CrudBuilder<T> {
    pub fn new(store: Arc<dyn Store>) -> Self {
        CrudBuilder {
            store,
            page: PagePolicy::default(),
            operations: Operations::default(),
            searches: SearchHandlers::new(),
            hooks: Hooks::default(),
            delete: hard_delete(),
            coder: Arc::new(ZeroOkCoder),
            status_policy: StatusPolicy::default(),
            writer: Arc::new(JsonWriter),
        }
    }

    pub fn page_policy(mut self, page: PagePolicy) -> Self {
        self.page = page;
        self
    }

    pub fn operations(mut self, operations: Operations) -> Self {
        self.operations = operations;
        self
    }

    pub fn enable(mut self, op: Operation) -> Self {
        self.operations.set(op, true);
        self
    }

    pub fn disable(mut self, op: Operation) -> Self {
        self.operations.set(op, false);
        self
    }

    /// Registers `handler` for query parameter `key`, replacing any previous one.
    pub fn search(mut self, key: impl Into<String>, handler: SearchHandler) -> Self {
        self.searches.insert(key.into(), handler);
        self
    }

    pub fn coder(mut self, coder: impl Coder) -> Self {
        self.coder = Arc::new(coder);
        self
    }

    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    /// Replaces how success and error envelopes are written to the response.
    pub fn writer(mut self, writer: impl ResponseWriter) -> Self {
        self.writer = Arc::new(writer);
        self
    }

    pub fn delete_strategy(mut self, strategy: DeleteStrategy) -> Self {
        self.delete = strategy;
        self
    }

    pub fn soft_delete(self) -> Self {
        self.delete_strategy(soft_delete())
    }

    pub fn will_list<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, Query) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Query, Abort>> + Send + 'static,
    {
        self.hooks.will_list = Some(hook(f));
        self
    }

    pub fn did_list<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, Abort>> + Send + 'static,
    {
        self.hooks.did_list = Some(hook(f));
        self
    }

    pub fn will_get_one<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Abort>> + Send + 'static,
    {
        self.hooks.will_get_one = Some(hook(move |ctx, ()| f(ctx)));
        self
    }

    pub fn did_get_one<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Abort>> + Send + 'static,
    {
        self.hooks.did_get_one = Some(hook(f));
        self
    }

    /// Runs after the page's offset and limit are set on the query.
    pub fn will_page<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, PageRequest, Query) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Query, Abort>> + Send + 'static,
    {
        self.hooks.will_page = Some(hook(move |ctx, (page, query)| f(ctx, page, query)));
        self
    }

    pub fn did_page<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, PageRequest, Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, Abort>> + Send + 'static,
    {
        self.hooks.did_page = Some(hook(move |ctx, (page, records)| f(ctx, page, records)));
        self
    }

    pub fn will_count<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, Query) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Query, Abort>> + Send + 'static,
    {
        self.hooks.will_count = Some(hook(f));
        self
    }

    pub fn did_count<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, u64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<u64, Abort>> + Send + 'static,
    {
        self.hooks.did_count = Some(hook(f));
        self
    }

    pub fn will_save<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Abort>> + Send + 'static,
    {
        self.hooks.will_save = Some(hook(f));
        self
    }

    pub fn did_save<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, Saved<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Saved<T>, Abort>> + Send + 'static,
    {
        self.hooks.did_save = Some(hook(f));
        self
    }

    pub fn will_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Abort>> + Send + 'static,
    {
        self.hooks.will_delete = Some(hook(move |ctx, ()| f(ctx)));
        self
    }

    pub fn did_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<HookContext>, bool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, Abort>> + Send + 'static,
    {
        self.hooks.did_delete = Some(hook(f));
        self
    }

    pub fn build(self) -> Result<Crud<T>, ConfigError> {
        self.page.validate()?;
        let options = CrudOptions {
            page: self.page,
            operations: self.operations,
            searches: self.searches,
            hooks: self.hooks,
            delete: self.delete,
            responder: Responder::new(self.coder, self.status_policy).with_writer(self.writer),
        };
        Ok(Crud {
            state: Arc::new(CrudState {
                store: self.store,
                options,
            }),
        })
    }
}

/// A configured pipeline for one record type.
pub struct Crud<T: Record> {
    state: Arc<CrudState<T>>,
}

impl<T: Record> Clone for Crud<T> {
    fn clone(&self) -> Self {
        Crud {
            state: self.state.clone(),
        }
    }
}

impl<T: Record> Crud<T> {
    pub fn builder(store: Arc<dyn Store>) -> CrudBuilder<T> {
        CrudBuilder::new(store)
    }

    pub fn state(&self) -> &Arc<CrudState<T>> {
        &self.state
    }

    pub fn responder(&self) -> &Responder {
        &self.state.options.responder
    }

    /// Routes for the enabled operations, relative to the entity prefix.
    pub fn router(&self) -> Router {
        let enabled = self.state.options.operations;
        let mut router = Router::new();
        if enabled.page {
            router = router.route(Operation::Page.route().1, get(ops::page::<T>));
        }
        if enabled.list {
            router = router.route(Operation::List.route().1, get(ops::list::<T>));
        }
        if enabled.count {
            router = router.route(Operation::Count.route().1, get(ops::count::<T>));
        }
        if enabled.get_one {
            router = router.route(Operation::GetOne.route().1, get(ops::get_one::<T>));
        }
        if enabled.save {
            router = router.route(Operation::Save.route().1, put(ops::save::<T>));
        }
        if enabled.delete {
            router = router.route(Operation::Delete.route().1, delete_route(ops::delete::<T>));
        }
        router.with_state(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unchanged_save_serializes_as_false() {
        let saved: Saved<serde_json::Value> = Saved::Unchanged;
        assert_eq!(serde_json::to_value(&saved).unwrap(), json!(false));
        let saved = Saved::Record(json!({"id": 1}));
        assert_eq!(serde_json::to_value(&saved).unwrap(), json!({"id": 1}));
    }

    #[test]
    fn saved_reads_false_or_record() {
        let saved: Saved<serde_json::Value> = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(saved, Saved::Unchanged);
        let saved: Saved<serde_json::Value> = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(saved, Saved::Record(json!({"id": 1})));
    }

    #[test]
    fn list_is_opt_in() {
        let ops = Operations::default();
        assert!(!ops.is_enabled(Operation::List));
        let enabled: Vec<_> = ops.enabled().collect();
        assert_eq!(enabled.len(), 5);

        let mut ops = ops;
        ops.set(Operation::List, true);
        ops.set(Operation::Delete, false);
        assert!(ops.list && !ops.delete);
    }
}
