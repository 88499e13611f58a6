//! Mounts a pipeline's routes under an entity prefix.

use crate::pipeline::Crud;
use crate::record::Record;
use axum::Router;

/// Routes for the enabled operations of `crud`, nested under `prefix` (e.g. `/users`).
/// Leading and trailing slashes are normalized; an empty or `/` prefix mounts them at the root.
pub fn crud_routes<T: Record>(prefix: &str, crud: &Crud<T>) -> Router {
    let trimmed = prefix.trim_matches('/');
    let prefix = if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    };
    for op in crud.state().options.operations.enabled() {
        let (method, path) = op.route();
        let full = match path {
            "/" if !prefix.is_empty() => prefix.clone(),
            _ => format!("{}{}", prefix, path),
        };
        tracing::info!(table = T::TABLE, ?op, "route {} {}", method, full);
    }
    if prefix.is_empty() {
        crud.router()
    } else {
        Router::new().nest(&prefix, crud.router())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Base, RecordId};
    use crate::store::MemoryStore;
    use axum::{body::Body, http::Request, http::StatusCode};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Tag {
        #[serde(flatten)]
        base: Base,
        label: String,
    }

    impl Record for Tag {
        const TABLE: &'static str = "tags";
        fn id(&self) -> RecordId {
            self.base.id
        }
    }

    async fn status(app: Router, uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn prefix_slashes_are_normalized() {
        let crud = Crud::<Tag>::builder(Arc::new(MemoryStore::new())).build().unwrap();
        assert_eq!(status(crud_routes("tags/", &crud), "/tags/count").await, StatusCode::OK);
        assert_eq!(status(crud_routes("/", &crud), "/count").await, StatusCode::OK);
    }
}
