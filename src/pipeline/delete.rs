//! Delete strategies: physical removal or a `deleted_at` marker.

use super::hooks::{Abort, DeleteStrategy, HookContext};
use chrono::Utc;
use futures::future::FutureExt;
use std::sync::Arc;

/// Removes the row named by `:id`. True when a row was removed.
pub fn hard_delete() -> DeleteStrategy {
    Arc::new(|ctx: Arc<HookContext>| {
        async move {
            let id = ctx.record_id()?;
            let removed = ctx.store().delete(ctx.table(), id).await?;
            Ok::<_, Abort>(removed > 0)
        }
        .boxed()
    })
}

/// Stamps `deleted_at` on the row named by `:id`. True only the first time; a row that is
/// already marked, or missing, yields false.
pub fn soft_delete() -> DeleteStrategy {
    Arc::new(|ctx: Arc<HookContext>| {
        async move {
            let id = ctx.record_id()?;
            let marked = ctx.store().mark_deleted(ctx.table(), id, Utc::now()).await?;
            Ok::<_, Abort>(marked > 0)
        }
        .boxed()
    })
}
