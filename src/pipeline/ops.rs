//! The six operation handlers. Each runs pre-hook, store call, post-hook, then responds.

use super::hooks::{run, Abort, HookContext};
use super::Saved;
use crate::config::PageRequest;
use crate::error::CrudError;
use crate::record::Record;
use crate::search::apply_searches;
use crate::sql::Query;
use crate::state::CrudState;
use crate::store::Row;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

type Step = Result<Response, Abort>;

fn respond<T>(state: &CrudState<T>, result: Step) -> Response {
    match result {
        Ok(response) => response,
        Err(abort) => abort.into_response(&state.options.responder),
    }
}

fn decode<T: Record>(row: Row) -> Result<T, Abort> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

fn decode_all<T: Record>(rows: Vec<Row>) -> Result<Vec<T>, Abort> {
    rows.into_iter().map(decode).collect()
}

fn filtered<T>(state: &CrudState<T>, ctx: &HookContext) -> Query {
    apply_searches(&state.options.searches, &ctx.params, Query::new())
}

fn path_int(ctx: &HookContext, key: &str) -> Result<i64, CrudError> {
    let raw = ctx.path.get(key).map(String::as_str).unwrap_or_default();
    raw.trim()
        .parse()
        .map_err(|_| CrudError::BadRequest(format!("invalid {}: {:?}", key, raw)))
}

async fn list_step<T: Record>(state: &CrudState<T>, ctx: &Arc<HookContext>) -> Step {
    let hooks = &state.options.hooks;
    let query = run(&hooks.will_list, ctx, filtered(state, ctx)).await?;
    let rows = state.store.find(T::TABLE, &query).await?;
    let records = run(&hooks.did_list, ctx, decode_all::<T>(rows)?).await?;
    tracing::debug!(table = T::TABLE, count = records.len(), "list");
    Ok(state.options.responder.ok(records))
}

pub(crate) async fn list<T: Record>(State(state): State<Arc<CrudState<T>>>, ctx: HookContext) -> Response {
    let ctx = Arc::new(ctx);
    let result = list_step(&state, &ctx).await;
    respond(&state, result)
}

async fn page_step<T: Record>(state: &CrudState<T>, ctx: &Arc<HookContext>) -> Step {
    let hooks = &state.options.hooks;
    let number = path_int(ctx, "page_num")?;
    let size = path_int(ctx, "page_size")?;
    let page: PageRequest = state.options.page.resolve(number, size);
    let mut query = filtered(state, ctx).offset(page.offset()).limit(page.limit());
    if let Some(h) = &hooks.will_page {
        query = h(ctx.clone(), (page, query)).await?;
    }
    let rows = state.store.find(T::TABLE, &query).await?;
    let mut records = decode_all::<T>(rows)?;
    if let Some(h) = &hooks.did_page {
        records = h(ctx.clone(), (page, records)).await?;
    }
    tracing::debug!(table = T::TABLE, number = page.number, size = page.size, count = records.len(), "page");
    Ok(state.options.responder.ok(records))
}

pub(crate) async fn page<T: Record>(State(state): State<Arc<CrudState<T>>>, ctx: HookContext) -> Response {
    let ctx = Arc::new(ctx);
    let result = page_step(&state, &ctx).await;
    respond(&state, result)
}

async fn count_step<T: Record>(state: &CrudState<T>, ctx: &Arc<HookContext>) -> Step {
    let hooks = &state.options.hooks;
    let query = run(&hooks.will_count, ctx, filtered(state, ctx)).await?;
    let n = state.store.count(T::TABLE, &query).await?;
    let n = run(&hooks.did_count, ctx, n).await?;
    Ok(state.options.responder.ok(n))
}

pub(crate) async fn count<T: Record>(State(state): State<Arc<CrudState<T>>>, ctx: HookContext) -> Response {
    let ctx = Arc::new(ctx);
    let result = count_step(&state, &ctx).await;
    respond(&state, result)
}

async fn get_one_step<T: Record>(state: &CrudState<T>, ctx: &Arc<HookContext>) -> Step {
    let hooks = &state.options.hooks;
    let id = ctx.record_id()?;
    run(&hooks.will_get_one, ctx, ()).await?;
    let row = state
        .store
        .find_by_id(T::TABLE, id)
        .await?
        .ok_or_else(|| CrudError::NotFound(format!("record {} not found", id)))?;
    let record = run(&hooks.did_get_one, ctx, decode::<T>(row)?).await?;
    Ok(state.options.responder.ok(record))
}

pub(crate) async fn get_one<T: Record>(State(state): State<Arc<CrudState<T>>>, ctx: HookContext) -> Response {
    let ctx = Arc::new(ctx);
    let result = get_one_step(&state, &ctx).await;
    respond(&state, result)
}

async fn save_step<T: Record>(
    state: &CrudState<T>,
    ctx: &Arc<HookContext>,
    body: Result<Json<T>, JsonRejection>,
) -> Step {
    let hooks = &state.options.hooks;
    let Json(record) = body.map_err(|e| CrudError::BadRequest(e.body_text()))?;
    let record = run(&hooks.will_save, ctx, record).await?;
    let row = match serde_json::to_value(&record)? {
        Value::Object(row) => row,
        _ => return Err(CrudError::BadRequest("record must serialize to an object".into()).into()),
    };
    let stored = state.store.save(T::TABLE, row).await?;
    let saved = if stored.rows_affected > 0 {
        Saved::Record(decode::<T>(stored.row)?)
    } else {
        Saved::Unchanged
    };
    tracing::debug!(table = T::TABLE, rows_affected = stored.rows_affected, "save");
    let saved = run(&hooks.did_save, ctx, saved).await?;
    Ok(state.options.responder.ok(saved))
}

pub(crate) async fn save<T: Record>(
    State(state): State<Arc<CrudState<T>>>,
    ctx: HookContext,
    body: Result<Json<T>, JsonRejection>,
) -> Response {
    let ctx = Arc::new(ctx);
    let result = save_step(&state, &ctx, body).await;
    respond(&state, result)
}

async fn delete_step<T: Record>(state: &CrudState<T>, ctx: &Arc<HookContext>) -> Step {
    let hooks = &state.options.hooks;
    run(&hooks.will_delete, ctx, ()).await?;
    let changed = (state.options.delete)(ctx.clone()).await?;
    tracing::debug!(table = T::TABLE, changed, "delete");
    let changed = run(&hooks.did_delete, ctx, changed).await?;
    Ok(state.options.responder.ok(changed))
}

pub(crate) async fn delete<T: Record>(State(state): State<Arc<CrudState<T>>>, ctx: HookContext) -> Response {
    let ctx = Arc::new(ctx);
    let result = delete_step(&state, &ctx).await;
    respond(&state, result)
}
