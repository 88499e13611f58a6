//! Shared state for one pipeline's routes. Built once and read-only while serving.

use crate::pipeline::CrudOptions;
use crate::store::Store;
use std::sync::Arc;

pub struct CrudState<T> {
    pub store: Arc<dyn Store>,
    pub options: CrudOptions<T>,
}
