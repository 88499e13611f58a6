//! Record capability and the reusable id/timestamp fields.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub type RecordId = u64;

/// Largest id a store accepts; ids live in a signed 64-bit column.
pub const MAX_ID: RecordId = i64::MAX as RecordId;

pub const ID: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const DELETED_AT: &str = "deleted_at";

/// An entity served by a CRUD pipeline. Serialized field names are the store's column names.
///
/// ```rust,ignore
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// struct User {
///     #[serde(flatten)]
///     base: Base,
///     name: String,
///     age: i32,
/// }
///
/// impl Record for User {
///     const TABLE: &'static str = "users";
///     fn id(&self) -> RecordId {
///         self.base.id
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table name, optionally schema-qualified ("app.users").
    const TABLE: &'static str;

    /// Store-assigned identifier; 0 while unsaved.
    fn id(&self) -> RecordId;
}

/// Identifier and store-managed timestamps. `deleted_at` is `None` for active rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Base {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Base {
    pub fn with_id(id: RecordId) -> Self {
        Base {
            id,
            ..Default::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
