//! Abstract document store contract.
//!
//! The persistence backend is an external collaborator as far as the
//! repositories are concerned: anything that can add/update/query JSON
//! documents per collection and push live snapshots on change satisfies
//! [`DocumentStore`]. The embedded SQLite implementation lives in
//! [`crate::db`]; tests substitute mock stores.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::CoreResult;

/// Collection names used by the core.
pub const ORDERS: &str = "orders";
pub const CATEGORIES: &str = "categories";
pub const MENU_ITEMS: &str = "menuItems";

/// A stored document: server-stamped metadata plus the JSON field payload.
/// `created_at` is immutable after creation; `updated_at` is refreshed by the
/// store on every update.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub data: Value,
}

/// Equality filter on a top-level data field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub equals: Value,
}

/// Server-side ordering requested with a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Insertion order (no ordering requested).
    #[default]
    Unordered,
    /// Newest first.
    CreatedAtDesc,
    /// Oldest first.
    CreatedAtAsc,
}

/// A collection query: zero or more equality filters plus an ordering.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: SortKey,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter on a top-level field.
    pub fn filter(mut self, field: &str, equals: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            equals: equals.into(),
        });
        self
    }

    pub fn order(mut self, order: SortKey) -> Self {
        self.order = order;
        self
    }

    /// True when the document's data satisfies every filter.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|f| doc.data.get(&f.field) == Some(&f.equals))
    }
}

/// Snapshot callback type: receives the full matching result set on initial
/// registration and after every subsequent mutation of the collection.
pub type SnapshotFn = Box<dyn Fn(&[Document]) + Send + Sync>;

/// Live-query capable document store.
///
/// The store stamps `created_at`/`updated_at` itself; caller-supplied values
/// for those fields are ignored. Snapshots delivered to a single subscriber
/// are monotonically consistent, but no ordering is guaranteed across
/// independent subscriptions.
pub trait DocumentStore {
    /// Insert a new document and return its assigned id.
    fn add(&self, collection: &str, fields: &Value) -> CoreResult<String>;

    /// Merge `patch` into an existing document's top-level fields and refresh
    /// `updated_at`. Fails with `NotFound` for unknown ids.
    fn update(&self, collection: &str, id: &str, patch: &Value) -> CoreResult<()>;

    /// Fetch a single document by id.
    fn get(&self, collection: &str, id: &str) -> CoreResult<Document>;

    /// One-shot query.
    fn query(&self, collection: &str, query: &Query) -> CoreResult<Vec<Document>>;

    /// Register a live listener. The callback fires once with the current
    /// snapshot before this call returns, then again after every mutation of
    /// the collection, until the returned handle is cancelled or dropped.
    fn subscribe(
        &self,
        collection: &str,
        query: Query,
        callback: SnapshotFn,
    ) -> CoreResult<Subscription>;
}

/// Disposable handle for a live listener.
///
/// Cancelling releases the listener; cancelling twice is a no-op. Dropping
/// the handle cancels it as well, so a screen that simply lets its handle go
/// out of scope on teardown deregisters correctly.
pub struct Subscription {
    teardown: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// Release the listener. Idempotent.
    pub fn cancel(&self) {
        let teardown = match self.teardown.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(f) = teardown {
            f();
        }
    }

    /// True while the listener has not been cancelled.
    pub fn is_active(&self) -> bool {
        self.teardown.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Mock stores shared by repository tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::CoreError;

    /// A store whose every operation fails, for error-propagation tests.
    pub struct FailingStore;

    impl DocumentStore for FailingStore {
        fn add(&self, _collection: &str, _fields: &Value) -> CoreResult<String> {
            Err(CoreError::StoreUnavailable("backend offline".into()))
        }

        fn update(&self, _collection: &str, _id: &str, _patch: &Value) -> CoreResult<()> {
            Err(CoreError::StoreUnavailable("backend offline".into()))
        }

        fn get(&self, _collection: &str, _id: &str) -> CoreResult<Document> {
            Err(CoreError::StoreUnavailable("backend offline".into()))
        }

        fn query(&self, _collection: &str, _query: &Query) -> CoreResult<Vec<Document>> {
            Err(CoreError::StoreUnavailable("backend offline".into()))
        }

        fn subscribe(
            &self,
            _collection: &str,
            _query: Query,
            _callback: SnapshotFn,
        ) -> CoreResult<Subscription> {
            Err(CoreError::StoreUnavailable("backend offline".into()))
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
