//! Embedded SQLite document store for yums-core.
//!
//! Uses rusqlite with WAL mode. Documents are stored as JSON blobs in a
//! single `documents` table keyed by (collection, id), with server-stamped
//! `created_at`/`updated_at` columns. Live subscriptions are fanned out
//! synchronously after each committed write, which matches the
//! single-threaded, callback-driven scheduling model of the app: every
//! snapshot a subscriber sees reflects a fully committed state, and no older
//! snapshot is ever delivered after a newer one.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::store::{Document, DocumentStore, Query, SnapshotFn, SortKey, Subscription};

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Field names the store owns. Caller-supplied values for these are ignored
/// on add and update; the server clock is the only source of truth for them.
const RESERVED_FIELDS: &[&str] = &["id", "createdAt", "updatedAt"];

struct Listener {
    id: u64,
    collection: String,
    query: Query,
    callback: Arc<dyn Fn(&[Document]) + Send + Sync>,
}

struct Inner {
    conn: Mutex<Connection>,
    listeners: Mutex<Vec<Listener>>,
    next_listener_id: AtomicU64,
}

/// SQLite-backed [`DocumentStore`]. Cheap to clone; all clones share one
/// connection and one listener registry.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

impl SqliteStore {
    /// Open (or create) the database file, apply pragmas, and run any
    /// pending migrations.
    pub fn open(path: &Path) -> CoreResult<Self> {
        info!("Opening document store at {}", path.display());
        let conn = open_and_configure(path)?;
        run_migrations(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// In-memory store, used by tests and ephemeral tooling.
    pub fn open_in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(sql_err)?;
        run_migrations(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
            }),
        }
    }

    /// Deliver a fresh snapshot to every listener of `collection`.
    ///
    /// Callback registrations are cloned out of the registry before any
    /// callback runs, so a callback may freely mutate the store (and trigger
    /// a nested dispatch) without deadlocking. A panicking listener is
    /// isolated: it never prevents delivery to the remaining listeners.
    fn notify_collection(&self, collection: &str) {
        let targets: Vec<(u64, Query, Arc<dyn Fn(&[Document]) + Send + Sync>)> = {
            let registry = match self.inner.listeners.lock() {
                Ok(r) => r,
                Err(e) => {
                    warn!("listener registry lock failed, skipping dispatch: {e}");
                    return;
                }
            };
            registry
                .iter()
                .filter(|l| l.collection == collection)
                .map(|l| (l.id, l.query.clone(), l.callback.clone()))
                .collect()
        };

        for (id, query, callback) in targets {
            match self.query(collection, &query) {
                Ok(docs) => {
                    let outcome = catch_unwind(AssertUnwindSafe(|| callback(&docs)));
                    if outcome.is_err() {
                        warn!("listener {id} on '{collection}' panicked; snapshot dropped");
                    }
                }
                Err(e) => {
                    warn!("snapshot query for listener {id} on '{collection}' failed: {e}");
                }
            }
        }
    }

    fn remove_listener(inner: &Inner, listener_id: u64) {
        if let Ok(mut registry) = inner.listeners.lock() {
            registry.retain(|l| l.id != listener_id);
        }
    }

    fn lock_conn(&self) -> CoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.inner
            .conn
            .lock()
            .map_err(|e| CoreError::StoreUnavailable(format!("connection lock: {e}")))
    }
}

impl DocumentStore for SqliteStore {
    fn add(&self, collection: &str, fields: &Value) -> CoreResult<String> {
        let data = sanitize_fields(fields)?;
        let id = Uuid::new_v4().to_string();
        let now = stamp(Utc::now());

        {
            let conn = self.lock_conn()?;
            conn.execute(
                "INSERT INTO documents (id, collection, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, collection, data.to_string(), now],
            )
            .map_err(sql_err)?;
        }

        debug!("added document {collection}/{id}");
        self.notify_collection(collection);
        Ok(id)
    }

    fn update(&self, collection: &str, id: &str, patch: &Value) -> CoreResult<()> {
        let patch = sanitize_fields(patch)?;

        {
            let conn = self.lock_conn()?;
            let existing: Option<String> = conn
                .query_row(
                    "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err)?;

            let raw = existing.ok_or_else(|| CoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

            let mut data: Value = serde_json::from_str(&raw).map_err(|e| CoreError::Corrupt {
                collection: collection.to_string(),
                id: id.to_string(),
                reason: e.to_string(),
            })?;
            merge_fields(&mut data, &patch);

            conn.execute(
                "UPDATE documents SET data = ?3, updated_at = ?4
                 WHERE collection = ?1 AND id = ?2",
                params![collection, id, data.to_string(), stamp(Utc::now())],
            )
            .map_err(sql_err)?;
        }

        debug!("updated document {collection}/{id}");
        self.notify_collection(collection);
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> CoreResult<Document> {
        let conn = self.lock_conn()?;
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT data, created_at, updated_at FROM documents
                 WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(sql_err)?;

        match row {
            Some((data, created_at, updated_at)) => {
                decode_row(collection, id.to_string(), data, created_at, updated_at)
            }
            None => Err(CoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    fn query(&self, collection: &str, query: &Query) -> CoreResult<Vec<Document>> {
        let order_clause = match query.order {
            SortKey::Unordered => "rowid ASC",
            SortKey::CreatedAtDesc => "created_at DESC, rowid DESC",
            SortKey::CreatedAtAsc => "created_at ASC, rowid ASC",
        };
        let sql = format!(
            "SELECT id, data, created_at, updated_at FROM documents
             WHERE collection = ?1 ORDER BY {order_clause}"
        );

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(sql_err)?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, data, created_at, updated_at) = row.map_err(sql_err)?;
            let doc = decode_row(collection, id, data, created_at, updated_at)?;
            if query.matches(&doc) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    fn subscribe(
        &self,
        collection: &str,
        query: Query,
        callback: SnapshotFn,
    ) -> CoreResult<Subscription> {
        let callback: Arc<dyn Fn(&[Document]) + Send + Sync> = Arc::from(callback);
        let listener_id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);

        // Initial snapshot is queried before the listener is registered so a
        // failing first query surfaces as an error instead of a silently
        // dead subscription.
        let initial = self.query(collection, &query)?;

        {
            let mut registry = self
                .inner
                .listeners
                .lock()
                .map_err(|e| CoreError::StoreUnavailable(format!("listener registry lock: {e}")))?;
            registry.push(Listener {
                id: listener_id,
                collection: collection.to_string(),
                query,
                callback: callback.clone(),
            });
        }

        debug!("listener {listener_id} registered on '{collection}'");
        let outcome = catch_unwind(AssertUnwindSafe(|| callback(&initial)));
        if outcome.is_err() {
            warn!("listener {listener_id} on '{collection}' panicked on initial snapshot");
        }

        let inner = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                SqliteStore::remove_listener(&inner, listener_id);
                debug!("listener {listener_id} removed");
            }
        }))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sql_err(e: rusqlite::Error) -> CoreError {
    CoreError::StoreUnavailable(e.to_string())
}

/// Serialize a timestamp so lexicographic order equals chronological order.
fn stamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stamp(collection: &str, id: &str, raw: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::Corrupt {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: format!("bad timestamp '{raw}': {e}"),
        })
}

/// Require a JSON object and drop store-owned fields from it.
fn sanitize_fields(fields: &Value) -> CoreResult<Value> {
    let obj = fields
        .as_object()
        .ok_or_else(|| CoreError::Validation("document fields must be a JSON object".into()))?;
    let mut clean = obj.clone();
    for key in RESERVED_FIELDS {
        clean.remove(*key);
    }
    Ok(Value::Object(clean))
}

/// Merge patch fields over existing data at the top level.
fn merge_fields(data: &mut Value, patch: &Value) {
    let (Some(target), Some(source)) = (data.as_object_mut(), patch.as_object()) else {
        return;
    };
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

fn decode_row(
    collection: &str,
    id: String,
    data: String,
    created_at: String,
    updated_at: String,
) -> CoreResult<Document> {
    let data: Value = serde_json::from_str(&data).map_err(|e| CoreError::Corrupt {
        collection: collection.to_string(),
        id: id.clone(),
        reason: e.to_string(),
    })?;
    let created_at = parse_stamp(collection, &id, &created_at)?;
    let updated_at = parse_stamp(collection, &id, &updated_at)?;
    Ok(Document {
        id,
        created_at,
        updated_at,
        data,
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> CoreResult<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| CoreError::StoreUnavailable(format!("sqlite open: {e}")))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| CoreError::StoreUnavailable(format!("pragma setup: {e}")))?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> CoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| CoreError::StoreUnavailable(format!("create schema_version: {e}")))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        debug!("document store schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating document store from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Migration v1: the documents table plus lookup indexes.
fn migrate_v1(conn: &Connection) -> CoreResult<()> {
    conn.execute_batch(
        "
        -- documents (one JSON blob per document, all collections)
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT NOT NULL,
            collection TEXT NOT NULL,
            data TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );

        -- Indexes
        CREATE INDEX IF NOT EXISTS idx_documents_collection_created
            ON documents(collection, created_at);

        -- Record migration
        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| CoreError::StoreUnavailable(format!("migration v1: {e}")))?;

    info!("Applied migration v1 (documents table)");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
