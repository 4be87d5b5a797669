//! SQLite persistence for collected events
//!
//! The store is the only component that touches the database file. It keeps a
//! single pooled connection so every write goes through one logical writer.

use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StoreError;
use crate::event::{Event, Level};

/// Default page size for `query`
pub const DEFAULT_QUERY_LIMIT: u32 = 100;
/// Upper bound on rows returned by one `query`
pub const MAX_QUERY_LIMIT: u32 = 5000;

/// A persisted event row
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub id: i64,
    #[sqlx(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub level: String,
    pub name: String,
    pub device_id: Option<String>,
    pub session_id: Option<String>,
    pub flow_id: Option<String>,
    pub screen: Option<String>,
    pub message: Option<String>,
    /// Payload as serialized JSON text
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Filters for reading events back out of the store
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub name: Option<String>,
    pub level: Option<Level>,
    pub device_id: Option<String>,
    pub session_id: Option<String>,
    pub flow_id: Option<String>,
    /// Inclusive lower bound on `timestamp_ms`
    pub since_ms: Option<i64>,
    /// Exclusive upper bound on `timestamp_ms`
    pub until_ms: Option<i64>,
    pub limit: Option<u32>,
    pub order: SortOrder,
}

#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
    path: String,
}

impl EventStore {
    /// Open (or create) the store at `path` and bring its schema up to date.
    ///
    /// `:memory:` opens a private in-memory database.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = if path == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                        path: parent.display().to_string(),
                        source,
                    })?;
                }
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        }
        .busy_timeout(Duration::from_secs(5));

        // One long-lived connection: single writer, and an in-memory database
        // lives exactly as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %path, "Running event store migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a batch of events in one transaction, in slice order.
    ///
    /// Either every row of the batch is written or none is.
    pub async fn insert_batch(&self, events: &[Event]) -> Result<u64, StoreError> {
        if events.is_empty() {
            return Ok(0);
        }

        let payloads = events
            .iter()
            .map(|e| e.payload.as_ref().map(serde_json::to_string).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;
        for (event, payload) in events.iter().zip(payloads) {
            sqlx::query(
                r#"
                INSERT INTO events (
                    timestamp, level, name, device_id, session_id, flow_id, screen, message, payload
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(event.timestamp_ms)
            .bind(event.level.as_str())
            .bind(&event.name)
            .bind(&event.device_id)
            .bind(&event.session_id)
            .bind(&event.flow_id)
            .bind(&event.screen)
            .bind(&event.message)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(events.len() as u64)
    }

    /// Read events matching `filter`; ties on timestamp are ordered by id
    pub async fn query(&self, filter: &EventQuery) -> Result<Vec<StoredEvent>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, timestamp, level, name, device_id, session_id, flow_id, screen, message, payload \
             FROM events WHERE 1 = 1",
        );

        if let Some(name) = &filter.name {
            qb.push(" AND name = ").push_bind(name.clone());
        }
        if let Some(level) = filter.level {
            qb.push(" AND level = ").push_bind(level.as_str());
        }
        if let Some(device_id) = &filter.device_id {
            qb.push(" AND device_id = ").push_bind(device_id.clone());
        }
        if let Some(session_id) = &filter.session_id {
            qb.push(" AND session_id = ").push_bind(session_id.clone());
        }
        if let Some(flow_id) = &filter.flow_id {
            qb.push(" AND flow_id = ").push_bind(flow_id.clone());
        }
        if let Some(since) = filter.since_ms {
            qb.push(" AND timestamp >= ").push_bind(since);
        }
        if let Some(until) = filter.until_ms {
            qb.push(" AND timestamp < ").push_bind(until);
        }

        qb.push(match filter.order {
            SortOrder::NewestFirst => " ORDER BY timestamp DESC, id DESC",
            SortOrder::OldestFirst => " ORDER BY timestamp ASC, id ASC",
        });

        let limit = filter
            .limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT);
        qb.push(" LIMIT ").push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<StoredEvent>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// Delete every row with a timestamp strictly older than `cutoff_ms`
    pub async fn delete_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE timestamp < ?")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Keep only the `max_rows` newest rows by `(timestamp, id)`.
    ///
    /// Returns the number of rows deleted.
    pub async fn cap_rows(&self, max_rows: u64) -> Result<u64, StoreError> {
        let total = self.count().await?;
        if total <= max_rows as i64 {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM events WHERE id NOT IN (
                SELECT id FROM events ORDER BY timestamp DESC, id DESC LIMIT ?
            )
            "#,
        )
        .bind(max_rows as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Close the connection pool; later operations fail with `PoolClosed`
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_store() -> EventStore {
        EventStore::open(":memory:").await.unwrap()
    }

    fn event(ts: i64, name: &str) -> Event {
        Event::new(ts, Level::Info, name)
    }

    #[tokio::test]
    async fn test_open_creates_schema_with_message_column() {
        let store = memory_store().await;

        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('events')")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert!(columns.contains(&"message".to_string()));
        assert!(columns.contains(&"flow_id".to_string()));

        let indexes: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'events'",
        )
        .fetch_all(store.pool())
        .await
        .unwrap();
        for expected in [
            "idx_events_timestamp",
            "idx_events_name_timestamp",
            "idx_events_device_timestamp",
            "idx_events_flow_timestamp",
            "idx_events_level_timestamp",
        ] {
            assert!(indexes.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn test_open_file_store_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.db");
        let store = EventStore::open(path.to_str().unwrap()).await.unwrap();

        store.insert_batch(&[event(1, "a")]).await.unwrap();
        store.close().await;

        // Reopening an existing store is a no-op migration
        let reopened = EventStore::open(path.to_str().unwrap()).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_batch_preserves_order_and_payload() {
        let store = memory_store().await;
        let mut first = event(100, "first").with_payload(json!({"k": [1, 2]}));
        first.message = Some("hello".to_string());
        let batch = vec![first, event(50, "second"), event(75, "third")];

        assert_eq!(store.insert_batch(&batch).await.unwrap(), 3);

        let rows = store
            .query(&EventQuery {
                order: SortOrder::OldestFirst,
                ..Default::default()
            })
            .await
            .unwrap();
        let mut by_id = rows.clone();
        by_id.sort_by_key(|r| r.id);
        let names: Vec<&str> = by_id.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(by_id[0].payload.as_deref(), Some(r#"{"k":[1,2]}"#));
        assert_eq!(by_id[0].message.as_deref(), Some("hello"));
        assert!(by_id[1].payload.is_none());
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = memory_store().await;
        let mut a = event(10, "checkout");
        a.flow_id = Some("f1".to_string());
        a.device_id = Some("d1".to_string());
        let mut b = Event::new(20, Level::Error, "checkout");
        b.flow_id = Some("f1".to_string());
        let c = event(30, "login");
        store.insert_batch(&[a, b, c]).await.unwrap();

        let by_name = store
            .query(&EventQuery {
                name: Some("checkout".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 2);
        assert_eq!(by_name[0].timestamp_ms, 20);

        let errors = store
            .query(&EventQuery {
                level: Some(Level::Error),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(errors.len(), 1);

        let window = store
            .query(&EventQuery {
                since_ms: Some(10),
                until_ms: Some(30),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(window.len(), 2);

        let device = store
            .query(&EventQuery {
                device_id: Some("d1".to_string()),
                flow_id: Some("f1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(device.len(), 1);

        let limited = store
            .query(&EventQuery {
                limit: Some(1),
                order: SortOrder::OldestFirst,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].timestamp_ms, 10);
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let store = memory_store().await;
        store
            .insert_batch(&[event(1, "old"), event(2, "old"), event(10, "new")])
            .await
            .unwrap();

        assert_eq!(store.delete_older_than(5).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cap_rows_keeps_newest_with_id_tiebreak() {
        let store = memory_store().await;
        // Two rows share timestamp 5; the later insert (higher id) is newer
        store
            .insert_batch(&[
                event(9, "newest"),
                event(5, "tie-older"),
                event(5, "tie-newer"),
                event(1, "oldest"),
            ])
            .await
            .unwrap();

        assert_eq!(store.cap_rows(2).await.unwrap(), 2);

        let rows = store.query(&EventQuery::default()).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["newest", "tie-newer"]);

        // Already under the cap
        assert_eq!(store.cap_rows(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let store = memory_store().await;
        store.close().await;
        assert!(store.is_closed());
        assert!(store.count().await.is_err());
    }
}
