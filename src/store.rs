mod value;

use std::fmt;

use rand::{Rng, distr::Alphanumeric};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::sync::broadcast;
use tracing::debug;

pub use crate::error::StoreError;
pub use value::{Document, FieldValue, Fields, Timestamp, sort_newest_first};

const AUTO_ID_LEN: usize = 20;
const CHANGE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Requests,
    RectorComplaints,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        use Collection::*;
        match self {
            Users => "users",
            Requests => "requests",
            RectorComplaints => "rectorComplaints",
        }
    }

    /// Status stamped onto new documents when the caller leaves it out.
    pub fn default_status(&self) -> Option<&'static str> {
        use Collection::*;
        match self {
            Users => None,
            Requests => Some("Pending"),
            RectorComplaints => Some("Submitted"),
        }
    }

    fn server_timestamped(&self) -> bool {
        !matches!(self, Collection::Users)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published after every committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    pub id: String,
}

/// Client for the named-collection document store, backed by SQLite.
///
/// Each document is one row keyed by `(collection, id)` with its fields held
/// as a JSON object, which keeps the store schemaless.
#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    changes: broadcast::Sender<Change>,
}

impl DocumentStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Self::from_pool(pool).await
    }

    /// A private store living in a single in-memory connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                fields TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            changes: broadcast::channel(CHANGE_CAPACITY).0,
        })
    }

    pub fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Writes a new document under a generated id and returns the id.
    ///
    /// Requests and complaints get their collection's default `status` when
    /// none is given, and always a server-assigned `timestamp`.
    pub async fn create_document(&self, collection: Collection, mut fields: Fields) -> Result<String, StoreError> {
        if let Some(status) = collection.default_status() {
            fields.entry("status".to_owned()).or_insert_with(|| status.into());
        }
        if collection.server_timestamped() {
            fields.insert("timestamp".to_owned(), FieldValue::ServerTimestamp);
        }

        let id = auto_id();
        sqlx::query("INSERT INTO documents (collection,id,fields) VALUES (?,?,?)")
            .bind(collection.as_str())
            .bind(&id)
            .bind(encode(fields)?)
            .execute(&self.pool)
            .await?;

        self.publish(collection, &id);
        Ok(id)
    }

    /// Creates or fully replaces the document at `id`.
    pub async fn set_document(&self, collection: Collection, id: &str, fields: Fields) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (collection,id,fields) VALUES (?,?,?)
             ON CONFLICT (collection,id) DO UPDATE SET fields=excluded.fields",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(encode(fields)?)
        .execute(&self.pool)
        .await?;

        self.publish(collection, id);
        Ok(())
    }

    /// Writes the document only if nothing exists at `id` yet. Returns whether
    /// this call created it.
    pub async fn create_document_if_absent(&self, collection: Collection, id: &str, fields: Fields) -> Result<bool, StoreError> {
        let created = sqlx::query(
            "INSERT INTO documents (collection,id,fields) VALUES (?,?,?)
             ON CONFLICT (collection,id) DO NOTHING",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(encode(fields)?)
        .execute(&self.pool)
        .await?
        .rows_affected()
            > 0;

        if created {
            self.publish(collection, id);
        }
        Ok(created)
    }

    /// Point read. A missing document is `Ok(None)`, not an error.
    pub async fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT fields FROM documents WHERE collection=? AND id=?")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(fields,)| decode(collection, id.to_owned(), &fields))
            .transpose()
    }

    /// Equality filter on one field. Results come back in whatever order the
    /// database yields them; see [`sort_newest_first`].
    pub async fn query_by_field(&self, collection: Collection, field: &str, value: &FieldValue) -> Result<Vec<Document>, StoreError> {
        let path = field_path(field)?;

        let query = match value {
            FieldValue::Null => sqlx::query_as("SELECT id,fields FROM documents WHERE collection=? AND json_type(fields, ?)='null'")
                .bind(collection.as_str())
                .bind(path),
            // json_extract yields 1/0 for booleans, which would also match integers
            FieldValue::Bool(b) => sqlx::query_as("SELECT id,fields FROM documents WHERE collection=? AND json_type(fields, ?)=?")
                .bind(collection.as_str())
                .bind(path)
                .bind(if *b { "true" } else { "false" }),
            _ => {
                let query = sqlx::query_as("SELECT id,fields FROM documents WHERE collection=? AND json_extract(fields, ?)=?")
                    .bind(collection.as_str())
                    .bind(path);
                match value {
                    FieldValue::String(s) => query.bind(s.clone()),
                    FieldValue::Integer(i) => query.bind(*i),
                    FieldValue::Double(d) => query.bind(*d),
                    other => return Err(StoreError::UnsupportedFilter(other.type_name())),
                }
            }
        };

        let rows: Vec<(String, String)> = query.fetch_all(&self.pool).await?;
        debug!("{collection} where {field} matched {} documents", rows.len());
        rows.into_iter()
            .map(|(id, fields)| decode(collection, id, &fields))
            .collect()
    }

    /// Every document of the collection, unordered.
    pub async fn list_documents(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id,fields FROM documents WHERE collection=?")
            .bind(collection.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(id, fields)| decode(collection, id, &fields))
            .collect()
    }

    fn publish(&self, collection: Collection, id: &str) {
        // nobody listening is fine
        let _ = self.changes.send(Change {
            collection,
            id: id.to_owned(),
        });
    }
}

fn auto_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

fn field_path(field: &str) -> Result<String, StoreError> {
    if field.is_empty() || field.contains(['"', '\\']) {
        return Err(StoreError::InvalidField(field.to_owned()));
    }
    Ok(format!("$.\"{field}\""))
}

fn encode(mut fields: Fields) -> Result<String, StoreError> {
    value::resolve_server_timestamps(&mut fields, Timestamp::now());
    serde_json::to_string(&fields).map_err(StoreError::Encode)
}

fn decode(collection: Collection, id: String, fields: &str) -> Result<Document, StoreError> {
    match serde_json::from_str(fields) {
        Ok(fields) => Ok(Document { id, fields }),
        Err(source) => Err(StoreError::Malformed {
            collection: collection.to_string(),
            id,
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;

    #[tokio::test]
    async fn create_stamps_status_and_timestamp() {
        let store = DocumentStore::in_memory().await.unwrap();
        let id = store
            .create_document(Collection::Requests, fields! { "uid" => "u1", "serviceType" => "AC" })
            .await
            .unwrap();
        assert_eq!(id.len(), AUTO_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));

        let doc = store.get_document(Collection::Requests, &id).await.unwrap().unwrap();
        assert_eq!(doc.get_str("status"), Some("Pending"));
        assert!(doc.timestamp() > Timestamp::EPOCH);
    }

    #[tokio::test]
    async fn create_keeps_explicit_status_but_overrides_timestamp() {
        let store = DocumentStore::in_memory().await.unwrap();
        let mut fields = fields! { "status" => "Escalated" };
        fields.insert("timestamp".into(), Timestamp::from_seconds(1).into());
        let id = store.create_document(Collection::RectorComplaints, fields).await.unwrap();

        let doc = store.get_document(Collection::RectorComplaints, &id).await.unwrap().unwrap();
        assert_eq!(doc.get_str("status"), Some("Escalated"));
        assert!(doc.timestamp().seconds > 1);
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let store = DocumentStore::in_memory().await.unwrap();
        assert!(store.get_document(Collection::Users, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_overwrites_whole_document() {
        let store = DocumentStore::in_memory().await.unwrap();
        store.set_document(Collection::Users, "u1", fields! { "room" => "A-1", "hostel" => "H1" }).await.unwrap();
        store.set_document(Collection::Users, "u1", fields! { "room" => "B-2" }).await.unwrap();

        let doc = store.get_document(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.get_str("room"), Some("B-2"));
        assert!(doc.get("hostel").is_none());
        assert!(doc.get("timestamp").is_none());
    }

    #[tokio::test]
    async fn create_if_absent_only_writes_once() {
        let store = DocumentStore::in_memory().await.unwrap();
        assert!(store.create_document_if_absent(Collection::Users, "u1", fields! { "n" => 1i64 }).await.unwrap());
        assert!(!store.create_document_if_absent(Collection::Users, "u1", fields! { "n" => 2i64 }).await.unwrap());

        let doc = store.get_document(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.get("n"), Some(&FieldValue::Integer(1)));
    }

    #[tokio::test]
    async fn query_filters_by_equality_within_collection() {
        let store = DocumentStore::in_memory().await.unwrap();
        store.create_document(Collection::Requests, fields! { "uid" => "u1" }).await.unwrap();
        store.create_document(Collection::Requests, fields! { "uid" => "u2" }).await.unwrap();
        store.create_document(Collection::Requests, fields! { "uid" => "u1" }).await.unwrap();
        store.create_document(Collection::RectorComplaints, fields! { "uid" => "u1" }).await.unwrap();

        let docs = store.query_by_field(Collection::Requests, "uid", &"u1".into()).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.get_str("uid") == Some("u1")));

        let flagged = store.query_by_field(Collection::Requests, "urgent", &true.into()).await.unwrap();
        assert!(flagged.is_empty());
    }

    #[tokio::test]
    async fn boolean_filter_does_not_match_integers() {
        let store = DocumentStore::in_memory().await.unwrap();
        store.create_document(Collection::Requests, fields! { "urgent" => 1i64 }).await.unwrap();
        store.create_document(Collection::Requests, fields! { "urgent" => 0i64 }).await.unwrap();
        let yes = store.create_document(Collection::Requests, fields! { "urgent" => true }).await.unwrap();
        let no = store.create_document(Collection::Requests, fields! { "urgent" => false }).await.unwrap();

        let flagged = store.query_by_field(Collection::Requests, "urgent", &true.into()).await.unwrap();
        assert_eq!(flagged.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), [yes.as_str()]);
        let unflagged = store.query_by_field(Collection::Requests, "urgent", &false.into()).await.unwrap();
        assert_eq!(unflagged.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), [no.as_str()]);

        let one = store.query_by_field(Collection::Requests, "urgent", &1i64.into()).await.unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].get("urgent"), Some(&FieldValue::Integer(1)));
    }

    #[tokio::test]
    async fn query_rejects_bad_filters() {
        let store = DocumentStore::in_memory().await.unwrap();
        let by_time = store
            .query_by_field(Collection::Requests, "timestamp", &Timestamp::EPOCH.into())
            .await;
        assert!(matches!(by_time, Err(StoreError::UnsupportedFilter("timestamp"))));

        let quoted = store.query_by_field(Collection::Requests, "a\"b", &"x".into()).await;
        assert!(matches!(quoted, Err(StoreError::InvalidField(_))));
    }

    #[tokio::test]
    async fn writes_are_published() {
        let store = DocumentStore::in_memory().await.unwrap();
        let mut changes = store.changes();
        let id = store.create_document(Collection::Requests, Fields::new()).await.unwrap();
        assert_eq!(
            changes.recv().await.unwrap(),
            Change { collection: Collection::Requests, id }
        );
    }
}
