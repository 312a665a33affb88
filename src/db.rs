// ABOUTME: Document storage behind a small async trait, backed by SQLite
// ABOUTME: Documents are JSON objects grouped by collection slug
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A stored document: an id plus the collection's field values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub collection: String,
    pub data: Map<String, Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl Document {
    /// String value of a top-level field, if present
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// Storage operations the admin panel needs
#[async_trait]
pub trait Database: Send + Sync {
    /// Any one document of the collection, used as an existence check
    async fn find_one(&self, collection: &str) -> Result<Option<Document>>;

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// First document whose top-level `field` equals `value`
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>>;

    /// Most recently created documents first
    async fn find(&self, collection: &str, limit: usize) -> Result<Vec<Document>>;

    async fn count(&self, collection: &str) -> Result<usize>;

    async fn create(&self, collection: &str, data: Map<String, Value>) -> Result<Document>;
}

#[derive(Clone)]
pub struct SqliteDatabase {
    db: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        tracing::info!(path = %path.display(), "Database opened");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);",
        )
        .context("Failed to initialize documents table")?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("Database mutex poisoned"))?;
        f(&conn)
    }
}

const SELECT_COLUMNS: &str = "SELECT id, collection, data, created_at, updated_at FROM documents";

type RawRow = (String, String, String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_document((id, collection, data, created_at, updated_at): RawRow) -> Result<Document> {
    let data: Map<String, Value> = serde_json::from_str(&data)
        .with_context(|| format!("Corrupt document data for id {}", id))?;
    Ok(Document {
        id,
        collection,
        data,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn find_one(&self, collection: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{} WHERE collection = ?1 LIMIT 1", SELECT_COLUMNS),
                    params![collection],
                    read_row,
                )
                .optional()
                .context("Failed to query document")?;
            row.map(into_document).transpose()
        })
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{} WHERE collection = ?1 AND id = ?2", SELECT_COLUMNS),
                    params![collection, id],
                    read_row,
                )
                .optional()
                .context("Failed to query document by id")?;
            row.map(into_document).transpose()
        })
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>> {
        if !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            anyhow::bail!("Invalid field name: {}", field);
        }
        let json_path = format!("$.{}", field);
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "{} WHERE collection = ?1 AND json_extract(data, ?2) = ?3 LIMIT 1",
                        SELECT_COLUMNS
                    ),
                    params![collection, json_path, value],
                    read_row,
                )
                .optional()
                .context("Failed to query document by field")?;
            row.map(into_document).transpose()
        })
    }

    async fn find(&self, collection: &str, limit: usize) -> Result<Vec<Document>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE collection = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                SELECT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![collection, limit as i64], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to list documents")?;
            rows.into_iter().map(into_document).collect()
        })
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                    params![collection],
                    |row| row.get(0),
                )
                .context("Failed to count documents")?;
            Ok(count as usize)
        })
    }

    async fn create(&self, collection: &str, data: Map<String, Value>) -> Result<Document> {
        let now = chrono::Utc::now().to_rfc3339();
        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            collection: collection.to_string(),
            data,
            created_at: now.clone(),
            updated_at: now,
        };
        let encoded = serde_json::to_string(&document.data)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, collection, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    document.id,
                    document.collection,
                    encoded,
                    document.created_at,
                    document.updated_at
                ],
            )
            .context("Failed to insert document")?;
            Ok(())
        })?;
        tracing::debug!(collection = %collection, id = %document.id, "Document created");
        Ok(document)
    }
}
