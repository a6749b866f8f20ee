use domain::errors::StoreError;
use domain::models::{Document, Metric, Retrieved};
use domain::ports::VectorStore;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use shared::types::Result;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::search::SearchEngine;

/// SQLite-backed collections with brute-force scoring.
///
/// Vectors are stored as JSON blobs; the dimension of a collection is fixed by
/// its first successful insert.
pub struct SqliteVectorStore {
    conn: Connection,
}

struct CollectionInfo {
    metric: Metric,
    dimension: Option<usize>,
}

impl SqliteVectorStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::setup_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::setup_db(&conn)?;
        Ok(Self { conn })
    }

    fn setup_db(conn: &Connection) -> SqlResult<()> {
        conn.execute_batch(
            "
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                metric TEXT NOT NULL,
                dimension INTEGER
            );
            CREATE TABLE IF NOT EXISTS embeddings (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                vector BLOB NOT NULL,
                text TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
        ",
        )
    }

    fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let row = self
            .conn
            .query_row(
                "SELECT metric, dimension FROM collections WHERE name = ?1",
                [name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?)),
            )
            .optional()?;
        let Some((metric, dimension)) = row else {
            return Err(StoreError::CollectionNotFound(name.to_string()).into());
        };
        Ok(CollectionInfo {
            metric: metric.parse()?,
            dimension: dimension.map(|d| d as usize),
        })
    }

    fn load_documents(&self, collection: &str) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, vector, text FROM embeddings WHERE collection = ?1 ORDER BY rowid",
        )?;
        let mut rows = stmt.query([collection])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let vector_bytes: Vec<u8> = row.get(1)?;
            let text: String = row.get(2)?;
            let vector: Vec<f32> = serde_json::from_slice(&vector_bytes)?;
            documents.push(Document { id, text, vector });
        }
        Ok(documents)
    }

    fn check_batch(
        collection: &str,
        ids: &[String],
        vectors: &[Vec<f32>],
        texts: &[String],
        expected: usize,
    ) -> Result<()> {
        if ids.len() != vectors.len() || ids.len() != texts.len() {
            return Err(StoreError::LengthMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
                texts: texts.len(),
            }
            .into());
        }
        if expected == 0 {
            return Err(StoreError::EmptyVector.into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                expected,
                actual: bad.len(),
            }
            .into());
        }
        if let Some((id, _)) = ids
            .iter()
            .zip(vectors)
            .find(|(_, v)| v.iter().any(|x| !x.is_finite()))
        {
            return Err(StoreError::NonFiniteVector { id: id.clone() }.into());
        }
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(StoreError::DuplicateId {
                    collection: collection.to_string(),
                    id: id.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl VectorStore for SqliteVectorStore {
    fn create_collection(&self, name: &str, metric: Metric) -> Result<()> {
        let exists = self
            .conn
            .prepare("SELECT 1 FROM collections WHERE name = ?1")?
            .exists([name])?;
        if exists {
            return Err(StoreError::CollectionExists(name.to_string()).into());
        }
        self.conn.execute(
            "INSERT INTO collections (name, metric, dimension) VALUES (?1, ?2, NULL)",
            params![name, metric.as_str()],
        )?;
        debug!(collection = name, %metric, "created collection");
        Ok(())
    }

    fn add(&self, collection: &str, ids: &[String], vectors: &[Vec<f32>], texts: &[String]) -> Result<()> {
        let info = self.collection_info(collection)?;
        if ids.is_empty() && vectors.is_empty() && texts.is_empty() {
            return Ok(());
        }
        let expected = info
            .dimension
            .unwrap_or_else(|| vectors.first().map(Vec::len).unwrap_or(0));
        Self::check_batch(collection, ids, vectors, texts, expected)?;

        // Dropping the transaction on an early return rolls the batch back.
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut exists =
                tx.prepare("SELECT 1 FROM embeddings WHERE collection = ?1 AND id = ?2")?;
            let mut insert = tx.prepare(
                "INSERT INTO embeddings (collection, id, vector, text) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for ((id, vector), text) in ids.iter().zip(vectors).zip(texts) {
                if exists.exists(params![collection, id])? {
                    return Err(StoreError::DuplicateId {
                        collection: collection.to_string(),
                        id: id.clone(),
                    }
                    .into());
                }
                let vector_bytes = serde_json::to_vec(vector)?;
                insert.execute(params![collection, id, vector_bytes, text])?;
            }
            if info.dimension.is_none() {
                tx.execute(
                    "UPDATE collections SET dimension = ?1 WHERE name = ?2",
                    params![expected as i64, collection],
                )?;
            }
        }
        tx.commit()?;
        debug!(collection, records = ids.len(), dimension = expected, "stored batch");
        Ok(())
    }

    fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<Retrieved>> {
        let info = self.collection_info(collection)?;
        if let Some(expected) = info.dimension {
            if vector.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                }
                .into());
            }
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let documents = self.load_documents(collection)?;
        Ok(SearchEngine::nearest(info.metric, vector, &documents, k))
    }

    fn delete_collection(&self, name: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM collections WHERE name = ?1", [name])?;
        if removed == 0 {
            return Err(StoreError::CollectionNotFound(name.to_string()).into());
        }
        let records = tx.execute("DELETE FROM embeddings WHERE collection = ?1", [name])?;
        tx.commit()?;
        debug!(collection = name, records, "deleted collection");
        Ok(())
    }

    fn count(&self, collection: &str) -> Result<usize> {
        self.collection_info(collection)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(names)
    }
}
