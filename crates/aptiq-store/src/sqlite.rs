//! SQLite storage backend.
//!
//! Every collection lives in one `documents` table keyed by
//! `(collection, key)` with a per-collection insertion sequence; index
//! entries live in `document_index` and are matched with one `EXISTS`
//! clause per filter. The connection is opened on first use, and a failed
//! open is retried on the next call.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use aptiq_core::error::StoreError;
use aptiq_core::storage::{
    Collection, Document, Order, Query, StorageBackend, StoredDocument,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    seq INTEGER NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (collection, key)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_documents_seq ON documents(collection, seq);

CREATE TABLE IF NOT EXISTS document_index (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    field TEXT NOT NULL,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_document_index_lookup
    ON document_index(collection, field, value);
CREATE INDEX IF NOT EXISTS idx_document_index_key
    ON document_index(collection, key);
"#;

/// Storage backend on a single SQLite database file.
pub struct SqliteBackend {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteBackend {
    /// Create a backend for the database at `path`. Nothing is opened until
    /// the first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `f` against the connection on the blocking pool, opening the
    /// database first if needed.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".into()))?;
            if guard.is_none() {
                *guard = Some(open_connection(&path)?);
                tracing::debug!("opened sqlite database {}", path.display());
            }
            let Some(conn) = guard.as_mut() else {
                return Err(StoreError::Unavailable(path.display().to_string()));
            };
            f(conn).map_err(backend_error)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("sqlite task failed: {e}")))?
    }
}

fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    let unavailable =
        |e: &dyn std::fmt::Display| StoreError::Unavailable(format!("{}: {e}", path.display()));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| unavailable(&e))?;
    }
    let conn = Connection::open(path).map_err(|e| unavailable(&e))?;
    conn.execute_batch(SCHEMA).map_err(|e| unavailable(&e))?;
    Ok(conn)
}

fn backend_error(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn next_seq(conn: &Connection, collection: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(seq), 0) + 1 FROM documents WHERE collection = ?1",
        params![collection],
        |row| row.get(0),
    )
}

/// Insert or replace a document, keeping the sequence number of an
/// existing key.
fn upsert(conn: &Connection, collection: &str, document: &Document) -> rusqlite::Result<i64> {
    let body = document.body.to_string();
    let existing: Option<i64> = conn
        .query_row(
            "SELECT seq FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection, document.key],
            |row| row.get(0),
        )
        .optional()?;

    let seq = match existing {
        Some(seq) => {
            conn.execute(
                "UPDATE documents SET body = ?3 WHERE collection = ?1 AND key = ?2",
                params![collection, document.key, body],
            )?;
            seq
        }
        None => {
            let seq = next_seq(conn, collection)?;
            conn.execute(
                "INSERT INTO documents (collection, key, seq, body) VALUES (?1, ?2, ?3, ?4)",
                params![collection, document.key, seq, body],
            )?;
            seq
        }
    };

    conn.execute(
        "DELETE FROM document_index WHERE collection = ?1 AND key = ?2",
        params![collection, document.key],
    )?;
    let mut stmt = conn.prepare_cached(
        "INSERT INTO document_index (collection, key, field, value) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for entry in &document.index {
        stmt.execute(params![collection, document.key, entry.field, entry.value])?;
    }
    Ok(seq)
}

fn run_query(
    conn: &Connection,
    collection: &str,
    query: &Query,
) -> rusqlite::Result<Vec<(String, i64, String)>> {
    let mut sql = String::from("SELECT d.key, d.seq, d.body FROM documents d WHERE d.collection = ?");
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(collection.to_string())];

    for filter in &query.filters {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM document_index i \
             WHERE i.collection = d.collection AND i.key = d.key \
             AND i.field = ? AND i.value = ?)",
        );
        params_vec.push(Box::new(filter.field.clone()));
        params_vec.push(Box::new(filter.value.clone()));
    }

    sql.push_str(match query.order {
        Order::Ascending => " ORDER BY d.seq ASC",
        Order::Descending => " ORDER BY d.seq DESC",
    });
    // A negative LIMIT means no limit in SQLite.
    sql.push_str(" LIMIT ? OFFSET ?");
    let limit = query.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(-1));
    params_vec.push(Box::new(limit));
    params_vec.push(Box::new(i64::try_from(query.offset).unwrap_or(i64::MAX)));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    rows.collect()
}

fn stored(key: String, seq: i64, body: &str) -> Result<StoredDocument, StoreError> {
    Ok(StoredDocument {
        key,
        seq: seq as u64,
        body: serde_json::from_str(body)?,
    })
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let key = key.to_string();
        let row = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT key, seq, body FROM documents WHERE collection = ?1 AND key = ?2",
                    params![collection.as_str(), key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
            })
            .await?;
        row.map(|(key, seq, body)| stored(key, seq, &body))
            .transpose()
    }

    async fn put(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            upsert(&tx, collection.as_str(), &document)?;
            tx.commit()
        })
        .await
    }

    async fn put_many(
        &self,
        collection: Collection,
        documents: Vec<Document>,
    ) -> Result<usize, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for document in &documents {
                upsert(&tx, collection.as_str(), document)?;
            }
            tx.commit()?;
            Ok(documents.len())
        })
        .await
    }

    async fn append(&self, collection: Collection, document: Document) -> Result<u64, StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let seq = next_seq(&tx, collection.as_str())?;
            let document = Document {
                key: seq.to_string(),
                ..document
            };
            upsert(&tx, collection.as_str(), &document)?;
            tx.commit()?;
            Ok(seq as u64)
        })
        .await
    }

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        query.check_fields(collection)?;
        let query = query.clone();
        let rows = self
            .with_conn(move |conn| run_query(conn, collection.as_str(), &query))
            .await?;
        rows.into_iter()
            .map(|(key, seq, body)| stored(key, seq, &body))
            .collect()
    }

    async fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        let count: i64 = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                    params![collection.as_str()],
                    |row| row.get(0),
                )
            })
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use aptiq_core::storage::IndexEntry;
    use serde_json::json;

    use super::*;

    fn doc(key: &str, category: &str, tags: &[&str]) -> Document {
        let mut index = vec![IndexEntry::new("category", category)];
        index.extend(tags.iter().map(|t| IndexEntry::new("tags", *t)));
        Document {
            key: key.into(),
            body: json!({ "id": key, "category": category }),
            index,
        }
    }

    fn temp_backend() -> (tempfile::TempDir, SqliteBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::new(dir.path().join("nested").join("aptiq.db"));
        (dir, backend)
    }

    #[tokio::test]
    async fn put_get_and_replace() {
        let (_dir, backend) = temp_backend();
        backend
            .put(Collection::Questions, doc("q1", "english", &[]))
            .await
            .unwrap();
        backend
            .put(Collection::Questions, doc("q2", "reasoning", &[]))
            .await
            .unwrap();
        backend
            .put(Collection::Questions, doc("q1", "quantitative", &[]))
            .await
            .unwrap();

        assert_eq!(backend.count(Collection::Questions).await.unwrap(), 2);
        let q1 = backend
            .get(Collection::Questions, "q1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(q1.seq, 1);
        assert_eq!(q1.body["category"], "quantitative");
        assert!(backend
            .get(Collection::Questions, "nope")
            .await
            .unwrap()
            .is_none());

        let english = Query::all().filter("category", "english");
        assert!(backend
            .query(Collection::Questions, &english)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn query_filters_order_and_paging() {
        let (_dir, backend) = temp_backend();
        let docs = vec![
            doc("a", "english", &["grammar"]),
            doc("b", "english", &["vocab", "grammar"]),
            doc("c", "reasoning", &["grammar"]),
            doc("d", "english", &[]),
        ];
        assert_eq!(
            backend.put_many(Collection::Questions, docs).await.unwrap(),
            4
        );

        let keys = |docs: Vec<StoredDocument>| docs.into_iter().map(|d| d.key).collect::<Vec<_>>();

        let english = Query::all().filter("category", "english");
        assert_eq!(
            keys(backend.query(Collection::Questions, &english).await.unwrap()),
            ["a", "b", "d"]
        );

        let both = Query::all()
            .filter("category", "english")
            .filter("tags", "grammar");
        assert_eq!(
            keys(backend.query(Collection::Questions, &both).await.unwrap()),
            ["a", "b"]
        );

        let page = Query::all().newest_first().offset(1).limit(2);
        assert_eq!(
            keys(backend.query(Collection::Questions, &page).await.unwrap()),
            ["c", "b"]
        );

        let past_end = Query::all().offset(usize::MAX).limit(usize::MAX);
        assert!(backend
            .query(Collection::Questions, &past_end)
            .await
            .unwrap()
            .is_empty());

        let unindexed = Query::all().filter("user_id", "ana");
        let err = backend
            .query(Collection::Questions, &unindexed)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no index on 'user_id'"));
    }

    #[tokio::test]
    async fn append_assigns_increasing_keys() {
        let (_dir, backend) = temp_backend();
        let first = backend
            .append(Collection::QuizSessions, doc("ignored", "x", &[]))
            .await
            .unwrap();
        let second = backend
            .append(Collection::QuizSessions, doc("ignored", "x", &[]))
            .await
            .unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(backend.count(Collection::QuizSessions).await.unwrap(), 2);
        // Collections are independent.
        assert_eq!(backend.count(Collection::Questions).await.unwrap(), 0);

        let latest = backend
            .query(Collection::QuizSessions, &Query::all().newest_first().limit(1))
            .await
            .unwrap();
        assert_eq!(latest[0].key, "2");
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aptiq.db");
        {
            let backend = SqliteBackend::new(&path);
            backend
                .put(Collection::Questions, doc("q1", "english", &["t"]))
                .await
                .unwrap();
        }
        let reopened = SqliteBackend::new(&path);
        let tagged = reopened
            .query(Collection::Questions, &Query::all().filter("tags", "t"))
            .await
            .unwrap();
        assert_eq!(tagged.len(), 1);
    }

    #[tokio::test]
    async fn unopenable_database_is_unavailable_until_fixed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let backend = SqliteBackend::new(blocker.join("aptiq.db"));

        let err = backend.count(Collection::Questions).await.unwrap_err();
        assert!(err.is_unavailable(), "got {err}");

        std::fs::remove_file(&blocker).unwrap();
        assert_eq!(backend.count(Collection::Questions).await.unwrap(), 0);
    }
}
