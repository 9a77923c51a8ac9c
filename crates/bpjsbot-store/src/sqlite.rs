//! SQLite store for chat history, accounts and the PDF page index.
//!
//! One connection behind a mutex. Page embeddings are mirrored into an
//! in-memory normalized matrix so similarity search is a single mat-vec.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::embedding::{decode_f32, encode_f32, normalize};
use crate::schema::{FTS_SCHEMA_SQL, PAGES_SCHEMA_SQL, SCHEMA_SQL};
use crate::types::*;
use bpjsbot_core::{Error, Result};

/// SQLite store backing the chatbot.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    embedding_dim: usize,
    page_matrix: Mutex<PageMatrix>,
}

struct PageMatrix {
    /// Normalized page embeddings, shape (N, dim).
    matrix: Array2<f32>,
    /// Page IDs corresponding to each row.
    page_ids: Vec<i64>,
    /// Whether the matrix needs reloading.
    dirty: bool,
}

/// Current time as an RFC 3339 UTC string with millisecond precision.
///
/// All timestamps share the same format, so they sort lexicographically.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

impl SqliteStore {
    /// Open or create the store at `db_path`.
    pub fn open(db_path: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
            }
        }

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            embedding_dim,
            page_matrix: Mutex::new(PageMatrix {
                matrix: Array2::zeros((0, embedding_dim)),
                page_ids: Vec::new(),
                dirty: true,
            }),
        };

        info!(
            "SqliteStore initialized: {} history rows, {} pages, dim={}, path={}",
            store.count_history()?,
            store.count_pages()?,
            embedding_dim,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}\n{}", SCHEMA_SQL, PAGES_SCHEMA_SQL, FTS_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // History
    // ---------------------------------------------------------------

    /// Append a chat turn. Returns the new row ID.
    pub fn add_chat_turn(
        &self,
        user: &str,
        bot: &str,
        conversation_id: Option<&str>,
        user_question: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO history (user, bot, conversation_id, user_question, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(db_err)?
            .insert(params![user, bot, conversation_id, user_question, now_timestamp()])
            .map_err(db_err)?;
        Ok(id)
    }

    /// All history rows, newest first.
    pub fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM history ORDER BY created_at DESC, id DESC")
            .map_err(db_err)?;
        let rows = stmt.query_map([], Self::row_to_history).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Conversations of a user, most recently active first.
    ///
    /// Only rows carrying a question count; rows written through the bare
    /// `POST /history` endpoint have none.
    pub fn user_conversations(&self, username: &str) -> Result<Vec<ConversationSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT h.conversation_id AS conversation_id, \
                    (SELECT f.user_question FROM history f \
                     WHERE f.conversation_id = h.conversation_id \
                       AND f.user = h.user AND f.user_question IS NOT NULL \
                     ORDER BY f.created_at ASC, f.id ASC LIMIT 1) AS first_message_snippet, \
                    MAX(h.created_at) AS created_at, \
                    h.user AS user \
                 FROM history h \
                 WHERE h.user = ?1 \
                   AND h.user_question IS NOT NULL \
                   AND h.conversation_id IS NOT NULL \
                 GROUP BY h.conversation_id, h.user \
                 ORDER BY created_at DESC, MAX(h.id) DESC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![username], |row| {
                Ok(ConversationSummary {
                    conversation_id: row.get("conversation_id")?,
                    first_message_snippet: row.get("first_message_snippet")?,
                    created_at: row.get("created_at")?,
                    user: row.get("user")?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// All messages of a conversation, oldest first.
    pub fn conversation_messages(&self, conversation_id: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM history WHERE conversation_id = ?1 \
                 ORDER BY created_at ASC, id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![conversation_id], Self::row_to_history)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// The last `limit` turns of a conversation, oldest first.
    pub fn recent_turns(&self, conversation_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM ( \
                    SELECT * FROM history WHERE conversation_id = ?1 \
                    ORDER BY created_at DESC, id DESC LIMIT ?2 \
                 ) ORDER BY created_at ASC, id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![conversation_id, limit as i64], Self::row_to_history)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    pub fn count_history(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))
            .map_err(db_err)
    }

    // ---------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------

    /// Register an account. Fails with `DuplicateUser` if the name is taken.
    pub fn create_user(&self, username: &str, password_hash: &str, role: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let result = conn.prepare_cached("INSERT INTO userss (username, password, role) VALUES (?1, ?2, ?3)")
            .map_err(db_err)?
            .insert(params![username, password_hash, role])
            .map_err(|e| {
                if e.to_string().contains("UNIQUE constraint") {
                    Error::DuplicateUser(username.to_string())
                } else {
                    db_err(e)
                }
            });
        result
    }

    pub fn find_user(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let result = conn.prepare_cached("SELECT id, username, password, role FROM userss WHERE username = ?1")
            .map_err(db_err)?
            .query_row(params![username], |row| {
                Ok(User {
                    id: row.get("id")?,
                    username: row.get("username")?,
                    password_hash: row.get("password")?,
                    role: row.get("role")?,
                })
            })
            .optional()
            .map_err(db_err);
        result
    }

    // ---------------------------------------------------------------
    // PDF page index
    // ---------------------------------------------------------------

    /// Replace the indexed document with `pages` of `filename`.
    ///
    /// Page numbers are the zero-based positions in `pages`. Returns the new
    /// page row IDs in page order.
    pub fn replace_pages(&self, filename: &str, pages: &[String]) -> Result<Vec<i64>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM pdf_pages", []).map_err(db_err)?;

        let now = now_timestamp();
        let mut ids = Vec::with_capacity(pages.len());
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO pdf_pages (filename, page, text, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(db_err)?;
            for (page, text) in pages.iter().enumerate() {
                let id = stmt
                    .insert(params![filename, page as i64, text, now])
                    .map_err(db_err)?;
                ids.push(id);
            }
        }
        tx.commit().map_err(db_err)?;
        drop(conn);

        self.page_matrix.lock().dirty = true;
        debug!("Replaced page index with {} pages of {}", ids.len(), filename);
        Ok(ids)
    }

    /// Store the embedding of a page.
    pub fn add_page_embedding(&self, page_id: i64, embedding: &Array1<f32>) -> Result<()> {
        if embedding.len() != self.embedding_dim {
            return Err(Error::Inference(format!(
                "Embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.embedding_dim
            )));
        }
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO page_embeddings (page_id, embedding) VALUES (?1, ?2)",
            params![page_id, encode_f32(embedding)],
        )
        .map_err(db_err)?;
        drop(conn);
        self.page_matrix.lock().dirty = true;
        Ok(())
    }

    pub fn count_pages(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM pdf_pages", [], |row| row.get(0))
            .map_err(db_err)
    }

    pub fn count_page_embeddings(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM page_embeddings", [], |row| row.get(0))
            .map_err(db_err)
    }

    /// File name of the indexed document, if any.
    pub fn indexed_filename(&self) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row("SELECT filename FROM pdf_pages ORDER BY id LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(db_err)
    }

    pub fn get_page(&self, page_id: i64) -> Result<Option<PdfPage>> {
        let conn = self.conn.lock();
        let result = conn.prepare_cached("SELECT * FROM pdf_pages WHERE id = ?1")
            .map_err(db_err)?
            .query_row(params![page_id], |row| {
                Ok(PdfPage {
                    id: row.get("id")?,
                    filename: row.get("filename")?,
                    page: row.get("page")?,
                    text: row.get("text")?,
                    created_at: row.get("created_at")?,
                })
            })
            .optional()
            .map_err(db_err);
        result
    }

    /// Full-text search over pages using FTS5 BM25 ranking.
    pub fn bm25_search_pages(&self, query: &str, top_k: usize) -> Result<Vec<PageHit>> {
        let fts_query = Self::sanitize_fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT p.id, p.page, p.text, pages_fts.rank AS bm25_score \
                 FROM pages_fts \
                 JOIN pdf_pages p ON p.id = pages_fts.rowid \
                 WHERE pages_fts MATCH ?1 \
                 ORDER BY pages_fts.rank \
                 LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![fts_query, top_k as i64], |row| {
                let bm25_score: f64 = row.get("bm25_score").unwrap_or(0.0);
                Ok(PageHit {
                    page_id: row.get("id")?,
                    page: row.get("page")?,
                    text: row.get("text")?,
                    // FTS5 rank is negative; negate for positive
                    score: -bm25_score,
                })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Quote every token and OR them, so user text never reaches FTS5 syntax.
    fn sanitize_fts_query(query: &str) -> String {
        query
            .split_whitespace()
            .map(|t| t.replace('"', ""))
            .filter(|t| !t.is_empty())
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    fn load_page_matrix(&self) -> Result<()> {
        let mut page_ids = Vec::new();
        let mut rows_data: Vec<Array1<f32>> = Vec::new();

        {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare("SELECT page_id, embedding FROM page_embeddings ORDER BY page_id")
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))
                .map_err(db_err)?;
            for row in rows {
                let (page_id, blob) = row.map_err(db_err)?;
                let emb = decode_f32(&blob);
                if emb.len() != self.embedding_dim {
                    continue;
                }
                if let Some(unit) = normalize(&emb) {
                    page_ids.push(page_id);
                    rows_data.push(unit);
                }
            }
        }

        let mut matrix = Array2::zeros((rows_data.len(), self.embedding_dim));
        for (i, emb) in rows_data.iter().enumerate() {
            matrix.row_mut(i).assign(emb);
        }

        let mut mat = self.page_matrix.lock();
        mat.matrix = matrix;
        mat.page_ids = page_ids;
        mat.dirty = false;
        debug!("Loaded {} page embeddings into matrix", mat.page_ids.len());
        Ok(())
    }

    /// Cosine similarity search over page embeddings.
    pub fn vector_search_pages(
        &self,
        query_embedding: &Array1<f32>,
        top_k: usize,
    ) -> Result<Vec<PageHit>> {
        if self.page_matrix.lock().dirty {
            self.load_page_matrix()?;
        }

        let q = match normalize(query_embedding) {
            Some(q) if q.len() == self.embedding_dim => q,
            _ => return Ok(Vec::new()),
        };

        let top: Vec<(i64, f64)> = {
            let mat = self.page_matrix.lock();
            if mat.matrix.nrows() == 0 {
                return Ok(Vec::new());
            }
            let similarities = mat.matrix.dot(&q);
            let mut indexed: Vec<(usize, f32)> =
                similarities.iter().copied().enumerate().collect();
            indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            indexed.truncate(top_k);
            indexed
                .into_iter()
                .map(|(i, s)| (mat.page_ids[i], s as f64))
                .collect()
        };

        let mut results = Vec::with_capacity(top.len());
        for (page_id, score) in top {
            if let Some(page) = self.get_page(page_id)? {
                results.push(PageHit {
                    page_id: page.id,
                    page: page.page,
                    text: page.text,
                    score,
                });
            }
        }
        Ok(results)
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
        Ok(HistoryEntry {
            id: row.get("id")?,
            user: row.get("user")?,
            bot: row.get("bot")?,
            conversation_id: row.get("conversation_id")?,
            user_question: row.get("user_question")?,
            created_at: row.get("created_at")?,
        })
    }
}
