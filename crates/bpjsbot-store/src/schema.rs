//! Database schema SQL.

/// Chat history and user accounts. Table names match the MySQL schema the
/// web frontend was written against.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user TEXT NOT NULL,
    bot TEXT NOT NULL,
    conversation_id TEXT,
    user_question TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_user ON history(user);
CREATE INDEX IF NOT EXISTS idx_history_conversation ON history(conversation_id);
CREATE INDEX IF NOT EXISTS idx_history_created ON history(created_at);

CREATE TABLE IF NOT EXISTS userss (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'pegawai'
);
"#;

/// Page index for the uploaded PDF: one row per page plus its embedding.
pub const PAGES_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS pdf_pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    page INTEGER NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS page_embeddings (
    page_id INTEGER PRIMARY KEY REFERENCES pdf_pages(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL
);
"#;

/// FTS5 index over page text, used when no embedder is loaded.
pub const FTS_SCHEMA_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS pages_fts USING fts5(
    text,
    content='pdf_pages', content_rowid='id',
    tokenize='unicode61'
);

CREATE TRIGGER IF NOT EXISTS pdf_pages_ai AFTER INSERT ON pdf_pages BEGIN
    INSERT INTO pages_fts(rowid, text) VALUES (new.id, new.text);
END;

CREATE TRIGGER IF NOT EXISTS pdf_pages_ad AFTER DELETE ON pdf_pages BEGIN
    INSERT INTO pages_fts(pages_fts, rowid, text) VALUES ('delete', old.id, old.text);
END;
"#;

/// Tables owned by the page index. Hidden from the `/sql` pipeline even when
/// it shares the application database.
pub const INTERNAL_TABLES: &[&str] = &["pdf_pages", "page_embeddings", "pages_fts"];

/// Whether `name` is an internal table or one of its FTS5 shadow tables.
pub fn is_internal_table(name: &str) -> bool {
    name.starts_with("sqlite_")
        || INTERNAL_TABLES
            .iter()
            .any(|t| name == *t || name.starts_with(&format!("{}_", t)))
}
