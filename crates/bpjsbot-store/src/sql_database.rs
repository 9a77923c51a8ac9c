//! Read-only view of the database that `/sql` questions are answered from.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::schema::is_internal_table;
use bpjsbot_core::{Error, Result};

/// Sample rows appended to each table description.
pub const SAMPLE_ROWS_IN_TABLE_INFO: usize = 3;
/// Rows returned by a single query at most.
pub const MAX_RESULT_ROWS: usize = 100;
/// Sample values longer than this are cut in table descriptions.
const SAMPLE_VALUE_CHARS: usize = 100;

/// A SQLite database opened read-only.
///
/// Write statements are refused twice: by the connection flags and by
/// checking each prepared statement before it runs.
pub struct SqlDatabase {
    conn: Mutex<Connection>,
    path: PathBuf,
    ignore_tables: Vec<String>,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqlDatabase {
    /// Open `path` read-only. Tables in `ignore_tables` are never described
    /// or listed.
    pub fn open(path: impl AsRef<Path>, ignore_tables: Vec<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::Database(format!("Cannot open {}: {}", path.display(), e)))?;

        debug!(
            "SQL database opened read-only: {} (ignoring {:?})",
            path.display(),
            ignore_tables
        );

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            ignore_tables,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_hidden(&self, table: &str) -> bool {
        is_internal_table(table)
            || self
                .ignore_tables
                .iter()
                .any(|t| t.eq_ignore_ascii_case(table))
    }

    /// Names of the tables the model may query, sorted.
    pub fn usable_table_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT name FROM sqlite_master \
                 WHERE type IN ('table', 'view') ORDER BY name",
            )
            .map_err(db_err)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(names.into_iter().filter(|n| !self.is_hidden(n)).collect())
    }

    /// Schema description handed to the model: each table's CREATE
    /// statement followed by a few sample rows.
    pub fn table_info(&self) -> Result<String> {
        let tables = self.usable_table_names()?;
        let conn = self.conn.lock();

        let mut blocks = Vec::with_capacity(tables.len());
        for table in &tables {
            let create_sql: Option<String> = conn
                .query_row(
                    "SELECT sql FROM sqlite_master WHERE name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .map_err(db_err)?;
            let create_sql = match create_sql {
                Some(sql) => sql,
                None => continue,
            };

            let sample = match Self::sample_rows(&conn, table) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("Could not sample rows of {}: {}", table, e);
                    String::new()
                }
            };
            blocks.push(format!(
                "\n{}\n\n/*\n{} rows from {} table:\n{}*/",
                create_sql.trim(),
                SAMPLE_ROWS_IN_TABLE_INFO,
                table,
                sample
            ));
        }
        Ok(blocks.join("\n\n"))
    }

    fn sample_rows(conn: &Connection, table: &str) -> Result<String> {
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_ident(table),
            SAMPLE_ROWS_IN_TABLE_INFO
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut out = columns.join("\t");
        out.push('\n');

        let mut rows = stmt.query([]).map_err(db_err)?;
        while let Some(row) = rows.next().map_err(db_err)? {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let cell = match row.get_ref(i).map_err(db_err)? {
                    ValueRef::Null => "None".to_string(),
                    ValueRef::Integer(v) => v.to_string(),
                    ValueRef::Real(v) => v.to_string(),
                    ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
                    ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
                };
                cells.push(cell.chars().take(SAMPLE_VALUE_CHARS).collect::<String>());
            }
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        Ok(out)
    }

    /// Run a single read-only statement and return its rows as JSON objects
    /// keyed by column name.
    pub fn run_query(&self, sql: &str) -> Result<Vec<Map<String, Value>>> {
        let sql = sql.trim().trim_end_matches(';').trim();
        if sql.is_empty() {
            return Err(Error::RejectedQuery("empty query".to_string()));
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        if !stmt.readonly() {
            return Err(Error::RejectedQuery(format!(
                "only read-only statements are allowed: {}",
                sql
            )));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query([]).map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().map_err(db_err)? {
            if results.len() >= MAX_RESULT_ROWS {
                debug!("Query result truncated at {} rows", MAX_RESULT_ROWS);
                break;
            }
            let mut obj = Map::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                let value = match row.get_ref(i).map_err(db_err)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(v) => Value::from(v),
                    ValueRef::Real(v) => serde_json::Number::from_f64(v)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                    ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => Value::String(hex::encode(b)),
                };
                obj.insert(name.clone(), value);
            }
            results.push(obj);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteStore;
    use tempfile::TempDir;

    fn seeded_db() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chatbot.db");
        // Creates history, userss and the page index tables
        SqliteStore::open(&path, 4).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE keluhan (id INTEGER PRIMARY KEY, kota TEXT, jumlah INTEGER);
             INSERT INTO keluhan (kota, jumlah) VALUES ('Bandung', 12), ('Medan', 7),
                 ('Surabaya', 30), ('Makassar', 4);",
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn test_usable_tables_hide_internal_and_ignored() {
        let (_dir, path) = seeded_db();
        let db = SqlDatabase::open(&path, vec!["userss".to_string()]).unwrap();

        let tables = db.usable_table_names().unwrap();
        assert_eq!(tables, vec!["history".to_string(), "keluhan".to_string()]);
    }

    #[test]
    fn test_table_info_has_schema_and_samples() {
        let (_dir, path) = seeded_db();
        let db = SqlDatabase::open(&path, vec!["userss".to_string(), "history".to_string()]).unwrap();

        let info = db.table_info().unwrap();
        assert!(info.contains("CREATE TABLE keluhan"));
        assert!(info.contains("3 rows from keluhan table:"));
        assert!(info.contains("id\tkota\tjumlah"));
        assert!(info.contains("Bandung"));
        // Only the first three rows are sampled
        assert!(!info.contains("Makassar"));
        assert!(!info.contains("userss"));
    }

    #[test]
    fn test_run_query_rows_as_objects() {
        let (_dir, path) = seeded_db();
        let db = SqlDatabase::open(&path, vec![]).unwrap();

        let rows = db
            .run_query("SELECT kota, jumlah FROM keluhan WHERE jumlah > 10 ORDER BY jumlah DESC;")
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["kota"], "Surabaya");
        assert_eq!(rows[0]["jumlah"], 30);
    }

    #[test]
    fn test_write_statements_rejected() {
        let (_dir, path) = seeded_db();
        let db = SqlDatabase::open(&path, vec![]).unwrap();

        let err = db.run_query("DELETE FROM keluhan").unwrap_err();
        assert!(matches!(err, Error::RejectedQuery(_)));
        assert!(db.run_query("   ").is_err());

        let rows = db.run_query("SELECT COUNT(*) AS n FROM keluhan").unwrap();
        assert_eq!(rows[0]["n"], 4);
    }

    #[test]
    fn test_invalid_sql_is_database_error() {
        let (_dir, path) = seeded_db();
        let db = SqlDatabase::open(&path, vec![]).unwrap();
        let err = db.run_query("SELECT * FROM tidak_ada").unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }
}
