//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::password::DEFAULT_ITERATIONS;

/// File name of the PDF loaded at startup when the page index is empty.
pub const DEFAULT_PDF_NAME: &str = "sop_bpjs.pdf";

/// Paths to all chatbot data files and directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Application database holding history, users and the page index.
    pub database: PathBuf,
    /// Uploaded PDF documents (`data/uploads/`).
    pub uploads: PathBuf,
    /// ONNX embedding model directory (`data/models/`).
    pub models: PathBuf,
    /// Optional few-shot SQL examples (`data/sql-examples.json`).
    pub sql_examples_file: PathBuf,
    /// Optional LLM provider settings (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            database: root.join("chatbot.db"),
            uploads: root.join("uploads"),
            models: root.join("models"),
            sql_examples_file: root.join("sql-examples.json"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.uploads)?;
        std::fs::create_dir_all(&self.models)?;
        Ok(())
    }

    /// Path of the document indexed at startup.
    pub fn default_pdf(&self) -> PathBuf {
        self.uploads.join(DEFAULT_PDF_NAME)
    }
}

/// Top-level chatbot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Database the `/sql` pipeline queries. Defaults to the application database.
    pub sql_database: PathBuf,
    /// Tables hidden from the SQL pipeline and `GET /tables`.
    pub sql_ignore_tables: Vec<String>,
    /// Previous turns of a conversation fed back to the SQL prompt.
    pub history_window: usize,
    /// Embedding dimension (384 for all-MiniLM-L6-v2).
    pub embedding_dim: usize,
    /// PBKDF2 rounds for newly registered passwords.
    pub password_iterations: u32,
}

impl ChatbotConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000);

        let data_paths = DataPaths::new(data_dir)?;

        let sql_database = std::env::var("BPJSBOT_SQL_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_paths.database.clone());

        let sql_ignore_tables = std::env::var("BPJSBOT_SQL_IGNORE_TABLES")
            .map(|v| parse_table_list(&v))
            .unwrap_or_else(|_| vec!["userss".to_string()]);

        let history_window = std::env::var("BPJSBOT_HISTORY_WINDOW")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let password_iterations = std::env::var("BPJSBOT_PASSWORD_ITERATIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_ITERATIONS);

        Ok(Self {
            port,
            data_paths,
            sql_database,
            sql_ignore_tables,
            history_window,
            embedding_dim: 384,
            password_iterations,
        })
    }
}

/// Parse a comma-separated table list, dropping blanks.
pub fn parse_table_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
