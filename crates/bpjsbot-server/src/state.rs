//! Shared application state.

use std::sync::Arc;

use bpjsbot_chat::{ChatModel, HttpChatModel, LLMConfig, UnconfiguredModel};
use bpjsbot_core::{ChatbotConfig, Result};
use bpjsbot_infer::Embedder;
use bpjsbot_ingest::PageIndexer;
use bpjsbot_runtime::examples::load_examples;
use bpjsbot_runtime::{ChatRouter, ExampleSelector, PdfAnswerer, SqlChain};
use bpjsbot_store::{SqlDatabase, SqliteStore};
use tracing::{info, warn};

/// The two hosted models the pipelines call.
pub struct Models {
    pub sql: Arc<dyn ChatModel>,
    pub pdf: Arc<dyn ChatModel>,
}

impl Models {
    /// HTTP models for every configured provider; placeholders that fail
    /// with a clear message for the rest.
    pub fn from_config(llm: &LLMConfig) -> Self {
        let client = reqwest::Client::new();

        let sql: Arc<dyn ChatModel> = match llm.sql_model() {
            Some(settings) => Arc::new(HttpChatModel::new(client.clone(), settings)),
            None => {
                warn!("GROQ_API_KEY is not set; /sql commands will fail");
                Arc::new(UnconfiguredModel::new("GROQ_API_KEY"))
            }
        };
        let pdf: Arc<dyn ChatModel> = match llm.pdf_model() {
            Some(settings) => Arc::new(HttpChatModel::new(client, settings)),
            None => {
                warn!("OPENROUTER_API_KEY is not set; /pdf commands will fail");
                Arc::new(UnconfiguredModel::new("OPENROUTER_API_KEY"))
            }
        };

        info!("SQL model: {}, PDF model: {}", sql.describe(), pdf.describe());
        Self { sql, pdf }
    }
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ChatbotConfig,
    pub store: Arc<SqliteStore>,
    pub sql_db: Arc<SqlDatabase>,
    pub embedder: Arc<dyn Embedder>,
    pub router: ChatRouter,
    pub indexer: Arc<PageIndexer>,
    /// One upload replaces the page index at a time.
    pub upload_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    pub fn new(config: ChatbotConfig, embedder: Arc<dyn Embedder>, models: Models) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(
            &config.data_paths.database,
            config.embedding_dim,
        )?);
        // Opened after the store so the application database exists
        let sql_db = Arc::new(SqlDatabase::open(
            &config.sql_database,
            config.sql_ignore_tables.clone(),
        )?);

        let examples = load_examples(&config.data_paths.sql_examples_file)?;
        let selector = ExampleSelector::new(examples, embedder.clone());

        let router = ChatRouter::new(
            SqlChain::new(
                sql_db.clone(),
                store.clone(),
                models.sql,
                selector,
                config.history_window,
            ),
            PdfAnswerer::new(store.clone(), embedder.clone(), models.pdf),
        );
        let indexer = Arc::new(PageIndexer::new(store.clone(), embedder.clone()));

        Ok(Self {
            config,
            store,
            sql_db,
            embedder,
            router,
            indexer,
            upload_lock: tokio::sync::Mutex::new(()),
        })
    }
}
