//! BPJS chatbot: `/sql` and `/pdf` commands over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use bpjsbot_chat::LLMConfig;
use bpjsbot_server::{build_router, AppState, Models};
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn resolve_data_dir() -> PathBuf {
    std::env::var("BPJSBOT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--help" | "-h" | "help" => {
                println!("BPJS chatbot server");
                println!();
                println!("Usage: bpjsbot");
                println!();
                println!("Environment:");
                println!("  BPJSBOT_DATA_DIR             Data directory (default: data)");
                println!("  PORT                         HTTP port (default: 5000)");
                println!("  BPJSBOT_SQL_DATABASE         Database queried by /sql");
                println!("  BPJSBOT_SQL_IGNORE_TABLES    Tables hidden from /sql (default: userss)");
                println!("  GROQ_API_KEY, GROQ_MODEL     Model for /sql");
                println!("  OPENROUTER_API_KEY, OPENROUTER_MODEL  Model for /pdf");
                println!("  OPENAI_API_KEY, OPENAI_MODEL Fallback for both");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}. Use 'bpjsbot help' for usage.", arg);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = bpjsbot_core::ChatbotConfig::from_env(&data_dir)?;
    let port = config.port;
    let default_pdf = config.data_paths.default_pdf();

    // ONNX if the model files are present, otherwise full-text search only
    let embedder = bpjsbot_infer::create_embedder(&config.data_paths.models);

    let llm = LLMConfig::load(&config.data_paths.llm_config_file);
    let models = Models::from_config(&llm);

    let state = Arc::new(
        AppState::new(config, embedder, models)
            .map_err(|e| anyhow::anyhow!("Failed to initialize: {}", e))?,
    );

    let indexer = state.indexer.clone();
    match tokio::task::spawn_blocking(move || indexer.load_initial(&default_pdf)).await {
        Ok(Some(report)) => info!(
            "Indexed {}: {} pages, {} embedded",
            report.filename, report.pages, report.embedded
        ),
        Ok(None) => {}
        Err(e) => warn!("Startup indexing did not finish: {}", e),
    }

    match state.sql_db.usable_table_names() {
        Ok(tables) => info!("Tables available to /sql: {:?}", tables),
        Err(e) => warn!("Could not list tables: {}", e),
    }

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("BPJS chatbot listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
