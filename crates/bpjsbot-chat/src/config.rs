//! LLM provider settings: `llm-config.json` first, environment second.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{LLMProvider, ModelSettings};

pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_OPENROUTER_MODEL: &str = "deepseek/deepseek-r1-0528:free";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENROUTER_REFERER: &str = "http://localhost:5000";
pub const DEFAULT_OPENROUTER_TITLE: &str = "BPJS Chatbot";

/// Query generation must be deterministic and short.
const SQL_TEMPERATURE: f64 = 0.0;
const SQL_MAX_TOKENS: usize = 300;
const SQL_TIMEOUT: Duration = Duration::from_secs(10);
/// Reasoning models on the free tier are slow to finish.
const PDF_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRIES: u32 = 2;

/// Stored provider configuration. Every field is optional; missing values
/// come from the environment, then from defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub groq_model: Option<String>,
    #[serde(default)]
    pub openrouter_api_key: Option<String>,
    #[serde(default)]
    pub openrouter_model: Option<String>,
    #[serde(default)]
    pub openrouter_referer: Option<String>,
    #[serde(default)]
    pub openrouter_title: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_model: Option<String>,
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config = Self::from_file(config_path);
        config.fill_from(|name| std::env::var(name).ok());
        config
    }

    /// Settings from the JSON file alone. A missing file yields empty
    /// settings; an unreadable or malformed one is logged and ignored.
    pub fn from_file(config_path: &Path) -> Self {
        if !config_path.exists() {
            return Self::default();
        }
        let parsed = std::fs::read_to_string(config_path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<LLMConfig>(&raw).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => {
                info!("Loaded LLM config from {}", config_path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Ignoring malformed LLM config {}: {}",
                    config_path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Fill unset fields through `lookup`. Blank values count as unset.
    pub fn fill_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let fields: [(&mut Option<String>, &str); 8] = [
            (&mut self.groq_api_key, "GROQ_API_KEY"),
            (&mut self.groq_model, "GROQ_MODEL"),
            (&mut self.openrouter_api_key, "OPENROUTER_API_KEY"),
            (&mut self.openrouter_model, "OPENROUTER_MODEL"),
            (&mut self.openrouter_referer, "OPENROUTER_REFERER"),
            (&mut self.openrouter_title, "OPENROUTER_TITLE"),
            (&mut self.openai_api_key, "OPENAI_API_KEY"),
            (&mut self.openai_model, "OPENAI_MODEL"),
        ];
        for (field, name) in fields {
            if field.is_none() {
                *field = get(name);
            }
        }
    }

    fn openai_fallback(&self) -> Option<ModelSettings> {
        self.openai_api_key.as_ref().map(|key| {
            ModelSettings::new(
                LLMProvider::OpenAI,
                self.openai_model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL),
                key.clone(),
            )
        })
    }

    /// Model that writes SQL and phrases query results: Groq, else OpenAI.
    pub fn sql_model(&self) -> Option<ModelSettings> {
        let mut settings = match &self.groq_api_key {
            Some(key) => ModelSettings::new(
                LLMProvider::Groq,
                self.groq_model.as_deref().unwrap_or(DEFAULT_GROQ_MODEL),
                key.clone(),
            ),
            None => self.openai_fallback()?,
        };
        settings.temperature = Some(SQL_TEMPERATURE);
        settings.max_tokens = Some(SQL_MAX_TOKENS);
        settings.timeout = SQL_TIMEOUT;
        settings.max_retries = MAX_RETRIES;
        debug!("SQL model: {} {}", settings.provider, settings.model);
        Some(settings)
    }

    /// Model that answers from PDF excerpts: OpenRouter, else OpenAI.
    pub fn pdf_model(&self) -> Option<ModelSettings> {
        let mut settings = match &self.openrouter_api_key {
            Some(key) => {
                let mut s = ModelSettings::new(
                    LLMProvider::OpenRouter,
                    self.openrouter_model
                        .as_deref()
                        .unwrap_or(DEFAULT_OPENROUTER_MODEL),
                    key.clone(),
                );
                s.headers = vec![
                    (
                        "HTTP-Referer".to_string(),
                        self.openrouter_referer
                            .clone()
                            .unwrap_or_else(|| DEFAULT_OPENROUTER_REFERER.to_string()),
                    ),
                    (
                        "X-Title".to_string(),
                        self.openrouter_title
                            .clone()
                            .unwrap_or_else(|| DEFAULT_OPENROUTER_TITLE.to_string()),
                    ),
                ];
                s
            }
            None => self.openai_fallback()?,
        };
        settings.timeout = PDF_TIMEOUT;
        settings.max_retries = MAX_RETRIES;
        debug!("PDF model: {} {}", settings.provider, settings.model);
        Some(settings)
    }
}
