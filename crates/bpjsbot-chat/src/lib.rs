//! Hosted LLM access for the chatbot.
//!
//! Two models are in play: the SQL model (Groq) writes and rephrases
//! queries, the PDF model (OpenRouter) answers from document excerpts.
//! Both speak the OpenAI chat completions protocol and are streamed.

pub mod client;
pub mod config;
pub mod providers;
pub mod types;

pub use client::{ChatModel, HttpChatModel, UnconfiguredModel};
pub use config::LLMConfig;
pub use types::*;
