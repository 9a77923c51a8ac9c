//! Core types of the BPJS chatbot: configuration, the error type and password hashing.

pub mod config;
pub mod error;
pub mod password;

pub use config::{ChatbotConfig, DataPaths};
pub use error::{Error, Result};
