//! Chatbot store: conversation history, users, the PDF page index,
//! and read-only access to the database the `/sql` command queries.

pub mod embedding;
pub mod schema;
pub mod sql_database;
pub mod sqlite;
pub mod types;

pub use sql_database::SqlDatabase;
pub use sqlite::SqliteStore;
pub use types::*;
