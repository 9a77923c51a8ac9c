//! Answer pipelines behind `/chat`.
//!
//! `Command::parse` decides the strategy, `ChatRouter` runs it:
//! `/sql` questions go through `SqlChain`, `/pdf` questions through
//! `PdfAnswerer`. Anything else gets the usage text.

pub mod examples;
pub mod pdf_qa;
pub mod prompts;
pub mod router;
pub mod sql_chain;

pub use examples::{ExampleSelector, SqlExample};
pub use pdf_qa::PdfAnswerer;
pub use router::{ChatRouter, Command};
pub use sql_chain::SqlChain;

#[cfg(test)]
pub(crate) mod testing;
