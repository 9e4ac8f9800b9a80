//! Mailsense — mailbox ingestion, AI enrichment, and result streaming.

pub mod cache;
pub mod config;
pub mod enrich;
pub mod error;
pub mod mailbox;
pub mod pipeline;
pub mod server;
pub mod stream;
