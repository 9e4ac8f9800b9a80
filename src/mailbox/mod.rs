//! Mailbox capability — listing and fetching remote messages.
//!
//! The pipeline consumes the [`Mailbox`] trait and never assumes a
//! particular transport. [`gmail::GmailClient`] is the production
//! implementation; tests substitute in-memory stubs.

pub mod body;
pub mod gmail;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MailboxError;

/// Opaque provider-assigned message identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub String);

impl MessageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fetched and parsed content of one message.
///
/// Built per fetch call and consumed immediately by enrichment; never
/// persisted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: MessageRef,
    /// First header literally named `Subject`, or empty.
    pub subject: String,
    /// First `From` header, or empty.
    pub sender: String,
    /// Provider-formatted `Date` header, or empty.
    pub date: String,
    /// Cleaned plain-text body (whitespace-collapsed, bounded length).
    pub body: String,
    /// Short provider-generated preview.
    pub snippet: String,
}

/// Capability interface over the remote mailbox.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// List up to `max` message identifiers matching the provider-specific
    /// search expression `query`. The query is opaque to the pipeline.
    async fn list(&self, query: &str, max: usize) -> Result<Vec<MessageRef>, MailboxError>;

    /// Fetch and parse the full content of one message.
    async fn fetch(&self, id: &MessageRef) -> Result<RawMessage, MailboxError>;
}
