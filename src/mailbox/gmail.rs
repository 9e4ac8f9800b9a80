//! Gmail REST implementation of the [`Mailbox`] capability.
//!
//! Talks to the `users/me/messages` endpoints with a bearer token. Token
//! acquisition and refresh belong to the auth layer upstream; this client
//! only spends the token it is given.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::MailboxError;
use crate::mailbox::body::{extract_plain_text, MimePart};
use crate::mailbox::{Mailbox, MessageRef, RawMessage};

const GMAIL_API_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail REST client.
pub struct GmailClient {
    http: reqwest::Client,
    token: SecretString,
    base_url: String,
    max_body_chars: usize,
}

impl GmailClient {
    pub fn new(token: SecretString, config: &PipelineConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            base_url: GMAIL_API_URL.to_string(),
            max_body_chars: config.max_body_chars,
        }
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, MailboxError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MailboxError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn list(&self, query: &str, max: usize) -> Result<Vec<MessageRef>, MailboxError> {
        let url = format!("{}/users/me/messages", self.base_url);
        debug!(query, max, "Listing mailbox messages");

        let listing: MessageListing = self
            .get_json(
                &url,
                &[
                    ("q", query.to_string()),
                    ("maxResults", max.to_string()),
                ],
            )
            .await
            .map_err(|e| MailboxError::ListFailed(e.to_string()))?;

        Ok(listing
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageRef(m.id))
            .collect())
    }

    async fn fetch(&self, id: &MessageRef) -> Result<RawMessage, MailboxError> {
        let url = format!("{}/users/me/messages/{}", self.base_url, id);

        let full: FullMessage = self
            .get_json(&url, &[("format", "full".to_string())])
            .await
            .map_err(|e| MailboxError::FetchFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        let payload = full.payload.unwrap_or_default();
        let body = extract_plain_text(&payload, self.max_body_chars);

        Ok(RawMessage {
            id: id.clone(),
            subject: payload.header("Subject"),
            sender: payload.header("From"),
            date: payload.header("Date"),
            body,
            snippet: full.snippet.unwrap_or_default(),
        })
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessageListing {
    #[serde(default)]
    messages: Option<Vec<ListedMessage>>,
}

#[derive(Debug, Deserialize)]
struct ListedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FullMessage {
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    payload: Option<MimePart>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_without_messages_field_is_empty() {
        let listing: MessageListing = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(listing.messages.unwrap_or_default().is_empty());
    }

    #[test]
    fn full_message_parses_payload_tree() {
        let json = r#"{
            "id": "abc",
            "snippet": "Drive on Friday",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    {"name": "Subject", "value": "Placement drive"},
                    {"name": "From", "value": "office@campus.edu"},
                    {"name": "Date", "value": "Mon, 4 Aug 2025 10:00:00 +0530"}
                ],
                "parts": [
                    {"mimeType": "text/plain", "body": {"data": "RHJpdmUgb24gRnJpZGF5"}}
                ]
            }
        }"#;
        let full: FullMessage = serde_json::from_str(json).unwrap();
        let payload = full.payload.unwrap();
        assert_eq!(payload.header("Subject"), "Placement drive");
        assert_eq!(extract_plain_text(&payload, 2000), "Drive on Friday");
    }
}
