//! Message enrichment — structured summaries from a language-model service.
//!
//! Two implementations sit behind the [`Enricher`] trait, selected once at
//! construction: [`LiveEnricher`] when a credential is configured, otherwise
//! [`FallbackEnricher`], which keeps the pipeline running in degraded mode.

pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::config::PipelineConfig;
use crate::error::EnrichError;
use crate::mailbox::body::truncate_chars;
use openai::OpenAiClient;

/// Category used by the degraded fallback path.
pub const FALLBACK_CATEGORY: &str = "misc";

const SYSTEM_PROMPT: &str = r#"You are a highly specialized AI assistant for academic and recruitment analysis.
Return ONLY a valid JSON object.
RULES:
- summary, category: Always present, non-empty strings.
- deadline: Use YYYY-MM-DD format or null.
- otherLinks: Must be an array of strings [].
- eligibility, timings, salary, location, eventDetails, requirements: Must be a single string with \n• bullet points.
- company, role, applyLink, description, attachmentSummary: Use a string or null.
- If data is missing, use null (not empty string)."#;

/// Structured summary of one message.
///
/// `summary` and `category` are always present, including on the fallback
/// path. Every other field is present-or-absent, never empty-string-as-
/// absent; nulls on the wire deserialize to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    pub summary: String,
    pub category: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// ISO date (`YYYY-MM-DD`) or absent.
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub apply_link: Option<String>,
    #[serde(default)]
    pub other_links: Vec<String>,
    #[serde(default)]
    pub eligibility: Option<String>,
    #[serde(default)]
    pub timings: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub event_details: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attachment_summary: Option<String>,
}

impl EnrichmentResult {
    /// Degraded result used when no enrichment credential is configured.
    pub fn fallback(subject: &str) -> Self {
        Self {
            summary: subject.to_string(),
            category: FALLBACK_CATEGORY.to_string(),
            company: None,
            role: None,
            deadline: None,
            apply_link: None,
            other_links: Vec::new(),
            eligibility: None,
            timings: None,
            salary: None,
            location: None,
            event_details: None,
            requirements: None,
            description: None,
            attachment_summary: None,
        }
    }
}

/// Raw completion transport, implemented by [`OpenAiClient`] in production
/// and by counting stubs in tests.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    /// One request/response call expected to return a single JSON document.
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, EnrichError>;
}

/// Enrichment capability consumed by the pipeline workers.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn analyze(
        &self,
        requester: &str,
        subject: &str,
        snippet: &str,
        body: &str,
    ) -> Result<EnrichmentResult, EnrichError>;
}

/// Select the enricher implementation from credential presence.
///
/// A missing credential is a legitimate configuration state, not an error:
/// the fallback keeps every pipeline operation functional.
pub fn create_enricher(
    api_key: Option<SecretString>,
    cache: Arc<TtlCache<EnrichmentResult>>,
    config: &PipelineConfig,
) -> Arc<dyn Enricher> {
    match api_key {
        Some(key) => {
            info!(model = %config.model, "Enrichment enabled");
            let backend = Arc::new(OpenAiClient::new(key, &config.model));
            Arc::new(LiveEnricher::new(backend, cache, config))
        }
        None => {
            info!("No enrichment credential configured, running degraded");
            Arc::new(FallbackEnricher)
        }
    }
}

// ── Live implementation ─────────────────────────────────────────────

/// Enricher backed by the external service, fronted by the TTL cache.
pub struct LiveEnricher {
    backend: Arc<dyn SummaryBackend>,
    cache: Arc<TtlCache<EnrichmentResult>>,
    cache_ttl: Duration,
    cache_key_max_chars: usize,
    max_prompt_body_chars: usize,
}

impl LiveEnricher {
    pub fn new(
        backend: Arc<dyn SummaryBackend>,
        cache: Arc<TtlCache<EnrichmentResult>>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            cache_ttl: config.cache_ttl,
            cache_key_max_chars: config.cache_key_max_chars,
            max_prompt_body_chars: config.max_prompt_body_chars,
        }
    }

    /// Derive the cache key from requester + subject + snippet, bounded to
    /// a fixed prefix length so lookups stay cheap and stable across runs.
    ///
    /// Subjects sharing a long common prefix can therefore collide onto one
    /// entry. Accepted tradeoff, kept from the original behavior.
    fn cache_key(&self, requester: &str, subject: &str, snippet: &str) -> String {
        let key = format!("user:{requester}:{subject}:{snippet}");
        truncate_chars(&key, self.cache_key_max_chars, "")
    }
}

#[async_trait]
impl Enricher for LiveEnricher {
    async fn analyze(
        &self,
        requester: &str,
        subject: &str,
        snippet: &str,
        body: &str,
    ) -> Result<EnrichmentResult, EnrichError> {
        let key = self.cache_key(requester, subject, snippet);
        if let Some(cached) = self.cache.get(&key) {
            debug!(%key, "Enrichment cache hit");
            return Ok(cached);
        }

        // Cap request cost and latency variance before prompt assembly.
        let truncated_body = truncate_chars(body, self.max_prompt_body_chars, "...");
        let user_prompt =
            format!("Subject: {subject}\nSnippet: {snippet}\nBody: {truncated_body}");

        let content = self.backend.complete_json(SYSTEM_PROMPT, &user_prompt).await?;

        // Strict parse: a malformed document is an error for this message
        // and must not be cached.
        let result: EnrichmentResult = serde_json::from_str(&content)?;

        self.cache.set(&key, result.clone(), self.cache_ttl);
        Ok(result)
    }
}

// ── Degraded implementation ─────────────────────────────────────────

/// Enricher used when no credential is configured.
pub struct FallbackEnricher;

#[async_trait]
impl Enricher for FallbackEnricher {
    async fn analyze(
        &self,
        _requester: &str,
        subject: &str,
        _snippet: &str,
        _body: &str,
    ) -> Result<EnrichmentResult, EnrichError> {
        Ok(EnrichmentResult::fallback(subject))
    }
}
