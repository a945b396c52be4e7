//! IBM Watsonx Granite client
//!
//! IAM API-key exchange for a bearer token, cached until shortly before it
//! expires, then text generation with a TTL response cache in front.

use super::{
    build_prompt, cache_key, fallback_answer, post_process, GeneratedAnswer, GenerationContext,
    LlmStats, ResponseGenerator,
};
use crate::config::LlmConfig;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Watsonx API version date
pub const API_VERSION: &str = "2023-05-29";

/// Confidence of a model answer
pub const MODEL_CONFIDENCE: f64 = 0.92;

/// Source label of a model answer
pub const MODEL_SOURCE: &str = "IBM Watsonx Granite LLM";

/// Seconds a token is treated as expired before the server says so
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

fn default_expires_in() -> i64 {
    3600
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParameters {
    /// Output length cap
    pub max_new_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling mass
    pub top_p: f64,
    /// Top-k sampling
    pub top_k: u32,
    /// Penalty on repeated tokens
    pub repetition_penalty: f64,
    /// Sequences that end generation
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: 1000,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 50,
            repetition_penalty: 1.1,
            stop_sequences: ["Human:", "User:", "\n\nHuman:", "\n\nUser:"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model_id: &'a str,
    input: String,
    parameters: &'a GenerationParameters,
    project_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    results: Vec<GenerationResult>,
}

#[derive(Debug, Deserialize)]
struct GenerationResult {
    generated_text: String,
    #[serde(default)]
    generated_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Failures talking to IBM Cloud. Never surfaced to callers of
/// [`ResponseGenerator::generate`]; logged and replaced by the fallback.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or timeout
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IAM refused the key
    #[error("Authentication failed with status {0}")]
    Auth(u16),

    /// Generation endpoint returned a non-success status
    #[error("Watsonx API error: {0}")]
    Status(u16),

    /// Response carried no results
    #[error("Invalid Watsonx response format")]
    MissingResults,
}

/// Watsonx text generation client
pub struct WatsonxClient {
    config: LlmConfig,
    http: reqwest::Client,
    parameters: GenerationParameters,
    token: Mutex<Option<AccessToken>>,
    cache: Cache<String, GeneratedAnswer>,
}

impl WatsonxClient {
    /// Create a client; it is available only with an API key and project id
    pub fn new(config: LlmConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build()?;
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        if config.is_configured() {
            info!("IBM Watsonx API configured (model {})", config.model_id);
        } else {
            warn!("IBM Watsonx API key not found - using fallback mode");
        }

        Ok(Self {
            config,
            http,
            parameters: GenerationParameters::default(),
            token: Mutex::new(None),
            cache,
        })
    }

    /// Replace the sampling parameters
    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Settings in use
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn cached_token(&self) -> Option<AccessToken> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    /// Bearer token, fetched from IAM when missing or expired
    async fn access_token(&self) -> Result<String, Error> {
        if let Some(token) = self.cached_token().filter(AccessToken::is_valid) {
            return Ok(token.value);
        }

        let response = self
            .http
            .post(&self.config.iam_url)
            .timeout(Duration::from_secs(self.config.auth_timeout_secs))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "urn:ibm:params:oauth:grant-type:apikey"),
                ("apikey", self.config.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Auth(response.status().as_u16()));
        }

        let body: TokenResponse = response.json().await?;
        let token = AccessToken {
            value: body.access_token,
            expires_at: Utc::now()
                + ChronoDuration::seconds(body.expires_in - TOKEN_EXPIRY_MARGIN_SECS),
        };
        info!("IBM Watsonx authentication successful");

        let value = token.value.clone();
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(token);
        }
        Ok(value)
    }

    async fn request_generation(
        &self,
        query: &str,
        context: &GenerationContext,
    ) -> Result<GeneratedAnswer, Error> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/ml/v1/text/generation?version={}",
            self.config.endpoint(),
            API_VERSION
        );
        let payload = GenerationRequest {
            model_id: &self.config.model_id,
            input: build_prompt(query, context),
            parameters: &self.parameters,
            project_id: &self.config.project_id,
        };

        debug!("Generating Watsonx response for: {}", truncate(query, 50));

        let response = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Status(response.status().as_u16()));
        }

        let body: GenerationResponse = response.json().await?;
        let result = body.results.into_iter().next().ok_or(Error::MissingResults)?;

        info!("Watsonx response generated ({} tokens)", result.generated_token_count);

        Ok(GeneratedAnswer {
            answer: post_process(&result.generated_text),
            confidence: MODEL_CONFIDENCE,
            source: MODEL_SOURCE.to_string(),
            model: self.config.model_id.clone(),
            tokens_used: result.generated_token_count,
            cached: false,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl ResponseGenerator for WatsonxClient {
    async fn generate(&self, query: &str, context: &GenerationContext) -> GeneratedAnswer {
        let key = cache_key(query, context);
        if let Some(mut hit) = self.cache.get(&key) {
            debug!("Returning cached Watsonx response");
            hit.cached = true;
            return hit;
        }

        if !self.is_available() {
            return fallback_answer(query, context);
        }

        match self.request_generation(query, context).await {
            Ok(answer) => {
                self.cache.insert(key, answer.clone());
                answer
            }
            Err(e) => {
                error!("Watsonx generation failed: {}", e);
                fallback_answer(query, context)
            }
        }
    }

    fn is_available(&self) -> bool {
        self.config.is_configured()
    }

    fn stats(&self) -> LlmStats {
        let token = self.cached_token();
        LlmStats {
            is_available: self.is_available(),
            model: self.config.model_id.clone(),
            region: self.config.region.clone(),
            cache_size: self.cache.entry_count(),
            authenticated: token.is_some(),
            token_valid: token.as_ref().is_some_and(AccessToken::is_valid),
        }
    }

    fn clear_cache(&self) {
        self.cache.invalidate_all();
        info!("Watsonx response cache cleared");
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FALLBACK_SOURCE;

    #[tokio::test]
    async fn test_unconfigured_client_falls_back() {
        let client = WatsonxClient::new(LlmConfig::default()).unwrap();
        assert!(!client.is_available());

        let answer = client.generate("aphids?", &GenerationContext::default()).await;
        assert_eq!(answer.source, FALLBACK_SOURCE);
        assert_eq!(answer.model, "offline");
    }

    #[test]
    fn test_stats_without_token() {
        let config = LlmConfig {
            api_key: "key".into(),
            project_id: "project".into(),
            ..Default::default()
        };
        let client = WatsonxClient::new(config).unwrap();
        let stats = client.stats();

        assert!(stats.is_available);
        assert_eq!(stats.model, "ibm/granite-3-8b-instruct");
        assert_eq!(stats.region, "us-south");
        assert_eq!(stats.cache_size, 0);
        assert!(!stats.authenticated);
        assert!(!stats.token_valid);
    }

    #[test]
    fn test_token_validity() {
        let fresh = AccessToken {
            value: "t".into(),
            expires_at: Utc::now() + ChronoDuration::seconds(30),
        };
        let stale = AccessToken {
            value: "t".into(),
            expires_at: Utc::now() - ChronoDuration::seconds(1),
        };
        assert!(fresh.is_valid());
        assert!(!stale.is_valid());
    }

    #[test]
    fn test_default_parameters_serialize() {
        let json = serde_json::to_value(GenerationParameters::default()).unwrap();
        assert_eq!(json["max_new_tokens"], 1000);
        assert_eq!(json["top_k"], 50);
        assert_eq!(json["stop_sequences"][2], "\n\nHuman:");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("किसान", 2), "कि");
    }
}
