//! Hugging Face inference client for text classification.
//!
//! Posts `{"inputs": ...}` to the hosted inference endpoint of a sentiment
//! model (ProsusAI/finbert by default) and reads back label/score candidates.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use sentigraph_core::config::{env_opt, env_or};
use sentigraph_core::window::given;
use sentigraph_core::{SentigraphError, SentigraphResult};

use crate::classifier::{parse_classification_response, Classification, SentimentClassifier};

/// Default inference endpoint (the model path is appended).
pub const DEFAULT_ENDPOINT: &str = "https://router.huggingface.co/hf-inference/models";

/// Default sentiment model.
pub const DEFAULT_MODEL: &str = "ProsusAI/finbert";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for [`HuggingFaceClient`].
#[derive(Clone)]
pub struct ClassifierConfig {
    pub api_token: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClassifierConfig {
    /// Build from `HF_TOKEN`, `HF_ENDPOINT`, `HF_MODEL` and `HF_TIMEOUT_SECS`.
    ///
    /// An explicit `api_key` wins over `HF_TOKEN` unless it is blank or the
    /// `"string"` placeholder.
    pub fn from_env(api_key: Option<&str>) -> Self {
        let timeout_secs = env_opt("HF_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            api_token: given(api_key).map(str::to_string).or_else(|| env_opt("HF_TOKEN")),
            endpoint: env_or("HF_ENDPOINT", DEFAULT_ENDPOINT),
            model: env_or("HF_MODEL", DEFAULT_MODEL),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn url(&self) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), self.model)
    }
}

/// Hugging Face text-classification client.
#[derive(Clone)]
pub struct HuggingFaceClient {
    url: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ClassificationRequest<'a, T: Serialize + ?Sized> {
    inputs: &'a T,
}

impl HuggingFaceClient {
    /// Create a client. Fails with a configuration error when no token is available.
    pub fn new(config: &ClassifierConfig) -> SentigraphResult<Self> {
        let token = config
            .api_token
            .as_deref()
            .and_then(|t| given(Some(t)))
            .ok_or_else(|| {
                SentigraphError::configuration(
                    "HF_TOKEN must be provided either as parameter or in environment variable",
                )
            })?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SentigraphError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { url: config.url(), token, client })
    }

    async fn post<T: Serialize + ?Sized>(&self, inputs: &T) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&ClassificationRequest { inputs })
            .send()
            .await
            .context("Failed to connect to Hugging Face inference")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Hugging Face API error ({}): {}", status, body);
        }

        response
            .json()
            .await
            .context("Failed to parse Hugging Face response")
    }
}

#[async_trait]
impl SentimentClassifier for HuggingFaceClient {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let body = self.post(text).await?;
        let mut results = parse_classification_response(body, 1)?;
        let result = results.remove(0);
        debug!(label = %result.label, score = result.score, "Classified text");
        Ok(result)
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Classification>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.post(texts).await?;
        let results = parse_classification_response(body, texts.len())?;
        debug!(count = results.len(), "Classified batch");
        Ok(results)
    }
}
