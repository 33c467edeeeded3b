//! Text-generation providers.
//!
//! The pipeline treats generation as an opaque function: prompt in, text
//! out. [`GenerationProvider`] is that function; implementations:
//! - **[`DisabledProvider`]**: always errors; used when generation is not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI Chat Completions API.
//! - **[`GeminiProvider`]**: calls the Gemini `generateContent` API.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the provider named in the
//! configuration:
//!
//! ```rust,no_run
//! # use chatdb::config::GenerationConfig;
//! # use chatdb::generation::create_provider;
//! let config = GenerationConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```
//!
//! Calls are made once. A failed call is returned to the caller, never
//! retried.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use chatdb_core::GenerationPrompt;

use crate::config::GenerationConfig;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Prompt-in, text-out.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`. The returned text is untrusted.
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String>;
}

/// Build the provider named by `config.provider`.
pub fn create_provider(config: &GenerationConfig) -> Result<Box<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "gemini" => Ok(Box::new(GeminiProvider::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

fn http_client(config: &GenerationConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

fn api_key(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

async fn send_json(request: reqwest::RequestBuilder, api: &str) -> Result<serde_json::Value> {
    let response = request
        .send()
        .await
        .with_context(|| format!("{} request failed", api))?;
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", api, status, body_text);
    }
    Ok(response.json().await?)
}

// ============ Disabled Provider ============

/// A provider that always errors.
///
/// Used when `generation.provider = "disabled"`. Commands that do not
/// need generation (`run`, `schema`, `prompt`) still work.
pub struct DisabledProvider;

#[async_trait]
impl GenerationProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &GenerationPrompt) -> Result<String> {
        bail!("Generation provider is disabled; set [generation] provider in the config")
    }
}

// ============ OpenAI Provider ============

/// Calls `POST /v1/chat/completions` with the prompt as a single user
/// message. Requires `OPENAI_API_KEY`.
pub struct OpenAIProvider {
    model: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("generation.model required for OpenAI provider"))?;

        // Verify API key is available
        api_key("OPENAI_API_KEY")?;

        Ok(Self {
            model,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            temperature: config.temperature,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String> {
        let key = api_key("OPENAI_API_KEY")?;
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt.as_str()}],
        });

        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", key))
            .header("Content-Type", "application/json")
            .json(&body);

        let json = send_json(request, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

/// Extract the first choice's message content.
pub fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    let text = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))?;
    if text.trim().is_empty() {
        bail!("OpenAI returned an empty completion");
    }
    Ok(text.to_string())
}

// ============ Gemini Provider ============

/// Calls `POST /v1beta/models/{model}:generateContent`. Requires
/// `GEMINI_API_KEY`.
pub struct GeminiProvider {
    model: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("generation.model required for Gemini provider"))?;

        api_key("GEMINI_API_KEY")?;

        Ok(Self {
            model,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            temperature: config.temperature,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &GenerationPrompt) -> Result<String> {
        let key = api_key("GEMINI_API_KEY")?;
        let body = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": prompt.as_str()}]}],
            "generationConfig": {"temperature": self.temperature},
        });

        let request = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.model
            ))
            .header("x-goog-api-key", key)
            .header("Content-Type", "application/json")
            .json(&body);

        let json = send_json(request, "Gemini").await?;
        parse_gemini_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
pub fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing candidates[0].content.parts"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        bail!("Gemini returned an empty completion");
    }
    Ok(text)
}
