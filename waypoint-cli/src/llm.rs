use anyhow::{bail, Context, Result};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use waypoint_core::{ModelError, TextModel};

use crate::auth;
use crate::config::{normalize_model, LlmSection};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Tried in order after the configured model.
const PREFERRED_MODELS: [&str; 3] = ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-1.0-pro"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
}

impl Provider {
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => GEMINI_BASE_URL,
            Provider::OpenAI => OPENAI_BASE_URL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Gemini => "gemini",
            Provider::OpenAI => "openai",
        })
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAI),
            other => bail!("unknown llm provider '{other}' (expected gemini or openai)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub api_key: String,
}

/// Build the backend config; `None` when no credential is available.
pub fn config_from(section: &LlmSection) -> Result<Option<LlmConfig>> {
    let provider: Provider = section.provider.parse()?;
    let Some(api_key) = auth::resolve_api_key(provider)? else {
        debug!(%provider, "config_from: no api key");
        return Ok(None);
    };
    let base_url = section
        .base_url
        .as_deref()
        .unwrap_or(provider.default_base_url())
        .trim_end_matches('/')
        .to_string();
    Ok(Some(LlmConfig {
        provider,
        model: normalize_model(&section.model),
        base_url,
        temperature: section.temperature,
        api_key,
    }))
}

/// Blocking [`TextModel`] over the HTTP backends.
pub struct HttpModel {
    config: LlmConfig,
    client: reqwest::Client,
}

impl HttpModel {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

impl TextModel for HttpModel {
    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        // Already inside #[tokio::main] in the CLI: a nested block_on would panic.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| {
                handle.block_on(complete(&self.client, &self.config, prompt))
            })
        } else {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| ModelError::Unavailable(format!("create tokio runtime: {e}")))?;
            rt.block_on(complete(&self.client, &self.config, prompt))
        }
    }
}

async fn complete(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<String, ModelError> {
    debug!(provider = %config.provider, model = %config.model, "complete: called");
    match config.provider {
        Provider::Gemini => gemini_complete(client, config, prompt).await,
        Provider::OpenAI => openai_complete(client, config, prompt).await,
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContentIn<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContentIn<'a> {
    parts: Vec<GeminiPartIn<'a>>,
}

#[derive(Serialize)]
struct GeminiPartIn<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentOut>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentOut {
    #[serde(default)]
    parts: Vec<GeminiPartOut>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartOut {
    text: Option<String>,
}

fn gemini_text(resp: GeminiResponse) -> String {
    let mut s = String::new();
    if let Some(content) = resp.candidates.into_iter().next().and_then(|c| c.content) {
        for part in content.parts {
            if let Some(t) = part.text {
                s.push_str(&t);
            }
        }
    }
    s.trim().to_string()
}

async fn gemini_complete(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<String, ModelError> {
    let url = format!("{}/v1beta/models/{}:generateContent", config.base_url, config.model);
    let body = GeminiRequest {
        contents: vec![GeminiContentIn {
            parts: vec![GeminiPartIn { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: config.temperature,
        },
    };

    let resp = client
        .post(&url)
        .header("x-goog-api-key", &config.api_key)
        .json(&body)
        .send()
        .await
        .map_err(unavailable)?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        return Err(ModelError::from_status(status.as_u16(), &txt));
    }

    let out: GeminiResponse = resp.json().await.map_err(unavailable)?;
    Ok(gemini_text(out))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

fn chat_text(resp: ChatResponse) -> String {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default()
        .trim()
        .to_string()
}

async fn openai_complete(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
) -> Result<String, ModelError> {
    let body = ChatRequest {
        model: &config.model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        temperature: config.temperature,
    };

    let resp = client
        .post(format!("{}/v1/chat/completions", config.base_url))
        .header(AUTHORIZATION, format!("Bearer {}", config.api_key))
        .json(&body)
        .send()
        .await
        .map_err(unavailable)?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        return Err(ModelError::from_status(status.as_u16(), &txt));
    }

    let out: ChatResponse = resp.json().await.map_err(unavailable)?;
    Ok(chat_text(out))
}

fn unavailable(e: reqwest::Error) -> ModelError {
    ModelError::Unavailable(e.to_string())
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
    #[serde(default, rename = "supportedGenerationMethods")]
    supported_generation_methods: Vec<String>,
}

fn generating_models(list: ModelList) -> Vec<String> {
    list.models
        .into_iter()
        .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
        .map(|m| normalize_model(&m.name))
        .collect()
}

/// Gemini models that support `generateContent`, as bare ids.
pub async fn list_models(config: &LlmConfig) -> Result<Vec<String>> {
    if config.provider != Provider::Gemini {
        bail!("model listing is only supported for the gemini provider");
    }
    let url = format!("{}/v1beta/models", config.base_url);
    let resp = reqwest::Client::new()
        .get(&url)
        .header("x-goog-api-key", &config.api_key)
        .send()
        .await
        .context("gemini list models request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        return Err(ModelError::from_status(status.as_u16(), &txt)).context("gemini list models");
    }

    let list: ModelList = resp.json().await.context("parse gemini model list")?;
    Ok(generating_models(list))
}

/// Configured model if offered, else flash, then pro variants, else the first one listed.
pub fn pick_model(preferred: &str, available: &[String]) -> Option<String> {
    let preferred = normalize_model(preferred);
    std::iter::once(preferred.as_str())
        .chain(PREFERRED_MODELS)
        .find(|want| available.iter().any(|m| m == want))
        .map(str::to_string)
        .or_else(|| available.first().cloned())
}
