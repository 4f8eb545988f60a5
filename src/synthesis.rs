//! Narrative-synthesis provider abstraction and implementations.
//!
//! Defines the [`Synthesizer`] trait and concrete implementations:
//! - **[`DisabledSynthesizer`]**: returned for provider `disabled`; always
//!   fails, and runs treat it as a deliberate skip.
//! - **[`GeminiSynthesizer`]**: calls the Gemini `generateContent` API with
//!   model discovery, retry, and linear backoff.
//!
//! # Provider Selection
//!
//! Use [`create_synthesizer`] to build the configured provider. Building a
//! provider is a one-time step with its own failure mode (missing key, no
//! usable model); callers fall back to running without synthesis.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited), 5xx, and network errors → retry
//! - HTTP 4xx (not 429) → fail immediately
//! - Backoff: 1s, 2s, 3s, ... (linear), up to `max_retries` attempts in total
//!
//! # Response Parsing
//!
//! Models often wrap JSON in code fences or chatter around it.
//! [`parse_verdict`] strips fences and parses the outermost JSON object;
//! missing fields default to empty values and the confidence score is
//! clamped to [0, 1].

use async_trait::async_trait;
use std::time::Duration;

use crate::config::SynthesisConfig;
use crate::error::SynthesisError;
use crate::models::{CommitRecord, NarrativeVerdict};

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Input for one synthesis call.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub code: &'a str,
    pub language: &'a str,
    pub file_path: &'a str,
    /// Most recent commits, newest first.
    pub commits: &'a [CommitRecord],
}

/// An external service that turns a code excerpt and its recent history
/// into a [`NarrativeVerdict`].
///
/// Implementations may be slow, rate limited, and unreliable. Every failure
/// must surface as a [`SynthesisError`].
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Returns the model identifier reported in excavation reports.
    fn model_name(&self) -> &str;

    async fn analyze(
        &self,
        request: &SynthesisRequest<'_>,
    ) -> Result<NarrativeVerdict, SynthesisError>;
}

/// Build the provider named in `config`.
///
/// `"disabled"` yields a [`DisabledSynthesizer`].
///
/// # Errors
///
/// - `"gemini"`: missing API key, or model discovery failure.
/// - any other name: [`SynthesisError::Config`].
pub async fn create_synthesizer(
    config: &SynthesisConfig,
) -> Result<Box<dyn Synthesizer>, SynthesisError> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiSynthesizer::connect(config).await?)),
        "disabled" => Ok(Box::new(DisabledSynthesizer)),
        other => Err(SynthesisError::Config(format!(
            "Unknown synthesis provider: {}",
            other
        ))),
    }
}

// ============ Disabled ============

pub struct DisabledSynthesizer;

impl DisabledSynthesizer {
    pub const MODEL_NAME: &'static str = "disabled";
}

#[async_trait]
impl Synthesizer for DisabledSynthesizer {
    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }

    async fn analyze(
        &self,
        _request: &SynthesisRequest<'_>,
    ) -> Result<NarrativeVerdict, SynthesisError> {
        Err(SynthesisError::Disabled)
    }
}

// ============ Gemini ============

/// Synthesizer backed by the Gemini generative language API.
///
/// Requires an API key in the environment variable named by
/// `synthesis.api_key_env` (default `GEMINI_API_KEY`).
pub struct GeminiSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

/// A model advertised by the model-listing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub methods: Vec<String>,
}

impl GeminiSynthesizer {
    /// Create the client and settle on a model, discovering one when the
    /// config does not name it.
    pub async fn connect(config: &SynthesisConfig) -> Result<Self, SynthesisError> {
        let mut synthesizer = Self::new(config)?;
        if synthesizer.model.is_empty() {
            let models = synthesizer.list_models().await?;
            synthesizer.model = pick_model(&models).ok_or(SynthesisError::NoModel)?;
            tracing::info!("using discovered model {}", synthesizer.model);
        }
        Ok(synthesizer)
    }

    /// Build the HTTP client without contacting the service. The model is
    /// empty unless the config names one.
    pub fn new(config: &SynthesisConfig) -> Result<Self, SynthesisError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            SynthesisError::Config(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let base_url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone().unwrap_or_default(),
            max_retries: config.max_retries.max(1),
        })
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, SynthesisError> {
        let response = self
            .client
            .get(format!("{}/v1beta/models", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response.json().await?;
        Ok(parse_model_list(&json))
    }

    async fn generate(&self, prompt: &str) -> Result<String, SynthesisError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.2 },
        });
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let mut last_err: Option<SynthesisError> = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
            }

            let resp = self
                .client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return extract_text(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = SynthesisError::Status {
                        status: status.as_u16(),
                        body: body_text,
                    };
                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::debug!("synthesis attempt {} failed: {}", attempt + 1, err);
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    tracing::debug!("synthesis attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e.into());
                }
            }
        }

        Err(SynthesisError::RetriesExhausted {
            attempts: self.max_retries,
            last: last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }
}

#[async_trait]
impl Synthesizer for GeminiSynthesizer {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn analyze(
        &self,
        request: &SynthesisRequest<'_>,
    ) -> Result<NarrativeVerdict, SynthesisError> {
        let prompt = build_prompt(request);
        let text = self.generate(&prompt).await?;
        parse_verdict(&text)
    }
}

/// Pick the first model supporting `generateContent`, preferring one whose
/// name contains `flash`. The `models/` prefix is stripped.
pub fn pick_model(models: &[ModelInfo]) -> Option<String> {
    let generative: Vec<&ModelInfo> = models
        .iter()
        .filter(|m| m.methods.iter().any(|x| x == "generateContent"))
        .collect();

    generative
        .iter()
        .find(|m| m.name.contains("flash"))
        .or_else(|| generative.first())
        .map(|m| m.name.trim_start_matches("models/").to_string())
}

fn parse_model_list(json: &serde_json::Value) -> Vec<ModelInfo> {
    json.get("models")
        .and_then(|m| m.as_array())
        .map(|models| {
            models
                .iter()
                .filter_map(|m| {
                    let name = m.get("name")?.as_str()?.to_string();
                    let methods = m
                        .get("supportedGenerationMethods")
                        .and_then(|v| v.as_array())
                        .map(|arr| {
                            arr.iter()
                                .filter_map(|x| x.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default();
                    Some(ModelInfo { name, methods })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn extract_text(json: &serde_json::Value) -> Result<String, SynthesisError> {
    let text = json
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(SynthesisError::EmptyResponse);
    }
    Ok(text.to_string())
}

pub fn build_prompt(request: &SynthesisRequest<'_>) -> String {
    let history = if request.commits.is_empty() {
        "(no commits)".to_string()
    } else {
        request
            .commits
            .iter()
            .map(|c| {
                let short = c.hash.get(..8).unwrap_or(c.hash.as_str());
                format!("- {} {} ({}): {}", short, c.date, c.author, c.message)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are a software archaeologist recovering the context behind existing code.

File: {path}
Language: {language}

Recent commits (newest first):
{history}

Code:
```{language}
{code}
```

Respond with a single JSON object and nothing else, using exactly these keys:
{{
  "summary": "what this file does, in two or three sentences",
  "businessContext": "the business purpose this code serves",
  "technicalRationale": "why it is built the way it is",
  "dependencies": ["names of modules or services it relies on"],
  "risks": ["concrete risks in changing or keeping this code"],
  "recommendations": ["concrete improvements"],
  "confidenceScore": 0.0
}}
confidenceScore is a number between 0 and 1."#,
        path = request.file_path,
        language = request.language,
        history = history,
        code = request.code,
    )
}

/// Parse a model answer into a verdict, tolerating code fences and text
/// around the JSON object.
pub fn parse_verdict(text: &str) -> Result<NarrativeVerdict, SynthesisError> {
    let stripped = strip_code_fences(text);
    if stripped.is_empty() {
        return Err(SynthesisError::EmptyResponse);
    }

    let json = match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if start < end => &stripped[start..=end],
        _ => return Err(SynthesisError::Malformed(preview(stripped))),
    };

    let mut verdict: NarrativeVerdict = serde_json::from_str(json)
        .map_err(|e| SynthesisError::Malformed(format!("{}: {}", e, preview(json))))?;

    verdict.confidence_score = if verdict.confidence_score.is_finite() {
        verdict.confidence_score.clamp(0.0, 1.0)
    } else {
        0.0
    };
    Ok(verdict)
}

fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string (e.g. "json") on the opening fence line.
        s = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    }
    s.trim_end().trim_end_matches("```").trim()
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
