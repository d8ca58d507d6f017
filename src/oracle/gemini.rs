//! Gemini-backed classifier oracle
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{ClassifierOracle, PromptRole};
use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Added to the transport timeout so the orchestrator's own deadline fires first
const TRANSPORT_GRACE: Duration = Duration::from_secs(5);

/// Reusable Gemini client (connection-pooled)
pub struct GeminiOracle {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiOracle {
    pub fn new(api_key: String, model_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout + TRANSPORT_GRACE)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: model_url.unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string()),
        })
    }
}

#[async_trait]
impl ClassifierOracle for GeminiOracle {
    async fn evaluate(
        &self,
        role: PromptRole,
        instruction: &str,
        user_text: &str,
    ) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(OrchestrationError::OracleError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        // Classification wants the most likely label, not variety
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: user_text.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                top_p: 1.0,
                top_k: 1,
                max_output_tokens: 64,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: instruction.to_string(),
                }],
            },
        };

        info!(role = ?role, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                // The request URL carries the API key
                let e = e.without_url();
                error!("Gemini API request failed: {}", e);
                OrchestrationError::OracleError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(OrchestrationError::OracleError(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            error!("Failed to parse Gemini response: {}", e);
            OrchestrationError::OracleError(format!("Gemini parse error: {}", e))
        })?;

        let candidate = gemini_response.candidates.into_iter().next().ok_or_else(|| {
            OrchestrationError::OracleError("No response from Gemini API".to_string())
        })?;

        debug!(role = ?role, finish_reason = ?candidate.finish_reason, "Gemini candidate");

        let text = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(OrchestrationError::OracleError(
                "Empty response from Gemini".to_string(),
            ));
        }

        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}
