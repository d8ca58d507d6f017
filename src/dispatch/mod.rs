//! Downstream dispatcher
//!
//! Maps a classified intent to exactly one call on the assistant service and
//! normalizes whatever comes back into an answer. Failures never escape:
//! transport errors, non-success statuses, malformed payloads and a missing
//! attachment all resolve to [`FALLBACK_ANSWER`]. No retries.

use crate::error::OrchestrationError;
use crate::models::{Attachment, Capability, FALLBACK_ANSWER};
use crate::Result;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CHAT_QNA_PATH: &str = "/api/v1/rag";
pub const STATEMENT_ANALYSIS_PATH: &str = "/api/v1/analyze-pdf";
pub const SHOP_ADVISOR_PATH: &str = "/api/v1/shopping-advisor";

/// Form field names expected by the statement-analysis endpoint
const QUESTION_FIELD: &str = "question";
const FILE_FIELD: &str = "pdf_file";

fn endpoint_path(capability: Capability) -> &'static str {
    match capability {
        Capability::ChatQna => CHAT_QNA_PATH,
        Capability::StatementAnalysis => STATEMENT_ANALYSIS_PATH,
        Capability::ShopAdvisor => SHOP_ADVISOR_PATH,
    }
}

/// HTTP client for the assistant capability service
#[derive(Clone)]
pub struct AssistantClient {
    client: Client,
    base_url: String,
}

impl AssistantClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::DispatchError(format!(
                    "Assistant request failed for {}: {}",
                    path, e
                ))
            })?;

        Self::read_body(path, response).await
    }

    async fn post_multipart(&self, path: &str, form: Form) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                OrchestrationError::DispatchError(format!(
                    "Assistant request failed for {}: {}",
                    path, e
                ))
            })?;

        Self::read_body(path, response).await
    }

    async fn read_body(path: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestrationError::DispatchError(format!(
                "Assistant returned {} for {}: {}",
                status, path, body
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            OrchestrationError::DispatchError(format!("Invalid JSON response from {}: {}", path, e))
        })
    }
}

/// Forwards a classified request to its capability endpoint
pub struct DownstreamDispatcher {
    client: AssistantClient,
}

impl DownstreamDispatcher {
    pub fn new(client: AssistantClient) -> Self {
        Self { client }
    }

    /// Always yields an answer; any failure becomes the fallback message
    pub async fn dispatch(
        &self,
        capability: Capability,
        question: &str,
        attachment: Option<&Attachment>,
    ) -> String {
        match self.try_dispatch(capability, question, attachment).await {
            Ok(answer) => {
                info!(capability = %capability, "Capability answered");
                answer
            }
            Err(e) => {
                warn!(
                    capability = %capability,
                    error = %e,
                    "Dispatch failed - using fallback answer"
                );
                FALLBACK_ANSWER.to_string()
            }
        }
    }

    async fn try_dispatch(
        &self,
        capability: Capability,
        question: &str,
        attachment: Option<&Attachment>,
    ) -> Result<String> {
        let path = endpoint_path(capability);
        debug!(capability = %capability, path, "Dispatching to assistant");

        let payload = match capability {
            Capability::StatementAnalysis => {
                let attachment = attachment.ok_or_else(|| {
                    OrchestrationError::DispatchError(
                        "statement analysis requested without an attachment".to_string(),
                    )
                })?;
                self.client
                    .post_multipart(path, statement_form(question, attachment)?)
                    .await?
            }
            Capability::ChatQna | Capability::ShopAdvisor => {
                self.client
                    .post_json(path, &json!({ "question": question }))
                    .await?
            }
        };

        payload
            .get("response")
            .and_then(Value::as_str)
            .filter(|answer| !answer.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                OrchestrationError::DispatchError(format!(
                    "{} payload has no 'response' field",
                    path
                ))
            })
    }
}

fn statement_form(question: &str, attachment: &Attachment) -> Result<Form> {
    let content_type = if attachment.content_type.trim().is_empty() {
        "application/octet-stream"
    } else {
        attachment.content_type.as_str()
    };

    let file = Part::bytes(attachment.data.clone())
        .file_name(attachment.filename.clone())
        .mime_str(content_type)
        .map_err(|e| {
            OrchestrationError::DispatchError(format!(
                "Invalid attachment content type '{}': {}",
                content_type, e
            ))
        })?;

    Ok(Form::new()
        .text(QUESTION_FIELD, question.to_string())
        .part(FILE_FIELD, file))
}
