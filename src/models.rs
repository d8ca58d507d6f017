//! Core data models for the orchestrator

use crate::error::OrchestrationError;
use crate::graph::GraphState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer returned whenever policy, classification or dispatch cannot
/// produce a substantive one
pub const FALLBACK_ANSWER: &str = "Lo siento, no puedo ayudarte con esa solicitud.";

//
// ================= Attachment =================
//

/// Uploaded file, forwarded only on the statement-analysis path
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

//
// ================= Classification =================
//

/// Outcome of the topic guardrail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardrailVerdict {
    Continue,
    Stop,
}

impl GuardrailVerdict {
    pub const CONTINUE_TOKEN: &'static str = "CONTINUE";

    /// Fail-closed: anything without the continue token stops the request.
    pub fn from_oracle_text(text: &str) -> Self {
        if text.contains(Self::CONTINUE_TOKEN) {
            GuardrailVerdict::Continue
        } else {
            GuardrailVerdict::Stop
        }
    }
}

/// Downstream capability selected by the intent classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ChatQna,
    StatementAnalysis,
    ShopAdvisor,
}

impl Capability {
    /// Matching priority when the oracle text mentions more than one label
    pub const PRIORITY: [Capability; 3] = [
        Capability::ChatQna,
        Capability::StatementAnalysis,
        Capability::ShopAdvisor,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Capability::ChatQna => "chat_qna",
            Capability::StatementAnalysis => "statement_analysis",
            Capability::ShopAdvisor => "shop_advisor",
        }
    }

    pub fn from_oracle_text(text: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|capability| text.contains(capability.label()))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ================= State Record =================
//

/// Data threaded through one orchestration run.
///
/// Fields only change through [`GraphState::merge`], so the question stays
/// fixed and the answer is written at most once.
#[derive(Debug, Clone)]
pub struct StateRecord {
    question: String,
    attachment: Option<Attachment>,
    guardrail_status: Option<String>,
    intention: Option<String>,
    answer: Option<String>,
}

impl StateRecord {
    pub fn new(question: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            question: question.into(),
            attachment,
            guardrail_status: None,
            intention: None,
            answer: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn guardrail_status(&self) -> Option<&str> {
        self.guardrail_status.as_deref()
    }

    pub fn intention(&self) -> Option<&str> {
        self.intention.as_deref()
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }
}

/// Partial record returned by orchestration nodes
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub guardrail_status: Option<String>,
    pub intention: Option<String>,
    pub answer: Option<String>,
    /// Drop the attachment once the node that consumes it is done
    pub release_attachment: bool,
}

impl StateUpdate {
    pub fn guardrail_status(status: impl Into<String>) -> Self {
        Self {
            guardrail_status: Some(status.into()),
            ..Default::default()
        }
    }

    pub fn intention(intention: impl Into<String>) -> Self {
        Self {
            intention: Some(intention.into()),
            ..Default::default()
        }
    }

    pub fn answer(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            ..Default::default()
        }
    }

    pub fn releasing_attachment(mut self) -> Self {
        self.release_attachment = true;
        self
    }
}

impl GraphState for StateRecord {
    type Update = StateUpdate;

    fn merge(&mut self, update: StateUpdate) -> crate::Result<()> {
        if let Some(answer) = update.answer {
            if self.answer.is_some() {
                return Err(OrchestrationError::StateConflict(
                    "answer already written for this run".to_string(),
                ));
            }
            self.answer = Some(answer);
        }
        if let Some(status) = update.guardrail_status {
            self.guardrail_status = Some(status);
        }
        if let Some(intention) = update.intention {
            self.intention = Some(intention);
        }
        if update.release_attachment {
            self.attachment = None;
        }
        Ok(())
    }
}

//
// ================= Boundary =================
//

/// Input accepted by the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestrationRequest {
    pub question: String,
    pub attachment: Option<Attachment>,
}

impl OrchestrationRequest {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Output returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestrationResponse {
    pub question: String,
    pub response: String,
}
