//! Classifier oracle boundary
//!
//! The oracle is a text-in/text-out collaborator used for both the topic
//! guardrail and intent classification. Callers only rely on substring
//! containment of a small vocabulary in whatever prose it returns.

use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub mod gemini;
pub mod keyword;

pub use gemini::GeminiOracle;
pub use keyword::KeywordOracle;

/// Which evaluation the oracle is being asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptRole {
    TopicGuardrail,
    IntentClassifier,
}

#[async_trait]
pub trait ClassifierOracle: Send + Sync {
    async fn evaluate(&self, role: PromptRole, instruction: &str, user_text: &str)
        -> Result<String>;
}

#[derive(Debug, Clone)]
enum ScriptedReply {
    Text(String),
    Fail(String),
    Hang,
}

/// Canned oracle for development & testing.
/// Replies per role are fixed up front and every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: HashMap<PromptRole, ScriptedReply>,
    calls: Mutex<Vec<(PromptRole, String)>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, role: PromptRole, text: impl Into<String>) -> Self {
        self.replies.insert(role, ScriptedReply::Text(text.into()));
        self
    }

    pub fn fail(mut self, role: PromptRole, message: impl Into<String>) -> Self {
        self.replies.insert(role, ScriptedReply::Fail(message.into()));
        self
    }

    /// Never answers for `role`
    pub fn hang(mut self, role: PromptRole) -> Self {
        self.replies.insert(role, ScriptedReply::Hang);
        self
    }

    /// Roles and user texts seen so far, in call order
    pub async fn calls(&self) -> Vec<(PromptRole, String)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ClassifierOracle for ScriptedOracle {
    async fn evaluate(
        &self,
        role: PromptRole,
        _instruction: &str,
        user_text: &str,
    ) -> Result<String> {
        self.calls.lock().await.push((role, user_text.to_string()));

        match self.replies.get(&role) {
            Some(ScriptedReply::Text(text)) => Ok(text.clone()),
            Some(ScriptedReply::Fail(message)) => {
                Err(OrchestrationError::OracleError(message.clone()))
            }
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(OrchestrationError::OracleError(format!(
                "no scripted reply for {:?}",
                role
            ))),
        }
    }
}
