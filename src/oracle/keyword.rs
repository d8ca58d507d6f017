//! Offline keyword oracle
//!
//! Deterministic stand-in for the language model, used when no API key is
//! configured. Emits the same vocabulary a real model is asked for.

use super::{ClassifierOracle, PromptRole};
use crate::models::{Capability, GuardrailVerdict};
use crate::Result;
use async_trait::async_trait;

// Static keyword lists, zero allocation

/// Matched against whole words so "alguna" never trips "gun"
const BLOCKED_WORDS: &[&str] = &[
    "droga", "drogas", "arma", "armas", "pistola", "pistolas",
    "drug", "drugs", "weapon", "weapons", "gun", "guns",
];

/// Requests for other clients' data
const BLOCKED_PHRASES: &[&str] = &[
    "ingresos de este cliente", "ingresos mensuales de", "datos del cliente",
];

const STATEMENT_KEYWORDS: &[&str] = &[
    "estado de cuenta", "extracto", "gastos bancarios", "movimientos",
    "bank statement", "statement", "transacciones", "pdf",
];

const SHOPPING_KEYWORDS: &[&str] = &[
    "comprar", "comprarme", "compra", "precio", "producto", "recomiendame un",
    "buy", "purchase", "samsung", "iphone", "laptop", "celular",
];

const EDUCATION_KEYWORDS: &[&str] = &[
    "ahorrar", "ahorro", "invertir", "inversion", "inversión", "presupuesto",
    "deuda", "credito", "crédito", "interes", "interés", "finanzas", "dinero",
    "save", "invest", "budget", "debt", "interest", "retire",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordOracle;

impl KeywordOracle {
    pub fn new() -> Self {
        Self
    }

    fn guardrail(text: &str) -> &'static str {
        let blocked_word = text
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| BLOCKED_WORDS.iter().any(|blocked| *blocked == word));
        if blocked_word || BLOCKED_PHRASES.iter().any(|p| text.contains(p)) {
            return "STOP";
        }

        let on_topic = [STATEMENT_KEYWORDS, SHOPPING_KEYWORDS, EDUCATION_KEYWORDS]
            .iter()
            .any(|list| list.iter().any(|kw| text.contains(kw)));

        if on_topic {
            GuardrailVerdict::CONTINUE_TOKEN
        } else {
            // In doubt, stop
            "STOP"
        }
    }

    fn intention(text: &str) -> Capability {
        let score = |list: &[&str]| list.iter().filter(|kw| text.contains(**kw)).count();

        let statement = score(STATEMENT_KEYWORDS);
        let shopping = score(SHOPPING_KEYWORDS);
        let education = score(EDUCATION_KEYWORDS);

        if statement > 0 && statement >= shopping {
            Capability::StatementAnalysis
        } else if shopping > education {
            Capability::ShopAdvisor
        } else {
            Capability::ChatQna
        }
    }
}

#[async_trait]
impl ClassifierOracle for KeywordOracle {
    async fn evaluate(
        &self,
        role: PromptRole,
        _instruction: &str,
        user_text: &str,
    ) -> Result<String> {
        let text = user_text.to_lowercase();

        let reply = match role {
            PromptRole::TopicGuardrail => Self::guardrail(&text),
            PromptRole::IntentClassifier => Self::intention(&text).label(),
        };
        Ok(reply.to_string())
    }
}
