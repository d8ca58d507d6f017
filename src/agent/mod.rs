//! Orchestration graph - guardrail, classify, dispatch
//!
//! ```text
//! guardrail_topic ──CONTINUE──► intention_node ──► route_intention
//!        │
//!        └──────────STOP──────► default_response
//! ```
//!
//! Exactly one of `default_response` / `route_intention` runs per request,
//! and whichever runs writes the answer.

pub mod prompts;

use crate::config::OrchestratorConfig;
use crate::dispatch::{AssistantClient, DownstreamDispatcher};
use crate::error::OrchestrationError;
use crate::graph::{from_fn, CompiledGraph, Execution, Node, NodeOutput, RouteKey, StateGraph};
use crate::models::{
    Capability, GuardrailVerdict, OrchestrationRequest, OrchestrationResponse, StateRecord,
    StateUpdate, FALLBACK_ANSWER,
};
use crate::oracle::{ClassifierOracle, GeminiOracle, KeywordOracle, PromptRole};
use crate::Result;
use async_trait::async_trait;
use prompts::{INTENT_CLASSIFIER_INSTRUCTION, TOPIC_GUARDRAIL_INSTRUCTION};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const GUARDRAIL_NODE: &str = "guardrail_topic";
pub const INTENTION_NODE: &str = "intention_node";
pub const DEFAULT_RESPONSE_NODE: &str = "default_response";
pub const ROUTE_INTENTION_NODE: &str = "route_intention";

impl RouteKey for GuardrailVerdict {
    fn variants() -> &'static [Self] {
        &[GuardrailVerdict::Continue, GuardrailVerdict::Stop]
    }
}

/// Decision after the guardrail; a missing status counts as a stop
pub fn route_guardrail(state: &StateRecord) -> GuardrailVerdict {
    let verdict = GuardrailVerdict::from_oracle_text(state.guardrail_status().unwrap_or_default());
    debug!(verdict = ?verdict, "Guardrail decision");
    verdict
}

/// Bounded oracle call; expiry is fatal for the run
async fn consult(
    oracle: &dyn ClassifierOracle,
    role: PromptRole,
    instruction: &str,
    question: &str,
    timeout: Duration,
) -> Result<String> {
    tokio::time::timeout(timeout, oracle.evaluate(role, instruction, question))
        .await
        .map_err(|_| OrchestrationError::OracleTimeout(timeout))?
}

struct GuardrailTopicNode {
    oracle: Arc<dyn ClassifierOracle>,
    timeout: Duration,
}

#[async_trait]
impl Node<StateRecord> for GuardrailTopicNode {
    async fn run(&self, state: &StateRecord) -> Result<NodeOutput<StateRecord>> {
        let status = consult(
            self.oracle.as_ref(),
            PromptRole::TopicGuardrail,
            TOPIC_GUARDRAIL_INSTRUCTION,
            state.question(),
            self.timeout,
        )
        .await?;

        debug!(status = %status, "Guardrail evaluated");
        Ok(NodeOutput::Update(StateUpdate::guardrail_status(status)))
    }
}

struct IntentionNode {
    oracle: Arc<dyn ClassifierOracle>,
    timeout: Duration,
}

#[async_trait]
impl Node<StateRecord> for IntentionNode {
    async fn run(&self, state: &StateRecord) -> Result<NodeOutput<StateRecord>> {
        let intention = consult(
            self.oracle.as_ref(),
            PromptRole::IntentClassifier,
            INTENT_CLASSIFIER_INSTRUCTION,
            state.question(),
            self.timeout,
        )
        .await?;

        debug!(intention = %intention, "Intention classified");
        Ok(NodeOutput::Update(StateUpdate::intention(intention)))
    }
}

struct RouteIntentionNode {
    dispatcher: Arc<DownstreamDispatcher>,
}

#[async_trait]
impl Node<StateRecord> for RouteIntentionNode {
    async fn run(&self, state: &StateRecord) -> Result<NodeOutput<StateRecord>> {
        let capability = state.intention().and_then(Capability::from_oracle_text);

        let answer = match capability {
            Some(capability) => {
                self.dispatcher
                    .dispatch(capability, state.question(), state.attachment())
                    .await
            }
            None => {
                warn!(
                    intention = state.intention().unwrap_or_default(),
                    "No recognized intention - using fallback answer"
                );
                FALLBACK_ANSWER.to_string()
            }
        };

        Ok(NodeOutput::Update(
            StateUpdate::answer(answer).releasing_attachment(),
        ))
    }
}

fn default_response(_: &StateRecord) -> Result<NodeOutput<StateRecord>> {
    Ok(NodeOutput::Update(
        StateUpdate::answer(FALLBACK_ANSWER).releasing_attachment(),
    ))
}

/// Wire the four orchestration nodes. Collaborators are injected, the graph
/// holds no other state.
pub fn build_orchestrator_graph(
    oracle: Arc<dyn ClassifierOracle>,
    dispatcher: Arc<DownstreamDispatcher>,
    oracle_timeout: Duration,
) -> Result<CompiledGraph<StateRecord>> {
    let mut graph: StateGraph<StateRecord> = StateGraph::new();
    graph
        .add_node(
            GUARDRAIL_NODE,
            GuardrailTopicNode {
                oracle: oracle.clone(),
                timeout: oracle_timeout,
            },
        )
        .add_node(
            INTENTION_NODE,
            IntentionNode {
                oracle,
                timeout: oracle_timeout,
            },
        )
        .add_node(DEFAULT_RESPONSE_NODE, from_fn(default_response))
        .add_node(ROUTE_INTENTION_NODE, RouteIntentionNode { dispatcher })
        .add_conditional_edge(
            GUARDRAIL_NODE,
            route_guardrail,
            [
                (GuardrailVerdict::Continue, INTENTION_NODE),
                (GuardrailVerdict::Stop, DEFAULT_RESPONSE_NODE),
            ],
        )
        .add_edge(INTENTION_NODE, ROUTE_INTENTION_NODE)
        .set_entry_point(GUARDRAIL_NODE);

    Ok(graph.compile()?)
}

/// Entry point used by the binaries and the HTTP layer
pub struct Orchestrator {
    graph: CompiledGraph<StateRecord>,
}

impl Orchestrator {
    pub fn new(
        oracle: Arc<dyn ClassifierOracle>,
        dispatcher: Arc<DownstreamDispatcher>,
        oracle_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            graph: build_orchestrator_graph(oracle, dispatcher, oracle_timeout)?,
        })
    }

    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let oracle: Arc<dyn ClassifierOracle> = match &config.gemini_api_key {
            Some(api_key) => Arc::new(GeminiOracle::new(
                api_key.clone(),
                config.gemini_model_url.clone(),
                config.oracle_timeout,
            )?),
            None => {
                warn!("GEMINI_API_KEY not set - using offline keyword oracle");
                Arc::new(KeywordOracle::new())
            }
        };

        let client = AssistantClient::new(&config.assistant_base_url, config.dispatch_timeout)?;
        let dispatcher = Arc::new(DownstreamDispatcher::new(client));

        Self::new(oracle, dispatcher, config.oracle_timeout)
    }

    /// Run the graph and keep the full final state and visited path
    pub async fn run(&self, request: OrchestrationRequest) -> Result<Execution<StateRecord>> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("orchestrate", %invocation_id);

        async move {
            let start = Instant::now();
            info!(question = %request.question, has_attachment = request.attachment.is_some(), "Orchestration started");

            let state = StateRecord::new(request.question, request.attachment);
            let execution = self.graph.invoke_traced(state).await?;

            info!(
                path = ?execution.path,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Orchestration finished"
            );
            Ok::<_, OrchestrationError>(execution)
        }
        .instrument(span)
        .await
    }

    pub async fn invoke(&self, request: OrchestrationRequest) -> Result<OrchestrationResponse> {
        let execution = self.run(request).await?;
        let state = execution.state;

        let answer = state
            .answer()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| {
                OrchestrationError::StateConflict("run finished without an answer".to_string())
            })?
            .to_string();

        Ok(OrchestrationResponse {
            question: state.question().to_string(),
            response: answer,
        })
    }
}
