//! Node and state contracts for the workflow engine

use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::hash::Hash;

/// State threaded through a graph.
///
/// Merge discipline: a node returning `NodeOutput::Update` only touches the
/// fields carried by the update, everything else is preserved. A node
/// returning `NodeOutput::Replace` swaps the whole record.
pub trait GraphState: Send + Sync + 'static {
    type Update: Send;

    fn merge(&mut self, update: Self::Update) -> Result<()>;
}

/// What a node hands back to the engine
pub enum NodeOutput<S: GraphState> {
    Update(S::Update),
    Replace(S),
}

/// A named processing step
#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    async fn run(&self, state: &S) -> Result<NodeOutput<S>>;
}

/// Adapter for synchronous closures
pub struct FnNode<F>(F);

pub fn from_fn<S, F>(f: F) -> FnNode<F>
where
    S: GraphState,
    F: Fn(&S) -> Result<NodeOutput<S>> + Send + Sync,
{
    FnNode(f)
}

#[async_trait]
impl<S, F> Node<S> for FnNode<F>
where
    S: GraphState,
    F: Fn(&S) -> Result<NodeOutput<S>> + Send + Sync,
{
    async fn run(&self, state: &S) -> Result<NodeOutput<S>> {
        (self.0)(state)
    }
}

/// Closed set of keys a conditional edge can return.
///
/// `variants` must list every value so `compile` can check that the edge
/// mapping is exhaustive.
pub trait RouteKey: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    fn variants() -> &'static [Self];
}
