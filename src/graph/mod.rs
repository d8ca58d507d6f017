//! Workflow engine
//!
//! A small directed-graph executor. Nodes are registered by name, wired with
//! static or conditional edges, compiled once and then invoked any number of
//! times. Each invocation walks the graph sequentially from the entry point
//! until a node without outgoing edges runs, or an edge targets [`END`].
//!
//! Cycles are not detected. A conditional edge that keeps routing back into
//! itself loops forever; that is a wiring mistake on the caller's side.

mod node;

pub use node::{from_fn, FnNode, GraphState, Node, NodeOutput, RouteKey};

use crate::error::GraphError;
use crate::Result;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, error};

/// Sentinel target that ends an invocation
pub const END: &str = "__end__";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Node(String),
    End,
}

impl Target {
    fn parse(name: &str) -> Self {
        if name == END {
            Target::End
        } else {
            Target::Node(name.to_string())
        }
    }
}

/// Maps the state to a target, or to the debug form of an unmapped key
type Decide<S> = Box<dyn Fn(&S) -> std::result::Result<Target, String> + Send + Sync>;

struct ConditionalEdge<S> {
    decide: Decide<S>,
    targets: Vec<Target>,
    unmapped: Vec<String>,
}

enum Transition<S> {
    Static(Target),
    Conditional(ConditionalEdge<S>),
}

/// Mutable graph builder
pub struct StateGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    duplicates: Vec<String>,
    transitions: Vec<(String, Transition<S>)>,
    entry_points: Vec<String>,
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            duplicates: Vec::new(),
            transitions: Vec::new(),
            entry_points: Vec::new(),
        }
    }

    pub fn add_node<N>(&mut self, name: impl Into<String>, node: N) -> &mut Self
    where
        N: Node<S> + 'static,
    {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            self.duplicates.push(name);
        } else {
            self.nodes.insert(name, Arc::new(node));
        }
        self
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: &str) -> &mut Self {
        self.transitions
            .push((from.into(), Transition::Static(Target::parse(to))));
        self
    }

    /// After `from` runs, `decide` picks a key and `mapping` turns it into the
    /// next node name (or [`END`]).
    pub fn add_conditional_edge<'a, K, D, I>(
        &mut self,
        from: impl Into<String>,
        decide: D,
        mapping: I,
    ) -> &mut Self
    where
        K: RouteKey,
        D: Fn(&S) -> K + Send + Sync + 'static,
        I: IntoIterator<Item = (K, &'a str)>,
    {
        let map: HashMap<K, Target> = mapping
            .into_iter()
            .map(|(key, to)| (key, Target::parse(to)))
            .collect();

        let unmapped = K::variants()
            .iter()
            .filter(|key| !map.contains_key(*key))
            .map(|key| format!("{:?}", key))
            .collect();
        let targets = map.values().cloned().collect();

        let decide: Decide<S> = Box::new(move |state| {
            let key = decide(state);
            map.get(&key).cloned().ok_or_else(|| format!("{:?}", key))
        });

        self.transitions.push((
            from.into(),
            Transition::Conditional(ConditionalEdge {
                decide,
                targets,
                unmapped,
            }),
        ));
        self
    }

    pub fn set_entry_point(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if !self.entry_points.contains(&name) {
            self.entry_points.push(name);
        }
        self
    }

    /// Validate the wiring and freeze it into an invocable graph
    pub fn compile(self) -> std::result::Result<CompiledGraph<S>, GraphError> {
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(GraphError::DuplicateNode(name));
        }

        let entry_point = match self.entry_points.as_slice() {
            [] => return Err(GraphError::MissingEntryPoint),
            [single] => single.clone(),
            many => return Err(GraphError::MultipleEntryPoints(many.to_vec())),
        };
        if !self.nodes.contains_key(&entry_point) {
            return Err(GraphError::UnknownNode(entry_point));
        }

        let mut edges: HashMap<String, Transition<S>> = HashMap::new();
        for (from, transition) in self.transitions {
            if !self.nodes.contains_key(&from) {
                return Err(GraphError::UnknownNode(from));
            }

            let targets: Vec<&Target> = match &transition {
                Transition::Static(target) => vec![target],
                Transition::Conditional(edge) => {
                    if let Some(key) = edge.unmapped.first() {
                        return Err(GraphError::UnmappedRouteKey {
                            from,
                            key: key.clone(),
                        });
                    }
                    edge.targets.iter().collect()
                }
            };
            for target in targets {
                if let Target::Node(name) = target {
                    if !self.nodes.contains_key(name) {
                        return Err(GraphError::UnknownNode(name.clone()));
                    }
                }
            }

            if edges.contains_key(&from) {
                return Err(GraphError::AmbiguousEdges(from));
            }
            edges.insert(from, transition);
        }

        // Every registered node must be reachable from the entry point
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([entry_point.clone()]);
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let next: Vec<&Target> = match edges.get(&name) {
                None => vec![],
                Some(Transition::Static(target)) => vec![target],
                Some(Transition::Conditional(edge)) => edge.targets.iter().collect(),
            };
            for target in next {
                if let Target::Node(n) = target {
                    queue.push_back(n.clone());
                }
            }
        }
        let mut unreachable: Vec<&String> =
            self.nodes.keys().filter(|n| !seen.contains(*n)).collect();
        unreachable.sort();
        if let Some(name) = unreachable.first() {
            return Err(GraphError::UnreachableNode((*name).clone()));
        }

        Ok(CompiledGraph {
            nodes: self.nodes,
            edges,
            entry_point,
        })
    }
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Final state plus the node names visited, in order
pub struct Execution<S> {
    pub state: S,
    pub path: Vec<String>,
}

/// Immutable, invocable graph
pub struct CompiledGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Transition<S>>,
    entry_point: String,
}

impl<S: GraphState> CompiledGraph<S> {
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub async fn invoke(&self, initial_state: S) -> Result<S> {
        Ok(self.invoke_traced(initial_state).await?.state)
    }

    pub async fn invoke_traced(&self, initial_state: S) -> Result<Execution<S>> {
        let mut state = initial_state;
        let mut path = Vec::new();
        let mut current = self.entry_point.clone();

        loop {
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::UnknownNode(current.clone()))?;

            debug!(node = %current, "Running node");

            let output = node.run(&state).await.map_err(|e| {
                error!(node = %current, error = %e, "Node failed");
                e
            })?;
            match output {
                NodeOutput::Update(update) => state.merge(update)?,
                NodeOutput::Replace(replacement) => state = replacement,
            }
            path.push(current.clone());

            let next = match self.edges.get(&current) {
                None => break,
                Some(Transition::Static(target)) => target.clone(),
                Some(Transition::Conditional(edge)) => {
                    (edge.decide)(&state).map_err(|key| GraphError::UnmappedRouteKey {
                        from: current.clone(),
                        key,
                    })?
                }
            };

            match next {
                Target::End => break,
                Target::Node(name) => {
                    debug!(from = %current, to = %name, "Following edge");
                    current = name;
                }
            }
        }

        debug!(path = ?path, "Graph finished");
        Ok(Execution { state, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestrationError;
    use tokio_test::assert_ok;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Counter {
        value: i64,
        note: Option<String>,
    }

    struct Bump {
        add: i64,
        note: Option<String>,
    }

    impl GraphState for Counter {
        type Update = Bump;

        fn merge(&mut self, update: Bump) -> Result<()> {
            self.value += update.add;
            if let Some(note) = update.note {
                self.note = Some(note);
            }
            Ok(())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Parity {
        Even,
        Odd,
    }

    impl RouteKey for Parity {
        fn variants() -> &'static [Self] {
            &[Parity::Even, Parity::Odd]
        }
    }

    fn parity(state: &Counter) -> Parity {
        if state.value % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    fn bump(add: i64) -> impl Node<Counter> {
        from_fn(move |_: &Counter| Ok(NodeOutput::Update(Bump { add, note: None })))
    }

    fn tag(note: &'static str) -> impl Node<Counter> {
        from_fn(move |_: &Counter| {
            Ok(NodeOutput::Update(Bump {
                add: 0,
                note: Some(note.to_string()),
            }))
        })
    }

    fn branching_graph() -> CompiledGraph<Counter> {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("start", bump(1))
            .add_node("even", tag("even"))
            .add_node("odd", tag("odd"))
            .add_node("after_odd", bump(10))
            .add_conditional_edge(
                "start",
                parity,
                [(Parity::Even, "even"), (Parity::Odd, "odd")],
            )
            .add_edge("odd", "after_odd")
            .set_entry_point("start");
        graph.compile().unwrap()
    }

    #[tokio::test]
    async fn test_conditional_branch_taken_per_state() {
        let graph = branching_graph();

        let run = graph.invoke_traced(Counter::default()).await.unwrap();
        assert_eq!(run.path, vec!["start", "odd", "after_odd"]);
        assert_eq!(run.state.value, 11);
        assert_eq!(run.state.note.as_deref(), Some("odd"));

        let run = graph
            .invoke_traced(Counter { value: 1, note: None })
            .await
            .unwrap();
        assert_eq!(run.path, vec!["start", "even"]);
        assert_eq!(run.state.value, 2);
        assert_eq!(run.state.note.as_deref(), Some("even"));
    }

    #[tokio::test]
    async fn test_partial_update_preserves_other_fields() {
        let mut graph = StateGraph::<Counter>::new();
        graph.add_node("only", bump(5)).set_entry_point("only");
        let graph = graph.compile().unwrap();

        let state = Counter {
            value: 1,
            note: Some("kept".into()),
        };
        let out = assert_ok!(graph.invoke(state).await);
        assert_eq!(out.value, 6);
        assert_eq!(out.note.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_replace_swaps_whole_state() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node(
                "reset",
                from_fn(|_: &Counter| Ok(NodeOutput::Replace(Counter::default()))),
            )
            .set_entry_point("reset");
        let graph = graph.compile().unwrap();

        let out = graph
            .invoke(Counter {
                value: 9,
                note: Some("gone".into()),
            })
            .await
            .unwrap();
        assert_eq!(out, Counter::default());
    }

    #[tokio::test]
    async fn test_explicit_end_stops_walk() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("a", bump(1))
            .add_node("b", bump(100))
            .add_conditional_edge("a", parity, [(Parity::Even, END), (Parity::Odd, "b")])
            .set_entry_point("a");
        let graph = graph.compile().unwrap();

        let run = graph
            .invoke_traced(Counter { value: 1, note: None })
            .await
            .unwrap();
        assert_eq!(run.path, vec!["a"]);
        assert_eq!(run.state.value, 2);
    }

    #[tokio::test]
    async fn test_node_error_halts_invocation() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node(
                "boom",
                from_fn(|_: &Counter| -> Result<NodeOutput<Counter>> {
                    Err(OrchestrationError::OracleError("down".into()))
                }),
            )
            .add_node("never", tag("ran"))
            .add_edge("boom", "never")
            .set_entry_point("boom");
        let graph = graph.compile().unwrap();

        let err = graph.invoke(Counter::default()).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::OracleError(_)));
    }

    /// Declares only two of its three values
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Size {
        Small,
        Large,
        Huge,
    }

    impl RouteKey for Size {
        fn variants() -> &'static [Self] {
            &[Size::Small, Size::Large]
        }
    }

    #[tokio::test]
    async fn test_undeclared_route_key_fails_at_runtime() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("start", bump(1))
            .add_node("small", tag("small"))
            .add_node("large", tag("large"))
            .add_conditional_edge(
                "start",
                |state: &Counter| if state.value > 100 { Size::Huge } else { Size::Small },
                [(Size::Small, "small"), (Size::Large, "large")],
            )
            .set_entry_point("start");
        let graph = assert_ok!(graph.compile());

        let run = graph.invoke(Counter::default()).await.unwrap();
        assert_eq!(run.note.as_deref(), Some("small"));

        let err = graph
            .invoke(Counter {
                value: 500,
                note: None,
            })
            .await
            .unwrap_err();
        match err {
            OrchestrationError::Graph(GraphError::UnmappedRouteKey { from, key }) => {
                assert_eq!(from, "start");
                assert_eq!(key, "Huge");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_compile_rejects_missing_entry_point() {
        let mut graph = StateGraph::<Counter>::new();
        graph.add_node("a", bump(1));
        assert_eq!(graph.compile().err(), Some(GraphError::MissingEntryPoint));
    }

    #[test]
    fn test_compile_rejects_multiple_entry_points() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("a", bump(1))
            .add_node("b", bump(1))
            .add_edge("a", "b")
            .set_entry_point("a")
            .set_entry_point("b");
        assert!(matches!(
            graph.compile().err(),
            Some(GraphError::MultipleEntryPoints(_))
        ));
    }

    #[test]
    fn test_compile_rejects_unknown_target() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("a", bump(1))
            .add_edge("a", "missing")
            .set_entry_point("a");
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::UnknownNode("missing".into()))
        );
    }

    #[test]
    fn test_compile_rejects_duplicate_node() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("a", bump(1))
            .add_node("a", bump(2))
            .set_entry_point("a");
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::DuplicateNode("a".into()))
        );
    }

    #[test]
    fn test_compile_rejects_non_exhaustive_mapping() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("a", bump(1))
            .add_node("b", bump(1))
            .add_conditional_edge("a", parity, [(Parity::Even, "b")])
            .set_entry_point("a");
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::UnmappedRouteKey {
                from: "a".into(),
                key: "Odd".into()
            })
        );
    }

    #[test]
    fn test_compile_rejects_ambiguous_edges() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("a", bump(1))
            .add_node("b", bump(1))
            .add_node("c", bump(1))
            .add_edge("a", "b")
            .add_edge("a", "c")
            .set_entry_point("a");
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::AmbiguousEdges("a".into()))
        );
    }

    #[test]
    fn test_compile_rejects_unreachable_node() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("a", bump(1))
            .add_node("island", bump(1))
            .set_entry_point("a");
        assert_eq!(
            graph.compile().err(),
            Some(GraphError::UnreachableNode("island".into()))
        );
    }
}
