//! Shared helpers: model builders and a breadth-first reachability driver.

#![allow(dead_code)]

use pmc_eval::Weight;
use pmc_explore::{ActionId, ExploreResult, Explorer, Fingerprint, StateVector};
use pmc_model::{Automaton, Destination, Edge, Expr, Location};
use std::collections::{HashMap, VecDeque};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One explored edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<W> {
    pub source: usize,
    pub target: usize,
    pub weight: W,
    pub label: ActionId,
}

/// Reachable graph, nodes in discovery order.
#[derive(Debug)]
pub struct Graph<W> {
    pub nodes: Vec<StateVector>,
    pub is_state: Vec<bool>,
    pub transitions: Vec<Transition<W>>,
}

impl<W> Graph<W> {
    pub fn outgoing(&self, node: usize) -> impl Iterator<Item = &Transition<W>> {
        self.transitions.iter().filter(move |t| t.source == node)
    }
}

/// Explore everything reachable from the initial nodes.
pub fn reachable<W: Weight>(explorer: &mut Explorer<W>) -> ExploreResult<Graph<W>> {
    let mut index: HashMap<Fingerprint, usize> = HashMap::new();
    let mut nodes = Vec::new();
    let mut queue = VecDeque::new();
    for node in explorer.initial_nodes() {
        if !index.contains_key(&node.fingerprint()) {
            index.insert(node.fingerprint(), nodes.len());
            queue.push_back(nodes.len());
            nodes.push(node.clone());
        }
    }

    let mut is_state = Vec::new();
    let mut transitions = Vec::new();
    while let Some(source) = queue.pop_front() {
        let node = nodes[source].clone();
        explorer.query(&node)?;
        debug_assert_eq!(is_state.len(), source);
        is_state.push(explorer.is_state_query());
        for i in 0..explorer.num_successors() {
            let mut succ = explorer.successor(i).clone();
            succ.unmark();
            let fp = succ.fingerprint();
            let target = match index.get(&fp) {
                Some(&t) => t,
                None => {
                    let t = nodes.len();
                    index.insert(fp, t);
                    nodes.push(succ);
                    queue.push_back(t);
                    t
                }
            };
            transitions.push(Transition {
                source,
                target,
                weight: explorer.weight(i).clone(),
                label: explorer.label(i),
            });
        }
    }
    Ok(Graph {
        nodes,
        is_state,
        transitions,
    })
}

/// Single-location automaton.
pub fn looping(name: &str) -> Automaton {
    Automaton::new(name)
        .with_location(Location::new("l"))
        .with_initial_location("l")
}

/// `var := var + 1` with probability one.
pub fn increment(var: &str) -> Destination {
    Destination::new("l").with_assignment(var, Expr::add(Expr::ident(var), Expr::int(1)))
}

/// Edge from `l` on `action` with the given destinations.
pub fn edge(action: Option<&str>, destinations: Vec<Destination>) -> Edge {
    let mut edge = Edge::new("l");
    if let Some(action) = action {
        edge = edge.with_action(action);
    }
    destinations
        .into_iter()
        .fold(edge, |e, d| e.with_destination(d))
}

/// Destination back to `l` with probability `p`.
pub fn branch(p: f64) -> Destination {
    Destination::new("l").with_probability(Expr::real(p))
}
