//! Graph algorithms for analysis

use crate::data::Hop;
use crate::graph::{Entity, EntityMap, GraphNode};
use petgraph::algo::{connected_components, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::{BTreeSet, HashMap};
use log;

/// Default neighbor relation for clustering: predecessors and successors
pub fn neighbors<N: GraphNode + ?Sized>(node: &N) -> BTreeSet<String> {
    let mut ids = node.source_ids();
    ids.extend(node.target_ids());
    ids
}

/// Check that every recorded edge is present on both of its endpoints
pub fn is_symmetric(entities: &EntityMap) -> bool {
    for entity in entities.values() {
        for target in &entity.target_ids {
            match entities.get(target) {
                Some(t) if t.source_ids.contains(&entity.id) => {}
                _ => return false,
            }
        }
        for source in &entity.source_ids {
            match entities.get(source) {
                Some(s) if s.target_ids.contains(&entity.id) => {}
                _ => return false,
            }
        }
    }
    true
}

/// Directed petgraph view over the entities accepted by `keep`
fn petgraph_view<F>(entities: &EntityMap, keep: F) -> DiGraph<String, ()>
where
    F: Fn(&Entity) -> bool,
{
    let mut graph = DiGraph::with_capacity(entities.len(), entities.len());
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(entities.len());

    for entity in entities.values().filter(|e| keep(e)) {
        index.insert(&entity.id, graph.add_node(entity.id.clone()));
    }

    for entity in entities.values().filter(|e| keep(e)) {
        let src = index[entity.id.as_str()];
        for target in &entity.target_ids {
            if let Some(&dst) = index.get(target.as_str()) {
                graph.add_edge(src, dst, ());
            }
        }
    }

    graph
}

/// Directed petgraph view of the whole entity graph, one edge per successor
pub fn to_petgraph(entities: &EntityMap) -> DiGraph<String, ()> {
    petgraph_view(entities, |_| true)
}

/// Number of weakly connected components
pub fn component_count(entities: &EntityMap) -> usize {
    connected_components(&to_petgraph(entities))
}

/// Whether some responding hop was observed both upstream and downstream of another.
///
/// The sentinel entity is left out: it merges unrelated silent hops and
/// would report cycles that no packet took.
pub fn has_routing_loop(entities: &EntityMap) -> bool {
    let graph = petgraph_view(entities, |e| !e.is_unknown());
    let looped = is_cyclic_directed(&graph);
    if looped {
        log::debug!("Routing loop detected among {} entities", graph.node_count());
    }
    looped
}

/// Narrowest interface speed over the responding entities, with the address
/// that sets it.
///
/// Entities without a positive bandwidth are skipped. On ties the entity
/// seen first wins.
pub fn bottleneck(entities: &EntityMap) -> Option<(f64, &str)> {
    let mut narrowest: Option<(f64, &str)> = None;

    for entity in entities.values().filter(|e| !e.is_unknown()) {
        let Some(bw) = entity.max_bandwidth.filter(|bw| *bw > 0.0) else {
            continue;
        };
        if narrowest.map_or(true, |(min, _)| bw < min) {
            narrowest = Some((bw, entity.ip.as_str()));
        }
    }

    narrowest
}

/// Round-trip time statistics over a set of hops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RttStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation, absent for a single sample
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl RttStats {
    /// Summarize the hops that carry an RTT; `None` when none do
    pub fn from_hops<'a, I>(hops: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Hop>,
    {
        let rtts: Vec<f64> = hops
            .into_iter()
            .filter_map(|hop| hop.rtt)
            .filter(|rtt| rtt.is_finite())
            .collect();

        if rtts.is_empty() {
            return None;
        }

        let std_dev = if rtts.len() > 1 {
            Some(rtts.iter().std_dev())
        } else {
            None
        };

        Some(Self {
            count: rtts.len(),
            mean: rtts.iter().mean(),
            std_dev,
            min: Statistics::min(rtts.iter()),
            max: Statistics::max(rtts.iter()),
            median: Data::new(rtts.clone()).median(),
        })
    }
}
