//! Cluster statistics and metrics

use crate::cluster::{Cluster, ClusterMap};
use crate::graph::algorithms::RttStats;
use crate::graph::{Entity, GraphNode};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Clusters below this count are summarized sequentially
const PARALLEL_THRESHOLD: usize = 64;

/// Number of central members reported per cluster
const TOP_CENTRAL: usize = 5;

/// Per-cluster statistics handed to the renderer alongside the cluster map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: String,

    pub label: Option<String>,

    /// Number of base entities at any depth
    pub size: usize,

    pub packet_count: usize,

    /// Internal edges over potential directed edges
    pub density: f32,

    /// Members with the highest internal degree
    pub central_members: Vec<String>,

    pub rtt: Option<RttStats>,
}

/// Calculate density (actual internal edges / potential edges)
pub fn calculate_density(members: &[&Entity]) -> f32 {
    let n = members.len();
    if n <= 1 {
        return 1.0; // By convention, singleton clusters have density 1
    }

    // Potential edges = n * (n - 1) for directed graph
    let potential_edges = n * (n - 1);

    let member_set: HashSet<&str> = members.iter().map(|e| e.id.as_str()).collect();

    let actual_edges: usize = members
        .iter()
        .map(|e| {
            e.target_ids
                .iter()
                .filter(|t| **t != e.id && member_set.contains(t.as_str()))
                .count()
        })
        .sum();

    actual_edges as f32 / potential_edges as f32
}

/// Identify the members with the highest degree inside the cluster
pub fn central_members(members: &[&Entity]) -> Vec<String> {
    let member_set: HashSet<&str> = members.iter().map(|e| e.id.as_str()).collect();

    let mut degrees: Vec<(&str, usize)> = members
        .iter()
        .map(|e| {
            let degree = e
                .source_ids
                .iter()
                .chain(e.target_ids.iter())
                .filter(|id| **id != e.id && member_set.contains(id.as_str()))
                .count();
            (e.id.as_str(), degree)
        })
        .collect();

    // Stable sort keeps member order among equal degrees
    degrees.sort_by(|a, b| b.1.cmp(&a.1));

    degrees
        .into_iter()
        .take(TOP_CENTRAL)
        .map(|(id, _)| id.to_string())
        .collect()
}

/// Summarize a single cluster
pub fn summarize_cluster(cluster: &Cluster) -> ClusterSummary {
    let members = cluster.leaves();

    ClusterSummary {
        id: cluster.id.clone(),
        label: cluster.label.clone(),
        size: members.len(),
        packet_count: cluster.packet_count(),
        density: calculate_density(&members),
        central_members: central_members(&members),
        rtt: RttStats::from_hops(cluster.packets()),
    }
}

/// Summarize every cluster, in cluster order
pub fn summarize_clusters(clusters: &ClusterMap) -> Vec<ClusterSummary> {
    let clusters: Vec<&Cluster> = clusters.values().collect();

    if clusters.len() < PARALLEL_THRESHOLD {
        return clusters.into_iter().map(summarize_cluster).collect();
    }

    log::debug!("Summarizing {} clusters in parallel", clusters.len());
    clusters.par_iter().map(|c| summarize_cluster(c)).collect()
}
