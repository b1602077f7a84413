//! Results persistence module

use anyhow::Result;
use crate::cluster::metrics::ClusterSummary;
use crate::cluster::{Cluster, ClusterMap, Member};
use crate::graph::algorithms::{bottleneck, component_count, has_routing_loop};
use crate::graph::{EntityMap, GraphNode};
use itertools::Itertools;
use serde_json::{json, to_string_pretty, Value};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Save analysis results to the specified directory
pub fn save_results(
    entities: &EntityMap,
    clusters: &ClusterMap,
    summaries: &[ClusterSummary],
    output_dir: &str,
) -> Result<()> {
    log::info!("Saving {} clusters to {}", clusters.len(), output_dir);

    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;

    save_summary(entities, summaries, output_dir)?;
    save_entities(entities, output_dir)?;
    save_clusters(clusters, summaries, output_dir)?;

    log::info!("Results saved successfully");

    Ok(())
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(to_string_pretty(value)?.as_bytes())?;
    Ok(())
}

/// Save graph and cluster statistics
fn save_summary(
    entities: &EntityMap,
    summaries: &[ClusterSummary],
    output_dir: &str,
) -> Result<()> {
    log::info!("Saving summary information");

    let edge_count: usize = entities.values().map(|e| e.target_ids.len()).sum();
    let hop_count: usize = entities.values().map(|e| e.packets.len()).sum();
    let sizes: Vec<usize> = summaries.iter().map(|s| s.size).sorted().collect();
    let cluster_count = summaries.len();
    let narrowest = bottleneck(entities);

    let summary = json!({
        "graph_stats": {
            "entity_count": entities.len(),
            "edge_count": edge_count,
            "hop_count": hop_count,
            "component_count": component_count(entities),
            "routing_loop": has_routing_loop(entities),
            "bottleneck": narrowest.map(|(bandwidth, ip)| json!({
                "max_bandwidth": bandwidth,
                "ip": ip,
            })),
        },
        "cluster_stats": {
            "cluster_count": cluster_count,
            "largest_cluster_size": sizes.last().copied().unwrap_or(0),
            "smallest_cluster_size": sizes.first().copied().unwrap_or(0),
            "avg_cluster_size": sizes.iter().sum::<usize>() as f64 /
                                if cluster_count == 0 { 1.0 } else { cluster_count as f64 },
            "avg_density": summaries.iter().map(|s| s.density as f64).sum::<f64>() /
                           if cluster_count == 0 { 1.0 } else { cluster_count as f64 },
        }
    });

    write_json(&Path::new(output_dir).join("summary.json"), &summary)
}

/// Save the base entity graph
fn save_entities(entities: &EntityMap, output_dir: &str) -> Result<()> {
    log::info!("Saving {} entities", entities.len());

    let entities_json = json!({
        "entities": entities.values().collect::<Vec<_>>()
    });

    write_json(&Path::new(output_dir).join("entities.json"), &entities_json)
}

/// JSON view of a node with its derived fields resolved
fn node_json(node: &dyn GraphNode) -> Value {
    json!({
        "id": node.id(),
        "packet_count": node.packet_count(),
        "source_ids": node.source_ids(),
        "target_ids": node.target_ids(),
        "ip": node.ip(),
        "org": node.org(),
        "domain": node.domain(),
        "ttl": node.ttl(),
        "max_bandwidth": node.max_bandwidth(),
        "location": node.location(),
    })
}

/// Recursive cluster tree, children listed in insertion order
fn cluster_json(cluster: &Cluster) -> Value {
    let mut value = node_json(cluster);
    value["label"] = json!(cluster.label);
    value["children"] = cluster
        .children
        .values()
        .map(|child| match child {
            Member::Cluster(nested) => cluster_json(nested),
            Member::Entity(entity) => node_json(entity),
        })
        .collect();
    value
}

/// Save the cluster hierarchy together with the per-cluster summaries
fn save_clusters(
    clusters: &ClusterMap,
    summaries: &[ClusterSummary],
    output_dir: &str,
) -> Result<()> {
    log::info!("Saving cluster hierarchy");

    let clusters_json = json!({
        "clusters": clusters.values().map(cluster_json).collect::<Vec<_>>(),
        "summaries": summaries,
    });

    write_json(&Path::new(output_dir).join("clusters.json"), &clusters_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::metrics::summarize_clusters;
    use crate::cluster::{cluster_by, MaxDegree};
    use crate::data::{Hop, Traceroute};
    use crate::graph::algorithms::neighbors;
    use crate::graph::build_entities;

    #[test]
    fn test_results_are_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("out");
        let output_dir = output_dir.to_str().unwrap();

        let narrow = Hop {
            max_bandwidth: Some(1_000.0),
            ..Hop::new("b", 2.0)
        };
        let trace = Traceroute::new(vec![Hop::new("a", 1.0), Hop::silent(), narrow]);
        let entities = build_entities(&[trace]);
        let clusters =
            cluster_by(&entities, |_| "x", |e| neighbors(e), None, MaxDegree::Unbounded).unwrap();
        let summaries = summarize_clusters(&clusters);

        save_results(&entities, &clusters, &summaries, output_dir).unwrap();

        let read = |name: &str| -> Value {
            let text = fs::read_to_string(Path::new(output_dir).join(name)).unwrap();
            serde_json::from_str(&text).unwrap()
        };

        let summary = read("summary.json");
        assert_eq!(summary["graph_stats"]["entity_count"], 3);
        assert_eq!(summary["graph_stats"]["edge_count"], 2);
        assert_eq!(summary["graph_stats"]["bottleneck"]["ip"], "b");
        assert_eq!(summary["graph_stats"]["bottleneck"]["max_bandwidth"], 1_000.0);
        assert_eq!(summary["cluster_stats"]["cluster_count"], 1);

        let entities_json = read("entities.json");
        assert_eq!(entities_json["entities"].as_array().unwrap().len(), 3);

        let clusters_json = read("clusters.json");
        let cluster = &clusters_json["clusters"][0];
        assert_eq!(cluster["id"], "x");
        assert_eq!(cluster["packet_count"], 3);
        assert_eq!(cluster["children"].as_array().unwrap().len(), 3);
        assert_eq!(clusters_json["summaries"][0]["size"], 3);
    }
}
