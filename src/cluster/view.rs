//! Expand/collapse bookkeeping and link derivation for renderers
//!
//! A renderer shows each base entity through exactly one visible owner: the
//! entity itself or one of its enclosing clusters. [`AliasMap`] keeps that
//! owner per id, and [`collapsed_links`] projects entity adjacency onto the
//! visible owners.

use crate::cluster::{Cluster, ClusterMap, Member};
use crate::graph::GraphNode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Every node of the hierarchy keyed by id.
///
/// When a passthrough cluster shares its child's id, the cluster is kept.
pub fn flatten(clusters: &ClusterMap) -> IndexMap<&str, &dyn GraphNode> {
    let mut flat: IndexMap<&str, &dyn GraphNode> = IndexMap::new();

    for cluster in clusters.values() {
        flat.entry(cluster.id.as_str()).or_insert(cluster);
        for member in cluster.descendants() {
            flat.entry(member.id()).or_insert(member);
        }
    }

    flat
}

/// Id to currently visible owner id, plus the set of expanded clusters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    owners: HashMap<String, String>,
    expanded: HashSet<String>,
}

impl AliasMap {
    /// Start with every top-level cluster collapsed
    pub fn from_clusters(clusters: &ClusterMap) -> Self {
        let mut aliases = Self::default();
        for cluster in clusters.values() {
            aliases.collapse(cluster);
        }
        aliases
    }

    /// Visible owner of `id`, if it belongs to the hierarchy
    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.owners.get(id).map(String::as_str)
    }

    /// Visible owners of `ids`; ids outside the hierarchy are dropped.
    ///
    /// Right after [`AliasMap::from_clusters`] the owners are the top-level
    /// cluster ids, which turns entity adjacency into cluster adjacency.
    pub fn resolve_all<I, S>(&self, ids: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .filter_map(|id| self.resolve(id.as_ref()).map(str::to_string))
            .collect()
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Hide the whole subtree of `cluster` behind it
    pub fn collapse(&mut self, cluster: &Cluster) {
        self.expanded.remove(&cluster.id);
        self.owners.insert(cluster.id.clone(), cluster.id.clone());

        for member in cluster.descendants() {
            if let Member::Cluster(nested) = member {
                self.expanded.remove(&nested.id);
            }
            self.owners.insert(member.id().to_string(), cluster.id.clone());
        }
    }

    /// Show the children of `cluster`, each collapsed.
    ///
    /// Returns `false` when the cluster was already expanded or has no
    /// children to show.
    pub fn expand(&mut self, cluster: &Cluster) -> bool {
        if !self.expanded.insert(cluster.id.clone()) {
            return false;
        }
        if cluster.is_empty() {
            return false;
        }

        for child in cluster.children.values() {
            match child {
                Member::Cluster(nested) => self.collapse(nested),
                Member::Entity(entity) => {
                    self.owners.insert(entity.id.clone(), entity.id.clone());
                }
            }
        }
        true
    }

    /// Nodes currently on screen, in hierarchy order
    pub fn visible<'a>(&self, clusters: &'a ClusterMap) -> Vec<&'a dyn GraphNode> {
        let mut out = Vec::new();
        for cluster in clusters.values() {
            self.collect_visible(cluster, &mut out);
        }
        out
    }

    fn collect_visible<'a>(&self, cluster: &'a Cluster, out: &mut Vec<&'a dyn GraphNode>) {
        if !self.is_expanded(&cluster.id) || cluster.is_empty() {
            out.push(cluster);
            return;
        }

        for child in cluster.children.values() {
            match child {
                Member::Cluster(nested) => self.collect_visible(nested, out),
                Member::Entity(entity) => out.push(entity),
            }
        }
    }
}

/// Edge between two visible owners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,

    /// Square root of the target's packet count, used for stroke width
    pub packet_scale: f64,

    /// Smaller of both endpoints' bandwidth, missing values count as 0
    pub max_bandwidth: f64,
}

/// Project successor edges onto the visible owners, dropping self-links
pub fn collapsed_links(clusters: &ClusterMap, aliases: &AliasMap) -> Vec<Link> {
    let flat = flatten(clusters);
    let mut links = Vec::new();

    for node in aliases.visible(clusters) {
        let owners: BTreeSet<&str> = node
            .target_ids()
            .iter()
            .filter_map(|t| aliases.resolve(t))
            .collect();

        for owner in owners {
            if owner == node.id() {
                continue;
            }
            let Some(target) = flat.get(owner) else {
                continue;
            };

            let source_bw = node.max_bandwidth().unwrap_or(0.0);
            let target_bw = target.max_bandwidth().unwrap_or(0.0);

            links.push(Link {
                source: node.id().to_string(),
                target: owner.to_string(),
                packet_scale: (target.packet_count() as f64).sqrt(),
                max_bandwidth: source_bw.min(target_bw),
            });
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{cluster_by, MaxDegree};
    use crate::data::{Hop, Traceroute};
    use crate::graph::algorithms::neighbors;
    use crate::graph::{build_entities, Entity};

    fn trace(ips: &[&str]) -> Traceroute {
        Traceroute::new(ips.iter().map(|ip| Hop::new(*ip, 1.0)).collect())
    }

    fn clusters() -> ClusterMap {
        let entities = build_entities(&[trace(&["a", "b", "c"]), trace(&["a", "b", "d"])]);
        let label = |e: &Entity| if e.ip == "a" || e.ip == "b" { "L1" } else { "L2" };
        cluster_by(&entities, label, |e| neighbors(e), None, MaxDegree::Finite(1)).unwrap()
    }

    fn pairs(links: &[Link]) -> Vec<(&str, &str)> {
        links.iter().map(|l| (l.source.as_str(), l.target.as_str())).collect()
    }

    #[test]
    fn test_collapsed_clusters_link_to_each_other() {
        let clusters = clusters();
        let aliases = AliasMap::from_clusters(&clusters);

        assert_eq!(aliases.resolve("ip(b)"), Some("L1 cluster-1"));
        assert_eq!(aliases.visible(&clusters).len(), 3);
        assert_eq!(
            pairs(&collapsed_links(&clusters, &aliases)),
            vec![("L1 cluster-1", "L2 cluster-1"), ("L1 cluster-1", "L2 cluster-2")]
        );
    }

    #[test]
    fn test_expand_then_collapse_round_trips() {
        let clusters = clusters();
        let mut aliases = AliasMap::from_clusters(&clusters);
        let original = aliases.clone();
        let l1 = &clusters["L1 cluster-1"];

        assert!(aliases.expand(l1));
        assert!(!aliases.expand(l1));
        assert!(aliases.is_expanded("L1 cluster-1"));
        assert_eq!(aliases.resolve("ip(a)"), Some("ip(a)"));

        let links = collapsed_links(&clusters, &aliases);
        assert_eq!(
            pairs(&links),
            vec![
                ("ip(a)", "ip(b)"),
                ("ip(b)", "L2 cluster-1"),
                ("ip(b)", "L2 cluster-2"),
            ]
        );
        assert!(links.iter().all(|l| l.source != l.target));
        assert!((links[0].packet_scale - 2f64.sqrt()).abs() < 1e-9);

        aliases.collapse(l1);
        assert_eq!(aliases, original);
    }

    #[test]
    fn test_resolve_all_maps_entity_ids_to_owners() {
        let clusters = clusters();
        let aliases = AliasMap::from_clusters(&clusters);

        let owners = aliases.resolve_all(["ip(a)", "ip(c)", "ip(d)", "ip(nowhere)"]);
        assert_eq!(
            owners.into_iter().collect::<Vec<_>>(),
            vec!["L1 cluster-1", "L2 cluster-1", "L2 cluster-2"]
        );
    }

    #[test]
    fn test_flatten_covers_every_level() {
        let clusters = clusters();
        let flat = flatten(&clusters);

        assert_eq!(flat.len(), 7);
        assert_eq!(flat["ip(c)"].packet_count(), 1);
    }

    #[test]
    fn test_expanding_a_passthrough_cluster_shows_its_entity() {
        let entities = build_entities(&[trace(&["a"])]);
        let clusters =
            cluster_by(&entities, |_| "x", |e| neighbors(e), None, MaxDegree::Finite(0)).unwrap();
        let mut aliases = AliasMap::from_clusters(&clusters);

        assert!(aliases.expand(&clusters["ip(a)"]));
        assert!(aliases.is_expanded("ip(a)"));

        let visible = aliases.visible(&clusters);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id(), "ip(a)");
    }
}
