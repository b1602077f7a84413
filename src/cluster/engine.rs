//! Label-driven cluster formation

use crate::cluster::{Cluster, ClusterError, ClusterMap, MaxDegree, Member};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Display;
use log;

/// Prefix-qualified label used to name clusters
fn label_key<L: Display>(id_prefix: Option<&str>, label: &L) -> String {
    match id_prefix {
        Some(prefix) => format!("{}({})", prefix, label),
        None => label.to_string(),
    }
}

/// Reusable clustering parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterEngine {
    id_prefix: Option<String>,
    max_degree: MaxDegree,
}

impl ClusterEngine {
    pub fn new(max_degree: MaxDegree) -> Self {
        Self {
            id_prefix: None,
            max_degree,
        }
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    pub fn max_degree(&self) -> MaxDegree {
        self.max_degree
    }

    pub fn id_prefix(&self) -> Option<&str> {
        self.id_prefix.as_deref()
    }

    /// Cluster with infallible label and neighbor functions
    pub fn cluster<N, L, FL, FN>(
        &self,
        entities: &IndexMap<String, N>,
        label: FL,
        neighbors: FN,
    ) -> Result<ClusterMap, ClusterError>
    where
        N: Clone + Into<Member>,
        L: Display + PartialEq,
        FL: FnMut(&N) -> L,
        FN: FnMut(&N) -> BTreeSet<String>,
    {
        cluster_by(entities, label, neighbors, self.id_prefix(), self.max_degree)
    }

    /// Cluster with label and neighbor functions that may fail
    pub fn try_cluster<N, L, E, FL, FN>(
        &self,
        entities: &IndexMap<String, N>,
        label: FL,
        neighbors: FN,
    ) -> Result<ClusterMap, E>
    where
        N: Clone + Into<Member>,
        L: Display + PartialEq,
        E: From<ClusterError>,
        FL: FnMut(&N) -> Result<L, E>,
        FN: FnMut(&N) -> Result<BTreeSet<String>, E>,
    {
        try_cluster_by(entities, label, neighbors, self.id_prefix(), self.max_degree)
    }
}

/// Partition `entities` into clusters of equal label.
///
/// See [`try_cluster_by`] for the policy selected by `max_degree`.
/// `neighbors` must return ids keyed like `entities`; ids missing from the
/// map are skipped. When clustering clusters, their adjacency holds base
/// entity ids, so map it onto cluster ids first with
/// [`AliasMap::resolve_all`](crate::cluster::view::AliasMap::resolve_all).
pub fn cluster_by<N, L, FL, FN>(
    entities: &IndexMap<String, N>,
    mut label: FL,
    mut neighbors: FN,
    id_prefix: Option<&str>,
    max_degree: MaxDegree,
) -> Result<ClusterMap, ClusterError>
where
    N: Clone + Into<Member>,
    L: Display + PartialEq,
    FL: FnMut(&N) -> L,
    FN: FnMut(&N) -> BTreeSet<String>,
{
    try_cluster_by(
        entities,
        |node| Ok(label(node)),
        |node| Ok(neighbors(node)),
        id_prefix,
        max_degree,
    )
}

/// Partition `entities` into clusters, propagating label and neighbor failures.
///
/// - `Finite(0)`: every entity becomes its own cluster, keyed by its id.
/// - `Unbounded`: one cluster per label, keyed by the label key.
/// - `Finite(1)`: one cluster per label-connected component, keyed by
///   `<label key> cluster-<n>` with `n` counting components of that label.
/// - Any larger finite degree is rejected.
pub fn try_cluster_by<N, L, E, FL, FN>(
    entities: &IndexMap<String, N>,
    label: FL,
    neighbors: FN,
    id_prefix: Option<&str>,
    max_degree: MaxDegree,
) -> Result<ClusterMap, E>
where
    N: Clone + Into<Member>,
    L: Display + PartialEq,
    E: From<ClusterError>,
    FL: FnMut(&N) -> Result<L, E>,
    FN: FnMut(&N) -> Result<BTreeSet<String>, E>,
{
    let clusters = match max_degree {
        MaxDegree::Finite(0) => passthrough(entities),
        MaxDegree::Unbounded => group_by_label(entities, label, id_prefix)?,
        MaxDegree::Finite(1) => connected_by_label(entities, label, neighbors, id_prefix)?,
        MaxDegree::Finite(n) => return Err(ClusterError::UnsupportedDegree(n).into()),
    };

    log::debug!(
        "Formed {} clusters from {} entities (max degree {})",
        clusters.len(),
        entities.len(),
        max_degree
    );

    Ok(clusters)
}

/// One singleton cluster per entity
fn passthrough<N>(entities: &IndexMap<String, N>) -> ClusterMap
where
    N: Clone + Into<Member>,
{
    entities
        .iter()
        .map(|(id, node)| {
            let mut cluster = Cluster::new(id.clone(), None);
            cluster.insert(node.clone());
            (id.clone(), cluster)
        })
        .collect()
}

/// Group by label regardless of connectivity
fn group_by_label<N, L, E, FL>(
    entities: &IndexMap<String, N>,
    mut label: FL,
    id_prefix: Option<&str>,
) -> Result<ClusterMap, E>
where
    N: Clone + Into<Member>,
    L: Display,
    FL: FnMut(&N) -> Result<L, E>,
{
    let mut clusters = ClusterMap::new();

    for node in entities.values() {
        let value = label(node)?;
        let key = label_key(id_prefix, &value);
        clusters
            .entry(key.clone())
            .or_insert_with(|| Cluster::new(key, Some(value.to_string())))
            .insert(node.clone());
    }

    Ok(clusters)
}

/// Depth-first growth of label-homogeneous components.
///
/// Seeds are taken in map order among entities not yet assigned. A
/// candidate is admitted, and expanded, only when its label equals the
/// seed's; every candidate is examined at most once per component.
fn connected_by_label<N, L, E, FL, FN>(
    entities: &IndexMap<String, N>,
    label: FL,
    mut neighbors: FN,
    id_prefix: Option<&str>,
) -> Result<ClusterMap, E>
where
    N: Clone + Into<Member>,
    L: Display + PartialEq,
    FL: FnMut(&N) -> Result<L, E>,
    FN: FnMut(&N) -> Result<BTreeSet<String>, E>,
{
    let labels: Vec<L> = entities.values().map(label).collect::<Result<_, E>>()?;

    let mut clusters = ClusterMap::new();
    let mut assigned = vec![false; entities.len()];
    let mut counters: HashMap<String, usize> = HashMap::new();

    for seed in 0..entities.len() {
        if assigned[seed] {
            continue;
        }

        let seed_label = &labels[seed];
        let key = label_key(id_prefix, seed_label);
        let count = counters.entry(key.clone()).or_insert(0);
        *count += 1;

        let mut cluster = Cluster::new(
            format!("{} cluster-{}", key, count),
            Some(seed_label.to_string()),
        );

        let mut visited: HashSet<usize> = HashSet::from([seed]);
        let mut stack = vec![seed];
        assigned[seed] = true;

        while let Some(current) = stack.pop() {
            let Some((_, node)) = entities.get_index(current) else {
                continue;
            };
            cluster.insert(node.clone());

            for next_id in neighbors(node)? {
                let Some(next) = entities.get_index_of(next_id.as_str()) else {
                    continue;
                };
                if assigned[next] || !visited.insert(next) {
                    continue;
                }
                if labels[next] == *seed_label {
                    assigned[next] = true;
                    stack.push(next);
                }
            }
        }

        clusters.insert(cluster.id.clone(), cluster);
    }

    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::view::AliasMap;
    use crate::data::{Hop, Traceroute};
    use crate::graph::algorithms::neighbors;
    use crate::graph::{build_entities, Entity, EntityMap, GraphNode};

    fn trace(ips: &[&str]) -> Traceroute {
        Traceroute::new(ips.iter().map(|ip| Hop::new(*ip, 1.0)).collect())
    }

    /// Labels by the first character of the address: "a1" -> "a"
    fn first_char(entity: &Entity) -> String {
        entity.ip[..1].to_string()
    }

    fn member_ids(cluster: &Cluster) -> Vec<&str> {
        cluster.children.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_degree_zero_is_passthrough() {
        let entities = build_entities(&[trace(&["a1", "a2", "b1"])]);
        let clusters =
            cluster_by(&entities, first_char, |e| neighbors(e), None, MaxDegree::Finite(0)).unwrap();

        assert_eq!(clusters.len(), 3);
        for (id, cluster) in &clusters {
            assert_eq!(member_ids(cluster), vec![id.as_str()]);
            assert!(cluster.label.is_none());
        }
    }

    #[test]
    fn test_unbounded_groups_disconnected_entities() {
        let entities = build_entities(&[trace(&["a1", "b1"]), trace(&["a2", "c1"])]);
        let clusters = cluster_by(
            &entities,
            first_char,
            |e| neighbors(e),
            Some("org"),
            MaxDegree::Unbounded,
        )
        .unwrap();

        assert_eq!(clusters.len(), 3);
        assert_eq!(member_ids(&clusters["org(a)"]), vec!["ip(a1)", "ip(a2)"]);
        assert_eq!(clusters["org(a)"].label.as_deref(), Some("a"));
    }

    #[test]
    fn test_degree_one_requires_label_at_every_step() {
        // a1 and a2 are only connected through b1
        let entities = build_entities(&[trace(&["a1", "b1", "a2"])]);
        let clusters =
            cluster_by(&entities, first_char, |e| neighbors(e), None, MaxDegree::Finite(1)).unwrap();

        let ids: Vec<_> = clusters.keys().cloned().collect();
        assert_eq!(ids, vec!["a cluster-1", "b cluster-1", "a cluster-2"]);
        assert_eq!(member_ids(&clusters["a cluster-1"]), vec!["ip(a1)"]);
        assert_eq!(member_ids(&clusters["a cluster-2"]), vec!["ip(a2)"]);
    }

    #[test]
    fn test_degree_one_follows_chains_of_equal_labels() {
        let entities = build_entities(&[trace(&["a1", "a2", "a3", "b1"]), trace(&["b2", "a3"])]);
        let clusters =
            cluster_by(&entities, first_char, |e| neighbors(e), None, MaxDegree::Finite(1)).unwrap();

        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters["a cluster-1"].len(), 3);
        assert_eq!(member_ids(&clusters["b cluster-1"]), vec!["ip(b1)"]);
        assert_eq!(member_ids(&clusters["b cluster-2"]), vec!["ip(b2)"]);
    }

    #[test]
    fn test_every_entity_lands_in_exactly_one_cluster() {
        let entities = build_entities(&[
            trace(&["a1", "b1", "a2", "c1"]),
            trace(&["c2", "b1", "b2", "a1"]),
            trace(&["a3"]),
        ]);
        let clusters =
            cluster_by(&entities, first_char, |e| neighbors(e), None, MaxDegree::Finite(1)).unwrap();

        let mut seen: Vec<String> = clusters
            .values()
            .flat_map(|c| c.children.keys().cloned())
            .collect();
        seen.sort();
        let mut expected: Vec<String> = entities.keys().cloned().collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_unknown_neighbor_ids_are_ignored() {
        let entities = build_entities(&[trace(&["a1"])]);
        let clusters = cluster_by(
            &entities,
            first_char,
            |_| BTreeSet::from(["ip(missing)".to_string()]),
            None,
            MaxDegree::Finite(1),
        )
        .unwrap();
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_larger_degrees_are_rejected() {
        let entities = build_entities(&[trace(&["a1"])]);
        let err = cluster_by(&entities, first_char, |e| neighbors(e), None, MaxDegree::Finite(2))
            .unwrap_err();
        assert_eq!(err, ClusterError::UnsupportedDegree(2));
    }

    #[test]
    fn test_label_failures_propagate() {
        let entities = build_entities(&[trace(&["a1", "b1"])]);
        let result: anyhow::Result<ClusterMap> = try_cluster_by(
            &entities,
            |e: &Entity| {
                if e.ip == "b1" {
                    anyhow::bail!("no label for {}", e.id)
                }
                Ok(first_char(e))
            },
            |e| Ok(neighbors(e)),
            None,
            MaxDegree::Finite(1),
        );

        assert_eq!(result.unwrap_err().to_string(), "no label for ip(b1)");
    }

    #[test]
    fn test_empty_input_yields_no_clusters() {
        let entities = EntityMap::new();
        for degree in [MaxDegree::Finite(0), MaxDegree::Finite(1), MaxDegree::Unbounded] {
            let clusters = cluster_by(&entities, first_char, |e| neighbors(e), None, degree).unwrap();
            assert!(clusters.is_empty());
        }
    }

    #[test]
    fn test_connected_reclustering_uses_owner_ids() {
        // a1 - a2 - b1 - a3, first clustered one address per cluster
        let entities = build_entities(&[trace(&["a1", "a2", "b1", "a3"])]);
        let by_ip = cluster_by(
            &entities,
            |e: &Entity| e.ip.clone(),
            |e| neighbors(e),
            None,
            MaxDegree::Finite(1),
        )
        .unwrap();
        assert_eq!(by_ip.len(), 4);

        let first_letter = |c: &Cluster| c.label.clone().unwrap_or_default()[..1].to_string();

        // Entity ids never match cluster keys, so nothing connects
        let unresolved =
            cluster_by(&by_ip, first_letter, |c| neighbors(c), None, MaxDegree::Finite(1)).unwrap();
        assert_eq!(unresolved.len(), 4);

        let aliases = AliasMap::from_clusters(&by_ip);
        let regrouped = cluster_by(
            &by_ip,
            first_letter,
            |c| aliases.resolve_all(neighbors(c)),
            None,
            MaxDegree::Finite(1),
        )
        .unwrap();

        let ids: Vec<_> = regrouped.keys().cloned().collect();
        assert_eq!(ids, vec!["a cluster-1", "b cluster-1", "a cluster-2"]);
        assert_eq!(regrouped["a cluster-1"].len(), 2);
        assert_eq!(regrouped["a cluster-1"].leaves().len(), 2);
        assert_eq!(regrouped["a cluster-2"].leaves()[0].id, "ip(a3)");
    }

    #[test]
    fn test_clusters_can_be_clustered_again() {
        let entities = build_entities(&[trace(&["a1", "a2", "b1"]), trace(&["c1", "b2"])]);
        let engine = ClusterEngine::new(MaxDegree::Finite(1));
        let clusters = engine.cluster(&entities, first_char, |e| neighbors(e)).unwrap();
        assert_eq!(clusters.len(), 4);

        // Merge the b components regardless of connectivity
        let regrouped = ClusterEngine::new(MaxDegree::Unbounded)
            .with_id_prefix("group")
            .cluster(
                &clusters,
                |c: &Cluster| c.label.clone().unwrap_or_default(),
                |c| neighbors(c),
            )
            .unwrap();

        let b = &regrouped["group(b)"];
        assert_eq!(b.len(), 2);
        assert_eq!(b.leaves().len(), 2);
        assert_eq!(b.packet_count(), 2);
    }
}
