//! Cluster analysis module

pub mod engine;
pub mod metrics;
pub mod view;

pub use engine::{cluster_by, try_cluster_by, ClusterEngine};

use crate::data::Hop;
use crate::graph::{Entity, GraphNode, Location};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Clusters keyed by id, in formation order
pub type ClusterMap = IndexMap<String, Cluster>;

/// Errors raised by the clustering engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// Multi-hop tolerance through differently labeled entities is not defined
    #[error("max degree {0} is not supported (use 0, 1 or inf)")]
    UnsupportedDegree(usize),

    #[error("invalid max degree '{0}'")]
    InvalidDegree(String),
}

/// How far clustering may reach from a seed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxDegree {
    /// `0` flattens clustering off, `1` clusters label-connected components
    Finite(usize),

    /// Group by label regardless of connectivity
    Unbounded,
}

impl Default for MaxDegree {
    fn default() -> Self {
        MaxDegree::Finite(1)
    }
}

impl FromStr for MaxDegree {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inf" | "infinity" | "unbounded" => Ok(MaxDegree::Unbounded),
            other => other
                .parse::<usize>()
                .map(MaxDegree::Finite)
                .map_err(|_| ClusterError::InvalidDegree(s.to_string())),
        }
    }
}

impl fmt::Display for MaxDegree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxDegree::Finite(n) => write!(f, "{}", n),
            MaxDegree::Unbounded => write!(f, "inf"),
        }
    }
}

/// A child of a cluster: a base entity or a nested cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Member {
    Entity(Entity),
    Cluster(Cluster),
}

impl From<Entity> for Member {
    fn from(entity: Entity) -> Self {
        Member::Entity(entity)
    }
}

impl From<Cluster> for Member {
    fn from(cluster: Cluster) -> Self {
        Member::Cluster(cluster)
    }
}

impl Member {
    fn node(&self) -> &dyn GraphNode {
        match self {
            Member::Entity(entity) => entity as &dyn GraphNode,
            Member::Cluster(cluster) => cluster as &dyn GraphNode,
        }
    }

    pub fn as_cluster(&self) -> Option<&Cluster> {
        match self {
            Member::Cluster(cluster) => Some(cluster),
            Member::Entity(_) => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Member::Entity(entity) => Some(entity),
            Member::Cluster(_) => None,
        }
    }
}

impl GraphNode for Member {
    fn id(&self) -> &str {
        self.node().id()
    }

    fn packets(&self) -> Vec<&Hop> {
        self.node().packets()
    }

    fn source_ids(&self) -> BTreeSet<String> {
        self.node().source_ids()
    }

    fn target_ids(&self) -> BTreeSet<String> {
        self.node().target_ids()
    }

    fn ip(&self) -> Option<String> {
        self.node().ip()
    }

    fn org(&self) -> Option<String> {
        self.node().org()
    }

    fn domain(&self) -> Option<String> {
        self.node().domain()
    }

    fn ttl(&self) -> Option<u32> {
        self.node().ttl()
    }

    fn max_bandwidth(&self) -> Option<f64> {
        self.node().max_bandwidth()
    }

    fn location(&self) -> Option<Location> {
        self.node().location()
    }

    fn city(&self) -> Option<String> {
        self.node().city()
    }

    fn region(&self) -> Option<String> {
        self.node().region()
    }

    fn packet_count(&self) -> usize {
        self.node().packet_count()
    }
}

/// A group of entities (or nested clusters) sharing a label.
///
/// Only the children are stored. Packets, adjacency and descriptive
/// attributes are reduced from the children on every access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,

    /// Label value shared by the members, absent for passthrough clusters
    pub label: Option<String>,

    /// Children keyed by id, in insertion order
    pub children: IndexMap<String, Member>,
}

impl Cluster {
    pub fn new(id: impl Into<String>, label: Option<String>) -> Self {
        Self {
            id: id.into(),
            label,
            children: IndexMap::new(),
        }
    }

    /// Add a child, replacing any previous child with the same id
    pub fn insert(&mut self, member: impl Into<Member>) {
        let member = member.into();
        self.children.insert(member.id().to_string(), member);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Every transitive child, depth first in child order
    pub fn descendants(&self) -> Vec<&Member> {
        let mut out = Vec::new();
        for child in self.children.values() {
            out.push(child);
            if let Member::Cluster(nested) = child {
                out.extend(nested.descendants());
            }
        }
        out
    }

    /// Base entities under this cluster at any depth
    pub fn leaves(&self) -> Vec<&Entity> {
        self.descendants()
            .into_iter()
            .filter_map(Member::as_entity)
            .collect()
    }

    /// Value shared by every child, or `None` when children disagree
    fn reduce_scalar<T, F>(&self, field: F) -> Option<T>
    where
        T: PartialEq,
        F: Fn(&Member) -> Option<T>,
    {
        let mut values = self.children.values().map(field);
        let first = values.next()??;
        for value in values {
            if value.as_ref() != Some(&first) {
                return None;
            }
        }
        Some(first)
    }
}

impl GraphNode for Cluster {
    fn id(&self) -> &str {
        &self.id
    }

    fn packets(&self) -> Vec<&Hop> {
        self.children.values().flat_map(|c| c.packets()).collect()
    }

    fn source_ids(&self) -> BTreeSet<String> {
        self.children.values().flat_map(|c| c.source_ids()).collect()
    }

    fn target_ids(&self) -> BTreeSet<String> {
        self.children.values().flat_map(|c| c.target_ids()).collect()
    }

    fn ip(&self) -> Option<String> {
        self.reduce_scalar(|c| c.ip())
    }

    fn org(&self) -> Option<String> {
        self.reduce_scalar(|c| c.org())
    }

    fn domain(&self) -> Option<String> {
        self.reduce_scalar(|c| c.domain())
    }

    fn ttl(&self) -> Option<u32> {
        self.reduce_scalar(|c| c.ttl())
    }

    fn max_bandwidth(&self) -> Option<f64> {
        self.reduce_scalar(|c| c.max_bandwidth())
    }

    fn location(&self) -> Option<Location> {
        self.reduce_scalar(|c| c.location())
    }

    fn city(&self) -> Option<String> {
        self.reduce_scalar(|c| c.city())
    }

    fn region(&self) -> Option<String> {
        self.reduce_scalar(|c| c.region())
    }

    fn packet_count(&self) -> usize {
        self.children.values().map(|c| c.packet_count()).sum()
    }
}
