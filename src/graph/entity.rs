//! Per-address graph nodes

use crate::data::{Hop, UNKNOWN_IP};
use crate::graph::GraphNode;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Entities keyed by id, in first-encounter order
pub type EntityMap = IndexMap<String, Entity>;

/// Geographic position of a hop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// One node of the inferred graph, aggregating every hop seen at an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable id of the form `ip(<address>)`
    pub id: String,

    pub ip: String,

    // Descriptive attributes come from the hop that created the entity
    pub org: Option<String>,
    pub domain: Option<String>,
    pub ttl: Option<u32>,
    pub max_bandwidth: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub city: Option<String>,
    pub region: Option<String>,

    /// Hops recorded at this address, append-only
    pub packets: Vec<Hop>,

    /// Ids seen immediately before this entity
    pub source_ids: BTreeSet<String>,

    /// Ids seen immediately after this entity
    pub target_ids: BTreeSet<String>,
}

impl Entity {
    /// Create an empty entity from the first hop observed at its address
    pub fn from_hop(hop: &Hop) -> Self {
        Self {
            id: hop.entity_id(),
            ip: hop.address().to_string(),
            org: hop.org.clone(),
            domain: hop.domain.clone(),
            ttl: hop.ttl,
            max_bandwidth: hop.max_bandwidth,
            lat: hop.lat,
            lon: hop.lon,
            city: hop.city.clone(),
            region: hop.region.clone(),
            packets: Vec::new(),
            source_ids: BTreeSet::new(),
            target_ids: BTreeSet::new(),
        }
    }

    /// Whether this entity stands for silent hops
    pub fn is_unknown(&self) -> bool {
        self.ip == UNKNOWN_IP
    }
}

impl GraphNode for Entity {
    fn id(&self) -> &str {
        &self.id
    }

    fn packets(&self) -> Vec<&Hop> {
        self.packets.iter().collect()
    }

    fn source_ids(&self) -> BTreeSet<String> {
        self.source_ids.clone()
    }

    fn target_ids(&self) -> BTreeSet<String> {
        self.target_ids.clone()
    }

    fn ip(&self) -> Option<String> {
        Some(self.ip.clone())
    }

    fn org(&self) -> Option<String> {
        self.org.clone()
    }

    fn domain(&self) -> Option<String> {
        self.domain.clone()
    }

    fn ttl(&self) -> Option<u32> {
        self.ttl
    }

    fn max_bandwidth(&self) -> Option<f64> {
        self.max_bandwidth
    }

    fn location(&self) -> Option<Location> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Location { lat, lon }),
            _ => None,
        }
    }

    fn city(&self) -> Option<String> {
        self.city.clone()
    }

    fn region(&self) -> Option<String> {
        self.region.clone()
    }

    fn packet_count(&self) -> usize {
        self.packets.len()
    }
}
