//! Hop graph representation and algorithms module

pub mod algorithms;
pub mod builder;
pub mod entity;

pub use builder::{build_entities, GraphBuilder};
pub use entity::{Entity, EntityMap, Location};

use crate::data::Hop;
use std::collections::BTreeSet;

/// Read access shared by base entities and clusters.
///
/// Entities answer from stored fields; clusters reduce over their children
/// on every call.
pub trait GraphNode {
    fn id(&self) -> &str;

    /// Every hop observed at this node, in recording order
    fn packets(&self) -> Vec<&Hop>;

    fn source_ids(&self) -> BTreeSet<String>;

    fn target_ids(&self) -> BTreeSet<String>;

    fn ip(&self) -> Option<String>;

    fn org(&self) -> Option<String>;

    fn domain(&self) -> Option<String>;

    fn ttl(&self) -> Option<u32>;

    fn max_bandwidth(&self) -> Option<f64>;

    fn location(&self) -> Option<Location>;

    fn city(&self) -> Option<String>;

    fn region(&self) -> Option<String>;

    fn packet_count(&self) -> usize {
        self.packets().len()
    }
}
