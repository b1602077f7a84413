//! Graph construction module

use crate::data::{Hop, Traceroute};
use crate::graph::{Entity, EntityMap};
use log;

/// Builder for incrementally constructing an entity graph from traceroutes
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Entities keyed by id, in first-encounter order
    entities: EntityMap,

    /// Number of traceroutes ingested
    traceroute_count: usize,

    /// Number of hops ingested
    hop_count: usize,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new graph builder with room for `capacity` entities
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entities: EntityMap::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Build a fresh entity map from a sequence of traceroutes
    pub fn build<'a, I>(traceroutes: I) -> EntityMap
    where
        I: IntoIterator<Item = &'a Traceroute>,
    {
        let mut builder = Self::new();
        for trace in traceroutes {
            builder.add_traceroute(trace);
        }
        builder.finish()
    }

    /// Get or create the entity the given hop resolves to
    fn get_or_create_entity(&mut self, hop: &Hop) -> &mut Entity {
        self.entities
            .entry(hop.entity_id())
            .or_insert_with(|| Entity::from_hop(hop))
    }

    /// Record every hop of a traceroute and the adjacency between consecutive hops
    pub fn add_traceroute(&mut self, trace: &Traceroute) {
        let ids: Vec<String> = trace.packets.iter().map(Hop::entity_id).collect();

        for (i, hop) in trace.packets.iter().enumerate() {
            let mut packet = hop.clone();
            if packet.ts.is_none() {
                packet.ts = trace.ts;
            }

            let entity = self.get_or_create_entity(hop);
            entity.packets.push(packet);

            if i > 0 {
                entity.source_ids.insert(ids[i - 1].clone());
            }
            if let Some(next) = ids.get(i + 1) {
                entity.target_ids.insert(next.clone());
            }
        }

        self.traceroute_count += 1;
        self.hop_count += trace.packets.len();
    }

    /// Number of distinct entities so far
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Consume the builder and return the entity map
    pub fn finish(self) -> EntityMap {
        log::debug!(
            "Built {} entities from {} traceroutes ({} hops)",
            self.entities.len(),
            self.traceroute_count,
            self.hop_count
        );
        self.entities
    }
}

/// Build the entity graph for a batch of traceroutes
pub fn build_entities(traceroutes: &[Traceroute]) -> EntityMap {
    GraphBuilder::build(traceroutes)
}
