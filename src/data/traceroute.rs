//! Raw traceroute records as produced by the collection backend

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Address used for hops that did not answer (or were recorded without one)
pub const UNKNOWN_IP: &str = "unknown";

/// Optional field that reads unusable values as missing.
///
/// Collectors write placeholders such as `"rtt": "*"` for lost replies and
/// sometimes quote numbers (`"ttl": "3"`). Strings are parsed, anything else
/// must already have the right JSON type, otherwise the field becomes `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromStr,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => raw.trim().parse().ok(),
        value => serde_json::from_value(value).ok(),
    })
}

/// One recorded point of a traceroute path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    /// Hop distance from the source
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    /// Responding address, absent for silent hops
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Round-trip time as recorded by the sender
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub rtt: Option<f64>,

    /// Timestamp of the owning traceroute
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Interface speed reported by the enrichment step
    #[serde(default, alias = "speed", deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_bandwidth: Option<f64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Auxiliary traffic counters, kept opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<serde_json::Value>,
}

impl Hop {
    /// Create a hop with just an address and round-trip time
    pub fn new(ip: impl Into<String>, rtt: f64) -> Self {
        Self {
            ip: Some(ip.into()),
            rtt: Some(rtt),
            ..Default::default()
        }
    }

    /// Create a hop that did not respond
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    /// Address of this hop, or the sentinel when it is missing or empty
    pub fn address(&self) -> &str {
        match self.ip.as_deref() {
            Some(ip) if !ip.is_empty() => ip,
            _ => UNKNOWN_IP,
        }
    }

    /// Entity identifier this hop resolves to
    pub fn entity_id(&self) -> String {
        format!("ip({})", self.address())
    }
}

/// A single traceroute run: an ordered sequence of hops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Traceroute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_address: Option<String>,

    #[serde(default)]
    pub packets: Vec<Hop>,
}

impl Traceroute {
    pub fn new(packets: Vec<Hop>) -> Self {
        Self {
            packets,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_ts(mut self, ts: i64) -> Self {
        self.ts = Some(ts);
        self
    }
}

/// Ordered batch of traceroutes, the unit of one visualization update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TracerouteBatch {
    #[serde(default)]
    pub traceroutes: Vec<Traceroute>,
}

impl TracerouteBatch {
    pub fn new(traceroutes: Vec<Traceroute>) -> Self {
        Self { traceroutes }
    }

    pub fn len(&self) -> usize {
        self.traceroutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traceroutes.is_empty()
    }

    /// Total number of hops over all traceroutes
    pub fn hop_count(&self) -> usize {
        self.traceroutes.iter().map(|t| t.packets.len()).sum()
    }
}
