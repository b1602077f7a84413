//! Configuration management for the traceroute cluster pipeline

use crate::cluster::MaxDegree;
use crate::data::UNKNOWN_IP;
use crate::graph::GraphNode;
use clap::ValueEnum;

/// Label given to the sentinel entity of silent hops
pub const ANONYMOUS_LABEL: &str = "ANONYMOUS";

/// Label given to entities missing the labeling attribute
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Attribute used to group entities into clusters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LabelKind {
    /// Owning organization (AS owner)
    #[default]
    Org,
    Domain,
    City,
    Region,
    /// Address itself, useful with nested clustering
    Ip,
}

impl LabelKind {
    /// Label of a node under this kind
    pub fn label_for<N: GraphNode + ?Sized>(&self, node: &N) -> String {
        let ip = node.ip();
        if ip.as_deref() == Some(UNKNOWN_IP) {
            return ANONYMOUS_LABEL.to_string();
        }

        let value = match self {
            LabelKind::Org => node.org(),
            LabelKind::Domain => node.domain(),
            LabelKind::City => node.city(),
            LabelKind::Region => node.region(),
            LabelKind::Ip => ip,
        };

        value
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
    }

    /// Short name, used as the default cluster id prefix
    pub fn name(&self) -> &'static str {
        match self {
            LabelKind::Org => "org",
            LabelKind::Domain => "domain",
            LabelKind::City => "city",
            LabelKind::Region => "region",
            LabelKind::Ip => "ip",
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Attribute clusters are formed on
    pub label: LabelKind,

    /// Clustering policy
    pub max_degree: MaxDegree,

    /// Prefix for cluster ids; the label kind's name when unset
    pub id_prefix: Option<String>,

    /// Earliest traceroute timestamp to include
    pub ts_min: Option<i64>,

    /// Latest traceroute timestamp to include
    pub ts_max: Option<i64>,

    /// Traceroute ids hidden from the graph
    pub hidden_ids: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label: LabelKind::Org,
            max_degree: MaxDegree::Finite(1),
            id_prefix: None,
            ts_min: None,
            ts_max: None,
            hidden_ids: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new configuration with custom clustering values
    pub fn new(label: LabelKind, max_degree: MaxDegree, id_prefix: Option<String>) -> Self {
        Self {
            label,
            max_degree,
            id_prefix,
            ..Default::default()
        }
    }

    pub fn with_time_window(mut self, ts_min: Option<i64>, ts_max: Option<i64>) -> Self {
        self.ts_min = ts_min;
        self.ts_max = ts_max;
        self
    }

    pub fn with_hidden_ids(mut self, ids: Vec<String>) -> Self {
        self.hidden_ids = ids;
        self
    }

    /// Prefix actually used for cluster ids
    pub fn effective_prefix(&self) -> &str {
        self.id_prefix.as_deref().unwrap_or_else(|| self.label.name())
    }
}
