//! JSON traceroute batch loading

use anyhow::{anyhow, Context, Result};
use crate::data::{Traceroute, TracerouteBatch};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use log;

/// Batches arrive either wrapped (`{"traceroutes": [...]}`) or as a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum BatchDocument {
    Wrapped(TracerouteBatch),
    Bare(Vec<Traceroute>),
}

impl From<BatchDocument> for TracerouteBatch {
    fn from(doc: BatchDocument) -> Self {
        match doc {
            BatchDocument::Wrapped(batch) => batch,
            BatchDocument::Bare(traceroutes) => TracerouteBatch::new(traceroutes),
        }
    }
}

/// Parse a traceroute batch from a JSON string
pub fn parse_batch(json: &str) -> Result<TracerouteBatch> {
    let doc: BatchDocument = serde_json::from_str(json)
        .context("Input is not a traceroute batch")?;
    Ok(doc.into())
}

/// Load a traceroute batch from a JSON file
pub fn load_batch(path: &str) -> Result<TracerouteBatch> {
    log::info!("Reading traceroute batch: {}", path);

    if !Path::new(path).exists() {
        return Err(anyhow!("File not found: {}", path));
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path))?;
    let batch = parse_batch(&contents)
        .with_context(|| format!("Failed to parse {}", path))?;

    log::info!(
        "Loaded {} traceroutes with {} hops",
        batch.len(),
        batch.hop_count()
    );

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_batch() {
        let batch = parse_batch(
            r#"{"traceroutes": [
                {"id": "t1", "ts": 100, "packets": [
                    {"ttl": 0, "ip": "10.0.0.1", "rtt": 0},
                    {"ttl": 1},
                    {"ttl": 2, "ip": "10.0.0.9", "rtt": 3.5}
                ]}
            ]}"#,
        )
        .unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch.hop_count(), 3);
        assert_eq!(batch.traceroutes[0].id.as_deref(), Some("t1"));
        assert!(batch.traceroutes[0].packets[1].ip.is_none());
    }

    #[test]
    fn test_parse_bare_array() {
        let batch = parse_batch(r#"[{"packets": []}, {"packets": [{"ip": "a"}]}]"#).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.hop_count(), 1);
    }

    #[test]
    fn test_malformed_hop_values_do_not_reject_the_batch() {
        let batch = parse_batch(
            r#"[{"ts": 7, "packets": [
                {"ttl": "1", "ip": "10.0.0.1", "rtt": "*"},
                {"ttl": 2, "ip": "10.0.0.2", "rtt": 1.25}
            ]}]"#,
        )
        .unwrap();

        let hops = &batch.traceroutes[0].packets;
        assert_eq!(batch.hop_count(), 2);
        assert_eq!(hops[0].ttl, Some(1));
        assert_eq!(hops[0].rtt, None);
        assert_eq!(hops[1].rtt, Some(1.25));
    }

    #[test]
    fn test_rejects_non_batch_json() {
        assert!(parse_batch(r#""just a string""#).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_batch("/nonexistent/batch.json").unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
