//! Traceroute records and batch loading

pub mod loader;
pub mod preprocessing;
pub mod traceroute;

pub use traceroute::{Hop, Traceroute, TracerouteBatch, UNKNOWN_IP};
