//! Core library functions for the traceroute cluster pipeline

pub mod config;
pub mod data;
pub mod graph;
pub mod cluster;
pub mod storage;

pub use anyhow::{Result, anyhow};
