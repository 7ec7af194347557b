// src/config/mod.rs
pub mod relay;

pub use relay::{RelayConfig, SinkConfig, SourceConfig};
