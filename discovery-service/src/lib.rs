//! Capability-oriented agent discovery and selection service: wires
//! the registry, matcher, composer, and protocol planes into a single
//! facade (spec.md §1).

#![warn(missing_docs, clippy::pedantic)]

mod config;
mod service;

pub use config::{Configuration, HealthConfig, ServiceConfig};
pub use service::DiscoveryService;
