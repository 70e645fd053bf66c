//! Data model and error taxonomy for the agent discovery service.
//!
//! This crate has no I/O: it defines the entities the registry,
//! matcher, composer, and protocol crates operate on, plus the shared
//! error taxonomy from spec.md §7.

#![warn(missing_docs, clippy::pedantic)]

mod agent;
mod capability;
mod card;
pub mod duration_nanos;
mod error;
mod event;
mod ids;

pub use agent::{AgentInfo, AgentStatus};
pub use capability::{CapabilityInfo, CapabilityStatus, LATENCY_EMA_ALPHA};
pub use card::{AgentCard, CapabilityDescriptor, CapabilityType};
pub use error::{DiscoveryError, DiscoveryResult, ErrorKind};
pub use event::{DiscoveryEvent, EventType};
pub use ids::{AgentId, SubscriptionId};
