//! External plane: HTTP server/client, multicast announce/listen, and
//! the in-process local cache that lets remote nodes join the same
//! capability pool (spec.md §4.5).

#![warn(missing_docs, clippy::pedantic)]

mod cache;
mod client;
mod error;
mod health_probe;
mod model;
mod multicast;
mod protocol;
mod server;

pub use cache::{matches_filter, LocalCache};
pub use client::{AgentMessage, DiscoveryClient, TaskRegistry};
pub use error::{ProtocolError, ProtocolResult};
pub use health_probe::HttpHealthProbe;
pub use model::{AgentFilter, ProtocolConfig};
pub use multicast::MAX_DATAGRAM_BYTES;
pub use protocol::Protocol;
pub use server::{router, serve};
