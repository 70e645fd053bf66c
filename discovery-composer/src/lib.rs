//! Dependency resolution, conflict detection, and execution ordering
//! for multi-capability composition requests (spec.md §4.4).

#![warn(missing_docs, clippy::pedantic)]

mod composer;
mod dependency;
mod model;

pub use composer::Composer;
pub use dependency::DependencyGraph;
pub use model::{
    Conflict, ConflictType, ComposerConfig, CompositionRequest, CompositionResult,
    ResourceRequirement,
};
