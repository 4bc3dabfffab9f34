extern crate env_logger;
extern crate log;

pub mod checkpoint;
pub mod compile;
pub mod config;
pub mod entity;
pub mod error;
pub mod export;
pub mod graph;
pub mod overlap;
pub mod relation;
pub mod resolver;
pub mod sources;
pub mod store;
pub mod vocab;

pub use entity::{AltIdNamespace, Entity, EntityKind, NaturalKey, Provenance};
pub use error::{HetnetError, Result};
pub use relation::{Direction, Relation, RelationSet};
pub use store::{EntityId, EntityStore};

/// Rows between two progress lines of a long scan.
pub const PROGRESS_INTERVAL: usize = 100_000;
