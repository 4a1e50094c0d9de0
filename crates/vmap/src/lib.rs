//! # Vmap
//!
//! A vector map backed by one layer of an external data source, with a
//! persisted feature index for random access.
//!
//! [`VectorMap::open_old`] opens the layer at level 1 and, when an index file
//! is configured, tries to bring it to level 2 by loading that file. A
//! missing or corrupt index degrades to sequential access (or is rebuilt if
//! configured); an index written for a newer reader is a hard error.
//! [`VectorMap::open_new`] creates the layer for writing.

mod config;
mod engine;

pub use config::MapConfig;
pub use engine::{Mode, VectorMap};
