//! Local store for offline access to pins and their photos.
//!
//! This module provides the `LocalStore`, a write-through cache over the
//! pin/photo entity graph:
//!
//! - One writer thread owns the authoritative graph and applies batches
//!   one at a time
//! - Each committed batch is published to the read projection
//!   (`StoreView`) and then written to disk
//! - A disk failure is fatal; the store refuses writes afterwards
//!
//! Data lives in a store directory: a JSON index plus one blob per photo.

pub mod disk;
pub mod error;
pub mod graph;
pub mod local;

pub use disk::{DiskStore, SCHEMA_VERSION};
pub use error::StoreError;
pub use graph::{EntityGraph, GraphCounts};
pub use local::{LocalStore, StoreView};
