//! pincache core - pins on a map, each with an offline cache of nearby photos.
//!
//! The crate is split the way data flows through it:
//!
//! - `api`: the remote photo source (Flickr search and image download)
//! - `store`: the local pin/photo store with its disk tier and read view
//! - `sync`: the orchestrator that fetches photos and replaces a pin's set
//! - `models`, `config`, `utils`: shared types, settings, and formatting

pub mod api;
pub mod config;
pub mod models;
pub mod store;
pub mod sync;
pub mod utils;

#[cfg(test)]
mod testing;

pub use api::{FlickrClient, PhotoSource, SourceError};
pub use config::{Config, MapRegion};
pub use models::{Coordinate, Photo, PhotoId, Pin, PinId};
pub use store::{LocalStore, StoreError, StoreView};
pub use sync::{SyncError, SyncOrchestrator, SyncOutcome, SyncState};
