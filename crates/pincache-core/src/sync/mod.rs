//! Pin photo synchronization.
//!
//! `SyncOrchestrator` is the one place where the photo source and the local
//! store meet: it fetches a page of photos for a pin, downloads the images,
//! and replaces the pin's photo set in a single store batch.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{SyncError, SyncOrchestrator, MAX_CONCURRENT_DOWNLOADS};
pub use state::{SyncOutcome, SyncState};
