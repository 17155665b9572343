//! Fetch-and-replace synchronization between the photo source and the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{PhotoRecord, PhotoSource, SourceError};
use crate::models::{Coordinate, NewPhoto, PinId, DEFAULT_PAGE_NUMBER};
use crate::store::{LocalStore, StoreError};

use super::{SyncOutcome, SyncState};

// ============================================================================
// Constants
// ============================================================================

/// Maximum concurrent image downloads for one sync.
/// Keeps a 21-photo page quick without hammering the image host.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 6;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(Coordinate),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Clears the in-flight flag when the fetch that set it finishes.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Coordinates photo fetches for pins.
///
/// At most one fetch runs at a time across all pins. A trigger that arrives
/// while a fetch is in flight is dropped and reported as
/// `SyncOutcome::Skipped`; nothing is queued or cancelled.
///
/// Share it behind an `Arc` to trigger syncs from spawned tasks.
pub struct SyncOrchestrator<S> {
    source: S,
    store: LocalStore,
    /// Only set by `try_begin`, only cleared by dropping its `InFlight`.
    in_flight: AtomicBool,
    states: Mutex<HashMap<PinId, SyncState>>,
    default_page: u32,
}

impl<S: PhotoSource> SyncOrchestrator<S> {
    pub fn new(source: S, store: LocalStore) -> Self {
        Self {
            source,
            store,
            in_flight: AtomicBool::new(false),
            states: Mutex::new(HashMap::new()),
            default_page: DEFAULT_PAGE_NUMBER,
        }
    }

    /// Page a freshly dropped pin fetches first.
    pub fn with_default_page(mut self, page: u32) -> Self {
        self.default_page = page.max(1);
        self
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn state(&self, pin: PinId) -> SyncState {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pin)
            .copied()
            .unwrap_or_default()
    }

    /// Record `state` for `pin` and forget pins that no longer exist.
    fn set_state(&self, pin: PinId, state: SyncState) {
        let snapshot = self.store.snapshot();
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.retain(|id, _| snapshot.pin(*id).is_some());
        if state == SyncState::Idle {
            states.remove(&pin);
        } else {
            states.insert(pin, state);
        }
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                flag: &self.in_flight,
            })
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    /// Create a pin at `coordinate` and fetch its first page of photos.
    ///
    /// The pin is created even when the fetch is skipped or fails; it then
    /// has an empty photo set.
    pub async fn drop_pin(&self, coordinate: Coordinate) -> Result<(PinId, SyncOutcome), SyncError> {
        if !coordinate.is_valid() {
            return Err(SyncError::InvalidCoordinate(coordinate));
        }

        let page = self.default_page;
        let pin = self.store.insert_pin(coordinate, page).await?;
        info!(pin = %pin, %coordinate, "Dropped pin");
        // Ids are reused after a reset; never report an earlier pin's state.
        self.set_state(pin, SyncState::Idle);

        let Some(guard) = self.try_begin() else {
            debug!(pin = %pin, "Fetch already in flight, skipping");
            return Ok((pin, SyncOutcome::Skipped));
        };

        let outcome = self.fetch_and_apply(&guard, pin, coordinate, page).await?;
        Ok((pin, outcome))
    }

    /// Replace the pin's photos with the next page of results.
    ///
    /// The page cursor is advanced and persisted before fetching, so a
    /// failed fetch still moves the pin on to the next page.
    pub async fn new_collection(&self, pin: PinId) -> Result<SyncOutcome, SyncError> {
        let Some(guard) = self.try_begin() else {
            debug!(pin = %pin, "Fetch already in flight, skipping");
            return Ok(SyncOutcome::Skipped);
        };

        let advanced = self
            .store
            .run_batch(move |graph| {
                let page = graph.next_page(pin)?;
                let coordinate = graph
                    .pin(pin)
                    .map(|p| p.coordinate())
                    .ok_or(StoreError::PinNotFound(pin))?;
                Ok((coordinate, page))
            })
            .await;
        let (coordinate, page) = match advanced {
            Ok(found) => found,
            Err(e) => {
                self.set_state(pin, SyncState::Idle);
                return Err(e.into());
            }
        };

        self.fetch_and_apply(&guard, pin, coordinate, page).await
    }

    /// Fetch the pin's current page again, e.g. after a failure.
    pub async fn refresh(&self, pin: PinId) -> Result<SyncOutcome, SyncError> {
        let Some(guard) = self.try_begin() else {
            debug!(pin = %pin, "Fetch already in flight, skipping");
            return Ok(SyncOutcome::Skipped);
        };

        let Some(current) = self.store.pin(pin) else {
            self.set_state(pin, SyncState::Idle);
            return Err(StoreError::PinNotFound(pin).into());
        };
        self.fetch_and_apply(&guard, pin, current.coordinate(), current.page_number)
            .await
    }

    // =========================================================================
    // Fetch / Apply
    // =========================================================================

    async fn fetch_and_apply(
        &self,
        _guard: &InFlight<'_>,
        pin: PinId,
        coordinate: Coordinate,
        page: u32,
    ) -> Result<SyncOutcome, SyncError> {
        self.set_state(pin, SyncState::Fetching);

        let result = match self.source.search(coordinate, page).await {
            Ok(result) => result,
            Err(error) => {
                warn!(pin = %pin, page, error = %error, "Photo search failed");
                self.set_state(pin, SyncState::Failed);
                return Ok(SyncOutcome::Failed { pin, page, error });
            }
        };

        let last_page = result.is_last_page();
        let (pages, total) = (result.pages, result.total);
        let (batch, skipped) = self.download_all(result.photos).await;
        if batch.is_empty() {
            warn!(pin = %pin, page, skipped, "No photo could be downloaded");
            self.set_state(pin, SyncState::Failed);
            return Ok(SyncOutcome::Failed {
                pin,
                page,
                error: SourceError::NoPhotos,
            });
        }

        self.set_state(pin, SyncState::Applying);
        let applied = self
            .store
            .run_batch(move |graph| {
                let ids = graph.replace_photos(pin, batch)?;
                graph.mark_synced(pin)?;
                Ok(ids.len())
            })
            .await;

        match applied {
            Ok(photos) => {
                self.set_state(pin, SyncState::Idle);
                info!(pin = %pin, page, pages, total, photos, skipped, "Replaced pin photos");
                if last_page {
                    debug!(pin = %pin, page, "Reached the last page of results");
                }
                Ok(SyncOutcome::Applied {
                    pin,
                    page,
                    photos,
                    skipped,
                    last_page,
                })
            }
            Err(StoreError::PinNotFound(id)) => {
                // Pin was deleted while its photos were downloading.
                self.set_state(pin, SyncState::Idle);
                Err(StoreError::PinNotFound(id).into())
            }
            Err(e) => {
                self.set_state(pin, SyncState::Failed);
                Err(e.into())
            }
        }
    }

    /// Download every record's image, keeping result order. Records without
    /// a URL and failed downloads are skipped.
    async fn download_all(&self, records: Vec<PhotoRecord>) -> (Vec<NewPhoto>, usize) {
        let listed = records.len();
        let urls: Vec<String> = records.into_iter().filter_map(|r| r.url_m).collect();

        let downloaded: Vec<Option<NewPhoto>> = stream::iter(urls)
            .map(|url| async move {
                match self.source.download(&url).await {
                    Ok(bytes) => Some(NewPhoto::new(bytes, Some(url))),
                    Err(e) => {
                        warn!(url = %url, error = %e, "Failed to download photo, skipping");
                        None
                    }
                }
            })
            .buffered(MAX_CONCURRENT_DOWNLOADS)
            .collect()
            .await;

        let photos: Vec<NewPhoto> = downloaded.into_iter().flatten().collect();
        let skipped = listed - photos.len();
        (photos, skipped)
    }
}
