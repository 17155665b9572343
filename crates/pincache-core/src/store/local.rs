use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::models::{Coordinate, Photo, PhotoId, Pin, PinId};

use super::{DiskStore, EntityGraph, StoreError};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for queued write batches.
/// A sync produces one batch, so 32 leaves plenty of headroom for UI edits.
const CHANNEL_BUFFER_SIZE: usize = 32;

const WRITER_THREAD_NAME: &str = "pincache-writer";

type Job = Box<dyn FnOnce(&mut Writer) + Send>;

// ============================================================================
// Writer
// ============================================================================

/// State owned by the writer thread.
struct Writer {
    /// Graph as last committed to disk.
    committed: Arc<EntityGraph>,
    disk: DiskStore,
    publish: watch::Sender<Arc<EntityGraph>>,
    /// Set after a disk failure; no more writes are accepted.
    poisoned: Option<String>,
    /// Set by `LocalStore::close`; the directory lock has been released.
    closed: bool,
}

impl Writer {
    fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut EntityGraph) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if let Some(reason) = &self.poisoned {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        // An error from `op` drops the staged copy; nothing is published.
        let mut staged = EntityGraph::clone(&self.committed);
        let value = op(&mut staged)?;
        if staged.revision() == self.committed.revision() {
            return Ok(value);
        }
        let staged = Arc::new(staged);

        self.publish.send_replace(Arc::clone(&staged));
        debug!(
            revision = staged.revision(),
            readers = self.publish.receiver_count(),
            "Published store snapshot"
        );

        if let Err(e) = self.disk.commit(&self.committed, &staged) {
            error!(error = %e, path = %self.disk.root().display(), "Failed to commit store to disk");
            let reason = e.to_string();
            self.poisoned = Some(reason.clone());
            self.publish.send_replace(Arc::clone(&self.committed));
            return Err(StoreError::Fatal(reason));
        }

        self.committed = staged;
        Ok(value)
    }

    fn reset(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if let Err(e) = self.disk.destroy() {
            error!(error = %e, "Failed to drop store");
            let reason = e.to_string();
            self.poisoned = Some(reason.clone());
            return Err(StoreError::Fatal(reason));
        }
        self.poisoned = None;
        self.committed = Arc::new(EntityGraph::new());
        self.publish.send_replace(Arc::clone(&self.committed));
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.disk.unlock();
    }
}

// ============================================================================
// Store Handles
// ============================================================================

/// Handle to the local store. Clone is cheap; all clones share one writer.
#[derive(Clone)]
pub struct LocalStore {
    jobs: mpsc::Sender<Job>,
    view: StoreView,
    root: PathBuf,
}

impl LocalStore {
    /// Open (or create) the store at `root` and start its writer thread.
    ///
    /// The directory stays locked until the store is closed or every handle
    /// is dropped; a second open fails with `StoreError::Locked`. All photo
    /// bytes are loaded into memory up front.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let disk = DiskStore::open(&root)?;
        let graph = Arc::new(disk.load()?);

        let counts = graph.counts();
        info!(
            pins = counts.pins,
            photos = counts.photos,
            bytes = counts.bytes,
            path = %root.display(),
            "Opened local store"
        );

        let (publish, rx) = watch::channel(Arc::clone(&graph));
        let (jobs, mut queue) = mpsc::channel::<Job>(CHANNEL_BUFFER_SIZE);
        let mut writer = Writer {
            committed: graph,
            disk,
            publish,
            poisoned: None,
            closed: false,
        };

        std::thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || {
                while let Some(job) = queue.blocking_recv() {
                    job(&mut writer);
                }
                debug!("Store writer stopped");
            })
            .map_err(|e| StoreError::io(&root, e))?;

        Ok(Self {
            jobs,
            view: StoreView { rx },
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop accepting batches and release the directory lock, so the store
    /// can be opened again. Applies to every clone of this handle.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.submit(|writer| {
            writer.close();
            Ok(())
        })
        .await
    }

    async fn submit<T: Send + 'static>(
        &self,
        job: impl FnOnce(&mut Writer) -> Result<T, StoreError> + Send + 'static,
    ) -> Result<T, StoreError> {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move |writer: &mut Writer| {
            if reply.send(job(writer)).is_err() {
                warn!("Batch caller went away before the result was delivered");
            }
        });
        self.jobs.send(job).await.map_err(|_| StoreError::Closed)?;
        result.await.map_err(|_| StoreError::Closed)?
    }

    /// Run `op` with exclusive write access to the graph.
    ///
    /// Batches are applied one at a time in submission order. If `op`
    /// returns an error none of its changes are kept. Otherwise the new graph
    /// is published to every `StoreView` and then committed to disk before
    /// this resolves.
    pub async fn run_batch<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut EntityGraph) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(move |writer| writer.apply(op)).await
    }

    /// Destroy everything on disk and start over with an empty store.
    /// Also clears a poisoned store.
    pub async fn drop_all(&self) -> Result<(), StoreError> {
        self.submit(|writer| writer.reset()).await
    }

    // ===== Reads =====

    pub fn view(&self) -> StoreView {
        self.view.clone()
    }

    pub fn snapshot(&self) -> Arc<EntityGraph> {
        self.view.snapshot()
    }

    pub fn pins(&self) -> Vec<Pin> {
        self.fetch_pins(|_| true)
    }

    pub fn pin(&self, id: PinId) -> Option<Pin> {
        self.snapshot().pin(id).cloned()
    }

    pub fn fetch_pins(&self, filter: impl Fn(&Pin) -> bool) -> Vec<Pin> {
        self.snapshot().fetch_pins(filter).into_iter().cloned().collect()
    }

    pub fn fetch_photos(&self, filter: impl Fn(&Photo) -> bool) -> Vec<Photo> {
        self.snapshot().fetch_photos(filter).into_iter().cloned().collect()
    }

    pub fn photos_for(&self, pin_id: PinId) -> Vec<Photo> {
        self.fetch_photos(|p| p.pin_id == pin_id)
    }

    // ===== Writes =====

    pub async fn insert_pin(&self, coordinate: Coordinate, page_number: u32) -> Result<PinId, StoreError> {
        self.run_batch(move |graph| Ok(graph.insert_pin(coordinate, page_number)))
            .await
    }

    /// Delete a pin and its photos. Returns how many photos went with it.
    pub async fn delete_pin(&self, id: PinId) -> Result<usize, StoreError> {
        let removed = self.run_batch(move |graph| graph.delete_pin(id)).await?;
        info!(pin = %id, photos = removed, "Deleted pin");
        Ok(removed)
    }

    /// Remove selected photos from a pin's collection.
    pub async fn delete_photos(&self, pin_id: PinId, ids: Vec<PhotoId>) -> Result<usize, StoreError> {
        self.run_batch(move |graph| graph.delete_photos(pin_id, &ids))
            .await
    }
}

/// Read-only view of the store, updated each time a batch commits.
#[derive(Clone)]
pub struct StoreView {
    rx: watch::Receiver<Arc<EntityGraph>>,
}

impl StoreView {
    pub fn snapshot(&self) -> Arc<EntityGraph> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> Result<Arc<EntityGraph>, StoreError> {
        self.rx.changed().await.map_err(|_| StoreError::Closed)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}
