//! In-memory pin/photo entity graph.
//!
//! `EntityGraph` is both the staging area a batch mutates and the read-only
//! snapshot the UI side sees. Photos always reference an existing pin;
//! deleting a pin deletes its photos.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::models::{Coordinate, NewPhoto, Photo, PhotoId, Pin, PinId};

use super::StoreError;

#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    pins: BTreeMap<PinId, Pin>,
    photos: BTreeMap<PhotoId, Photo>,
    next_pin_id: u64,
    next_photo_id: u64,
    /// Bumped by every mutation; lets the writer skip no-op batches.
    revision: u64,
}

/// Entity totals, logged at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphCounts {
    pub pins: usize,
    pub photos: usize,
    /// Image bytes held in memory by the graph.
    pub bytes: usize,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from persisted entities. Photos whose pin is missing
    /// are dropped.
    pub(crate) fn from_parts(pins: Vec<Pin>, photos: Vec<Photo>, next_pin_id: u64, next_photo_id: u64) -> Self {
        let pins: BTreeMap<PinId, Pin> = pins.into_iter().map(|p| (p.id, p)).collect();
        let photos: BTreeMap<PhotoId, Photo> = photos
            .into_iter()
            .filter(|p| pins.contains_key(&p.pin_id))
            .map(|p| (p.id, p))
            .collect();

        let next_pin_id = pins.keys().last().map_or(0, |id| id.0 + 1).max(next_pin_id);
        let next_photo_id = photos.keys().last().map_or(0, |id| id.0 + 1).max(next_photo_id);

        Self {
            pins,
            photos,
            next_pin_id,
            next_photo_id,
            revision: 0,
        }
    }

    pub(crate) fn next_ids(&self) -> (u64, u64) {
        (self.next_pin_id, self.next_photo_id)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ===== Reads =====

    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.get(&id)
    }

    pub fn photo(&self, id: PhotoId) -> Option<&Photo> {
        self.photos.get(&id)
    }

    /// All pins ordered by latitude, then longitude, then id, so map markers
    /// are restored in a stable order.
    pub fn pins(&self) -> Vec<&Pin> {
        self.fetch_pins(|_| true)
    }

    pub fn fetch_pins(&self, filter: impl Fn(&Pin) -> bool) -> Vec<&Pin> {
        let mut pins: Vec<&Pin> = self.pins.values().filter(|p| filter(*p)).collect();
        pins.sort_by(|a, b| {
            a.latitude
                .total_cmp(&b.latitude)
                .then(a.longitude.total_cmp(&b.longitude))
                .then(a.id.cmp(&b.id))
        });
        pins
    }

    /// Photos matching `filter`, in insertion order.
    pub fn fetch_photos(&self, filter: impl Fn(&Photo) -> bool) -> Vec<&Photo> {
        self.photos.values().filter(|p| filter(*p)).collect()
    }

    pub fn photos_for(&self, pin_id: PinId) -> Vec<&Photo> {
        self.fetch_photos(|p| p.pin_id == pin_id)
    }

    pub fn find_pin(&self, coordinate: Coordinate) -> Option<&Pin> {
        self.pins.values().find(|p| p.is_at(coordinate))
    }

    pub fn counts(&self) -> GraphCounts {
        GraphCounts {
            pins: self.pins.len(),
            photos: self.photos.len(),
            bytes: self.photos.values().map(Photo::size).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    // ===== Writes =====

    pub fn insert_pin(&mut self, coordinate: Coordinate, page_number: u32) -> PinId {
        let id = PinId(self.next_pin_id);
        self.next_pin_id += 1;
        self.pins.insert(
            id,
            Pin {
                id,
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
                page_number,
                synced_at: None,
            },
        );
        self.revision += 1;
        id
    }

    /// Delete a pin and every photo it owns. Returns the number of photos removed.
    pub fn delete_pin(&mut self, id: PinId) -> Result<usize, StoreError> {
        self.pins.remove(&id).ok_or(StoreError::PinNotFound(id))?;
        let removed = self.remove_photos_where(|p| p.pin_id == id);
        self.revision += 1;
        Ok(removed)
    }

    /// Advance the pin's page cursor and return the new page.
    pub fn next_page(&mut self, id: PinId) -> Result<u32, StoreError> {
        let pin = self.pins.get_mut(&id).ok_or(StoreError::PinNotFound(id))?;
        pin.page_number = pin.page_number.saturating_add(1);
        let page = pin.page_number;
        self.revision += 1;
        Ok(page)
    }

    pub fn insert_photo(&mut self, pin_id: PinId, photo: NewPhoto) -> Result<PhotoId, StoreError> {
        if !self.pins.contains_key(&pin_id) {
            return Err(StoreError::PinNotFound(pin_id));
        }
        let id = PhotoId(self.next_photo_id);
        self.next_photo_id += 1;
        self.photos.insert(
            id,
            Photo {
                id,
                pin_id,
                image_data: Arc::from(photo.image_data),
                source_url: photo.source_url,
                cached_at: Utc::now(),
            },
        );
        self.revision += 1;
        Ok(id)
    }

    /// Delete the given photos of one pin. Ids that are missing or belong to
    /// another pin fail the whole call.
    pub fn delete_photos(&mut self, pin_id: PinId, ids: &[PhotoId]) -> Result<usize, StoreError> {
        if !self.pins.contains_key(&pin_id) {
            return Err(StoreError::PinNotFound(pin_id));
        }
        if let Some(bad) = ids
            .iter()
            .find(|id| self.photos.get(*id).map(|p| p.pin_id) != Some(pin_id))
        {
            return Err(StoreError::PhotoNotFound(*bad));
        }
        let mut removed = 0;
        for id in ids {
            if self.photos.remove(id).is_some() {
                removed += 1;
            }
        }
        self.revision += 1;
        Ok(removed)
    }

    pub fn delete_photos_for(&mut self, pin_id: PinId) -> Result<usize, StoreError> {
        if !self.pins.contains_key(&pin_id) {
            return Err(StoreError::PinNotFound(pin_id));
        }
        let removed = self.remove_photos_where(|p| p.pin_id == pin_id);
        self.revision += 1;
        Ok(removed)
    }

    /// Full-replace sync: drop the pin's current photos and attach `batch`.
    /// Inside a store batch this is one atomic step.
    pub fn replace_photos(&mut self, pin_id: PinId, batch: Vec<NewPhoto>) -> Result<Vec<PhotoId>, StoreError> {
        self.delete_photos_for(pin_id)?;
        batch
            .into_iter()
            .map(|photo| self.insert_photo(pin_id, photo))
            .collect()
    }

    pub fn mark_synced(&mut self, pin_id: PinId) -> Result<(), StoreError> {
        let pin = self.pins.get_mut(&pin_id).ok_or(StoreError::PinNotFound(pin_id))?;
        pin.synced_at = Some(Utc::now());
        self.revision += 1;
        Ok(())
    }

    fn remove_photos_where(&mut self, predicate: impl Fn(&Photo) -> bool) -> usize {
        let before = self.photos.len();
        self.photos.retain(|_, p| !predicate(&*p));
        before - self.photos.len()
    }
}
