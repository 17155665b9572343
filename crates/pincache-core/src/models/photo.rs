//! Photo entity: one cached image bound to a pin.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PinId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub u64);

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cached image. The owning pin is always set; the store refuses to
/// insert a photo whose pin does not exist.
///
/// Image bytes are shared behind an `Arc` so read snapshots can be cloned
/// without copying blobs.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: PhotoId,
    pub pin_id: PinId,
    pub image_data: Arc<[u8]>,
    pub source_url: Option<String>,
    pub cached_at: DateTime<Utc>,
}

impl Photo {
    pub fn size(&self) -> usize {
        self.image_data.len()
    }
}

/// A downloaded image waiting to be attached to a pin.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub image_data: Vec<u8>,
    pub source_url: Option<String>,
}

impl NewPhoto {
    pub fn new(image_data: Vec<u8>, source_url: Option<String>) -> Self {
        Self {
            image_data,
            source_url,
        }
    }
}
