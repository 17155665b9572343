//! Data models for pins and their cached photos.
//!
//! This module contains the entity types persisted by the local store:
//!
//! - `Pin`: a user-placed map location and the root of a photo collection
//! - `Photo`: one cached image owned by exactly one pin
//! - `Coordinate`: a latitude/longitude pair with range validation

pub mod location;
pub mod photo;
pub mod pin;

pub use location::{Coordinate, LAT_RANGE, LON_RANGE};
pub use photo::{NewPhoto, Photo, PhotoId};
pub use pin::{Pin, PinId, DEFAULT_PAGE_NUMBER};
