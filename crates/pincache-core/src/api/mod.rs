//! Remote photo source module for the Flickr REST API.
//!
//! This module provides the `FlickrClient` for running a geographic photo
//! search around a pin and downloading the returned images.
//!
//! HTTP itself sits behind the `HttpTransport` capability trait so the
//! response validation pipeline can be exercised without a network.

pub mod bbox;
pub mod client;
pub mod error;
pub mod transport;

pub use bbox::BoundingBox;
pub use client::{FlickrClient, PhotoRecord, PhotoSource, SearchPage, PER_PAGE};
pub use error::{ErrorKind, SourceError};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
