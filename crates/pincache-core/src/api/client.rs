//! Photo source client for the Flickr REST API.
//!
//! `FlickrClient` runs one geographic search per call and downloads the
//! images it finds. Every step of response validation maps to its own
//! `SourceError` variant; nothing is retried here.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::models::Coordinate;

use super::{BoundingBox, HttpTransport, ReqwestTransport, SourceError};

// ============================================================================
// Constants
// ============================================================================

/// REST endpoint for all Flickr API methods
const API_BASE_URL: &str = "https://api.flickr.com/services/rest";

const SEARCH_METHOD: &str = "flickr.photos.search";

/// Extra field requesting the medium-size image URL
const MEDIUM_URL_EXTRA: &str = "url_m";

/// Photos requested per page. 21 fills a three-column grid evenly.
pub const PER_PAGE: u32 = 21;

const OK_STATUS: &str = "ok";

// ============================================================================
// Response Types
// ============================================================================

/// One entry of the search result's `photos.photo` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhotoRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Direct URL of the medium-size image; absent for some photos.
    #[serde(default)]
    pub url_m: Option<String>,
}

/// A page of search results with the envelope's pagination metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub page: u32,
    pub pages: u32,
    pub total: u64,
    pub photos: Vec<PhotoRecord>,
}

impl SearchPage {
    pub fn is_last_page(&self) -> bool {
        self.page >= self.pages
    }
}

/// Where pins get their photos from.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Search for photos around `coordinate`. Only a non-empty, well-formed
    /// result is `Ok`.
    async fn search(&self, coordinate: Coordinate, page: u32) -> Result<SearchPage, SourceError>;

    /// Fetch the raw bytes of one image.
    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

#[async_trait]
impl<S: PhotoSource + ?Sized> PhotoSource for std::sync::Arc<S> {
    async fn search(&self, coordinate: Coordinate, page: u32) -> Result<SearchPage, SourceError> {
        (**self).search(coordinate, page).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        (**self).download(url).await
    }
}

// ============================================================================
// Client
// ============================================================================

/// Flickr search client.
/// Clone is cheap when the transport is (the reqwest transport shares its pool).
#[derive(Clone)]
pub struct FlickrClient<T = ReqwestTransport> {
    transport: T,
    api_key: String,
    base_url: String,
}

impl FlickrClient<ReqwestTransport> {
    /// Create a client over a fresh reqwest transport
    pub fn new(api_key: impl Into<String>) -> Result<Self, SourceError> {
        Ok(Self::with_transport(ReqwestTransport::new()?, api_key))
    }
}

impl<T: HttpTransport> FlickrClient<T> {
    pub fn with_transport(transport: T, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Point the client at another endpoint (a proxy or a local mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the search URL. A missing coordinate produces the zero box.
    pub fn search_url(&self, coordinate: Option<Coordinate>, page: u32) -> Result<Url, SourceError> {
        let bbox = BoundingBox::around(coordinate).to_string();
        let page = page.to_string();
        let per_page = PER_PAGE.to_string();
        let params = [
            ("api_key", self.api_key.as_str()),
            ("method", SEARCH_METHOD),
            ("format", "json"),
            ("extras", MEDIUM_URL_EXTRA),
            ("safe_search", "1"),
            ("nojsoncallback", "1"),
            ("page", page.as_str()),
            ("per_page", per_page.as_str()),
            ("bbox", bbox.as_str()),
        ];

        Url::parse_with_params(&self.base_url, &params)
            .map_err(|e| SourceError::InvalidQuery(format!("bad endpoint {}: {}", self.base_url, e)))
    }

    /// Run the validation pipeline over a successful (2xx) response body.
    fn parse_search(body: &[u8]) -> Result<SearchPage, SourceError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(SourceError::EmptyBody);
        }

        let parsed: Value = serde_json::from_slice(body)?;

        if parsed.get("stat").and_then(Value::as_str) != Some(OK_STATUS) {
            let message = parsed
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message");
            let code = parsed.get("code").and_then(Value::as_i64).unwrap_or(-1);
            return Err(SourceError::Api(format!("code {}: {}", code, message)));
        }

        let photos = parsed
            .get("photos")
            .filter(|v| v.is_object())
            .ok_or(SourceError::MissingKey("photos"))?;
        let photo_array = photos
            .get("photo")
            .filter(|v| v.is_array())
            .ok_or(SourceError::MissingKey("photo"))?;

        let records: Vec<PhotoRecord> = serde_json::from_value(photo_array.clone())?;
        if records.is_empty() {
            return Err(SourceError::NoPhotos);
        }

        let page = lenient_u32(photos.get("page")).unwrap_or(1);
        Ok(SearchPage {
            page,
            pages: lenient_u32(photos.get("pages")).unwrap_or(page),
            total: lenient_u64(photos.get("total")).unwrap_or(records.len() as u64),
            photos: records,
        })
    }
}

/// Flickr sends some counters as numbers and others as strings.
fn lenient_u64(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Like `lenient_u64`, treating values that do not fit a `u32` as absent.
fn lenient_u32(value: Option<&Value>) -> Option<u32> {
    lenient_u64(value).and_then(|v| u32::try_from(v).ok())
}

#[async_trait]
impl<T: HttpTransport> PhotoSource for FlickrClient<T> {
    async fn search(&self, coordinate: Coordinate, page: u32) -> Result<SearchPage, SourceError> {
        if !coordinate.is_valid() {
            return Err(SourceError::InvalidQuery(format!(
                "coordinate out of range: {}",
                coordinate
            )));
        }
        if page == 0 {
            return Err(SourceError::InvalidQuery("page must be at least 1".to_string()));
        }

        let url = self.search_url(Some(coordinate), page)?;
        debug!(%coordinate, page, "Searching for photos");

        let response = self.transport.get(&url).await?;
        if !response.is_success() {
            return Err(SourceError::from_status(response.status, &response.body));
        }

        let result = Self::parse_search(&response.body)?;
        debug!(
            page = result.page,
            pages = result.pages,
            count = result.photos.len(),
            "Search returned photos"
        );
        Ok(result)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let url = Url::parse(url)
            .map_err(|e| SourceError::InvalidQuery(format!("bad image URL {}: {}", url, e)))?;

        let response = self.transport.get(&url).await?;
        if !response.is_success() {
            return Err(SourceError::from_status(response.status, &response.body));
        }
        if response.body.is_empty() {
            return Err(SourceError::EmptyBody);
        }
        Ok(response.body)
    }
}
