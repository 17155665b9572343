//! Network-free doubles shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::Notify;

use crate::api::{HttpResponse, HttpTransport, PhotoRecord, PhotoSource, SearchPage, SourceError};
use crate::models::Coordinate;

/// Flickr-shaped search body with `count` photos.
pub fn search_json(count: usize, page: u32, pages: u32) -> String {
    let photos: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "id": format!("{}{:03}", page, i),
                "title": format!("photo {}", i),
                "url_m": format!("https://live.staticflickr.com/{}/{}.jpg", page, i),
            })
        })
        .collect();
    serde_json::json!({
        "stat": "ok",
        "photos": { "page": page, "pages": pages, "perpage": 21, "total": pages * 21, "photo": photos }
    })
    .to_string()
}

/// Transport that answers search requests from a queue and image requests
/// from a URL table. Unknown image URLs answer 200 with the URL as the body.
#[derive(Default)]
pub struct ScriptedTransport {
    searches: Mutex<VecDeque<Result<HttpResponse, SourceError>>>,
    images: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<Url>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_search(&self, status: u16, body: &str) {
        self.searches.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn push_search_error(&self, error: SourceError) {
        self.searches.lock().unwrap().push_back(Err(error));
    }

    pub fn set_image(&self, url: &str, status: u16, body: &[u8]) {
        self.images.lock().unwrap().insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.to_vec(),
            },
        );
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse, SourceError> {
        self.requests.lock().unwrap().push(url.clone());
        if url.path() == "/services/rest" {
            return self
                .searches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::Transport("no scripted response".into())));
        }
        let images = self.images.lock().unwrap();
        Ok(images.get(url.as_str()).cloned().unwrap_or_else(|| HttpResponse {
            status: 200,
            body: url.as_str().as_bytes().to_vec(),
        }))
    }
}

/// A search page of `count` records whose image URLs encode the page.
pub fn search_page(count: usize, page: u32) -> SearchPage {
    SearchPage {
        page,
        pages: 10,
        total: 210,
        photos: (0..count)
            .map(|i| PhotoRecord {
                id: Some(format!("{}-{}", page, i)),
                title: None,
                url_m: Some(format!("https://img.example/{}/{}.jpg", page, i)),
            })
            .collect(),
    }
}

/// Lets a test hold a search open until it says so.
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

/// In-memory `PhotoSource` with scripted search results.
#[derive(Default)]
pub struct FakeSource {
    results: Mutex<VecDeque<Result<SearchPage, SourceError>>>,
    searches: Mutex<Vec<(Coordinate, u32)>>,
    failing_downloads: Mutex<HashSet<String>>,
    downloads: AtomicUsize,
    gate: Option<std::sync::Arc<Gate>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: std::sync::Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push(&self, result: Result<SearchPage, SourceError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn fail_download(&self, url: &str) {
        self.failing_downloads.lock().unwrap().insert(url.to_string());
    }

    pub fn searches(&self) -> Vec<(Coordinate, u32)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhotoSource for FakeSource {
    async fn search(&self, coordinate: Coordinate, page: u32) -> Result<SearchPage, SourceError> {
        self.searches.lock().unwrap().push((coordinate, page));
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        let next = self.results.lock().unwrap().pop_front();
        next.unwrap_or(Err(SourceError::NoPhotos))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.failing_downloads.lock().unwrap().contains(url) {
            return Err(SourceError::from_status(404, b"gone"));
        }
        Ok(url.as_bytes().to_vec())
    }
}
