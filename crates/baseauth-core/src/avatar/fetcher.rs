/*
[INPUT]:  Resolved HTTP(S) avatar URLs
[OUTPUT]: Raw image bytes with content type
[POS]:    Avatar layer - transport abstraction
[UPDATE]: When fetch transport or size limits change
*/

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AuthError, AuthResult};

/// Undecoded fetch result
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// External image fetch capability. Receives fully resolved HTTP(S) URLs;
/// scheme dispatch happens in the loader.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AuthResult<FetchedImage>;
}

/// reqwest-backed fetcher with a hard response size cap.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> AuthResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AuthError::configuration("failed to build avatar fetch client")
                .with_details(e.to_string())
        })?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> AuthResult<FetchedImage> {
        let response = self.client.get(url).send().await.map_err(|e| {
            AuthError::avatar_loading("avatar fetch failed").with_details(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::avatar_loading(format!(
                "avatar fetch returned status {status}"
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(AuthError::avatar_loading(format!(
                    "avatar is {length} bytes, limit is {}",
                    self.max_bytes
                )));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let bytes = response.bytes().await.map_err(|e| {
            AuthError::avatar_loading("avatar download interrupted").with_details(e.to_string())
        })?;
        // Servers may omit or lie about Content-Length
        if bytes.len() > self.max_bytes {
            return Err(AuthError::avatar_loading(format!(
                "avatar is {} bytes, limit is {}",
                bytes.len(),
                self.max_bytes
            )));
        }

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// Map-backed fetcher for tests. Counts fetches so cache behavior can be
/// asserted; unknown URLs fail like a 404 would.
#[derive(Debug, Default)]
pub struct MockImageFetcher {
    images: Mutex<HashMap<String, FetchedImage>>,
    fetches: AtomicUsize,
}

impl MockImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, url: &str, bytes: Vec<u8>) -> Self {
        self.images.lock().unwrap().insert(
            url.to_string(),
            FetchedImage {
                bytes,
                content_type: Some("image/png".to_string()),
            },
        );
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for MockImageFetcher {
    async fn fetch(&self, url: &str) -> AuthResult<FetchedImage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.images
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AuthError::avatar_loading(format!("no image at {url}")))
    }
}
