//! Image loaders

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use whiff_domain::{Image, ImageLoadError, ImageLoader};

/// Loads images over HTTP(S).
///
/// Bytes are kept encoded; width and height are left at zero since nothing
/// downstream decodes them.
pub struct HttpImageLoader {
    client: Client,
}

impl HttpImageLoader {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("whiff/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load_image(&self, url: &str) -> Result<Image, ImageLoadError> {
        let network = |message: String| ImageLoadError::Network {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(network(format!("HTTP {}", response.status())));
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
            .unwrap_or_default();

        if !media_type.starts_with("image/") {
            return Err(ImageLoadError::NotAnImage {
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| network(e.to_string()))?;
        tracing::debug!(url = %url, bytes = bytes.len(), media_type = %media_type, "Loaded image");

        Ok(Image::new(0, 0, media_type, bytes.to_vec()))
    }
}

/// Stub image loader for testing; every URL loads unless marked failing
#[derive(Default)]
pub struct StubImageLoader {
    delays: HashMap<String, Duration>,
    failing: Vec<String>,
    loads: Mutex<Vec<String>>,
}

impl StubImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay the load of `url`
    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    /// Make loads of `url` fail
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failing.push(url.into());
        self
    }

    /// URLs requested so far, in request order
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageLoader for StubImageLoader {
    async fn load_image(&self, url: &str) -> Result<Image, ImageLoadError> {
        self.loads.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.iter().any(|u| u == url) {
            return Err(ImageLoadError::Network {
                url: url.to_string(),
                message: "stubbed failure".to_string(),
            });
        }

        Ok(Image::new(1, 1, "image/png", url.as_bytes().to_vec()))
    }
}
