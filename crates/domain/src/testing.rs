//! Fake collaborators shared by the domain unit tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::OffsetDateTime;
use tokio::time::Duration;

use crate::model::{Author, Context, Image, MediaAttachment, MediaType, Post};
use crate::ports::{
    AuthError, Authenticator, FetchError, ImageLoadError, ImageLoader, PerceptualHashDecoder,
    PostFetcher, RenderError, Renderer, SettingsStore, StorageError,
};
use crate::usecases::export::{Dependencies, ExportConfig, ExportFeature, ExportState};

pub const ROOT_URL: &str = "https://example.com/@user/1";
pub const HASH: &str = "LEHV6nWB2yk8pyo0adR*.7kCMdnj";

#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.blobs.lock().unwrap().insert(key.to_string(), bytes);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(key).cloned()
    }
}

impl SettingsStore for MemoryStore {
    fn read_blob(&self, key: &str) -> Option<Vec<u8>> {
        self.get(key)
    }

    fn write_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.put(key, bytes);
        Ok(())
    }
}

pub struct FakeFetcher {
    pub post: Result<Post, FetchError>,
    pub context: Result<Context, FetchError>,
    pub context_delay: Option<Duration>,
    pub tokens_seen: Mutex<Vec<Option<String>>>,
}

impl FakeFetcher {
    pub fn new(post: Result<Post, FetchError>, context: Result<Context, FetchError>) -> Self {
        Self {
            post,
            context,
            context_delay: None,
            tokens_seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PostFetcher for FakeFetcher {
    async fn fetch_post(&self, _url: &str, auth_token: Option<&str>) -> Result<Post, FetchError> {
        self.tokens_seen
            .lock()
            .unwrap()
            .push(auth_token.map(String::from));
        self.post.clone()
    }

    async fn fetch_context(
        &self,
        _url: &str,
        _auth_token: Option<&str>,
    ) -> Result<Context, FetchError> {
        if let Some(delay) = self.context_delay {
            tokio::time::sleep(delay).await;
        }
        self.context.clone()
    }
}

#[derive(Default)]
pub struct FakeImageLoader {
    pub delays: HashMap<String, Duration>,
    pub failing: HashSet<String>,
    pub loads: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageLoader for FakeImageLoader {
    async fn load_image(&self, url: &str) -> Result<Image, ImageLoadError> {
        self.loads.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(url) {
            return Err(ImageLoadError::Network {
                url: url.to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(Image::new(1, 1, "image/png", url.as_bytes().to_vec()))
    }
}

pub struct FakeDecoder;

impl PerceptualHashDecoder for FakeDecoder {
    fn decode(&self, hash: &str, width: u32, height: u32) -> Option<Image> {
        if hash.len() < 6 {
            return None;
        }
        Some(Image::new(
            width,
            height,
            "image/x-rgba",
            vec![0; (width * height * 4) as usize],
        ))
    }
}

#[derive(Default)]
pub struct FakeRenderer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, snapshot: &ExportState) -> Result<Image, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let post = snapshot.post.as_ref().ok_or(RenderError::NothingToRender)?;
        Ok(Image::new(1, 1, "text/plain", post.content.as_bytes().to_vec()))
    }
}

#[derive(Default)]
pub struct FakeAuthenticator {
    pub token: Mutex<Option<String>>,
    pub grant: Option<String>,
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    fn existing_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    async fn obtain_token(&self, host: &str) -> Result<String, AuthError> {
        let token = self
            .grant
            .clone()
            .ok_or_else(|| AuthError::NoCredentials(host.to_string()))?;
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(token)
    }

    fn logout(&self) {
        *self.token.lock().unwrap() = None;
    }
}

/// Collaborators with handles kept for assertions
pub struct Fakes {
    pub fetcher: Arc<FakeFetcher>,
    pub images: Arc<FakeImageLoader>,
    pub renderer: Arc<FakeRenderer>,
    pub store: Arc<MemoryStore>,
    pub auth: Arc<FakeAuthenticator>,
}

impl Fakes {
    pub fn new(post: Result<Post, FetchError>, context: Result<Context, FetchError>) -> Self {
        Self {
            fetcher: Arc::new(FakeFetcher::new(post, context)),
            images: Arc::new(FakeImageLoader::default()),
            renderer: Arc::new(FakeRenderer::default()),
            store: Arc::new(MemoryStore::default()),
            auth: Arc::new(FakeAuthenticator::default()),
        }
    }

    pub fn with_images(mut self, images: FakeImageLoader) -> Self {
        self.images = Arc::new(images);
        self
    }

    pub fn with_context_delay(mut self, delay: Duration) -> Self {
        let mut fetcher = FakeFetcher::new(self.fetcher.post.clone(), self.fetcher.context.clone());
        fetcher.context_delay = Some(delay);
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn with_auth(mut self, auth: FakeAuthenticator) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    pub fn dependencies(&self) -> Dependencies {
        Dependencies {
            post_fetcher: self.fetcher.clone(),
            authenticator: self.auth.clone(),
            image_loader: self.images.clone(),
            hash_decoder: Arc::new(FakeDecoder),
            renderer: self.renderer.clone(),
            settings_store: self.store.clone(),
        }
    }

    pub fn feature(&self) -> ExportFeature {
        ExportFeature::new(self.dependencies(), ExportConfig::default())
    }

    pub fn renders(&self) -> usize {
        self.renderer.calls.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> Vec<String> {
        self.images.loads.lock().unwrap().clone()
    }
}

pub fn attachment(index: usize, hash: Option<&str>) -> MediaAttachment {
    MediaAttachment::new(
        Some(index.to_string()),
        MediaType::Image,
        format!("https://example.com/{}", index),
        None,
        (100, 50),
        hash.map(String::from),
    )
}

/// A post with `id` whose avatar is unique to it
pub fn post(id: &str) -> Post {
    Post {
        id: id.to_string(),
        url: format!("https://example.com/@user/{}", id),
        created_at: OffsetDateTime::UNIX_EPOCH,
        content: format!("<p>Post {} with <a href=\"https://example.com\">link</a></p>", id),
        author: Author {
            username: "@user@example.com".to_string(),
            display_name: "User".to_string(),
            avatar_url: format!("https://example.com/avatar/{}", id),
        },
        media_attachments: vec![],
        card: None,
        in_reply_to_id: None,
    }
}

pub fn context(ancestors: &[&str], descendants: &[&str]) -> Context {
    Context {
        ancestors: ancestors.iter().map(|id| post(id)).collect(),
        descendants: descendants.iter().map(|id| post(id)).collect(),
    }
}
