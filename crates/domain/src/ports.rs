//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the export core and the
//! collaborators it drives. Adapters implement them for real infrastructure;
//! stubs implement them for tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Context, Image, Post};
use crate::usecases::export::ExportState;

/// Generic message shown when an error carries no user-facing description
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown Error";

/// Error type for post and context fetches
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("This link doesn't point to a Mastodon post.")]
    NotAPost,
    #[error("This server requires you to log in before viewing posts.")]
    NotAuthenticated,
    #[error("The link '{0}' couldn't be understood.")]
    LinkUnparseable(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Unexpected server response: {0}")]
    Api(String),
}

impl FetchError {
    /// Message suitable for display, if the error declares one
    pub fn user_message(&self) -> Option<String> {
        match self {
            FetchError::NotAPost | FetchError::NotAuthenticated | FetchError::LinkUnparseable(_) => {
                Some(self.to_string())
            }
            FetchError::Network(_) | FetchError::Api(_) => None,
        }
    }
}

/// Port for fetching posts and their conversation context
#[async_trait]
pub trait PostFetcher: Send + Sync {
    /// Fetch the post at `url`. The returned author handle is normalized to
    /// `@user@host` using the host of `url`.
    async fn fetch_post(&self, url: &str, auth_token: Option<&str>) -> Result<Post, FetchError>;

    /// Fetch the ancestors and descendants of the post at `url`
    async fn fetch_context(
        &self,
        url: &str,
        auth_token: Option<&str>,
    ) -> Result<Context, FetchError>;
}

/// Error type for authentication
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No credentials available for {0}")]
    NoCredentials(String),
    #[error("Authentication cancelled")]
    Cancelled,
    #[error("Authentication failed: {0}")]
    Failed(String),
}

/// Port for bearer-token acquisition
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Token from a previous authentication, if any
    fn existing_token(&self) -> Option<String>;

    /// Obtain (and remember) a fresh token for `host`
    async fn obtain_token(&self, host: &str) -> Result<String, AuthError>;

    /// Forget any stored token
    fn logout(&self);

    fn logged_in(&self) -> bool {
        self.existing_token().is_some()
    }
}

/// Error type for remote image loads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageLoadError {
    #[error("Failed to fetch {url}: {message}")]
    Network { url: String, message: String },
    #[error("{url} is not an image")]
    NotAnImage { url: String },
}

/// Port for loading raw image bytes
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load_image(&self, url: &str) -> Result<Image, ImageLoadError>;
}

/// Port for decoding perceptual hashes into small placeholder images
pub trait PerceptualHashDecoder: Send + Sync {
    /// Decode `hash` at `width` x `height` pixels; `None` if the hash is invalid
    fn decode(&self, hash: &str, width: u32, height: u32) -> Option<Image>;
}

/// Error type for composite rendering
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Nothing to render")]
    NothingToRender,
    #[error("Render failed: {0}")]
    Backend(String),
}

/// Port for producing the shareable composite
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render a consistent snapshot of the export state
    async fn render(&self, snapshot: &ExportState) -> Result<Image, RenderError>;
}

/// Error type for settings storage
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Port for persisting opaque blobs by key
pub trait SettingsStore: Send + Sync {
    /// Stored bytes for `key`; `None` when absent or unreadable
    fn read_blob(&self, key: &str) -> Option<Vec<u8>>;

    fn write_blob(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
}
