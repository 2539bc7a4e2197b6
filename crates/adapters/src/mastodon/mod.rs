//! Mastodon adapters

mod read;

pub use read::MastodonPostFetcher;

use async_trait::async_trait;
use std::sync::Mutex;
use whiff_domain::{Context, FetchError, Post, PostFetcher};

/// Stub post fetcher for testing
pub struct StubPostFetcher {
    post: Result<Post, FetchError>,
    context: Result<Context, FetchError>,
    requires_authentication: bool,
    post_calls: Mutex<usize>,
    context_calls: Mutex<usize>,
}

impl StubPostFetcher {
    /// Create a stub returning `post` with an empty thread
    pub fn with_post(post: Post) -> Self {
        Self::new(Ok(post), Ok(Context::default()))
    }

    pub fn new(post: Result<Post, FetchError>, context: Result<Context, FetchError>) -> Self {
        Self {
            post,
            context,
            requires_authentication: false,
            post_calls: Mutex::new(0),
            context_calls: Mutex::new(0),
        }
    }

    /// Fail with `NotAuthenticated` unless a token is supplied
    pub fn requiring_authentication(mut self) -> Self {
        self.requires_authentication = true;
        self
    }

    pub fn post_calls(&self) -> usize {
        *self.post_calls.lock().unwrap()
    }

    pub fn context_calls(&self) -> usize {
        *self.context_calls.lock().unwrap()
    }
}

#[async_trait]
impl PostFetcher for StubPostFetcher {
    async fn fetch_post(&self, _url: &str, auth_token: Option<&str>) -> Result<Post, FetchError> {
        *self.post_calls.lock().unwrap() += 1;
        if self.requires_authentication && auth_token.is_none() {
            return Err(FetchError::NotAuthenticated);
        }
        self.post.clone()
    }

    async fn fetch_context(
        &self,
        _url: &str,
        auth_token: Option<&str>,
    ) -> Result<Context, FetchError> {
        *self.context_calls.lock().unwrap() += 1;
        if self.requires_authentication && auth_token.is_none() {
            return Err(FetchError::NotAuthenticated);
        }
        self.context.clone()
    }
}
