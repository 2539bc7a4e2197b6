//! Export reducer
//!
//! Owns the post being exported, its conversation, the image cache, settings,
//! visibility selection and the rendered composite. [`ExportFeature::reduce`]
//! applies one action to the state and returns the effects to run; async
//! effects come back as completion actions through the same function.

use futures::future::BoxFuture;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use url::{ParseError, Url};

use crate::cache::ImageCache;
use crate::content::{AttributedContent, format_content};
use crate::model::{Color, Context, Image, ImageKey, Post};
use crate::ports::{
    AuthError, Authenticator, FetchError, ImageLoadError, ImageLoader, PerceptualHashDecoder,
    PostFetcher, RenderError, Renderer, SettingsStore, UNKNOWN_ERROR_MESSAGE,
};
use crate::settings::{LinkStyle, SettingsAction, SettingsFeature, SettingsState};
use crate::usecases::rerender::RenderTrigger;

/// Everything the export screen shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportState {
    /// Kept for retrying after authentication
    pub last_requested_url: Option<String>,
    pub post: Option<Post>,
    pub context: Option<Context>,
    /// Formatted content per post id
    pub attributed_content: HashMap<String, AttributedContent>,
    pub error_message: Option<String>,
    /// The last post fetch failed because the server wants a login
    pub login_suggested: bool,
    pub logged_in: bool,
    pub rendered: Option<Image>,
    pub settings: SettingsState,
    pub images: ImageCache,
    /// Posts included in the composite; always holds the root once loaded
    pub visible_post_ids: BTreeSet<String>,
    /// Remote URLs already asked for since the last request
    pub requested_image_urls: HashSet<String>,
}

impl ExportState {
    /// Ancestors, the root post, then descendants
    pub fn all_posts(&self) -> Vec<&Post> {
        let mut posts = Vec::new();
        if let Some(context) = &self.context {
            posts.extend(context.ancestors.iter());
        }
        if let Some(post) = &self.post {
            posts.push(post);
        }
        if let Some(context) = &self.context {
            posts.extend(context.descendants.iter());
        }
        posts
    }

    /// [`Self::all_posts`] restricted to the visible ones
    pub fn visible_posts(&self) -> impl Iterator<Item = &Post> {
        self.all_posts()
            .into_iter()
            .filter(move |p| self.visible_post_ids.contains(&p.id))
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.post.as_ref().is_some_and(|p| p.id == id)
    }

    /// Text to share alongside the rendered image
    pub fn share_caption(&self) -> Option<&str> {
        if self.settings.link_style != LinkStyle::AfterImage || self.rendered.is_none() {
            return None;
        }
        self.post.as_ref().map(|p| p.url.as_str())
    }
}

/// A successfully loaded remote image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLoadResponse {
    pub key: ImageKey,
    pub image: Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    /// Start a login; the host defaults to the last requested URL's host
    Begin { host: Option<String> },
    Completed(Result<(), AuthError>),
    Logout,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportAction {
    Requested { url: String },
    /// Replay the last request, if any
    Rerequest,
    PostFetchCompleted(Result<Post, FetchError>),
    ContextFetchCompleted(Result<Context, FetchError>),
    ImageFetchCompleted(Result<ImageLoadResponse, ImageLoadError>),
    ToggledPostVisibility(Post),
    Settings(SettingsAction),
    Auth(AuthAction),
    RenderCompleted(Result<Image, RenderError>),
}

impl ExportAction {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Requested { .. } => "requested",
            Self::Rerequest => "rerequest",
            Self::PostFetchCompleted(_) => "post_fetch_completed",
            Self::ContextFetchCompleted(_) => "context_fetch_completed",
            Self::ImageFetchCompleted(_) => "image_fetch_completed",
            Self::ToggledPostVisibility(_) => "toggled_post_visibility",
            Self::Settings(_) => "settings",
            Self::Auth(_) => "auth",
            Self::RenderCompleted(_) => "render_completed",
        }
    }
}

/// Work requested by the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Feed an action back in before any async completion
    Send(ExportAction),
    FetchPost {
        url: String,
        auth_token: Option<String>,
    },
    FetchContext {
        url: String,
        auth_token: Option<String>,
    },
    LoadImage {
        url: String,
    },
    ObtainToken {
        host: String,
    },
    /// Schedule a debounced render of the current state
    Render,
}

/// Collaborators, injected explicitly
#[derive(Clone)]
pub struct Dependencies {
    pub post_fetcher: Arc<dyn PostFetcher>,
    pub authenticator: Arc<dyn Authenticator>,
    pub image_loader: Arc<dyn ImageLoader>,
    pub hash_decoder: Arc<dyn PerceptualHashDecoder>,
    pub renderer: Arc<dyn Renderer>,
    pub settings_store: Arc<dyn SettingsStore>,
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Quiet period before a scheduled render runs
    pub render_debounce: Duration,
    /// Width of decoded placeholders, in pixels
    pub placeholder_width: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            render_debounce: Duration::from_millis(10),
            placeholder_width: 10,
        }
    }
}

/// The export reducer with its collaborators
#[derive(Clone)]
pub struct ExportFeature {
    deps: Dependencies,
    settings: SettingsFeature,
    config: ExportConfig,
}

impl ExportFeature {
    pub fn new(deps: Dependencies, config: ExportConfig) -> Self {
        let settings = SettingsFeature::new(Arc::clone(&deps.settings_store));
        Self {
            deps,
            settings,
            config,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn renderer(&self) -> Arc<dyn Renderer> {
        Arc::clone(&self.deps.renderer)
    }

    /// Apply `action`, then run the rerender policy against the result
    pub fn reduce(&self, state: &mut ExportState, action: ExportAction) -> Vec<Effect> {
        let trigger = RenderTrigger::classify(&action);
        let mut effects = self.reduce_primary(state, action);
        if trigger.should_render(state) {
            effects.push(Effect::Render);
        }
        effects
    }

    fn reduce_primary(&self, state: &mut ExportState, action: ExportAction) -> Vec<Effect> {
        match action {
            ExportAction::Requested { url } => self.request(state, url),
            ExportAction::Rerequest => match state.last_requested_url.clone() {
                Some(url) => self.request(state, url),
                None => vec![],
            },
            ExportAction::PostFetchCompleted(Ok(post)) => {
                tracing::info!(post_id = %post.id, url = %post.url, "Post loaded");
                state.error_message = None;
                state.login_suggested = false;
                state.visible_post_ids.insert(post.id.clone());
                let effects = self.process_post(state, &post);
                state.post = Some(post);
                effects
            }
            ExportAction::PostFetchCompleted(Err(error)) => {
                tracing::warn!(error = %error, "Post fetch failed");
                state.post = None;
                state.login_suggested = error == FetchError::NotAuthenticated;
                state.error_message = Some(
                    error
                        .user_message()
                        .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
                );
                vec![]
            }
            ExportAction::ContextFetchCompleted(Ok(context)) => {
                tracing::info!(
                    ancestors = context.ancestors.len(),
                    descendants = context.descendants.len(),
                    "Context loaded"
                );
                let mut effects = Vec::new();
                for post in context.all() {
                    if state.is_root(&post.id) {
                        continue;
                    }
                    effects.extend(self.process_post(state, post));
                }
                state.context = Some(context);
                effects
            }
            ExportAction::ContextFetchCompleted(Err(error)) => {
                tracing::warn!(error = %error, "Context fetch failed, showing post alone");
                vec![]
            }
            ExportAction::ImageFetchCompleted(Ok(response)) => {
                tracing::debug!(url = %response.key.url, bytes = response.image.len(), "Image loaded");
                state.images.insert(response.key, response.image);
                vec![]
            }
            ExportAction::ImageFetchCompleted(Err(error)) => {
                tracing::warn!(error = %error, "Image load failed");
                vec![]
            }
            ExportAction::ToggledPostVisibility(post) => {
                if !state.is_root(&post.id) && !state.visible_post_ids.remove(&post.id) {
                    state.visible_post_ids.insert(post.id);
                }
                vec![]
            }
            ExportAction::Settings(action) => self.reduce_settings(state, action),
            ExportAction::Auth(action) => self.reduce_auth(state, action),
            ExportAction::RenderCompleted(Ok(image)) => {
                tracing::debug!(bytes = image.len(), "Render completed");
                state.rendered = Some(image);
                vec![]
            }
            ExportAction::RenderCompleted(Err(error)) => {
                match error {
                    RenderError::NothingToRender => tracing::debug!("Nothing to render"),
                    RenderError::Backend(_) => tracing::warn!(error = %error, "Render failed"),
                }
                state.rendered = None;
                vec![]
            }
        }
    }

    fn request(&self, state: &mut ExportState, url: String) -> Vec<Effect> {
        tracing::info!(url = %url, "Export requested");
        state.post = None;
        state.context = None;
        state.images.clear();
        state.attributed_content.clear();
        state.error_message = None;
        state.login_suggested = false;
        state.rendered = None;
        state.visible_post_ids.clear();
        state.requested_image_urls.clear();
        state.last_requested_url = Some(url.clone());

        let auth_token = self.deps.authenticator.existing_token();
        state.logged_in = auth_token.is_some();

        vec![
            Effect::Send(ExportAction::Settings(SettingsAction::Load)),
            Effect::FetchPost {
                url: url.clone(),
                auth_token: auth_token.clone(),
            },
            Effect::FetchContext { url, auth_token },
        ]
    }

    /// Format content, derive placeholders and request images for one post
    fn process_post(&self, state: &mut ExportState, post: &Post) -> Vec<Effect> {
        format_into(&mut state.attributed_content, post, state.settings.link_color);

        let mut effects = Vec::new();
        for image_ref in post.image_refs() {
            if let Some(hash) = &image_ref.perceptual_hash {
                let (width, height) = placeholder_size(
                    self.config.placeholder_width,
                    image_ref.width,
                    image_ref.height,
                );
                match self.deps.hash_decoder.decode(hash, width, height) {
                    Some(image) => state.images.insert(ImageKey::blurhash(&image_ref.url), image),
                    None => tracing::debug!(url = %image_ref.url, "Undecodable perceptual hash"),
                }
            }

            if state.requested_image_urls.insert(image_ref.url.clone()) {
                effects.push(Effect::LoadImage { url: image_ref.url });
            }
        }
        effects
    }

    fn reduce_settings(&self, state: &mut ExportState, action: SettingsAction) -> Vec<Effect> {
        let reformat_root = matches!(
            action,
            SettingsAction::LinkColorChanged(_) | SettingsAction::Reset
        );

        let follow_up = self.settings.reduce(&mut state.settings, action);

        if reformat_root {
            if let Some(post) = &state.post {
                format_into(&mut state.attributed_content, post, state.settings.link_color);
            }
        }

        follow_up
            .map(|next| Effect::Send(ExportAction::Settings(next)))
            .into_iter()
            .collect()
    }

    fn reduce_auth(&self, state: &mut ExportState, action: AuthAction) -> Vec<Effect> {
        match action {
            AuthAction::Begin { host } => {
                let host = host
                    .as_deref()
                    .or(state.last_requested_url.as_deref())
                    .and_then(host_of);
                match host {
                    Some(host) => vec![Effect::ObtainToken { host }],
                    None => {
                        tracing::warn!("No host to authenticate against");
                        vec![]
                    }
                }
            }
            AuthAction::Completed(Ok(())) => {
                tracing::info!("Authenticated, retrying last request");
                state.logged_in = true;
                vec![Effect::Send(ExportAction::Rerequest)]
            }
            AuthAction::Completed(Err(error)) => {
                tracing::warn!(error = %error, "Authentication failed");
                state.logged_in = false;
                vec![]
            }
            AuthAction::Logout => {
                self.deps.authenticator.logout();
                state.logged_in = false;
                vec![]
            }
        }
    }

    /// Turn an async effect into a future resolving to its completion action.
    ///
    /// Returns `None` for effects the store handles itself.
    pub fn perform(&self, effect: Effect) -> Option<BoxFuture<'static, ExportAction>> {
        match effect {
            Effect::FetchPost { url, auth_token } => {
                let fetcher = Arc::clone(&self.deps.post_fetcher);
                Some(Box::pin(async move {
                    ExportAction::PostFetchCompleted(
                        fetcher.fetch_post(&url, auth_token.as_deref()).await,
                    )
                }))
            }
            Effect::FetchContext { url, auth_token } => {
                let fetcher = Arc::clone(&self.deps.post_fetcher);
                Some(Box::pin(async move {
                    ExportAction::ContextFetchCompleted(
                        fetcher.fetch_context(&url, auth_token.as_deref()).await,
                    )
                }))
            }
            Effect::LoadImage { url } => {
                let loader = Arc::clone(&self.deps.image_loader);
                Some(Box::pin(async move {
                    let result = loader.load_image(&url).await;
                    ExportAction::ImageFetchCompleted(result.map(|image| ImageLoadResponse {
                        key: ImageKey::remote(url),
                        image,
                    }))
                }))
            }
            Effect::ObtainToken { host } => {
                let authenticator = Arc::clone(&self.deps.authenticator);
                Some(Box::pin(async move {
                    let result = authenticator.obtain_token(&host).await.map(|_| ());
                    ExportAction::Auth(AuthAction::Completed(result))
                }))
            }
            Effect::Send(_) | Effect::Render => None,
        }
    }
}

fn format_into(contents: &mut HashMap<String, AttributedContent>, post: &Post, link_color: Color) {
    match format_content(&post.content, link_color) {
        Ok(content) => {
            contents.insert(post.id.clone(), content);
        }
        Err(error) => {
            tracing::debug!(post_id = %post.id, error = %error, "Falling back to raw content");
            contents.remove(&post.id);
        }
    }
}

/// Widest placeholder ever decoded
const MAX_PLACEHOLDER_WIDTH: u32 = 64;

/// Tallest placeholder, as a multiple of its width
const MAX_PLACEHOLDER_ASPECT: u32 = 32;

/// Placeholder dimensions at `width`, keeping the source aspect ratio.
///
/// `width` is clamped to `1..=MAX_PLACEHOLDER_WIDTH`. Missing dimensions, and
/// sources taller than [`MAX_PLACEHOLDER_ASPECT`] times their width, get a
/// square.
pub fn placeholder_size(width: u32, source_width: u32, source_height: u32) -> (u32, u32) {
    let width = width.clamp(1, MAX_PLACEHOLDER_WIDTH);
    if source_width == 0 || source_height == 0 {
        return (width, width);
    }
    let height = (f64::from(width) * f64::from(source_height) / f64::from(source_width)).round();
    if height > f64::from(width * MAX_PLACEHOLDER_ASPECT) {
        return (width, width);
    }
    (width, (height as u32).max(1))
}

/// Bare host from a URL or host string
fn host_of(raw: &str) -> Option<String> {
    let url = match Url::parse(raw.trim()) {
        Ok(url) if url.has_host() => url,
        Ok(_) | Err(ParseError::RelativeUrlWithoutBase) if !raw.contains("://") => {
            Url::parse(&format!("https://{}", raw.trim())).ok()?
        }
        _ => return None,
    };
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_ascii_lowercase)
}
