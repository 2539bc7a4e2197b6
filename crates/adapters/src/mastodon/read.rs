//! Mastodon REST adapter for fetching a status and its thread

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use time::OffsetDateTime;
use whiff_domain::{
    Author, Card, Context, FetchError, MediaAttachment, MediaType, Post, PostFetcher,
};

/// Post fetcher talking to the server named in each post URL
pub struct MastodonPostFetcher {
    client: Client,
}

impl MastodonPostFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("whiff/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &StatusEndpoint,
        suffix: &str,
        auth_token: Option<&str>,
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", endpoint.api_url, suffix);
        let mut request = self.client.get(&url);
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::NotAuthenticated);
            }
            // Servers in authorized-fetch mode hide posts behind a plain 404
            StatusCode::NOT_FOUND if auth_token.is_none() => {
                return Err(FetchError::NotAuthenticated);
            }
            StatusCode::NOT_FOUND => return Err(FetchError::NotAPost),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::Api(format!("{}: {}", status, body)));
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Api(e.to_string()))
    }
}

/// Where a post URL's status lives in the REST API
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusEndpoint {
    /// e.g. `https://example.com/api/v1/statuses/123`
    api_url: String,
    host: String,
}

impl StatusEndpoint {
    fn parse(raw: &str) -> Result<Self, FetchError> {
        let url = Url::parse(raw).map_err(|_| FetchError::LinkUnparseable(raw.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FetchError::LinkUnparseable(raw.to_string()))?
            .to_string();

        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::LinkUnparseable(raw.to_string()));
        }

        let id = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .filter(|s| !s.starts_with('@') && s.chars().all(|c| c.is_ascii_alphanumeric()))
            .ok_or(FetchError::NotAPost)?;

        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.clone(),
        };

        Ok(Self {
            api_url: format!("{}://{}/api/v1/statuses/{}", url.scheme(), authority, id),
            host,
        })
    }
}

#[derive(Deserialize)]
struct StatusJson {
    id: String,
    url: Option<String>,
    uri: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    content: String,
    account: AccountJson,
    #[serde(default)]
    media_attachments: Vec<AttachmentJson>,
    card: Option<CardJson>,
    in_reply_to_id: Option<String>,
}

#[derive(Deserialize)]
struct AccountJson {
    acct: String,
    #[serde(default)]
    display_name: String,
    avatar: String,
}

#[derive(Deserialize)]
struct AttachmentJson {
    id: Option<String>,
    #[serde(rename = "type", default)]
    media_type: MediaType,
    url: Option<String>,
    preview_url: Option<String>,
    blurhash: Option<String>,
    meta: Option<AttachmentMeta>,
}

#[derive(Deserialize)]
struct AttachmentMeta {
    original: Option<Dimensions>,
    small: Option<Dimensions>,
}

#[derive(Deserialize)]
struct Dimensions {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct CardJson {
    #[serde(default)]
    title: String,
    description: Option<String>,
    url: String,
    image: Option<String>,
    blurhash: Option<String>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

#[derive(Deserialize)]
struct ContextJson {
    #[serde(default)]
    ancestors: Vec<StatusJson>,
    #[serde(default)]
    descendants: Vec<StatusJson>,
}

impl StatusJson {
    fn into_post(self, host: &str) -> Post {
        let media_attachments = self
            .media_attachments
            .into_iter()
            .filter_map(AttachmentJson::into_attachment)
            .collect();

        Post {
            id: self.id,
            url: self.url.unwrap_or(self.uri),
            created_at: self.created_at,
            content: self.content,
            author: Author {
                username: Author::normalized_handle(&self.account.acct, host),
                display_name: self.account.display_name,
                avatar_url: self.account.avatar,
            },
            media_attachments,
            card: self.card.map(|card| Card {
                title: card.title,
                description: card.description.filter(|d| !d.is_empty()),
                link_url: card.url,
                preview_image_url: card.image,
                perceptual_hash: card.blurhash,
                width: card.width,
                height: card.height,
            }),
            in_reply_to_id: self.in_reply_to_id,
        }
    }
}

impl AttachmentJson {
    /// `None` when the server has neither a source nor a preview URL
    fn into_attachment(self) -> Option<MediaAttachment> {
        let dimensions = self
            .meta
            .as_ref()
            .and_then(|meta| meta.original.as_ref().or(meta.small.as_ref()))
            .map(|d| (d.width.unwrap_or(0), d.height.unwrap_or(0)))
            .unwrap_or((0, 0));

        let source_url = self.url.or_else(|| self.preview_url.clone())?;
        Some(MediaAttachment::new(
            self.id,
            self.media_type,
            source_url,
            self.preview_url,
            dimensions,
            self.blurhash,
        ))
    }
}

#[async_trait]
impl PostFetcher for MastodonPostFetcher {
    async fn fetch_post(&self, url: &str, auth_token: Option<&str>) -> Result<Post, FetchError> {
        let endpoint = StatusEndpoint::parse(url)?;
        tracing::info!(url = %url, authenticated = auth_token.is_some(), "Fetching post");

        let status: StatusJson = self.get(&endpoint, "", auth_token).await?;
        Ok(status.into_post(&endpoint.host))
    }

    async fn fetch_context(
        &self,
        url: &str,
        auth_token: Option<&str>,
    ) -> Result<Context, FetchError> {
        let endpoint = StatusEndpoint::parse(url)?;
        tracing::info!(url = %url, "Fetching context");

        let context: ContextJson = self.get(&endpoint, "/context", auth_token).await?;
        Ok(Context {
            ancestors: context
                .ancestors
                .into_iter()
                .map(|s| s.into_post(&endpoint.host))
                .collect(),
            descendants: context
                .descendants
                .into_iter()
                .map(|s| s.into_post(&endpoint.host))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn status(id: &str, acct: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "url": format!("https://example.com/@user/{}", id),
            "uri": format!("https://example.com/users/user/statuses/{}", id),
            "created_at": "2024-01-15T12:00:00.000Z",
            "content": "<p>Hello <a href=\"https://example.org\">world</a></p>",
            "account": {
                "acct": acct,
                "display_name": "User :verified:",
                "avatar": "https://example.com/avatar.png"
            },
            "media_attachments": [
                {
                    "id": "m1",
                    "type": "image",
                    "url": "https://example.com/m1.png",
                    "preview_url": "https://example.com/m1_small.png",
                    "blurhash": "LEHV6nWB2yk8pyo0adR*.7kCMdnj",
                    "meta": { "original": { "width": 640, "height": 480 } }
                },
                {
                    "id": "m2",
                    "type": "gifv",
                    "url": "https://example.com/m2.mp4",
                    "preview_url": "https://example.com/m2.png"
                }
            ],
            "card": null,
            "in_reply_to_id": null
        })
    }

    fn fetcher() -> MastodonPostFetcher {
        MastodonPostFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_parsing() {
        let endpoint = StatusEndpoint::parse("https://mastodon.social/@user/110000").unwrap();
        assert_eq!(
            endpoint.api_url,
            "https://mastodon.social/api/v1/statuses/110000"
        );
        assert_eq!(endpoint.host, "mastodon.social");

        let with_port = StatusEndpoint::parse("http://127.0.0.1:8080/@user/5/").unwrap();
        assert_eq!(with_port.api_url, "http://127.0.0.1:8080/api/v1/statuses/5");

        assert!(matches!(
            StatusEndpoint::parse("not a url"),
            Err(FetchError::LinkUnparseable(_))
        ));
        assert!(matches!(
            StatusEndpoint::parse("ftp://example.com/@user/1"),
            Err(FetchError::LinkUnparseable(_))
        ));
        assert_eq!(
            StatusEndpoint::parse("https://example.com/@user"),
            Err(FetchError::NotAPost)
        );
    }

    #[tokio::test]
    async fn test_fetch_post_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(status("1", "user")))
            .mount(&mock_server)
            .await;

        let post = fetcher()
            .fetch_post(&format!("{}/@user/1", mock_server.uri()), None)
            .await
            .unwrap();

        assert_eq!(post.id, "1");
        assert_eq!(post.author.username, "@user@127.0.0.1");
        assert_eq!(post.author.display_name, "User :verified:");
        assert_eq!(post.media_attachments.len(), 2);
        assert_eq!((post.media_attachments[0].width, post.media_attachments[0].height), (640, 480));
        assert_eq!(post.media_attachments[1].media_type, MediaType::LoopingVideo);
        assert_eq!(post.media_attachments[1].display_url(), "https://example.com/m2.png");
        assert_eq!(post.created_at.year(), 2024);
    }

    #[tokio::test]
    async fn test_remote_handle_is_kept() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(status("1", "friend@other.social")),
            )
            .mount(&mock_server)
            .await;

        let post = fetcher()
            .fetch_post(&format!("{}/@user/1", mock_server.uri()), None)
            .await
            .unwrap();

        assert_eq!(post.author.username, "@friend@other.social");
    }

    #[tokio::test]
    async fn test_fetch_post_sends_bearer_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/1"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(status("1", "user")))
            .mount(&mock_server)
            .await;

        let result = fetcher()
            .fetch_post(&format!("{}/@user/1", mock_server.uri()), Some("test-token"))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_not_found_without_token_is_not_authenticated() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = format!("{}/@user/1", mock_server.uri());

        assert_eq!(
            fetcher().fetch_post(&url, None).await,
            Err(FetchError::NotAuthenticated)
        );
        assert_eq!(
            fetcher().fetch_post(&url, Some("test-token")).await,
            Err(FetchError::NotAPost)
        );
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let result = fetcher()
            .fetch_post(&format!("{}/@user/1", mock_server.uri()), Some("expired"))
            .await;

        assert_eq!(result, Err(FetchError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_server_error_has_no_user_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&mock_server)
            .await;

        let error = fetcher()
            .fetch_post(&format!("{}/@user/1", mock_server.uri()), None)
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::Api(_)));
        assert!(error.user_message().is_none());
    }

    #[tokio::test]
    async fn test_fetch_context() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/statuses/2/context"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ancestors": [status("1", "user")],
                "descendants": [status("3", "other@elsewhere.social"), status("4", "user")]
            })))
            .mount(&mock_server)
            .await;

        let context = fetcher()
            .fetch_context(&format!("{}/@user/2", mock_server.uri()), None)
            .await
            .unwrap();

        assert_eq!(context.ancestors.len(), 1);
        assert_eq!(context.descendants.len(), 2);
        assert_eq!(context.descendants[0].author.username, "@other@elsewhere.social");
        assert_eq!(context.descendants[1].author.username, "@user@127.0.0.1");
    }
}
