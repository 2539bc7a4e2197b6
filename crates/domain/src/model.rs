//! Domain models and value objects

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

/// An sRGB color with alpha, persisted as `#rrggbb` or `#rrggbbaa`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const BLUE: Color = Color::rgb(0x00, 0x7a, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid color '{0}': expected #rrggbb or #rrggbbaa")]
pub struct ColorParseError(pub String);

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError(s.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ColorParseError(s.to_string()))
        };

        let a = if hex.len() == 8 { channel(6)? } else { 0xff };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a,
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 0xff {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The author of a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Handle in `@user@host` form
    pub username: String,
    /// Display name; may contain raw emoji shortcodes
    pub display_name: String,
    pub avatar_url: String,
}

impl Author {
    /// Normalize a server-returned handle to `@user@host`.
    ///
    /// Servers return local accounts without a host, so the host of the
    /// request URL is appended. Handles that already carry a host are kept.
    pub fn normalized_handle(handle: &str, host: &str) -> String {
        let bare = handle.trim_start_matches('@');
        if bare.contains('@') {
            format!("@{}", bare)
        } else {
            format!("@{}@{}", bare, host)
        }
    }
}

/// Kind of a media attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    /// Short looping video (Mastodon's `gifv`)
    #[serde(rename = "gifv")]
    LoopingVideo,
    Video,
    Audio,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A media item attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Authoritative URL; may point at non-image media
    pub source_url: String,
    /// Always safe to show as a still image
    pub preview_url: String,
    pub width: u32,
    pub height: u32,
    pub perceptual_hash: Option<String>,
}

impl MediaAttachment {
    /// Build an attachment, applying the server-omission fallbacks
    pub fn new(
        id: Option<String>,
        media_type: MediaType,
        source_url: impl Into<String>,
        preview_url: Option<String>,
        (width, height): (u32, u32),
        perceptual_hash: Option<String>,
    ) -> Self {
        let source_url = source_url.into();
        Self {
            id: id.unwrap_or_else(|| source_url.clone()),
            media_type,
            preview_url: preview_url.unwrap_or_else(|| source_url.clone()),
            source_url,
            width,
            height,
            perceptual_hash,
        }
    }

    /// The URL to show as a still image
    pub fn display_url(&self) -> &str {
        match self.media_type {
            MediaType::Image => &self.source_url,
            _ => &self.preview_url,
        }
    }
}

/// Link preview metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub title: String,
    pub description: Option<String>,
    pub link_url: String,
    pub preview_image_url: Option<String>,
    pub perceptual_hash: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// A single status fetched from a Mastodon-compatible server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Server-stable identifier
    pub id: String,
    /// Canonical location of the post
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Raw markup as returned by the server
    pub content: String,
    pub author: Author,
    #[serde(default)]
    pub media_attachments: Vec<MediaAttachment>,
    pub card: Option<Card>,
    pub in_reply_to_id: Option<String>,
}

impl Post {
    /// Every image this post needs: attachments, then the avatar, then the
    /// card preview
    pub fn image_refs(&self) -> Vec<ImageRef> {
        let mut refs: Vec<ImageRef> = self
            .media_attachments
            .iter()
            .map(|attachment| ImageRef {
                url: attachment.display_url().to_string(),
                perceptual_hash: attachment.perceptual_hash.clone(),
                width: attachment.width,
                height: attachment.height,
            })
            .collect();

        refs.push(ImageRef {
            url: self.author.avatar_url.clone(),
            perceptual_hash: None,
            width: 0,
            height: 0,
        });

        if let Some(card) = &self.card {
            if let Some(image_url) = &card.preview_image_url {
                refs.push(ImageRef {
                    url: image_url.clone(),
                    perceptual_hash: card.perceptual_hash.clone(),
                    width: card.width,
                    height: card.height,
                });
            }
        }

        refs
    }

    /// Whether any image of this post is served from `url`
    pub fn references_image(&self, url: &str) -> bool {
        self.image_refs().iter().any(|r| r.url == url)
    }
}

/// The conversation around a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Oldest first, root to leaf
    #[serde(default)]
    pub ancestors: Vec<Post>,
    #[serde(default)]
    pub descendants: Vec<Post>,
}

impl Context {
    /// Ancestors followed by descendants; the root post is not included
    pub fn all(&self) -> impl Iterator<Item = &Post> {
        self.ancestors.iter().chain(self.descendants.iter())
    }

    pub fn find(&self, id: &str) -> Option<&Post> {
        self.all().find(|p| p.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.ancestors.is_empty() && self.descendants.is_empty()
    }
}

/// A display URL paired with whatever is known about it before loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub url: String,
    pub perceptual_hash: Option<String>,
    /// Zero when unknown
    pub width: u32,
    pub height: u32,
}

/// Where a cached image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageKind {
    /// Loaded from the network
    Remote,
    /// Decoded locally from a perceptual hash
    Blurhash,
}

/// Cache key; both kinds may coexist for one URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey {
    pub url: String,
    pub kind: ImageKind,
}

impl ImageKey {
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: ImageKind::Remote,
        }
    }

    pub fn blurhash(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: ImageKind::Blurhash,
        }
    }
}

/// Image payload: encoded bytes from the network, raw RGBA from a decoder,
/// or a rendered composite
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub media_type: String,
    pub data: Arc<[u8]>,
}

impl Image {
    pub fn new(width: u32, height: u32, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            media_type: media_type.into(),
            data: Arc::from(data),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("media_type", &self.media_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}
