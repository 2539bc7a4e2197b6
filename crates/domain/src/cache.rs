//! Image cache keyed by (URL, kind)

use std::collections::HashMap;

use crate::model::{Image, ImageKey, ImageKind};

/// Loaded and placeholder images for the current export.
///
/// A blurhash placeholder and the remote image for the same URL are kept side
/// by side; readers pick the remote one once it has arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCache {
    entries: HashMap<ImageKey, Image>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an image, replacing any previous value for the key
    pub fn insert(&mut self, key: ImageKey, image: Image) {
        self.entries.insert(key, image);
    }

    pub fn get(&self, key: &ImageKey) -> Option<&Image> {
        self.entries.get(key)
    }

    /// The remote image for `url` if loaded, else its placeholder
    pub fn best(&self, url: &str) -> Option<(&Image, ImageKind)> {
        self.get(&ImageKey::remote(url))
            .map(|image| (image, ImageKind::Remote))
            .or_else(|| {
                self.get(&ImageKey::blurhash(url))
                    .map(|image| (image, ImageKind::Blurhash))
            })
    }

    pub fn count(&self, kind: ImageKind) -> usize {
        self.entries.keys().filter(|k| k.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
