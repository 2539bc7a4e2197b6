//! whiff domain crate
//!
//! This crate contains the export core following hexagonal architecture:
//! - `model`: Posts, authors, attachments, images and cache keys
//! - `ports`: Trait definitions for the collaborators (adapters)
//! - `cache`: Image cache keyed by (URL, kind)
//! - `content`: Post markup formatting
//! - `settings`: Display settings and their sub-reducer
//! - `usecases`: The export reducer, rerender policy and effect runtime

pub mod cache;
pub mod content;
pub mod model;
pub mod ports;
pub mod settings;
pub mod usecases;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::ImageCache;
pub use content::{AttributedContent, ContentError, TextAttributes, TextRun, format_content};
pub use model::*;
pub use ports::*;
pub use settings::{
    ImageStyle, LinkStyle, PersistedSettings, SETTINGS_STORAGE_KEY, SettingsAction,
    SettingsFeature, SettingsState,
};
