//! whiff adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `mastodon`: Mastodon REST post fetcher
//! - `images`: HTTP image loader
//! - `blurhash`: Perceptual-hash placeholder decoder
//! - `auth`: Configured-token authenticator
//! - `settings`: Filesystem and in-memory settings stores
//! - `render`: Plain-text transcript renderer

pub mod auth;
pub mod blurhash;
pub mod images;
pub mod mastodon;
pub mod render;
mod settings_fs;
mod settings_memory;

/// Re-exports for settings stores
pub mod settings {
    pub use crate::settings_fs::FsSettingsStore;
    pub use crate::settings_memory::InMemorySettingsStore;
}
