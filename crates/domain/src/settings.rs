//! Display settings and their persistence sub-reducer

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::model::Color;
use crate::ports::SettingsStore;

/// Storage key for the persisted settings blob
pub const SETTINGS_STORAGE_KEY: &str = "settings";

/// How attachments are laid out in the composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImageStyle {
    #[default]
    Grid,
    Stacked,
    Fan,
}

/// Where the post link goes when sharing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkStyle {
    /// No link at all
    Omit,
    /// Drawn inside the composite
    InImage,
    /// Passed alongside the image as the share caption
    #[default]
    AfterImage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseSettingError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for ImageStyle {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grid" => Ok(Self::Grid),
            "stacked" => Ok(Self::Stacked),
            "fan" => Ok(Self::Fan),
            _ => Err(ParseSettingError {
                kind: "image style",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Grid => "grid",
            Self::Stacked => "stacked",
            Self::Fan => "fan",
        })
    }
}

impl FromStr for LinkStyle {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "omit" | "none" => Ok(Self::Omit),
            "in_image" => Ok(Self::InImage),
            "after_image" => Ok(Self::AfterImage),
            _ => Err(ParseSettingError {
                kind: "link style",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LinkStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Omit => "omit",
            Self::InImage => "in_image",
            Self::AfterImage => "after_image",
        })
    }
}

/// User-visible display preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsState {
    pub text_color: Color,
    pub link_color: Color,
    pub background_color: Color,
    pub show_date: bool,
    pub round_corners: bool,
    pub image_style: ImageStyle,
    pub link_style: LinkStyle,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            text_color: Color::WHITE,
            link_color: Color::BLUE,
            background_color: Color::BLACK,
            show_date: true,
            round_corners: false,
            image_style: ImageStyle::Grid,
            link_style: LinkStyle::AfterImage,
        }
    }
}

/// On-disk form of [`SettingsState`].
///
/// Every field is optional and decoded on its own, so records written by
/// older or newer versions load whatever fields they share with this one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text_color: Option<Color>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub link_color: Option<Color>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub show_date: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub round_corners: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub image_style: Option<ImageStyle>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub link_style: Option<LinkStyle>,
}

/// Decode a field, treating unrecognized values as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

impl From<&SettingsState> for PersistedSettings {
    fn from(state: &SettingsState) -> Self {
        Self {
            text_color: Some(state.text_color),
            link_color: Some(state.link_color),
            background_color: Some(state.background_color),
            show_date: Some(state.show_date),
            round_corners: Some(state.round_corners),
            image_style: Some(state.image_style),
            link_style: Some(state.link_style),
        }
    }
}

impl PersistedSettings {
    /// Overlay the present fields onto `state`
    pub fn apply_to(&self, state: &mut SettingsState) {
        if let Some(color) = self.text_color {
            state.text_color = color;
        }
        if let Some(color) = self.link_color {
            state.link_color = color;
        }
        if let Some(color) = self.background_color {
            state.background_color = color;
        }
        if let Some(show) = self.show_date {
            state.show_date = show;
        }
        if let Some(round) = self.round_corners {
            state.round_corners = round;
        }
        if let Some(style) = self.image_style {
            state.image_style = style;
        }
        if let Some(style) = self.link_style {
            state.link_style = style;
        }
    }
}

/// Actions understood by the settings sub-reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    Load,
    Save,
    Reset,
    TextColorChanged(Color),
    LinkColorChanged(Color),
    BackgroundColorChanged(Color),
    ShowDateToggled(bool),
    RoundCornersToggled(bool),
    ImageStyleChanged(ImageStyle),
    LinkStyleChanged(LinkStyle),
}

impl SettingsAction {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Save => "save",
            Self::Reset => "reset",
            Self::TextColorChanged(_) => "text_color_changed",
            Self::LinkColorChanged(_) => "link_color_changed",
            Self::BackgroundColorChanged(_) => "background_color_changed",
            Self::ShowDateToggled(_) => "show_date_toggled",
            Self::RoundCornersToggled(_) => "round_corners_toggled",
            Self::ImageStyleChanged(_) => "image_style_changed",
            Self::LinkStyleChanged(_) => "link_style_changed",
        }
    }
}

/// Settings sub-reducer
#[derive(Clone)]
pub struct SettingsFeature {
    store: Arc<dyn SettingsStore>,
}

impl SettingsFeature {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    /// Apply `action` to `state`, returning the follow-up action, if any.
    ///
    /// Every field change is followed by `Save`. `Load` and `Save` never
    /// produce a follow-up.
    pub fn reduce(
        &self,
        state: &mut SettingsState,
        action: SettingsAction,
    ) -> Option<SettingsAction> {
        match action {
            SettingsAction::Load => {
                self.load(state);
                None
            }
            SettingsAction::Save => {
                self.save(state);
                None
            }
            SettingsAction::Reset => {
                *state = SettingsState::default();
                Some(SettingsAction::Save)
            }
            SettingsAction::TextColorChanged(color) => {
                state.text_color = color;
                Some(SettingsAction::Save)
            }
            SettingsAction::LinkColorChanged(color) => {
                state.link_color = color;
                Some(SettingsAction::Save)
            }
            SettingsAction::BackgroundColorChanged(color) => {
                state.background_color = color;
                Some(SettingsAction::Save)
            }
            SettingsAction::ShowDateToggled(show) => {
                state.show_date = show;
                Some(SettingsAction::Save)
            }
            SettingsAction::RoundCornersToggled(round) => {
                state.round_corners = round;
                Some(SettingsAction::Save)
            }
            SettingsAction::ImageStyleChanged(style) => {
                state.image_style = style;
                Some(SettingsAction::Save)
            }
            SettingsAction::LinkStyleChanged(style) => {
                state.link_style = style;
                Some(SettingsAction::Save)
            }
        }
    }

    fn load(&self, state: &mut SettingsState) {
        let Some(bytes) = self.store.read_blob(SETTINGS_STORAGE_KEY) else {
            tracing::debug!("No persisted settings");
            return;
        };

        match serde_json::from_slice::<PersistedSettings>(&bytes) {
            Ok(persisted) => persisted.apply_to(state),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable persisted settings");
            }
        }
    }

    fn save(&self, state: &SettingsState) {
        let bytes = match serde_json::to_vec(&PersistedSettings::from(state)) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize settings");
                return;
            }
        };

        if let Err(e) = self.store.write_blob(SETTINGS_STORAGE_KEY, bytes) {
            tracing::warn!(error = %e, "Failed to persist settings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn complete() -> PersistedSettings {
        PersistedSettings {
            text_color: Some(Color::rgb(0xff, 0, 0)),
            link_color: Some(Color::BLUE),
            background_color: Some(Color::rgb(0, 0xff, 0)),
            show_date: Some(true),
            round_corners: Some(false),
            image_style: Some(ImageStyle::Stacked),
            link_style: Some(LinkStyle::AfterImage),
        }
    }

    fn feature_with(store: &Arc<MemoryStore>) -> SettingsFeature {
        SettingsFeature::new(Arc::clone(store) as Arc<dyn SettingsStore>)
    }

    #[test]
    fn test_defaults() {
        let state = SettingsState::default();
        assert_eq!(state.text_color, Color::WHITE);
        assert_eq!(state.link_color, Color::BLUE);
        assert_eq!(state.background_color, Color::BLACK);
        assert!(state.show_date);
        assert!(!state.round_corners);
        assert_eq!(state.image_style, ImageStyle::Grid);
        assert_eq!(state.link_style, LinkStyle::AfterImage);
    }

    #[test]
    fn test_load_from_empty_is_noop() {
        let store = Arc::new(MemoryStore::default());
        let feature = feature_with(&store);
        let mut state = SettingsState::default();

        assert_eq!(feature.reduce(&mut state, SettingsAction::Load), None);
        assert_eq!(state, SettingsState::default());
    }

    #[test]
    fn test_load_from_invalid_json_is_noop() {
        let store = Arc::new(MemoryStore::default());
        store.put(SETTINGS_STORAGE_KEY, b"asdf".to_vec());
        let feature = feature_with(&store);
        let mut state = SettingsState::default();

        feature.reduce(&mut state, SettingsAction::Load);
        assert_eq!(state, SettingsState::default());
    }

    #[test]
    fn test_load_from_complete() {
        let store = Arc::new(MemoryStore::default());
        store.put(
            SETTINGS_STORAGE_KEY,
            serde_json::to_vec(&complete()).unwrap(),
        );
        let feature = feature_with(&store);
        let mut state = SettingsState::default();

        feature.reduce(&mut state, SettingsAction::Load);

        assert_eq!(state.text_color, Color::rgb(0xff, 0, 0));
        assert_eq!(state.background_color, Color::rgb(0, 0xff, 0));
        assert_eq!(state.image_style, ImageStyle::Stacked);
    }

    #[test]
    fn test_load_from_partial_tolerates_unknown_and_missing_keys() {
        let json = r##"{
            "text_color": "#ff0000",
            "new_key": true,
            "image_style": "spiral",
            "link_style": "in_image",
            "round_corners": "yes"
        }"##;
        let store = Arc::new(MemoryStore::default());
        store.put(SETTINGS_STORAGE_KEY, json.as_bytes().to_vec());
        let feature = feature_with(&store);
        let mut state = SettingsState::default();

        feature.reduce(&mut state, SettingsAction::Load);

        assert_eq!(state.text_color, Color::rgb(0xff, 0, 0));
        assert_eq!(state.link_style, LinkStyle::InImage);
        // Unrecognized values fall back to the defaults
        assert_eq!(state.image_style, ImageStyle::Grid);
        assert!(!state.round_corners);
        assert!(state.show_date);
    }

    #[test]
    fn test_save_writes_complete_record() {
        let store = Arc::new(MemoryStore::default());
        let feature = feature_with(&store);
        let mut state = SettingsState::default();
        complete().apply_to(&mut state);

        assert!(store.get(SETTINGS_STORAGE_KEY).is_none());
        assert_eq!(feature.reduce(&mut state, SettingsAction::Save), None);

        let saved: PersistedSettings =
            serde_json::from_slice(&store.get(SETTINGS_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(saved, complete());
    }

    #[test]
    fn test_reset_restores_defaults_then_saves() {
        let store = Arc::new(MemoryStore::default());
        let feature = feature_with(&store);
        let mut state = SettingsState::default();
        complete().apply_to(&mut state);

        let follow_up = feature.reduce(&mut state, SettingsAction::Reset);
        assert_eq!(state, SettingsState::default());
        assert_eq!(follow_up, Some(SettingsAction::Save));

        feature.reduce(&mut state, SettingsAction::Save);
        let saved: PersistedSettings =
            serde_json::from_slice(&store.get(SETTINGS_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(saved, PersistedSettings::from(&SettingsState::default()));
    }

    #[test]
    fn test_every_setter_is_followed_by_save() {
        let store = Arc::new(MemoryStore::default());
        let feature = feature_with(&store);
        let mut state = SettingsState::default();
        let red = Color::rgb(0xff, 0, 0);

        let actions = vec![
            SettingsAction::TextColorChanged(red),
            SettingsAction::LinkColorChanged(red),
            SettingsAction::BackgroundColorChanged(red),
            SettingsAction::ShowDateToggled(false),
            SettingsAction::RoundCornersToggled(true),
            SettingsAction::ImageStyleChanged(ImageStyle::Fan),
            SettingsAction::LinkStyleChanged(LinkStyle::InImage),
        ];

        for action in actions {
            assert_eq!(
                feature.reduce(&mut state, action),
                Some(SettingsAction::Save)
            );
        }

        assert_eq!(state.text_color, red);
        assert_eq!(state.link_color, red);
        assert_eq!(state.background_color, red);
        assert!(!state.show_date);
        assert!(state.round_corners);
        assert_eq!(state.image_style, ImageStyle::Fan);
        assert_eq!(state.link_style, LinkStyle::InImage);
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("Stacked".parse::<ImageStyle>().unwrap(), ImageStyle::Stacked);
        assert_eq!("after-image".parse::<LinkStyle>().unwrap(), LinkStyle::AfterImage);
        assert_eq!("none".parse::<LinkStyle>().unwrap(), LinkStyle::Omit);
        assert!("spiral".parse::<ImageStyle>().is_err());
    }
}
