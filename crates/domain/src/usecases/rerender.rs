//! Rerender policy
//!
//! Runs after the export reducer on the same action and decides, from the
//! resulting state, whether the composite needs to be rendered again.

use crate::settings::SettingsAction;
use crate::usecases::export::{ExportAction, ExportState};

/// What an action implies for the composite, classified before the reducer
/// consumes the action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTrigger {
    None,
    Always,
    /// A remote image arrived; renders only if a visible post shows it
    ImageArrived(String),
}

impl RenderTrigger {
    pub fn classify(action: &ExportAction) -> Self {
        match action {
            ExportAction::PostFetchCompleted(Ok(_)) => Self::Always,
            ExportAction::ImageFetchCompleted(Ok(response)) => {
                Self::ImageArrived(response.key.url.clone())
            }
            ExportAction::Settings(SettingsAction::Load) => Self::None,
            ExportAction::Settings(_) => Self::Always,
            ExportAction::ToggledPostVisibility(_) => Self::Always,
            _ => Self::None,
        }
    }

    /// Decide against the state produced by the primary pass
    pub fn should_render(&self, state: &ExportState) -> bool {
        match self {
            Self::None => false,
            Self::Always => true,
            Self::ImageArrived(url) => state.visible_posts().any(|p| p.references_image(url)),
        }
    }
}
