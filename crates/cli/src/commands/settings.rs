//! Settings command - inspect and change the saved card style

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;
use whiff_adapters::settings::FsSettingsStore;
use whiff_domain::{SettingsAction, SettingsFeature, SettingsState};

use crate::args::{SettingsArgs, SettingsCommands};
use crate::config::AppConfig;

pub async fn execute(args: SettingsArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = FsSettingsStore::new(&config.general.settings_dir);
    tracing::debug!(dir = %store.dir().display(), "Using settings directory");

    let feature = SettingsFeature::new(Arc::new(store));
    let mut state = SettingsState::default();
    dispatch(&feature, &mut state, SettingsAction::Load);

    match args.command {
        SettingsCommands::Show { json } => print_settings(&state, json),
        SettingsCommands::Set { field, value } => {
            let action = parse_assignment(&field, &value)?;
            dispatch(&feature, &mut state, action);
            print_settings(&state, false)
        }
        SettingsCommands::Reset => {
            dispatch(&feature, &mut state, SettingsAction::Reset);
            println!("Settings reset to defaults");
            Ok(())
        }
    }
}

/// Run `action` and every follow-up it produces
fn dispatch(feature: &SettingsFeature, state: &mut SettingsState, action: SettingsAction) {
    let mut next = Some(action);
    while let Some(action) = next {
        tracing::debug!(action = action.name(), "Settings action");
        next = feature.reduce(state, action);
    }
}

fn parse_assignment(field: &str, value: &str) -> Result<SettingsAction> {
    let action = match field.replace('-', "_").as_str() {
        "text_color" => SettingsAction::TextColorChanged(value.parse()?),
        "link_color" => SettingsAction::LinkColorChanged(value.parse()?),
        "background_color" => SettingsAction::BackgroundColorChanged(value.parse()?),
        "show_date" => SettingsAction::ShowDateToggled(parse_bool(value)?),
        "round_corners" => SettingsAction::RoundCornersToggled(parse_bool(value)?),
        "image_style" => SettingsAction::ImageStyleChanged(value.parse()?),
        "link_style" => SettingsAction::LinkStyleChanged(value.parse()?),
        other => bail!("Unknown setting: {}", other),
    };
    Ok(action)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("Expected true or false, got '{}'", value),
    }
}

fn print_settings(state: &SettingsState, json: bool) -> Result<()> {
    if json {
        let json = serde_json::to_string_pretty(state).context("Failed to serialize settings")?;
        println!("{}", json);
        return Ok(());
    }

    println!("text_color       = {}", state.text_color);
    println!("link_color       = {}", state.link_color);
    println!("background_color = {}", state.background_color);
    println!("show_date        = {}", state.show_date);
    println!("round_corners    = {}", state.round_corners);
    println!("image_style      = {}", state.image_style);
    println!("link_style       = {}", state.link_style);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use whiff_domain::{Color, ImageStyle, LinkStyle};

    #[test]
    fn test_parse_assignments() {
        assert_eq!(
            parse_assignment("link-color", "#ff0000").unwrap(),
            SettingsAction::LinkColorChanged(Color::rgb(0xff, 0, 0))
        );
        assert_eq!(
            parse_assignment("show_date", "off").unwrap(),
            SettingsAction::ShowDateToggled(false)
        );
        assert_eq!(
            parse_assignment("image_style", "fan").unwrap(),
            SettingsAction::ImageStyleChanged(ImageStyle::Fan)
        );
        assert_eq!(
            parse_assignment("link_style", "in-image").unwrap(),
            SettingsAction::LinkStyleChanged(LinkStyle::InImage)
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_assignment("font", "serif").is_err());
        assert!(parse_assignment("text_color", "red").is_err());
        assert!(parse_assignment("round_corners", "maybe").is_err());
    }
}
