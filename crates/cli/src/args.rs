//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// whiff: export Mastodon posts and their threads as styled cards
#[derive(Parser, Debug)]
#[command(name = "whiff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a post and render it with the saved settings
    Export(ExportArgs),

    /// Show or change the saved display settings
    Settings(SettingsArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Link to the post
    pub url: String,

    /// Write the rendered card here instead of stdout
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Also include this thread post (repeatable)
    #[arg(long = "show", value_name = "ID")]
    pub show: Vec<String>,

    /// Print a JSON summary instead of the card
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommands,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print the current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change one setting
    Set {
        /// text_color, link_color, background_color, show_date,
        /// round_corners, image_style or link_style
        field: String,

        value: String,
    },

    /// Restore the defaults
    Reset,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./whiff.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
