use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for winparams
#[derive(Parser, Debug)]
#[command(name = "winparams")]
#[command(version)]
#[command(about = "Edit and preview window-creation parameter overrides")]
pub struct Cli {
    /// Directory holding the settings document (overrides the config file)
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Configuration file (default: <config dir>/winparams/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the stored settings document
    Show,

    /// Print the parameters that would be applied to a new window
    Resolve {
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Set a raw parameter (advanced)
    Set {
        /// Parameter identifier, e.g. minheight
        param: String,
        /// Value; enum members and flags may be given by name
        value: String,
        /// Acknowledge that raw parameters can make windows unusable
        #[arg(long)]
        advanced: bool,
        /// Allow values that hide windows or render them off screen
        #[arg(long)]
        force: bool,
    },

    /// Remove a raw parameter (advanced)
    Unset {
        param: String,
        #[arg(long)]
        advanced: bool,
    },

    /// Turn one member of a flags parameter on or off (advanced)
    Flag {
        param: String,
        /// Member name or bit value
        member: String,
        #[arg(value_enum)]
        state: Toggle,
        #[arg(long)]
        advanced: bool,
        #[arg(long)]
        force: bool,
    },

    /// Turn a curated preset on or off
    Preset {
        /// SystemTitlebar, TransparentWindow or NoSizeLimit
        name: String,
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Turn a boolean option on or off
    #[command(name = "option")]
    SetOption {
        /// ApplyMainWindowWorkaround, ExcludeMenus, ExcludeNotifications or ExcludeOverlay
        name: String,
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Delete all stored settings
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show the URL a window-open call would receive
    RewriteUrl {
        url: String,
        /// Target window name, used for exclusions
        #[arg(long, default_value = "")]
        target: String,
    },

    /// List parameters, their domains and members
    Catalog,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Toggle::On
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON array of [parameter, value] pairs
    Json,
    /// key=value query pairs
    Query,
    /// name="value" popup attributes
    Attributes,
}
