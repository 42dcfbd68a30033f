//! Curated presets and boolean options
//!
//! Presets are the friendly toggles of the settings panel. Each one writes a
//! fixed set of known-safe parameter values into `simpleParams` when turned
//! on and removes them when turned off. Options are plain booleans stored
//! under `options`.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::store::SettingsStore;
use crate::types::{SettingsDocument, SettingsField, StoredValue, WindowParam};
use log::info;
use std::fmt;
use std::str::FromStr;

/// A curated parameter preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Native title bar: windows are created as direct HWND browsers
    SystemTitlebar,
    /// Transparent, resizable, composited windows
    TransparentWindow,
    /// Drop the minimum window size
    NoSizeLimit,
}

impl Preset {
    pub const ALL: [Preset; 3] = [
        Preset::SystemTitlebar,
        Preset::TransparentWindow,
        Preset::NoSizeLimit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::SystemTitlebar => "SystemTitlebar",
            Preset::TransparentWindow => "TransparentWindow",
            Preset::NoSizeLimit => "NoSizeLimit",
        }
    }

    /// The parameter values this preset writes
    ///
    /// Enum and flag members are looked up by name in `catalog`, so a host
    /// table that renumbers them still gets the right codes.
    pub fn params(self, catalog: &Catalog) -> Result<Vec<(WindowParam, StoredValue)>> {
        let params = match self {
            Preset::SystemTitlebar => {
                let code = catalog.member_code(WindowParam::BrowserType, "DirectHWND")?;
                vec![(WindowParam::BrowserType, StoredValue::Text(code.to_string()))]
            }
            Preset::TransparentWindow => {
                let bits = ["Resizable", "Composited", "TransparentParentWindow"]
                    .iter()
                    .map(|name| catalog.member_code(WindowParam::CreateFlags, name))
                    .collect::<Result<Vec<_>>>()?;
                vec![(WindowParam::CreateFlags, StoredValue::Flags(bits))]
            }
            Preset::NoSizeLimit => vec![
                (WindowParam::MinHeight, StoredValue::from("0")),
                (WindowParam::MinWidth, StoredValue::from("0")),
            ],
        };
        Ok(params)
    }

    /// Whether every value of this preset is currently in `simpleParams`
    pub fn is_active(self, document: &SettingsDocument, catalog: &Catalog) -> Result<bool> {
        let active = self.params(catalog)?.iter().all(|(param, expected)| {
            document
                .simple_params
                .get(param.as_str())
                .is_some_and(|stored| same_value(stored, expected))
        });
        Ok(active)
    }

    /// Turn the preset on or off
    ///
    /// All of the preset's values land in one write, so a failed write
    /// never leaves half a preset behind.
    pub async fn apply(self, store: &SettingsStore, catalog: &Catalog, enabled: bool) -> Result<()> {
        let params = self.params(catalog)?;
        store
            .update(|document| {
                let mut changed = false;
                for (param, value) in params {
                    if enabled {
                        document.set(SettingsField::SimpleParams, param.as_str(), value)?;
                        changed = true;
                    } else {
                        changed |= document.remove(SettingsField::SimpleParams, param.as_str());
                    }
                }
                Ok(changed)
            })
            .await?;
        info!(
            "Preset {} {}",
            self,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }
}

/// Flag lists must match member for member, scalars compare numerically
fn same_value(stored: &StoredValue, expected: &StoredValue) -> bool {
    match (stored, expected) {
        (StoredValue::Flags(lhs), StoredValue::Flags(rhs)) => lhs == rhs,
        (StoredValue::Flags(_), _) | (_, StoredValue::Flags(_)) => false,
        _ => matches!((stored.as_code(), expected.as_code()), (Some(a), Some(b)) if a == b),
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidValue {
                param: s.to_string(),
                message: "not a preset".to_string(),
            })
    }
}

/// Boolean options stored under `options`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionOption {
    /// Also apply popup attributes to popups that exist before the hook is
    /// installed, the main window in particular
    ApplyMainWindowWorkaround,
    /// Leave context menus untouched
    ExcludeMenus,
    /// Leave notification toasts untouched
    ExcludeNotifications,
    /// Leave the in-game overlay untouched
    ExcludeOverlay,
}

impl ExtensionOption {
    pub const ALL: [ExtensionOption; 4] = [
        ExtensionOption::ApplyMainWindowWorkaround,
        ExtensionOption::ExcludeMenus,
        ExtensionOption::ExcludeNotifications,
        ExtensionOption::ExcludeOverlay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExtensionOption::ApplyMainWindowWorkaround => "ApplyMainWindowWorkaround",
            ExtensionOption::ExcludeMenus => "ExcludeMenus",
            ExtensionOption::ExcludeNotifications => "ExcludeNotifications",
            ExtensionOption::ExcludeOverlay => "ExcludeOverlay",
        }
    }

    pub fn is_enabled(self, document: &SettingsDocument) -> bool {
        document.option(self.as_str())
    }
}

impl fmt::Display for ExtensionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtensionOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ExtensionOption::ALL
            .iter()
            .copied()
            .find(|o| o.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidValue {
                param: s.to_string(),
                message: "not an option".to_string(),
            })
    }
}
