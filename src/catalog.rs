//! Parameter catalog
//!
//! The catalog knows the value domain of every [`WindowParam`] and holds the
//! member tables for the Enum and Flags domains. Member tables belong to the
//! host application and can change between host versions, so they are
//! handed to [`CatalogBuilder`] at startup instead of being hard-wired into
//! the codec. Copies of the browser type and popup creation flag tables are
//! bundled for hosts that do not provide their own.

use crate::error::{Error, Result};
use crate::types::{ParamDomain, StoredValue, WindowParam};
use std::collections::HashMap;

/// Browser type enumeration of the host client
pub const BUILTIN_BROWSER_TYPES: &[(u32, &str)] = &[
    (0, "OffScreen"),
    (1, "OpenVROverlay"),
    (2, "OpenVROverlay_Dashboard"),
    (3, "DirectHWND"),
    (4, "DirectHWND_Borderless"),
    (5, "DirectHWND_Hidden"),
    (6, "ChildHWNDNative"),
    (12, "Offscreen_SteamUI"),
    (13, "OpenVROverlay_Subview"),
];

/// Popup creation flags of the host client
pub const BUILTIN_POPUP_CREATION_FLAGS: &[(u32, &str)] = &[
    (0, "None"),
    (1 << 0, "Minimized"),
    (1 << 1, "Hidden"),
    (1 << 2, "TooltipHint"),
    (1 << 3, "NoTaskbarIcon"),
    (1 << 4, "Resizable"),
    (1 << 5, "ScalePosition"),
    (1 << 6, "ScaleSize"),
    (1 << 7, "Maximized"),
    (1 << 8, "Composited"),
    (1 << 9, "NotFocusable"),
    (1 << 10, "FullScreen"),
    (1 << 11, "Fullscreen_Exclusive"),
    (1 << 12, "ApplyBrowserScaleToDimensions"),
    (1 << 13, "AlwaysOnTop"),
    (1 << 14, "NoWindowShadow"),
    (1 << 15, "NoMinimize"),
    (1 << 16, "PopUpMenuHint"),
    (1 << 17, "IgnoreSavedSize"),
    (1 << 18, "NoRoundedCorners"),
    (1 << 19, "ForceRoundedCorners"),
    (1 << 20, "OverrideRedirect"),
    (1 << 21, "IgnoreSteamDisplayScale"),
    (1 << 22, "TransparentParentWindow"),
    (1 << 23, "DisableDPIScale"),
    (1 << 24, "ForceBrowserVisible"),
];

/// Sample restore geometry shown in the `restoredetails` description
pub const RESTORE_DETAILS_EXAMPLE: &str = "1&x=604&y=257&w=1010&h=600";

/// User agent reported by the host when none is configured
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; Valve Steam Client [Steam Beta Update]/default/0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.5414.120 Safari/537.36";

/// Members whose selection can leave a window without any way to interact
/// with or close it
const RISKY_MEMBERS: &[(WindowParam, &[&str])] = &[
    (WindowParam::BrowserType, &["OffScreen", "Offscreen_SteamUI"]),
    (WindowParam::CreateFlags, &["Hidden"]),
];

/// Ordered mapping from numeric code (or bit) to member name
///
/// Tables built from a plain list of names are keyed by name: their values
/// are stored and sent as the name itself, the position only orders them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberTable {
    members: Vec<(u32, String)>,
    keyed_by_name: bool,
}

impl MemberTable {
    /// Build a table from explicit `(code, name)` pairs
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (u32, S)>) -> Self {
        Self {
            members: pairs
                .into_iter()
                .map(|(code, name)| (code, name.into()))
                .collect(),
            keyed_by_name: false,
        }
    }

    /// Build a name-keyed table from a plain list, the way the host exposes
    /// its overlay key list
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            members: names
                .into_iter()
                .enumerate()
                .map(|(i, name)| (i as u32, name.into()))
                .collect(),
            keyed_by_name: true,
        }
    }

    pub fn is_keyed_by_name(&self) -> bool {
        self.keyed_by_name
    }

    /// Code of the member a stored enum value refers to
    ///
    /// Name-keyed tables match the stored name first. A numeric code is
    /// accepted for every table.
    pub fn resolve(&self, value: &StoredValue) -> Option<u32> {
        if self.keyed_by_name {
            if let Some(code) = value_text(value).and_then(|s| self.code_of(s)) {
                return Some(code);
            }
        }
        value
            .as_code()
            .and_then(|c| u32::try_from(c).ok())
            .filter(|c| self.contains_code(*c))
    }

    /// The value persisted for member `code`
    pub fn stored_form(&self, code: u32) -> Option<StoredValue> {
        let name = self.name_of(code)?;
        Some(if self.keyed_by_name {
            StoredValue::Text(name.to_string())
        } else {
            StoredValue::Text(code.to_string())
        })
    }

    /// Member bits covered by `mask`, in table order. Bits no member
    /// covers are dropped.
    pub fn split_mask(&self, mask: u32) -> Vec<u32> {
        self.members
            .iter()
            .map(|(bit, _)| *bit)
            .filter(|bit| *bit != 0 && mask & bit == *bit)
            .collect()
    }

    pub fn name_of(&self, code: u32) -> Option<&str> {
        self.members
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| name.as_str())
    }

    pub fn code_of(&self, name: &str) -> Option<u32> {
        self.members
            .iter()
            .find(|(_, n)| n == name)
            .map(|(code, _)| *code)
    }

    pub fn contains_code(&self, code: u32) -> bool {
        self.name_of(code).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.members.iter().map(|(code, name)| (*code, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn value_text(value: &StoredValue) -> Option<&str> {
    match value {
        StoredValue::Text(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Read-only registry of parameter domains and member tables
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: HashMap<WindowParam, MemberTable>,
    user_agent: String,
}

/// Builder for [`Catalog`]
///
/// # Example
///
/// ```rust
/// use winparams::{Catalog, WindowParam};
///
/// let catalog = Catalog::builder()
///     .builtin_tables()
///     .vr_overlay_keys(["valve.steam.gamepadui.main"])
///     .build()?;
///
/// let browser_types = catalog.members(WindowParam::BrowserType).unwrap();
/// assert_eq!(browser_types.name_of(3), Some("DirectHWND"));
/// # Ok::<(), winparams::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    tables: HashMap<WindowParam, MemberTable>,
    user_agent: Option<String>,
}

impl CatalogBuilder {
    /// Use the bundled browser type and popup creation flag tables
    pub fn builtin_tables(self) -> Self {
        self.table(
            WindowParam::BrowserType,
            MemberTable::from_pairs(BUILTIN_BROWSER_TYPES.iter().copied()),
        )
        .table(
            WindowParam::CreateFlags,
            MemberTable::from_pairs(BUILTIN_POPUP_CREATION_FLAGS.iter().copied()),
        )
    }

    /// Provide the member table of an Enum or Flags parameter, replacing any
    /// table set earlier
    pub fn table(mut self, param: WindowParam, table: MemberTable) -> Self {
        self.tables.insert(param, table);
        self
    }

    /// Provide the host's overlay key list for `vrOverlayKey`
    pub fn vr_overlay_keys<S: Into<String>>(self, keys: impl IntoIterator<Item = S>) -> Self {
        self.table(WindowParam::VrOverlayKey, MemberTable::from_names(keys))
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Finish the catalog
    ///
    /// Fails when an Enum or Flags parameter has no table, or when a table
    /// was given for a parameter of another domain.
    pub fn build(self) -> Result<Catalog> {
        for param in self.tables.keys() {
            if !matches!(param.domain(), ParamDomain::Enum | ParamDomain::Flags) {
                return Err(Error::InvalidValue {
                    param: param.to_string(),
                    message: format!("{} parameters have no member table", param.domain()),
                });
            }
        }

        for param in WindowParam::ALL {
            if matches!(param.domain(), ParamDomain::Enum | ParamDomain::Flags)
                && !self.tables.contains_key(&param)
            {
                return Err(Error::MissingMemberTable {
                    param: param.to_string(),
                });
            }
        }

        Ok(Catalog {
            tables: self.tables,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn domain(&self, param: WindowParam) -> ParamDomain {
        param.domain()
    }

    /// Member table of an Enum or Flags parameter
    pub fn members(&self, param: WindowParam) -> Option<&MemberTable> {
        self.tables.get(&param)
    }

    /// Member table if `param` is in the Enum domain
    pub fn enum_members(&self, param: WindowParam) -> Option<&MemberTable> {
        (param.domain() == ParamDomain::Enum)
            .then(|| self.tables.get(&param))
            .flatten()
    }

    /// Member table if `param` is in the Flags domain
    pub fn flag_members(&self, param: WindowParam) -> Option<&MemberTable> {
        (param.domain() == ParamDomain::Flags)
            .then(|| self.tables.get(&param))
            .flatten()
    }

    /// Arguments interpolated into the human-readable description of `param`
    pub fn description_args(&self, param: WindowParam) -> Vec<String> {
        match param {
            WindowParam::RestoreDetails => vec![RESTORE_DETAILS_EXAMPLE.to_string()],
            WindowParam::UserAgent => vec![self.user_agent.clone()],
            _ => Vec::new(),
        }
    }

    /// Members of `param` that need an extra confirmation before use
    pub fn risky_members(&self, param: WindowParam) -> &'static [&'static str] {
        RISKY_MEMBERS
            .iter()
            .find(|(p, _)| *p == param)
            .map(|(_, members)| *members)
            .unwrap_or(&[])
    }

    /// Names of risky members selected by `value`
    pub fn risky_selection(&self, param: WindowParam, value: &StoredValue) -> Vec<&'static str> {
        let risky = self.risky_members(param);
        let Some(table) = self.members(param) else {
            return Vec::new();
        };

        let selected: Vec<u32> = match (param.domain(), value) {
            (ParamDomain::Flags, StoredValue::Flags(bits)) => bits.clone(),
            (ParamDomain::Enum, v) => table.resolve(v).into_iter().collect(),
            _ => Vec::new(),
        };

        risky
            .iter()
            .copied()
            .filter(|name| {
                table
                    .code_of(name)
                    .is_some_and(|code| selected.contains(&code))
            })
            .collect()
    }

    /// Check that `value` has the shape `param`'s domain requires
    pub fn validate(&self, param: WindowParam, value: &StoredValue) -> Result<()> {
        let invalid = |message: String| Error::InvalidValue {
            param: param.to_string(),
            message,
        };

        match param.domain() {
            ParamDomain::Boolean => match value {
                StoredValue::Bool(_) => Ok(()),
                StoredValue::Text(s) if s == "true" || s == "false" => Ok(()),
                other => Err(invalid(format!("expected a boolean, got {:?}", other))),
            },
            ParamDomain::Enum => {
                let table = self
                    .members(param)
                    .ok_or_else(|| invalid("no member table".to_string()))?;
                match table.resolve(value) {
                    Some(_) => Ok(()),
                    None => Err(invalid(format!("{:?} is not a member", value))),
                }
            }
            ParamDomain::Flags => {
                let bits = value
                    .as_flags()
                    .ok_or_else(|| invalid(format!("expected a list of flags, got {:?}", value)))?;
                let table = self
                    .members(param)
                    .ok_or_else(|| invalid("no member table".to_string()))?;
                for (i, bit) in bits.iter().enumerate() {
                    if !table.contains_code(*bit) {
                        return Err(invalid(format!("{} is not a member flag", bit)));
                    }
                    if bits[..i].contains(bit) {
                        return Err(invalid(format!("flag {} is listed twice", bit)));
                    }
                }
                Ok(())
            }
            ParamDomain::Number => match value {
                StoredValue::Integer(_) => Ok(()),
                StoredValue::Text(s) if s.trim().parse::<i64>().is_ok() => Ok(()),
                other => Err(invalid(format!("expected a number, got {:?}", other))),
            },
            ParamDomain::String => match value {
                StoredValue::Text(_) => Ok(()),
                other => Err(invalid(format!("expected a string, got {:?}", other))),
            },
        }
    }

    /// Turn user input into the value the settings panel would store
    ///
    /// Booleans become `true`/`false`, enum members (by name or code) become
    /// their code as a string, or their name for name-keyed tables, flags are a comma-separated list of member
    /// names or bits, everything else is kept as text.
    pub fn parse_value(&self, param: WindowParam, raw: &str) -> Result<StoredValue> {
        let raw = raw.trim();
        let value = match param.domain() {
            ParamDomain::Boolean => match raw {
                "true" | "on" | "1" => StoredValue::Bool(true),
                "false" | "off" | "0" => StoredValue::Bool(false),
                _ => {
                    return Err(Error::InvalidValue {
                        param: param.to_string(),
                        message: format!("'{}' is not a boolean", raw),
                    })
                }
            },
            ParamDomain::Enum => {
                let code = self.member_code(param, raw)?;
                self.members(param)
                    .and_then(|table| table.stored_form(code))
                    .ok_or_else(|| Error::UnknownMember {
                        param: param.to_string(),
                        member: raw.to_string(),
                    })?
            }
            ParamDomain::Flags => {
                let mut bits = Vec::new();
                for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    let bit = self.member_code(param, token)?;
                    if !bits.contains(&bit) {
                        bits.push(bit);
                    }
                }
                StoredValue::Flags(bits)
            }
            ParamDomain::Number | ParamDomain::String => StoredValue::Text(raw.to_string()),
        };

        self.validate(param, &value)?;
        Ok(value)
    }

    /// Resolve a member given by name or numeric code
    pub fn member_code(&self, param: WindowParam, token: &str) -> Result<u32> {
        let table = self.members(param).ok_or_else(|| Error::InvalidValue {
            param: param.to_string(),
            message: format!("{} parameters have no members", param.domain()),
        })?;

        table
            .code_of(token)
            .or_else(|| token.parse().ok().filter(|c| table.contains_code(*c)))
            .ok_or_else(|| Error::UnknownMember {
                param: param.to_string(),
                member: token.to_string(),
            })
    }
}
