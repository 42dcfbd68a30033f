use crate::error::{Error, Result};
use log::warn;
use serde::de::{DeserializeOwned, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Window parameter recognized by the host's window-creation call
///
/// The identifier strings are the exact query keys and attribute names the
/// host understands, so `WindowParam::BrowserType` is written as
/// `browserType` everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WindowParam {
    Browser,
    BrowserType,
    /// Not referenced by the client scripts, but the big picture main menu,
    /// quick access menu and notification toasts are created with it.
    BrowserViewPopup,
    CenterOnBrowserId,
    CreateFlags,
    HwndParent,
    MinHeight,
    MinWidth,
    Modal,
    OpenerId,
    ParentContainerPopupId,
    ParentPopup,
    Pinned,
    RequestId,
    RestoreDetails,
    ScreenAvailHeight,
    ScreenAvailWidth,
    UserAgent,
    VrOverlayKey,
}

impl WindowParam {
    /// Every parameter, in the order front ends list them
    pub const ALL: [WindowParam; 19] = [
        WindowParam::Modal,
        WindowParam::Pinned,
        WindowParam::BrowserType,
        WindowParam::VrOverlayKey,
        WindowParam::CreateFlags,
        WindowParam::Browser,
        WindowParam::BrowserViewPopup,
        WindowParam::CenterOnBrowserId,
        WindowParam::HwndParent,
        WindowParam::MinHeight,
        WindowParam::MinWidth,
        WindowParam::OpenerId,
        WindowParam::ParentContainerPopupId,
        WindowParam::ParentPopup,
        WindowParam::RequestId,
        WindowParam::ScreenAvailWidth,
        WindowParam::ScreenAvailHeight,
        WindowParam::RestoreDetails,
        WindowParam::UserAgent,
    ];

    /// The wire identifier of this parameter
    pub fn as_str(self) -> &'static str {
        match self {
            WindowParam::Browser => "browser",
            WindowParam::BrowserType => "browserType",
            WindowParam::BrowserViewPopup => "browserviewpopup",
            WindowParam::CenterOnBrowserId => "centerOnBrowserID",
            WindowParam::CreateFlags => "createflags",
            WindowParam::HwndParent => "hwndParent",
            WindowParam::MinHeight => "minheight",
            WindowParam::MinWidth => "minwidth",
            WindowParam::Modal => "modal",
            WindowParam::OpenerId => "openerid",
            WindowParam::ParentContainerPopupId => "parentcontainerpopupid",
            WindowParam::ParentPopup => "parentpopup",
            WindowParam::Pinned => "pinned",
            WindowParam::RequestId => "requestid",
            WindowParam::RestoreDetails => "restoredetails",
            WindowParam::ScreenAvailHeight => "screenavailheight",
            WindowParam::ScreenAvailWidth => "screenavailwidth",
            WindowParam::UserAgent => "useragent",
            WindowParam::VrOverlayKey => "vrOverlayKey",
        }
    }

    /// The value domain of this parameter. Fixed for the lifetime of the
    /// program.
    pub fn domain(self) -> ParamDomain {
        match self {
            WindowParam::Modal | WindowParam::Pinned => ParamDomain::Boolean,
            WindowParam::BrowserType | WindowParam::VrOverlayKey => ParamDomain::Enum,
            WindowParam::CreateFlags => ParamDomain::Flags,
            WindowParam::RestoreDetails | WindowParam::UserAgent => ParamDomain::String,
            WindowParam::Browser
            | WindowParam::BrowserViewPopup
            | WindowParam::CenterOnBrowserId
            | WindowParam::HwndParent
            | WindowParam::MinHeight
            | WindowParam::MinWidth
            | WindowParam::OpenerId
            | WindowParam::ParentContainerPopupId
            | WindowParam::ParentPopup
            | WindowParam::RequestId
            | WindowParam::ScreenAvailHeight
            | WindowParam::ScreenAvailWidth => ParamDomain::Number,
        }
    }
}

impl fmt::Display for WindowParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowParam {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        WindowParam::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::UnknownParam(s.to_string()))
    }
}

/// Value domain of a window parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamDomain {
    Boolean,
    Enum,
    Flags,
    Number,
    String,
}

impl fmt::Display for ParamDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamDomain::Boolean => "boolean",
            ParamDomain::Enum => "enum",
            ParamDomain::Flags => "flags",
            ParamDomain::Number => "number",
            ParamDomain::String => "string",
        };
        f.write_str(name)
    }
}

/// A persisted parameter value
///
/// Values are stored the way the settings panel wrote them: text fields and
/// dropdowns store strings, toggles store booleans and flag toggles store
/// the list of selected bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    Flags(Vec<u32>),
}

impl StoredValue {
    /// Plain string form, as a JavaScript host would stringify the value
    pub fn to_plain_string(&self) -> String {
        match self {
            StoredValue::Bool(b) => b.to_string(),
            StoredValue::Integer(n) => n.to_string(),
            StoredValue::Text(s) => s.clone(),
            StoredValue::Flags(bits) => bits
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Numeric code carried by the value, if any
    pub fn as_code(&self) -> Option<i64> {
        match self {
            StoredValue::Integer(n) => Some(*n),
            StoredValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_flags(&self) -> Option<&[u32]> {
        match self {
            StoredValue::Flags(bits) => Some(bits),
            _ => None,
        }
    }
}

impl From<&str> for StoredValue {
    fn from(s: &str) -> Self {
        StoredValue::Text(s.to_string())
    }
}

impl From<String> for StoredValue {
    fn from(s: String) -> Self {
        StoredValue::Text(s)
    }
}

impl From<bool> for StoredValue {
    fn from(b: bool) -> Self {
        StoredValue::Bool(b)
    }
}

impl From<Vec<u32>> for StoredValue {
    fn from(bits: Vec<u32>) -> Self {
        StoredValue::Flags(bits)
    }
}

/// Insertion-ordered string-keyed map with JavaScript object semantics
///
/// Overwriting a key keeps its original position, removing it drops the
/// slot. Serializes as a JSON object.
///
/// Deserialization is lenient: an entry whose value does not fit `V` is
/// skipped with a warning, and `null` or any non-object reads as empty. One
/// odd entry never costs the rest of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or overwrite `key`, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<V> OrderedMapVisitor<V> {
    fn not_an_object<E>(self, found: impl fmt::Debug) -> std::result::Result<OrderedMap<V>, E> {
        warn!("Expected an object, found {:?}; reading it as empty", found);
        Ok(OrderedMap::new())
    }
}

impl<'de, V: DeserializeOwned> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut access: A,
    ) -> std::result::Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((k, raw)) = access.next_entry::<String, serde_json::Value>()? {
            match V::deserialize(&raw) {
                Ok(v) => {
                    map.insert(k, v);
                }
                Err(e) => warn!("Skipping entry '{}' = {}: {}", k, raw, e),
            }
        }
        Ok(map)
    }

    fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_none<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> std::result::Result<Self::Value, E> {
        self.not_an_object(v)
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
        self.not_an_object(v)
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
        self.not_an_object(v)
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> std::result::Result<Self::Value, E> {
        self.not_an_object(v)
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
        self.not_an_object(v)
    }

    fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut access: A,
    ) -> std::result::Result<Self::Value, A::Error> {
        while access.next_element::<IgnoredAny>()?.is_some() {}
        self.not_an_object("array")
    }
}

impl<'de, V: DeserializeOwned> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(OrderedMapVisitor(PhantomData))
    }
}

/// Sub-document of the settings document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsField {
    /// Boolean feature toggles
    Options,
    /// Raw (advanced) parameter overrides
    Params,
    /// Curated parameter overrides written by presets
    SimpleParams,
}

impl SettingsField {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingsField::Options => "options",
            SettingsField::Params => "params",
            SettingsField::SimpleParams => "simpleParams",
        }
    }
}

impl fmt::Display for SettingsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted settings document
///
/// Missing sub-documents deserialize as empty, so a blob written by an
/// older version that only had `params` still loads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    #[serde(default)]
    pub options: OrderedMap<bool>,
    #[serde(default)]
    pub params: OrderedMap<StoredValue>,
    #[serde(default)]
    pub simple_params: OrderedMap<StoredValue>,
}

impl SettingsDocument {
    /// Parameter sub-map for `field`, `None` for [`SettingsField::Options`]
    pub fn param_map(&self, field: SettingsField) -> Option<&OrderedMap<StoredValue>> {
        match field {
            SettingsField::Options => None,
            SettingsField::Params => Some(&self.params),
            SettingsField::SimpleParams => Some(&self.simple_params),
        }
    }

    /// Whether boolean option `name` is enabled. Absent means disabled.
    pub fn option(&self, name: &str) -> bool {
        self.options.get(name).copied().unwrap_or(false)
    }

    /// Set `key` in `field`. Options only accept boolean values.
    pub fn set(&mut self, field: SettingsField, key: &str, value: StoredValue) -> Result<()> {
        match field {
            SettingsField::Options => match value {
                StoredValue::Bool(b) => {
                    self.options.insert(key, b);
                }
                other => {
                    return Err(Error::InvalidValue {
                        param: key.to_string(),
                        message: format!("options only hold booleans, got {:?}", other),
                    })
                }
            },
            SettingsField::Params => {
                self.params.insert(key, value);
            }
            SettingsField::SimpleParams => {
                self.simple_params.insert(key, value);
            }
        }
        Ok(())
    }

    /// Remove `key` from `field`, returning whether it was present
    pub fn remove(&mut self, field: SettingsField, key: &str) -> bool {
        match field {
            SettingsField::Options => self.options.remove(key).is_some(),
            SettingsField::Params => self.params.remove(key).is_some(),
            SettingsField::SimpleParams => self.simple_params.remove(key).is_some(),
        }
    }
}

/// Effective (parameter, value) pairs to apply to a window, in application
/// order
pub type EffectiveParams = Vec<(WindowParam, StoredValue)>;
