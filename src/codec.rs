//! Value codec
//!
//! Stored values travel in two formats. Window creation receives them as URL
//! query values, where a flag set is a single OR-combined bitmask. Created
//! popups receive them as attributes on their root element, where enum codes
//! and flag bits are spelled out as member names so stylesheets can match
//! them.
//!
//! Translation never fails. A code or bit missing from the member table is
//! logged and left out, because one stale value must not stop a window from
//! opening.

use crate::catalog::{Catalog, MemberTable};
use crate::types::{EffectiveParams, StoredValue, WindowParam};
use log::warn;
use percent_encoding::percent_decode_str;

/// Translates stored values using a catalog's member tables
#[derive(Debug, Clone, Copy)]
pub struct Codec<'a> {
    catalog: &'a Catalog,
}

impl<'a> Codec<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Query string form of `value`
    ///
    /// # Example
    ///
    /// ```rust
    /// use winparams::{Catalog, Codec, StoredValue, WindowParam};
    ///
    /// let catalog = Catalog::builder().builtin_tables().vr_overlay_keys(["main"]).build()?;
    /// let codec = Codec::new(&catalog);
    ///
    /// let flags = StoredValue::Flags(vec![1, 2, 8]);
    /// assert_eq!(codec.to_query_value(WindowParam::CreateFlags, &flags), "11");
    ///
    /// let geometry = StoredValue::Text("1%26x%3D604".to_string());
    /// assert_eq!(codec.to_query_value(WindowParam::RestoreDetails, &geometry), "1&x=604");
    /// # Ok::<(), winparams::Error>(())
    /// ```
    pub fn to_query_value(&self, param: WindowParam, value: &StoredValue) -> String {
        match (param, value) {
            (_, StoredValue::Flags(bits)) => {
                bits.iter().fold(0u32, |acc, bit| acc | bit).to_string()
            }
            (WindowParam::RestoreDetails, StoredValue::Text(s)) => decode_restore_details(s),
            _ => match self
                .catalog
                .enum_members(param)
                .filter(|table| table.is_keyed_by_name())
            {
                // Name-keyed members travel as the name, never the position.
                Some(table) => table
                    .resolve(value)
                    .and_then(|code| table.name_of(code))
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_plain_string()),
                None => value.to_plain_string(),
            },
        }
    }

    /// Attribute string form of `value`
    pub fn to_attribute_value(&self, param: WindowParam, value: &StoredValue) -> String {
        if let Some(table) = self.catalog.enum_members(param) {
            return enum_member_name(param, table, value);
        }
        if let Some(table) = self.catalog.flag_members(param) {
            return flag_member_names(param, table, value);
        }
        value.to_plain_string()
    }

    /// `(query key, query value)` for every effective parameter
    pub fn query_pairs(&self, params: &EffectiveParams) -> Vec<(&'static str, String)> {
        params
            .iter()
            .map(|(param, value)| (param.as_str(), self.to_query_value(*param, value)))
            .collect()
    }

    /// `(attribute name, attribute value)` for every effective parameter
    pub fn attribute_pairs(&self, params: &EffectiveParams) -> Vec<(&'static str, String)> {
        params
            .iter()
            .map(|(param, value)| (param.as_str(), self.to_attribute_value(*param, value)))
            .collect()
    }
}

/// The restore geometry is stored percent-encoded for another context
fn decode_restore_details(s: &str) -> String {
    match percent_decode_str(s).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!("restoredetails is not valid UTF-8 once decoded, passing through: {}", e);
            s.to_string()
        }
    }
}

fn enum_member_name(param: WindowParam, table: &MemberTable, value: &StoredValue) -> String {
    let name = table.resolve(value).and_then(|code| table.name_of(code));

    match name {
        Some(name) => name.to_string(),
        None => {
            warn!("{} has no member for {:?}", param, value);
            String::new()
        }
    }
}

fn flag_member_names(param: WindowParam, table: &MemberTable, value: &StoredValue) -> String {
    let bits: Vec<u32> = match value {
        StoredValue::Flags(bits) => bits.clone(),
        // A bare bitmask; split it into the members it covers.
        other => match other.as_code().and_then(|c| u32::try_from(c).ok()) {
            Some(mask) => split_mask(param, table, mask),
            None => {
                warn!("{} expects flags, got {:?}", param, value);
                return String::new();
            }
        },
    };

    bits.iter()
        .filter_map(|bit| {
            let name = table.name_of(*bit);
            if name.is_none() {
                warn!("{} has no member for bit {}", param, bit);
            }
            name
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_mask(param: WindowParam, table: &MemberTable, mask: u32) -> Vec<u32> {
    let members = table.split_mask(mask);
    let covered = members.iter().fold(0, |acc, bit| acc | bit);
    if covered != mask {
        warn!("{} has no members for bits {:#x}", param, mask & !covered);
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::builder()
            .builtin_tables()
            .vr_overlay_keys(["valve.steam.gamepadui.main", "valve.steam.desktop"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_query_value_flags_are_or_combined() {
        let catalog = catalog();
        let codec = Codec::new(&catalog);
        assert_eq!(
            codec.to_query_value(WindowParam::CreateFlags, &StoredValue::Flags(vec![1, 2, 8])),
            "11"
        );
        assert_eq!(
            codec.to_query_value(
                WindowParam::CreateFlags,
                &StoredValue::Flags(vec![16, 256, 4194304])
            ),
            "4194576"
        );
        assert_eq!(
            codec.to_query_value(WindowParam::CreateFlags, &StoredValue::Flags(Vec::new())),
            "0"
        );
    }

    #[test]
    fn test_query_value_scalars_pass_through() {
        let catalog = catalog();
        let codec = Codec::new(&catalog);
        assert_eq!(
            codec.to_query_value(WindowParam::MinHeight, &"100".into()),
            "100"
        );
        assert_eq!(codec.to_query_value(WindowParam::Modal, &true.into()), "true");
        assert_eq!(
            codec.to_query_value(WindowParam::BrowserType, &StoredValue::Integer(3)),
            "3"
        );
        // Only the restore geometry is decoded
        assert_eq!(
            codec.to_query_value(WindowParam::UserAgent, &"a%20b".into()),
            "a%20b"
        );
    }

    #[test]
    fn test_query_value_restore_details_decoded() {
        let catalog = catalog();
        let codec = Codec::new(&catalog);
        assert_eq!(
            codec.to_query_value(WindowParam::RestoreDetails, &"1%26x%3D604".into()),
            "1&x=604"
        );
        assert_eq!(
            codec.to_query_value(WindowParam::RestoreDetails, &"100%".into()),
            "100%"
        );
    }

    #[test]
    fn test_overlay_key_sent_as_key_string() {
        let catalog = catalog();
        let codec = Codec::new(&catalog);
        let stored = catalog
            .parse_value(WindowParam::VrOverlayKey, "valve.steam.desktop")
            .unwrap();
        assert_eq!(
            codec.to_query_value(WindowParam::VrOverlayKey, &stored),
            "valve.steam.desktop"
        );
        assert_eq!(
            codec.to_attribute_value(WindowParam::VrOverlayKey, &stored),
            "valve.steam.desktop"
        );
        // Position codes written by older versions still map to the key
        assert_eq!(
            codec.to_query_value(WindowParam::VrOverlayKey, &"1".into()),
            "valve.steam.desktop"
        );
        // Browser types stay numeric on the wire
        assert_eq!(
            codec.to_query_value(WindowParam::BrowserType, &"3".into()),
            "3"
        );
    }

    #[test]
    fn test_attribute_value_enum_names() {
        let catalog = catalog();
        let codec = Codec::new(&catalog);
        assert_eq!(
            codec.to_attribute_value(WindowParam::BrowserType, &"3".into()),
            "DirectHWND"
        );
        assert_eq!(
            codec.to_attribute_value(WindowParam::VrOverlayKey, &StoredValue::Integer(1)),
            "valve.steam.desktop"
        );
        assert_eq!(
            codec.to_attribute_value(WindowParam::BrowserType, &"42".into()),
            ""
        );
        assert_eq!(
            codec.to_attribute_value(WindowParam::BrowserType, &"-1".into()),
            ""
        );
        assert_eq!(
            codec.to_attribute_value(WindowParam::BrowserType, &StoredValue::Flags(vec![1])),
            ""
        );
    }

    #[test]
    fn test_attribute_value_flag_names() {
        let catalog = catalog();
        let codec = Codec::new(&catalog);
        assert_eq!(
            codec.to_attribute_value(WindowParam::CreateFlags, &StoredValue::Flags(vec![1, 2, 8])),
            "Minimized Hidden NoTaskbarIcon"
        );
        assert_eq!(
            codec.to_attribute_value(
                WindowParam::CreateFlags,
                &StoredValue::Flags(vec![16, 3, 256])
            ),
            "Resizable Composited"
        );
        assert_eq!(
            codec.to_attribute_value(WindowParam::CreateFlags, &"272".into()),
            "Resizable Composited"
        );
        assert_eq!(
            codec.to_attribute_value(WindowParam::CreateFlags, &"wide".into()),
            ""
        );
    }

    #[test]
    fn test_attribute_value_other_params_pass_through() {
        let catalog = catalog();
        let codec = Codec::new(&catalog);
        assert_eq!(
            codec.to_attribute_value(WindowParam::RestoreDetails, &"1%26x%3D604".into()),
            "1%26x%3D604"
        );
        assert_eq!(codec.to_attribute_value(WindowParam::Pinned, &false.into()), "false");
    }

    #[test]
    fn test_pairs_follow_effective_order() {
        let catalog = catalog();
        let codec = Codec::new(&catalog);
        let params = vec![
            (WindowParam::BrowserType, StoredValue::from("3")),
            (WindowParam::CreateFlags, StoredValue::Flags(vec![16, 256])),
        ];
        assert_eq!(
            codec.query_pairs(&params),
            vec![
                ("browserType", "3".to_string()),
                ("createflags", "272".to_string())
            ]
        );
        assert_eq!(
            codec.attribute_pairs(&params),
            vec![
                ("browserType", "DirectHWND".to_string()),
                ("createflags", "Resizable Composited".to_string())
            ]
        );
    }
}
