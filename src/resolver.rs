//! Effective parameter resolution
//!
//! Curated and raw parameters are two separate modes. As soon as one curated
//! preset has written into `simpleParams`, that sub-map is the whole answer
//! and every raw override in `params` is ignored. The two maps are never
//! merged key by key.

use crate::store::SettingsStore;
use crate::types::{EffectiveParams, OrderedMap, SettingsDocument, StoredValue, WindowParam};
use log::warn;

/// Which sub-map a document resolves from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    /// `simpleParams` has at least one entry
    Simple,
    /// `simpleParams` is empty, `params` applies
    Raw,
}

impl ParamMode {
    pub fn of(document: &SettingsDocument) -> Self {
        if document.simple_params.is_empty() {
            ParamMode::Raw
        } else {
            ParamMode::Simple
        }
    }
}

/// Compute the effective parameters of `document`
///
/// Entries keep their persisted order. Keys that are not window parameters
/// are skipped.
///
/// # Example
///
/// ```rust
/// use winparams::{effective_params, SettingsDocument, StoredValue, WindowParam};
///
/// let document: SettingsDocument = serde_json::from_str(
///     r#"{"params": {"minheight": "100"}, "simpleParams": {}}"#,
/// )?;
///
/// assert_eq!(
///     effective_params(&document),
///     vec![(WindowParam::MinHeight, StoredValue::Text("100".to_string()))]
/// );
/// # Ok::<(), serde_json::Error>(())
/// ```
pub fn effective_params(document: &SettingsDocument) -> EffectiveParams {
    let source = match ParamMode::of(document) {
        ParamMode::Simple => &document.simple_params,
        ParamMode::Raw => &document.params,
    };
    collect_known(source)
}

fn collect_known(source: &OrderedMap<StoredValue>) -> EffectiveParams {
    source
        .iter()
        .filter_map(|(key, value)| match key.parse::<WindowParam>() {
            Ok(param) => Some((param, value.clone())),
            Err(_) => {
                warn!("Ignoring unknown window parameter '{}'", key);
                None
            }
        })
        .collect()
}

/// Read the current settings and resolve them
///
/// Nothing is cached; every call reflects the latest stored document.
pub async fn resolve(store: &SettingsStore) -> EffectiveParams {
    effective_params(&store.get().await)
}
