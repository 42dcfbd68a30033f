//! Settings store
//!
//! Owns the persisted [`SettingsDocument`]. Every mutation is a full
//! read-modify-write of the document followed by one backend write, so the
//! backend never holds a partially applied change. There is no locking:
//! concurrent writers race and the last whole-document write wins.

use crate::backend::SettingsBackend;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::types::{SettingsDocument, SettingsField, StoredValue, WindowParam};
use log::{debug, warn};
use std::rc::Rc;

/// Storage key used when none is configured
pub const DEFAULT_SETTINGS_KEY: &str = "ChangeWindowParams_Settings";

/// Read/write access to the settings document
///
/// Cloning is cheap; clones share the backend.
#[derive(Clone)]
pub struct SettingsStore {
    backend: Rc<dyn SettingsBackend>,
    key: String,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Store using [`DEFAULT_SETTINGS_KEY`]
    pub fn new(backend: Rc<dyn SettingsBackend>) -> Self {
        Self::with_key(backend, DEFAULT_SETTINGS_KEY)
    }

    pub fn with_key(backend: Rc<dyn SettingsBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the current document
    ///
    /// Missing, unreadable and malformed documents all yield the default
    /// empty document, which is not written back.
    pub async fn get(&self) -> SettingsDocument {
        let raw = match self.backend.load(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return SettingsDocument::default(),
            Err(e) => {
                warn!("Failed to read settings '{}', using defaults: {}", self.key, e);
                return SettingsDocument::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(document) => document,
            Err(e) => {
                warn!("Malformed settings '{}', using defaults: {}", self.key, e);
                SettingsDocument::default()
            }
        }
    }

    /// Set `key` in `field` and persist the whole document
    pub async fn set_key(
        &self,
        field: SettingsField,
        key: &str,
        value: impl Into<StoredValue>,
    ) -> Result<()> {
        let value = value.into();
        let mut document = self.get().await;
        debug!("Setting {}.{} to {:?}", field, key, value);
        document.set(field, key, value)?;
        self.write(&document).await
    }

    /// Remove `key` from `field` and persist the document. Removing an
    /// absent key does nothing.
    pub async fn remove_key(&self, field: SettingsField, key: &str) -> Result<()> {
        let mut document = self.get().await;
        if !document.remove(field, key) {
            debug!("{}.{} is not set, nothing to remove", field, key);
            return Ok(());
        }
        debug!("Removed {}.{}", field, key);
        self.write(&document).await
    }

    /// Apply several edits with a single backend write
    ///
    /// `edit` returns whether it changed anything; nothing is written when
    /// it did not, or when it fails.
    pub async fn update<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut SettingsDocument) -> Result<bool>,
    {
        let mut document = self.get().await;
        if edit(&mut document)? {
            self.write(&document).await
        } else {
            Ok(())
        }
    }

    /// Delete the persisted document. The next [`get`](Self::get) returns
    /// defaults.
    pub async fn reset(&self) -> Result<()> {
        debug!("Deleting settings '{}'", self.key);
        self.backend.delete(&self.key).await
    }

    /// Enable or disable a boolean option. Disabled options are removed
    /// rather than stored as `false`.
    pub async fn set_option(&self, name: &str, enabled: bool) -> Result<()> {
        if enabled {
            self.set_key(SettingsField::Options, name, true).await
        } else {
            self.remove_key(SettingsField::Options, name).await
        }
    }

    /// Add or remove one member of a Flags parameter
    ///
    /// The current member list is rebuilt from the stored value, so toggling
    /// one member never drops the others. Returns the list as persisted.
    pub async fn set_flag(
        &self,
        catalog: &Catalog,
        field: SettingsField,
        param: WindowParam,
        bit: u32,
        enabled: bool,
    ) -> Result<Vec<u32>> {
        if field == SettingsField::Options {
            return Err(Error::InvalidValue {
                param: param.to_string(),
                message: "flags cannot be stored in options".to_string(),
            });
        }
        let table = catalog
            .flag_members(param)
            .ok_or_else(|| Error::InvalidValue {
                param: param.to_string(),
                message: format!("{} parameters have no flags", param.domain()),
            })?;
        if !table.contains_code(bit) {
            return Err(Error::UnknownMember {
                param: param.to_string(),
                member: bit.to_string(),
            });
        }

        let mut document = self.get().await;
        let mut bits = match document.param_map(field).and_then(|map| map.get(param.as_str())) {
            Some(StoredValue::Flags(bits)) => bits.clone(),
            // A bare bitmask; toggle within the members it covers.
            Some(other) => other
                .as_code()
                .and_then(|mask| u32::try_from(mask).ok())
                .map(|mask| table.split_mask(mask))
                .unwrap_or_default(),
            None => Vec::new(),
        };

        if enabled {
            if !bits.contains(&bit) {
                bits.push(bit);
            }
        } else {
            bits.retain(|b| *b != bit);
        }

        debug!("{}.{} => {:?}", field, param, bits);
        document.set(field, param.as_str(), StoredValue::Flags(bits.clone()))?;
        self.write(&document).await?;
        Ok(bits)
    }

    /// Validate `value` against `param`'s domain, then store it
    pub async fn set_param(
        &self,
        catalog: &Catalog,
        field: SettingsField,
        param: WindowParam,
        value: StoredValue,
    ) -> Result<()> {
        if field == SettingsField::Options {
            return Err(Error::InvalidValue {
                param: param.to_string(),
                message: "parameters cannot be stored in options".to_string(),
            });
        }
        catalog.validate(param, &value)?;
        self.set_key(field, param.as_str(), value).await
    }

    async fn write(&self, document: &SettingsDocument) -> Result<()> {
        let raw = serde_json::to_string(document)?;
        self.backend.save(&self.key, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendFuture, MemoryBackend};
    use futures::executor::block_on;

    fn catalog() -> Catalog {
        Catalog::builder()
            .builtin_tables()
            .vr_overlay_keys(["valve.steam.gamepadui.main"])
            .build()
            .unwrap()
    }

    fn memory_store() -> (MemoryBackend, SettingsStore) {
        let backend = MemoryBackend::new();
        let store = SettingsStore::new(Rc::new(backend.clone()));
        (backend, store)
    }

    /// Backend whose every call fails, like unavailable host storage
    struct BrokenBackend;

    impl SettingsBackend for BrokenBackend {
        fn load<'a>(&'a self, _key: &'a str) -> BackendFuture<'a, Result<Option<String>>> {
            Box::pin(async { Err(Error::Backend("storage unavailable".to_string())) })
        }

        fn save<'a>(&'a self, _key: &'a str, _raw: &'a str) -> BackendFuture<'a, Result<()>> {
            Box::pin(async { Err(Error::Backend("storage unavailable".to_string())) })
        }

        fn delete<'a>(&'a self, _key: &'a str) -> BackendFuture<'a, Result<()>> {
            Box::pin(async { Err(Error::Backend("storage unavailable".to_string())) })
        }
    }

    #[test]
    fn test_get_defaults_when_absent() {
        let (backend, store) = memory_store();
        let document = block_on(store.get());
        assert_eq!(document, SettingsDocument::default());
        assert_eq!(backend.raw(DEFAULT_SETTINGS_KEY), None);
    }

    #[test]
    fn test_get_defaults_when_malformed() {
        let (backend, store) = memory_store();
        backend.insert_raw(DEFAULT_SETTINGS_KEY, "{\"params\": [not json");
        assert_eq!(block_on(store.get()), SettingsDocument::default());

        backend.insert_raw(DEFAULT_SETTINGS_KEY, "[1, 2]");
        assert_eq!(block_on(store.get()), SettingsDocument::default());
    }

    #[test]
    fn test_odd_entry_does_not_wipe_document_on_write() {
        let (backend, store) = memory_store();
        backend.insert_raw(
            DEFAULT_SETTINGS_KEY,
            r#"{"options":{"ExcludeMenus":true},"params":{"minheight":"100","modal":null}}"#,
        );

        block_on(store.set_key(SettingsField::Params, "minwidth", "0")).unwrap();
        let document = block_on(store.get());
        assert!(document.option("ExcludeMenus"));
        assert_eq!(
            document.params.get("minheight"),
            Some(&StoredValue::Text("100".to_string()))
        );
        assert_eq!(
            document.params.get("minwidth"),
            Some(&StoredValue::Text("0".to_string()))
        );
    }

    #[test]
    fn test_update_writes_once() {
        let (backend, store) = memory_store();
        block_on(store.update(|document| {
            document.set(SettingsField::SimpleParams, "minheight", "0".into())?;
            document.set(SettingsField::SimpleParams, "minwidth", "0".into())?;
            Ok(true)
        }))
        .unwrap();
        assert_eq!(block_on(store.get()).simple_params.len(), 2);

        backend.insert_raw(DEFAULT_SETTINGS_KEY, "{}");
        let result = block_on(store.update(|document| {
            document.set(SettingsField::Params, "minheight", "0".into())?;
            document.set(SettingsField::Options, "ExcludeMenus", "yes".into())?;
            Ok(true)
        }));
        assert!(result.is_err());
        assert_eq!(backend.raw(DEFAULT_SETTINGS_KEY).as_deref(), Some("{}"));
    }

    #[test]
    fn test_get_defaults_when_backend_fails() {
        let store = SettingsStore::new(Rc::new(BrokenBackend));
        assert_eq!(block_on(store.get()), SettingsDocument::default());
    }

    #[test]
    fn test_write_failure_propagates() {
        let store = SettingsStore::new(Rc::new(BrokenBackend));
        let result = block_on(store.set_key(SettingsField::Params, "minheight", "100"));
        assert!(matches!(result, Err(Error::Backend(_))));
        assert!(block_on(store.reset()).is_err());
    }

    #[test]
    fn test_set_then_remove() {
        let (_, store) = memory_store();
        block_on(store.set_key(SettingsField::Params, "minheight", "100")).unwrap();

        let document = block_on(store.get());
        assert_eq!(document.params.len(), 1);
        assert_eq!(
            document.params.get("minheight"),
            Some(&StoredValue::Text("100".to_string()))
        );

        block_on(store.remove_key(SettingsField::Params, "minheight")).unwrap();
        assert!(!block_on(store.get()).params.contains_key("minheight"));
    }

    #[test]
    fn test_remove_absent_key_does_not_write() {
        let (backend, store) = memory_store();
        block_on(store.remove_key(SettingsField::SimpleParams, "minwidth")).unwrap();
        assert_eq!(backend.raw(DEFAULT_SETTINGS_KEY), None);
    }

    #[test]
    fn test_reset_twice() {
        let (backend, store) = memory_store();
        block_on(store.set_key(SettingsField::Params, "pinned", true)).unwrap();
        block_on(store.reset()).unwrap();
        assert_eq!(backend.raw(DEFAULT_SETTINGS_KEY), None);
        assert_eq!(block_on(store.get()), SettingsDocument::default());
        block_on(store.reset()).unwrap();
        assert_eq!(block_on(store.get()), SettingsDocument::default());
    }

    #[test]
    fn test_set_option() {
        let (_, store) = memory_store();
        block_on(store.set_option("ExcludeMenus", true)).unwrap();
        assert!(block_on(store.get()).option("ExcludeMenus"));
        block_on(store.set_option("ExcludeMenus", false)).unwrap();
        assert!(!block_on(store.get()).options.contains_key("ExcludeMenus"));
    }

    #[test]
    fn test_set_flag_keeps_other_members() {
        let (_, store) = memory_store();
        let catalog = catalog();
        let field = SettingsField::Params;
        let param = WindowParam::CreateFlags;

        block_on(store.set_flag(&catalog, field, param, 1, true)).unwrap();
        block_on(store.set_flag(&catalog, field, param, 8, true)).unwrap();
        let bits = block_on(store.set_flag(&catalog, field, param, 1, true)).unwrap();
        assert_eq!(bits, vec![1, 8]);

        let bits = block_on(store.set_flag(&catalog, field, param, 1, false)).unwrap();
        assert_eq!(bits, vec![8]);
        assert_eq!(
            block_on(store.get()).params.get("createflags"),
            Some(&StoredValue::Flags(vec![8]))
        );
    }

    #[test]
    fn test_set_flag_splits_bare_mask() {
        let (_, store) = memory_store();
        let catalog = catalog();
        block_on(store.set_key(SettingsField::Params, "createflags", "272")).unwrap();

        let bits = block_on(store.set_flag(
            &catalog,
            SettingsField::Params,
            WindowParam::CreateFlags,
            8,
            true,
        ))
        .unwrap();
        assert_eq!(bits, vec![16, 256, 8]);

        let bits = block_on(store.set_flag(
            &catalog,
            SettingsField::Params,
            WindowParam::CreateFlags,
            16,
            false,
        ))
        .unwrap();
        assert_eq!(bits, vec![256, 8]);
    }

    #[test]
    fn test_set_flag_rejects_unknown_bits_and_params() {
        let (_, store) = memory_store();
        let catalog = catalog();
        assert!(block_on(store.set_flag(
            &catalog,
            SettingsField::Params,
            WindowParam::CreateFlags,
            3,
            true
        ))
        .is_err());
        assert!(block_on(store.set_flag(
            &catalog,
            SettingsField::Params,
            WindowParam::MinHeight,
            1,
            true
        ))
        .is_err());
    }

    #[test]
    fn test_set_param_validates() {
        let (_, store) = memory_store();
        let catalog = catalog();
        assert!(block_on(store.set_param(
            &catalog,
            SettingsField::Params,
            WindowParam::MinHeight,
            "tall".into()
        ))
        .is_err());
        block_on(store.set_param(
            &catalog,
            SettingsField::Params,
            WindowParam::MinHeight,
            "0".into(),
        ))
        .unwrap();
        assert_eq!(block_on(store.get()).params.len(), 1);
    }
}
