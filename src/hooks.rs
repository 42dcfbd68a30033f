//! Application hooks
//!
//! Two integration points apply the effective parameters:
//!
//! - [`WindowOpenHook`] decorates the host's window-open primitive and adds
//!   one query parameter per effective parameter to the target URL before
//!   delegating.
//! - [`PopupHook`] handles the host's popup-created event and sets one
//!   attribute per effective parameter on the popup's root element.
//!
//! Both read the settings again on every call, so an edit made while other
//! windows are open applies to the next window without a restart.

use crate::catalog::Catalog;
use crate::codec::Codec;
use crate::error::Result;
use crate::presets::ExtensionOption;
use crate::resolver::effective_params;
use crate::store::SettingsStore;
use crate::types::SettingsDocument;
use futures::future::LocalBoxFuture;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use url::Url;

/// The host's window-open primitive
pub trait WindowOpener {
    fn open<'a>(
        &'a self,
        url: &'a str,
        target: &'a str,
        features: &'a str,
    ) -> LocalBoxFuture<'a, Result<()>>;
}

/// The place the host looks up its active window-open primitive
pub trait OpenerSlot {
    fn current(&self) -> Rc<dyn WindowOpener>;

    fn set(&self, opener: Rc<dyn WindowOpener>);
}

/// Root element of a created popup
pub trait PopupRoot {
    /// Popup name, as used for classification
    fn name(&self) -> String;

    fn set_attribute(&self, name: &str, value: &str);
}

/// Callback the host runs for every popup it creates
pub type PopupCallback = Rc<dyn Fn(Rc<dyn PopupRoot>) -> LocalBoxFuture<'static, ()>>;

/// The host's popup manager
pub trait PopupEvents {
    /// Popups that already exist
    fn existing_popups(&self) -> Vec<Rc<dyn PopupRoot>>;

    /// Run `callback` for each popup created from now on
    fn add_popup_created_callback(&self, callback: PopupCallback);
}

/// Kind of window a target name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowCategory {
    MainWindow,
    Menu,
    Notification,
    Overlay,
    Other,
}

impl WindowCategory {
    /// Whether an enabled option asks to leave this kind of window alone
    pub fn is_excluded(self, document: &SettingsDocument) -> bool {
        let option = match self {
            WindowCategory::Menu => ExtensionOption::ExcludeMenus,
            WindowCategory::Notification => ExtensionOption::ExcludeNotifications,
            WindowCategory::Overlay => ExtensionOption::ExcludeOverlay,
            WindowCategory::MainWindow | WindowCategory::Other => return false,
        };
        option.is_enabled(document)
    }
}

/// Target-name prefixes for each [`WindowCategory`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRules {
    pub main_window: Vec<String>,
    pub menus: Vec<String>,
    pub notifications: Vec<String>,
    pub overlay: Vec<String>,
}

impl Default for CategoryRules {
    fn default() -> Self {
        let owned = |prefixes: &[&str]| -> Vec<String> {
            prefixes.iter().map(|p| p.to_string()).collect()
        };
        Self {
            main_window: owned(&["SP Desktop_", "SP BPM_"]),
            menus: owned(&["contextmenu_", "PopupMenu_"]),
            notifications: owned(&["notificationtoasts_"]),
            overlay: owned(&["SP Overlay:", "overlay_"]),
        }
    }
}

impl CategoryRules {
    /// Classify a window by its target name. The first matching list wins.
    pub fn classify(&self, target: &str) -> WindowCategory {
        let matches =
            |prefixes: &[String]| prefixes.iter().any(|p| target.starts_with(p.as_str()));

        if matches(&self.main_window) {
            WindowCategory::MainWindow
        } else if matches(&self.menus) {
            WindowCategory::Menu
        } else if matches(&self.notifications) {
            WindowCategory::Notification
        } else if matches(&self.overlay) {
            WindowCategory::Overlay
        } else {
            WindowCategory::Other
        }
    }
}

/// Set query parameters on `url` the way `URLSearchParams.set` does
///
/// The first occurrence of a key gets the new value and later duplicates are
/// dropped; new keys are appended. Everything outside the query is kept.
/// Returns `None` when `url` does not parse.
///
/// # Example
///
/// ```rust
/// use winparams::rewrite_url;
///
/// let rewritten = rewrite_url(
///     "https://host.example/index.html?foo=1&minheight=5#top",
///     &[("minheight", "100".to_string()), ("createflags", "11".to_string())],
/// );
/// assert_eq!(
///     rewritten.as_deref(),
///     Some("https://host.example/index.html?foo=1&minheight=100&createflags=11#top")
/// );
/// ```
pub fn rewrite_url(url: &str, pairs: &[(&str, String)]) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    if pairs.is_empty() {
        return Some(url.to_string());
    }

    let mut query: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    for (key, value) in pairs {
        match query.iter().position(|(k, _)| k == key) {
            Some(first) => {
                query[first].1 = value.clone();
                let mut index = 0;
                query.retain(|(k, _)| {
                    let keep = index <= first || k != key;
                    index += 1;
                    keep
                });
            }
            None => query.push((key.to_string(), value.clone())),
        }
    }

    parsed.query_pairs_mut().clear().extend_pairs(query);
    Some(parsed.to_string())
}

/// Decorator around the host's window-open primitive
pub struct WindowOpenHook {
    original: Rc<dyn WindowOpener>,
    store: SettingsStore,
    catalog: Rc<Catalog>,
    rules: CategoryRules,
}

impl WindowOpenHook {
    pub fn new(
        original: Rc<dyn WindowOpener>,
        store: SettingsStore,
        catalog: Rc<Catalog>,
        rules: CategoryRules,
    ) -> Self {
        Self {
            original,
            store,
            catalog,
            rules,
        }
    }

    /// Wrap the primitive currently in `slot`
    ///
    /// The returned guard puts the original primitive back when it is
    /// uninstalled or dropped.
    pub fn install(
        slot: Rc<dyn OpenerSlot>,
        store: SettingsStore,
        catalog: Rc<Catalog>,
        rules: CategoryRules,
    ) -> InstalledOpenHook {
        let original = slot.current();
        let hook = Rc::new(Self::new(original.clone(), store, catalog, rules));
        slot.set(hook);
        debug!("Window-open hook installed");

        InstalledOpenHook {
            slot,
            original: Some(original),
        }
    }

    /// The URL a window-open call for `target` would pass on
    pub async fn rewrite(&self, url: &str, target: &str) -> String {
        let document = self.store.get().await;
        let category = self.rules.classify(target);
        if category.is_excluded(&document) {
            debug!("Not rewriting {:?} window '{}'", category, target);
            return url.to_string();
        }

        let params = effective_params(&document);
        let pairs = Codec::new(&self.catalog).query_pairs(&params);
        match rewrite_url(url, &pairs) {
            Some(rewritten) => rewritten,
            None => {
                warn!("Cannot parse window URL '{}', opening it unchanged", url);
                url.to_string()
            }
        }
    }
}

impl WindowOpener for WindowOpenHook {
    fn open<'a>(
        &'a self,
        url: &'a str,
        target: &'a str,
        features: &'a str,
    ) -> LocalBoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let rewritten = self.rewrite(url, target).await;
            debug!("window.open {:?}", (&rewritten, target, features));
            self.original.open(&rewritten, target, features).await
        })
    }
}

/// Guard returned by [`WindowOpenHook::install`]
pub struct InstalledOpenHook {
    slot: Rc<dyn OpenerSlot>,
    original: Option<Rc<dyn WindowOpener>>,
}

impl InstalledOpenHook {
    /// Restore the original window-open primitive
    pub fn uninstall(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if let Some(original) = self.original.take() {
            self.slot.set(original);
            debug!("Window-open hook removed");
        }
    }
}

impl Drop for InstalledOpenHook {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Handler for the host's popup-created event
pub struct PopupHook {
    store: SettingsStore,
    catalog: Rc<Catalog>,
    rules: CategoryRules,
}

impl PopupHook {
    pub fn new(store: SettingsStore, catalog: Rc<Catalog>, rules: CategoryRules) -> Self {
        Self {
            store,
            catalog,
            rules,
        }
    }

    /// Start handling popups
    ///
    /// Popups that were created before the hook existed are handled right
    /// away when the `ApplyMainWindowWorkaround` option is on. Returns how
    /// many of them received attributes; excluded popups do not count.
    pub async fn install(&self, existing: &[&dyn PopupRoot]) -> usize {
        let document = self.store.get().await;
        if !ExtensionOption::ApplyMainWindowWorkaround.is_enabled(&document) {
            return 0;
        }

        existing
            .iter()
            .map(|popup| self.apply(&document, *popup))
            .filter(|set| *set > 0)
            .count()
    }

    /// Handle the host's existing popups, then subscribe to new ones
    ///
    /// Existing popups follow the same rule as [`install`](Self::install).
    /// Returns how many of them were handled.
    pub async fn attach(self: Rc<Self>, events: &dyn PopupEvents) -> usize {
        let existing = events.existing_popups();
        let roots: Vec<&dyn PopupRoot> = existing.iter().map(|popup| &**popup).collect();
        let handled = self.install(&roots).await;

        let hook = Rc::clone(&self);
        let callback: PopupCallback =
            Rc::new(move |popup: Rc<dyn PopupRoot>| -> LocalBoxFuture<'static, ()> {
                let hook = Rc::clone(&hook);
                Box::pin(async move {
                    hook.on_popup_created(&*popup).await;
                })
            });
        events.add_popup_created_callback(callback);
        debug!("Popup hook attached, {} existing popups handled", handled);
        handled
    }

    /// Set the effective parameters as attributes of `popup`'s root element.
    /// Returns the number of attributes set.
    pub async fn on_popup_created(&self, popup: &dyn PopupRoot) -> usize {
        let document = self.store.get().await;
        self.apply(&document, popup)
    }

    fn apply(&self, document: &SettingsDocument, popup: &dyn PopupRoot) -> usize {
        let name = popup.name();
        let category = self.rules.classify(&name);
        if category.is_excluded(document) {
            debug!("Not touching {:?} popup '{}'", category, name);
            return 0;
        }

        let params = effective_params(document);
        let pairs = Codec::new(&self.catalog).attribute_pairs(&params);
        for (attribute, value) in &pairs {
            popup.set_attribute(attribute, value);
        }
        debug!("Set {} attributes on popup '{}'", pairs.len(), name);
        pairs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::types::SettingsField;
    use futures::executor::block_on;
    use std::cell::RefCell;

    fn catalog() -> Rc<Catalog> {
        Rc::new(
            Catalog::builder()
                .builtin_tables()
                .vr_overlay_keys(["valve.steam.gamepadui.main"])
                .build()
                .unwrap(),
        )
    }

    fn store() -> SettingsStore {
        SettingsStore::new(Rc::new(MemoryBackend::new()))
    }

    #[derive(Default)]
    struct RecordingOpener {
        calls: RefCell<Vec<(String, String, String)>>,
    }

    impl WindowOpener for RecordingOpener {
        fn open<'a>(
            &'a self,
            url: &'a str,
            target: &'a str,
            features: &'a str,
        ) -> LocalBoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.calls
                    .borrow_mut()
                    .push((url.to_string(), target.to_string(), features.to_string()));
                Ok(())
            })
        }
    }

    struct Slot {
        current: RefCell<Rc<dyn WindowOpener>>,
    }

    impl OpenerSlot for Slot {
        fn current(&self) -> Rc<dyn WindowOpener> {
            self.current.borrow().clone()
        }

        fn set(&self, opener: Rc<dyn WindowOpener>) {
            *self.current.borrow_mut() = opener;
        }
    }

    struct FakePopup {
        name: String,
        attributes: RefCell<Vec<(String, String)>>,
    }

    impl FakePopup {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                attributes: RefCell::new(Vec::new()),
            }
        }
    }

    impl PopupRoot for FakePopup {
        fn name(&self) -> String {
            self.name.clone()
        }

        fn set_attribute(&self, name: &str, value: &str) {
            self.attributes
                .borrow_mut()
                .push((name.to_string(), value.to_string()));
        }
    }

    #[test]
    fn test_rewrite_url_set_semantics() {
        let pairs = [("a", "9".to_string())];
        assert_eq!(
            rewrite_url("https://h.example/?a=1&b=2&a=3", &pairs).as_deref(),
            Some("https://h.example/?a=9&b=2")
        );
        assert_eq!(rewrite_url("not a url", &pairs), None);
        assert_eq!(
            rewrite_url("https://h.example/?x=%20", &[]).as_deref(),
            Some("https://h.example/?x=%20")
        );
    }

    #[test]
    fn test_classify() {
        let rules = CategoryRules::default();
        assert_eq!(rules.classify("SP Desktop_uid0"), WindowCategory::MainWindow);
        assert_eq!(rules.classify("contextmenu_12"), WindowCategory::Menu);
        assert_eq!(
            rules.classify("notificationtoasts_uid0"),
            WindowCategory::Notification
        );
        assert_eq!(rules.classify("SP Overlay: 440"), WindowCategory::Overlay);
        assert_eq!(rules.classify("previewwindow"), WindowCategory::Other);
    }

    #[test]
    fn test_open_hook_rewrites_and_delegates() {
        let store = store();
        block_on(store.set_key(SettingsField::Params, "minheight", "100")).unwrap();
        block_on(store.set_key(SettingsField::Params, "createflags", vec![1u32, 2, 8])).unwrap();

        let opener = Rc::new(RecordingOpener::default());
        let hook = WindowOpenHook::new(opener.clone(), store, catalog(), CategoryRules::default());
        block_on(hook.open("https://h.example/page?x=1", "previewwindow", "")).unwrap();

        let calls = opener.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            "https://h.example/page?x=1&minheight=100&createflags=11"
        );
        assert_eq!(calls[0].1, "previewwindow");
    }

    #[test]
    fn test_open_hook_rereads_settings_per_call() {
        let store = store();
        let opener = Rc::new(RecordingOpener::default());
        let hook = WindowOpenHook::new(
            opener.clone(),
            store.clone(),
            catalog(),
            CategoryRules::default(),
        );

        block_on(hook.open("https://h.example/", "w", "")).unwrap();
        block_on(store.set_key(SettingsField::Params, "minwidth", "0")).unwrap();
        block_on(hook.open("https://h.example/", "w", "")).unwrap();

        let calls = opener.calls.borrow();
        assert_eq!(calls[0].0, "https://h.example/");
        assert_eq!(calls[1].0, "https://h.example/?minwidth=0");
    }

    #[test]
    fn test_open_hook_respects_exclusions() {
        let store = store();
        block_on(store.set_key(SettingsField::Params, "minwidth", "0")).unwrap();
        block_on(store.set_option("ExcludeMenus", true)).unwrap();
        let hook = WindowOpenHook::new(
            Rc::new(RecordingOpener::default()),
            store,
            catalog(),
            CategoryRules::default(),
        );

        assert_eq!(
            block_on(hook.rewrite("https://h.example/", "contextmenu_3")),
            "https://h.example/"
        );
        assert_eq!(
            block_on(hook.rewrite("https://h.example/", "notificationtoasts_uid0")),
            "https://h.example/?minwidth=0"
        );
    }

    #[test]
    fn test_install_and_uninstall_restore_original() {
        let original = Rc::new(RecordingOpener::default());
        let original_dyn: Rc<dyn WindowOpener> = original.clone();
        let slot = Rc::new(Slot {
            current: RefCell::new(original_dyn),
        });
        let store = store();
        block_on(store.set_key(SettingsField::Params, "pinned", true)).unwrap();

        let guard =
            WindowOpenHook::install(slot.clone(), store, catalog(), CategoryRules::default());
        let active = slot.current();
        block_on(active.open("https://h.example/", "w", "")).unwrap();
        assert_eq!(original.calls.borrow()[0].0, "https://h.example/?pinned=true");

        guard.uninstall();
        let active = slot.current();
        block_on(active.open("https://h.example/", "w", "")).unwrap();
        assert_eq!(original.calls.borrow()[1].0, "https://h.example/");
    }

    #[test]
    fn test_popup_hook_sets_attributes() {
        let store = store();
        block_on(store.set_key(SettingsField::SimpleParams, "browserType", "3")).unwrap();
        block_on(store.set_key(
            SettingsField::SimpleParams,
            "createflags",
            vec![16u32, 256],
        ))
        .unwrap();
        let hook = PopupHook::new(store, catalog(), CategoryRules::default());

        let popup = FakePopup::new("previewwindow");
        assert_eq!(block_on(hook.on_popup_created(&popup)), 2);
        assert_eq!(
            *popup.attributes.borrow(),
            vec![
                ("browserType".to_string(), "DirectHWND".to_string()),
                ("createflags".to_string(), "Resizable Composited".to_string()),
            ]
        );
    }

    #[test]
    fn test_popup_hook_existing_popups_need_workaround_option() {
        let store = store();
        block_on(store.set_key(SettingsField::Params, "modal", true)).unwrap();
        let hook = PopupHook::new(store.clone(), catalog(), CategoryRules::default());

        let main = FakePopup::new("SP Desktop_uid0");
        let existing: [&dyn PopupRoot; 1] = [&main];
        assert_eq!(block_on(hook.install(&existing)), 0);
        assert!(main.attributes.borrow().is_empty());

        block_on(store.set_option("ApplyMainWindowWorkaround", true)).unwrap();
        assert_eq!(block_on(hook.install(&existing)), 1);
        assert_eq!(
            *main.attributes.borrow(),
            vec![("modal".to_string(), "true".to_string())]
        );
    }

    #[test]
    fn test_popup_hook_install_counts_only_handled_popups() {
        let store = store();
        block_on(store.set_key(SettingsField::Params, "modal", true)).unwrap();
        block_on(store.set_option("ApplyMainWindowWorkaround", true)).unwrap();
        block_on(store.set_option("ExcludeMenus", true)).unwrap();
        let hook = PopupHook::new(store, catalog(), CategoryRules::default());

        let main = FakePopup::new("SP Desktop_uid0");
        let menu = FakePopup::new("contextmenu_7");
        let existing: [&dyn PopupRoot; 2] = [&main, &menu];
        assert_eq!(block_on(hook.install(&existing)), 1);
        assert_eq!(main.attributes.borrow().len(), 1);
        assert!(menu.attributes.borrow().is_empty());
    }

    #[derive(Default)]
    struct FakePopupManager {
        existing: Vec<Rc<dyn PopupRoot>>,
        callbacks: RefCell<Vec<PopupCallback>>,
    }

    impl PopupEvents for FakePopupManager {
        fn existing_popups(&self) -> Vec<Rc<dyn PopupRoot>> {
            self.existing.clone()
        }

        fn add_popup_created_callback(&self, callback: PopupCallback) {
            self.callbacks.borrow_mut().push(callback);
        }
    }

    impl FakePopupManager {
        fn create(&self, popup: Rc<dyn PopupRoot>) {
            let callbacks: Vec<PopupCallback> = self.callbacks.borrow().clone();
            for callback in callbacks {
                block_on(callback(popup.clone()));
            }
        }
    }

    #[test]
    fn test_attach_handles_existing_and_created_popups() {
        let store = store();
        block_on(store.set_key(SettingsField::Params, "minwidth", "0")).unwrap();
        block_on(store.set_option("ApplyMainWindowWorkaround", true)).unwrap();

        let main = Rc::new(FakePopup::new("SP Desktop_uid0"));
        let main_dyn: Rc<dyn PopupRoot> = main.clone();
        let manager = FakePopupManager {
            existing: vec![main_dyn],
            ..Default::default()
        };

        let hook = Rc::new(PopupHook::new(
            store.clone(),
            catalog(),
            CategoryRules::default(),
        ));
        assert_eq!(block_on(hook.attach(&manager)), 1);
        assert_eq!(manager.callbacks.borrow().len(), 1);
        assert_eq!(
            *main.attributes.borrow(),
            vec![("minwidth".to_string(), "0".to_string())]
        );

        // Created later, after an edit
        block_on(store.set_key(SettingsField::Params, "minheight", "50")).unwrap();
        let preview = Rc::new(FakePopup::new("previewwindow"));
        manager.create(preview.clone());
        assert_eq!(
            *preview.attributes.borrow(),
            vec![
                ("minwidth".to_string(), "0".to_string()),
                ("minheight".to_string(), "50".to_string()),
            ]
        );
    }
}
