//! # winparams - Window Parameter Overrides
//!
//! This library stores user-chosen window-creation parameters for a
//! Chromium-based desktop shell and applies them whenever the shell opens a
//! window or creates a popup. It knows the recognized parameters and their
//! value domains, persists the user's choices as one JSON document, resolves
//! which choices are in effect, and translates them into the two forms the
//! host consumes: URL query parameters and popup root-element attributes.
//!
//! ## Features
//!
//! - Catalog of the 19 recognized window parameters and their domains
//! - Host-provided enum and flag member tables, checked at startup
//! - Settings document with `options`, `params` and `simpleParams`
//! - Curated presets that take precedence over raw parameters as a whole
//! - Query encoding (flags OR-combined, `restoredetails` percent-decoded)
//! - Attribute encoding (member names, space-separated flag names)
//! - Window-open decorator and popup-created handler with per-category
//!   exclusions
//! - In-memory and file-backed settings backends
//!
//! ## Quick Start
//!
//! ### Building the Catalog
//!
//! ```rust
//! use winparams::{Catalog, ParamDomain, WindowParam};
//!
//! let catalog = Catalog::builder()
//!     .builtin_tables()
//!     .vr_overlay_keys(["valve.steam.gamepadui.main"])
//!     .build()?;
//!
//! assert_eq!(catalog.domain(WindowParam::CreateFlags), ParamDomain::Flags);
//! let flags = catalog.flag_members(WindowParam::CreateFlags).unwrap();
//! assert_eq!(flags.code_of("Resizable"), Some(16));
//! # Ok::<(), winparams::Error>(())
//! ```
//!
//! ### Editing and Resolving Settings
//!
//! ```rust
//! use futures::executor::block_on;
//! use std::rc::Rc;
//! use winparams::{resolve, MemoryBackend, SettingsField, SettingsStore, StoredValue, WindowParam};
//!
//! let store = SettingsStore::new(Rc::new(MemoryBackend::new()));
//! block_on(store.set_key(SettingsField::Params, "minheight", "100"))?;
//! assert_eq!(
//!     block_on(resolve(&store)),
//!     vec![(WindowParam::MinHeight, StoredValue::Text("100".to_string()))]
//! );
//!
//! // Any curated value hides every raw one
//! block_on(store.set_key(SettingsField::SimpleParams, "minwidth", "0"))?;
//! assert_eq!(
//!     block_on(resolve(&store)),
//!     vec![(WindowParam::MinWidth, StoredValue::Text("0".to_string()))]
//! );
//! # Ok::<(), winparams::Error>(())
//! ```
//!
//! ### Encoding for the Host
//!
//! ```rust
//! use winparams::{Catalog, Codec, StoredValue, WindowParam};
//!
//! let catalog = Catalog::builder()
//!     .builtin_tables()
//!     .vr_overlay_keys(["valve.steam.gamepadui.main"])
//!     .build()?;
//! let codec = Codec::new(&catalog);
//! let params = vec![(WindowParam::CreateFlags, StoredValue::Flags(vec![1, 2, 8]))];
//!
//! assert_eq!(codec.query_pairs(&params), vec![("createflags", "11".to_string())]);
//! assert_eq!(
//!     codec.attribute_pairs(&params),
//!     vec![("createflags", "Minimized Hidden NoTaskbarIcon".to_string())]
//! );
//! # Ok::<(), winparams::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Fallible functions return [`Result<T, Error>`]. Reading settings never
//! fails: missing or malformed documents resolve to defaults. Writes
//! propagate backend failures:
//!
//! ```rust
//! use winparams::{Catalog, Error};
//!
//! match Catalog::builder().build() {
//!     Ok(_) => println!("catalog ready"),
//!     Err(Error::MissingMemberTable { param }) => eprintln!("host did not provide {}", param),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

pub use backend::{BackendFuture, FileBackend, MemoryBackend, SettingsBackend};
pub use catalog::{
    Catalog, CatalogBuilder, MemberTable, BUILTIN_BROWSER_TYPES, BUILTIN_POPUP_CREATION_FLAGS,
    DEFAULT_USER_AGENT, RESTORE_DETAILS_EXAMPLE,
};
pub use codec::Codec;
pub use config::{Config, STORE_DIR_ENV};
pub use error::{Error, Result};
pub use hooks::{
    rewrite_url, CategoryRules, InstalledOpenHook, OpenerSlot, PopupCallback, PopupEvents,
    PopupHook, PopupRoot, WindowCategory, WindowOpenHook, WindowOpener,
};
pub use presets::{ExtensionOption, Preset};
pub use resolver::{effective_params, resolve, ParamMode};
pub use store::{SettingsStore, DEFAULT_SETTINGS_KEY};
pub use types::{
    EffectiveParams, OrderedMap, ParamDomain, SettingsDocument, SettingsField, StoredValue,
    WindowParam,
};

// All modules are private - use re-exports above for public API
mod backend;
mod catalog;
mod codec;
mod config;
mod error;
mod hooks;
mod presets;
mod resolver;
mod store;
mod types;
