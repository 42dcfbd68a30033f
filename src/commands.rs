use crate::cli::OutputFormat;
use anyhow::{bail, Context as _, Result};
use futures::executor::block_on;
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use winparams::{
    effective_params, Catalog, Codec, Config, ExtensionOption, FileBackend, ParamDomain,
    ParamMode, Preset, SettingsField, SettingsStore, StoredValue, WindowOpenHook, WindowOpener,
    WindowParam,
};

const ADVANCED_WARNING: &str = "Raw parameters can create windows with no size, no title bar \
or no way to close them. Re-run with --advanced to continue. \
To recover from a broken setup, run `winparams reset --yes`.";

/// Everything a command needs: configuration, member tables and the store
pub struct Context {
    pub config: Config,
    pub catalog: Rc<Catalog>,
    pub store: SettingsStore,
}

impl Context {
    pub fn load(config_path: Option<PathBuf>, store_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::load(config_path.as_deref()).context("Failed to load config")?;
        if let Some(dir) = store_dir {
            config.store_dir = Some(dir);
        }

        let mut builder = Catalog::builder()
            .builtin_tables()
            .vr_overlay_keys(config.vr_overlay_keys.iter().cloned());
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let catalog = builder.build().context("Failed to build parameter catalog")?;

        let root = config.store_dir();
        let backend = FileBackend::from_root(&root)
            .with_context(|| format!("Failed to open settings store at {}", root.display()))?;
        let store = SettingsStore::with_key(Rc::new(backend), config.settings_key.clone());

        Ok(Self {
            config,
            catalog: Rc::new(catalog),
            store,
        })
    }
}

pub fn show(ctx: &Context) -> Result<()> {
    let document = block_on(ctx.store.get());
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

pub fn resolve(ctx: &Context, format: OutputFormat) -> Result<()> {
    let document = block_on(ctx.store.get());
    let params = effective_params(&document);
    let codec = Codec::new(&ctx.catalog);
    log::info!(
        "Resolving from {} parameters",
        match ParamMode::of(&document) {
            ParamMode::Simple => "curated",
            ParamMode::Raw => "raw",
        }
    );

    match format {
        OutputFormat::Json => {
            let pairs: Vec<(&str, &StoredValue)> =
                params.iter().map(|(p, v)| (p.as_str(), v)).collect();
            println!("{}", serde_json::to_string_pretty(&pairs)?);
        }
        OutputFormat::Query => {
            for (key, value) in codec.query_pairs(&params) {
                println!("{}={}", key, value);
            }
        }
        OutputFormat::Attributes => {
            for (name, value) in codec.attribute_pairs(&params) {
                println!("{}={:?}", name, value);
            }
        }
    }
    Ok(())
}

pub fn set(ctx: &Context, param: &str, value: &str, advanced: bool, force: bool) -> Result<()> {
    require_advanced(advanced)?;
    let param: WindowParam = param.parse()?;
    let value = ctx.catalog.parse_value(param, value)?;
    require_force(ctx, param, &value, force)?;

    block_on(
        ctx.store
            .set_param(&ctx.catalog, SettingsField::Params, param, value.clone()),
    )
    .with_context(|| format!("Failed to store {}", param))?;
    println!("{} = {}", param, value.to_plain_string());
    Ok(())
}

pub fn unset(ctx: &Context, param: &str, advanced: bool) -> Result<()> {
    require_advanced(advanced)?;
    let param: WindowParam = param.parse()?;
    block_on(ctx.store.remove_key(SettingsField::Params, param.as_str()))
        .with_context(|| format!("Failed to remove {}", param))?;
    println!("{} removed", param);
    Ok(())
}

pub fn flag(
    ctx: &Context,
    param: &str,
    member: &str,
    enabled: bool,
    advanced: bool,
    force: bool,
) -> Result<()> {
    require_advanced(advanced)?;
    let param: WindowParam = param.parse()?;
    if param.domain() != ParamDomain::Flags {
        bail!("{} is a {} parameter, not flags", param, param.domain());
    }
    let bit = ctx.catalog.member_code(param, member)?;
    if enabled {
        require_force(ctx, param, &StoredValue::Flags(vec![bit]), force)?;
    }

    let bits = block_on(ctx.store.set_flag(
        &ctx.catalog,
        SettingsField::Params,
        param,
        bit,
        enabled,
    ))
    .with_context(|| format!("Failed to update {}", param))?;
    println!("{} = {:?}", param, bits);
    Ok(())
}

pub fn preset(ctx: &Context, name: &str, enabled: bool) -> Result<()> {
    let preset: Preset = name.parse()?;
    block_on(preset.apply(&ctx.store, &ctx.catalog, enabled))
        .with_context(|| format!("Failed to update preset {}", preset))?;

    let document = block_on(ctx.store.get());
    let active: Vec<&str> = Preset::ALL
        .iter()
        .filter(|p| p.is_active(&document, &ctx.catalog).unwrap_or(false))
        .map(|p| p.as_str())
        .collect();
    println!("Active presets: {}", display_list(&active));
    Ok(())
}

pub fn set_option(ctx: &Context, name: &str, enabled: bool) -> Result<()> {
    let option: ExtensionOption = name.parse()?;
    block_on(ctx.store.set_option(option.as_str(), enabled))
        .with_context(|| format!("Failed to update option {}", option))?;
    println!("{} = {}", option, enabled);
    Ok(())
}

pub fn reset(ctx: &Context, yes: bool) -> Result<()> {
    if !yes {
        bail!("This deletes every stored option and parameter. Re-run with --yes to confirm.");
    }
    block_on(ctx.store.reset()).context("Failed to reset settings")?;
    println!("Settings reset. Restart the host for open windows to pick up the change.");
    Ok(())
}

/// Window opener that records the URL it is asked to open
#[derive(Default)]
struct PreviewOpener {
    opened: RefCell<Option<String>>,
}

impl WindowOpener for PreviewOpener {
    fn open<'a>(
        &'a self,
        url: &'a str,
        _target: &'a str,
        _features: &'a str,
    ) -> LocalBoxFuture<'a, winparams::Result<()>> {
        *self.opened.borrow_mut() = Some(url.to_string());
        Box::pin(async { Ok(()) })
    }
}

pub fn rewrite_url(ctx: &Context, url: &str, target: &str) -> Result<()> {
    let preview = Rc::new(PreviewOpener::default());
    let hook = WindowOpenHook::new(
        preview.clone(),
        ctx.store.clone(),
        ctx.catalog.clone(),
        ctx.config.categories.clone(),
    );
    block_on(hook.open(url, target, ""))?;

    match preview.opened.take() {
        Some(opened) => println!("{}", opened),
        None => bail!("window-open was not forwarded"),
    }
    Ok(())
}

pub fn catalog(ctx: &Context) -> Result<()> {
    for param in WindowParam::ALL {
        let mut line = format!("{:<20} {}", param.as_str(), param.domain());
        let args = ctx.catalog.description_args(param);
        if !args.is_empty() {
            line.push_str(&format!("  (e.g. {})", args.join(", ")));
        }
        println!("{}", line);

        if let Some(table) = ctx.catalog.members(param) {
            let risky = ctx.catalog.risky_members(param);
            for (code, name) in table.iter() {
                let marker = if risky.contains(&name) { " !" } else { "" };
                println!("    {:>10}  {}{}", code, name, marker);
            }
        }
    }
    Ok(())
}

fn require_advanced(advanced: bool) -> Result<()> {
    if !advanced {
        bail!(ADVANCED_WARNING);
    }
    Ok(())
}

fn require_force(
    ctx: &Context,
    param: WindowParam,
    value: &StoredValue,
    force: bool,
) -> Result<()> {
    let risky = ctx.catalog.risky_selection(param, value);
    if risky.is_empty() {
        return Ok(());
    }
    if !force {
        bail!(
            "{} may make windows invisible or unusable. Re-run with --force to use it anyway.",
            risky.join(", ")
        );
    }
    log::warn!("Using risky {} members: {}", param, risky.join(", "));
    Ok(())
}

fn display_list(items: &[&str]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
