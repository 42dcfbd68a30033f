mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use commands::Context;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = Context::load(cli.config, cli.store_dir)?;

    match cli.command {
        Commands::Show => commands::show(&ctx),
        Commands::Resolve { format } => commands::resolve(&ctx, format),
        Commands::Set {
            param,
            value,
            advanced,
            force,
        } => commands::set(&ctx, &param, &value, advanced, force),
        Commands::Unset { param, advanced } => commands::unset(&ctx, &param, advanced),
        Commands::Flag {
            param,
            member,
            state,
            advanced,
            force,
        } => commands::flag(&ctx, &param, &member, state.enabled(), advanced, force),
        Commands::Preset { name, state } => commands::preset(&ctx, &name, state.enabled()),
        Commands::SetOption { name, state } => commands::set_option(&ctx, &name, state.enabled()),
        Commands::Reset { yes } => commands::reset(&ctx, yes),
        Commands::RewriteUrl { url, target } => commands::rewrite_url(&ctx, &url, &target),
        Commands::Catalog => commands::catalog(&ctx),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
