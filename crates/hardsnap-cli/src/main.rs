mod cli;
mod cmd;
mod config_gen;

use chrono::Utc;
use clap::Parser;

use hardsnap_core::config;
use hardsnap_core::transfer::RsyncTransfer;

use cli::{Cli, Commands};
use config_gen::run_config_generate;

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // `config` needs no config file.
    if let Commands::Config { dest } = &cli.command {
        if let Err(e) = run_config_generate(dest.as_deref()) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let source = match config::resolve_config_path(cli.config.as_deref()) {
        Some(s) => s,
        None => {
            eprintln!("Error: no configuration file found.");
            eprintln!("Searched:");
            for (path, level) in config::default_config_search_paths() {
                eprintln!("  {} ({})", path.display(), level);
            }
            eprintln!();
            eprintln!("Run `hardsnap config` to generate a starter config file.");
            std::process::exit(1);
        }
    };

    tracing::info!("Using config: {source}");

    let mut config = match config::load_config(source.path()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Backup { filesystem, jobs } => {
            if let Some(jobs) = jobs {
                config.jobs = jobs.max(1);
            }
            let transfer = RsyncTransfer::from_config(&config.transfer);
            cmd::backup::run_backup(&config, &transfer, &filesystem, Utc::now())
        }
        Commands::Purge {
            dry_run,
            list,
            filesystem,
        } => cmd::purge::run_purge(&config, dry_run, list, &filesystem, Utc::now()),
        Commands::Offline { dest, filesystem } => {
            let transfer = RsyncTransfer::from_config(&config.transfer);
            cmd::offline::run_offline(&config, &dest, &transfer, &filesystem)
        }
        Commands::BreakLock { filesystem } => cmd::break_lock::run_break_lock(&config, &filesystem),
        Commands::Config { .. } => unreachable!("handled above"),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
