mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use eyre::{Result, WrapErr};
use spectro_core::error::SpectroError;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("color-eyre install failed: {e}");
    }

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    match &cli.cmd {
        Commands::Run {
            port,
            baud,
            max_cycles,
            sim,
        } => {
            let mut cfg = load_config(&cli.config)?;
            if let Some(p) = port {
                cfg.serial.port.clone_from(p);
            }
            if let Some(b) = baud {
                cfg.serial.baud = *b;
            }
            // Overrides go through the same checks as the file.
            cfg.validate()
                .map_err(|e| SpectroError::Config(format!("{e:#}")))?;
            init_tracing(&cli, Some(&cfg.logging))?;
            run::run_loop(&cfg, *sim, *max_cycles, cli.json)
        }
        Commands::Check => {
            let cfg = load_config(&cli.config)?;
            init_tracing(&cli, Some(&cfg.logging))?;
            run::check(&cfg, cli.json)
        }
        Commands::Dataset { files } => {
            init_tracing(&cli, None)?;
            run::dataset(files, cli.json)
        }
    }
}

fn load_config(path: &Path) -> Result<spectro_config::Config> {
    spectro_config::load_file(path)
        .map_err(|e| SpectroError::Config(format!("{e:#}")).into())
}

/// Console sink on stderr (pretty or JSON) plus an optional JSON file sink.
fn init_tracing(cli: &Cli, logging: Option<&spectro_config::Logging>) -> Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.and_then(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let file_writer = match logging.and_then(|l| l.file.as_deref()) {
        Some(file) => {
            let path = Path::new(file);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("create log directory {}", dir.display()))?;
            let name = path
                .file_name()
                .ok_or_else(|| SpectroError::Config(format!("logging.file {file:?} has no file name")))?;
            let appender = match logging.and_then(|l| l.rotation.as_deref()) {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(writer)
        }
        None => None,
    };

    let console_json = cli
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let console_text = (!cli.json).then(|| fmt::layer().with_writer(std::io::stderr));
    let file_layer = file_writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_text)
        .with(file_layer)
        .try_init()
        .wrap_err("initialize logging")?;
    Ok(())
}
