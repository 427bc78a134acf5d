use clap::Parser;
use std::io;
use task_cli::cli::{Cli, Command};
use task_cli::menu::Menu;
use task_core::config::{
    Config, apply_env, load_config_with_fallback, merge_overrides, palette_for_theme,
};
use task_core::error::AppError;
use task_core::repository::TaskRepository;
use task_core::storage::MongoStore;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "warn";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::validation(message)
}

/// File, then environment, then command-line overrides.
fn resolve_config(cli: &Cli) -> Result<Config, AppError> {
    let overrides = cli.overrides().map_err(AppError::validation)?;

    let load = load_config_with_fallback();
    if let Some(err) = load.error {
        warn!(error = %err, "ignoring unreadable config file");
    }

    Ok(merge_overrides(&apply_env(&load.config), &overrides))
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = resolve_config(&cli)?;
    let settings = config.store_settings()?;
    let store = MongoStore::connect(&settings)?;

    match cli.selected_command() {
        Command::Setup => {
            println!(
                "MongoDB ready: database '{}', collection '{}' (unique index on task_id)",
                store.database_name(),
                store.collection_name()
            );
        }
        Command::Menu => {
            let repo = TaskRepository::new(store);
            let stdin = io::stdin();
            let stdout = io::stdout();
            let stderr = io::stderr();
            Menu::new(&repo, stdin.lock(), stdout.lock(), stderr.lock())
                .with_palette(palette_for_theme(config.theme.as_deref()))
                .run()?;
            info!("menu closed");
        }
    }

    Ok(())
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    init_tracing();

    if let Err(err) = run(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
