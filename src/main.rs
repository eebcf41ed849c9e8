mod app;

use std::path::PathBuf;

use anyhow::{Context as _, anyhow};
use clap::Parser;
use log::{info, warn};

use brain_map::api::{ApiClient, DEFAULT_API_BASE_URL};
use brain_map::filter::FilterState;
use brain_map::settings::{JsonFileStore, Settings};
use brain_map::theme::ThemeMode;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the notes service.
    #[arg(long, env = "BRAIN_MAP_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Where theme and saved views are kept.
    #[arg(long)]
    settings_path: Option<PathBuf>,

    #[arg(long, default_value = ".")]
    export_dir: PathBuf,

    /// Override the persisted theme for this session.
    #[arg(long, value_parser = parse_theme)]
    theme: Option<ThemeMode>,

    /// Shared view payload or share link to open on start.
    #[arg(long)]
    view: Option<String>,

    /// Initial filters as a query string, e.g. `type=Task&status=active`.
    #[arg(long)]
    filters: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_theme(value: &str) -> Result<ThemeMode, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "light" | "dark" => Ok(ThemeMode::parse(value)),
        other => Err(format!("unknown theme {other:?}, expected light or dark")),
    }
}

fn open_settings(path: Option<PathBuf>) -> Settings {
    match path.or_else(JsonFileStore::default_path) {
        Some(path) => {
            info!("settings file: {}", path.display());
            Settings::new(JsonFileStore::open(path))
        }
        None => {
            warn!("no config directory found; settings will not persist");
            Settings::in_memory()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let api = ApiClient::new(&args.api_base_url)
        .with_context(|| format!("invalid --api-base-url {:?}", args.api_base_url))?;
    let session = app::Session {
        settings: open_settings(args.settings_path),
        export_dir: args.export_dir,
        theme: args.theme,
        filters: args.filters.as_deref().map(FilterState::from_query_string),
        shared_view: args.view,
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Brain Map",
        options,
        Box::new(move |cc| Ok(Box::new(app::BrainMapApp::new(cc, api, session)))),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}
