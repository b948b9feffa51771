//! Wildlife browser - main entry point.
//!
//! Loads configuration, builds a QueryController over a JSON dump
//! directory, applies the filters and sort columns given on the command
//! line, and prints the published table.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use wildlife_core::{BrowserConfig, ConfigError, FetchError, QueryError, SortColumn};
use wildlife_query::{FilterSpec, QueryController};

mod dump;
mod render;

use dump::{load_names, JsonDumpSource};

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "wildlife", about = "Browse wild creatures in a save dump")]
struct Args {
    /// Directory holding `<MAP>.json` files and an optional `names.json`
    dump_dir: PathBuf,

    /// Map (partition) to load
    map: String,

    /// Keep names containing this text
    #[arg(long)]
    search: Option<String>,

    /// Level expression: `<n`, `>n` or `n`
    #[arg(long)]
    level: Option<String>,

    /// Keep only names on the wishlist
    #[arg(long)]
    wishlist: bool,

    /// Toggle a sort column (id, class, name, level); repeat to cycle or add columns
    #[arg(long = "sort", value_name = "COLUMN")]
    sort: Vec<SortColumn>,

    /// Re-read the dump instead of using cached data
    #[arg(long)]
    refresh: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum BrowseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Failed to read names: {0}")]
    Names(#[from] FetchError),

    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

// =============================================================================
// Configuration
// =============================================================================

/// Load the configuration file, falling back to defaults without a config dir.
fn load_config(path: Option<&PathBuf>) -> Result<BrowserConfig, ConfigError> {
    match path {
        Some(path) => BrowserConfig::load_from(path),
        None => match BrowserConfig::load() {
            Err(ConfigError::NoConfigDir) => {
                tracing::warn!("No config directory, using defaults");
                Ok(BrowserConfig::default())
            }
            other => other,
        },
    }
}

// =============================================================================
// Main
// =============================================================================

async fn browse(args: Args, config: BrowserConfig) -> Result<(), BrowseError> {
    let resolver = load_names(&args.dump_dir)?;
    let source = JsonDumpSource::new(&args.dump_dir);
    let controller = QueryController::new(Arc::new(source), Arc::new(resolver))
        .with_timeout(config.fetch_timeout());

    // No partition is loaded yet, so these only record state
    let mut spec = FilterSpec {
        search_text: args.search,
        level_expr: args.level,
        wishlist_active: args.wishlist,
        ..Default::default()
    };
    spec.apply_settings(&config.filters);
    controller.set_filter_spec(spec);
    for column in &args.sort {
        controller.toggle_sort(*column);
    }

    controller.request_load(args.map.as_str(), args.refresh).await?;

    print!(
        "{}",
        render::render_table(&controller.results(), &controller.sort_keys())
    );
    Ok(())
}

fn run(args: Args) -> Result<(), BrowseError> {
    let config = load_config(args.config.as_ref())?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    rt.block_on(browse(args, config))
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!("Loading {} from {}", args.map, args.dump_dir.display());

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
