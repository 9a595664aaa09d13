mod app;
mod domain;
mod repo;
mod sync;
mod ui;
mod usecase;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::App;
use domain::config::Config;
use repo::config::ConfigStore;
use repo::file::FileCache;
use repo::github::model::{ReviewRecord, SearchPage};
use repo::github::{DEFAULT_API_BASE, GithubApi, OctocrabApi};
use sync::{Caches, Connect, SyncWorker};

const APP_DIR: &str = "prwatch";

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch your open GitHub pull requests and their review state", long_about = None)]
struct Args {
    /// Tick interval of render loop in milliseconds
    #[arg(long, default_value_t = 120)]
    tick_ms: u64,

    /// Seconds between automatic (cache-respecting) reloads
    #[arg(long, default_value_t = 30)]
    refresh_secs: u64,

    /// Directory for config, caches and log (default: OS config/cache dirs)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// GitHub API base url (default: $GITHUB_API_URL or https://api.github.com)
    #[arg(long)]
    api_base: Option<String>,
}

struct Paths {
    config: PathBuf,
    pr_cache: PathBuf,
    review_cache: PathBuf,
    log: PathBuf,
}

impl Paths {
    fn resolve(data_dir: Option<&Path>) -> Result<Self> {
        let (config_dir, cache_dir) = match data_dir {
            Some(dir) => (dir.to_path_buf(), dir.to_path_buf()),
            None => (
                dirs::config_dir()
                    .context("failed to resolve config dir")?
                    .join(APP_DIR),
                dirs::cache_dir()
                    .context("failed to resolve cache dir")?
                    .join(APP_DIR),
            ),
        };
        Ok(Self {
            config: config_dir.join("config.json"),
            pr_cache: cache_dir.join("pr_cache.json"),
            review_cache: cache_dir.join("review_cache.json"),
            log: cache_dir.join("prwatch.log"),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let paths = Paths::resolve(args.data_dir.as_deref())?;
    init_logging(&paths.log)?;

    let store = ConfigStore::new(&paths.config);
    let config = store.load();
    info!(path = %store.path().display(), ?config, "config loaded");

    let caches = Caches {
        pulls: Box::new(FileCache::<SearchPage>::open(&paths.pr_cache, false)),
        reviews: Box::new(FileCache::<ReviewRecord>::open(&paths.review_cache, true)),
    };
    let api_base = args
        .api_base
        .or_else(|| std::env::var("GITHUB_API_URL").ok())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let worker = SyncWorker::spawn(caches, github_connector(api_base)?)?;

    let mut app = App::new(
        store,
        config,
        worker,
        Duration::from_secs(args.refresh_secs),
    );
    app.start_sync(false);
    info!("starting the terminal event loop");
    ui::run(app, Duration::from_millis(args.tick_ms))
}

/// Owns the Tokio runtime that drives octocrab for the lifetime of the worker.
fn github_connector(api_base: String) -> Result<Connect> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    Ok(Box::new(move |config: &Config| -> Result<Box<dyn GithubApi>> {
        let api = OctocrabApi::connect(rt.handle().clone(), &config.token, &api_base)?;
        Ok(Box::new(api))
    }))
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log dir {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
