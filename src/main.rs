use clap::{Parser, Subcommand};
use limeboard::api::LimeSurveyClient;
use limeboard::bootstrap::{AppFactory, AppRegistry, EntryPoint};
use limeboard::cache::{Snapshot, SnapshotCache};
use limeboard::config::{DashboardConfig, SurveyConfig};
use limeboard::{constants, logging, observability, server, tasks};
use limeboard::state::AppState;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "limeboard")]
#[command(about = "Live LimeSurvey results dashboard")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard server
    Serve {
        /// Application entry point to serve, as module:attribute
        #[arg(long, default_value = constants::DEFAULT_ENTRY_POINT)]
        app: String,
        /// Worker threads sharing the listener
        #[arg(long, default_value_t = constants::DEFAULT_WORKERS)]
        workers: usize,
        /// Bind address for the listener
        #[arg(long, default_value = constants::DEFAULT_BIND)]
        bind: String,
        /// Environment file applied before startup
        #[arg(long, default_value = constants::DEFAULT_ENV_FILE)]
        env_file: String,
        /// Dashboard presentation config
        #[arg(long, default_value = constants::DEFAULT_CONFIG_FILE)]
        config: String,
    },
    /// Fetch the survey once and update the snapshot cache
    FetchOnce {
        /// Environment file applied before the fetch
        #[arg(long, default_value = constants::DEFAULT_ENV_FILE)]
        env_file: String,
        /// Dashboard presentation config
        #[arg(long, default_value = constants::DEFAULT_CONFIG_FILE)]
        config: String,
    },
    /// Print a summary of the cached snapshot without fetching
    Snapshot {
        /// Dashboard presentation config
        #[arg(long, default_value = constants::DEFAULT_CONFIG_FILE)]
        config: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            app,
            workers,
            bind,
            env_file,
            config,
        } => {
            let env_loaded = dotenv::from_path(&env_file).is_ok();
            logging::init_logging();
            if env_loaded {
                info!("Loaded environment from {}", env_file);
            } else {
                warn!("Environment file {} not found, using process environment", env_file);
            }

            // Resolve the entry point before anything touches the network; a
            // bad module:attribute must fail startup, not a request.
            let entry: EntryPoint = app.parse()?;
            let factory = AppRegistry::builtin().resolve(&entry)?;
            let workers = limeboard::bootstrap::validate_worker_count(workers)?;

            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| format!("Invalid bind address '{}': {}", bind, e))?;

            println!("🚀 Serving {entry} with {workers} workers on {addr}");
            info!("Serving {} with {} workers on {}", entry, workers, addr);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(workers)
                .enable_all()
                .build()?;
            runtime.block_on(serve(factory, addr, &config))?;
        }
        Commands::FetchOnce { env_file, config } => {
            let env_loaded = dotenv::from_path(&env_file).is_ok();
            logging::init_logging();
            if !env_loaded {
                warn!("Environment file {} not found, using process environment", env_file);
            }

            println!("📥 Fetching survey responses...");
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(fetch_once(&config))?;
        }
        Commands::Snapshot { config } => {
            logging::init_logging();
            show_snapshot(&config)?;
        }
    }
    Ok(())
}

async fn serve(
    factory: AppFactory,
    addr: SocketAddr,
    config_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let survey = SurveyConfig::from_env()?;
    let dashboard = DashboardConfig::load(Path::new(config_path))?;
    // Fail on an unusable cutoff now rather than on the first request
    dashboard.default_cutoff_utc()?;

    observability::install_metrics()?;

    let cache = Arc::new(SnapshotCache::new(&dashboard.cache_dir()));
    let state = AppState::new(
        Arc::new(LimeSurveyClient::new(survey)),
        cache,
        Arc::new(dashboard),
        Snapshot::empty(),
    );

    // Startup fetch failure is fatal: an empty dashboard would mask a broken
    // survey backend.
    let count = tasks::refresh_once(&state).await?;
    info!("Initial snapshot holds {} responses", count);

    let _poller = tasks::spawn_poller(state.clone());

    let router = factory(state);
    server::start_server(router, addr).await?;
    Ok(())
}

async fn fetch_once(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let survey = SurveyConfig::from_env()?;
    let dashboard = DashboardConfig::load(Path::new(config_path))?;

    let cache = Arc::new(SnapshotCache::new(&dashboard.cache_dir()));
    let state = AppState::new(
        Arc::new(LimeSurveyClient::new(survey)),
        cache.clone(),
        Arc::new(dashboard),
        Snapshot::empty(),
    );

    let count = tasks::refresh_once(&state).await?;
    let completed = state
        .snapshot
        .read()
        .await
        .responses
        .iter()
        .filter(|r| r.is_completed)
        .count();
    println!("✅ Fetched {} responses ({} completed)", count, completed);
    println!("   Snapshot: {}", cache.path().display());
    Ok(())
}

fn show_snapshot(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let dashboard = DashboardConfig::load(Path::new(config_path))?;
    let cache = SnapshotCache::new(&dashboard.cache_dir());
    if !cache.exists() {
        println!("⚠️  No snapshot at {}", cache.path().display());
        return Err("snapshot cache not found".into());
    }
    let snapshot = cache.load()?;
    let completed = snapshot.responses.iter().filter(|r| r.is_completed).count();
    println!("📊 Snapshot: {}", cache.path().display());
    println!("   Fetched:   {}", snapshot.fetched_at);
    println!("   Responses: {}", snapshot.responses.len());
    println!("   Completed: {}", completed);
    println!("   Partial:   {}", snapshot.responses.len() - completed);
    Ok(())
}
