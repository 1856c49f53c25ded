use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use warehouse::auth::{IdentityVerifier, bootstrap_roles, set_user_role};
use warehouse::config::{AuthMode, Config, ServerConfig};
use warehouse::pipeline::{HttpErpSource, TaskExecutor};
use warehouse::server::{AppState, create_router};
use warehouse::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "warehouse")]
#[command(about = "A data-cataloguing backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the database with built-in roles and default access rules
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Assign a role to a user who has signed in at least once
    SetRole {
        /// Identity-provider subject of the user
        #[arg(long)]
        external_id: String,

        /// Role name, e.g. "admin" or "superadmin"
        #[arg(long)]
        role: String,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

fn open_store(data_dir: PathBuf) -> anyhow::Result<SqliteStore> {
    fs::create_dir_all(&data_dir)?;

    let server = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    let store = SqliteStore::new(server.db_path())?;
    store.initialize()?;
    Ok(store)
}

fn run_init(data_dir: PathBuf) -> anyhow::Result<()> {
    let db_path = data_dir.join("warehouse.db");
    let store = open_store(data_dir)?;
    let roles = bootstrap_roles(&store)?;
    let rules = store.list_all_access_rules()?;

    println!();
    println!("Database ready at {}", db_path.display());
    println!(
        "Roles: {}",
        roles.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!("Access rules: {}", rules.len());
    println!();

    Ok(())
}

fn run_set_role(data_dir: PathBuf, external_id: &str, role: &str) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    bootstrap_roles(&store)?;

    let Some(user) = store.get_user_by_external_id(external_id)? else {
        bail!("No user with external id '{external_id}'. The user must sign in once first.");
    };
    if store.get_role_by_name(role)?.is_none() {
        bail!("Unknown role '{role}'");
    }

    let user = set_user_role(&store, &user.id, role)?;
    println!("User {} ({external_id}) now has role '{role}'", user.id);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn run_serve(config: Config) -> anyhow::Result<()> {
    let store = open_store(config.server.data_dir.clone())?;
    bootstrap_roles(&store)?;
    let store: Arc<dyn Store> = Arc::new(store);

    if config.erp.base_url.is_none() {
        warn!("erp.base_url is not set; pipeline runs will fail");
    }
    let source = Arc::new(HttpErpSource::from_config(&config.erp)?);
    let executor = Arc::new(TaskExecutor::new(
        Arc::clone(&store),
        source,
        config.executor.max_concurrent_runs,
    ));

    if config.auth.mode == AuthMode::JwtClaims {
        warn!("auth.mode is jwt-claims; bearer token signatures are NOT verified");
    }
    let verifier = IdentityVerifier::from_config(&config.auth)?;

    let addr = config.server.socket_addr()?;
    let grace = Duration::from_secs(config.executor.shutdown_grace_secs);

    let state = Arc::new(AppState::new(store, Arc::clone(&executor), verifier, config));
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let unfinished = executor.shutdown(grace).await;
    if unfinished > 0 {
        warn!(
            "{unfinished} pipeline runs still in flight after {}s; they stay 'running' in history",
            grace.as_secs()
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warehouse=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => {
                run_init(data_dir)?;
            }
            AdminCommands::SetRole {
                external_id,
                role,
                data_dir,
            } => {
                run_set_role(data_dir, &external_id, &role)?;
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path)?,
                None => {
                    let mut config = Config::default();
                    config.apply_env();
                    config
                }
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }

            run_serve(config).await?;
        }
    }

    Ok(())
}
