use anyhow::Context;
use clap::{Parser, Subcommand};
use ecclesia_core::logging::{log_shutdown_info, log_startup_info};
use ecclesia_core::{init_logging, AppConfig, AppConfigTrait, LoggingConfig};
use ecclesia_domain::Services;
use ecclesia_http::AppState;
use ecclesia_store::{DocumentStore, MemoryStore, PostgresStore, PostgresStoreConfig};
use std::sync::Arc;
use tracing::{info, warn};

const SERVICE_NAME: &str = "ecclesia-api";

#[derive(Parser)]
#[command(name = "ecclesia-api")]
#[command(about = "Multi-tenant church management API", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Create the document table in DATABASE_URL
    Migrate,

    /// Create a platform SUPER_ADMIN, or promote an existing account
    CreateSuperadmin {
        #[arg(long)]
        email: String,

        #[arg(long, env = "SUPERADMIN_PASSWORD")]
        password: String,

        #[arg(long, default_value = "Platform")]
        first_name: String,

        #[arg(long, default_value = "Admin")]
        last_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    init_logging(LoggingConfig::from_app_config(&config))
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => migrate(&config).await,
        Commands::CreateSuperadmin {
            email,
            password,
            first_name,
            last_name,
        } => {
            let services = Services::new(open_store(&config).await?, &config);
            let user = services
                .registration
                .create_super_admin(&email, &password, &first_name, &last_name)
                .await?;
            info!(user_id = %user.id, email = %user.email, "super admin ready");
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    log_startup_info(SERVICE_NAME, env!("CARGO_PKG_VERSION"));

    let store = open_store(&config).await?;
    let services = Services::new(store, &config);
    let seeded = services.subscriptions.ensure_catalogue().await?;
    info!(seeded, environment = config.environment.as_str(), "plan catalogue ready");

    ecclesia_http::serve(AppState::new(services)).await?;

    log_shutdown_info(SERVICE_NAME);
    Ok(())
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let url = config
        .database
        .url
        .as_deref()
        .context("DATABASE_URL is required for migrate")?;
    let store = PostgresStore::connect(url, PostgresStoreConfig::from(&config.database)).await?;
    store.migrate().await?;
    info!("document store schema is up to date");
    Ok(())
}

/// PostgreSQL when DATABASE_URL is set, otherwise process memory
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.database.url.as_deref() {
        Some(url) => {
            let store = PostgresStore::connect(url, PostgresStoreConfig::from(&config.database)).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store, data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
