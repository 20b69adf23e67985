use clap::Parser;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lumenflow::cli::{self, Cli, Commands, DbCommands};
use lumenflow::config::Config;
use lumenflow::db;
use lumenflow::ledger::{HorizonClient, Reconciler};
use lumenflow::service::{poller, TransactionService};
use lumenflow::store::PgTransactionStore;
use lumenflow::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config).await,
        Commands::Reconcile { once } => reconcile(&config, once).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn build_service(config: &Config, pool: PgPool) -> Arc<TransactionService> {
    let horizon = HorizonClient::new(
        config.horizon_url.clone(),
        Duration::from_secs(config.ledger_timeout_secs),
    );
    let reconciler = Reconciler::new(
        Arc::new(horizon),
        config.confirmation_depth,
        chrono::Duration::seconds(config.pending_expiry_secs),
    );
    Arc::new(TransactionService::new(
        Arc::new(PgTransactionStore::new(pool)),
        reconciler,
    ))
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database_url).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let service = build_service(config, pool);
    tracing::info!(url = %config.horizon_url, "Stellar Horizon client initialized");

    let state = AppState {
        service,
        admin_api_key: config.admin_api_key.clone(),
        webhook_secret: config.webhook_secret.clone(),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn reconcile(config: &Config, once: bool) -> anyhow::Result<()> {
    let pool = db::create_pool(&config.database_url).await?;
    let service = build_service(config, pool);

    if once {
        let report = service.reconcile_sweep().await?;
        println!(
            "✓ Sweep finished: {} examined, {} transitioned, {} expired, {} errors",
            report.examined, report.transitioned, report.expired, report.errors
        );
        return Ok(());
    }

    tracing::info!(
        interval_secs = config.reconcile_interval_secs,
        "starting reconciliation loop"
    );
    poller::run_reconciler(
        service,
        Duration::from_secs(config.reconcile_interval_secs),
    )
    .await;

    Ok(())
}
