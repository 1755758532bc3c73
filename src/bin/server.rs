use std::sync::Arc;

use clap::Parser;
use sea_orm::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use monitor_bridge::lifecycle::orchestrator::Orchestrator;
use monitor_bridge::scheduler;
use monitor_bridge::scope::ScopeRegistry;
use monitor_bridge::server::config::ServerConfig;
use monitor_bridge::web;

#[derive(Parser)]
#[command(name = "monitor-bridge", about = "Monitoring integration server")]
struct Args {
    /// Skip the background schedules; serve the HTTP surface only.
    #[arg(long)]
    no_schedules: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = ServerConfig::from_env()?;

    let db = Arc::new(Database::connect(&config.database_url).await?);
    info!("database connection established");

    // Resolvers for the platform's resource kinds are registered here when
    // the plugin is embedded; the standalone server starts with none.
    let scopes = Arc::new(ScopeRegistry::new());
    let orchestrator = Arc::new(Orchestrator::new(db.clone(), scopes.clone()));

    if !args.no_schedules {
        scheduler::start(db.clone(), orchestrator.clone());
    }

    let router = web::create_axum_router(db, orchestrator, scopes);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("listening on {}", config.listen_addr);
    axum::serve(listener, router).await?;

    Ok(())
}
