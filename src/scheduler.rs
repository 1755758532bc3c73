//! Background schedules.
//!
//! Four independent loops, each its own task with its own cadence:
//! monthly SLA aggregation every 5 minutes, yearly aggregation every 10,
//! a monitoring item harvest every 10, and a full catalog pull every 30.
//! Loops never die on a failed pass; errors are logged and the next tick
//! retries from scratch.

use std::sync::Arc;

use sea_orm::{DatabaseConnection, EntityTrait};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::aggregator::{self, SlaPeriod};
use crate::backend::backend_for_settings;
use crate::db::entities::prelude::*;
use crate::db::services::host_service;
use crate::lifecycle::orchestrator::Orchestrator;

const MONTHLY_SLA_INTERVAL: Duration = Duration::from_secs(5 * 60);
const YEARLY_SLA_INTERVAL: Duration = Duration::from_secs(10 * 60);
const ITEM_HARVEST_INTERVAL: Duration = Duration::from_secs(10 * 60);
const CATALOG_PULL_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Spawn all background loops. Returns immediately; the loops run for the
/// lifetime of the process.
pub fn start(db: Arc<DatabaseConnection>, orchestrator: Arc<Orchestrator>) {
    tokio::spawn(sla_loop(db.clone(), SlaPeriod::Monthly, MONTHLY_SLA_INTERVAL));
    tokio::spawn(sla_loop(db.clone(), SlaPeriod::Yearly, YEARLY_SLA_INTERVAL));
    tokio::spawn(item_harvest_loop(db.clone(), orchestrator));
    tokio::spawn(catalog_pull_loop(db));
    info!("background schedules started");
}

async fn sla_loop(db: Arc<DatabaseConnection>, period: SlaPeriod, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = aggregator::aggregate_sla(&db, period).await {
            error!(?period, error = %e, "SLA aggregation pass failed");
        }
    }
}

async fn item_harvest_loop(db: Arc<DatabaseConnection>, orchestrator: Arc<Orchestrator>) {
    let mut ticker = interval(ITEM_HARVEST_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let hosts = match host_service::active_hosts(db.as_ref()).await {
            Ok(hosts) => hosts,
            Err(e) => {
                error!(error = %e, "cannot list hosts for item harvest");
                continue;
            }
        };
        for host in hosts {
            if let Err(e) = orchestrator.harvest_monitoring_items(host.id).await {
                error!(host = %host.name, error = %e, "item harvest failed");
            }
        }
    }
}

/// Reconcile the local catalog against every configured monitoring server.
async fn catalog_pull_loop(db: Arc<DatabaseConnection>) {
    let mut ticker = interval(CATALOG_PULL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let all_settings = match Settings::find().all(db.as_ref()).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "cannot list settings for catalog pull");
                continue;
            }
        };
        for settings in all_settings {
            let backend = backend_for_settings(db.clone(), &settings);
            match backend.sync().await {
                Ok(()) => info!(settings = %settings.name, "catalog pull finished"),
                Err(e) => error!(settings = %settings.name, error = %e, "catalog pull failed"),
            }
        }
    }
}
