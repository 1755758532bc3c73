//! Scope change propagation.
//!
//! The owning platform emits an event when a monitored resource is renamed
//! or deleted; this module fans the event out to every host attached to
//! that scope so remote names stay in sync and orphaned hosts get torn
//! down.

use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::db::services::host_service;
use crate::lifecycle::orchestrator::Orchestrator;
use crate::scope::ScopeRef;
use crate::web::error::AppError;

#[derive(Debug, Clone)]
pub enum ScopeEvent {
    /// The scope's display name changed; hosts must be renamed remotely.
    NameChanged(ScopeRef),
    /// The scope is gone; its hosts must be deprovisioned.
    Deleted(ScopeRef),
}

pub async fn handle_scope_event(
    db: &DatabaseConnection,
    orchestrator: &Orchestrator,
    event: ScopeEvent,
) -> Result<(), AppError> {
    match event {
        ScopeEvent::NameChanged(scope) => {
            let hosts = host_service::hosts_for_scope(db, &scope.kind, &scope.id).await?;
            info!(scope = %scope, hosts = hosts.len(), "propagating scope rename");
            for host in hosts {
                if let Err(e) = orchestrator.update_host_visible_name(host.id).await {
                    warn!(host = %host.name, error = %e, "rename propagation failed");
                }
            }
        }
        ScopeEvent::Deleted(scope) => {
            let hosts = host_service::hosts_for_scope(db, &scope.kind, &scope.id).await?;
            info!(scope = %scope, hosts = hosts.len(), "tearing down hosts for deleted scope");
            for host in hosts {
                if let Err(e) = orchestrator.destroy_host(host.id).await {
                    warn!(host = %host.name, error = %e, "scheduled force delete after failed teardown");
                    orchestrator.force_destroy_host(host.id).await?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::*;
    use crate::db::entities::host;
    use crate::scope::ScopeRegistry;

    #[tokio::test]
    async fn test_events_for_scope_without_hosts_are_no_ops() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<host::Model>::new(), Vec::<host::Model>::new()])
                .into_connection(),
        );
        let orchestrator = Orchestrator::new(db.clone(), Arc::new(ScopeRegistry::new()));
        let scope = ScopeRef {
            kind: "virtual-machine".to_string(),
            id: "gone".to_string(),
        };

        handle_scope_event(db.as_ref(), &orchestrator, ScopeEvent::NameChanged(scope.clone()))
            .await
            .unwrap();
        handle_scope_event(db.as_ref(), &orchestrator, ScopeEvent::Deleted(scope))
            .await
            .unwrap();
    }
}
