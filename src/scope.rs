//! Polymorphic "scope" references.
//!
//! A host may monitor an arbitrary platform resource. Instead of a generic
//! reflective foreign key, the reference is an explicit (type-tag, opaque-id)
//! pair resolved through a registry of per-type lookup functions supplied by
//! the owning platform at startup.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::entities::host::VISIBLE_NAME_MAX_LENGTH;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeRef {
    /// Resource kind tag, e.g. "virtual-machine".
    pub kind: String,
    /// Stable identifier within that kind.
    pub id: String,
}

impl std::fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// What a resolved scope exposes to this plugin: a stable id and a display name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeInfo {
    pub id: String,
    pub name: String,
}

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Unknown scope kind: {0}")]
    UnknownKind(String),
    #[error("Scope {kind}/{id} not found")]
    NotFound { kind: String, id: String },
    #[error("Scope lookup failed: {0}")]
    LookupFailed(String),
}

type ScopeResolver = Arc<
    dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<Option<ScopeInfo>, String>> + Send>>
        + Send
        + Sync,
>;

/// Registry of per-kind lookup functions. The platform registers one resolver
/// for each resource kind it wants hosts attachable to.
#[derive(Clone, Default)]
pub struct ScopeRegistry {
    resolvers: HashMap<String, ScopeResolver>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, kind: &str, resolver: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ScopeInfo>, String>> + Send + 'static,
    {
        let resolver = Arc::new(move |id: String| {
            Box::pin(resolver(id))
                as Pin<Box<dyn Future<Output = Result<Option<ScopeInfo>, String>> + Send>>
        });
        self.resolvers.insert(kind.to_string(), resolver);
    }

    pub fn known_kinds(&self) -> Vec<String> {
        self.resolvers.keys().cloned().collect()
    }

    pub async fn resolve(&self, scope: &ScopeRef) -> Result<ScopeInfo, ScopeError> {
        let resolver = self
            .resolvers
            .get(&scope.kind)
            .ok_or_else(|| ScopeError::UnknownKind(scope.kind.clone()))?;
        match resolver(scope.id.clone()).await {
            Ok(Some(info)) => Ok(info),
            Ok(None) => Err(ScopeError::NotFound {
                kind: scope.kind.clone(),
                id: scope.id.clone(),
            }),
            Err(e) => Err(ScopeError::LookupFailed(e)),
        }
    }
}

/// Derive a host's visible name from its scope: "{scope_id}-{scope_name}",
/// truncated to the remote server's 64-character limit.
pub fn visible_name_from_scope(scope: &ScopeInfo) -> String {
    let full = format!("{}-{}", scope.id, scope.name);
    full.chars().take(VISIBLE_NAME_MAX_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_name_from_scope() {
        let scope = ScopeInfo {
            id: "abc123".to_string(),
            name: "vm-1".to_string(),
        };
        assert_eq!(visible_name_from_scope(&scope), "abc123-vm-1");
    }

    #[test]
    fn test_visible_name_truncated_to_64_chars() {
        let scope = ScopeInfo {
            id: "a".repeat(40),
            name: "b".repeat(40),
        };
        let name = visible_name_from_scope(&scope);
        assert_eq!(name.len(), 64);
        assert!(name.starts_with(&"a".repeat(40)));
    }

    #[tokio::test]
    async fn test_registry_resolves_known_kind() {
        let mut registry = ScopeRegistry::new();
        registry.register("virtual-machine", |id: String| async move {
            if id == "abc123" {
                Ok(Some(ScopeInfo {
                    id,
                    name: "vm-1".to_string(),
                }))
            } else {
                Ok(None)
            }
        });

        let found = registry
            .resolve(&ScopeRef {
                kind: "virtual-machine".to_string(),
                id: "abc123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(found.name, "vm-1");

        let missing = registry
            .resolve(&ScopeRef {
                kind: "virtual-machine".to_string(),
                id: "nope".to_string(),
            })
            .await;
        assert!(matches!(missing, Err(ScopeError::NotFound { .. })));

        let unknown = registry
            .resolve(&ScopeRef {
                kind: "database".to_string(),
                id: "abc123".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(ScopeError::UnknownKind(_))));
    }
}
