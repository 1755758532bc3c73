//! High-level database API, one sub-module per domain area. HTTP handlers,
//! the orchestrator and the schedulers go through these functions instead of
//! touching entities directly.

pub mod catalog_service;
pub mod host_service;
pub mod itservice_service;
pub mod sla_service;

pub use catalog_service::*;
pub use host_service::*;
pub use itservice_service::*;
pub use sla_service::*;
