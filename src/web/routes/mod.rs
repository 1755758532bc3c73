pub mod catalog_routes;
pub mod host_routes;
pub mod itservice_routes;
pub mod settings_routes;
pub mod stats_routes;
