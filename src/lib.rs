pub mod aggregator;
pub mod backend;
pub mod db;
pub mod events;
pub mod lifecycle;
pub mod scheduler;
pub mod scope;
pub mod server;
pub mod web;
