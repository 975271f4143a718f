pub mod aggregate;
pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod server;
pub mod state;
pub mod tasks;
pub mod types;
