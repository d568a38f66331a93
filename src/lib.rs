pub mod api;
pub mod config;
pub mod database;
pub mod gateways;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod services;
pub mod workers;
