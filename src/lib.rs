pub mod adapters;
pub mod config;
pub mod domain;
pub mod soap;
pub mod telemetry;
pub mod tls;
