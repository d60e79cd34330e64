pub mod config;
pub mod http;
pub mod store;
pub mod tenants;
