pub mod app;
pub mod clients;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod oracle;
pub mod routes;
pub mod session;
