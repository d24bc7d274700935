pub mod cli;
pub mod config;
pub mod core;
pub mod formatter;
pub mod http_client;
pub mod session;
pub mod voice;
