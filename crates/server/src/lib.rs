pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod store_factory;
pub mod templates;
