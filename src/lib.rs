pub mod config;
pub mod handlers;
pub mod initializers;
pub mod observability;
pub mod platform;
