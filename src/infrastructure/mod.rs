pub mod adapters;
pub mod config;
