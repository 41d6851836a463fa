pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod store;
pub mod types;
