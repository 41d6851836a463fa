pub mod config;
pub mod fleet;
pub mod list;
pub mod robot;
pub mod session;
pub mod transport;
pub mod url_utils;
