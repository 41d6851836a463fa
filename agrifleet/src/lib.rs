//! Fleet-state sync and normalization for agricultural robot fleets

pub mod cli;
pub mod logic;
