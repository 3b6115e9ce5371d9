//! vehinfo - batch vehicle registration lookup.
//!
//! Submits the public lookup form once per vehicle number through a
//! bounded worker pool, extracts the registration details from each
//! result page and exports the collected records as CSV and JSON.

pub mod cli;
pub mod config;
pub mod export;
pub mod input;
pub mod models;
pub mod scrapers;
pub mod server;
pub mod utils;
pub mod work_queue;
