pub mod archive;
pub mod config;
pub mod constants;
pub mod data_lake;
pub mod db;
pub mod error;
pub mod logging;
pub mod portal;
pub mod report;
pub mod types;

// Application use cases and their ports
pub mod app;
// Google REST adapters implementing the ports
pub mod infra;
