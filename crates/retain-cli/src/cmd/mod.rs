pub mod config;
pub mod keep;
