pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod filters;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod navigation;
pub mod repl;
