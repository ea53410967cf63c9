pub mod browse;
pub mod commands;
pub mod context;
pub mod listing;
pub mod validate;

pub use commands::{Cli, Commands};
pub use context::AppContext;
