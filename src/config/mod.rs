pub mod credentials;
pub mod paths;
pub mod parser;
pub mod schema;
pub mod types;

pub use types::*;
pub use parser::{init_config_dir, load_config, parse_config};
