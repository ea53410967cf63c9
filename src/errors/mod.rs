pub mod types;
pub mod classification;

pub use types::HarborError;
pub use classification::ErrorClassification;
