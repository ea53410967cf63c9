pub mod artifact;
pub mod finding;
pub mod registry;

pub use artifact::*;
pub use finding::*;
pub use registry::*;
