pub mod catalog;
pub mod field;
pub mod pipeline;
pub mod spec;

pub use catalog::{default_filters, default_pipeline};
pub use field::TextField;
pub use pipeline::{FilterPipeline, FilterReport, SortOrder};
pub use spec::{FilterKind, FilterSpec, FilterValue, SwitchTarget};
