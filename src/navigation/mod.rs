pub mod navigator;
pub mod options;
pub mod registry;
pub mod screen;

pub use navigator::{FetchOutcome, FetchTicket, NavigationStack, SessionNavigator, SessionState};
pub use options::{OptionList, ScreenOption};
pub use registry::{ScreenFactory, ScreenRegistry};
pub use screen::{ScreenData, ScreenId, ScreenKind, ScreenState};
