pub mod diagnostics;
pub mod facade;
pub mod key;

pub use diagnostics::{CallLog, CallStatus, LastCall};
pub use facade::{CacheEntry, CachedValue, CachingFacade, Fetched};
pub use key::CacheKey;
