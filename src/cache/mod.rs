pub mod eligibility;
pub mod error;
pub mod fake;
pub mod redis;
pub mod store;

pub use eligibility::{EligibilityCache, EligibilityError};
pub use error::CacheError;
pub use fake::FakeCacheStore;
pub use redis::RedisCacheStore;
pub use store::CacheStore;
