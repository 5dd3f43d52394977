pub mod cache;
pub mod file;
pub mod schema;
pub mod vault;

pub use cache::{CacheKey, CachedRecord, TtlCache};
pub use file::StorageEngine;
pub use schema::{validate_communal, validate_persona};
pub use vault::Vault;
