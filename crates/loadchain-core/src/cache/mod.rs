//! Stage result caching.
//!
//! A [`CacheFingerprint`] describes everything a transformation stage's
//! output depends on apart from the source file itself. A [`CacheStore`]
//! turns the fingerprint, the contents of the watched configuration files
//! and the source file into a lookup key.

mod error;
mod fingerprint;
mod hash;
mod store;

pub use error::{CacheError, Result};
pub use fingerprint::{CacheFingerprint, FingerprintFactory, ToolchainFingerprints};
pub use hash::{hash_bytes, hash_file, hash_watched_files};
pub use store::{CacheEntry, CacheStore, DiskCacheStore, MemoryCacheStore};

/// Cache format version - increment when the entry layout changes
pub const CACHE_VERSION: u32 = 1;

/// Default cache directory, relative to the project root
pub const CACHE_DIR_NAME: &str = "node_modules/.cache";

/// Extension of stored entries
pub const ENTRY_EXTENSION: &str = "bin";
