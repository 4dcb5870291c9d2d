//! Knobs for `Archive::new`, in the same spirit as the teacher crate's
//! small `Default`-able `ParseOptions` structs threaded through its parse
//! entry points.

/// Default capacity of a `CompressedStream`'s decompressed-chunk LRU cache.
pub const DEFAULT_CHUNK_CACHE_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Number of decompressed chunks each `CompressedStream` keeps cached.
    pub chunk_cache_capacity: usize,
    /// When true (and the `verify-hashes` feature is enabled), hash every
    /// stream read through `DirectoryEntry::open` and compare it against
    /// the recorded SHA-1, failing with `Error::Malformed` on a mismatch.
    pub verify_hashes: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            chunk_cache_capacity: DEFAULT_CHUNK_CACHE_CAPACITY,
            verify_hashes: false,
        }
    }
}
