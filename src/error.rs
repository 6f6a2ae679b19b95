//! Error types for perfect hash generation.
//!
//! Every failure the generator can report is fatal for the run: coordinate
//! collisions and matcher failures are retried internally and only surface
//! here once every growth option is exhausted.

use thiserror::Error;

use crate::keys::KeyKind;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No keys were supplied. There is no valid hash range `[0, 0)`.
    #[error("cannot build a perfect hash for an empty key set")]
    EmptyKeySet,

    #[error("too many keys: {count} (at most {max} are supported)")]
    TooManyKeys { count: usize, max: usize },

    /// A key record does not match the key mode selected for the run.
    #[error("expected a {expected} key, found a {found} key")]
    KeyKindMismatch { expected: KeyKind, found: KeyKind },

    /// Two keys in the input are identical.
    #[error("duplicate key: {key}")]
    DuplicateKey { key: String },

    /// Every duplicate found by a complete collision scan.
    #[error("duplicate keys: {}", keys.join(", "))]
    DuplicateKeys { keys: Vec<String> },

    /// A user supplied coordinate is outside what the tables can address.
    #[error("coordinate {coordinate} = {value} is too large (limit {limit})")]
    CoordinateTooLarge {
        coordinate: char,
        value: u32,
        limit: u64,
    },

    #[error("cannot find distinct (a, b) for all keys (alen {alen}, blen {blen}, smax {smax})")]
    NoDistinctCoordinates { alen: u32, blen: u32, smax: u32 },

    #[error("cannot build a perfect hash for this key set (blen {blen}, smax {smax})")]
    NoPerfectHash { blen: u32, smax: u32 },

    /// A working table could not be allocated.
    #[error("failed to allocate {table} table of {len} entries")]
    Allocation { table: &'static str, len: usize },
}

/// Allocates a working table of `len` copies of `fill`, reporting allocation
/// failure instead of aborting.
pub(crate) fn try_table<T: Clone>(table: &'static str, len: usize, fill: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| Error::Allocation { table, len })?;
    v.resize(len, fill);
    Ok(v)
}
