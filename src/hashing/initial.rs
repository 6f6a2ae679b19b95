//! # Initial Hasher
//!
//! Derives the coordinate pair `(a, b)` of every key for one trial, with `a` in
//! `[0, alen)` and `b` in `[0, blen)`. `alen` and `blen` are powers of two so
//! both coordinates are bit fields of one initial hash value:
//!
//! | mode      | hash                          | `a`                    | `b`                    |
//! |-----------|-------------------------------|------------------------|------------------------|
//! | `Normal`  | `lookup(key, level)`          | high `log2(alen)` bits | low `log2(blen)` bits  |
//! | `Normal`* | `checksum(key, [level; 8])`   | `state[0] & (alen-1)`  | `state[1] & (blen-1)`  |
//! | `Inline`  | `inline_hash(key, level)`     | low `log2(alen)` bits  | high `log2(blen)` bits |
//! | `Integer` | `hash_u32(key, level)`        | high `log2(alen)` bits | low `log2(blen)` bits  |
//! | `Pair`    | none                          | `a`                    | `b`                    |
//!
//! (*) when `log2(alen) + log2(blen) > 32` a single 32-bit word cannot hold both
//! coordinates.
//!
//! `level` is `salt * 0x9e3779b9`. The same [`InitialHash`] value is kept in
//! the finished [`PerfectHash`](crate::PerfectHash) so lookups compute exactly
//! the coordinates the search used.

use crate::config::{ceil_log2, KeyMode, GOLDEN_RATIO};
use crate::hashing::integer::DirectMask;
use crate::hashing::jenkins::{self, CHECKSTATE};
use crate::keys::{KeyRef, KeySet};

/// The initial hash of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialHash {
    /// A single key always hashes to 0.
    Constant,
    Lookup { level: u32, alen: u32, blen: u32 },
    Checksum { level: u32, alen: u32, blen: u32 },
    Inline { level: u32, alen: u32, blen: u32 },
    Integer { level: u32, alen: u32, blen: u32 },
    /// The keys are already a perfect hash once shifted and masked.
    Direct(DirectMask),
    /// Coordinates are supplied by the caller.
    Pair { blen: u32 },
}

/// The salt multiplied out into the initial state of the hash.
pub fn level(salt: u32) -> u32 {
    salt.wrapping_mul(GOLDEN_RATIO)
}

#[inline]
fn high_low(hash: u32, alen: u32, blen: u32) -> (u32, u32) {
    let loga = ceil_log2(alen);
    let a = if loga > 0 { hash >> (32 - loga) } else { 0 };
    (a, hash & blen.wrapping_sub(1))
}

#[inline]
fn low_high(hash: u32, alen: u32, blen: u32) -> (u32, u32) {
    let logb = ceil_log2(blen);
    let b = if logb > 0 { hash >> (32 - logb) } else { 0 };
    (hash & alen.wrapping_sub(1), b)
}

impl InitialHash {
    /// The initial hash for `mode` with the given table sizes and salt.
    pub fn for_trial(mode: KeyMode, alen: u32, blen: u32, salt: u32) -> Self {
        let level = level(salt);
        match mode {
            KeyMode::Normal if ceil_log2(alen) + ceil_log2(blen) > 32 => {
                InitialHash::Checksum { level, alen, blen }
            }
            KeyMode::Normal => InitialHash::Lookup { level, alen, blen },
            KeyMode::Inline => InitialHash::Inline { level, alen, blen },
            KeyMode::Integer => InitialHash::Integer { level, alen, blen },
            KeyMode::Pair => InitialHash::Pair { blen },
        }
    }

    /// Whether lookups must go through the adjustment table.
    pub fn uses_table(&self) -> bool {
        !matches!(self, InitialHash::Constant | InitialHash::Direct(_))
    }

    /// Computes `(a, b)` for one key.
    ///
    /// Keys of the wrong kind for this hash map to `(0, 0)`; callers check the
    /// kind first.
    pub fn coordinates(&self, key: KeyRef<'_>) -> (u32, u32) {
        match (*self, key) {
            (InitialHash::Constant, _) => (0, 0),
            (InitialHash::Lookup { level, alen, blen }, KeyRef::Bytes(bytes)) => {
                high_low(jenkins::lookup(bytes, level), alen, blen)
            }
            (InitialHash::Checksum { level, alen, blen }, KeyRef::Bytes(bytes)) => {
                let mut state = [level; CHECKSTATE];
                jenkins::checksum(bytes, &mut state);
                (state[0] & (alen - 1), state[1] & (blen - 1))
            }
            (InitialHash::Inline { level, alen, blen }, KeyRef::Bytes(bytes)) => {
                low_high(jenkins::inline_hash(bytes, level), alen, blen)
            }
            (InitialHash::Integer { level, alen, blen }, KeyRef::Integer(value)) => {
                high_low(jenkins::hash_u32(value, level), alen, blen)
            }
            (InitialHash::Direct(direct), KeyRef::Integer(value)) => (direct.apply(value), 0),
            (InitialHash::Pair { blen }, KeyRef::Pair(a, b)) => (a, b & blen.wrapping_sub(1)),
            _ => (0, 0),
        }
    }

    /// Rewrites the coordinates of every key for this trial.
    ///
    /// Pairs are left untouched: their coordinates are the keys themselves.
    pub fn assign(&self, keys: &mut KeySet) {
        if matches!(self, InitialHash::Pair { .. }) {
            return;
        }
        keys.assign(|raw| self.coordinates(raw.as_key_ref()));
    }
}
