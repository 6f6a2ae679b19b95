//! # Scramble Table
//!
//! The final hash is `a ^ scramble[v]` where `v` is a bucket's assignment value.
//! Without scrambling, `a ^ v` clusters every bucket's keys around its `a`
//! values; the scramble table spreads consecutive assignment values over the
//! whole hash range.
//!
//! Entries are produced by [`permute`], a bijection of `[0, 2^nbits)` with
//! `permute(0) == 0`. That fixed point matters: a bucket left at assignment 0
//! contributes nothing to its keys' hashes, so a table of all zeros means
//! `hash == a`.

use crate::config::{ceil_log2, SCRAMBLE_RANGE, USE_SCRAMBLE};
use crate::error::{try_table, Result};

/// Computes `p(x)` where `p` is a fixed permutation of `[0, 2^nbits)`.
pub fn permute(mut x: u32, nbits: u32) -> u32 {
    if nbits == 0 {
        return 0;
    }
    let mask = if nbits >= 32 {
        u32::MAX
    } else {
        (1u32 << nbits) - 1
    };
    let const2 = 1 + nbits / 2;
    let const3 = 1 + nbits / 3;
    let const4 = 1 + nbits / 4;
    let const5 = 1 + nbits / 5;
    for _ in 0..20 {
        x = x.wrapping_add(x << const2) & mask;
        x ^= x >> const3;
        x = x.wrapping_add(x << const4) & mask;
        x ^= x >> const5;
    }
    x
}

/// Whether a bucket table of `blen` entries goes through the scramble table.
pub fn engaged(blen: u32) -> bool {
    blen >= USE_SCRAMBLE
}

/// Distinct values of `scramble[]` mapping `[0, len)` into `[0, smax)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scramble {
    smax: u32,
    values: Vec<u32>,
}

impl Scramble {
    /// Builds the table for a hash domain of `smax` and a bucket table of `blen`.
    ///
    /// When scrambling is engaged, assignment values are limited to
    /// [`SCRAMBLE_RANGE`] and the table is part of the output. Otherwise every
    /// value in `[0, smax)` is a candidate and the table only serves the search.
    pub fn new(smax: u32, blen: u32) -> Result<Self> {
        let len = if engaged(blen) {
            SCRAMBLE_RANGE.min(smax.max(1))
        } else {
            smax.max(1)
        };
        let nbits = ceil_log2(smax);
        let mut values = try_table("scramble", len as usize, 0u32)?;
        for (i, v) in values.iter_mut().enumerate() {
            *v = permute(i as u32, nbits);
        }
        Ok(Self { smax, values })
    }

    pub fn smax(&self) -> u32 {
        self.smax
    }

    /// Number of assignment values a bucket may take.
    pub fn limit(&self) -> u32 {
        self.values.len() as u32
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    #[inline]
    pub fn get(&self, value: u32) -> u32 {
        self.values[value as usize]
    }
}
