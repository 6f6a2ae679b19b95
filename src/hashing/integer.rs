//! Integer key analysis.
//!
//! Integer key sets (switch-statement case labels, opcodes, enum
//! discriminants) often differ only in a narrow run of bits. When that run is
//! already an injective index into the hash range, the perfect hash is a
//! shift and a mask, with no adjustment table at all.

use crate::keys::{KeySet, RawKey};

/// The bits in which a set of integers differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitInterval {
    /// Bits that differ between at least two keys.
    pub diffbits: u32,
    /// Lowest differing bit (0 when all keys are equal).
    pub lowbit: u32,
    /// Highest differing bit (0 when all keys are equal).
    pub highbit: u32,
}

impl BitInterval {
    pub fn of<I: IntoIterator<Item = u32>>(values: I) -> Self {
        let mut values = values.into_iter();
        let diffbits = match values.next() {
            Some(first) => values.fold(0, |acc, v| acc | (v ^ first)),
            None => 0,
        };
        if diffbits == 0 {
            return Self {
                diffbits,
                lowbit: 0,
                highbit: 0,
            };
        }
        Self {
            diffbits,
            lowbit: diffbits.trailing_zeros(),
            highbit: 31 - diffbits.leading_zeros(),
        }
    }
}

/// A perfect hash of the form `(key >> shift) & mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectMask {
    pub shift: u32,
    pub mask: u32,
}

impl DirectMask {
    #[inline]
    pub fn apply(&self, value: u32) -> u32 {
        (value >> self.shift) & self.mask
    }
}

/// Looks for a shift and a mask of `smax - 1` that already maps every key to
/// a distinct value below `range`.
pub fn find_direct(keys: &KeySet, smax: u32, range: u32) -> Option<DirectMask> {
    let values = || {
        keys.iter().filter_map(|(_, key)| match key.raw() {
            RawKey::Integer(v) => Some(*v),
            _ => None,
        })
    };
    let interval = BitInterval::of(values());
    if interval.diffbits == 0 || range == 0 {
        return None;
    }

    let direct = DirectMask {
        shift: interval.lowbit,
        mask: smax.saturating_sub(1),
    };
    // A full 32 bit domain would need a 4 GiB occupancy table; never worth it.
    if direct.mask >= 1 << 24 {
        return None;
    }
    let mut seen = vec![false; range as usize];
    for value in values() {
        let hash = direct.apply(value) as usize;
        match seen.get_mut(hash) {
            Some(slot) if !*slot => *slot = true,
            _ => return None,
        }
    }
    Some(direct)
}
