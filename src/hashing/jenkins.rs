//! # Jenkins Hashes
//!
//! The initial hashes used to derive `(a, b)` coordinates from keys. All of them are
//! **32-bit**, non-cryptographic and take a `level` that perturbs the initial state;
//! the generator feeds a different level on every trial.
//!
//! ## Functions
//! - [`lookup`]: Bob Jenkins' `lookup` hash, 12 bytes per block with the key length
//!   folded into the final block.
//! - [`checksum`]: an eight word variant (32 bytes per block) producing 256 bits of
//!   state, used when `(a, b)` needs more than 32 bits.
//! - [`inline_hash`]: a rotate-xor-add accumulator simple enough to be inlined into
//!   any loop that already walks the key.
//! - [`hash_u32`]: a single-block mix for 32-bit integer keys.

use crate::config::GOLDEN_RATIO;

/// Number of state words used by [`checksum`].
pub const CHECKSTATE: usize = 8;

#[inline]
fn mix(mut a: u32, mut b: u32, mut c: u32) -> (u32, u32, u32) {
    a = a.wrapping_sub(b).wrapping_sub(c) ^ (c >> 13);
    b = b.wrapping_sub(c).wrapping_sub(a) ^ (a << 8);
    c = c.wrapping_sub(a).wrapping_sub(b) ^ (b >> 13);
    a = a.wrapping_sub(b).wrapping_sub(c) ^ (c >> 12);
    b = b.wrapping_sub(c).wrapping_sub(a) ^ (a << 16);
    c = c.wrapping_sub(a).wrapping_sub(b) ^ (b >> 5);
    a = a.wrapping_sub(b).wrapping_sub(c) ^ (c >> 3);
    b = b.wrapping_sub(c).wrapping_sub(a) ^ (a << 10);
    c = c.wrapping_sub(a).wrapping_sub(b) ^ (b >> 15);
    (a, b, c)
}

#[inline]
fn mix8(s: &mut [u32; CHECKSTATE]) {
    s[0] ^= s[1] << 11;
    s[3] = s[3].wrapping_add(s[0]);
    s[1] = s[1].wrapping_add(s[2]);
    s[1] ^= s[2] >> 2;
    s[4] = s[4].wrapping_add(s[1]);
    s[2] = s[2].wrapping_add(s[3]);
    s[2] ^= s[3] << 8;
    s[5] = s[5].wrapping_add(s[2]);
    s[3] = s[3].wrapping_add(s[4]);
    s[3] ^= s[4] >> 16;
    s[6] = s[6].wrapping_add(s[3]);
    s[4] = s[4].wrapping_add(s[5]);
    s[4] ^= s[5] << 10;
    s[7] = s[7].wrapping_add(s[4]);
    s[5] = s[5].wrapping_add(s[6]);
    s[5] ^= s[6] >> 4;
    s[0] = s[0].wrapping_add(s[5]);
    s[6] = s[6].wrapping_add(s[7]);
    s[6] ^= s[7] << 8;
    s[1] = s[1].wrapping_add(s[6]);
    s[7] = s[7].wrapping_add(s[0]);
    s[7] ^= s[0] >> 9;
    s[2] = s[2].wrapping_add(s[7]);
    s[0] = s[0].wrapping_add(s[1]);
}

#[inline]
fn word(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Hashes `key` into 32 bits, starting from `level`.
pub fn lookup(key: &[u8], level: u32) -> u32 {
    let mut a = GOLDEN_RATIO;
    let mut b = GOLDEN_RATIO;
    let mut c = level;

    let mut blocks = key.chunks_exact(12);
    for block in &mut blocks {
        a = a.wrapping_add(word(&block[0..4]));
        b = b.wrapping_add(word(&block[4..8]));
        c = c.wrapping_add(word(&block[8..12]));
        (a, b, c) = mix(a, b, c);
    }

    // The low byte of c is reserved for the length.
    c = c.wrapping_add(key.len() as u32);
    for (i, &byte) in blocks.remainder().iter().enumerate() {
        let byte = byte as u32;
        match i {
            0..=3 => a = a.wrapping_add(byte << (8 * i)),
            4..=7 => b = b.wrapping_add(byte << (8 * (i - 4))),
            _ => c = c.wrapping_add(byte << (8 * (i - 7))),
        }
    }
    let (_, _, c) = mix(a, b, c);
    c
}

/// Hashes `key` into the eight words of `state`.
///
/// Each word of `state` should be initialised by the caller (usually all to the
/// same level). Unlike [`lookup`], the result has enough independent bits for
/// `(a, b)` coordinates wider than 32 bits in total.
pub fn checksum(key: &[u8], state: &mut [u32; CHECKSTATE]) {
    let mut s = *state;

    let mut blocks = key.chunks_exact(32);
    for block in &mut blocks {
        for (i, bytes) in block.chunks_exact(4).enumerate() {
            s[i] = s[i].wrapping_add(word(bytes));
        }
        for _ in 0..4 {
            mix8(&mut s);
        }
    }

    // As in lookup, the low byte of the last word holds the length.
    s[7] = s[7].wrapping_add(key.len() as u32);
    for (i, &byte) in blocks.remainder().iter().enumerate() {
        let byte = byte as u32;
        if i < 28 {
            s[i / 4] = s[i / 4].wrapping_add(byte << (8 * (i % 4)));
        } else {
            s[7] = s[7].wrapping_add(byte << (8 * (i - 27)));
        }
    }
    for _ in 0..4 {
        mix8(&mut s);
    }

    *state = s;
}

/// The inline initial hash: `h = (c ^ h) + ((h << 26) + (h >> 6))` for every byte `c`.
pub fn inline_hash(key: &[u8], level: u32) -> u32 {
    key.iter().fold(level, |h, &c| {
        (c as u32 ^ h).wrapping_add(h.rotate_right(6))
    })
}

/// Mixes a 32-bit integer key with `level`.
pub fn hash_u32(value: u32, level: u32) -> u32 {
    let (_, _, c) = mix(
        GOLDEN_RATIO.wrapping_add(value),
        GOLDEN_RATIO,
        level.wrapping_add(4),
    );
    c
}
