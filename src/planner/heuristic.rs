//! Initial table sizes.
//!
//! The sizes only decide how many trials a run takes, never whether its
//! result is correct, so the heuristic is a replaceable trait. The planner
//! rounds whatever it returns to powers of two within legal bounds.

use std::fmt;

use crate::config::{ceil_log2, HashForm, KeyMode, Perfection, Speed, USE_SCRAMBLE};

/// Working table sizes of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSizes {
    /// `a` lies in `[0, alen)`.
    pub alen: u32,
    /// `b` lies in `[0, blen)`; one adjustment table entry per `b`.
    pub blen: u32,
    /// Power of two bounding every scrambled value and every non-minimal hash.
    pub smax: u32,
}

/// Chooses the starting `alen`, `blen` and `smax` for a run.
pub trait SizeHeuristic: fmt::Debug {
    fn initial_sizes(&self, nkeys: u32, form: &HashForm) -> TableSizes;
}

/// Empirically tuned starting sizes.
///
/// `blen` is kept as small as the key density allows since it is the size of
/// the emitted table. For minimal hashes `alen` stays well below `nkeys`:
/// a bucket whose `a` values spread over the whole domain rarely has a
/// value putting all of them below `nkeys`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHeuristic;

/// `nkeys <= smax * num / den`
fn at_most(nkeys: u32, smax: u32, num: u64, den: u64) -> bool {
    u64::from(nkeys) * den <= u64::from(smax) * num
}

impl SizeHeuristic for DefaultHeuristic {
    fn initial_sizes(&self, nkeys: u32, form: &HashForm) -> TableSizes {
        let mut smax = 1u32 << ceil_log2(nkeys);
        let fast = form.speed == Speed::Fast;

        let (alen, blen) = match form.perfection {
            Perfection::Normal => {
                if fast && !at_most(nkeys, smax, 4, 5) {
                    smax *= 2;
                }
                let s = smax;
                let mut blen = if form.mode == KeyMode::Integer && s < 32 {
                    s
                } else if s / 4 <= 1 << 14 {
                    if at_most(nkeys, s, 14, 25) {
                        s / 32
                    } else if at_most(nkeys, s, 37, 50) {
                        s / 16
                    } else {
                        s / 8
                    }
                } else if at_most(nkeys, s, 3, 5) {
                    s / 16
                } else if at_most(nkeys, s, 4, 5) {
                    s / 8
                } else {
                    s / 4
                };
                if fast && blen < s / 8 {
                    blen = s / 8;
                }
                (s, blen)
            }
            Perfection::Minimal => {
                let s = smax;
                let below_5_8 = at_most(nkeys, s, 5, 8);
                match ceil_log2(s) {
                    0..=8 => (s / 2, s / 2),
                    9..=17 if fast => (s / 2, s / 4),
                    9..=17 if s / 4 < USE_SCRAMBLE => {
                        let len = if at_most(nkeys, s, 13, 25) { s / 8 } else { s / 4 };
                        (len, len)
                    }
                    9..=17 => {
                        let alen = if below_5_8 {
                            s / 8
                        } else if at_most(nkeys, s, 3, 4) {
                            s / 4
                        } else {
                            s / 2
                        };
                        (alen, s / 4)
                    }
                    18 if fast => (s / 2, s / 2),
                    // Keep alen * blen within one 32 bit initial hash.
                    18 => (s / 8, if below_5_8 { s / 4 } else { s / 2 }),
                    19 | 20 if below_5_8 => (s / 8, s / 4),
                    _ => (s / 2, s / 2),
                }
            }
        };

        TableSizes {
            alen: alen.max(1),
            blen: blen.max(1),
            smax,
        }
    }
}
