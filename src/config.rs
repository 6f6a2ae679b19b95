//! User directives for a generation run.
//!
//! A [`HashForm`] picks how keys are represented, whether the hash must be
//! minimal, and how hard the search should try. It is read once at the start
//! of a run and never changes mid-run.

use std::fmt;

use crate::keys::KeyKind;

/// Use the scramble table once the bucket table reaches this many entries.
pub const USE_SCRAMBLE: u32 = 4096;

/// Number of assignment values available when the scramble table is engaged.
pub const SCRAMBLE_RANGE: u32 = 256;

/// Largest supported key count. Table sizes are `u32` and may double twice.
pub const MAX_KEYS: usize = 1 << 30;

/// The golden ratio; turns a small salt into a well spread initial level.
pub const GOLDEN_RATIO: u32 = 0x9e37_79b9;

/// How keys are represented and hashed into `(a, b)` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// Byte strings hashed with Jenkins `lookup` (or `checksum` for very large tables).
    #[default]
    Normal,
    /// Byte strings hashed with a rotate-xor-add accumulator simple enough
    /// for the caller to fold into a loop that already walks the key.
    Inline,
    /// 32-bit integer keys.
    Integer,
    /// Caller supplied `(a, b)` pairs; no hashing happens.
    Pair,
}

impl KeyMode {
    /// The key representation this mode expects.
    pub fn key_kind(self) -> KeyKind {
        match self {
            KeyMode::Normal | KeyMode::Inline => KeyKind::Bytes,
            KeyMode::Integer => KeyKind::Integer,
            KeyMode::Pair => KeyKind::Pair,
        }
    }
}

/// Whether the hash range must be exactly `[0, nkeys)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Perfection {
    /// Hash values in `[0, nkeys)`.
    #[default]
    Minimal,
    /// Hash values in `[0, smax)` where `smax` is a power of two `>= nkeys`.
    /// Usually needs a smaller adjustment table.
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Speed {
    /// Generate quickly; skips the transitive augmenting search unless the
    /// hash is minimal.
    Fast,
    /// Spend time finding a small table.
    #[default]
    Slow,
}

/// The full set of user directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashForm {
    pub mode: KeyMode,
    pub perfection: Perfection,
    pub speed: Speed,
}

impl HashForm {
    pub fn new(mode: KeyMode, perfection: Perfection, speed: Speed) -> Self {
        Self {
            mode,
            perfection,
            speed,
        }
    }

    pub fn is_minimal(&self) -> bool {
        self.perfection == Perfection::Minimal
    }

    /// Whether the matcher may displace already placed buckets transitively.
    pub fn transitive(&self) -> bool {
        self.speed == Speed::Slow || self.is_minimal()
    }

    /// Number of matcher failures tolerated before the bucket table grows.
    pub fn matcher_budget(&self, budget: &RetryBudget) -> u32 {
        match self.mode {
            KeyMode::Integer => budget.matcher_integers,
            _ => budget.matcher_strings,
        }
        .max(1)
    }
}

impl fmt::Display for HashForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} keys, {} hash, {:?} search",
            self.mode,
            match self.perfection {
                Perfection::Minimal => "minimal",
                Perfection::Normal => "power-of-two",
            },
            self.speed
        )
    }
}

/// Retry budgets for the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Consecutive salts with colliding `(a, b)` before `alen` or `blen` grows.
    pub distinct_pairs: u32,
    /// Consecutive matcher failures before `blen` doubles, for string keys.
    pub matcher_strings: u32,
    /// Same as `matcher_strings`, for integer keys.
    pub matcher_integers: u32,
    /// Matcher failures tolerated once `blen` has reached `smax`. Each one
    /// moves on to a fresh salt at full size.
    pub full_size_salts: u32,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            distinct_pairs: 2048,
            matcher_strings: 2,
            matcher_integers: 1,
            full_size_salts: 2048,
        }
    }
}

/// Returns `ceil(log2(value))`, with `log2(0) == log2(1) == 0`.
pub fn ceil_log2(value: u32) -> u32 {
    if value <= 1 {
        0
    } else {
        32 - (value - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
        assert_eq!(ceil_log2(1 << 20), 20);
        assert_eq!(ceil_log2((1 << 20) + 1), 21);
        assert_eq!(ceil_log2(u32::MAX), 32);
    }

    #[test]
    fn test_default_form() {
        let form = HashForm::default();
        assert_eq!(form.mode, KeyMode::Normal);
        assert!(form.is_minimal());
        assert!(form.transitive());
    }

    #[test]
    fn test_transitive_only_when_slow_or_minimal() {
        let fast = HashForm::new(KeyMode::Normal, Perfection::Normal, Speed::Fast);
        assert!(!fast.transitive());
        let fast_minimal = HashForm::new(KeyMode::Normal, Perfection::Minimal, Speed::Fast);
        assert!(fast_minimal.transitive());
    }

    #[test]
    fn test_integer_budget_is_smaller() {
        let budget = RetryBudget::default();
        let ints = HashForm::new(KeyMode::Integer, Perfection::Minimal, Speed::Slow);
        let strings = HashForm::default();
        assert!(ints.matcher_budget(&budget) < strings.matcher_budget(&budget));
    }
}
