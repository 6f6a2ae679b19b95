//! # Capacity Planner
//!
//! Drives the search for a perfect hash. Each trial derives `(a, b)` for
//! every key from a salt, buckets the keys by `b`, and hands the buckets to
//! the [`Matcher`](crate::matcher::Matcher).
//!
//! ## Retry policy
//! - Two keys share `(a, b)`: move on to the next salt. After
//!   [`RetryBudget::distinct_pairs`] such salts in a row, widen `alen` (while
//!   it is below its cap) or else `blen`.
//! - The matcher fails: after the mode's matcher budget is used up, double
//!   `blen` and retry the same salt, which is known to give distinct pairs.
//!   Otherwise move on to the next salt.
//! - The matcher fails with `blen` already at `smax`: move on to the next
//!   salt at full size, up to [`RetryBudget::full_size_salts`] times.
//! - Nothing left to grow or try: the run fails.
//!
//! User supplied pairs skip the salt search altogether: the pairs are the
//! coordinates, so the matcher gets one attempt at `smax` and one at `2 * smax`.

pub mod heuristic;

use log::{debug, info, trace, warn};

use crate::bucket::{Bucket, BucketIndex, CollisionScan, Indexed};
use crate::config::{ceil_log2, HashForm, KeyMode, RetryBudget, MAX_KEYS};
use crate::error::{Error, Result};
use crate::hashing::integer::find_direct;
use crate::hashing::{InitialHash, Scramble};
use crate::keys::KeySet;
use crate::matcher::{MatchParams, Matcher, Matching};

pub use heuristic::{DefaultHeuristic, SizeHeuristic, TableSizes};

/// Largest bucket table user supplied `b` values may ask for.
const MAX_PAIR_BLEN: u64 = 1 << 30;

/// Counters describing how much work a run took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Distinct salts used by the initial hash.
    pub salts_tried: u32,
    /// Trials where two keys shared `(a, b)`.
    pub collisions: u32,
    /// Trials where distinct pairs could not be matched.
    pub matcher_failures: u32,
    /// Times `alen`, `blen` or `smax` was doubled.
    pub growths: u32,
}

/// The tables found by a successful run.
#[derive(Debug, Clone)]
pub struct Solution {
    pub initial: InitialHash,
    pub sizes: TableSizes,
    /// Final hash values lie in `[0, range)`.
    pub range: u32,
    /// Salt of the successful trial; `None` when no salt was involved.
    pub salt: Option<u32>,
    /// Assignment value of every bucket. Empty when no table is needed.
    pub values: Vec<u32>,
    /// Present whenever `values` is.
    pub scramble: Option<Scramble>,
    pub stats: BuildStats,
}

/// Runs the search for one key set.
#[derive(Debug)]
pub struct Planner<'h> {
    form: HashForm,
    retry: RetryBudget,
    first_salt: u32,
    heuristic: &'h dyn SizeHeuristic,
}

impl<'h> Planner<'h> {
    pub fn new(
        form: HashForm,
        retry: RetryBudget,
        first_salt: u32,
        heuristic: &'h dyn SizeHeuristic,
    ) -> Self {
        Self {
            form,
            retry,
            first_salt,
            heuristic,
        }
    }

    /// Finds a perfect hash for `keys`, rewriting their coordinates as it goes.
    pub fn run(&self, keys: &mut KeySet) -> Result<Solution> {
        let expected = self.form.mode.key_kind();
        if keys.kind() != expected {
            return Err(Error::KeyKindMismatch {
                expected,
                found: keys.kind(),
            });
        }
        if keys.is_empty() {
            return Err(Error::EmptyKeySet);
        }
        if keys.len() > MAX_KEYS {
            return Err(Error::TooManyKeys {
                count: keys.len(),
                max: MAX_KEYS,
            });
        }

        let solution = if keys.len() == 1 {
            constant()
        } else if self.form.mode == KeyMode::Pair {
            self.find_pairs(keys)?
        } else {
            self.find_hashed(keys)?
        };
        info!(
            "built perfect hash for {} keys: {} (table size {}, range {}, salt {:?})",
            keys.len(),
            self.form,
            solution.values.len(),
            solution.range,
            solution.salt
        );
        debug!("{:?}", solution.stats);
        Ok(solution)
    }

    /// The starting sizes, rounded to powers of two within legal bounds.
    fn initial_sizes(&self, nkeys: u32) -> TableSizes {
        let proposed = self.heuristic.initial_sizes(nkeys, &self.form);
        let floor = 1u32 << ceil_log2(nkeys);
        let smax = pow2_at_least(proposed.smax).max(floor);
        let sizes = TableSizes {
            alen: pow2_at_least(proposed.alen).min(max_alen(&self.form, smax)),
            blen: pow2_at_least(proposed.blen).min(smax),
            smax,
        };
        if sizes != proposed {
            debug!("adjusted initial sizes {:?} to {:?}", proposed, sizes);
        }
        sizes
    }

    fn find_hashed(&self, keys: &mut KeySet) -> Result<Solution> {
        let nkeys = keys.len() as u32;
        let minimal = self.form.is_minimal();
        let TableSizes {
            mut alen,
            mut blen,
            smax,
        } = self.initial_sizes(nkeys);
        let range = if minimal { nkeys } else { smax };
        let max_alen = max_alen(&self.form, smax);
        let mut stats = BuildStats::default();

        if self.form.mode == KeyMode::Integer {
            if let Some(direct) = find_direct(keys, smax, range) {
                info!(
                    "keys are a perfect hash once shifted by {} and masked with {:#x}",
                    direct.shift, direct.mask
                );
                return Ok(Solution {
                    initial: InitialHash::Direct(direct),
                    sizes: TableSizes {
                        alen: smax,
                        blen: 1,
                        smax,
                    },
                    range,
                    salt: None,
                    values: Vec::new(),
                    scramble: None,
                    stats,
                });
            }
        }

        let params = MatchParams {
            range,
            transitive: self.form.transitive(),
        };
        let matcher_budget = self.form.matcher_budget(&self.retry);
        let mut scramble = Scramble::new(smax, blen)?;
        let mut matcher = Matcher::new();
        let mut bad_init = 0;
        let mut bad_perfect = 0;
        let mut full_size_failures = 0;
        let mut salt = self.first_salt;

        loop {
            let initial = InitialHash::for_trial(self.form.mode, alen, blen, salt);
            initial.assign(keys);

            let mut index = match BucketIndex::build(keys, blen, CollisionScan::FirstHit)? {
                Indexed::Distinct(index) => index,
                Indexed::Collision { first, second } => {
                    stats.collisions += 1;
                    trace!(
                        "salt {}: {} and {} share (a, b)",
                        salt,
                        keys[first].raw(),
                        keys[second].raw()
                    );
                    bad_init += 1;
                    if bad_init >= self.retry.distinct_pairs {
                        if alen < max_alen {
                            alen *= 2;
                            debug!("no distinct (a, b) after {} salts, alen grows to {}", bad_init, alen);
                        } else if blen < smax {
                            blen *= 2;
                            scramble = Scramble::new(smax, blen)?;
                            debug!("no distinct (a, b) after {} salts, blen grows to {}", bad_init, blen);
                        } else {
                            return Err(exhausted(keys, alen, blen, smax));
                        }
                        stats.growths += 1;
                        bad_init = 0;
                        bad_perfect = 0;
                    }
                    salt = salt.wrapping_add(1);
                    continue;
                }
            };
            debug!("found distinct (a, b) on salt {}", salt);

            match matcher.solve(keys, &mut index, &scramble, params)? {
                Matching::Complete => {
                    stats.salts_tried = salt.wrapping_sub(self.first_salt).wrapping_add(1);
                    return Ok(Solution {
                        initial,
                        sizes: TableSizes { alen, blen, smax },
                        range,
                        salt: Some(salt),
                        values: assignment(&index),
                        scramble: Some(scramble),
                        stats,
                    });
                }
                Matching::Unresolved { size, .. } => {
                    stats.matcher_failures += 1;
                    debug!("failed to map bucket of {} keys at table size {}", size, blen);
                    if blen >= smax {
                        full_size_failures += 1;
                        if full_size_failures >= self.retry.full_size_salts {
                            warn!(
                                "no salt mapped every bucket at full table size after {} tries",
                                full_size_failures
                            );
                            return Err(Error::NoPerfectHash { blen, smax });
                        }
                        salt = salt.wrapping_add(1);
                        continue;
                    }
                    bad_perfect += 1;
                    if bad_perfect >= matcher_budget {
                        blen *= 2;
                        scramble = Scramble::new(smax, blen)?;
                        stats.growths += 1;
                        bad_perfect = 0;
                        debug!("blen grows to {}, retrying salt {}", blen, salt);
                        continue;
                    }
                    salt = salt.wrapping_add(1);
                }
            }
        }
    }

    fn find_pairs(&self, keys: &mut KeySet) -> Result<Solution> {
        let nkeys = keys.len() as u32;
        let minimal = self.form.is_minimal();
        let mut smax = 1u32 << ceil_log2(nkeys);
        let (max_a, max_b) = keys.max_coordinates();

        let alen = pow2_above(max_a);
        let a_limit = 2 * u64::from(smax);
        if alen > a_limit {
            return Err(Error::CoordinateTooLarge {
                coordinate: 'a',
                value: max_a,
                limit: a_limit,
            });
        }
        let blen = pow2_above(max_b);
        if blen > MAX_PAIR_BLEN {
            return Err(Error::CoordinateTooLarge {
                coordinate: 'b',
                value: max_b,
                limit: MAX_PAIR_BLEN,
            });
        }
        let (alen, blen) = (alen as u32, blen as u32);
        let initial = InitialHash::Pair { blen };

        let mut index = match BucketIndex::build(keys, blen, CollisionScan::FirstHit)? {
            Indexed::Distinct(index) => index,
            // Pairs are their own coordinates, so sharing (a, b) means equal keys.
            Indexed::Collision { second, .. } => {
                return Err(Error::DuplicateKey {
                    key: keys[second].raw().to_string(),
                })
            }
        };

        let mut stats = BuildStats::default();
        let mut matcher = Matcher::new();
        let transitive = self.form.transitive();
        for attempt in 0..2 {
            if attempt > 0 {
                smax *= 2;
                stats.growths += 1;
                debug!("smax grows to {}", smax);
            }
            let range = if minimal { nkeys } else { smax };
            let scramble = Scramble::new(smax, blen)?;
            let params = MatchParams { range, transitive };
            match matcher.solve(keys, &mut index, &scramble, params)? {
                Matching::Complete => {
                    return Ok(Solution {
                        initial,
                        sizes: TableSizes { alen, blen, smax },
                        range,
                        salt: None,
                        values: assignment(&index),
                        scramble: Some(scramble),
                        stats,
                    });
                }
                Matching::Unresolved { size, .. } => {
                    stats.matcher_failures += 1;
                    debug!("failed to map bucket of {} keys with smax {}", size, smax);
                }
            }
        }
        Err(Error::NoPerfectHash { blen, smax })
    }
}

/// A single key hashes to 0.
fn constant() -> Solution {
    Solution {
        initial: InitialHash::Constant,
        sizes: TableSizes {
            alen: 1,
            blen: 1,
            smax: 1,
        },
        range: 1,
        salt: None,
        values: Vec::new(),
        scramble: None,
        stats: BuildStats::default(),
    }
}

fn assignment(index: &BucketIndex) -> Vec<u32> {
    index.buckets().iter().map(Bucket::value).collect()
}

/// The widest useful `alen`: beyond `smax / 2` a minimal hash rarely finds
/// a value keeping a whole bucket below `nkeys`.
fn max_alen(form: &HashForm, smax: u32) -> u32 {
    if form.is_minimal() {
        (smax / 2).max(1)
    } else {
        smax
    }
}

fn pow2_at_least(value: u32) -> u32 {
    value.max(1).checked_next_power_of_two().unwrap_or(1 << 31)
}

/// Smallest power of two strictly greater than `value`.
fn pow2_above(value: u32) -> u64 {
    (u64::from(value) + 1).next_power_of_two()
}

/// Reports why no trial gave distinct pairs, naming duplicates if there are any.
fn exhausted(keys: &KeySet, alen: u32, blen: u32, smax: u32) -> Error {
    warn!(
        "no distinct (a, b) with alen {}, blen {}, smax {}; scanning for duplicates",
        alen, blen, smax
    );
    match BucketIndex::build(keys, blen, CollisionScan::Complete) {
        Err(err) => err,
        Ok(_) => Error::NoDistinctCoordinates { alen, blen, smax },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Perfection, Speed};
    use crate::keys::KeyKind;

    /// Starts every run with a single bucket.
    #[derive(Debug)]
    struct OneBucket;

    impl SizeHeuristic for OneBucket {
        fn initial_sizes(&self, nkeys: u32, _form: &HashForm) -> TableSizes {
            TableSizes {
                alen: 1,
                blen: 1,
                smax: nkeys,
            }
        }
    }

    fn words(n: usize) -> KeySet {
        KeySet::from_records(KeyKind::Bytes, (0..n).map(|i| format!("key-{i}"))).unwrap()
    }

    fn final_hashes(keys: &KeySet, solution: &Solution) -> Vec<u32> {
        keys.iter()
            .map(|(_, key)| {
                let (a, b) = solution.initial.coordinates(key.raw().as_key_ref());
                match &solution.scramble {
                    Some(scramble) => a ^ scramble.get(solution.values[b as usize]),
                    None => a,
                }
            })
            .collect()
    }

    fn assert_perfect(hashes: &[u32], range: u32) {
        let mut sorted = hashes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), hashes.len());
        assert!(hashes.iter().all(|&h| h < range));
    }

    #[test]
    fn test_minimal_strings() {
        let mut keys = words(50);
        let planner = Planner::new(HashForm::default(), RetryBudget::default(), 1, &DefaultHeuristic);
        let solution = planner.run(&mut keys).unwrap();
        assert_eq!(solution.range, 50);
        assert!(solution.salt.is_some());
        assert!(solution.stats.salts_tried >= 1);
        assert_perfect(&final_hashes(&keys, &solution), 50);
    }

    #[test]
    fn test_forced_growth() {
        let mut keys = words(40);
        let retry = RetryBudget {
            distinct_pairs: 8,
            matcher_strings: 1,
            ..RetryBudget::default()
        };
        let form = HashForm::new(KeyMode::Normal, Perfection::Normal, Speed::Slow);
        let planner = Planner::new(form, retry, 1, &OneBucket);
        let solution = planner.run(&mut keys).unwrap();
        assert!(solution.stats.growths > 0);
        assert!(solution.sizes.alen > 1 || solution.sizes.blen > 1);
        assert_perfect(&final_hashes(&keys, &solution), solution.range);
    }

    #[test]
    fn test_matcher_failure_regrows_same_salt() {
        // Salts 26 and 40 give distinct pairs that cannot be matched with
        // blen 4; salt 40 is then matched with blen 8.
        let mut keys = words(8);
        let planner = Planner::new(HashForm::default(), RetryBudget::default(), 1, &DefaultHeuristic);
        let solution = planner.run(&mut keys).unwrap();
        assert_eq!(solution.salt, Some(40));
        assert_eq!(
            solution.sizes,
            TableSizes {
                alen: 4,
                blen: 8,
                smax: 8
            }
        );
        assert_eq!(
            solution.stats,
            BuildStats {
                salts_tried: 40,
                collisions: 38,
                matcher_failures: 2,
                growths: 1,
            }
        );
        assert_perfect(&final_hashes(&keys, &solution), 8);
    }

    #[test]
    fn test_full_size_tables_keep_trying_salts() {
        let names = ["w20059", "w30842", "w33297", "w59533", "w60193"];
        let mut keys = KeySet::from_records(KeyKind::Bytes, names).unwrap();
        let planner = Planner::new(HashForm::default(), RetryBudget::default(), 1, &DefaultHeuristic);
        let solution = planner.run(&mut keys).unwrap();
        // Salt 2 fails at blen 4 and again at blen 8, salt 3 fails at blen 8.
        assert_eq!(solution.salt, Some(4));
        assert_eq!(solution.sizes.blen, solution.sizes.smax);
        assert_eq!(solution.stats.salts_tried, 4);
        assert_eq!(solution.stats.matcher_failures, 4);
        assert_eq!(solution.stats.growths, 1);
        assert_perfect(&final_hashes(&keys, &solution), 5);

        let retry = RetryBudget {
            full_size_salts: 2,
            ..RetryBudget::default()
        };
        let mut keys = KeySet::from_records(KeyKind::Bytes, names).unwrap();
        let planner = Planner::new(HashForm::default(), retry, 1, &DefaultHeuristic);
        assert_eq!(
            planner.run(&mut keys).unwrap_err(),
            Error::NoPerfectHash { blen: 8, smax: 8 }
        );
    }

    #[test]
    fn test_full_size_integer_tables_keep_trying_salts() {
        let values = [
            1_399_281_601u32,
            1_708_737_497,
            1_900_924_436,
            2_549_276_448,
            2_927_066_001,
            3_835_653_666,
            4_234_027_969,
            4_251_184_895,
        ];
        let mut keys = KeySet::from_records(KeyKind::Integer, values).unwrap();
        let form = HashForm::new(KeyMode::Integer, Perfection::Minimal, Speed::Slow);
        let planner = Planner::new(form, RetryBudget::default(), 1, &DefaultHeuristic);
        let solution = planner.run(&mut keys).unwrap();
        assert_eq!(solution.salt, Some(6));
        assert_eq!(solution.sizes.blen, 8);
        assert_eq!(solution.stats.matcher_failures, 2);
        assert_perfect(&final_hashes(&keys, &solution), 8);
    }

    #[test]
    fn test_exhausted_search_scans_for_duplicates() {
        // Every trial stops at the delta/right collision before reaching a
        // duplicate, so only the complete scan finds them.
        let mut keys =
            KeySet::from_records(KeyKind::Bytes, ["delta", "right", "delta", "right"]).unwrap();
        let retry = RetryBudget {
            distinct_pairs: 1,
            ..RetryBudget::default()
        };
        let planner = Planner::new(HashForm::default(), retry, 1, &OneBucket);
        assert_eq!(
            planner.run(&mut keys).unwrap_err(),
            Error::DuplicateKeys {
                keys: vec!["\"delta\"".to_string(), "\"right\"".to_string()]
            }
        );
    }

    #[test]
    fn test_exhausted_search_without_duplicates() {
        let mut keys = KeySet::from_records(KeyKind::Bytes, ["x", "y"]).unwrap();
        let retry = RetryBudget {
            distinct_pairs: 1,
            ..RetryBudget::default()
        };
        let planner = Planner::new(HashForm::default(), retry, 3, &OneBucket);
        assert_eq!(
            planner.run(&mut keys).unwrap_err(),
            Error::NoDistinctCoordinates {
                alen: 1,
                blen: 2,
                smax: 2
            }
        );
    }

    #[test]
    fn test_heuristic_output_is_normalized() {
        let planner = Planner::new(HashForm::default(), RetryBudget::default(), 1, &OneBucket);
        // smax 40 rounds up to 64, alen stays within smax / 2.
        let sizes = planner.initial_sizes(40);
        assert_eq!(
            sizes,
            TableSizes {
                alen: 1,
                blen: 1,
                smax: 64
            }
        );
    }

    #[test]
    fn test_wrong_key_kind() {
        let mut keys = words(3);
        let form = HashForm::new(KeyMode::Integer, Perfection::Minimal, Speed::Slow);
        let planner = Planner::new(form, RetryBudget::default(), 1, &DefaultHeuristic);
        assert!(matches!(
            planner.run(&mut keys),
            Err(Error::KeyKindMismatch { .. })
        ));
    }

    #[test]
    fn test_pairs_skip_salts() {
        let mut keys = KeySet::from_records(KeyKind::Pair, [(0u32, 0u32), (0, 1), (1, 0)]).unwrap();
        let form = HashForm::new(KeyMode::Pair, Perfection::Minimal, Speed::Slow);
        let planner = Planner::new(form, RetryBudget::default(), 1, &DefaultHeuristic);
        let solution = planner.run(&mut keys).unwrap();
        assert_eq!(solution.salt, None);
        assert_eq!(solution.stats.salts_tried, 0);
        assert_eq!(solution.sizes.alen, 2);
        assert_eq!(solution.sizes.blen, 2);
        assert_perfect(&final_hashes(&keys, &solution), 3);
    }

    #[test]
    fn test_pair_a_too_large() {
        let mut keys = KeySet::from_records(KeyKind::Pair, [(0u32, 0u32), (9, 1)]).unwrap();
        let form = HashForm::new(KeyMode::Pair, Perfection::Normal, Speed::Slow);
        let planner = Planner::new(form, RetryBudget::default(), 1, &DefaultHeuristic);
        assert_eq!(
            planner.run(&mut keys).unwrap_err(),
            Error::CoordinateTooLarge {
                coordinate: 'a',
                value: 9,
                limit: 4
            }
        );
    }

    #[test]
    fn test_pair_b_too_large() {
        let mut keys =
            KeySet::from_records(KeyKind::Pair, [(0u32, 0u32), (1, u32::MAX)]).unwrap();
        let form = HashForm::new(KeyMode::Pair, Perfection::Normal, Speed::Slow);
        let planner = Planner::new(form, RetryBudget::default(), 1, &DefaultHeuristic);
        assert!(matches!(
            planner.run(&mut keys),
            Err(Error::CoordinateTooLarge { coordinate: 'b', .. })
        ));
    }

    #[test]
    fn test_pairs_retry_with_double_smax() {
        // a = 2 lies outside [0, 2) whatever the single bucket's value.
        let mut keys = KeySet::from_records(KeyKind::Pair, [(0u32, 0u32), (2, 0)]).unwrap();
        let form = HashForm::new(KeyMode::Pair, Perfection::Normal, Speed::Slow);
        let planner = Planner::new(form, RetryBudget::default(), 1, &DefaultHeuristic);
        let solution = planner.run(&mut keys).unwrap();
        assert_eq!(solution.sizes.smax, 4);
        assert_eq!(solution.range, 4);
        assert_eq!(solution.stats.matcher_failures, 1);
        assert_eq!(solution.stats.growths, 1);
        assert_perfect(&final_hashes(&keys, &solution), 4);
    }

    #[test]
    fn test_pairs_give_up_after_second_attempt() {
        let mut keys = KeySet::from_records(KeyKind::Pair, [(0u32, 0u32), (2, 0)]).unwrap();
        let form = HashForm::new(KeyMode::Pair, Perfection::Minimal, Speed::Slow);
        let planner = Planner::new(form, RetryBudget::default(), 1, &DefaultHeuristic);
        assert_eq!(
            planner.run(&mut keys).unwrap_err(),
            Error::NoPerfectHash { blen: 1, smax: 4 }
        );
    }

    #[test]
    fn test_duplicate_strings_rejected() {
        let mut keys = KeySet::from_records(KeyKind::Bytes, ["x", "y", "x"]).unwrap();
        let planner = Planner::new(HashForm::default(), RetryBudget::default(), 1, &DefaultHeuristic);
        assert!(matches!(
            planner.run(&mut keys),
            Err(Error::DuplicateKey { .. })
        ));
    }
}
