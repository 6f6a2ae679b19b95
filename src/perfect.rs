//! # Perfect Hash
//!
//! The finished hash function for a static key set, and the builder that
//! searches for it.
//!
//! A lookup computes the key's initial hash `(a, b)` exactly as the search
//! did, then combines `a` with the adjustment table entry for `b`:
//!
//! - small tables store scrambled values directly: `hash = a ^ tab[b]`;
//! - once `blen` reaches [`USE_SCRAMBLE`](crate::config::USE_SCRAMBLE) entries,
//!   `tab[b]` is a byte indexing a 256 entry scramble table:
//!   `hash = a ^ scramble[tab[b]]`.
//!
//! Single keys, directly indexable integers, and user supplied pairs that
//! never needed adjusting have no table at all.
//!
//! ## Example
//! ```rust
//! use phash::PerfectHashBuilder;
//!
//! let ph = PerfectHashBuilder::new()
//!     .build_strings(["apple", "banana", "cherry"])
//!     .unwrap();
//! let mut seen: Vec<u32> = ["apple", "banana", "cherry"]
//!     .iter()
//!     .map(|k| ph.hash_str(k).unwrap())
//!     .collect();
//! seen.sort_unstable();
//! assert_eq!(seen, vec![0, 1, 2]);
//! ```

use crate::config::{ceil_log2, HashForm, KeyMode, Perfection, RetryBudget, Speed};
use crate::error::{Error, Result};
use crate::hashing::scramble::engaged;
use crate::hashing::InitialHash;
use crate::keys::{KeyRef, KeySet, RawKey};
use crate::planner::{
    BuildStats, DefaultHeuristic, Planner, SizeHeuristic, Solution, TableSizes,
};

/// A perfect hash function for the keys it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfectHash {
    form: HashForm,
    nkeys: u32,
    range: u32,
    sizes: TableSizes,
    salt: Option<u32>,
    initial: InitialHash,
    tab: Vec<u32>,
    scramble: Option<Vec<u32>>,
    stats: BuildStats,
}

impl PerfectHash {
    fn from_solution(form: HashForm, nkeys: u32, solution: Solution) -> Self {
        let Solution {
            initial,
            sizes,
            range,
            salt,
            values,
            scramble,
            stats,
        } = solution;
        // Pairs are already injective when no bucket moved.
        let unused = form.mode == KeyMode::Pair && values.iter().all(|&v| v == 0);
        let (tab, scramble) = match scramble {
            Some(_) if unused => (Vec::new(), None),
            Some(s) if engaged(sizes.blen) => (values, Some(s.values().to_vec())),
            Some(s) => (values.iter().map(|&v| s.get(v)).collect(), None),
            None => (values, None),
        };
        Self {
            form,
            nkeys,
            range,
            sizes,
            salt,
            initial,
            tab,
            scramble,
            stats,
        }
    }

    /// Hash value of `key`, in `[0, range())` for every key of the build set.
    ///
    /// Other keys of the right kind still hash somewhere; callers needing
    /// membership must compare against the stored key.
    pub fn hash(&self, key: KeyRef<'_>) -> Result<u32> {
        let expected = self.form.mode.key_kind();
        if key.kind() != expected {
            return Err(Error::KeyKindMismatch {
                expected,
                found: key.kind(),
            });
        }
        let (a, b) = self.initial.coordinates(key);
        Ok(match self.tab.get(b as usize) {
            None => a,
            Some(&v) => match &self.scramble {
                Some(scramble) => a ^ scramble[v as usize],
                None => a ^ v,
            },
        })
    }

    pub fn hash_str(&self, key: &str) -> Result<u32> {
        self.hash(KeyRef::Bytes(key.as_bytes()))
    }

    pub fn hash_bytes(&self, key: &[u8]) -> Result<u32> {
        self.hash(KeyRef::Bytes(key))
    }

    pub fn hash_u32(&self, key: u32) -> Result<u32> {
        self.hash(KeyRef::Integer(key))
    }

    pub fn hash_pair(&self, a: u32, b: u32) -> Result<u32> {
        self.hash(KeyRef::Pair(a, b))
    }

    pub fn form(&self) -> HashForm {
        self.form
    }

    /// Number of keys the hash was built for.
    pub fn key_count(&self) -> u32 {
        self.nkeys
    }

    /// Exclusive upper bound of the hash values.
    pub fn range(&self) -> u32 {
        self.range
    }

    pub fn alen(&self) -> u32 {
        self.sizes.alen
    }

    pub fn blen(&self) -> u32 {
        self.sizes.blen
    }

    pub fn smax(&self) -> u32 {
        self.sizes.smax
    }

    /// Salt of the initial hash; `None` when no salt is involved.
    pub fn salt(&self) -> Option<u32> {
        self.salt
    }

    pub fn initial(&self) -> &InitialHash {
        &self.initial
    }

    /// The adjustment table, one entry per `b`. Empty if unused.
    pub fn table(&self) -> &[u32] {
        &self.tab
    }

    /// The scramble table, when the adjustment table indexes into it.
    pub fn scramble(&self) -> Option<&[u32]> {
        self.scramble.as_deref()
    }

    pub fn uses_table(&self) -> bool {
        !self.tab.is_empty()
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// The final hash as a few lines of arithmetic, for a code emitter.
    ///
    /// `key` (bytes or integer), `a` and `b` (pairs) are the inputs, `rsl`
    /// the result; `tab` and `scramble` name the tables returned by
    /// [`table`](Self::table) and [`scramble`](Self::scramble).
    pub fn formula(&self) -> Vec<String> {
        match self.initial {
            InitialHash::Constant => vec!["rsl = 0".to_string()],
            InitialHash::Direct(direct) => {
                vec![format!("rsl = (key >> {}) & {:#x}", direct.shift, direct.mask)]
            }
            InitialHash::Lookup { level, alen, blen } => vec![
                format!("val = lookup(key, {level:#x})"),
                self.high_low_line(alen, blen),
            ],
            InitialHash::Integer { level, alen, blen } => vec![
                format!("val = hash_u32(key, {level:#x})"),
                self.high_low_line(alen, blen),
            ],
            InitialHash::Checksum { level, alen, blen } => vec![
                format!("state = [{level:#x}; 8]"),
                "checksum(key, state)".to_string(),
                format!(
                    "rsl = (state[0] & {:#x}) ^ {}",
                    alen - 1,
                    self.adjust(&format!("state[1] & {:#x}", blen - 1))
                ),
            ],
            InitialHash::Inline { level, alen, blen } => {
                let logb = ceil_log2(blen);
                let b = if logb == 0 {
                    "0".to_string()
                } else {
                    format!("val >> {}", 32 - logb)
                };
                vec![
                    format!("val = inline_hash(key, {level:#x})"),
                    format!("rsl = (val & {:#x}) ^ {}", alen - 1, self.adjust(&b)),
                ]
            }
            InitialHash::Pair { .. } if !self.uses_table() => vec!["rsl = a".to_string()],
            InitialHash::Pair { .. } => vec![format!("rsl = a ^ {}", self.adjust("b"))],
        }
    }

    /// `a` from the high bits of `val`, `b` from the low bits.
    fn high_low_line(&self, alen: u32, blen: u32) -> String {
        let b = format!("val & {:#x}", blen - 1);
        match ceil_log2(alen) {
            0 => format!("rsl = {}", self.adjust(&b)),
            loga => format!("rsl = (val >> {}) ^ {}", 32 - loga, self.adjust(&b)),
        }
    }

    fn adjust(&self, b: &str) -> String {
        match self.scramble {
            Some(_) => format!("scramble[tab[{b}]]"),
            None => format!("tab[{b}]"),
        }
    }
}

/// Configures and runs the search for a [`PerfectHash`].
///
/// ```rust
/// use phash::{KeyMode, Perfection, PerfectHashBuilder};
///
/// let ph = PerfectHashBuilder::new()
///     .mode(KeyMode::Integer)
///     .perfection(Perfection::Normal)
///     .build_u32([3, 141, 5926, 53589])
///     .unwrap();
/// assert!(ph.hash_u32(141).unwrap() < ph.range());
/// ```
#[derive(Debug)]
pub struct PerfectHashBuilder {
    form: HashForm,
    retry: RetryBudget,
    first_salt: u32,
    heuristic: Box<dyn SizeHeuristic>,
}

impl Default for PerfectHashBuilder {
    fn default() -> Self {
        Self {
            form: HashForm::default(),
            retry: RetryBudget::default(),
            first_salt: 1,
            heuristic: Box::new(DefaultHeuristic),
        }
    }
}

impl PerfectHashBuilder {
    /// A builder for minimal hashes of string keys, searching slowly.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: KeyMode) -> Self {
        self.form.mode = mode;
        self
    }

    pub fn perfection(mut self, perfection: Perfection) -> Self {
        self.form.perfection = perfection;
        self
    }

    pub fn speed(mut self, speed: Speed) -> Self {
        self.form.speed = speed;
        self
    }

    pub fn form(mut self, form: HashForm) -> Self {
        self.form = form;
        self
    }

    pub fn retry(mut self, retry: RetryBudget) -> Self {
        self.retry = retry;
        self
    }

    /// First salt of the trial sequence. Runs with the same salt, form and
    /// keys always produce the same tables.
    pub fn first_salt(mut self, salt: u32) -> Self {
        self.first_salt = salt;
        self
    }

    /// Replaces the initial table size heuristic.
    pub fn heuristic<H: SizeHeuristic + 'static>(mut self, heuristic: H) -> Self {
        self.heuristic = Box::new(heuristic);
        self
    }

    /// Builds from byte string keys. The mode must be `Normal` or `Inline`.
    pub fn build_strings<I>(&self, keys: I) -> Result<PerfectHash>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.build(keys.into_iter().map(|k| RawKey::Bytes(k.as_ref().to_vec())))
    }

    /// Builds from integer keys. The mode must be `Integer`.
    pub fn build_u32<I: IntoIterator<Item = u32>>(&self, keys: I) -> Result<PerfectHash> {
        self.build(keys.into_iter().map(RawKey::Integer))
    }

    /// Builds from `(a, b)` pairs. The mode must be `Pair`.
    pub fn build_pairs<I: IntoIterator<Item = (u32, u32)>>(&self, keys: I) -> Result<PerfectHash> {
        self.build(keys.into_iter().map(|(a, b)| RawKey::Pair(a, b)))
    }

    /// Builds from raw key records, which must all match the mode.
    pub fn build<I, K>(&self, records: I) -> Result<PerfectHash>
    where
        I: IntoIterator<Item = K>,
        K: Into<RawKey>,
    {
        let mut keys = KeySet::from_records(self.form.mode.key_kind(), records)?;
        self.build_key_set(&mut keys)
    }

    /// Builds from a prepared key set. Leaves the final trial's coordinates
    /// in `keys`.
    pub fn build_key_set(&self, keys: &mut KeySet) -> Result<PerfectHash> {
        let planner = Planner::new(self.form, self.retry, self.first_salt, self.heuristic.as_ref());
        let solution = planner.run(keys)?;
        Ok(PerfectHash::from_solution(self.form, keys.len() as u32, solution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SCRAMBLE_RANGE;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn random_words(n: usize, seed: u64) -> Vec<String> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut words = BTreeSet::new();
        while words.len() < n {
            let len = rng.gen_range(1..24);
            let word: String = (0..len)
                .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
                .collect();
            words.insert(word);
        }
        words.into_iter().collect()
    }

    fn assert_perfect<I: IntoIterator<Item = u32>>(hashes: I, nkeys: usize, range: u32) {
        let hashes: Vec<u32> = hashes.into_iter().collect();
        assert_eq!(hashes.len(), nkeys);
        let distinct: BTreeSet<u32> = hashes.iter().copied().collect();
        assert_eq!(distinct.len(), nkeys, "collision among {hashes:?}");
        assert!(hashes.iter().all(|&h| h < range), "out of range: {hashes:?}");
    }

    #[test]
    fn test_three_strings_minimal() {
        let builder = PerfectHashBuilder::new();
        let ph = builder.build_strings(["a", "b", "c"]).unwrap();
        assert_eq!(ph.range(), 3);
        let mut hashes: Vec<u32> = ["a", "b", "c"]
            .iter()
            .map(|k| ph.hash_str(k).unwrap())
            .collect();
        let first = hashes.clone();
        hashes.sort_unstable();
        assert_eq!(hashes, vec![0, 1, 2]);

        let again = builder.build_strings(["a", "b", "c"]).unwrap();
        assert_eq!(again, ph);
        let second: Vec<u32> = ["a", "b", "c"]
            .iter()
            .map(|k| again.hash_str(k).unwrap())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_hundred_strings_minimal_slow() {
        let words = random_words(100, 7);
        let ph = PerfectHashBuilder::new()
            .speed(Speed::Slow)
            .build_strings(&words)
            .unwrap();
        assert_eq!(ph.range(), 100);
        assert_perfect(words.iter().map(|w| ph.hash_str(w).unwrap()), 100, 100);
        assert!(ph.table().iter().all(|&v| v < ph.smax()));
    }

    #[test]
    fn test_normal_range_is_power_of_two() {
        let words = random_words(300, 11);
        let ph = PerfectHashBuilder::new()
            .perfection(Perfection::Normal)
            .build_strings(&words)
            .unwrap();
        assert!(ph.range().is_power_of_two());
        assert!(ph.range() >= 300);
        assert_perfect(words.iter().map(|w| ph.hash_str(w).unwrap()), 300, ph.range());
    }

    #[test]
    fn test_fast_search() {
        let words = random_words(500, 13);
        let ph = PerfectHashBuilder::new()
            .perfection(Perfection::Normal)
            .speed(Speed::Fast)
            .build_strings(&words)
            .unwrap();
        assert_perfect(words.iter().map(|w| ph.hash_str(w).unwrap()), 500, ph.range());
    }

    #[test]
    fn test_inline_mode() {
        let words = random_words(200, 17);
        let ph = PerfectHashBuilder::new()
            .mode(KeyMode::Inline)
            .build_strings(&words)
            .unwrap();
        assert!(matches!(ph.initial(), InitialHash::Inline { .. }));
        assert_perfect(words.iter().map(|w| ph.hash_str(w).unwrap()), 200, 200);
        assert_eq!(ph.formula().len(), 2);
    }

    #[test]
    fn test_integer_mode() {
        let mut rng = StdRng::seed_from_u64(19);
        let mut values = BTreeSet::new();
        while values.len() < 400 {
            values.insert(rng.gen::<u32>());
        }
        let ph = PerfectHashBuilder::new()
            .mode(KeyMode::Integer)
            .build_u32(values.iter().copied())
            .unwrap();
        assert!(matches!(ph.initial(), InitialHash::Integer { .. }));
        assert_perfect(values.iter().map(|&v| ph.hash_u32(v).unwrap()), 400, 400);
    }

    #[test]
    fn test_small_integer_sets() {
        let mut rng = StdRng::seed_from_u64(41);
        for n in [5usize, 8, 12] {
            for _ in 0..100 {
                let mut values = BTreeSet::new();
                while values.len() < n {
                    values.insert(rng.gen::<u32>());
                }
                let ph = PerfectHashBuilder::new()
                    .mode(KeyMode::Integer)
                    .build_u32(values.iter().copied())
                    .unwrap();
                assert_perfect(values.iter().map(|&v| ph.hash_u32(v).unwrap()), n, n as u32);
            }
        }
    }

    #[test]
    fn test_integers_needing_no_table() {
        let keys = [0x1000, 0x1010, 0x1020, 0x1030];
        let ph = PerfectHashBuilder::new()
            .mode(KeyMode::Integer)
            .build_u32(keys)
            .unwrap();
        assert!(!ph.uses_table());
        assert_eq!(ph.salt(), None);
        assert_eq!(ph.formula(), vec!["rsl = (key >> 4) & 0x3".to_string()]);
        assert_perfect(keys.iter().map(|&v| ph.hash_u32(v).unwrap()), 4, 4);
    }

    #[test]
    fn test_pairs() {
        let pairs = [(0, 0), (0, 1), (1, 0)];
        let ph = PerfectHashBuilder::new()
            .mode(KeyMode::Pair)
            .build_pairs(pairs)
            .unwrap();
        assert_eq!(ph.salt(), None);
        assert_eq!(ph.stats().salts_tried, 0);
        assert_perfect(pairs.iter().map(|&(a, b)| ph.hash_pair(a, b).unwrap()), 3, 3);
    }

    #[test]
    fn test_pairs_without_adjustment() {
        let pairs = [(0, 0), (1, 1), (2, 2), (3, 3)];
        let ph = PerfectHashBuilder::new()
            .mode(KeyMode::Pair)
            .build_pairs(pairs)
            .unwrap();
        assert!(!ph.uses_table());
        assert_eq!(ph.formula(), vec!["rsl = a".to_string()]);
        for (a, b) in pairs {
            assert_eq!(ph.hash_pair(a, b).unwrap(), a);
        }
    }

    #[test]
    fn test_oversized_pair() {
        let err = PerfectHashBuilder::new()
            .mode(KeyMode::Pair)
            .build_pairs([(0, 0), (100, 1)])
            .unwrap_err();
        assert!(matches!(err, Error::CoordinateTooLarge { coordinate: 'a', .. }));
    }

    #[test]
    fn test_single_key() {
        let ph = PerfectHashBuilder::new().build_strings(["only"]).unwrap();
        assert_eq!(ph.hash_str("only").unwrap(), 0);
        assert_eq!(ph.range(), 1);
        assert_eq!(ph.formula(), vec!["rsl = 0".to_string()]);
    }

    #[test]
    fn test_empty_key_set() {
        let err = PerfectHashBuilder::new()
            .build_strings(Vec::<String>::new())
            .unwrap_err();
        assert_eq!(err, Error::EmptyKeySet);
    }

    #[test]
    fn test_duplicates_rejected() {
        let strings = PerfectHashBuilder::new().build_strings(["a", "b", "a"]);
        assert!(matches!(strings, Err(Error::DuplicateKey { .. })));

        let integers = PerfectHashBuilder::new()
            .mode(KeyMode::Integer)
            .build_u32([1, 2, 1]);
        assert!(matches!(integers, Err(Error::DuplicateKey { .. })));

        let pairs = PerfectHashBuilder::new()
            .mode(KeyMode::Pair)
            .build_pairs([(1, 1), (0, 0), (1, 1)]);
        assert!(matches!(pairs, Err(Error::DuplicateKey { .. })));
    }

    #[test]
    fn test_wrong_kind_lookup() {
        let ph = PerfectHashBuilder::new().build_strings(["x", "y"]).unwrap();
        assert!(matches!(
            ph.hash_u32(5),
            Err(Error::KeyKindMismatch { .. })
        ));
        let err = PerfectHashBuilder::new()
            .mode(KeyMode::Integer)
            .build(["text"])
            .unwrap_err();
        assert!(matches!(err, Error::KeyKindMismatch { .. }));
    }

    #[derive(Debug)]
    struct Cramped;

    impl SizeHeuristic for Cramped {
        fn initial_sizes(&self, nkeys: u32, _form: &HashForm) -> TableSizes {
            TableSizes {
                alen: 1,
                blen: 1,
                smax: nkeys,
            }
        }
    }

    #[test]
    fn test_growth_from_cramped_tables() {
        let words = random_words(60, 23);
        let ph = PerfectHashBuilder::new()
            .perfection(Perfection::Normal)
            .heuristic(Cramped)
            .retry(RetryBudget {
                distinct_pairs: 8,
                matcher_strings: 1,
                ..RetryBudget::default()
            })
            .build_strings(&words)
            .unwrap();
        assert!(ph.stats().growths > 0);
        assert!(ph.stats().collisions > 0);
        assert_perfect(words.iter().map(|w| ph.hash_str(w).unwrap()), 60, ph.range());
    }

    #[test]
    fn test_large_set_uses_scramble() {
        let words = random_words(10_000, 29);
        let ph = PerfectHashBuilder::new().build_strings(&words).unwrap();
        assert!(ph.blen() >= 4096);
        let scramble = ph.scramble().unwrap();
        assert_eq!(scramble.len(), SCRAMBLE_RANGE as usize);
        assert!(ph.table().iter().all(|&v| v < SCRAMBLE_RANGE));
        assert!(ph.formula().last().unwrap().contains("scramble[tab["));
        assert_perfect(words.iter().map(|w| ph.hash_str(w).unwrap()), 10_000, 10_000);
    }

    #[test]
    fn test_first_salt_changes_search() {
        let words = random_words(64, 31);
        let one = PerfectHashBuilder::new().first_salt(1).build_strings(&words).unwrap();
        let other = PerfectHashBuilder::new().first_salt(1000).build_strings(&words).unwrap();
        assert!(one.salt().unwrap() >= 1);
        assert!(other.salt().unwrap() >= 1000);
        assert_perfect(words.iter().map(|w| other.hash_str(w).unwrap()), 64, 64);
    }
}
