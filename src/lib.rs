//! Perfect hash generation for static key sets.
//!
//! Given every key up front, [`PerfectHashBuilder`] searches for a function
//! mapping each key to a distinct value in `[0, nkeys)` (minimal) or in a
//! power-of-two range, computed as an initial hash `(a, b)` of the key plus
//! one small table lookup: `a ^ tab[b]`.
//!
//! Keys come in as byte strings, 32-bit integers, or caller supplied
//! `(a, b)` pairs; the result is a [`PerfectHash`] holding the tables and a
//! short description of the final arithmetic for code generators.

pub mod bucket;
pub mod config;
pub mod error;
pub mod hashing;
pub mod keys;
pub mod matcher;
pub mod perfect;
pub mod planner;

pub use config::{HashForm, KeyMode, Perfection, RetryBudget, Speed};
pub use error::{Error, Result};
pub use keys::{KeyKind, KeyRef, KeySet, RawKey};
pub use perfect::{PerfectHash, PerfectHashBuilder};
pub use planner::{BuildStats, DefaultHeuristic, SizeHeuristic, TableSizes};
