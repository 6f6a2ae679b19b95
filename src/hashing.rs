//! Hash functions used by the generator.
//!
//! - [`jenkins`]: the Jenkins initial hashes (`lookup`, `checksum`, inline, integer).
//! - [`initial`]: turns a key into its `(a, b)` coordinates for a given salt.
//! - [`integer`]: bit analysis of integer key sets.
//! - [`scramble`]: the permutation spreading assignment values over the hash range.

pub mod initial;
pub mod integer;
pub mod jenkins;
pub mod scramble;

pub use initial::InitialHash;
pub use scramble::Scramble;
