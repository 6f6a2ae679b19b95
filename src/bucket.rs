//! # Bucket Index
//!
//! Groups keys by their `b` coordinate. Every bucket carries the assignment
//! value the matcher solves for; a key's final hash is
//! `a ^ scramble[value of bucket b]`.
//!
//! Building the index is also where coordinate collisions surface: two keys
//! with the same `(a, b)` can never get distinct final hashes. If the keys are
//! literally identical the input is broken and the run aborts; otherwise the
//! trial just needs another salt.

use log::warn;

use crate::error::{try_table, Error, Result};
use crate::keys::{KeyId, KeySet};

/// How far to scan once a collision is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionScan {
    /// Stop at the first collision. Used by every search trial.
    FirstHit,
    /// Keep going and report every duplicate key at once. Diagnostic use only.
    Complete,
}

/// The keys sharing one `b` coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    pub(crate) keys: Vec<KeyId>,
    pub(crate) value: u32,
    /// Last augmenting search that visited this bucket.
    pub(crate) water: u32,
}

impl Bucket {
    pub fn keys(&self) -> &[KeyId] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The current assignment value.
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// Result of indexing one trial's coordinates.
#[derive(Debug)]
pub enum Indexed {
    /// Every `(a, b)` is distinct.
    Distinct(BucketIndex),
    /// Two different keys share `(a, b)`; try another salt.
    Collision { first: KeyId, second: KeyId },
}

/// Buckets indexed by `b`.
#[derive(Debug, Clone)]
pub struct BucketIndex {
    buckets: Vec<Bucket>,
}

impl BucketIndex {
    /// Buckets `keys` by their current `b` coordinate.
    ///
    /// Returns [`Error::DuplicateKey`] as soon as two identical keys are seen.
    /// With [`CollisionScan::Complete`] the whole key set is scanned first and
    /// every duplicate is reported together.
    pub fn build(keys: &KeySet, blen: u32, scan: CollisionScan) -> Result<Indexed> {
        let mut buckets = try_table("bucket", blen as usize, Bucket::default())?;
        let mut collision = None;
        let mut duplicates = Vec::new();

        for (id, key) in keys.iter() {
            let bucket = &mut buckets[key.b() as usize];
            for &other_id in &bucket.keys {
                let other = &keys[other_id];
                if other.a() != key.a() {
                    continue;
                }
                if other.same_identity(key) {
                    if scan == CollisionScan::FirstHit {
                        return Err(Error::DuplicateKey {
                            key: key.raw().to_string(),
                        });
                    }
                    duplicates.push(key.raw().to_string());
                } else if collision.is_none() {
                    collision = Some((other_id, id));
                }
                if scan == CollisionScan::FirstHit {
                    break;
                }
            }
            if scan == CollisionScan::FirstHit {
                if let Some((first, second)) = collision {
                    return Ok(Indexed::Collision { first, second });
                }
            }
            bucket.keys.push(id);
        }

        if !duplicates.is_empty() {
            warn!("found {} duplicate keys", duplicates.len());
            duplicates.dedup();
            return Err(match duplicates.len() {
                1 => Error::DuplicateKey {
                    key: duplicates.remove(0),
                },
                _ => Error::DuplicateKeys { keys: duplicates },
            });
        }
        Ok(match collision {
            Some((first, second)) => Indexed::Collision { first, second },
            None => Indexed::Distinct(Self { buckets }),
        })
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub(crate) fn buckets_mut(&mut self) -> &mut [Bucket] {
        &mut self.buckets
    }

    /// Number of keys in the largest bucket.
    pub fn max_len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).max().unwrap_or(0)
    }

    /// Non-empty buckets, largest first. Ties keep index order.
    pub fn by_descending_size(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.buckets.len())
            .filter(|&b| !self.buckets[b].is_empty())
            .collect();
        order.sort_by(|&x, &y| self.buckets[y].len().cmp(&self.buckets[x].len()));
        order
    }

    /// Clears every assignment value and search mark.
    pub(crate) fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.value = 0;
            bucket.water = 0;
        }
    }
}
