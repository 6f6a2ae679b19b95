//! # Matcher
//!
//! Chooses an assignment value for every bucket so that all keys land on
//! distinct final hash values (`a ^ scramble[value]`).
//!
//! Buckets are the left side of a bipartite graph and hash values ("slots") the
//! right side. Buckets are placed largest first: a bucket of `k` keys needs a
//! value that is simultaneously good for all `k` of them, so the hard
//! constraints are settled while the slot map is still sparse.
//!
//! ## Augmenting search
//! To place a bucket, a breadth-first search builds a spanning tree of buckets
//! rooted at it. For each bucket in the queue, every candidate value is probed:
//! - some key would land out of range, or on slots of two different buckets,
//!   or on a bucket already in the tree: the value is useless;
//! - every key lands on a free slot: an augmenting path is found;
//! - the keys collide with exactly one other placed bucket: that bucket becomes
//!   a child in the tree, reachable by moving its parent to this value.
//!
//! When a free value is found, the path is applied from the leaf up to the
//! root: each bucket on the path moves to the value that evicts only its child,
//! which has itself already moved. Every slot write and value change goes into
//! an undo log; if applying the path meets an occupied slot (possible when
//! buckets on the path alias each other's keys), the log is replayed in reverse
//! and the search carries on with the next candidate.
//!
//! This is the augmenting path method from Tarjan's *Data Structures and
//! Network Algorithms*. With `m` of `n` slots still free, the closure is
//! expected to reach about `n / m` buckets before a free one, so placing all
//! single-key buckets costs about `n log n`.

use log::trace;

use crate::bucket::{Bucket, BucketIndex};
use crate::error::{try_table, Error, Result};
use crate::hashing::Scramble;
use crate::keys::{KeyId, KeySet};

/// Parameters of one matching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchParams {
    /// Final hash values must lie in `[0, range)`.
    pub range: u32,
    /// Explore beyond the buckets that collide with the root directly.
    pub transitive: bool,
}

/// Outcome of one matching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matching {
    /// Every bucket is placed.
    Complete,
    /// `bucket`, holding `size` keys, could not be placed.
    Unresolved { bucket: usize, size: usize },
}

/// One node of the breadth-first spanning tree.
#[derive(Debug, Clone, Copy)]
struct Node {
    /// The bucket at this node; `None` for a leaf reached through a free value.
    bucket: Option<usize>,
    /// Queue position of the parent.
    parent: usize,
    /// Value that moves the parent onto this node's slots.
    new_value: u32,
}

#[derive(Debug, Clone, Copy)]
enum Undo {
    Slot { hash: u32, previous: Option<KeyId> },
    Value { bucket: usize, previous: u32 },
}

enum Probe {
    Blocked,
    Free,
    Displace(usize),
}

/// Working state of the matcher, reusable across trials.
#[derive(Debug, Default)]
pub struct Matcher {
    slots: Vec<Option<KeyId>>,
    queue: Vec<Node>,
    undo: Vec<Undo>,
    range: u32,
    transitive: bool,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key currently holding each hash value.
    pub fn slots(&self) -> &[Option<KeyId>] {
        &self.slots
    }

    /// Places every bucket of `index`, largest first.
    ///
    /// On [`Matching::Complete`] every key of `keys` owns a distinct slot in
    /// `[0, range)` and each bucket's value is final. Otherwise the assignment
    /// is unusable.
    pub fn solve(
        &mut self,
        keys: &KeySet,
        index: &mut BucketIndex,
        scramble: &Scramble,
        params: MatchParams,
    ) -> Result<Matching> {
        self.prepare(params, index.len())?;
        index.reset();

        let order = index.by_descending_size();
        let buckets = index.buckets_mut();
        for (round, &b) in order.iter().enumerate() {
            let highwater = round as u32 + 1;
            if !self.augment(keys, buckets, scramble, b, highwater) {
                return Ok(Matching::Unresolved {
                    bucket: b,
                    size: buckets[b].len(),
                });
            }
            trace!("placed bucket {} ({} keys)", b, buckets[b].len());
        }
        Ok(Matching::Complete)
    }

    fn prepare(&mut self, params: MatchParams, blen: usize) -> Result<()> {
        self.range = params.range;
        self.transitive = params.transitive;
        if self.slots.len() != params.range as usize {
            self.slots = try_table("slot", params.range as usize, None)?;
        } else {
            self.slots.fill(None);
        }
        self.queue.clear();
        self.queue
            .try_reserve(blen + 1)
            .map_err(|_| Error::Allocation {
                table: "queue",
                len: blen + 1,
            })?;
        self.undo.clear();
        Ok(())
    }

    /// Adds bucket `root` to the mapping through an augmenting path.
    fn augment(
        &mut self,
        keys: &KeySet,
        buckets: &mut [Bucket],
        scramble: &Scramble,
        root: usize,
        highwater: u32,
    ) -> bool {
        self.queue.clear();
        self.queue.push(Node {
            bucket: Some(root),
            parent: 0,
            new_value: 0,
        });
        buckets[root].water = highwater;

        let mut q = 0;
        while q < self.queue.len() {
            if !self.transitive && q == 1 {
                break;
            }
            let Some(current) = self.queue[q].bucket else {
                q += 1;
                continue;
            };
            for value in 0..scramble.limit() {
                let child = match self.probe(keys, buckets, scramble, current, value, highwater) {
                    Probe::Blocked => continue,
                    Probe::Free => None,
                    Probe::Displace(child) => {
                        buckets[child].water = highwater;
                        Some(child)
                    }
                };
                self.queue.push(Node {
                    bucket: child,
                    parent: q,
                    new_value: value,
                });
                if child.is_none() {
                    if self.apply(keys, buckets, scramble) {
                        return true;
                    }
                    trace!("rolled back augmenting path for bucket {}", root);
                    self.queue.pop();
                }
            }
            q += 1;
        }
        false
    }

    /// Checks where the keys of `current` would land with `value`.
    fn probe(
        &self,
        keys: &KeySet,
        buckets: &[Bucket],
        scramble: &Scramble,
        current: usize,
        value: u32,
        highwater: u32,
    ) -> Probe {
        let mask = scramble.get(value);
        let mut child = None;
        for &id in &buckets[current].keys {
            let hash = keys[id].a() ^ mask;
            if hash >= self.range {
                return Probe::Blocked;
            }
            let Some(holder) = self.slots[hash as usize] else {
                continue;
            };
            let hit = keys[holder].b() as usize;
            match child {
                Some(c) if c != hit => return Probe::Blocked,
                Some(_) => {}
                None => {
                    if buckets[hit].water == highwater {
                        return Probe::Blocked;
                    }
                    child = Some(hit);
                }
            }
        }
        match child {
            Some(c) => Probe::Displace(c),
            None => Probe::Free,
        }
    }

    /// Applies the path ending at the tail of the queue.
    ///
    /// Walks from the leaf to the root; each parent takes the value recorded
    /// in its child node. Returns `false`, with every change undone, if a slot
    /// turns out to be taken.
    fn apply(&mut self, keys: &KeySet, buckets: &mut [Bucket], scramble: &Scramble) -> bool {
        self.undo.clear();
        let mut child = self.queue.len() - 1;
        while child != 0 {
            let node = self.queue[child];
            let parent = node.parent;
            let Some(pb) = self.queue[parent].bucket else {
                break;
            };

            // Release the parent's current slots.
            let mask = scramble.get(buckets[pb].value);
            for &id in &buckets[pb].keys {
                let hash = keys[id].a() ^ mask;
                if self.slots.get(hash as usize) == Some(&Some(id)) {
                    self.set_slot(hash, None);
                }
            }

            self.undo.push(Undo::Value {
                bucket: pb,
                previous: buckets[pb].value,
            });
            buckets[pb].value = node.new_value;

            let mask = scramble.get(node.new_value);
            for &id in &buckets[pb].keys {
                let hash = keys[id].a() ^ mask;
                match self.slots.get(hash as usize) {
                    Some(None) => self.set_slot(hash, Some(id)),
                    _ => {
                        self.rollback(buckets);
                        return false;
                    }
                }
            }
            child = parent;
        }
        true
    }

    fn set_slot(&mut self, hash: u32, key: Option<KeyId>) {
        let slot = &mut self.slots[hash as usize];
        self.undo.push(Undo::Slot {
            hash,
            previous: *slot,
        });
        *slot = key;
    }

    /// Replays the undo log in reverse.
    fn rollback(&mut self, buckets: &mut [Bucket]) {
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Slot { hash, previous } => self.slots[hash as usize] = previous,
                Undo::Value { bucket, previous } => buckets[bucket].value = previous,
            }
        }
    }
}
