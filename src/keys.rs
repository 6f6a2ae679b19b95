//! # Key Set
//!
//! Owns every key of a run together with its current `(a, b)` coordinates.
//! Keys live in a flat arena and are addressed by stable [`KeyId`] handles;
//! buckets and the slot map only ever hold handles.
//!
//! A key's identity never changes after it is pushed. Its coordinates are
//! rewritten by the initial hasher on every trial.

use std::fmt;
use std::ops::Index;

use crate::config::MAX_KEYS;
use crate::error::{Error, Result};

/// The representation shared by every key of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Bytes,
    Integer,
    Pair,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyKind::Bytes => "byte string",
            KeyKind::Integer => "integer",
            KeyKind::Pair => "(a, b) pair",
        })
    }
}

/// A key record as delivered by the key source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawKey {
    Bytes(Vec<u8>),
    Integer(u32),
    Pair(u32, u32),
}

impl RawKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            RawKey::Bytes(_) => KeyKind::Bytes,
            RawKey::Integer(_) => KeyKind::Integer,
            RawKey::Pair(..) => KeyKind::Pair,
        }
    }

    pub fn as_key_ref(&self) -> KeyRef<'_> {
        match self {
            RawKey::Bytes(bytes) => KeyRef::Bytes(bytes),
            RawKey::Integer(value) => KeyRef::Integer(*value),
            RawKey::Pair(a, b) => KeyRef::Pair(*a, *b),
        }
    }
}

impl From<&str> for RawKey {
    fn from(s: &str) -> Self {
        RawKey::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for RawKey {
    fn from(s: String) -> Self {
        RawKey::Bytes(s.into_bytes())
    }
}

impl From<u32> for RawKey {
    fn from(value: u32) -> Self {
        RawKey::Integer(value)
    }
}

impl From<(u32, u32)> for RawKey {
    fn from((a, b): (u32, u32)) -> Self {
        RawKey::Pair(a, b)
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_key_ref(), f)
    }
}

/// A borrowed key, used for hashing lookups without taking ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRef<'a> {
    Bytes(&'a [u8]),
    Integer(u32),
    Pair(u32, u32),
}

impl KeyRef<'_> {
    pub fn kind(&self) -> KeyKind {
        match self {
            KeyRef::Bytes(_) => KeyKind::Bytes,
            KeyRef::Integer(_) => KeyKind::Integer,
            KeyRef::Pair(..) => KeyKind::Pair,
        }
    }
}

impl fmt::Display for KeyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Keys that are not text are shown as hex.
            KeyRef::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => write!(f, "{:?}", s),
                Err(_) => write!(f, "0x{}", hex::encode(bytes)),
            },
            KeyRef::Integer(value) => write!(f, "{:#010x}", value),
            KeyRef::Pair(a, b) => write!(f, "({:#x}, {:#x})", a, b),
        }
    }
}

/// Stable handle of a key inside a [`KeySet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u32);

impl KeyId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A key and its current coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    raw: RawKey,
    pub(crate) a: u32,
    pub(crate) b: u32,
}

impl Key {
    pub fn raw(&self) -> &RawKey {
        &self.raw
    }

    pub fn a(&self) -> u32 {
        self.a
    }

    pub fn b(&self) -> u32 {
        self.b
    }

    /// Whether two keys have the same identity (not just the same coordinates).
    pub fn same_identity(&self, other: &Key) -> bool {
        self.raw == other.raw
    }
}

/// All keys of a run.
#[derive(Debug, Clone)]
pub struct KeySet {
    kind: KeyKind,
    keys: Vec<Key>,
}

impl KeySet {
    /// Creates an empty key set accepting keys of `kind`.
    pub fn new(kind: KeyKind) -> Self {
        Self {
            kind,
            keys: Vec::new(),
        }
    }

    /// Collects raw records from a key source.
    pub fn from_records<I, K>(kind: KeyKind, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        K: Into<RawKey>,
    {
        let mut set = Self::new(kind);
        for record in records {
            set.push(record.into())?;
        }
        Ok(set)
    }

    /// Adds a key. Pairs take their coordinates verbatim.
    pub fn push(&mut self, raw: RawKey) -> Result<KeyId> {
        if raw.kind() != self.kind {
            return Err(Error::KeyKindMismatch {
                expected: self.kind,
                found: raw.kind(),
            });
        }
        if self.keys.len() >= MAX_KEYS {
            return Err(Error::TooManyKeys {
                count: self.keys.len() + 1,
                max: MAX_KEYS,
            });
        }
        let (a, b) = match raw {
            RawKey::Pair(a, b) => (a, b),
            _ => (0, 0),
        };
        let id = KeyId(self.keys.len() as u32);
        self.keys.push(Key { raw, a, b });
        Ok(id)
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (KeyId, &Key)> + '_ {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| (KeyId(i as u32), key))
    }

    /// Rewrites every key's coordinates.
    pub(crate) fn assign<F>(&mut self, mut coordinates: F)
    where
        F: FnMut(&RawKey) -> (u32, u32),
    {
        for key in &mut self.keys {
            let (a, b) = coordinates(&key.raw);
            key.a = a;
            key.b = b;
        }
    }

    /// Largest `a` and `b` over all keys.
    pub(crate) fn max_coordinates(&self) -> (u32, u32) {
        self.keys
            .iter()
            .fold((0, 0), |(a, b), key| (a.max(key.a), b.max(key.b)))
    }
}

impl Index<KeyId> for KeySet {
    type Output = Key;

    fn index(&self, id: KeyId) -> &Key {
        &self.keys[id.index()]
    }
}
