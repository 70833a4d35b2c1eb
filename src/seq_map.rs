//! SeqMap: ordered, string-keyed map with positional addressing.

use core::fmt;
use hashbrown::HashMap;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::token_source::TokenSource;

/// Read failures on explicit index/key lookups.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("key not found: {0:?}")]
    KeyNotFound(String),
}

/// Rejections of positional inserts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// Positional inserts only splice before an occupied position, so
    /// `index == len` (and any insert into an empty map) is rejected.
    #[error("insert position {index} out of range (len {len})")]
    PositionOutOfRange { index: usize, len: usize },
    #[error("empty key")]
    EmptyKey,
    #[error("duplicate key: {0:?}")]
    DuplicateKey(String),
}

struct Slot<T> {
    key: String,
    // Stable identity for the entry's lifetime; positions renumber, tokens
    // do not.
    token: Uuid,
    value: T,
}

struct Inner<T> {
    // Positional order is the vector order. `by_key` maps each slot's key to
    // its current position and is renumbered on every splice/compaction.
    slots: Vec<Slot<T>>,
    by_key: HashMap<String, usize>,
    // Default-key counter: monotone, never reset by removals or clear.
    next_key: u64,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            by_key: HashMap::new(),
            next_key: 0,
        }
    }

    fn generate_key(&mut self, prefix: &str) -> String {
        loop {
            let candidate = format!("{}{}", prefix, self.next_key);
            self.next_key += 1;
            if !self.by_key.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn push_slot(&mut self, key: String, value: T) {
        let token = TokenSource::new().new_token();
        let position = self.slots.len();
        self.by_key.insert(key.clone(), position);
        self.slots.push(Slot { key, token, value });
    }

    fn splice_slot(&mut self, index: usize, key: String, value: T) {
        let token = TokenSource::new().new_token();
        for pos in self.by_key.values_mut() {
            if *pos >= index {
                *pos += 1;
            }
        }
        self.by_key.insert(key.clone(), index);
        self.slots.insert(index, Slot { key, token, value });
    }

    fn remove_slot(&mut self, index: usize) -> Slot<T> {
        let slot = self.slots.remove(index);
        self.by_key.remove(&slot.key);
        for pos in self.by_key.values_mut() {
            if *pos > index {
                *pos -= 1;
            }
        }
        slot
    }
}

/// An ordered associative container: every entry has a stable integer
/// position (insertion/splice order) and a unique string key, and both
/// addressing modes observe the same sequence.
///
/// Entries added without an explicit key get a generated one,
/// `prefix + counter` (default prefix `"Name"`); the counter is monotone and
/// skips over candidates that would collide with existing keys.
///
/// All methods take `&self`: the container holds its state behind a
/// reader-writer lock, so mutations are mutually exclusive and atomic across
/// the internal views while reads run concurrently with each other.
/// `SeqMap<T>` is `Send + Sync` whenever `T` is.
pub struct SeqMap<T> {
    prefix: String,
    inner: RwLock<Inner<T>>,
}

impl<T> SeqMap<T> {
    /// Empty map with the default key prefix `"Name"`.
    pub fn new() -> Self {
        Self::with_prefix("Name")
    }

    /// Empty map generating default keys from `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            inner: RwLock::new(Inner::new()),
        }
    }

    /// The prefix used for generated keys.
    pub fn key_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.inner.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().slots.is_empty()
    }

    /// Appends `value` under a generated key and returns that key.
    pub fn push(&self, value: T) -> String {
        let mut inner = self.inner.write();
        let key = inner.generate_key(&self.prefix);
        inner.push_slot(key.clone(), value);
        key
    }

    /// Appends `value` under `key`. If `key` is already bound, the existing
    /// entry's value is overwritten in place (same position, same identity)
    /// and the old value is returned.
    pub fn insert(&self, key: impl Into<String>, value: T) -> Option<T> {
        let key = key.into();
        let mut inner = self.inner.write();
        match inner.by_key.get(&key).copied() {
            Some(pos) => Some(core::mem::replace(&mut inner.slots[pos].value, value)),
            None => {
                inner.push_slot(key, value);
                None
            }
        }
    }

    /// Appends `value`; an empty `key` routes to default-key generation,
    /// otherwise this behaves like [`SeqMap::insert`]. Returns the effective
    /// key.
    pub fn append(&self, value: T, key: &str) -> String {
        if key.is_empty() {
            self.push(value)
        } else {
            self.insert(key, value);
            key.to_owned()
        }
    }

    /// Inserts `value` under a generated key so that it occupies `index`.
    ///
    /// The bound check is `index < len`: appending via `insert_at(len, ..)`
    /// and inserting into an empty map are both rejected with
    /// [`InsertError::PositionOutOfRange`]. Returns the generated key on
    /// success.
    ///
    /// The key is generated before the bound check, so a rejected insert
    /// still consumes a counter value.
    pub fn insert_at(&self, index: usize, value: T) -> Result<String, InsertError> {
        let mut inner = self.inner.write();
        let key = inner.generate_key(&self.prefix);
        if index >= inner.slots.len() {
            return Err(InsertError::PositionOutOfRange {
                index,
                len: inner.slots.len(),
            });
        }
        inner.splice_slot(index, key.clone(), value);
        Ok(key)
    }

    /// Inserts `value` under `key` so that it occupies `index`.
    ///
    /// Same positional bound as [`SeqMap::insert_at`]; additionally rejects
    /// an empty key and a key that is already bound.
    pub fn insert_keyed_at(
        &self,
        index: usize,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), InsertError> {
        let key = key.into();
        if key.is_empty() {
            return Err(InsertError::EmptyKey);
        }
        let mut inner = self.inner.write();
        if index >= inner.slots.len() {
            return Err(InsertError::PositionOutOfRange {
                index,
                len: inner.slots.len(),
            });
        }
        if inner.by_key.contains_key(&key) {
            return Err(InsertError::DuplicateKey(key));
        }
        inner.splice_slot(index, key, value);
        Ok(())
    }

    /// Replaces the value at `index` in place (key and identity unchanged).
    /// Out-of-range indices are a silent no-op reported as `false`.
    pub fn set(&self, index: usize, value: T) -> bool {
        let mut inner = self.inner.write();
        match inner.slots.get_mut(index) {
            Some(slot) => {
                slot.value = value;
                true
            }
            None => false,
        }
    }

    /// Replaces the value bound to `key` in place. A missing key is reported
    /// as `false`; this never inserts.
    pub fn set_by_key(&self, key: &str, value: T) -> bool {
        let mut inner = self.inner.write();
        match inner.by_key.get(key).copied() {
            Some(pos) => {
                inner.slots[pos].value = value;
                true
            }
            None => false,
        }
    }

    /// Removes the entry bound to `key`; returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.by_key.get(key).copied() {
            Some(pos) => {
                inner.remove_slot(pos);
                true
            }
            None => false,
        }
    }

    /// Removes the entry at `index`; out-of-range indices are a no-op
    /// reported as `false`.
    pub fn remove_at(&self, index: usize) -> bool {
        let mut inner = self.inner.write();
        if index >= inner.slots.len() {
            return false;
        }
        inner.remove_slot(index);
        true
    }

    /// Empties the map. The default-key counter keeps its value, so keys
    /// generated afterwards continue the old numbering.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.slots.clear();
        inner.by_key.clear();
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().by_key.contains_key(key)
    }

    /// The key at `index`, if any.
    pub fn key_at(&self, index: usize) -> Option<String> {
        self.inner.read().slots.get(index).map(|s| s.key.clone())
    }

    /// The identity token of the entry at `index`, if any. The token is
    /// minted when the entry is created and stays fixed while positions
    /// renumber and values are replaced.
    pub fn token_at(&self, index: usize) -> Option<Uuid> {
        self.inner.read().slots.get(index).map(|s| s.token)
    }

    /// All keys in positional order.
    pub fn keys(&self) -> Vec<String> {
        self.inner
            .read()
            .slots
            .iter()
            .map(|s| s.key.clone())
            .collect()
    }
}

impl<T: Clone> SeqMap<T> {
    /// The value at `index`.
    pub fn get(&self, index: usize) -> Result<T, MapError> {
        let inner = self.inner.read();
        inner
            .slots
            .get(index)
            .map(|s| s.value.clone())
            .ok_or(MapError::IndexOutOfRange {
                index,
                len: inner.slots.len(),
            })
    }

    /// The value bound to `key`.
    pub fn get_by_key(&self, key: &str) -> Result<T, MapError> {
        self.try_get(key)
            .ok_or_else(|| MapError::KeyNotFound(key.to_owned()))
    }

    /// Non-failing lookup by key.
    pub fn try_get(&self, key: &str) -> Option<T> {
        let inner = self.inner.read();
        inner
            .by_key
            .get(key)
            .map(|&pos| inner.slots[pos].value.clone())
    }

    /// All values in positional order.
    pub fn values(&self) -> Vec<T> {
        self.inner
            .read()
            .slots
            .iter()
            .map(|s| s.value.clone())
            .collect()
    }

    /// Copies every value, in positional order, into `dest` starting at
    /// `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` exceeds `dest.len()` or if `dest` has fewer than
    /// `len()` elements of room from `offset` — an undersized destination is
    /// a caller bug, not a data condition.
    pub fn copy_into(&self, dest: &mut [T], offset: usize) {
        let inner = self.inner.read();
        assert!(
            offset <= dest.len(),
            "copy_into: offset {} exceeds destination length {}",
            offset,
            dest.len()
        );
        assert!(
            dest.len() - offset >= inner.slots.len(),
            "copy_into: destination holds {} from offset {}, need {}",
            dest.len() - offset,
            offset,
            inner.slots.len()
        );
        for (out, slot) in dest[offset..].iter_mut().zip(inner.slots.iter()) {
            *out = slot.value.clone();
        }
    }

    /// Iterator over values in positional order.
    ///
    /// The sequence is a snapshot of the map at the time of the call;
    /// mutations afterwards do not affect a live iterator. Call again for a
    /// fresh view.
    pub fn iter(&self) -> Iter<T> {
        Iter {
            inner: self.values().into_iter(),
        }
    }

    /// Iterator over `(key, position, value)` triples in positional order.
    /// Snapshot semantics as for [`SeqMap::iter`].
    pub fn entries(&self) -> Entries<T> {
        let snapshot: Vec<(String, usize, T)> = self
            .inner
            .read()
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.key.clone(), i, s.value.clone()))
            .collect();
        Entries {
            inner: snapshot.into_iter(),
        }
    }
}

impl<T: PartialEq> SeqMap<T> {
    /// Whether any entry's value equals `value` (value equality, not
    /// identity).
    pub fn contains(&self, value: &T) -> bool {
        self.inner.read().slots.iter().any(|s| s.value == *value)
    }

    /// The lowest position whose value equals `value`.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.inner.read().slots.iter().position(|s| s.value == *value)
    }

    /// Removes the lowest-position entry whose value equals `value`; returns
    /// whether a removal occurred.
    pub fn remove_value(&self, value: &T) -> bool {
        let mut inner = self.inner.write();
        match inner.slots.iter().position(|s| s.value == *value) {
            Some(pos) => {
                inner.remove_slot(pos);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for SeqMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for SeqMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_map()
            .entries(inner.slots.iter().map(|s| (&s.key, &s.value)))
            .finish()
    }
}

/// Snapshot iterator over values, in positional order.
pub struct Iter<T> {
    inner: std::vec::IntoIter<T>,
}

impl<T> Iterator for Iter<T> {
    type Item = T;
    #[inline]
    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<T> {}

/// Snapshot iterator over `(key, position, value)` triples.
pub struct Entries<T> {
    inner: std::vec::IntoIter<(String, usize, T)>,
}

impl<T> Iterator for Entries<T> {
    type Item = (String, usize, T);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Entries<T> {}

impl<'a, T: Clone> IntoIterator for &'a SeqMap<T> {
    type Item = T;
    type IntoIter = Iter<T>;
    fn into_iter(self) -> Iter<T> {
        self.iter()
    }
}

impl<T> FromIterator<T> for SeqMap<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let map = SeqMap::new();
        for value in iter {
            map.push(value);
        }
        map
    }
}

impl<T> FromIterator<(String, T)> for SeqMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let map = SeqMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<T> Extend<T> for SeqMap<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}
