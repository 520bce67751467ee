//! Dense bitsets over interned identifiers.
//!
//! The registry assigns dense `u32` indices to symbols, filters, and
//! schedulables, so the sets the planner and executor manipulate on
//! every step boundary are word-level bit operations rather than hash
//! lookups.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeSeq, Serializer};

const WORD_BITS: usize = 64;

/// An identifier backed by a dense index.
pub trait DenseId: Copy + Eq {
    /// The index this identifier maps to.
    fn index(self) -> usize;
    /// Rebuild the identifier from its index.
    fn from_index(index: usize) -> Self;
}

/// A growable bitset keyed by a [`DenseId`] type.
///
/// Trailing zero words are permitted; equality and hashing ignore them.
#[derive(Clone)]
pub struct DenseSet<I> {
    words: Vec<u64>,
    _marker: PhantomData<I>,
}

impl<I> Default for DenseSet<I> {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<I: DenseId> DenseSet<I> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn slot(id: I) -> (usize, u64) {
        let index = id.index();
        (index / WORD_BITS, 1u64 << (index % WORD_BITS))
    }

    /// Insert an element. Returns true if it was not already present.
    pub fn insert(&mut self, id: I) -> bool {
        let (word, mask) = Self::slot(id);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    /// Remove an element. Returns true if it was present.
    pub fn remove(&mut self, id: I) -> bool {
        let (word, mask) = Self::slot(id);
        if word >= self.words.len() {
            return false;
        }
        let present = self.words[word] & mask != 0;
        self.words[word] &= !mask;
        present
    }

    /// Test membership.
    pub fn contains(&self, id: I) -> bool {
        let (word, mask) = Self::slot(id);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Add every element of `other` to `self`.
    pub fn union_with(&mut self, other: &Self) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst |= src;
        }
    }

    /// Remove every element of `other` from `self`.
    pub fn subtract(&mut self, other: &Self) {
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst &= !src;
        }
    }

    /// Keep only the elements also present in `other`.
    pub fn intersect_with(&mut self, other: &Self) {
        for (i, dst) in self.words.iter_mut().enumerate() {
            *dst &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    /// True if `self` contains every element of `other`.
    pub fn is_superset(&self, other: &Self) -> bool {
        for (i, src) in other.words.iter().enumerate() {
            let dst = self.words.get(i).copied().unwrap_or(0);
            if src & !dst != 0 {
                return false;
            }
        }
        true
    }

    /// True if `self` and `other` share no element.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & b == 0)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True if no element is present.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Remove all elements.
    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Iterate over the elements in index order.
    pub fn iter(&self) -> impl Iterator<Item = I> + '_ {
        self.words.iter().enumerate().flat_map(|(word, bits)| {
            let mut bits = *bits;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(I::from_index(word * WORD_BITS + bit))
            })
        })
    }
}

impl<I: DenseId> PartialEq for DenseSet<I> {
    fn eq(&self, other: &Self) -> bool {
        let longest = self.words.len().max(other.words.len());
        (0..longest).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl<I: DenseId> Eq for DenseSet<I> {}

impl<I: DenseId + fmt::Debug> fmt::Debug for DenseSet<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<I: DenseId> FromIterator<I> for DenseSet<I> {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl<I: DenseId> Extend<I> for DenseSet<I> {
    fn extend<T: IntoIterator<Item = I>>(&mut self, iter: T) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl<I: DenseId> Serialize for DenseSet<I> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for id in self.iter() {
            seq.serialize_element(&(id.index() as u32))?;
        }
        seq.end()
    }
}

impl<'de, I: DenseId> Deserialize<'de> for DenseSet<I> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let indices = Vec::<u32>::deserialize(deserializer)?;
        Ok(indices
            .into_iter()
            .map(|i| I::from_index(i as usize))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct TestId(u32);

    impl DenseId for TestId {
        fn index(self) -> usize {
            self.0 as usize
        }
        fn from_index(index: usize) -> Self {
            TestId(index as u32)
        }
    }

    #[test]
    fn insert_contains_remove() {
        let mut set = DenseSet::new();
        assert!(set.insert(TestId(3)));
        assert!(set.insert(TestId(130)));
        assert!(!set.insert(TestId(3)), "second insert reports present");

        assert!(set.contains(TestId(3)));
        assert!(set.contains(TestId(130)));
        assert!(!set.contains(TestId(4)));

        assert!(set.remove(TestId(3)));
        assert!(!set.remove(TestId(3)));
        assert!(!set.contains(TestId(3)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn set_algebra() {
        let a: DenseSet<TestId> = [TestId(1), TestId(2), TestId(70)].into_iter().collect();
        let b: DenseSet<TestId> = [TestId(2), TestId(70)].into_iter().collect();

        assert!(a.is_superset(&b));
        assert!(!b.is_superset(&a));

        let mut u = b.clone();
        u.union_with(&a);
        assert_eq!(u, a);

        let mut d = a.clone();
        d.subtract(&b);
        assert_eq!(d, [TestId(1)].into_iter().collect());

        assert!(d.is_disjoint(&b));
        assert!(!a.is_disjoint(&b));

        let mut i = a.clone();
        i.intersect_with(&b);
        assert_eq!(i, b);
    }

    #[test]
    fn equality_ignores_trailing_words() {
        let mut a: DenseSet<TestId> = [TestId(1)].into_iter().collect();
        a.insert(TestId(500));
        a.remove(TestId(500));
        let b: DenseSet<TestId> = [TestId(1)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn iter_in_index_order() {
        let set: DenseSet<TestId> = [TestId(70), TestId(1), TestId(64)].into_iter().collect();
        let ids: Vec<u32> = set.iter().map(|i| i.0).collect();
        assert_eq!(ids, vec![1, 64, 70]);
    }

    #[test]
    fn serde_round_trip() {
        let set: DenseSet<TestId> = [TestId(9), TestId(0)].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[0,9]");
        let back: DenseSet<TestId> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
