//! UnorderedMap: a bounded hash map over a fixed bucket array and an inline
//! node pool.
//!
//! - `B` buckets, each an intrusive singly-linked list of node ids.
//! - One `NodePool` of capacity `N` owns every key/value pair.
//! - `first`/`last` hold the lowest and highest non-empty bucket indices
//!   (both 0 when empty). They are kept current on every insert and erase
//!   so whole-map iteration only walks the occupied span.
//!
//! Nothing here allocates; a full pool is reported as `Error::MapFull` and
//! leaves the map untouched.

use crate::bucket::{Bucket, Linked, Position};
use crate::error::{Error, Result};
use crate::pool::{NodeId, NodePool};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::mem;
use hashbrown::hash_map::DefaultHashBuilder;

/// Key equality relation used by the map.
pub trait KeyEqual<Q: ?Sized> {
    fn eq(&self, a: &Q, b: &Q) -> bool;
}

/// `==` on the key type.
#[derive(Copy, Clone, Debug, Default)]
pub struct EqualTo;

impl<Q: ?Sized + Eq> KeyEqual<Q> for EqualTo {
    #[inline]
    fn eq(&self, a: &Q, b: &Q) -> bool {
        a == b
    }
}

impl<Q: ?Sized, F> KeyEqual<Q> for F
where
    F: Fn(&Q, &Q) -> bool,
{
    #[inline]
    fn eq(&self, a: &Q, b: &Q) -> bool {
        self(a, b)
    }
}

#[derive(Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    next: Option<NodeId>,
}

impl<K, V> Linked for Node<K, V> {
    #[inline]
    fn next(&self) -> Option<NodeId> {
        self.next
    }
    #[inline]
    fn set_next(&mut self, next: Option<NodeId>) {
        self.next = next;
    }
}

/// Position of one entry, or the end.
///
/// Cursors compare by entry only: every end cursor equals every other.
/// Any mutation of the map may invalidate a cursor; a stale cursor is
/// never unsafe, it resolves to nothing or to whatever reused its slot.
#[derive(Copy, Clone, Debug)]
pub struct Cursor {
    bucket: usize,
    node: Option<NodeId>,
}

impl Cursor {
    fn at(bucket: usize, node: NodeId) -> Self {
        Self {
            bucket,
            node: Some(node),
        }
    }

    /// Bucket index of the entry; `bucket_count()` for the end cursor.
    pub fn bucket(&self) -> usize {
        self.bucket
    }

    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl Eq for Cursor {}

#[derive(Clone)]
pub struct UnorderedMap<K, V, const N: usize, const B: usize = N, H = DefaultHashBuilder, E = EqualTo> {
    buckets: [Bucket; B],
    pool: NodePool<Node<K, V>, N>,
    first: usize,
    last: usize,
    hasher: H,
    key_eq: E,
}

/// Entries in bucket order, from the first to the last occupied bucket.
pub struct Iter<'m, K, V, const N: usize> {
    buckets: &'m [Bucket],
    pool: &'m NodePool<Node<K, V>, N>,
    bucket: usize,
    last: usize,
    node: Option<NodeId>,
    remaining: usize,
}

impl<'m, K, V, const N: usize> Clone for Iter<'m, K, V, N> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<'m, K, V, const N: usize> Iterator for Iter<'m, K, V, N> {
    type Item = (&'m K, &'m V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.node {
                let node = self.pool.get(id)?;
                self.node = node.next;
                self.remaining = self.remaining.saturating_sub(1);
                return Some((&node.key, &node.value));
            }
            if self.bucket >= self.last {
                return None;
            }
            self.bucket += 1;
            self.node = self.buckets[self.bucket].begin();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'m, K, V, const N: usize> ExactSizeIterator for Iter<'m, K, V, N> {}
impl<'m, K, V, const N: usize> core::iter::FusedIterator for Iter<'m, K, V, N> {}

impl<K, V, const N: usize, const B: usize> UnorderedMap<K, V, N, B> {
    pub fn new() -> Self {
        Self::with_hasher_and_key_eq(DefaultHashBuilder::default(), EqualTo)
    }
}

impl<K, V, const N: usize, const B: usize, H, E> UnorderedMap<K, V, N, B, H, E> {
    const HAS_BUCKETS: () = assert!(B > 0, "an unordered map needs at least one bucket");

    pub fn with_hasher(hasher: H) -> Self
    where
        E: Default,
    {
        Self::with_hasher_and_key_eq(hasher, E::default())
    }

    pub fn with_hasher_and_key_eq(hasher: H, key_eq: E) -> Self {
        let () = Self::HAS_BUCKETS;
        Self {
            buckets: core::array::from_fn(|_| Bucket::new()),
            pool: NodePool::new(),
            first: 0,
            last: 0,
            hasher,
            key_eq,
        }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.pool.is_full()
    }
    /// Maximum number of entries (`max_size`).
    pub fn capacity(&self) -> usize {
        N
    }
    pub fn available(&self) -> usize {
        self.pool.available()
    }
    pub fn bucket_count(&self) -> usize {
        B
    }
    pub fn max_bucket_count(&self) -> usize {
        B
    }
    pub fn load_factor(&self) -> f32 {
        self.len() as f32 / B as f32
    }
    pub fn hash_function(&self) -> &H {
        &self.hasher
    }
    pub fn key_eq(&self) -> &E {
        &self.key_eq
    }

    pub fn begin(&self) -> Cursor {
        self.first_from(self.first)
    }

    pub fn end(&self) -> Cursor {
        Cursor {
            bucket: B,
            node: None,
        }
    }

    // First entry in buckets `start..=last`, or the end.
    fn first_from(&self, start: usize) -> Cursor {
        if self.is_empty() {
            return self.end();
        }
        for index in start..=self.last {
            if let Some(id) = self.buckets[index].begin() {
                return Cursor::at(index, id);
            }
        }
        self.end()
    }

    /// Cursor to the entry after `cursor`, crossing empty buckets.
    pub fn next_cursor(&self, cursor: Cursor) -> Cursor {
        let Some(id) = cursor.node else {
            return self.end();
        };
        let Some(bucket) = self.buckets.get(cursor.bucket) else {
            return self.end();
        };
        match bucket.next_of(Position::At(id), &self.pool) {
            Some(next) => Cursor::at(cursor.bucket, next),
            None => self.first_from(cursor.bucket + 1),
        }
    }

    pub fn entry_at(&self, cursor: Cursor) -> Option<(&K, &V)> {
        let node = self.pool.get(cursor.node?)?;
        Some((&node.key, &node.value))
    }

    pub fn entry_at_mut(&mut self, cursor: Cursor) -> Option<(&K, &mut V)> {
        let node = self.pool.get_mut(cursor.node?)?;
        Some((&node.key, &mut node.value))
    }

    // A cursor is live when its node is linked into the bucket it names.
    fn is_live(&self, cursor: Cursor) -> bool {
        match cursor.node {
            None => true,
            Some(id) => self
                .buckets
                .get(cursor.bucket)
                .is_some_and(|b| b.iter(&self.pool).any(|n| n == id)),
        }
    }

    fn invalid_range(&self) -> Error {
        log::debug!("cursor range does not lie within the map (len {})", self.len());
        Error::InvalidIteratorRange
    }

    /// Number of steps from `first` to `last`.
    pub fn distance(&self, first: Cursor, last: Cursor) -> Result<usize> {
        if !self.is_live(first) {
            return Err(self.invalid_range());
        }
        let mut cursor = first;
        let mut steps = 0;
        while cursor != last {
            if cursor.is_end() {
                return Err(self.invalid_range());
            }
            cursor = self.next_cursor(cursor);
            steps += 1;
        }
        Ok(steps)
    }

    pub fn iter(&self) -> Iter<'_, K, V, N> {
        let (bucket, node) = if self.is_empty() {
            (0, None)
        } else {
            (self.first, self.buckets[self.first].begin())
        };
        Iter {
            buckets: &self.buckets,
            pool: &self.pool,
            bucket,
            last: self.last,
            node,
            remaining: self.len(),
        }
    }

    /// Entries with mutable values, in pool storage order rather than
    /// bucket order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> + '_ {
        self.pool
            .iter_mut()
            .map(|(_, node)| (&node.key, &mut node.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// Values in pool storage order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.pool.iter_mut().map(|(_, node)| &mut node.value)
    }

    /// Entries of bucket `index`; empty for an out-of-range index.
    pub fn bucket_iter(&self, index: usize) -> impl Iterator<Item = (&K, &V)> + '_ {
        let head = self.buckets.get(index).and_then(|b| b.begin());
        core::iter::successors(head, move |&id| self.pool.get(id).and_then(|n| n.next))
            .filter_map(move |id| self.pool.get(id).map(|n| (&n.key, &n.value)))
    }

    /// Drop every entry and reset the markers.
    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }
        log::trace!("clearing {} entries from buckets {}..={}", self.len(), self.first, self.last);
        for bucket in &mut self.buckets[self.first..=self.last] {
            bucket.clear();
        }
        self.pool.release_all();
        self.first = 0;
        self.last = 0;
    }

    /// Remove the entry at `cursor` and return the cursor that followed it.
    /// A stale or end cursor removes nothing and yields the end.
    pub fn erase_at(&mut self, cursor: Cursor) -> Cursor {
        let Some(id) = cursor.node else {
            return self.end();
        };
        let Some(pos) = self
            .buckets
            .get(cursor.bucket)
            .and_then(|b| b.position_before(id, &self.pool))
        else {
            return self.end();
        };
        let next = self.next_cursor(cursor);
        let _ = self.unlink(cursor.bucket, pos);
        next
    }

    /// Remove every entry in `[first, last)`. The range is checked before
    /// anything is removed.
    pub fn erase_range(&mut self, first: Cursor, last: Cursor) -> Result<Cursor> {
        let steps = self.distance(first, last)?;
        if steps == self.len() {
            self.clear();
            return Ok(self.end());
        }
        let mut cursor = first;
        while cursor != last {
            cursor = self.erase_at(cursor);
        }
        Ok(cursor)
    }

    // Unlink the node after `pos` in bucket `index` and hand its pair back.
    fn unlink(&mut self, index: usize, pos: Position) -> Option<(K, V)> {
        let bucket = &mut self.buckets[index];
        let victim = bucket.next_of(pos, &self.pool)?;
        bucket.erase_after(pos, &mut self.pool);
        let node = self.pool.release(victim)?;
        self.note_erased(index);
        Some((node.key, node.value))
    }

    #[cfg(test)]
    pub(crate) fn markers(&self) -> (usize, usize) {
        (self.first, self.last)
    }

    fn take_first(&mut self) -> Option<(K, V)> {
        let cursor = self.begin();
        cursor.node?;
        self.unlink(cursor.bucket, Position::BeforeBegin)
    }

    fn note_inserted(&mut self, index: usize) {
        if self.len() == 1 {
            self.first = index;
            self.last = index;
        } else if index < self.first {
            self.first = index;
        } else if index > self.last {
            self.last = index;
        }
    }

    fn note_erased(&mut self, index: usize) {
        if self.is_empty() {
            self.first = 0;
            self.last = 0;
            return;
        }
        if !self.buckets[index].is_empty() {
            return;
        }
        if index == self.first {
            while self.first < self.last && self.buckets[self.first].is_empty() {
                self.first += 1;
            }
            log::trace!("first occupied bucket moved {} -> {}", index, self.first);
        } else if index == self.last {
            let mut last = self.first;
            for i in self.first..index {
                if !self.buckets[i].is_empty() {
                    last = i;
                }
            }
            self.last = last;
            log::trace!("last occupied bucket moved {} -> {}", index, self.last);
        }
    }
}

impl<K, V, const N: usize, const B: usize, H, E> UnorderedMap<K, V, N, B, H, E>
where
    K: Hash,
    H: BuildHasher,
{
    fn bucket_index<Q>(&self, q: &Q) -> usize
    where
        Q: ?Sized + Hash,
    {
        (self.hasher.hash_one(q) % B as u64) as usize
    }

    // Predecessor position and id of the node matching `q` in bucket `index`.
    fn search<Q>(&self, index: usize, q: &Q) -> Option<(Position, NodeId)>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        E: KeyEqual<Q>,
    {
        let bucket = &self.buckets[index];
        let mut pos = Position::BeforeBegin;
        while let Some(id) = bucket.next_of(pos, &self.pool) {
            let node = self.pool.get(id)?;
            if self.key_eq.eq(node.key.borrow(), q) {
                return Some((pos, id));
            }
            pos = Position::At(id);
        }
        None
    }

    fn full(&self) -> Error {
        log::debug!("unordered map full at {} entries", N);
        Error::MapFull
    }

    // Append a new node at the end of bucket `index`.
    fn link_new(&mut self, index: usize, key: K, value: V) -> Result<NodeId> {
        let id = self
            .pool
            .allocate(Node {
                key,
                value,
                next: None,
            })
            .map_err(|_| self.full())?;
        let bucket = &mut self.buckets[index];
        let tail = bucket.last_position(&self.pool);
        bucket.insert_after(tail, id, &mut self.pool);
        self.note_inserted(index);
        Ok(id)
    }

    /// Insert `key` with `value`. An existing key is left as it is and
    /// reported with `false`; nothing is changed when the map is full.
    ///
    /// ```
    /// use fixed_delegate_map::{Error, UnorderedMap};
    ///
    /// let mut m: UnorderedMap<u32, &str, 1> = UnorderedMap::new();
    /// assert!(m.insert(1, "one").unwrap().1);
    /// assert!(!m.insert(1, "uno").unwrap().1);
    /// assert_eq!(m.insert(2, "two"), Err(Error::MapFull));
    /// assert_eq!(m.get(&1), Some(&"one"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Result<(Cursor, bool)>
    where
        E: KeyEqual<K>,
    {
        self.insert_with(key, || value)
    }

    /// Like `insert`, but `make` only runs when a new entry is created.
    pub fn insert_with<F>(&mut self, key: K, make: F) -> Result<(Cursor, bool)>
    where
        E: KeyEqual<K>,
        F: FnOnce() -> V,
    {
        let index = self.bucket_index(&key);
        if let Some((_, id)) = self.search(index, &key) {
            return Ok((Cursor::at(index, id), false));
        }
        if self.is_full() {
            return Err(self.full());
        }
        let id = self.link_new(index, key, make())?;
        Ok((Cursor::at(index, id), true))
    }

    /// Insert every pair, stopping at the first failure.
    pub fn try_extend<I>(&mut self, iter: I) -> Result<()>
    where
        E: KeyEqual<K>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in iter {
            self.insert(k, v)?;
        }
        Ok(())
    }

    /// Value for `key`, inserting `V::default()` first when absent.
    pub fn get_or_insert_default(&mut self, key: K) -> Result<&mut V>
    where
        E: KeyEqual<K>,
        V: Default,
    {
        let index = self.bucket_index(&key);
        let id = match self.search(index, &key) {
            Some((_, id)) => id,
            None if self.is_full() => return Err(self.full()),
            None => self.link_new(index, key, V::default())?,
        };
        self.pool
            .get_mut(id)
            .map(|n| &mut n.value)
            .ok_or(Error::MapOutOfRange)
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        let (_, id) = self.search(self.bucket_index(q), q)?;
        self.pool.get_mut(id).map(|n| &mut n.value)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        let (_, id) = self.search(self.bucket_index(q), q)?;
        self.pool.get(id).map(|n| (&n.key, &n.value))
    }

    pub fn at<Q>(&self, q: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        self.get(q).ok_or_else(|| {
            log::debug!("at: key not present");
            Error::MapOutOfRange
        })
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        self.get_mut(q).ok_or_else(|| {
            log::debug!("at_mut: key not present");
            Error::MapOutOfRange
        })
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        self.search(self.bucket_index(q), q).is_some()
    }

    /// Cursor to the entry for `q`, or the end.
    pub fn find<Q>(&self, q: &Q) -> Cursor
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        let index = self.bucket_index(q);
        match self.search(index, q) {
            Some((_, id)) => Cursor::at(index, id),
            None => self.end(),
        }
    }

    pub fn count<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        usize::from(self.contains_key(q))
    }

    /// `[find(q), next)` or an empty range at the end.
    pub fn equal_range<Q>(&self, q: &Q) -> (Cursor, Cursor)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        let found = self.find(q);
        if found.is_end() {
            (found, found)
        } else {
            (found, self.next_cursor(found))
        }
    }

    /// Index of the bucket `q` hashes to.
    pub fn bucket<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        self.bucket_index(q)
    }

    /// Number of entries sharing `q`'s bucket.
    pub fn bucket_size<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        self.buckets[self.bucket_index(q)].len(&self.pool)
    }

    /// Remove `q`; returns the number of entries removed (0 or 1).
    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        usize::from(self.remove_entry(q).is_some())
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
        E: KeyEqual<Q>,
    {
        let index = self.bucket_index(q);
        let (pos, _) = self.search(index, q)?;
        self.unlink(index, pos)
    }

    /// Replace the contents with `iter`. The new entries are staged in a
    /// fresh map first, so on `MapFull` the old contents are left intact.
    pub fn assign<I>(&mut self, iter: I) -> Result<()>
    where
        H: Clone,
        E: KeyEqual<K> + Clone,
        I: IntoIterator<Item = (K, V)>,
    {
        let iter = iter.into_iter();
        if iter.size_hint().0 > N {
            return Err(self.full());
        }
        let mut staged = Self::with_hasher_and_key_eq(self.hasher.clone(), self.key_eq.clone());
        staged.try_extend(iter)?;
        mem::swap(self, &mut staged);
        Ok(())
    }

    /// Replace the contents with copies of `other`'s entries.
    pub fn assign_from<const M: usize, const C: usize, H2, E2>(
        &mut self,
        other: &UnorderedMap<K, V, M, C, H2, E2>,
    ) -> Result<()>
    where
        K: Clone,
        V: Clone,
        E: KeyEqual<K>,
    {
        if other.len() > N {
            return Err(self.full());
        }
        // `other` holds at most N distinct keys, so this cannot run out.
        self.clear();
        self.try_extend(other.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Replace the contents by moving every entry out of `other`, which is
    /// left empty.
    pub fn take_from<const M: usize, const C: usize, H2, E2>(
        &mut self,
        other: &mut UnorderedMap<K, V, M, C, H2, E2>,
    ) -> Result<()>
    where
        E: KeyEqual<K>,
    {
        if other.len() > N {
            return Err(self.full());
        }
        self.clear();
        while let Some((k, v)) = other.take_first() {
            self.insert(k, v)?;
        }
        Ok(())
    }

    /// Build a map from `iter`, failing with `MapFull` past capacity.
    pub fn try_from_iter<I>(iter: I) -> Result<Self>
    where
        E: KeyEqual<K> + Default,
        H: Default,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::with_hasher_and_key_eq(H::default(), E::default());
        map.try_extend(iter)?;
        Ok(map)
    }
}

impl<K, V, const N: usize, const B: usize, H, E> Default for UnorderedMap<K, V, N, B, H, E>
where
    H: Default,
    E: Default,
{
    fn default() -> Self {
        Self::with_hasher_and_key_eq(H::default(), E::default())
    }
}

impl<K, V, const N: usize, const B: usize, H, E> PartialEq for UnorderedMap<K, V, N, B, H, E>
where
    K: Hash,
    V: PartialEq,
    H: BuildHasher,
    E: KeyEqual<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| v == ov))
    }
}

impl<K, V, const N: usize, const B: usize, H, E> Eq for UnorderedMap<K, V, N, B, H, E>
where
    K: Hash,
    V: Eq,
    H: BuildHasher,
    E: KeyEqual<K>,
{
}

impl<K: fmt::Debug, V: fmt::Debug, const N: usize, const B: usize, H, E> fmt::Debug
    for UnorderedMap<K, V, N, B, H, E>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'m, K, V, const N: usize, const B: usize, H, E> IntoIterator for &'m UnorderedMap<K, V, N, B, H, E> {
    type Item = (&'m K, &'m V);
    type IntoIter = Iter<'m, K, V, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
