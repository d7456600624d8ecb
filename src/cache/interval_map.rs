//! Range-compressed total maps.
//!
//! An [`IntervalMap`] behaves like a function `K -> V` that returns
//! `V::default()` everywhere until ranges are updated. Internally it stores
//! only the breakpoints where the value changes, so updating a contiguous range
//! costs O(log N + M) where M is the number of breakpoints inside the range.
//!
//! ```text
//!   breakpoints:  MIN=0   2=2   4=3   5=1   6=0
//!   runs:         [MIN,2) [2,4) [4,5) [5,6) [6,MAX)
//! ```
//!
//! The map never stores two adjacent breakpoints with equal values, so
//! iterating it yields every maximal constant run exactly once.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::{Peekable, Rev};
use std::ops::{AddAssign, Bound};

/// Key types with a smallest and largest value.
pub trait Bounded: Copy + Ord {
    const MIN: Self;
    const MAX: Self;
}

macro_rules! impl_bounded {
    ($($t:ty),* $(,)?) => {
        $(
            impl Bounded for $t {
                const MIN: Self = <$t>::MIN;
                const MAX: Self = <$t>::MAX;
            }
        )*
    };
}

impl_bounded!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// Half-open range `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interval<K> {
    pub begin: K,
    pub end: K,
}

impl<K: Copy + Ord> Interval<K> {
    pub fn new(begin: K, end: K) -> Self {
        Self { begin, end }
    }

    /// An interval is empty when `begin >= end`.
    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    /// Overlap of two intervals. May be empty.
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            begin: self.begin.max(other.begin),
            end: self.end.min(other.end),
        }
    }

    pub fn contains(&self, key: K) -> bool {
        self.begin <= key && key < self.end
    }
}

macro_rules! impl_interval_len {
    ($($t:ty => $u:ty),* $(,)?) => {
        $(
            impl Interval<$t> {
                /// Number of keys covered; zero when empty.
                pub fn len(&self) -> $u {
                    if self.is_empty() {
                        0
                    } else {
                        self.end.abs_diff(self.begin)
                    }
                }
            }
        )*
    };
}

impl_interval_len!(
    i8 => u8, i16 => u16, i32 => u32, i64 => u64, i128 => u128, isize => usize,
    u8 => u8, u16 => u16, u32 => u32, u64 => u64, u128 => u128, usize => usize,
);

impl<K: fmt::Display> fmt::Display for Interval<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// Sparse total map from `K` to `V`, optimized for range updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalMap<K, V> {
    /// Breakpoint -> value of the run starting there. Always holds `K::MIN`.
    map: BTreeMap<K, V>,
}

impl<K: Bounded, V: Clone + Default + PartialEq> IntervalMap<K, V> {
    pub fn new() -> Self {
        let mut map = BTreeMap::new();
        map.insert(K::MIN, V::default());
        Self { map }
    }

    /// Value at `key`.
    pub fn get(&self, key: K) -> &V {
        self.floor(key).1
    }

    /// The run containing `key` and its value.
    pub fn find(&self, key: K) -> (Interval<K>, &V) {
        let (begin, value) = self.floor(key);
        (Interval::new(begin, self.run_end(begin)), value)
    }

    /// Overwrites every value in `[from, to)` with `value`.
    pub fn set(&mut self, from: K, to: K, value: V) {
        debug_assert!(from < to, "interval map update needs from < to");
        if from >= to {
            return;
        }
        self.split_at(from);
        self.split_at(to);

        let interior: Vec<K> = self
            .map
            .range((Bound::Excluded(from), Self::upper(to)))
            .map(|(key, _)| *key)
            .collect();
        for key in interior {
            self.map.remove(&key);
        }
        self.map.insert(from, value);

        self.merge_at(from);
        self.merge_at(to);
    }

    /// Iterates every maximal run in increasing key order.
    pub fn iter(&self) -> Runs<'_, K, V> {
        Runs {
            inner: self.map.range(..).peekable(),
        }
    }

    /// Iterates runs in increasing order, starting with the run containing `key`.
    pub fn iter_from(&self, key: K) -> Runs<'_, K, V> {
        let begin = self.floor(key).0;
        Runs {
            inner: self.map.range(begin..).peekable(),
        }
    }

    /// Iterates runs in decreasing order, starting with the run containing `key`.
    pub fn runs_before(&self, key: K) -> RunsRev<'_, K, V> {
        let begin = self.floor(key).0;
        RunsRev {
            inner: self.map.range(..=begin).rev(),
            next_end: self.run_end(begin),
        }
    }

    /// Resets the map to the single default run.
    pub fn clear(&mut self) {
        self.map.clear();
        self.map.insert(K::MIN, V::default());
    }

    /// Number of runs.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Never true: a map always has at least one run.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// `true` when every key maps to `V::default()`.
    pub fn is_default(&self) -> bool {
        self.map.len() == 1 && self.map.get(&K::MIN) == Some(&V::default())
    }

    fn floor(&self, key: K) -> (K, &V) {
        match self.map.range(..=key).next_back() {
            Some((begin, value)) => (*begin, value),
            None => unreachable!("interval map lost its K::MIN breakpoint"),
        }
    }

    fn run_end(&self, begin: K) -> K {
        self.map
            .range((Bound::Excluded(begin), Bound::Unbounded))
            .next()
            .map_or(K::MAX, |(key, _)| *key)
    }

    // K::MAX is the implicit end of the last run, never a breakpoint.
    fn upper(to: K) -> Bound<K> {
        if to == K::MAX {
            Bound::Unbounded
        } else {
            Bound::Excluded(to)
        }
    }

    fn split_at(&mut self, key: K) {
        if key == K::MAX || self.map.contains_key(&key) {
            return;
        }
        let inherited = self.get(key).clone();
        self.map.insert(key, inherited);
    }

    fn merge_at(&mut self, key: K) {
        let Some(value) = self.map.get(&key) else {
            return;
        };
        let same_as_previous = self
            .map
            .range(..key)
            .next_back()
            .is_some_and(|(_, previous)| previous == value);
        if same_as_previous {
            self.map.remove(&key);
        }
    }
}

impl<K, V> IntervalMap<K, V>
where
    K: Bounded,
    V: Clone + Default + PartialEq + AddAssign,
{
    /// Adds `delta` to every value in `[from, to)`.
    pub fn increment(&mut self, from: K, to: K, delta: V) {
        debug_assert!(from < to, "interval map update needs from < to");
        if from >= to || delta == V::default() {
            return;
        }
        self.split_at(from);
        self.split_at(to);

        for (_, value) in self
            .map
            .range_mut((Bound::Included(from), Self::upper(to)))
        {
            *value += delta.clone();
        }

        self.merge_at(from);
        self.merge_at(to);
    }
}

impl<K: Bounded, V: Clone + Default + PartialEq> Default for IntervalMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K: Bounded, V: Clone + Default + PartialEq> IntoIterator for &'a IntervalMap<K, V> {
    type Item = (Interval<K>, &'a V);
    type IntoIter = Runs<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward iterator over runs.
pub struct Runs<'a, K, V> {
    inner: Peekable<btree_map::Range<'a, K, V>>,
}

impl<'a, K: Bounded, V> Iterator for Runs<'a, K, V> {
    type Item = (Interval<K>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (begin, value) = self.inner.next()?;
        let end = self.inner.peek().map_or(K::MAX, |(next, _)| **next);
        Some((Interval::new(*begin, end), value))
    }
}

/// Backward iterator over runs.
pub struct RunsRev<'a, K, V> {
    inner: Rev<btree_map::Range<'a, K, V>>,
    next_end: K,
}

impl<'a, K: Bounded, V> Iterator for RunsRev<'a, K, V> {
    type Item = (Interval<K>, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (begin, value) = self.inner.next()?;
        let interval = Interval::new(*begin, self.next_end);
        self.next_end = *begin;
        Some((interval, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(map: &IntervalMap<i32, i32>) -> Vec<(i32, i32, i32)> {
        map.iter().map(|(r, v)| (r.begin, r.end, *v)).collect()
    }

    #[test]
    fn test_interval_len() {
        assert_eq!(Interval::new(2i64, 7).len(), 5);
        assert_eq!(Interval::new(-3i64, 3).len(), 6);
        assert_eq!(Interval::new(4i64, 4).len(), 0);
        assert_eq!(Interval::new(9i64, 1).len(), 0);
        assert_eq!(Interval::new(i64::MIN, i64::MAX).len(), u64::MAX);
        assert_eq!(Interval::new(3u8, 10).len(), 7);
    }

    #[test]
    fn test_new_map_is_single_default_run() {
        let map: IntervalMap<i32, i32> = IntervalMap::new();
        assert_eq!(runs(&map), vec![(i32::MIN, i32::MAX, 0)]);
        assert!(map.is_default());
        assert_eq!(*map.get(42), 0);
    }

    #[test]
    fn test_overlapping_increments() {
        let mut map = IntervalMap::new();
        map.increment(2, 5, 2);
        map.increment(4, 6, 1);

        let points: Vec<i32> = (0..7).map(|k| *map.get(k)).collect();
        assert_eq!(points, vec![0, 0, 2, 2, 3, 1, 0]);
        assert_eq!(
            runs(&map),
            vec![
                (i32::MIN, 2, 0),
                (2, 4, 2),
                (4, 5, 3),
                (5, 6, 1),
                (6, i32::MAX, 0),
            ]
        );
    }

    #[test]
    fn test_increment_then_undo_merges_back() {
        let mut map = IntervalMap::new();
        map.increment(10, 20, 3);
        map.increment(10, 20, -3);
        assert!(map.is_default());
    }

    #[test]
    fn test_zero_delta_is_noop() {
        let mut map: IntervalMap<i32, i32> = IntervalMap::new();
        map.increment(1, 4, 0);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_adjacent_equal_runs_merge() {
        let mut map = IntervalMap::new();
        map.increment(0, 5, 1);
        map.increment(5, 10, 1);
        assert_eq!(runs(&map), vec![(i32::MIN, 0, 0), (0, 10, 1), (10, i32::MAX, 0)]);
    }

    #[test]
    fn test_set_replaces_interior() {
        let mut map = IntervalMap::new();
        map.increment(0, 3, 1);
        map.increment(5, 8, 2);
        map.set(1, 7, 9);
        assert_eq!(
            runs(&map),
            vec![
                (i32::MIN, 0, 0),
                (0, 1, 1),
                (1, 7, 9),
                (7, 8, 2),
                (8, i32::MAX, 0),
            ]
        );
    }

    #[test]
    fn test_set_to_default_merges_with_neighbours() {
        let mut map = IntervalMap::new();
        map.set(3, 6, 1);
        map.set(3, 6, 0);
        assert!(map.is_default());
    }

    #[test]
    fn test_update_reaching_max_has_no_max_breakpoint() {
        let mut map: IntervalMap<u8, u8> = IntervalMap::new();
        map.increment(250, u8::MAX, 1);
        let all: Vec<_> = map.iter().map(|(r, v)| (r.begin, r.end, *v)).collect();
        assert_eq!(all, vec![(0, 250, 0), (250, u8::MAX, 1)]);
    }

    #[test]
    fn test_find_agrees_with_get() {
        let mut map = IntervalMap::new();
        map.increment(2, 5, 2);
        map.increment(4, 6, 1);
        for k in -3..10 {
            let (run, value) = map.find(k);
            assert!(run.contains(k));
            assert_eq!(value, map.get(k));
        }
        assert_eq!(map.find(4).0, Interval::new(4, 5));
    }

    #[test]
    fn test_iter_from_and_runs_before() {
        let mut map = IntervalMap::new();
        map.increment(2, 4, 1);
        map.increment(6, 8, 1);

        let forward: Vec<_> = map.iter_from(3).map(|(r, v)| (r.begin, r.end, *v)).collect();
        assert_eq!(forward, vec![(2, 4, 1), (4, 6, 0), (6, 8, 1), (8, i32::MAX, 0)]);

        let backward: Vec<_> = map.runs_before(6).map(|(r, v)| (r.begin, r.end, *v)).collect();
        assert_eq!(backward, vec![(6, 8, 1), (4, 6, 0), (2, 4, 1), (i32::MIN, 2, 0)]);
    }

    #[test]
    fn test_clear_restores_default() {
        let mut map = IntervalMap::new();
        map.increment(1, 100, 7);
        map.clear();
        assert!(map.is_default());
        assert_eq!(*map.get(50), 0);
    }

    #[test]
    fn test_interval_helpers() {
        let a = Interval::new(0, 10);
        let b = Interval::new(5, 15);
        assert_eq!(a.intersect(&b), Interval::new(5, 10));
        assert!(Interval::new(3, 3).is_empty());
        assert!(a.intersect(&Interval::new(10, 20)).is_empty());
        assert_eq!(a.to_string(), "[0, 10)");
    }
}
