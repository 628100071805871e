//! A sorted container split into fixed-capacity segments.
//!
//! Peaks arrive from the parser in (mostly) ascending order, and are then hit
//! with many range queries. Elements are stored in a small number of sorted
//! segments, and the smallest key of each segment is kept in a separate
//! boundary array, so every lookup is two binary searches: first over the
//! segment boundaries, and then within a single segment.
//!
//! Segment 0 covers keys up to the boundary of segment 1, segment 1 covers keys
//! up to the boundary of segment 2, and so on:
//!
//! ```text
//! bounds:   [100.0,           250.3,             611.9          ]
//! segments: [100.0 .. 249.8], [250.3 .. 611.2],  [611.9 .. 1404.6]
//! ```

use std::ops::Index;

pub const DEFAULT_SEGMENT_SIZE: usize = 128;

/// Anything that can be ordered by a single floating point key
pub trait SortKey {
    fn sort_key(&self) -> f64;
}

impl SortKey for f64 {
    fn sort_key(&self) -> f64 {
        *self
    }
}

impl SortKey for f32 {
    fn sort_key(&self) -> f64 {
        *self as f64
    }
}

/// Identifies a single element stored in a [`SegmentedList`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// The query key is exactly the boundary key of this segment, i.e. the
    /// element is the head of the segment
    Boundary(usize),
    Within { segment: usize, offset: usize },
}

#[derive(Clone, Debug)]
pub struct SegmentedList<T> {
    segments: Vec<Vec<T>>,
    /// Lower key bound for each segment. After removals this may lag behind the
    /// true head of a segment (it is never larger), which keeps all searches
    /// correct. [`SegmentedList::finalize`] tightens it again.
    bounds: Vec<f64>,
    /// Global index of the first element of each segment, with the total
    /// length as the final entry
    offsets: Vec<usize>,
    segment_size: usize,
}

impl<T> Default for SegmentedList<T> {
    fn default() -> Self {
        Self::with_segment_size(DEFAULT_SEGMENT_SIZE)
    }
}

impl<T: SortKey> SegmentedList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from items that are already sorted by key
    ///
    /// # Panics
    /// * In debug builds, if `items` is not sorted
    pub fn from_sorted(items: Vec<T>) -> Self {
        debug_assert!(
            items
                .windows(2)
                .all(|w| w[0].sort_key() <= w[1].sort_key()),
            "BUG: SegmentedList::from_sorted called with unsorted items"
        );
        let mut list = Self::default();
        let mut iter = items.into_iter().peekable();
        while iter.peek().is_some() {
            let segment = iter.by_ref().take(list.segment_size).collect::<Vec<_>>();
            list.bounds.push(segment[0].sort_key());
            list.segments.push(segment);
        }
        list.reindex_from(0);
        list
    }

    /// Insert `item`, keeping the list sorted. Items with equal keys are kept
    /// in insertion order.
    pub fn insert(&mut self, item: T) {
        let key = item.sort_key();
        if self.segments.is_empty() {
            self.bounds.push(key);
            self.segments.push(vec![item]);
            self.reindex_from(0);
            return;
        }

        // Last segment whose boundary is <= key - for ascending input this is
        // always the final segment, and the item is simply appended
        let segment = self.bounds.partition_point(|b| *b <= key).saturating_sub(1);
        let seg = &mut self.segments[segment];
        let pos = seg.partition_point(|x| x.sort_key() <= key);
        seg.insert(pos, item);
        if pos == 0 {
            self.bounds[segment] = key;
        }

        if self.segments[segment].len() > 2 * self.segment_size {
            let half = self.segments[segment].len() / 2;
            let tail = self.segments[segment].split_off(half);
            self.bounds.insert(segment + 1, tail[0].sort_key());
            self.segments.insert(segment + 1, tail);
        }
        self.reindex_from(segment);
    }

    /// Index of the first element with `sort_key() >= key`, or `len()` if
    /// there is no such element
    pub fn lower_bound(&self, key: f64) -> usize {
        let s = self.bounds.partition_point(|b| *b < key);
        if s == 0 {
            return 0;
        }
        let segment = s - 1;
        let offset = self.segments[segment].partition_point(|x| x.sort_key() < key);
        self.offsets[segment] + offset
    }

    /// Find the first element whose key is exactly `key`
    pub fn locate(&self, key: f64) -> Option<Location> {
        let index = self.lower_bound(key);
        if index >= self.len() || self.get(index).sort_key() != key {
            return None;
        }
        let (segment, offset) = self.position(index);
        if offset == 0 && self.bounds[segment] == key {
            Some(Location::Boundary(segment))
        } else {
            Some(Location::Within { segment, offset })
        }
    }

    /// Iterate over all elements with keys in the closed interval `[lo, hi]`
    pub fn range(&self, lo: f64, hi: f64) -> impl Iterator<Item = &T> {
        self.iter_from(self.lower_bound(lo))
            .take_while(move |x| x.sort_key() <= hi)
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.find(item).is_some()
    }

    /// Remove the first element equal to `item`. Returns `false` if it was not
    /// present.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        match self.find(item) {
            Some(index) => {
                let (segment, offset) = self.position(index);
                self.remove_at(Location::Within { segment, offset });
                true
            }
            None => false,
        }
    }

    /// Keep only the elements for which `f` returns true. Call
    /// [`SegmentedList::finalize`] afterwards to drop emptied segments.
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut f: F) {
        for segment in self.segments.iter_mut() {
            segment.retain(&mut f);
        }
        self.reindex_from(0);
    }

    /// Compact the list after a batch of mutations: empty segments are dropped,
    /// undersized neighbours are merged and segment boundaries are refreshed.
    /// Calling this twice in a row is a no-op.
    pub fn finalize(&mut self) {
        let mut compacted: Vec<Vec<T>> = Vec::with_capacity(self.segments.len());
        for segment in self.segments.drain(..) {
            if segment.is_empty() {
                continue;
            }
            match compacted.last_mut() {
                Some(last) if last.len() + segment.len() <= self.segment_size => {
                    last.extend(segment)
                }
                _ => compacted.push(segment),
            }
        }
        self.segments = compacted;
        self.bounds = self.segments.iter().map(|s| s[0].sort_key()).collect();
        self.offsets = vec![0];
        self.reindex_from(0);
    }

    fn find(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        let key = item.sort_key();
        let start = self.lower_bound(key);
        self.iter_from(start)
            .take_while(|x| x.sort_key() == key)
            .position(|x| x == item)
            .map(|n| start + n)
    }
}

impl<T> SegmentedList<T> {
    pub fn with_segment_size(segment_size: usize) -> Self {
        Self {
            segments: Vec::new(),
            bounds: Vec::new(),
            offsets: vec![0],
            segment_size: segment_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.offsets[self.segments.len()]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// # Panics
    /// * If `index >= len()`
    pub fn get(&self, index: usize) -> &T {
        let (segment, offset) = self.position(index);
        &self.segments[segment][offset]
    }

    /// # Panics
    /// * If `location` does not point at an element
    pub fn get_at(&self, location: Location) -> &T {
        let (segment, offset) = self.resolve(location);
        &self.segments[segment][offset]
    }

    /// Remove and return the element at `location`
    ///
    /// # Panics
    /// * If `location` does not point at an element
    pub fn remove_at(&mut self, location: Location) -> T {
        let (segment, offset) = self.resolve(location);
        let item = self.segments[segment].remove(offset);
        self.reindex_from(segment);
        item
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.segments.iter().flatten()
    }

    /// Iterate over all elements, starting at global index `index`
    pub fn iter_from(&self, index: usize) -> impl Iterator<Item = &T> {
        let (segment, offset) = if index < self.len() {
            self.position(index)
        } else {
            (self.segments.len(), 0)
        };
        let head = self
            .segments
            .get(segment)
            .map(|s| &s[offset..])
            .unwrap_or(&[]);
        let tail = self.segments.get(segment + 1..).unwrap_or(&[]);
        head.iter().chain(tail.iter().flatten())
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Map a global index onto (segment, offset)
    fn position(&self, index: usize) -> (usize, usize) {
        assert!(
            index < self.len(),
            "index {} out of bounds for SegmentedList of length {}",
            index,
            self.len()
        );
        // Empty segments share their offset with the next segment, so take the
        // last segment starting at or before `index`
        let segment = self.offsets.partition_point(|&o| o <= index) - 1;
        (segment, index - self.offsets[segment])
    }

    fn resolve(&self, location: Location) -> (usize, usize) {
        let (segment, offset) = match location {
            Location::Boundary(segment) => (segment, 0),
            Location::Within { segment, offset } => (segment, offset),
        };
        assert!(
            segment < self.segments.len() && offset < self.segments[segment].len(),
            "invalid location {:?} for SegmentedList with {} segments",
            location,
            self.segments.len()
        );
        (segment, offset)
    }

    fn reindex_from(&mut self, segment: usize) {
        let mut acc = self.offsets[segment];
        self.offsets.truncate(segment + 1);
        for seg in &self.segments[segment..] {
            acc += seg.len();
            self.offsets.push(acc);
        }
    }
}

impl<T> Index<usize> for SegmentedList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index)
    }
}

impl<T: SortKey> Extend<T> for SegmentedList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<T: SortKey> FromIterator<T> for SegmentedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[derive(Copy, Clone, Debug, PartialEq)]
    struct Tagged {
        key: f64,
        tag: usize,
    }

    impl SortKey for Tagged {
        fn sort_key(&self) -> f64 {
            self.key
        }
    }

    fn small(keys: &[u16]) -> SegmentedList<f64> {
        let mut list = SegmentedList::with_segment_size(4);
        for &k in keys {
            list.insert(k as f64 / 8.0);
        }
        list
    }

    fn sorted(list: &SegmentedList<f64>) -> bool {
        (1..list.len()).all(|i| list.get(i - 1) <= list.get(i))
    }

    #[quickcheck]
    fn inserts_keep_order(keys: Vec<u16>) -> bool {
        let list = small(&keys);
        list.len() == keys.len() && sorted(&list)
    }

    #[quickcheck]
    fn lower_bound_matches_linear_scan(keys: Vec<u16>, query: u16) -> bool {
        let list = small(&keys);
        let query = query as f64 / 8.0;
        let expected = list.iter().take_while(|&&x| x < query).count();
        list.lower_bound(query) == expected
    }

    #[quickcheck]
    fn finalize_is_idempotent(keys: Vec<u16>, remove: Vec<u16>) -> bool {
        let mut list = small(&keys);
        for k in remove {
            list.remove(&(k as f64 / 8.0));
        }
        list.finalize();
        let once = list.to_vec();
        let segments = list.segment_count();
        list.finalize();
        once == list.to_vec() && segments == list.segment_count() && sorted(&list)
    }

    #[quickcheck]
    fn lower_bound_after_removals(keys: Vec<u16>, remove: Vec<u16>, query: u16) -> bool {
        let mut list = small(&keys);
        for k in remove {
            list.remove(&(k as f64 / 8.0));
        }
        let query = query as f64 / 8.0;
        let expected = list.iter().take_while(|&&x| x < query).count();
        // Searches are valid before compaction ...
        let before = list.lower_bound(query) == expected;
        list.finalize();
        // ... and after
        before && list.lower_bound(query) == expected
    }

    #[test]
    fn segments_split_and_merge() {
        let mut list = SegmentedList::with_segment_size(4);
        list.extend((0..40).map(|x| x as f64));
        assert_eq!(list.len(), 40);
        assert!(list.segment_count() > 1);
        assert!(sorted(&list));

        list.retain(|&x| x < 3.0);
        assert_eq!(list.len(), 3);
        list.finalize();
        assert_eq!(list.segment_count(), 1);
        assert_eq!(list.to_vec(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn out_of_order_inserts() {
        let mut list = SegmentedList::with_segment_size(2);
        for x in [5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 8.0, 0.5, 4.0] {
            list.insert(x);
        }
        assert_eq!(
            list.to_vec(),
            vec![0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 8.0, 9.0]
        );
        assert_eq!(list[0], 0.5);
        assert_eq!(list.lower_bound(6.0), 6);
        assert_eq!(list.lower_bound(100.0), 9);
        assert_eq!(list.lower_bound(-1.0), 0);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut list = SegmentedList::with_segment_size(2);
        for tag in 0..10 {
            list.insert(Tagged { key: 1.0, tag });
        }
        list.insert(Tagged { key: 0.0, tag: 10 });
        let tags = list.iter().map(|t| t.tag).collect::<Vec<_>>();
        assert_eq!(tags, vec![10, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(list.lower_bound(1.0), 1);
    }

    #[test]
    fn contains_and_remove() {
        let mut list = (0..20).map(|x| x as f64 * 0.5).collect::<SegmentedList<_>>();
        assert!(list.contains(&3.5));
        assert!(!list.contains(&3.25));
        assert!(list.remove(&3.5));
        assert!(!list.remove(&3.5));
        assert!(!list.contains(&3.5));
        assert_eq!(list.len(), 19);
        list.finalize();
        assert_eq!(list.lower_bound(3.5), 7);
    }

    #[test]
    fn locate_boundary_and_within() {
        let list = SegmentedList::from_sorted((0..300).map(|x| x as f64).collect());
        assert_eq!(list.segment_count(), 3);
        assert_eq!(list.locate(128.0), Some(Location::Boundary(1)));
        assert_eq!(
            list.locate(130.0),
            Some(Location::Within {
                segment: 1,
                offset: 2
            })
        );
        assert_eq!(list.locate(130.5), None);
        assert_eq!(*list.get_at(Location::Boundary(2)), 256.0);
    }

    #[test]
    fn remove_at_location() {
        let mut list = SegmentedList::from_sorted((0..300).map(|x| x as f64).collect());
        let loc = list.locate(128.0).unwrap();
        assert_eq!(list.remove_at(loc), 128.0);
        assert_eq!(list.len(), 299);
        assert_eq!(list.lower_bound(128.0), 128);
        assert_eq!(*list.get(128), 129.0);
    }

    #[test]
    fn range_query() {
        let list = SegmentedList::from_sorted((0..1000).map(|x| x as f64 / 10.0).collect());
        let hits = list.range(12.05, 12.4).copied().collect::<Vec<_>>();
        assert_eq!(hits, vec![12.1, 12.2, 12.3, 12.4]);
        assert_eq!(list.range(200.0, 300.0).count(), 0);
    }

    #[test]
    #[should_panic]
    fn get_out_of_bounds() {
        let list = SegmentedList::from_sorted(vec![1.0, 2.0]);
        list.get(2);
    }

    #[test]
    #[should_panic]
    fn invalid_location() {
        let list = SegmentedList::from_sorted(vec![1.0, 2.0]);
        list.get_at(Location::Within {
            segment: 0,
            offset: 5,
        });
    }
}
