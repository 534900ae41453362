// Rewire generates and randomizes massive graphs in external memory.
// Copyright (C) 2024 Rewire
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>

//! Min-priority queue with a bounded RAM footprint.
//!
//! Records are kept in an in-RAM binary heap until the heap reaches its
//! capacity; the heap is then drained into a sorted run file. The queue front
//! is the minimum over the RAM heap and the heads of all spilled runs, so
//! `pop` stays cheap no matter how much has been spilled.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use file_store::iterable::{IterableStoreReader, IterableStoreWriter};
use file_store::temp::{TempDir, TempFile};

use crate::Result;

pub struct ExternalPq<T> {
    dir: TempDir,
    heap: BinaryHeap<Reverse<T>>,
    capacity: usize,
    segments: BinaryHeap<Reverse<SegmentHead<T>>>,
    files: Vec<TempFile>,
    len: u64,
}

impl<T> ExternalPq<T>
where
    T: bincode::Encode + bincode::Decode<()> + Ord,
{
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
            heap: BinaryHeap::new(),
            capacity: capacity.max(1),
            segments: BinaryHeap::new(),
            files: Vec::new(),
            len: 0,
        })
    }

    /// Derive the heap capacity from a RAM budget in bytes.
    pub fn with_ram_budget(bytes: usize) -> Result<Self> {
        let record = std::mem::size_of::<T>().max(1);
        Self::new(bytes / record)
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        self.heap.push(Reverse(item));
        self.len += 1;

        if self.heap.len() >= self.capacity {
            self.spill()?;
        }

        Ok(())
    }

    pub fn peek(&self) -> Option<&T> {
        let ram = self.heap.peek().map(|r| &r.0);
        let spilled = self.segments.peek().map(|r| &r.0.item);

        match (ram, spilled) {
            (Some(a), Some(b)) => Some(if a <= b { a } else { b }),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        let from_ram = match (self.heap.peek(), self.segments.peek()) {
            (Some(a), Some(b)) => a.0 <= b.0.item,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        self.len -= 1;

        if from_ram {
            return Some(self.heap.pop().unwrap().0);
        }

        let mut head = self.segments.pop().unwrap().0;
        let item = head.item;

        if let Some(next) = head.rest.next() {
            head.item = next;
            self.segments.push(Reverse(head));
        }

        Some(item)
    }

    fn spill(&mut self) -> Result<()> {
        let mut run: Vec<T> = std::mem::take(&mut self.heap)
            .into_iter()
            .map(|r| r.0)
            .collect();
        run.sort_unstable();

        let mut file = TempFile::new(&self.dir)?;
        let mut writer = IterableStoreWriter::new(file.inner_mut());

        for item in &run {
            writer.write(item)?;
        }
        writer.finalize()?;

        let mut reader = IterableStoreReader::open(file.path())?;
        self.files.push(file);

        if let Some(item) = reader.next() {
            self.segments.push(Reverse(SegmentHead { item, rest: reader }));
        }

        Ok(())
    }
}

struct SegmentHead<T> {
    item: T,
    rest: IterableStoreReader<T>,
}

impl<T: Ord> Ord for SegmentHead<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.item.cmp(&other.item)
    }
}

impl<T: Ord> PartialOrd for SegmentHead<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Eq> Eq for SegmentHead<T> {}

impl<T: PartialEq> PartialEq for SegmentHead<T> {
    fn eq(&self, other: &Self) -> bool {
        self.item.eq(&other.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn drains_in_order_across_spills() {
        let mut items: Vec<u64> = (0..10_000).collect();
        items.shuffle(&mut rand::thread_rng());

        let mut pq = ExternalPq::new(64).unwrap();
        for item in items {
            pq.push(item).unwrap();
        }

        assert_eq!(pq.len(), 10_000);

        for expected in 0..10_000 {
            assert_eq!(pq.peek(), Some(&expected));
            assert_eq!(pq.pop(), Some(expected));
        }

        assert!(pq.is_empty());
        assert_eq!(pq.pop(), None);
    }

    #[test]
    fn interleaved_push_pop() {
        let mut pq = ExternalPq::new(4).unwrap();

        for i in [5u64, 1, 9, 3] {
            pq.push(i).unwrap();
        }

        assert_eq!(pq.pop(), Some(1));

        pq.push(0).unwrap();
        pq.push(7).unwrap();

        assert_eq!(pq.pop(), Some(0));
        assert_eq!(pq.pop(), Some(3));
        assert_eq!(pq.pop(), Some(5));
        assert_eq!(pq.pop(), Some(7));
        assert_eq!(pq.pop(), Some(9));
        assert_eq!(pq.pop(), None);
    }
}
