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

//! External merge sort over sequences that do not fit in RAM.
//!
//! Records are collected into chunks of a bounded size, each chunk is sorted
//! in RAM and spilled to its own run file, and the sorted output is the k-way
//! merge of all run files. The RAM budget is controlled by the chunk size.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use file_store::iterable::{IterableStoreReader, IterableStoreWriter};
use file_store::temp::{TempDir, TempFile};

use crate::Result;

pub struct ExternalSorter<T> {
    chunk_size: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Default for ExternalSorter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ExternalSorter<T> {
    pub fn new() -> Self {
        Self {
            chunk_size: crate::SORTER_CHUNK,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Derive the chunk size from a RAM budget in bytes.
    pub fn with_ram_budget(self, bytes: usize) -> Self {
        let record = std::mem::size_of::<T>().max(1);
        self.with_chunk_size(bytes / record)
    }
}

impl<T> ExternalSorter<T>
where
    T: bincode::Encode + bincode::Decode<()> + Ord,
{
    pub fn sort<I>(self, iter: I) -> Result<SortedIterator<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let mut pusher = self.pusher()?;

        for item in iter {
            pusher.push(item)?;
        }

        pusher.sort()
    }

    /// Push-mode front end: records trickle in, `sort()` flips to reading.
    pub fn pusher(self) -> Result<PushSorter<T>> {
        Ok(PushSorter {
            dir: TempDir::new()?,
            chunk_size: self.chunk_size,
            chunk: Vec::new(),
            runs: Vec::new(),
            num_items: 0,
        })
    }
}

pub struct PushSorter<T> {
    dir: TempDir,
    chunk_size: usize,
    chunk: Vec<T>,
    runs: Vec<TempFile>,
    num_items: u64,
}

impl<T> PushSorter<T>
where
    T: bincode::Encode + bincode::Decode<()> + Ord,
{
    pub fn push(&mut self, item: T) -> Result<()> {
        self.chunk.push(item);
        self.num_items += 1;

        if self.chunk.len() >= self.chunk_size {
            self.spill()?;
        }

        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    pub fn sort(mut self) -> Result<SortedIterator<T>> {
        if !self.chunk.is_empty() {
            self.spill()?;
        }

        let mut heads = BinaryHeap::new();
        let mut files = Vec::new();

        for file in self.runs {
            let reader = IterableStoreReader::open(file.path())?;
            files.push(file);

            if let Some(head) = Head::new(reader) {
                heads.push(Reverse(head));
            }
        }

        Ok(SortedIterator {
            _dir: self.dir,
            _files: files,
            heads,
            remaining: self.num_items,
        })
    }

    fn spill(&mut self) -> Result<()> {
        self.chunk.sort_unstable();

        let mut file = TempFile::new(&self.dir)?;
        let mut writer = IterableStoreWriter::new(file.inner_mut());

        for item in self.chunk.drain(..) {
            writer.write(&item)?;
        }

        writer.finalize()?;
        self.runs.push(file);

        Ok(())
    }
}

struct Head<T> {
    item: T,
    rest: IterableStoreReader<T>,
}

impl<T> Head<T>
where
    T: bincode::Decode<()>,
{
    fn new(mut reader: IterableStoreReader<T>) -> Option<Self> {
        let item = reader.next()?;

        Some(Self { item, rest: reader })
    }
}

impl<T> Ord for Head<T>
where
    T: Ord,
{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.item.cmp(&other.item)
    }
}

impl<T> PartialOrd for Head<T>
where
    T: Ord,
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Eq for Head<T> where T: Eq {}

impl<T> PartialEq for Head<T>
where
    T: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.item.eq(&other.item)
    }
}

pub struct SortedIterator<T> {
    // the temp dir and run files must outlive every read
    _dir: TempDir,
    _files: Vec<TempFile>,
    heads: BinaryHeap<Reverse<Head<T>>>,
    remaining: u64,
}

impl<T> SortedIterator<T> {
    /// Records not yet pulled from the merge.
    pub fn len(&self) -> u64 {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }
}

impl<T> Iterator for SortedIterator<T>
where
    T: bincode::Decode<()> + Ord,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let mut head = self.heads.pop()?.0;

        if let Some(next) = head.rest.next() {
            self.heads.push(Reverse(Head {
                item: next,
                rest: head.rest,
            }));
        }

        self.remaining -= 1;

        Some(head.item)
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    #[test]
    fn matches_in_memory_sort() {
        let mut rng = rand::thread_rng();

        let mut expected = Vec::new();
        let mut data = Vec::new();

        for _ in 0..100_000 {
            let item: u64 = rng.gen_range(0..100_000);

            expected.push(item);
            data.push(item);
        }

        expected.sort_unstable();

        let sorted = ExternalSorter::new()
            .with_chunk_size(10_000)
            .sort(data)
            .unwrap()
            .collect::<Vec<_>>();

        assert_eq!(sorted, expected);
    }

    #[test]
    fn push_mode() {
        let mut pusher = ExternalSorter::new().with_chunk_size(16).pusher().unwrap();

        for i in (0u64..1000).rev() {
            pusher.push(i).unwrap();
        }

        assert_eq!(pusher.len(), 1000);

        let mut sorted = pusher.sort().unwrap();
        assert_eq!(sorted.len(), 1000);
        assert_eq!(sorted.next(), Some(0));
        assert!(sorted.eq(1..1000));
    }

    #[test]
    fn empty_input() {
        let sorted = ExternalSorter::<u64>::new().sort(Vec::new()).unwrap();
        assert_eq!(sorted.count(), 0);
    }
}
