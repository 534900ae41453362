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

//! Monotone merge of a priority queue and a sorted stream.
//!
//! When a large part of a queue's content is known ahead of the read phase,
//! it is cheaper to sort it once and only route the records produced *during*
//! the read phase through a priority queue. The merger presents both as one
//! ascending stream and accepts new records at any time.
//!
//! The head of the sorted stream is pulled eagerly and parked in the merger,
//! so the front of the merged stream can be inspected without touching
//! either source.

use crate::external_pq::ExternalPq;
use crate::external_sort::SortedIterator;
use crate::Result;

pub struct PqSorterMerger<T> {
    pq: ExternalPq<T>,
    sorted: SortedIterator<T>,
    sorted_head: Option<T>,
}

impl<T> PqSorterMerger<T>
where
    T: bincode::Encode + bincode::Decode<()> + Ord,
{
    pub fn new(pq: ExternalPq<T>, mut sorted: SortedIterator<T>) -> Self {
        let sorted_head = sorted.next();

        Self {
            pq,
            sorted,
            sorted_head,
        }
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        self.pq.push(item)
    }

    pub fn is_empty(&self) -> bool {
        self.pq.is_empty() && self.sorted_head.is_none()
    }

    pub fn peek(&self) -> Option<&T> {
        match (self.pq.peek(), self.sorted_head.as_ref()) {
            (Some(a), Some(b)) => Some(if a <= b { a } else { b }),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        let from_pq = match (self.pq.peek(), self.sorted_head.as_ref()) {
            (Some(a), Some(b)) => a <= b,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        if from_pq {
            self.pq.pop()
        } else {
            let item = self.sorted_head.take();
            self.sorted_head = self.sorted.next();
            item
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external_sort::ExternalSorter;

    #[test]
    fn merges_monotonically_with_late_pushes() {
        let sorted = ExternalSorter::new()
            .sort(vec![1u64, 4, 7, 10])
            .unwrap();

        let mut merger = PqSorterMerger::new(ExternalPq::new(16).unwrap(), sorted);

        merger.push(2).unwrap();
        merger.push(9).unwrap();

        assert_eq!(merger.pop(), Some(1));
        assert_eq!(merger.pop(), Some(2));
        assert_eq!(merger.peek(), Some(&4));
        assert_eq!(merger.pop(), Some(4));

        // records may arrive while draining, as long as they are not
        // smaller than what was already consumed
        merger.push(5).unwrap();

        assert_eq!(merger.pop(), Some(5));
        assert_eq!(merger.pop(), Some(7));
        assert_eq!(merger.pop(), Some(9));
        assert_eq!(merger.pop(), Some(10));
        assert!(merger.is_empty());
    }
}
