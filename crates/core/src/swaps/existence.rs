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

//! Thread-safe scoreboard of per-swap edge-existence votes.
//!
//! A batch announces during planning how many existence assertions each swap
//! will receive (`add_possible`), then worker threads deliver the assertions
//! (`push_exists` / `push_missing`) in any order. A consumer blocks in
//! `wait_for_missing` until every announced vote for its swap has arrived and
//! then answers point queries with `exists`.
//!
//! Recorded edges live in one contiguous slab; `finish_initialization`
//! computes each swap's slab offset from the announced counts. Within a batch
//! the missing counter of a swap only ever decreases to zero.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::graph::Edge;

#[derive(Default)]
struct SwapVotes {
    missing: AtomicU32,
    existing: AtomicU32,
}

pub struct ExistenceInfo {
    votes: Vec<SwapVotes>,
    starts: Vec<usize>,
    slab: Vec<AtomicU64>,
}

fn encode(edge: Edge) -> u64 {
    ((edge.u as u32 as u64) << 32) | edge.v as u32 as u64
}

impl ExistenceInfo {
    pub fn new(num_swaps: usize) -> Self {
        let mut votes = Vec::with_capacity(num_swaps);
        votes.resize_with(num_swaps, SwapVotes::default);

        Self {
            votes,
            starts: vec![0; num_swaps],
            slab: Vec::new(),
        }
    }

    pub fn num_swaps(&self) -> usize {
        self.votes.len()
    }

    pub fn start_initialization(&mut self) {
        for vote in &self.votes {
            vote.missing.store(0, Ordering::Relaxed);
            vote.existing.store(0, Ordering::Relaxed);
        }
    }

    /// Announce `num_edges` upcoming assertions for `swap_id`.
    pub fn add_possible(&self, swap_id: usize, num_edges: u32) {
        self.votes[swap_id]
            .missing
            .fetch_add(num_edges, Ordering::Relaxed);
    }

    /// Compute slab offsets from the announced counts.
    pub fn finish_initialization(&mut self) {
        let mut sum = 0usize;

        for (vote, start) in self.votes.iter().zip(self.starts.iter_mut()) {
            *start = sum;
            sum += vote.missing.load(Ordering::Relaxed) as usize;
        }

        self.slab.clear();
        self.slab.resize_with(sum, || AtomicU64::new(0));
    }

    /// Assert that `edge` exists at the evaluation moment of `swap_id`.
    pub fn push_exists(&self, swap_id: usize, edge: Edge) {
        let vote = &self.votes[swap_id];
        let i = vote.existing.fetch_add(1, Ordering::Relaxed) as usize;

        let slot = self.starts[swap_id] + i;
        debug_assert!(
            swap_id + 1 == self.starts.len() || slot < self.starts[swap_id + 1],
            "more existence entries than announced for swap {swap_id}"
        );

        self.slab[slot].store(encode(edge), Ordering::Release);
        vote.missing.fetch_sub(1, Ordering::SeqCst);
    }

    /// Assert that one queried edge does not exist.
    pub fn push_missing(&self, swap_id: usize) {
        self.votes[swap_id].missing.fetch_sub(1, Ordering::SeqCst);
    }

    /// Spin until every announced assertion for `swap_id` has arrived.
    pub fn wait_for_missing(&self, swap_id: usize) {
        while self.votes[swap_id].missing.load(Ordering::SeqCst) > 0 {
            std::thread::yield_now();
        }
    }

    /// Whether `edge` was asserted to exist for `swap_id`. Only valid once
    /// all votes arrived.
    pub fn exists(&self, swap_id: usize, edge: Edge) -> bool {
        debug_assert_eq!(self.votes[swap_id].missing.load(Ordering::SeqCst), 0);

        let start = self.starts[swap_id];
        let end = start + self.votes[swap_id].existing.load(Ordering::Relaxed) as usize;
        let needle = encode(edge);

        self.slab[start..end]
            .iter()
            .any(|slot| slot.load(Ordering::Acquire) == needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_threaded_protocol() {
        let mut info = ExistenceInfo::new(3);

        info.start_initialization();
        info.add_possible(0, 2);
        info.add_possible(1, 1);
        info.add_possible(2, 2);
        info.finish_initialization();

        info.push_exists(0, Edge::new(0, 1));
        info.push_missing(0);
        info.push_missing(1);
        info.push_exists(2, Edge::new(2, 3));
        info.push_exists(2, Edge::new(4, 5));

        for swap_id in 0..3 {
            info.wait_for_missing(swap_id);
        }

        assert!(info.exists(0, Edge::new(0, 1)));
        assert!(!info.exists(0, Edge::new(2, 3)));
        assert!(!info.exists(1, Edge::new(0, 1)));
        assert!(info.exists(2, Edge::new(2, 3)));
        assert!(info.exists(2, Edge::new(4, 5)));
    }

    #[test]
    fn reinitialization_resets_counts() {
        let mut info = ExistenceInfo::new(1);

        info.start_initialization();
        info.add_possible(0, 1);
        info.finish_initialization();
        info.push_exists(0, Edge::new(0, 1));
        info.wait_for_missing(0);

        info.start_initialization();
        info.add_possible(0, 1);
        info.finish_initialization();
        info.push_missing(0);
        info.wait_for_missing(0);

        assert!(!info.exists(0, Edge::new(0, 1)));
    }

    #[test]
    fn concurrent_votes() {
        let mut info = ExistenceInfo::new(64);

        info.start_initialization();
        for swap_id in 0..64 {
            info.add_possible(swap_id, 4);
        }
        info.finish_initialization();

        std::thread::scope(|scope| {
            for tid in 0..4 {
                let info = &info;

                scope.spawn(move || {
                    for swap_id in 0..64 {
                        if (swap_id + tid) % 2 == 0 {
                            info.push_exists(swap_id, Edge::new(tid as i32, swap_id as i32));
                        } else {
                            info.push_missing(swap_id);
                        }
                    }
                });
            }

            let info = &info;
            scope.spawn(move || {
                for swap_id in 0..64 {
                    info.wait_for_missing(swap_id);

                    for tid in 0..4i32 {
                        let expected = (swap_id + tid as usize) % 2 == 0;
                        assert_eq!(
                            info.exists(swap_id, Edge::new(tid, swap_id as i32)),
                            expected
                        );
                    }
                }
            });
        });
    }
}
