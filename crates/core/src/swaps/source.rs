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

//! Swap generators. Both take an explicit seeded PRNG so a batch can be
//! replayed exactly; callers log the seed they used.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::graph::Edge;
use crate::swaps::Swap;

/// Infinite sequence of uniform random swaps over `num_edges` edge ids.
pub struct RandomSwaps {
    rng: StdRng,
    num_edges: u64,
}

impl RandomSwaps {
    pub fn new(seed: u64, num_edges: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            num_edges,
        }
    }
}

impl Iterator for RandomSwaps {
    type Item = Swap;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_edges < 2 {
            return None;
        }

        let e1 = self.rng.gen_range(0..self.num_edges);
        let e2 = loop {
            let e2 = self.rng.gen_range(0..self.num_edges);
            if e2 != e1 {
                break e2;
            }
        };

        Some(Swap::both(e1, e2, self.rng.gen_bool(0.5)))
    }
}

/// Swaps that break up loops and parallel edges of a sorted edge sequence.
///
/// Every loop, and every occurrence of an edge after its first, is paired
/// with a uniformly random partner edge. Run the produced swaps and repeat
/// until the vector is simple.
pub struct RepairSwaps<I> {
    edges: I,
    rng: StdRng,
    num_edges: u64,
    prev: Option<Edge>,
    next_id: u64,
}

impl<I> RepairSwaps<I>
where
    I: Iterator<Item = Edge>,
{
    pub fn new(seed: u64, num_edges: u64, edges: I) -> Self {
        Self {
            edges,
            rng: StdRng::seed_from_u64(seed),
            num_edges,
            prev: None,
            next_id: 0,
        }
    }
}

impl<I> Iterator for RepairSwaps<I>
where
    I: Iterator<Item = Edge>,
{
    type Item = Swap;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_edges < 2 {
            return None;
        }

        loop {
            let edge = self.edges.next()?;
            let id = self.next_id;
            self.next_id += 1;

            let needs_swap = edge.is_loop() || self.prev == Some(edge);
            self.prev = Some(edge);

            if !needs_swap {
                continue;
            }

            let partner = loop {
                let partner = self.rng.gen_range(0..self.num_edges);
                if partner != id {
                    break partner;
                }
            };

            return Some(Swap::both(id, partner, self.rng.gen_bool(0.5)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_swaps_are_deterministic_per_seed() {
        let a: Vec<Swap> = RandomSwaps::new(42, 100).take(50).collect();
        let b: Vec<Swap> = RandomSwaps::new(42, 100).take(50).collect();
        let c: Vec<Swap> = RandomSwaps::new(43, 100).take(50).collect();

        assert_eq!(a, b);
        assert_ne!(a, c);

        for swap in a {
            let Swap::Both { e1, e2, .. } = swap else {
                panic!("random swaps reference edges by id");
            };
            assert!(e1 < e2);
            assert!(e2 < 100);
        }
    }

    #[test]
    fn too_few_edges() {
        assert_eq!(RandomSwaps::new(0, 1).next(), None);
    }

    #[test]
    fn repair_targets_loops_and_duplicates() {
        let edges = vec![
            Edge::new(0, 1),
            Edge::new(1, 2),
            Edge::new(1, 2),
            Edge::new(3, 3),
            Edge::new(4, 5),
        ];

        let swaps: Vec<Swap> = RepairSwaps::new(7, 5, edges.into_iter()).collect();

        // one for the duplicate (id 2) and one for the loop (id 3)
        assert_eq!(swaps.len(), 2);

        let ids: Vec<(u64, u64)> = swaps
            .iter()
            .map(|s| match s {
                Swap::Both { e1, e2, .. } => (*e1, *e2),
                Swap::FirstByValue { .. } => unreachable!(),
            })
            .collect();

        assert!(ids[0].0 == 2 || ids[0].1 == 2);
        assert!(ids[1].0 == 3 || ids[1].1 == 3);
    }

    #[test]
    fn leading_loop_is_repaired() {
        let edges = vec![Edge::new(0, 0), Edge::new(1, 2), Edge::new(3, 4)];

        let swaps: Vec<Swap> = RepairSwaps::new(3, 3, edges.into_iter()).collect();

        assert_eq!(swaps.len(), 1);
    }
}
