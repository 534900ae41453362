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

//! Batch edge-swap engine that keeps the batch state in RAM.
//!
//! A batch runs in three phases:
//!
//! 1. *Simulate.* Swaps are walked in order while tracking, per edge slot,
//!    the set of edges the slot might hold after all earlier swaps of the
//!    batch. Every possible source edge and every possible (non-loop) target
//!    pair becomes an existence query.
//! 2. *Load.* The queries, sorted by edge, are merged with the sorted edge
//!    vector. The earliest querying swap of each edge receives an existence
//!    answer; later consumers are chained behind it with successor records.
//! 3. *Perform.* Swaps are decided in order: a swap is performed iff no
//!    target is a loop and neither target currently exists. Decisions update
//!    the per-slot edges and forward updated existence counts along the
//!    successor chain.
//!
//! The batch commits by merge-rewriting the edge vector, so the vector is
//! sorted again at every batch boundary.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use file_store::bit_stream::BitStream;
use file_store::temp::TempDir;
use itertools::Itertools;

use crate::external_sort::ExternalSorter;
use crate::graph::{swap_edges, update_merger, Edge, EdgeId, EdgeVec};
use crate::swaps::messages::{
    scan_existence, ExistenceAnswer, ExistenceRequest, ExistenceSuccessor,
};
use crate::swaps::{ResultLog, Swap, SwapResult, INVALID_EDGE_ID};
use crate::{Error, Result};

/// A swap after the load boundary: slot indices into the batch's local edge
/// arena, or a placeholder for swaps that are recorded but never evaluated.
enum ResolvedSwap {
    Active { slots: [usize; 2], dir: bool },
    Skipped,
}

pub struct InternalEdgeSwaps {
    batch_size: usize,
    sorter_chunk: usize,
    pending: Vec<Swap>,
    log: Option<ResultLog>,
}

impl Default for InternalEdgeSwaps {
    fn default() -> Self {
        Self::new()
    }
}

impl InternalEdgeSwaps {
    pub fn new() -> Self {
        Self {
            batch_size: 1 << 20,
            sorter_chunk: crate::SORTER_CHUNK,
            pending: Vec::new(),
            log: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_sorter_chunk(mut self, chunk: usize) -> Self {
        self.sorter_chunk = chunk.max(1);
        self
    }

    /// Record every swap outcome; retrieve them with [`Self::results`].
    pub fn with_result_log(mut self) -> Self {
        self.log = Some(ResultLog::new());
        self
    }

    pub fn results(&self) -> Option<&ResultLog> {
        self.log.as_ref()
    }

    pub fn push(&mut self, swap: Swap) {
        self.pending.push(swap);
    }

    /// Process all pushed swaps against `edges` in submission order.
    pub fn run(&mut self, edges: &mut EdgeVec) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);

        for batch in pending.chunks(self.batch_size) {
            self.process_batch(edges, batch)?;
        }

        Ok(())
    }

    fn process_batch(&mut self, edges: &mut EdgeVec, swaps: &[Swap]) -> Result<()> {
        if swaps.is_empty() {
            return Ok(());
        }

        let (resolved, eids, mut local_edges) = load_batch(edges, swaps);
        let original_edges = local_edges.clone();

        let successors = successor_flags(&resolved, local_edges.len());

        let queries = simulate(&resolved, &local_edges, &successors, self.sorter_chunk)?;
        tracing::debug!(queries = queries.len(), "generated existence queries");

        let (answers, chain) = load_existence(edges, queries)?;
        tracing::debug!(
            answers = answers.len(),
            forwards = chain.len(),
            "loaded existence information"
        );

        perform(
            &resolved,
            &mut local_edges,
            answers,
            &chain,
            self.log.as_mut(),
        )?;

        commit(edges, &eids, &original_edges, &local_edges, self.sorter_chunk)
    }
}

/// Resolve swaps to ids, compact the referenced ids into a local arena and
/// load their current edges.
fn load_batch(edges: &EdgeVec, swaps: &[Swap]) -> (Vec<ResolvedSwap>, Vec<EdgeId>, Vec<Edge>) {
    let num_edges = edges.len();

    let mut pairs: Vec<(EdgeId, EdgeId, bool)> = Vec::with_capacity(swaps.len());
    let mut resolved_kinds: Vec<Option<Option<(EdgeId, EdgeId, bool)>>> = Vec::new();

    for swap in swaps {
        let (ids, by_value) = match *swap {
            Swap::Both { e1, e2, dir } => (Some((e1, e2, dir)), false),
            Swap::FirstByValue { edge, e2, dir } => {
                (edges.find(edge).map(|e1| (e1, e2, dir)), true)
            }
        };

        match ids {
            // by-value edges that resolve to nothing are dropped silently
            None => resolved_kinds.push(None),
            // ...as are by-value edges that resolve onto their own partner
            Some((e1, e2, _)) if by_value && e1 == e2 => resolved_kinds.push(None),
            Some((e1, e2, dir)) => {
                let degenerate = e1 == e2
                    || e1 == INVALID_EDGE_ID
                    || e2 == INVALID_EDGE_ID
                    || e1 >= num_edges
                    || e2 >= num_edges;

                if degenerate {
                    resolved_kinds.push(Some(None));
                } else {
                    resolved_kinds.push(Some(Some((e1, e2, dir))));
                    pairs.push((e1, e2, dir));
                }
            }
        }
    }

    let mut eids: Vec<EdgeId> = pairs.iter().flat_map(|&(a, b, _)| [a, b]).collect();
    eids.sort_unstable();
    eids.dedup();

    let local_edges: Vec<Edge> = eids
        .iter()
        .map(|&id| edges.get(id).expect("id was range-checked"))
        .collect();

    let slot_of = |id: EdgeId| eids.binary_search(&id).expect("id was collected");

    let resolved = resolved_kinds
        .into_iter()
        .flatten()
        .map(|ids| match ids {
            None => ResolvedSwap::Skipped,
            Some((e1, e2, dir)) => ResolvedSwap::Active {
                slots: [slot_of(e1), slot_of(e2)],
                dir,
            },
        })
        .collect();

    (resolved, eids, local_edges)
}

/// For each swap side, whether a later swap of the batch uses the same slot.
fn successor_flags(resolved: &[ResolvedSwap], num_slots: usize) -> [Vec<bool>; 2] {
    let mut flags = [vec![false; resolved.len()], vec![false; resolved.len()]];
    let mut last_use: Vec<Option<(u64, usize)>> = vec![None; num_slots];

    for (sid, swap) in resolved.iter().enumerate() {
        let ResolvedSwap::Active { slots, .. } = swap else {
            continue;
        };

        for (pos, &slot) in slots.iter().enumerate() {
            if let Some((prev_sid, prev_pos)) = last_use[slot] {
                flags[prev_pos][prev_sid as usize] = true;
            }
            last_use[slot] = Some((sid as u64, pos));
        }
    }

    flags
}

/// Phase 1: walk swaps in order, tracking per-slot possible-edge sets, and
/// emit every existence query.
fn simulate(
    resolved: &[ResolvedSwap],
    local_edges: &[Edge],
    successors: &[Vec<bool>; 2],
    sorter_chunk: usize,
) -> Result<crate::external_sort::SortedIterator<ExistenceRequest>> {
    let mut queries = ExternalSorter::new()
        .with_chunk_size(sorter_chunk)
        .pusher()?;

    let mut possible: Vec<Vec<Edge>> = vec![Vec::new(); local_edges.len()];

    for (sid, swap) in resolved.iter().enumerate() {
        let ResolvedSwap::Active { slots, dir } = swap else {
            continue;
        };
        let sid = sid as u64;

        let mut current: [Vec<Edge>; 2] = [Vec::new(), Vec::new()];
        let mut new_edges: [Vec<Edge>; 2] = [Vec::new(), Vec::new()];

        for (pos, &slot) in slots.iter().enumerate() {
            current[pos] = std::mem::take(&mut possible[slot]);
            current[pos].push(local_edges[slot]);

            for &edge in &current[pos] {
                queries.push(ExistenceRequest {
                    edge,
                    sid,
                    is_source: true,
                })?;
            }
        }

        for &e0 in &current[0] {
            for &e1 in &current[1] {
                let (t0, t1) = swap_edges(e0, e1, *dir);

                // trivial conflicts are not queried
                if !t0.is_loop() && !t1.is_loop() {
                    new_edges[0].push(t0);
                    new_edges[1].push(t1);
                }
            }
        }

        for (pos, &slot) in slots.iter().enumerate() {
            new_edges[pos].sort_unstable();
            new_edges[pos].dedup();

            for &edge in &new_edges[pos] {
                queries.push(ExistenceRequest {
                    edge,
                    sid,
                    is_source: false,
                })?;
            }

            if successors[pos][sid as usize] {
                // the loaded original is dropped here: the successor swap
                // re-adds the slot's original edge itself
                current[pos].pop();

                possible[slot] = current[pos]
                    .iter()
                    .merge(new_edges[pos].iter())
                    .copied()
                    .dedup()
                    .collect();
            }
        }
    }

    Ok(queries.sort()?)
}

/// Phase 2: merge the sorted queries with the sorted edge vector.
fn load_existence<Q>(
    edges: &EdgeVec,
    queries: Q,
) -> Result<(
    BinaryHeap<Reverse<ExistenceAnswer>>,
    Vec<ExistenceSuccessor>,
)>
where
    Q: Iterator<Item = ExistenceRequest>,
{
    let mut answers = BinaryHeap::new();
    let mut chain = Vec::new();

    scan_existence(
        queries,
        edges.iter(),
        |answer| {
            answers.push(Reverse(answer));
            Ok(())
        },
        |successor| {
            chain.push(successor);
            Ok(())
        },
    )?;

    chain.sort_unstable();

    Ok((answers, chain))
}

/// Phase 3: decide swaps in order and forward updated counts.
fn perform(
    resolved: &[ResolvedSwap],
    local_edges: &mut [Edge],
    mut answers: BinaryHeap<Reverse<ExistenceAnswer>>,
    chain: &[ExistenceSuccessor],
    mut log: Option<&mut ResultLog>,
) -> Result<()> {
    let mut chain_iter = chain.iter().peekable();
    let mut current_existence: Vec<(Edge, i64)> = Vec::new();

    let mut num_performed = 0u64;
    let mut num_loops = 0u64;
    let mut num_conflicts = 0u64;

    for (sid, swap) in resolved.iter().enumerate() {
        let ResolvedSwap::Active { slots, dir } = swap else {
            if let Some(log) = log.as_deref_mut() {
                log.push(SwapResult::skipped());
            }
            continue;
        };
        let sid = sid as u64;

        let sources = [local_edges[slots[0]], local_edges[slots[1]]];
        let (t0, t1) = swap_edges(sources[0], sources[1], *dir);

        debug_assert!(answers.peek().map_or(true, |a| a.0.sid >= sid));

        current_existence.clear();
        while answers.peek().is_some_and(|a| a.0.sid == sid) {
            let answer = answers.pop().expect("peeked").0;
            current_existence.push((answer.edge, answer.count));
        }

        let count_of = |edge: Edge| -> i64 {
            match current_existence.binary_search_by_key(&edge, |&(e, _)| e) {
                Ok(i) => current_existence[i].1,
                Err(_) => 0,
            }
        };

        let loop_detected = t0.is_loop() || t1.is_loop();
        let conflict_detected = if loop_detected {
            [false, false]
        } else {
            [count_of(t0) > 0, count_of(t1) > 0]
        };
        let performed = !loop_detected && !conflict_detected[0] && !conflict_detected[1];

        num_performed += u64::from(performed);
        num_loops += u64::from(loop_detected);
        num_conflicts += u64::from(conflict_detected[0]) + u64::from(conflict_detected[1]);

        if let Some(log) = log.as_deref_mut() {
            log.push(
                SwapResult {
                    edges: [t0, t1],
                    loop_detected,
                    conflict_detected,
                    performed,
                }
                .normalize(),
            );
        }

        if performed {
            local_edges[slots[0]] = t0;
            local_edges[slots[1]] = t1;
        }

        while chain_iter.peek().is_some_and(|s| s.from_sid == sid) {
            let succ = chain_iter.next().expect("peeked");
            let edge = succ.edge;

            let count = if performed && (edge == sources[0] || edge == sources[1]) {
                // a performed swap consumes one occurrence of each source
                let count = count_of(edge);
                if count == 0 {
                    return Err(Error::invariant(
                        "perform-swaps",
                        format!("missing existence entry for source edge {edge}"),
                    ));
                }
                count - 1
            } else if performed && (edge == t0 || edge == t1) {
                // targets exist exactly once afterwards
                1
            } else {
                count_of(edge)
            };

            answers.push(Reverse(ExistenceAnswer {
                sid: succ.to_sid,
                edge,
                count,
            }));
        }
    }

    tracing::info!(
        swaps = resolved.len(),
        performed = num_performed,
        loops = num_loops,
        conflicts = num_conflicts,
        "batch decided"
    );

    Ok(())
}

/// Commit: rewrite the vector, replacing every slot whose value changed.
fn commit(
    edges: &mut EdgeVec,
    eids: &[EdgeId],
    original_edges: &[Edge],
    local_edges: &[Edge],
    sorter_chunk: usize,
) -> Result<()> {
    let dir = TempDir::new()?;
    let mut valid = BitStream::new(&dir)?;
    let mut updates = ExternalSorter::new()
        .with_chunk_size(sorter_chunk)
        .pusher()?;

    let mut changed = eids
        .iter()
        .zip(original_edges.iter().zip(local_edges.iter()))
        .filter(|&(_, (original, current))| original != current);

    let mut next_changed = changed.next();

    for id in 0..edges.len() {
        match next_changed {
            Some((&changed_id, (_, &current))) if changed_id == id => {
                valid.push(false)?;
                updates.push(current)?;
                next_changed = changed.next();
            }
            _ => valid.push(true)?,
        }
    }

    update_merger::rewrite(edges, valid.consume()?, updates.sort()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge_vec(pairs: &[(i32, i32)]) -> EdgeVec {
        EdgeVec::from_edges(pairs.iter().map(|&(u, v)| Edge::new(u, v))).unwrap()
    }

    fn run(pairs: &[(i32, i32)], swaps: Vec<Swap>) -> (Vec<Edge>, ResultLog) {
        let mut edges = edge_vec(pairs);
        let mut engine = InternalEdgeSwaps::new().with_result_log();

        for swap in swaps {
            engine.push(swap);
        }
        engine.run(&mut edges).unwrap();

        (edges.to_vec(), engine.results().unwrap().clone())
    }

    #[test]
    fn empty_batch_is_identity() {
        let (edges, log) = run(&[(0, 1), (2, 3)], vec![]);

        assert_eq!(edges, vec![Edge::new(0, 1), Edge::new(2, 3)]);
        assert!(log.is_empty());
    }

    #[test]
    fn degenerate_swaps_are_recorded_without_mutation() {
        let (edges, log) = run(
            &[(0, 1), (2, 3)],
            vec![Swap::both(1, 1, true), Swap::both(0, INVALID_EDGE_ID, false)],
        );

        assert_eq!(edges, vec![Edge::new(0, 1), Edge::new(2, 3)]);
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|r| !r.performed));
    }

    #[test]
    fn successor_chain_sees_deleted_source() {
        // swap 0 consumes (2,3) as a source; swap 1 then targets (2,3) and
        // must be allowed to recreate it
        let (edges, log) = run(
            &[(0, 2), (1, 3), (2, 3), (4, 5)],
            vec![Swap::both(2, 3, false), Swap::both(0, 1, false)],
        );

        assert!(log.get(0).unwrap().performed);
        assert!(log.get(1).unwrap().performed);
        assert_eq!(
            edges,
            vec![
                Edge::new(0, 1),
                Edge::new(2, 3),
                Edge::new(2, 4),
                Edge::new(3, 5)
            ]
        );
    }

    #[test]
    fn multigraph_counts_survive_one_deletion() {
        // (1,2) exists twice; swap 0 consumes one copy, so swap 1 targeting
        // (1,2) must still see a conflict from the remaining copy
        let (edges, log) = run(
            &[(1, 2), (1, 2), (1, 3), (2, 4), (5, 6)],
            vec![Swap::both(0, 4, false), Swap::both(2, 3, false)],
        );

        assert!(log.get(0).unwrap().performed);
        let second = log.get(1).unwrap();
        assert!(!second.performed);
        assert_eq!(second.conflict_detected, [true, false]);
        assert_eq!(
            edges,
            vec![
                Edge::new(1, 2),
                Edge::new(1, 3),
                Edge::new(1, 5),
                Edge::new(2, 4),
                Edge::new(2, 6)
            ]
        );
    }
}
