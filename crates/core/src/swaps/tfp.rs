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

//! Trial-finish-permute: the fully streamed swap engine.
//!
//! Unlike the batch engine, the edge vector is never loaded into RAM here.
//! Everything a run needs travels through sorters, priority queues and
//! bit-streams:
//!
//! 1. *Edge load & dependency chain.* The swap messages, sorted by edge id,
//!    are co-streamed with one sequential walk over the sorted vector. The
//!    first swap touching a slot receives the slot's edge; later swaps on
//!    the same slot are chained behind their predecessor.
//! 2. *Trial (simulation).* Swaps stream in id order and are simulated
//!    against the possible-edge sets delivered by the chain, emitting
//!    existence queries and forwarding grown possible sets downstream.
//! 3. *Finish (existence lookup).* The sorted queries are merged with a
//!    second walk over the vector, producing existence answers and
//!    forwarding links.
//! 4. *Commit.* Swaps are decided in id order from the answers; decided
//!    slot values flow down the dependency chain, and the final value of
//!    each slot that changed becomes an edge update.
//! 5. *Permute (rewrite).* The vector is merge-rewritten from the old
//!    entries, a valid-bit stream and the sorted updates.
//!
//! A swap occupies two *halves*, numbered `2·sid` and `2·sid + 1`, so every
//! per-side record sorts by half id.

use std::iter::Peekable;

use file_store::bit_stream::{BitStream, BitStreamReader};
use file_store::temp::TempDir;
use itertools::Itertools;

use crate::external_pq::ExternalPq;
use crate::external_sort::{ExternalSorter, PushSorter, SortedIterator};
use crate::graph::{swap_edges, update_merger, Edge, EdgeId, EdgeVec};
use crate::pipeline::{AsyncPusher, AsyncStream, PqSorterMerger, Sink};
use crate::swaps::messages::{
    scan_existence, ExistenceAnswer, ExistenceRequest, ExistenceSuccessor,
};
use crate::swaps::{ResultLog, Swap, SwapResult};
use crate::{Error, Result};

/// One side of a swap, addressed by edge id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
struct EdgeSwapMsg {
    eid: EdgeId,
    half: u64,
}

/// One side of a swap, addressed by edge value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
struct LoadedSwapMsg {
    edge: Edge,
    half: u64,
}

/// A possible (during trial) or decided (during commit) value of the slot a
/// half refers to. `eid` and `original` ride along unchanged so the last
/// consumer of a slot can tell whether the slot needs rewriting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
struct EdgeState {
    half: u64,
    eid: EdgeId,
    original: Edge,
    edge: Edge,
}

/// Chain link: when `from_half`'s swap has decided, it delivers the slot
/// state to `to_half`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
struct DependencyMsg {
    from_half: u64,
    to_half: u64,
}

struct RunState {
    dir: TempDir,
    id_msgs: PushSorter<EdgeSwapMsg>,
    value_msgs: PushSorter<LoadedSwapMsg>,
    dirs_trial: BitStream,
    dirs_commit: BitStream,
    by_value: BitStream,
    num_swaps: u64,
}

impl RunState {
    fn new(sorter_chunk: usize) -> Result<Self> {
        let dir = TempDir::new()?;

        Ok(Self {
            id_msgs: ExternalSorter::new()
                .with_chunk_size(sorter_chunk)
                .pusher()?,
            value_msgs: ExternalSorter::new()
                .with_chunk_size(sorter_chunk)
                .pusher()?,
            dirs_trial: BitStream::new(&dir)?,
            dirs_commit: BitStream::new(&dir)?,
            by_value: BitStream::new(&dir)?,
            num_swaps: 0,
            dir,
        })
    }
}

pub struct TfpEdgeSwaps {
    sorter_chunk: usize,
    pq_capacity: usize,
    async_io: bool,
    log: Option<ResultLog>,
    state: Option<RunState>,
}

impl Default for TfpEdgeSwaps {
    fn default() -> Self {
        Self::new()
    }
}

impl TfpEdgeSwaps {
    pub fn new() -> Self {
        Self {
            sorter_chunk: crate::SORTER_CHUNK,
            pq_capacity: 1 << 20,
            async_io: false,
            log: None,
            state: None,
        }
    }

    pub fn with_sorter_chunk(mut self, chunk: usize) -> Self {
        self.sorter_chunk = chunk.max(1);
        self
    }

    pub fn with_pq_capacity(mut self, capacity: usize) -> Self {
        self.pq_capacity = capacity.max(1);
        self
    }

    /// Run the lookup and commit phases decoupled by buffered worker
    /// threads.
    pub fn with_async_io(mut self) -> Self {
        self.async_io = true;
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

    /// Number of swaps queued for the current run.
    pub fn pending_swaps(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.num_swaps)
    }

    /// Queue a swap. Only sorter and bit-stream state is touched; the edge
    /// vector is not needed until [`Self::run`].
    pub fn push(&mut self, swap: Swap) -> Result<()> {
        if self.state.is_none() {
            self.state = Some(RunState::new(self.sorter_chunk)?);
        }
        let state = self.state.as_mut().expect("just created");

        let sid = state.num_swaps;
        let halves = [2 * sid, 2 * sid + 1];

        match swap {
            Swap::Both { e1, e2, dir } => {
                state.id_msgs.push(EdgeSwapMsg {
                    eid: e1,
                    half: halves[0],
                })?;
                state.id_msgs.push(EdgeSwapMsg {
                    eid: e2,
                    half: halves[1],
                })?;
                state.by_value.push(false)?;
                state.dirs_trial.push(dir)?;
                state.dirs_commit.push(dir)?;
            }
            Swap::FirstByValue { edge, e2, dir } => {
                state.value_msgs.push(LoadedSwapMsg {
                    edge,
                    half: halves[0],
                })?;
                state.id_msgs.push(EdgeSwapMsg {
                    eid: e2,
                    half: halves[1],
                })?;
                state.by_value.push(true)?;
                state.dirs_trial.push(dir)?;
                state.dirs_commit.push(dir)?;
            }
        }

        state.num_swaps += 1;

        Ok(())
    }

    /// Execute one run over everything pushed since the last run and commit
    /// the rewritten edge vector.
    pub fn run(&mut self, edges: &mut EdgeVec) -> Result<()> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };

        if state.num_swaps == 0 {
            return Ok(());
        }

        self.process_run(edges, state)
    }

    fn process_run(&mut self, edges: &mut EdgeVec, state: RunState) -> Result<()> {
        let num_swaps = state.num_swaps;
        let dir = state.dir;

        tracing::info!(
            swaps = num_swaps,
            edges = edges.len(),
            "streamed run started"
        );

        // phase 1: edge load & dependency chain
        let mut chain_out = DependencyOut::new(self.sorter_chunk)?;
        compute_dependency_chain(
            edges,
            state.id_msgs.sort()?,
            state.value_msgs.sort()?,
            &mut chain_out,
        )?;

        let DependencyOut {
            init_trial,
            init_commit,
            dep_trial,
            dep_commit,
        } = chain_out;

        // phase 2: trial
        let (queries, active_bits, record_bits) = self.trial(
            num_swaps,
            state.dirs_trial.consume()?,
            state.by_value.consume()?,
            init_trial.sort()?,
            dep_trial.sort()?,
            &dir,
        )?;

        tracing::debug!(queries = queries.len(), "trial finished");

        // phase 3: finish (existence lookup)
        let mut answers = ExternalSorter::new()
            .with_chunk_size(self.sorter_chunk)
            .pusher()?;
        let mut chain = ExternalSorter::new()
            .with_chunk_size(self.sorter_chunk)
            .pusher()?;

        {
            let queries: Box<dyn Iterator<Item = ExistenceRequest>> = if self.async_io {
                Box::new(AsyncStream::new(queries, 1 << 16, 3))
            } else {
                Box::new(queries)
            };

            scan_existence(
                queries,
                edges.iter(),
                |answer| answers.push(answer),
                |successor| chain.push(successor),
            )?;
        }

        tracing::debug!(
            answers = answers.len(),
            forwards = chain.len(),
            "existence lookup finished"
        );

        // phase 4: commit
        let mut dropped = ExternalSorter::new()
            .with_chunk_size(self.sorter_chunk)
            .pusher()?;

        let updates = {
            let update_sorter = ExternalSorter::new()
                .with_chunk_size(self.sorter_chunk)
                .pusher()?;

            let commit_in = CommitIn {
                num_swaps,
                dirs: state.dirs_commit.consume()?,
                active: active_bits,
                record: record_bits,
                init: init_commit.sort()?,
                dep: dep_commit.sort()?,
                answers: answers.sort()?,
                chain: chain.sort()?,
            };

            if self.async_io {
                let mut updates = AsyncPusher::new(update_sorter, 1 << 16, 3);
                self.commit(commit_in, &mut updates, &mut dropped)?;
                updates.finish()?
            } else {
                let mut updates = update_sorter;
                self.commit(commit_in, &mut updates, &mut dropped)?;
                updates
            }
        };

        // phase 5: permute (merge-rewrite)
        let mut valid = BitStream::new(&dir)?;
        let mut dropped = dropped.sort()?.peekable();

        for id in 0..edges.len() {
            if dropped.peek() == Some(&id) {
                dropped.next();
                valid.push(false)?;
            } else {
                valid.push(true)?;
            }
        }

        update_merger::rewrite(edges, valid.consume()?, updates.sort()?)
    }

    /// Phase 2. Returns the sorted existence queries plus two bit-streams
    /// telling the commit phase, per swap, whether it is evaluated and
    /// whether a skipped swap is still recorded.
    fn trial(
        &self,
        num_swaps: u64,
        mut dirs: BitStreamReader,
        mut by_value: BitStreamReader,
        init: SortedIterator<EdgeState>,
        dep: SortedIterator<DependencyMsg>,
        dir: &TempDir,
    ) -> Result<(
        SortedIterator<ExistenceRequest>,
        BitStreamReader,
        BitStreamReader,
    )> {
        let mut states = PqSorterMerger::new(ExternalPq::new(self.pq_capacity)?, init);
        let mut deps = dep.peekable();
        let mut queries = ExternalSorter::new()
            .with_chunk_size(self.sorter_chunk)
            .pusher()?;
        let mut active_bits = BitStream::new(dir)?;
        let mut record_bits = BitStream::new(dir)?;

        for sid in 0..num_swaps {
            let dir_bit = next_bit(&mut dirs, "direction")?;
            let is_value = next_bit(&mut by_value, "swap kind")?;

            let halves = [2 * sid, 2 * sid + 1];
            let (meta0, set0) = drain_half(&mut states, halves[0]);
            let (meta1, set1) = drain_half(&mut states, halves[1]);

            if set0.is_empty() || set1.is_empty() {
                // a missing by-value side was never resolved: drop the swap
                // without a trace; every other missing side is recorded
                active_bits.push(false)?;
                record_bits.push(!(is_value && set0.is_empty()))?;

                for (pos, (meta, set)) in [(meta0, &set0), (meta1, &set1)].into_iter().enumerate()
                {
                    if set.is_empty() {
                        continue;
                    }

                    if deps.peek().is_some_and(|d| d.from_half == halves[pos]) {
                        let to_half = deps.next().expect("peeked").to_half;
                        let (eid, original) = meta.expect("armed halves carry meta");

                        for &edge in set {
                            states.push(EdgeState {
                                half: to_half,
                                eid,
                                original,
                                edge,
                            })?;
                        }
                    }
                }

                continue;
            }

            active_bits.push(true)?;
            record_bits.push(true)?;

            for &edge in set0.iter().chain(set1.iter()) {
                queries.push(ExistenceRequest {
                    edge,
                    sid,
                    is_source: true,
                })?;
            }

            let mut new_edges: [Vec<Edge>; 2] = [Vec::new(), Vec::new()];
            for &e0 in &set0 {
                for &e1 in &set1 {
                    let (t0, t1) = swap_edges(e0, e1, dir_bit);

                    // trivial conflicts are not queried
                    if !t0.is_loop() && !t1.is_loop() {
                        new_edges[0].push(t0);
                        new_edges[1].push(t1);
                    }
                }
            }

            for (pos, (meta, set)) in [(meta0, &set0), (meta1, &set1)].into_iter().enumerate() {
                new_edges[pos].sort_unstable();
                new_edges[pos].dedup();

                for &edge in &new_edges[pos] {
                    queries.push(ExistenceRequest {
                        edge,
                        sid,
                        is_source: false,
                    })?;
                }

                if deps.peek().is_some_and(|d| d.from_half == halves[pos]) {
                    let to_half = deps.next().expect("peeked").to_half;
                    let (eid, original) = meta.expect("armed halves carry meta");

                    for edge in set.iter().merge(new_edges[pos].iter()).copied().dedup() {
                        states.push(EdgeState {
                            half: to_half,
                            eid,
                            original,
                            edge,
                        })?;
                    }
                }
            }
        }

        Ok((
            queries.sort()?,
            active_bits.consume()?,
            record_bits.consume()?,
        ))
    }

    /// Phase 4.
    fn commit<S>(
        &mut self,
        mut input: CommitIn,
        updates: &mut S,
        dropped: &mut PushSorter<EdgeId>,
    ) -> Result<()>
    where
        S: Sink<Edge>,
    {
        let mut states = PqSorterMerger::new(ExternalPq::new(self.pq_capacity)?, input.init);
        let mut existence = PqSorterMerger::new(ExternalPq::new(self.pq_capacity)?, input.answers);
        let mut deps = input.dep.peekable();
        let mut chain = input.chain.peekable();

        let mut current_existence: Vec<(Edge, i64)> = Vec::new();

        let mut num_performed = 0u64;
        let mut num_loops = 0u64;
        let mut num_conflicts = 0u64;

        for sid in 0..input.num_swaps {
            let dir_bit = next_bit(&mut input.dirs, "direction")?;
            let active = next_bit(&mut input.active, "activity")?;
            let record = next_bit(&mut input.record, "record flag")?;

            let halves = [2 * sid, 2 * sid + 1];
            let (meta0, set0) = drain_half(&mut states, halves[0]);
            let (meta1, set1) = drain_half(&mut states, halves[1]);

            if !active {
                if record {
                    if let Some(log) = self.log.as_mut() {
                        log.push(SwapResult::skipped());
                    }
                }

                for (pos, (meta, set)) in [(meta0, &set0), (meta1, &set1)].into_iter().enumerate()
                {
                    if let Some(&value) = set.first() {
                        debug_assert_eq!(set.len(), 1, "committed slots have one value");
                        let (eid, original) = meta.expect("armed halves carry meta");

                        finish_half(
                            halves[pos],
                            eid,
                            original,
                            value,
                            &mut deps,
                            &mut states,
                            updates,
                            dropped,
                        )?;
                    }
                }

                continue;
            }

            debug_assert_eq!(set0.len(), 1, "committed slots have one value");
            debug_assert_eq!(set1.len(), 1, "committed slots have one value");

            let sources = [set0[0], set1[0]];
            let (t0, t1) = swap_edges(sources[0], sources[1], dir_bit);

            current_existence.clear();
            while existence.peek().is_some_and(|a| a.sid == sid) {
                let answer = existence.pop().expect("peeked");
                current_existence.push((answer.edge, answer.count));
            }

            let count_of = |list: &[(Edge, i64)], edge: Edge| -> i64 {
                match list.binary_search_by_key(&edge, |&(e, _)| e) {
                    Ok(i) => list[i].1,
                    Err(_) => 0,
                }
            };

            let loop_detected = t0.is_loop() || t1.is_loop();
            let conflict_detected = if loop_detected {
                [false, false]
            } else {
                [
                    count_of(&current_existence, t0) > 0,
                    count_of(&current_existence, t1) > 0,
                ]
            };
            let performed = !loop_detected && !conflict_detected[0] && !conflict_detected[1];

            num_performed += u64::from(performed);
            num_loops += u64::from(loop_detected);
            num_conflicts += u64::from(conflict_detected[0]) + u64::from(conflict_detected[1]);

            if let Some(log) = self.log.as_mut() {
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

            let finals = if performed {
                [t0, t1]
            } else {
                [sources[0], sources[1]]
            };

            while chain.peek().is_some_and(|c| c.from_sid == sid) {
                let succ = chain.next().expect("peeked");
                let edge = succ.edge;

                let count = if performed && (edge == sources[0] || edge == sources[1]) {
                    // a performed swap consumes one occurrence of each source
                    let count = count_of(&current_existence, edge);
                    if count == 0 {
                        return Err(Error::invariant(
                            "commit",
                            format!("missing existence entry for source edge {edge}"),
                        ));
                    }
                    count - 1
                } else if performed && (edge == t0 || edge == t1) {
                    // targets exist exactly once afterwards
                    1
                } else {
                    count_of(&current_existence, edge)
                };

                existence.push(ExistenceAnswer {
                    sid: succ.to_sid,
                    edge,
                    count,
                })?;
            }

            for (pos, meta) in [meta0, meta1].into_iter().enumerate() {
                let (eid, original) = meta.expect("active swaps have both slots");

                finish_half(
                    halves[pos],
                    eid,
                    original,
                    finals[pos],
                    &mut deps,
                    &mut states,
                    updates,
                    dropped,
                )?;
            }
        }

        tracing::info!(
            swaps = input.num_swaps,
            performed = num_performed,
            loops = num_loops,
            conflicts = num_conflicts,
            "run decided"
        );

        Ok(())
    }
}

struct CommitIn {
    num_swaps: u64,
    dirs: BitStreamReader,
    active: BitStreamReader,
    record: BitStreamReader,
    init: SortedIterator<EdgeState>,
    dep: SortedIterator<DependencyMsg>,
    answers: SortedIterator<ExistenceAnswer>,
    chain: SortedIterator<ExistenceSuccessor>,
}

struct DependencyOut {
    init_trial: PushSorter<EdgeState>,
    init_commit: PushSorter<EdgeState>,
    dep_trial: PushSorter<DependencyMsg>,
    dep_commit: PushSorter<DependencyMsg>,
}

impl DependencyOut {
    fn new(sorter_chunk: usize) -> Result<Self> {
        let sorter = || {
            ExternalSorter::new()
                .with_chunk_size(sorter_chunk)
                .pusher()
        };

        Ok(Self {
            init_trial: sorter()?,
            init_commit: sorter()?,
            dep_trial: ExternalSorter::new()
                .with_chunk_size(sorter_chunk)
                .pusher()?,
            dep_commit: ExternalSorter::new()
                .with_chunk_size(sorter_chunk)
                .pusher()?,
        })
    }
}

/// Phase 1: walk the sorted vector once, resolving by-value sides and
/// linking every slot's touchers into a chain.
///
/// The trial and commit phases each need the initial states and chain links
/// once, and our sorted streams are single-pass, so each record is written
/// into two sorters.
fn compute_dependency_chain(
    edges: &EdgeVec,
    id_msgs: SortedIterator<EdgeSwapMsg>,
    value_msgs: SortedIterator<LoadedSwapMsg>,
    out: &mut DependencyOut,
) -> Result<()> {
    let mut ids = id_msgs.peekable();
    let mut values = value_msgs.peekable();

    let mut halves = Vec::new();

    for (eid, edge) in edges.iter().enumerate() {
        let eid = eid as EdgeId;

        // by-value sides with no matching edge stay unresolved
        while values.peek().is_some_and(|m| m.edge < edge) {
            values.next();
        }

        halves.clear();

        while values.peek().is_some_and(|m| m.edge == edge) {
            halves.push(values.next().expect("peeked").half);
        }
        while ids.peek().is_some_and(|m| m.eid == eid) {
            halves.push(ids.next().expect("peeked").half);
        }

        if halves.is_empty() {
            continue;
        }

        halves.sort_unstable();

        // both sides of one swap on the same slot cancel each other
        let mut linked: Vec<u64> = Vec::with_capacity(halves.len());
        let mut i = 0;
        while i < halves.len() {
            if i + 1 < halves.len() && halves[i] % 2 == 0 && halves[i + 1] == halves[i] + 1 {
                i += 2;
            } else {
                linked.push(halves[i]);
                i += 1;
            }
        }

        if let Some(&first) = linked.first() {
            let state = EdgeState {
                half: first,
                eid,
                original: edge,
                edge,
            };
            out.init_trial.push(state)?;
            out.init_commit.push(state)?;
        }

        for (&from_half, &to_half) in linked.iter().tuple_windows() {
            let dep = DependencyMsg { from_half, to_half };
            out.dep_trial.push(dep)?;
            out.dep_commit.push(dep)?;
        }
    }

    Ok(())
}

fn next_bit(bits: &mut BitStreamReader, what: &'static str) -> Result<bool> {
    bits.next()
        .ok_or_else(|| Error::invariant("streamed-run", format!("{what} bit stream ran dry")))
}

/// Collect every queued state of `half`. Returns the slot metadata and the
/// (deduplicated, ascending) possible edges.
fn drain_half(
    states: &mut PqSorterMerger<EdgeState>,
    half: u64,
) -> (Option<(EdgeId, Edge)>, Vec<Edge>) {
    let mut meta = None;
    let mut edges = Vec::new();

    while states.peek().is_some_and(|s| s.half == half) {
        let state = states.pop().expect("peeked");
        meta = Some((state.eid, state.original));
        edges.push(state.edge);
    }

    edges.dedup();

    (meta, edges)
}

/// Route a decided slot value: down the chain if a later swap uses the
/// slot, otherwise into the update stream when the value changed.
#[allow(clippy::too_many_arguments)]
fn finish_half<S>(
    half: u64,
    eid: EdgeId,
    original: Edge,
    value: Edge,
    deps: &mut Peekable<SortedIterator<DependencyMsg>>,
    states: &mut PqSorterMerger<EdgeState>,
    updates: &mut S,
    dropped: &mut PushSorter<EdgeId>,
) -> Result<()>
where
    S: Sink<Edge>,
{
    if deps.peek().is_some_and(|d| d.from_half == half) {
        let to_half = deps.next().expect("peeked").to_half;

        states.push(EdgeState {
            half: to_half,
            eid,
            original,
            edge: value,
        })?;
    } else if value != original {
        updates.push(value)?;
        dropped.push(eid)?;
    }

    Ok(())
}
