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

//! Drivers that feed swap batches into an engine: repairing a freshly
//! materialized graph into a simple one, and uniform randomization.

use crate::graph::EdgeVec;
use crate::swaps::{InternalEdgeSwaps, RandomSwaps, RepairSwaps, Swap, TfpEdgeSwaps};
use crate::{Error, Result};

/// Either swap engine behind one face, so drivers and the harness can be
/// switched by a flag.
pub enum Engine {
    Internal(InternalEdgeSwaps),
    Tfp(TfpEdgeSwaps),
}

impl Engine {
    pub fn push(&mut self, swap: Swap) -> Result<()> {
        match self {
            Self::Internal(engine) => {
                engine.push(swap);
                Ok(())
            }
            Self::Tfp(engine) => engine.push(swap),
        }
    }

    pub fn run(&mut self, edges: &mut EdgeVec) -> Result<()> {
        match self {
            Self::Internal(engine) => engine.run(edges),
            Self::Tfp(engine) => engine.run(edges),
        }
    }

    pub fn num_performed(&self) -> Option<usize> {
        match self {
            Self::Internal(engine) => engine.results().map(|log| log.num_performed()),
            Self::Tfp(engine) => engine.results().map(|log| log.num_performed()),
        }
    }
}

/// Break up loops and parallel edges with partner swaps until the vector is
/// simple. Returns the number of repair rounds.
pub fn make_simple(
    edges: &mut EdgeVec,
    engine: &mut Engine,
    seed: u64,
    max_rounds: u64,
) -> Result<u64> {
    let num_edges = edges.len();

    for round in 0..max_rounds {
        if edges.check_sorted_simple().is_ok() {
            tracing::info!(rounds = round, "graph is simple");
            return Ok(round);
        }

        let mut num_swaps = 0u64;
        {
            let swaps = RepairSwaps::new(seed.wrapping_add(round), num_edges, edges.iter());

            for swap in swaps {
                engine.push(swap)?;
                num_swaps += 1;
            }
        }

        tracing::info!(round, swaps = num_swaps, "repair round");
        engine.run(edges)?;
    }

    if edges.check_sorted_simple().is_ok() {
        return Ok(max_rounds);
    }

    Err(Error::InvalidInput(format!(
        "graph is still not simple after {max_rounds} repair rounds"
    )))
}

/// Apply `num_swaps` uniform random swaps in runs of `swaps_per_run`.
pub fn randomize(
    edges: &mut EdgeVec,
    engine: &mut Engine,
    seed: u64,
    num_swaps: u64,
    swaps_per_run: u64,
) -> Result<()> {
    let swaps_per_run = swaps_per_run.max(1);
    let mut source = RandomSwaps::new(seed, edges.len());
    let mut remaining = num_swaps;

    while remaining > 0 {
        let run = remaining.min(swaps_per_run);

        for _ in 0..run {
            let swap = source.next().ok_or_else(|| {
                Error::InvalidInput("graph has too few edges to swap".to_string())
            })?;
            engine.push(swap)?;
        }

        engine.run(edges)?;
        remaining -= run;
    }

    Ok(())
}
