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

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::prelude::*;

use rewire::external_sort::ExternalSorter;
use rewire::gen::{havel_hakimi, make_simple, randomize, Engine, PowerlawSequence};
use rewire::graph::{degree, EdgeVec};
use rewire::swaps::{InternalEdgeSwaps, TfpEdgeSwaps};
use rewire::{formats, RUN_LENGTH};

/// Generate a power-law graph and randomize it with uniform edge swaps.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Generate this many nodes.
    #[clap(short = 'n', long, default_value_t = 1_000_000)]
    num_nodes: u64,

    /// If > 0, truncate the generated sorted edge list to this many edges.
    #[clap(short = 'm', long, default_value_t = 0)]
    num_edges: u64,

    /// Minimum degree of the power-law degree distribution.
    #[clap(short = 'a', long, default_value_t = 2)]
    min_deg: u64,

    /// Maximum degree of the power-law degree distribution.
    #[clap(short = 'b', long, default_value_t = 100_000)]
    max_deg: u64,

    /// Exponent of the power-law degree distribution.
    #[clap(short = 'g', long, default_value_t = -2.0, allow_hyphen_values = true)]
    gamma: f64,

    /// Initial seed for the PRNG.
    #[clap(short = 's', long, default_value_t = 0)]
    seed: u64,

    /// Perform the edge swaps with the in-RAM batch engine.
    #[clap(short = 'i', long)]
    swap_internal: bool,

    /// Perform the edge swaps with the streamed engine.
    #[clap(short = 't', long)]
    swap_tfp: bool,

    /// Number of swaps per engine run.
    #[clap(short = 'p', long, default_value_t = RUN_LENGTH)]
    swaps_per_iteration: u64,

    /// Smallest number of swaps of the benchmark sweep.
    #[clap(short = 'x', long, default_value_t = 0)]
    sweep_min: u64,

    /// Largest number of swaps of the benchmark sweep.
    #[clap(short = 'y', long, default_value_t = 0)]
    sweep_max: u64,

    /// Number of sweep steps per decade.
    #[clap(short = 'z', long, default_value_t = 4)]
    sweep_steps: u64,

    /// Export the final graph as a Thrill binary edge list.
    #[clap(long)]
    export_thrill: Option<PathBuf>,

    /// Export the final graph in the Metis text format.
    #[clap(long)]
    export_metis: Option<PathBuf>,
}

impl Args {
    fn engine(&self) -> Result<Engine> {
        if self.swap_internal && self.swap_tfp {
            bail!("--swap-internal and --swap-tfp are mutually exclusive");
        }

        if self.swap_internal {
            Ok(Engine::Internal(InternalEdgeSwaps::new()))
        } else {
            Ok(Engine::Tfp(TfpEdgeSwaps::new()))
        }
    }

    fn sweep_targets(&self) -> Vec<u64> {
        if self.sweep_min == 0 || self.sweep_max < self.sweep_min {
            return vec![self.swaps_per_iteration];
        }

        let factor = 10f64.powf(1.0 / self.sweep_steps.max(1) as f64);
        let mut targets = Vec::new();
        let mut value = self.sweep_min as f64;

        while (value as u64) < self.sweep_max {
            targets.push(value as u64);
            value *= factor;
        }
        targets.push(self.sweep_max);
        targets.dedup();

        targets
    }
}

fn build_graph(args: &Args) -> Result<EdgeVec> {
    let mut rng = StdRng::seed_from_u64(args.seed);

    let mut degrees =
        PowerlawSequence::new(args.min_deg, args.max_deg, args.gamma).sequence(
            usize::try_from(args.num_nodes)?,
            &mut rng,
        );

    if degrees.iter().sum::<u64>() % 2 != 0 {
        degrees[0] += 1;
    }

    let stream = havel_hakimi(&degrees)?;
    tracing::info!(edges = stream.len(), "materialized edges");

    let sorted = ExternalSorter::new().sort(stream.iter()?)?;

    let edges = if args.num_edges > 0 {
        EdgeVec::from_sorted_edges(sorted.take(usize::try_from(args.num_edges)?))?
    } else {
        EdgeVec::from_sorted_edges(sorted)?
    };

    Ok(edges)
}

fn run(args: &Args) -> Result<()> {
    tracing::info!(seed = args.seed, "starting run");

    let mut edges = build_graph(args)?;
    let mut engine = args.engine()?;

    let repair_seed = args.seed.wrapping_add(1);
    make_simple(&mut edges, &mut engine, repair_seed, 1000)?;

    let mut swap_seed = args.seed.wrapping_add(2);
    let mut total_swaps = 0u64;

    for target in args.sweep_targets() {
        let start = Instant::now();

        randomize(
            &mut edges,
            &mut engine,
            swap_seed,
            target,
            args.swaps_per_iteration,
        )?;
        swap_seed = swap_seed.wrapping_add(1);
        total_swaps += target;

        tracing::info!(
            swaps = target,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "randomization finished"
        );
    }

    edges.check_sorted_simple()?;
    tracing::info!(
        edges = edges.len(),
        swaps = total_swaps,
        distinct_degrees = degree::degree_distribution(edges.iter()).len(),
        "final graph is sorted and simple"
    );

    let num_nodes = i32::try_from(args.num_nodes)?;

    if let Some(path) = &args.export_thrill {
        formats::write_thrill_binary(edges.iter(), num_nodes, path)?;
        tracing::info!(path = %path.display(), "wrote Thrill binary edge list");
    }

    if let Some(path) = &args.export_metis {
        formats::write_metis(&edges, num_nodes, path)?;
        tracing::info!(path = %path.display(), "wrote Metis graph");
    }

    Ok(())
}

fn main() -> Result<()> {
    let fmt = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(fmt)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    run(&args)
}
