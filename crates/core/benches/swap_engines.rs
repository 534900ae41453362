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

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use rewire::gen::{randomize, Engine};
use rewire::graph::{Edge, EdgeVec};
use rewire::swaps::{InternalEdgeSwaps, TfpEdgeSwaps};

const NUM_EDGES: i32 = 10_000;
const NUM_SWAPS: u64 = 10_000;

fn ring() -> EdgeVec {
    EdgeVec::from_edges((0..NUM_EDGES).map(|i| Edge::new(i, (i + 1) % NUM_EDGES))).unwrap()
}

fn bench_engines(c: &mut Criterion) {
    let mut group = c.benchmark_group("randomize");
    group.sample_size(10);

    group.bench_function(BenchmarkId::new("internal", NUM_SWAPS), |b| {
        b.iter(|| {
            let mut edges = ring();
            let mut engine = Engine::Internal(InternalEdgeSwaps::new());
            randomize(&mut edges, &mut engine, 42, NUM_SWAPS, NUM_SWAPS).unwrap();
            edges.len()
        });
    });

    group.bench_function(BenchmarkId::new("tfp", NUM_SWAPS), |b| {
        b.iter(|| {
            let mut edges = ring();
            let mut engine = Engine::Tfp(TfpEdgeSwaps::new());
            randomize(&mut edges, &mut engine, 42, NUM_SWAPS, NUM_SWAPS).unwrap();
            edges.len()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_engines);
criterion_main!(benches);
