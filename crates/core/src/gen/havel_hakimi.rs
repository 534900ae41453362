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

use std::collections::BinaryHeap;

use crate::graph::{Edge, EdgeStream, Node};
use crate::{Error, Result};

/// Materialize an edge stream realizing `degrees` (node `u` gets
/// `degrees[u]`).
///
/// Greedy highest-degree-first construction. For a realizable sequence the
/// output is a simple graph; otherwise the unconnectable leftover stubs are
/// paired arbitrarily, so loops and parallel edges may appear and the caller
/// is expected to repair them with partner swaps. The output stream is
/// unsorted.
pub fn havel_hakimi(degrees: &[u64]) -> Result<EdgeStream> {
    if degrees.len() > i32::MAX as usize {
        return Err(Error::Overflow("node count exceeds the id range"));
    }

    let total: u64 = degrees.iter().sum();
    if total % 2 != 0 {
        return Err(Error::InvalidInput(
            "degree sequence has odd total degree".to_string(),
        ));
    }

    let mut stream = EdgeStream::new()?;

    let mut heap: BinaryHeap<(u64, Node)> = degrees
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d > 0)
        .map(|(u, &d)| (d, u as Node))
        .collect();

    let mut leftovers: Vec<Node> = Vec::new();
    let mut partners = Vec::new();

    while let Some((degree, u)) = heap.pop() {
        partners.clear();

        for _ in 0..degree {
            match heap.pop() {
                Some(partner) => partners.push(partner),
                None => break,
            }
        }

        for &(d, v) in &partners {
            stream.push(Edge::new(u, v))?;

            if d > 1 {
                heap.push((d - 1, v));
            }
        }

        // not realizable: remember the unconnectable stubs of u
        for _ in partners.len() as u64..degree {
            leftovers.push(u);
        }
    }

    debug_assert_eq!(leftovers.len() % 2, 0);

    if !leftovers.is_empty() {
        tracing::warn!(
            stubs = leftovers.len(),
            "degree sequence is not realizable, pairing leftover stubs"
        );
    }

    for pair in leftovers.chunks_exact(2) {
        stream.push(Edge::new(pair[0], pair[1]))?;
    }

    stream.rewind()?;

    Ok(stream)
}
