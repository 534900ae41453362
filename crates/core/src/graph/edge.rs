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

use file_store::ConstSerializable;

/// A node identifier in `[0, N)`.
pub type Node = i32;

/// Index of an edge in the current edge vector. Stable within one batch.
pub type EdgeId = u64;

/// An undirected edge, stored normalized with `u <= v`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    bincode::Encode,
    bincode::Decode,
)]
pub struct Edge {
    pub u: Node,
    pub v: Node,
}

impl Edge {
    pub fn new(a: Node, b: Node) -> Self {
        if a <= b {
            Self { u: a, v: b }
        } else {
            Self { u: b, v: a }
        }
    }

    /// Placeholder for results of swaps whose edges were never loaded.
    pub const fn invalid() -> Self {
        Self { u: -1, v: -1 }
    }

    pub fn is_loop(&self) -> bool {
        self.u == self.v
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.u, self.v)
    }
}

impl ConstSerializable for Edge {
    const BYTES: usize = 2 * std::mem::size_of::<Node>();

    fn serialize(&self, buf: &mut Vec<u8>) {
        self.u.serialize(buf);
        self.v.serialize(buf);
    }

    fn deserialize(buf: &[u8]) -> Self {
        let u = Node::deserialize(buf);
        let v = Node::deserialize(&buf[std::mem::size_of::<Node>()..]);

        Self { u, v }
    }
}

/// Candidate target edges of a 2-edge swap.
///
/// With `E[e1] = (a, b)` and `E[e2] = (c, d)`, the swap exchanges one
/// endpoint between the two edges. `dir` selects which endpoint of `e1`
/// moves: the returned pair is the new value for slot `e1` followed by the
/// new value for slot `e2`.
pub fn swap_edges(e1: Edge, e2: Edge, dir: bool) -> (Edge, Edge) {
    let (a, b) = (e1.u, e1.v);
    let (c, d) = (e2.u, e2.v);

    if dir {
        (Edge::new(b, c), Edge::new(a, d))
    } else {
        (Edge::new(a, c), Edge::new(b, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_on_construction() {
        assert_eq!(Edge::new(3, 1), Edge::new(1, 3));
        assert_eq!(Edge::new(2, 2).is_loop(), true);
        assert_eq!(Edge::new(1, 3).is_loop(), false);
    }

    #[test]
    fn swap_directions() {
        let e1 = Edge::new(0, 1);
        let e2 = Edge::new(2, 3);

        assert_eq!(swap_edges(e1, e2, false), (Edge::new(0, 2), Edge::new(1, 3)));
        assert_eq!(swap_edges(e1, e2, true), (Edge::new(1, 2), Edge::new(0, 3)));
    }

    #[test]
    fn swap_preserves_degrees() {
        let e1 = Edge::new(5, 9);
        let e2 = Edge::new(2, 7);

        for dir in [false, true] {
            let (t1, t2) = swap_edges(e1, e2, dir);
            let mut before = vec![e1.u, e1.v, e2.u, e2.v];
            let mut after = vec![t1.u, t1.v, t2.u, t2.v];
            before.sort_unstable();
            after.sort_unstable();
            assert_eq!(before, after);
        }
    }

    #[test]
    fn storage_roundtrip() {
        let edge = Edge::new(42, 7);
        let mut buf = Vec::new();
        edge.serialize(&mut buf);

        assert_eq!(buf.len(), Edge::BYTES);
        assert_eq!(Edge::deserialize(&buf), edge);
    }
}
