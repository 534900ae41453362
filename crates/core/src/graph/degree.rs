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

use std::collections::BTreeMap;

use crate::graph::{Edge, Node};

/// Per-node degrees of an edge sequence. Loops count twice.
pub fn degrees<I>(edges: I) -> BTreeMap<Node, u64>
where
    I: IntoIterator<Item = Edge>,
{
    let mut degrees = BTreeMap::new();

    for edge in edges {
        *degrees.entry(edge.u).or_insert(0) += 1;
        *degrees.entry(edge.v).or_insert(0) += 1;
    }

    degrees
}

/// Histogram of degrees: degree value -> number of nodes with that degree.
pub fn degree_distribution<I>(edges: I) -> BTreeMap<u64, u64>
where
    I: IntoIterator<Item = Edge>,
{
    let mut distribution = BTreeMap::new();

    for degree in degrees(edges).into_values() {
        *distribution.entry(degree).or_insert(0) += 1;
    }

    distribution
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loops_count_twice() {
        let degrees = degrees(vec![Edge::new(0, 1), Edge::new(1, 1)]);

        assert_eq!(degrees.get(&0), Some(&1));
        assert_eq!(degrees.get(&1), Some(&3));
    }

    #[test]
    fn distribution() {
        let dist = degree_distribution(vec![
            Edge::new(0, 1),
            Edge::new(1, 2),
            Edge::new(2, 3),
        ]);

        assert_eq!(dist.get(&1), Some(&2));
        assert_eq!(dist.get(&2), Some(&2));
    }
}
