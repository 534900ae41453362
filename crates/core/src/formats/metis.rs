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

//! Metis text export: header `N M 0`, then one line per node listing its
//! 1-based neighbors.
//!
//! The edge vector stores every edge once under its smaller endpoint, so a
//! node's smaller neighbors are recovered from a sorted pass over the
//! reversed edges while its larger neighbors stream straight from the
//! vector.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::external_sort::ExternalSorter;
use crate::graph::{EdgeVec, Node};
use crate::Result;

pub fn write_metis<P: AsRef<Path>>(edges: &EdgeVec, num_nodes: Node, path: P) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    writeln!(out, "{} {} 0", num_nodes, edges.len())?;

    let mut reversed = ExternalSorter::new()
        .sort(edges.iter().map(|e| (e.v, e.u)))?
        .peekable();
    let mut forward = edges.iter().peekable();

    for u in 0..num_nodes {
        let mut first = true;

        while reversed.peek().is_some_and(|&(v, _)| v == u) {
            let (_, neighbor) = reversed.next().expect("peeked");
            write_neighbor(&mut out, neighbor, &mut first)?;
        }

        while forward.peek().is_some_and(|e| e.u == u) {
            let neighbor = forward.next().expect("peeked").v;
            write_neighbor(&mut out, neighbor, &mut first)?;
        }

        writeln!(out)?;
    }

    out.flush()?;

    Ok(())
}

fn write_neighbor(out: &mut impl Write, neighbor: Node, first: &mut bool) -> Result<()> {
    if !*first {
        write!(out, " ")?;
    }
    *first = false;

    write!(out, "{}", neighbor + 1)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use file_store::temp::{TempDir, TempFile};

    #[test]
    fn neighbors_are_one_based_and_complete() {
        let edges = EdgeVec::from_edges(
            [(0, 1), (0, 2), (1, 2), (2, 3)].map(|(u, v)| Edge::new(u, v)),
        )
        .unwrap();

        let dir = TempDir::new().unwrap();
        let file = TempFile::new(&dir).unwrap();

        write_metis(&edges, 4, file.path()).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines, vec!["4 4 0", "2 3", "1 3", "1 2 4", "3"]);
    }
}
