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

//! Merge-rewrite of an edge vector.
//!
//! The old vector is consumed together with a bit stream that marks each
//! position as kept (`true`) or dropped (`false`); dropped positions are
//! replaced by a sorted stream of updated edges. The number of drops must
//! equal the number of updates, so the rewritten vector keeps its length.
//!
//! An update that collides with a kept edge would introduce a parallel edge
//! that the swap engines guarantee to never produce, so it is reported as a
//! fatal invariant violation. Equal adjacent updates (or kept entries) pass
//! through: they occur while a multigraph is being repaired, where the
//! vector is not yet simple.

use file_store::bit_stream::BitStreamReader;

use crate::graph::edge_list::EdgeVec;
use crate::graph::Edge;
use crate::{Error, Result};

const PHASE: &str = "edge-update-merge";

pub fn rewrite<U>(edges: &mut EdgeVec, valid: BitStreamReader, updates: U) -> Result<()>
where
    U: IntoIterator<Item = Edge>,
{
    if valid.len() != edges.len() {
        return Err(Error::invariant(
            PHASE,
            format!(
                "valid-bit stream has {} bits for {} edges",
                valid.len(),
                edges.len()
            ),
        ));
    }

    let mut writer = edges.begin_rewrite()?;

    let mut kept = edges
        .iter()
        .zip(valid)
        .filter_map(|(edge, keep)| keep.then_some(edge))
        .peekable();
    let mut updates = updates.into_iter().peekable();

    let mut prev: Option<Edge> = None;
    let mut prev_was_update = false;
    let mut num_updates = 0u64;

    loop {
        let take_update = match (kept.peek(), updates.peek()) {
            (Some(kept_edge), Some(update)) => {
                if update == kept_edge {
                    debug_assert!(false, "update {update} collides with kept edge");
                    return Err(Error::invariant(
                        PHASE,
                        format!("update {update} collides with a kept edge"),
                    ));
                }
                update < kept_edge
            }
            (None, Some(_)) => true,
            (Some(_), None) => false,
            (None, None) => break,
        };

        let edge = if take_update {
            let edge = updates.next().expect("peeked");
            num_updates += 1;

            if prev.is_some_and(|prev_edge| prev_edge > edge) {
                return Err(Error::invariant(
                    PHASE,
                    format!("update stream not sorted at {edge}"),
                ));
            }

            prev_was_update = true;
            edge
        } else {
            let edge = kept.next().expect("peeked");

            if prev_was_update && prev == Some(edge) {
                debug_assert!(false, "duplicate produced at {edge}");
                return Err(Error::invariant(
                    PHASE,
                    format!("kept edge {edge} duplicates a previous update"),
                ));
            }

            prev_was_update = false;
            edge
        };

        writer.push(edge)?;
        prev = Some(edge);
    }

    // releases the read borrow of `edges` before the commit below
    drop(kept);

    let dropped = edges.len() - (writer.len() - num_updates);

    if dropped != num_updates {
        return Err(Error::invariant(
            PHASE,
            format!("{dropped} dropped entries but {num_updates} updates"),
        ));
    }

    debug_assert_eq!(writer.len(), edges.len());

    edges.commit_rewrite(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use file_store::bit_stream::BitStream;
    use file_store::temp::TempDir;

    fn edges(pairs: &[(i32, i32)]) -> Vec<Edge> {
        pairs.iter().map(|&(u, v)| Edge::new(u, v)).collect()
    }

    fn bits(dir: &TempDir, flags: &[bool]) -> BitStreamReader {
        let mut stream = BitStream::new(dir).unwrap();
        for &flag in flags {
            stream.push(flag).unwrap();
        }
        stream.consume().unwrap()
    }

    #[test]
    fn empty_update_stream_is_identity() {
        let dir = TempDir::new().unwrap();
        let before = edges(&[(0, 1), (1, 2), (3, 4)]);
        let mut vec = EdgeVec::from_edges(before.clone()).unwrap();

        rewrite(&mut vec, bits(&dir, &[true, true, true]), Vec::new()).unwrap();

        assert_eq!(vec.to_vec(), before);
    }

    #[test]
    fn replaces_dropped_positions() {
        let dir = TempDir::new().unwrap();
        let mut vec = EdgeVec::from_edges(edges(&[(0, 1), (1, 2), (3, 4), (5, 6)])).unwrap();

        rewrite(
            &mut vec,
            bits(&dir, &[true, false, true, false]),
            edges(&[(0, 7), (4, 5)]),
        )
        .unwrap();

        assert_eq!(vec.to_vec(), edges(&[(0, 1), (0, 7), (3, 4), (4, 5)]));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn duplicate_with_kept_edge_fails() {
        let dir = TempDir::new().unwrap();
        let mut vec = EdgeVec::from_edges(edges(&[(0, 1), (1, 2)])).unwrap();

        let result = rewrite(&mut vec, bits(&dir, &[true, false]), edges(&[(0, 1)]));

        assert!(result.is_err());
    }

    #[test]
    fn drop_update_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let mut vec = EdgeVec::from_edges(edges(&[(0, 1), (1, 2)])).unwrap();

        let result = rewrite(&mut vec, bits(&dir, &[true, true]), edges(&[(4, 5)]));

        assert!(result.is_err());
    }

    #[test]
    fn bit_count_mismatch_fails() {
        let dir = TempDir::new().unwrap();
        let mut vec = EdgeVec::from_edges(edges(&[(0, 1), (1, 2)])).unwrap();

        let result = rewrite(&mut vec, bits(&dir, &[true]), Vec::new());

        assert!(result.is_err());
    }
}
