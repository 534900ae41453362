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

//! Edge-existence query protocol shared by both swap engines.
//!
//! Simulation produces [`ExistenceRequest`]s; [`scan_existence`] merges the
//! sorted requests with the sorted edge vector and produces, per queried
//! edge, one [`ExistenceAnswer`] for the earliest querying swap plus an
//! [`ExistenceSuccessor`] link for every later consumer. When a swap decides,
//! it forwards its (possibly updated) count along the successor links.

use crate::graph::Edge;
use crate::Result;

/// Query: does `edge` exist at the evaluation moment of swap `sid`?
///
/// Sorted by edge and, within an edge, by *descending* swap id: the scan
/// walks each edge's queries from the latest swap to the earliest, chaining
/// each swap to its next consumer and leaving the existence answer with the
/// earliest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub(crate) struct ExistenceRequest {
    pub edge: Edge,
    pub sid: u64,
    pub is_source: bool,
}

impl Ord for ExistenceRequest {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.edge
            .cmp(&other.edge)
            .then(other.sid.cmp(&self.sid))
            .then(self.is_source.cmp(&other.is_source))
    }
}

impl PartialOrd for ExistenceRequest {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// `edge` exists `count` times from the viewpoint of swap `sid`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
pub(crate) struct ExistenceAnswer {
    pub sid: u64,
    pub edge: Edge,
    pub count: i64,
}

/// Once swap `from_sid` has decided, it forwards its view of `edge` to swap
/// `to_sid`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, bincode::Encode, bincode::Decode,
)]
pub(crate) struct ExistenceSuccessor {
    pub from_sid: u64,
    pub edge: Edge,
    pub to_sid: u64,
}

/// Merge sorted existence requests with the sorted edge vector.
///
/// Answers are always emitted for the earliest querying swap of an edge that
/// anyone queries as a target, even when the count is zero; consumers treat
/// missing entries as zero anyway, so release and debug builds behave the
/// same.
pub(crate) fn scan_existence<Q, E, FA, FS>(
    queries: Q,
    edges: E,
    mut on_answer: FA,
    mut on_successor: FS,
) -> Result<()>
where
    Q: Iterator<Item = ExistenceRequest>,
    E: Iterator<Item = Edge>,
    FA: FnMut(ExistenceAnswer) -> Result<()>,
    FS: FnMut(ExistenceSuccessor) -> Result<()>,
{
    let mut reader = edges.peekable();
    let mut queries = queries.peekable();

    while let Some(&query) = queries.peek() {
        match reader.peek() {
            Some(&edge) if edge < query.edge => {
                reader.next();
                continue;
            }
            _ => {}
        }

        // count occurrences of the queried edge in the vector
        let mut num_found = 0i64;
        while reader.peek() == Some(&query.edge) {
            num_found += 1;
            reader.next();
        }

        // walk all queries for this edge; swap ids descend
        let mut last = query;
        let mut found_target = false;

        while let Some(&cur) = queries.peek() {
            if cur.edge != query.edge {
                break;
            }

            if cur.sid != last.sid && found_target {
                // a later swap needs this edge as a target, so the earlier
                // swap must forward its view once it has decided
                on_successor(ExistenceSuccessor {
                    from_sid: cur.sid,
                    edge: last.edge,
                    to_sid: last.sid,
                })?;
            }

            last = cur;
            found_target = found_target || !cur.is_source;
            queries.next();
        }

        if found_target {
            on_answer(ExistenceAnswer {
                sid: last.sid,
                edge: last.edge,
                count: num_found,
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(
        mut queries: Vec<ExistenceRequest>,
        edges: Vec<Edge>,
    ) -> (Vec<ExistenceAnswer>, Vec<ExistenceSuccessor>) {
        queries.sort_unstable();

        let mut answers = Vec::new();
        let mut successors = Vec::new();

        scan_existence(
            queries.into_iter(),
            edges.into_iter(),
            |a| {
                answers.push(a);
                Ok(())
            },
            |s| {
                successors.push(s);
                Ok(())
            },
        )
        .unwrap();

        (answers, successors)
    }

    #[test]
    fn request_order_is_edge_major_sid_descending() {
        let mut requests = vec![
            ExistenceRequest {
                edge: Edge::new(0, 1),
                sid: 0,
                is_source: true,
            },
            ExistenceRequest {
                edge: Edge::new(0, 1),
                sid: 2,
                is_source: false,
            },
            ExistenceRequest {
                edge: Edge::new(0, 0),
                sid: 1,
                is_source: false,
            },
        ];
        requests.sort_unstable();

        assert_eq!(requests[0].edge, Edge::new(0, 0));
        assert_eq!(requests[1].sid, 2);
        assert_eq!(requests[2].sid, 0);
    }

    #[test]
    fn answer_goes_to_earliest_and_chain_links_consumers() {
        let edge = Edge::new(2, 3);

        let (answers, successors) = scan(
            vec![
                ExistenceRequest {
                    edge,
                    sid: 5,
                    is_source: false,
                },
                ExistenceRequest {
                    edge,
                    sid: 1,
                    is_source: true,
                },
                ExistenceRequest {
                    edge,
                    sid: 3,
                    is_source: true,
                },
            ],
            vec![Edge::new(0, 1), edge, Edge::new(4, 5)],
        );

        assert_eq!(
            answers,
            vec![ExistenceAnswer {
                sid: 1,
                edge,
                count: 1
            }]
        );
        assert_eq!(
            successors,
            vec![
                ExistenceSuccessor {
                    from_sid: 3,
                    edge,
                    to_sid: 5
                },
                ExistenceSuccessor {
                    from_sid: 1,
                    edge,
                    to_sid: 3
                },
            ]
        );
    }

    #[test]
    fn source_only_edges_produce_nothing() {
        let (answers, successors) = scan(
            vec![
                ExistenceRequest {
                    edge: Edge::new(0, 1),
                    sid: 0,
                    is_source: true,
                },
                ExistenceRequest {
                    edge: Edge::new(0, 1),
                    sid: 4,
                    is_source: true,
                },
            ],
            vec![Edge::new(0, 1)],
        );

        assert!(answers.is_empty());
        assert!(successors.is_empty());
    }

    #[test]
    fn absent_target_still_gets_zero_answer() {
        let edge = Edge::new(7, 9);

        let (answers, _) = scan(
            vec![ExistenceRequest {
                edge,
                sid: 2,
                is_source: false,
            }],
            vec![Edge::new(0, 1)],
        );

        assert_eq!(
            answers,
            vec![ExistenceAnswer {
                sid: 2,
                edge,
                count: 0
            }]
        );
    }

    #[test]
    fn multigraph_counts() {
        let edge = Edge::new(1, 2);

        let (answers, _) = scan(
            vec![ExistenceRequest {
                edge,
                sid: 0,
                is_source: false,
            }],
            vec![edge, edge, Edge::new(3, 4)],
        );

        assert_eq!(answers[0].count, 2);
    }
}
