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

//! Per-thread PQ+sorter mergers with buffered cross-thread delivery.
//!
//! Each worker owns a sorter (for records known before the read phase) and a
//! priority queue (for records produced during it), merged into one monotone
//! stream. A worker never touches another worker's queue directly: records
//! addressed to a different worker go into a local per-target buffer, and all
//! buffers are flushed into the target queues in a coordinated phase while no
//! worker is reading.
//!
//! Usage cycle:
//!
//! 1. `workers()` hands each thread its [`MergerWorker`].
//! 2. Threads fill sorters (`push_sorter`) and stage cross-thread records
//!    (`push_to`), then call `finish_sorter_input`.
//! 3. The coordinator calls [`ParallelBufferedPqMerger::flush`] on the
//!    collected workers.
//! 4. Threads drain their streams (`peek`/`pop`), staging further records
//!    for the next flush.

use crate::external_pq::ExternalPq;
use crate::external_sort::{ExternalSorter, PushSorter, SortedIterator};
use crate::pipeline::PqSorterMerger;
use crate::Result;

pub struct ParallelBufferedPqMerger;

impl ParallelBufferedPqMerger {
    pub fn workers<T>(
        num_threads: usize,
        sorter_chunk: usize,
        pq_capacity: usize,
    ) -> Result<Vec<MergerWorker<T>>>
    where
        T: bincode::Encode + bincode::Decode<()> + Ord,
    {
        (0..num_threads)
            .map(|tid| {
                Ok(MergerWorker {
                    tid,
                    pq_capacity,
                    sorter: Some(
                        ExternalSorter::new()
                            .with_chunk_size(sorter_chunk)
                            .pusher()?,
                    ),
                    merger: None,
                    staged: (0..num_threads).map(|_| Vec::new()).collect(),
                })
            })
            .collect()
    }

    /// Move every staged record into its target worker's queue. Must not
    /// run concurrently with workers reading their streams.
    pub fn flush<T>(workers: &mut [MergerWorker<T>]) -> Result<()>
    where
        T: bincode::Encode + bincode::Decode<()> + Ord,
    {
        let num_threads = workers.len();

        for source in 0..num_threads {
            for target in 0..num_threads {
                let staged = std::mem::take(&mut workers[source].staged[target]);

                for item in staged {
                    workers[target]
                        .merger
                        .as_mut()
                        .expect("flush happens after finish_sorter_input")
                        .push(item)?;
                }
            }
        }

        Ok(())
    }
}

pub struct MergerWorker<T> {
    tid: usize,
    pq_capacity: usize,
    sorter: Option<PushSorter<T>>,
    merger: Option<PqSorterMerger<T>>,
    staged: Vec<Vec<T>>,
}

impl<T> MergerWorker<T>
where
    T: bincode::Encode + bincode::Decode<()> + Ord,
{
    pub fn tid(&self) -> usize {
        self.tid
    }

    /// Record known ahead of the read phase, for this worker's own stream.
    pub fn push_sorter(&mut self, item: T) -> Result<()> {
        self.sorter
            .as_mut()
            .expect("sorter input is open")
            .push(item)
    }

    /// Sort the offline records and open the merged stream.
    pub fn finish_sorter_input(&mut self) -> Result<()> {
        let sorter = self.sorter.take().expect("sorter input is open");

        self.merger = Some(PqSorterMerger::new(
            ExternalPq::new(self.pq_capacity)?,
            sorter.sort()?,
        ));

        Ok(())
    }

    /// Stage a record for `target`'s stream; delivered at the next flush.
    pub fn push_to(&mut self, target: usize, item: T) {
        self.staged[target].push(item);
    }

    pub fn is_empty(&self) -> bool {
        self.merger
            .as_ref()
            .map_or(true, PqSorterMerger::is_empty)
    }

    pub fn peek(&self) -> Option<&T> {
        self.merger.as_ref().and_then(PqSorterMerger::peek)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.merger.as_mut().and_then(PqSorterMerger::pop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Record = (i64, i64);

    #[test]
    fn cross_thread_records_arrive_sorted() {
        let num_threads = 4usize;
        let num_records = 10_000i64;

        let mut workers: Vec<MergerWorker<Record>> =
            ParallelBufferedPqMerger::workers(num_threads, 256, 128).unwrap();

        std::thread::scope(|scope| {
            let mut handles = Vec::new();

            for mut worker in workers.drain(..) {
                handles.push(scope.spawn(move || {
                    let tid = worker.tid() as i64;

                    for i in 0..num_threads as i64 {
                        worker.push_sorter((tid, i)).unwrap();
                    }
                    worker.finish_sorter_input().unwrap();

                    for i in num_threads as i64..num_records {
                        worker.push_to(i as usize % num_threads, (i, tid));
                    }

                    worker
                }));
            }

            workers = handles.into_iter().map(|h| h.join().unwrap()).collect();
        });

        ParallelBufferedPqMerger::flush(&mut workers).unwrap();

        std::thread::scope(|scope| {
            for mut worker in workers.drain(..) {
                scope.spawn(move || {
                    let tid = worker.tid() as i64;

                    for i in 0..num_records {
                        if i % num_threads as i64 != tid {
                            assert!(worker.peek().map_or(true, |&(first, _)| first > i));
                        } else {
                            for t in 0..num_threads as i64 {
                                assert_eq!(worker.pop(), Some((i, t)));
                            }
                        }
                    }

                    assert!(worker.is_empty());
                });
            }
        });
    }
}
