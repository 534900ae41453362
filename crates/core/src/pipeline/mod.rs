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

//! Building blocks for composing streaming operators, sequentially on one
//! thread or asynchronously across threads with bounded buffers.

pub mod async_pusher;
pub mod async_stream;
pub mod parallel_pq_merger;
pub mod pq_merger;

pub use async_pusher::AsyncPusher;
pub use async_stream::AsyncStream;
pub use parallel_pq_merger::ParallelBufferedPqMerger;
pub use pq_merger::PqSorterMerger;

use crate::Result;

/// Anything records can be pushed into.
pub trait Sink<T> {
    fn push(&mut self, item: T) -> Result<()>;
}

impl<T> Sink<T> for crate::external_sort::PushSorter<T>
where
    T: bincode::Encode + bincode::Decode<()> + Ord,
{
    fn push(&mut self, item: T) -> Result<()> {
        crate::external_sort::PushSorter::push(self, item)
    }
}

impl<T> Sink<T> for Vec<T> {
    fn push(&mut self, item: T) -> Result<()> {
        Vec::push(self, item);
        Ok(())
    }
}
