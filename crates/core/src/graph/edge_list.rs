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

//! Disk-backed edge containers.
//!
//! [`EdgeVec`] is the indexed representation the swap engines operate on:
//! random access by edge id, a bulk in-order reader, and rewrite by full
//! rebuild. [`EdgeStream`] is the append-only representation used when the
//! producer cannot guarantee order.

use std::fs::File;

use file_store::iterable::{
    ConstIterableStoreIter, ConstIterableStoreReader, ConstIterableStoreWriter,
};
use file_store::temp::{TempDir, TempFile};

use crate::external_sort::ExternalSorter;
use crate::graph::{Edge, EdgeId};
use crate::{Error, Result};

/// Sorted, randomly accessible edge vector.
pub struct EdgeVec {
    dir: TempDir,
    // kept for its lifetime only; `reader` maps the same file
    _file: TempFile,
    reader: ConstIterableStoreReader<Edge>,
}

impl EdgeVec {
    /// Materialize a sorted vector from an arbitrary edge iterator.
    pub fn from_edges<I>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = Edge>,
    {
        let sorted = ExternalSorter::new().sort(edges)?;

        Self::from_sorted_edges(sorted)
    }

    /// Materialize from edges that are already in ascending order.
    pub fn from_sorted_edges<I>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = Edge>,
    {
        let dir = TempDir::new()?;
        let mut file = TempFile::new(&dir)?;

        let mut writer = ConstIterableStoreWriter::new(file.inner_mut().try_clone()?);
        for edge in edges {
            writer.write(&edge)?;
        }
        writer.finalize()?;

        let reader = ConstIterableStoreReader::open(file.path())?;

        Ok(Self {
            dir,
            _file: file,
            reader,
        })
    }

    pub fn len(&self) -> u64 {
        self.reader.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    pub fn get(&self, id: EdgeId) -> Option<Edge> {
        self.reader.get(id)
    }

    /// Bulk reader over the vector in id (= ascending edge) order.
    pub fn iter(&self) -> ConstIterableStoreIter<'_, Edge> {
        self.reader.iter()
    }

    /// Id of some occurrence of `edge`, if present. Requires sortedness.
    pub fn find(&self, edge: Edge) -> Option<EdgeId> {
        let mut lo = 0u64;
        let mut hi = self.len();

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let probe = self.get(mid).expect("mid is in range");

            if probe < edge {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        (lo < self.len() && self.get(lo) == Some(edge)).then_some(lo)
    }

    pub fn to_vec(&self) -> Vec<Edge> {
        self.iter().collect()
    }

    /// Verify the sorted-simple invariant.
    pub fn check_sorted_simple(&self) -> Result<()> {
        let mut prev: Option<Edge> = None;

        for (id, edge) in self.iter().enumerate() {
            if edge.is_loop() {
                return Err(Error::invariant(
                    "edge-vector",
                    format!("loop {edge} at id {id}"),
                ));
            }

            if let Some(prev) = prev {
                if prev == edge {
                    return Err(Error::invariant(
                        "edge-vector",
                        format!("parallel edge {edge} at id {id}"),
                    ));
                }
                if prev > edge {
                    return Err(Error::invariant(
                        "edge-vector",
                        format!("unsorted at id {id}: {prev} > {edge}"),
                    ));
                }
            }

            prev = Some(edge);
        }

        Ok(())
    }

    /// Open a write handle for a rebuilt vector. The current contents stay
    /// readable until [`EdgeVec::commit_rewrite`] swaps the new file in.
    pub(crate) fn begin_rewrite(&self) -> Result<EdgeVecWriter> {
        let mut file = TempFile::new(&self.dir)?;
        let writer = ConstIterableStoreWriter::new(file.inner_mut().try_clone()?);

        Ok(EdgeVecWriter { file, writer })
    }

    pub(crate) fn commit_rewrite(&mut self, writer: EdgeVecWriter) -> Result<()> {
        let EdgeVecWriter { file, writer } = writer;
        writer.finalize()?;

        let reader = ConstIterableStoreReader::open(file.path())?;

        self._file = file;
        self.reader = reader;

        Ok(())
    }
}

pub(crate) struct EdgeVecWriter {
    file: TempFile,
    writer: ConstIterableStoreWriter<Edge, File>,
}

impl EdgeVecWriter {
    pub(crate) fn push(&mut self, edge: Edge) -> Result<()> {
        self.writer.write(&edge)?;

        Ok(())
    }

    pub(crate) fn len(&self) -> u64 {
        self.writer.num_items()
    }
}

/// Append-only edge sequence: `push` while writing, `rewind` to read.
pub struct EdgeStream {
    _dir: TempDir,
    file: TempFile,
    writer: Option<ConstIterableStoreWriter<Edge, File>>,
    reader: Option<ConstIterableStoreReader<Edge>>,
    len: u64,
}

impl EdgeStream {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let mut file = TempFile::new(&dir)?;
        let writer = ConstIterableStoreWriter::new(file.inner_mut().try_clone()?);

        Ok(Self {
            _dir: dir,
            file,
            writer: Some(writer),
            reader: None,
            len: 0,
        })
    }

    pub fn push(&mut self, edge: Edge) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::invariant("edge-stream", "push after rewind"))?;

        writer.write(&edge)?;
        self.len += 1;

        Ok(())
    }

    /// Switch to (or restart) reading.
    pub fn rewind(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }

        self.reader = Some(ConstIterableStoreReader::open(self.file.path())?);

        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> Result<ConstIterableStoreIter<'_, Edge>> {
        self.reader
            .as_ref()
            .map(|r| r.iter())
            .ok_or_else(|| Error::invariant("edge-stream", "read before rewind"))
    }
}
