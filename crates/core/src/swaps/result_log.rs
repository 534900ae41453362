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

//! Append-only audit log of swap outcomes, indexed by swap id.

use std::fs::File;
use std::path::Path;

use file_store::iterable::{IterableStoreReader, IterableStoreWriter};

use crate::swaps::SwapResult;
use crate::Result;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResultLog {
    results: Vec<SwapResult>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: SwapResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, swap_id: usize) -> Option<&SwapResult> {
        self.results.get(swap_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SwapResult> {
        self.results.iter()
    }

    pub fn num_performed(&self) -> usize {
        self.results.iter().filter(|r| r.performed).count()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = IterableStoreWriter::new(File::create(path)?);

        for result in &self.results {
            writer.write(result)?;
        }

        writer.finalize()?;

        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let results = IterableStoreReader::open(path)?.collect();

        Ok(Self { results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use file_store::temp::{TempDir, TempFile};

    #[test]
    fn file_roundtrip() {
        let mut log = ResultLog::new();

        log.push(SwapResult {
            edges: [Edge::new(0, 1), Edge::new(2, 3)],
            loop_detected: false,
            conflict_detected: [false, true],
            performed: false,
        });
        log.push(SwapResult::skipped());

        let dir = TempDir::new().unwrap();
        let file = TempFile::new(&dir).unwrap();

        log.save(file.path()).unwrap();
        let loaded = ResultLog::load(file.path()).unwrap();

        assert_eq!(loaded, log);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.num_performed(), 0);
    }
}
