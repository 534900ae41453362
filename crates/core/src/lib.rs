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

//! Generation and uniform randomization of massive simple graphs.
//!
//! The crate materializes a graph from a prescribed degree sequence and then
//! randomizes it with long sequences of 2-edge swaps. The edge list lives in
//! external memory throughout; all heavy lifting is done by sorting and
//! merging streams instead of random access.

use thiserror::Error;

pub mod external_pq;
pub mod external_sort;
pub mod formats;
pub mod gen;
pub mod graph;
pub mod pipeline;
pub mod sampling;
pub mod swaps;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invariant violation in {phase}: {message}")]
    InvariantViolation {
        phase: &'static str,
        message: String,
    },

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("overflow: {0}")]
    Overflow(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn invariant(phase: &'static str, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            phase,
            message: message.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Default chunk size (in records) for external sorters.
pub const SORTER_CHUNK: usize = 1 << 20;

/// Default number of swaps processed per streamed run.
pub const RUN_LENGTH: u64 = 1_000_000;
