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

//! Edge-swap engines and their supporting machinery.
//!
//! Two engines share one swap semantics and one existence-query protocol:
//! [`InternalEdgeSwaps`] keeps batch state in RAM, [`TfpEdgeSwaps`] streams
//! everything. For identical inputs they produce identical edge vectors and
//! identical result logs.

pub mod descriptor;
pub mod existence;
pub mod internal;
pub(crate) mod messages;
pub mod result_log;
pub mod source;
pub mod tfp;

pub use descriptor::{Swap, SwapResult, INVALID_EDGE_ID};
pub use existence::ExistenceInfo;
pub use internal::InternalEdgeSwaps;
pub use result_log::ResultLog;
pub use source::{RandomSwaps, RepairSwaps};
pub use tfp::TfpEdgeSwaps;
