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

//! Initial graph construction: degree sequences, Havel–Hakimi
//! materialization and the randomization driver.

pub mod havel_hakimi;
pub mod powerlaw;
pub mod randomize;

pub use havel_hakimi::havel_hakimi;
pub use powerlaw::PowerlawSequence;
pub use randomize::{make_simple, randomize, Engine};
