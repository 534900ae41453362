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

//! Partition files: a packed sequence of `(node, partition)` pairs of 32-bit
//! unsigned integers in native byte order.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::{Error, Result};

pub fn write_partition<I, P>(pairs: I, path: P) -> Result<()>
where
    I: IntoIterator<Item = (u32, u32)>,
    P: AsRef<Path>,
{
    let mut out = BufWriter::new(File::create(path)?);

    for (node, partition) in pairs {
        out.write_all(&node.to_ne_bytes())?;
        out.write_all(&partition.to_ne_bytes())?;
    }

    out.flush()?;

    Ok(())
}

pub fn read_partition<P: AsRef<Path>>(path: P) -> Result<Vec<(u32, u32)>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;

    if bytes.len() % 8 != 0 {
        return Err(Error::InvalidInput(
            "partition file is not a sequence of u32 pairs".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            (
                u32::from_ne_bytes(chunk[..4].try_into().expect("chunk of 8")),
                u32::from_ne_bytes(chunk[4..].try_into().expect("chunk of 8")),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use file_store::temp::{TempDir, TempFile};

    #[test]
    fn roundtrip() {
        let pairs = vec![(0u32, 3u32), (1, 1), (2, 0), (3, 3)];

        let dir = TempDir::new().unwrap();
        let file = TempFile::new(&dir).unwrap();

        write_partition(pairs.clone(), file.path()).unwrap();
        assert_eq!(read_partition(file.path()).unwrap(), pairs);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = TempFile::new(&dir).unwrap();

        std::fs::write(file.path(), [1, 2, 3]).unwrap();
        assert!(read_partition(file.path()).is_err());
    }
}
