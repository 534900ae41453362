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

//! Thrill-compatible binary edge lists.
//!
//! One record per source node `u` in increasing order: the varint-encoded
//! `deg(u)` followed by `deg(u)` neighbor ids as 32-bit little-endian
//! values. Varints carry 7 payload bits per byte, the high bit flags a
//! continuation, and a 64-bit value takes at most 10 bytes.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::graph::{Edge, Node};
use crate::{Error, Result};

pub fn put_varint<W: Write>(writer: &mut W, mut value: u64) -> io::Result<()> {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;

        if value == 0 {
            return writer.write_all(&[byte]);
        }

        writer.write_all(&[byte | 0x80])?;
    }
}

pub fn get_varint<R: Read>(reader: &mut R) -> Result<u64> {
    let mut value = 0u64;

    for i in 0..10 {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        let byte = byte[0];

        if i == 9 {
            // the tenth byte may only contribute the final bit
            if byte & 0xFE != 0 {
                return Err(Error::Overflow("varint exceeds 64 bits"));
            }
            value |= u64::from(byte) << 63;
            return Ok(value);
        }

        value |= u64::from(byte & 0x7F) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    unreachable!("loop returns within 10 bytes")
}

/// Write a sorted simple edge list. Every edge is emitted once, under its
/// smaller endpoint.
pub fn write_thrill_binary<I, P>(edges: I, num_nodes: Node, path: P) -> Result<()>
where
    I: IntoIterator<Item = Edge>,
    P: AsRef<Path>,
{
    let mut out = BufWriter::new(File::create(path)?);
    let mut edges = edges.into_iter().peekable();

    let mut neighbors: Vec<Node> = Vec::new();

    for u in 0..num_nodes {
        neighbors.clear();

        while edges.peek().is_some_and(|e| e.u == u) {
            neighbors.push(edges.next().expect("peeked").v);
        }

        put_varint(&mut out, neighbors.len() as u64)?;

        for &v in &neighbors {
            out.write_all(&(v as u32).to_le_bytes())?;
        }
    }

    out.flush()?;

    Ok(())
}

/// Stream edges back out of a Thrill binary file.
pub struct ThrillBinaryReader {
    reader: BufReader<File>,
    node: Node,
    remaining_degree: u64,
    started: bool,
    done: bool,
}

impl ThrillBinaryReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            node: 0,
            remaining_degree: 0,
            started: false,
            done: false,
        })
    }

    fn at_eof(&mut self) -> Result<bool> {
        Ok(self.reader.fill_buf()?.is_empty())
    }
}

impl Iterator for ThrillBinaryReader {
    type Item = Result<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.remaining_degree == 0 {
            match self.at_eof() {
                Ok(true) => {
                    self.done = true;
                    return None;
                }
                Ok(false) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }

            if self.started {
                self.node += 1;
            }
            self.started = true;

            match get_varint(&mut self.reader) {
                Ok(degree) => self.remaining_degree = degree,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        let mut bytes = [0u8; 4];
        if let Err(e) = self.reader.read_exact(&mut bytes) {
            self.done = true;
            return Some(Err(Error::Io(e)));
        }

        self.remaining_degree -= 1;

        Some(Ok(Edge::new(self.node, u32::from_le_bytes(bytes) as Node)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use file_store::temp::{TempDir, TempFile};

    #[test]
    fn varint_roundtrip() {
        for value in [
            0u64,
            1,
            127,
            128,
            16_383,
            16_384,
            u32::MAX as u64,
            u64::MAX - 1,
            u64::MAX,
        ] {
            let mut buf = Vec::new();
            put_varint(&mut buf, value).unwrap();
            assert!(buf.len() <= 10);

            let decoded = get_varint(&mut buf.as_slice()).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn varint_boundary_encodings() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 127).unwrap();
        assert_eq!(buf, vec![0x7F]);

        buf.clear();
        put_varint(&mut buf, 128).unwrap();
        assert_eq!(buf, vec![0x80, 0x01]);

        buf.clear();
        put_varint(&mut buf, u64::MAX).unwrap();
        assert_eq!(buf.len(), 10);
        assert_eq!(buf[9], 0x01);
    }

    #[test]
    fn ten_byte_varint_with_excess_bits_overflows() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02];

        assert!(matches!(
            get_varint(&mut bytes.as_slice()),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn edge_list_roundtrip() {
        let edges = vec![
            Edge::new(0, 1),
            Edge::new(0, 3),
            Edge::new(1, 2),
            Edge::new(3, 4),
        ];

        let dir = TempDir::new().unwrap();
        let file = TempFile::new(&dir).unwrap();

        write_thrill_binary(edges.clone(), 5, file.path()).unwrap();

        let read: Vec<Edge> = ThrillBinaryReader::open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(read, edges);
    }

    #[test]
    fn isolated_nodes_take_one_byte() {
        let dir = TempDir::new().unwrap();
        let file = TempFile::new(&dir).unwrap();

        write_thrill_binary(Vec::new(), 3, file.path()).unwrap();

        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 3);

        let read: Vec<Edge> = ThrillBinaryReader::open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert!(read.is_empty());
    }
}
