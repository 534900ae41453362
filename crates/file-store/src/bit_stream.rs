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

//! Append-only stream of booleans packed into 64-bit words.
//!
//! Bits are buffered in a word accumulator and spilled to a temp file one
//! block of words at a time, so the stream never holds more than a block in
//! RAM. Writing and reading are separate type states: [`BitStream`] only
//! accepts `push`, and [`BitStream::consume`] flushes the partial word
//! (left-aligned, zero-padded) and hands out the single-pass
//! [`BitStreamReader`] which yields bits MSB-first.

use std::io::Write;

use crate::iterable::ConstIterableStoreReader;
use crate::temp::{TempDir, TempFile};
use crate::Result;

const WORD_BITS: u32 = u64::BITS;
const MSB: u64 = 1 << (WORD_BITS - 1);

/// Words buffered in RAM before they are spilled to the backing file.
const BLOCK_WORDS: usize = 1 << 16;

pub struct BitStream {
    file: TempFile,
    block: Vec<u64>,
    word: u64,
    bits_in_word: u32,
    num_bits: u64,
}

impl BitStream {
    pub fn new(dir: &TempDir) -> Result<Self> {
        Ok(Self {
            file: TempFile::new(dir)?,
            block: Vec::with_capacity(BLOCK_WORDS),
            word: 0,
            bits_in_word: 0,
            num_bits: 0,
        })
    }

    pub fn push(&mut self, bit: bool) -> Result<()> {
        self.word = (self.word << 1) | u64::from(bit);
        self.bits_in_word += 1;
        self.num_bits += 1;

        if self.bits_in_word == WORD_BITS {
            self.push_word(self.word)?;
            self.word = 0;
            self.bits_in_word = 0;
        }

        Ok(())
    }

    /// Number of bits pushed so far.
    pub fn len(&self) -> u64 {
        self.num_bits
    }

    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Flush buffered state and switch to the read side.
    pub fn consume(mut self) -> Result<BitStreamReader> {
        if self.bits_in_word > 0 {
            let word = self.word << (WORD_BITS - self.bits_in_word);
            self.push_word(word)?;
        }

        self.flush_block()?;
        self.file.flush()?;

        let words = ConstIterableStoreReader::open(self.file.path())?;

        Ok(BitStreamReader {
            _file: self.file,
            words,
            next_word: 0,
            word: 0,
            bits_in_word: 0,
            remaining: self.num_bits,
        })
    }

    fn push_word(&mut self, word: u64) -> Result<()> {
        self.block.push(word);

        if self.block.len() == BLOCK_WORDS {
            self.flush_block()?;
        }

        Ok(())
    }

    fn flush_block(&mut self) -> Result<()> {
        let mut bytes = Vec::with_capacity(self.block.len() * 8);
        for word in self.block.drain(..) {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        self.file.write_all(&bytes)?;

        Ok(())
    }
}

pub struct BitStreamReader {
    _file: TempFile,
    words: ConstIterableStoreReader<u64>,
    next_word: u64,
    word: u64,
    bits_in_word: u32,
    remaining: u64,
}

impl BitStreamReader {
    /// Number of bits not yet read.
    pub fn len(&self) -> u64 {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }
}

impl Iterator for BitStreamReader {
    type Item = bool;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        if self.bits_in_word == 0 {
            self.word = self
                .words
                .get(self.next_word)
                .expect("bit stream file shorter than its bit count");
            self.next_word += 1;
            self.bits_in_word = WORD_BITS;
        }

        let bit = self.word & MSB != 0;
        self.word <<= 1;
        self.bits_in_word -= 1;
        self.remaining -= 1;

        Some(bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(bits: &[bool]) {
        let dir = TempDir::new().unwrap();
        let mut stream = BitStream::new(&dir).unwrap();

        for &b in bits {
            stream.push(b).unwrap();
        }
        assert_eq!(stream.len(), bits.len() as u64);

        let read: Vec<bool> = stream.consume().unwrap().collect();
        assert_eq!(read, bits);
    }

    #[test]
    fn empty() {
        roundtrip(&[]);
    }

    #[test]
    fn partial_word() {
        roundtrip(&[true, false, true]);
    }

    #[test]
    fn across_word_boundaries() {
        let bits: Vec<bool> = (0..1000).map(|i| i % 3 == 0).collect();
        roundtrip(&bits);
    }

    #[test]
    fn across_block_boundaries() {
        let bits: Vec<bool> = (0..(BLOCK_WORDS * 64 + 17)).map(|i| i % 7 < 3).collect();
        roundtrip(&bits);
    }
}
