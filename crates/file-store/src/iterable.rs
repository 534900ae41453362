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

//! Simple on-disk formats for sequences of items that are read back in order.
//!
//! Two flavors are provided:
//!
//! 1. `IterableStoreWriter`/`IterableStoreReader` store bincode-encoded items,
//!    each prefixed by a 64-bit little-endian byte length.
//! 2. `ConstIterableStoreWriter`/`ConstIterableStoreReader` store items that
//!    implement [`ConstSerializable`] back to back without headers, which
//!    additionally allows random access by item index.

use crate::{ConstSerializable, Result};
use memmap2::Mmap;
use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

struct IterableHeader {
    num_upcoming_bytes: u64,
}

impl IterableHeader {
    #[inline]
    const fn serialized_size() -> usize {
        std::mem::size_of::<u64>()
    }

    fn serialize<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: io::Write,
    {
        writer.write_all(&self.num_upcoming_bytes.to_le_bytes())
    }

    fn deserialize(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() != Self::serialized_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Invalid number of bytes for IterableHeader",
            ));
        }

        Ok(IterableHeader {
            num_upcoming_bytes: u64::from_le_bytes(bytes[..8].try_into().unwrap()),
        })
    }
}

pub struct IterableStoreWriter<T, W>
where
    W: io::Write,
{
    writer: io::BufWriter<W>,
    num_items: u64,
    _marker: std::marker::PhantomData<T>,
}

impl<T, W> IterableStoreWriter<T, W>
where
    W: io::Write,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: io::BufWriter::new(writer),
            num_items: 0,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn num_items(&self) -> u64 {
        self.num_items
    }
}

impl<T, W> IterableStoreWriter<T, W>
where
    T: bincode::Encode,
    W: io::Write,
{
    pub fn write(&mut self, item: &T) -> Result<()> {
        let serialized = bincode::encode_to_vec(item, common::bincode_config())?;
        let header = IterableHeader {
            num_upcoming_bytes: serialized.len() as u64,
        };
        header.serialize(&mut self.writer)?;
        self.writer.write_all(&serialized)?;
        self.num_items += 1;

        Ok(())
    }

    pub fn finalize(mut self) -> Result<W> {
        self.writer.flush()?;

        self.writer.into_inner().map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Memory-mapped bytes of a store file. An empty file maps to an empty slice.
struct StoreBytes {
    mmap: Option<Mmap>,
}

impl StoreBytes {
    fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let mmap = if len == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Self { mmap })
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }
}

pub struct IterableStoreReader<T> {
    data: StoreBytes,
    offset: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T> IterableStoreReader<T> {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self {
            data: StoreBytes::open(path)?,
            offset: 0,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<T> Iterator for IterableStoreReader<T>
where
    T: bincode::Decode<()>,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data.bytes();

        if self.offset + IterableHeader::serialized_size() > data.len() {
            return None;
        }

        let header_bytes = &data[self.offset..self.offset + IterableHeader::serialized_size()];
        let header = IterableHeader::deserialize(header_bytes).ok()?;

        self.offset += IterableHeader::serialized_size();
        let serialized = &data[self.offset..self.offset + header.num_upcoming_bytes as usize];

        self.offset += header.num_upcoming_bytes as usize;
        let (item, _) = bincode::decode_from_slice(serialized, common::bincode_config()).ok()?;

        Some(item)
    }
}

pub struct ConstIterableStoreWriter<T, W>
where
    W: io::Write,
{
    writer: io::BufWriter<W>,
    buf: Vec<u8>,
    num_items: u64,
    _marker: std::marker::PhantomData<T>,
}

impl<T, W> ConstIterableStoreWriter<T, W>
where
    T: ConstSerializable,
    W: io::Write,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: io::BufWriter::new(writer),
            buf: Vec::with_capacity(T::BYTES),
            num_items: 0,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn write(&mut self, item: &T) -> Result<()> {
        self.buf.clear();
        item.serialize(&mut self.buf);
        self.writer.write_all(&self.buf)?;
        self.num_items += 1;

        Ok(())
    }

    pub fn num_items(&self) -> u64 {
        self.num_items
    }

    pub fn finalize(mut self) -> Result<W> {
        self.writer.flush()?;

        self.writer.into_inner().map_err(|e| anyhow::anyhow!("{e}"))
    }
}

pub struct ConstIterableStoreReader<T> {
    data: StoreBytes,
    _marker: std::marker::PhantomData<T>,
}

impl<T> ConstIterableStoreReader<T>
where
    T: ConstSerializable,
{
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = StoreBytes::open(path)?;

        if data.bytes().len() % T::BYTES != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "store size is not a multiple of the record size",
            ));
        }

        Ok(Self {
            data,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn len(&self) -> u64 {
        (self.data.bytes().len() / T::BYTES) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: u64) -> Option<T> {
        let start = (index as usize).checked_mul(T::BYTES)?;
        let bytes = self.data.bytes().get(start..start + T::BYTES)?;

        Some(T::deserialize(bytes))
    }

    pub fn iter(&self) -> ConstIterableStoreIter<'_, T> {
        ConstIterableStoreIter {
            reader: self,
            index: 0,
        }
    }
}

pub struct ConstIterableStoreIter<'a, T> {
    reader: &'a ConstIterableStoreReader<T>,
    index: u64,
}

impl<T> Iterator for ConstIterableStoreIter<'_, T>
where
    T: ConstSerializable,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.reader.get(self.index)?;
        self.index += 1;

        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temp::{TempDir, TempFile};

    #[test]
    fn bincode_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut file = TempFile::new(&dir).unwrap();

        let mut writer = IterableStoreWriter::new(file.inner_mut());
        for i in 0u64..100 {
            writer.write(&(i, i * 2)).unwrap();
        }
        writer.finalize().unwrap();

        let read: Vec<(u64, u64)> = IterableStoreReader::open(file.path()).unwrap().collect();
        assert_eq!(read.len(), 100);
        assert_eq!(read[7], (7, 14));
    }

    #[test]
    fn const_records_random_access() {
        let dir = TempDir::new().unwrap();
        let mut file = TempFile::new(&dir).unwrap();

        let mut writer = ConstIterableStoreWriter::new(file.inner_mut());
        for i in 0i32..10 {
            writer.write(&(i, -i)).unwrap();
        }
        assert_eq!(writer.num_items(), 10);
        writer.finalize().unwrap();

        let reader: ConstIterableStoreReader<(i32, i32)> =
            ConstIterableStoreReader::open(file.path()).unwrap();

        assert_eq!(reader.len(), 10);
        assert_eq!(reader.get(3), Some((3, -3)));
        assert_eq!(reader.get(10), None);
        assert_eq!(reader.iter().count(), 10);
    }

    #[test]
    fn empty_store() {
        let dir = TempDir::new().unwrap();
        let file = TempFile::new(&dir).unwrap();

        let reader: ConstIterableStoreReader<(i32, i32)> =
            ConstIterableStoreReader::open(file.path()).unwrap();
        assert!(reader.is_empty());
    }
}
