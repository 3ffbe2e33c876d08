//! [IB (Byte Index)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/7d53d413-b492-4483-b624-4e2fa2a08cf3)
//! and [BREF](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/844a5ebf-488a-45fd-8fce-92a84d8e24a3)

use std::{
    fmt::Debug,
    io::{self, Read},
};

use super::{block_id::BlockId, header::NdbVersion};

/// An absolute file offset.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteIndex(u64);

impl ByteIndex {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn read(f: &mut dyn Read, version: NdbVersion) -> io::Result<Self> {
        version.read_id(f).map(Self)
    }
}

impl Debug for ByteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteIndex {{ 0x{:X} }}", self.0)
    }
}

impl From<u64> for ByteIndex {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ByteIndex> for u64 {
    fn from(value: ByteIndex) -> Self {
        value.0
    }
}

/// A `BREF`: a block or page id together with the file offset where it is stored.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct BlockRef {
    block: BlockId,
    index: ByteIndex,
}

impl BlockRef {
    pub fn new(block: BlockId, index: ByteIndex) -> Self {
        Self { block, index }
    }

    pub fn read(f: &mut dyn Read, version: NdbVersion) -> io::Result<Self> {
        let block = BlockId::read(f, version)?;
        let index = ByteIndex::read(f, version)?;
        Ok(Self { block, index })
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn index(&self) -> ByteIndex {
        self.index
    }
}
