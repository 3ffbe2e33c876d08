//! [BID (Block ID)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/d3155aa1-ccdd-4dee-a0a9-5363ccca5352)

use std::{
    fmt::Debug,
    io::{self, Read},
};

use super::header::NdbVersion;

/// A `BID`. ANSI files store 32 bits and Unicode files 64 bits; both widen to `u64` here.
///
/// Bit 0 is reserved and bit 1 marks an internal block (`XBLOCK`, `XXBLOCK`, `SLBLOCK`,
/// `SIBLOCK`), which is never encoded.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u64);

impl BlockId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn read(f: &mut dyn Read, version: NdbVersion) -> io::Result<Self> {
        version.read_id(f).map(Self)
    }

    pub fn is_internal(&self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn index(&self) -> u64 {
        self.0 >> 2
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// The key this block is stored under in the BBT, with the reserved bit cleared.
    pub fn search_key(&self) -> Self {
        Self(self.0 & !0x01)
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_internal() {
            "Internal"
        } else {
            "External"
        };
        write!(f, "BlockId {{ {kind}: 0x{:X} }}", self.index())
    }
}

impl From<u64> for BlockId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<BlockId> for u64 {
    fn from(value: BlockId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_internal_bit() {
        assert!(!BlockId::new(0x04).is_internal());
        assert!(BlockId::new(0x06).is_internal());
        assert_eq!(BlockId::new(0x06).index(), 1);
    }

    #[test]
    fn test_search_key_clears_reserved_bit() {
        assert_eq!(BlockId::new(0x25).search_key(), BlockId::new(0x24));
        assert_eq!(BlockId::new(0x26).search_key(), BlockId::new(0x26));
    }

    #[test]
    fn test_read_width() {
        let data = [0x08, 0, 0, 0, 0x01, 0, 0, 0];
        let ansi = BlockId::read(&mut Cursor::new(&data), NdbVersion::Ansi).unwrap();
        assert_eq!(u64::from(ansi), 0x08);
        let unicode = BlockId::read(&mut Cursor::new(&data), NdbVersion::Unicode).unwrap();
        assert_eq!(u64::from(unicode), 0x1_0000_0008);
    }
}
