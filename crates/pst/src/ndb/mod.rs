//! ## [Node Database (NDB) Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e4efaad0-1876-446e-9d34-bb921588f924)

use std::io;
use thiserror::Error;

pub mod block;
pub mod block_id;
pub mod block_ref;
pub mod header;
pub mod node;
pub mod node_id;
pub mod page;
pub mod sub_node;

use block_id::BlockId;
use node_id::NodeId;
use page::PageType;

#[derive(Error, Debug)]
pub enum NdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to lock PST file")]
    FailedToLockFile,
    #[error("Truncated {0}: need 0x{1:X} bytes, found 0x{2:X}")]
    Truncated(&'static str, usize, usize),
    #[error("Invalid nidType: 0x{0:02X}")]
    InvalidNodeIdType(u8),
    #[error("Invalid nidIndex: 0x{0:08X}")]
    InvalidNodeIndex(u32),
    #[error("Invalid HEADER dwMagic: 0x{0:08X}")]
    InvalidNdbHeaderMagicValue(u32),
    #[error("Invalid HEADER dwCRCPartial: 0x{0:08X}, computed 0x{1:08X}")]
    InvalidNdbHeaderPartialCrc(u32, u32),
    #[error("Invalid HEADER wMagicClient: 0x{0:04X}")]
    InvalidNdbHeaderMagicClientValue(u16),
    #[error("Invalid HEADER wVer: 0x{0:04X}")]
    InvalidNdbVersion(u16),
    #[error("Unsupported HEADER wVer: 0x{0:04X}")]
    UnsupportedNdbVersion(u16),
    #[error("Invalid HEADER dwCRCFull: 0x{0:08X}, computed 0x{1:08X}")]
    InvalidNdbHeaderFullCrc(u32, u32),
    #[error("Invalid HEADER bSentinel: 0x{0:02X}")]
    InvalidNdbHeaderSentinelValue(u8),
    #[error("Invalid HEADER bCryptMethod: 0x{0:02X}")]
    InvalidNdbCryptMethod(u8),
    #[error("Invalid ROOT fAMapValid: 0x{0:02X}")]
    InvalidAmapStatus(u8),
    #[error("Mismatch between PAGETRAILER ptype and ptypeRepeat: (0x{0:02X}, 0x{1:02X})")]
    MismatchPageTypeRepeat(u8, u8),
    #[error("Invalid PAGETRAILER ptype: 0x{0:02X}")]
    InvalidPageType(u8),
    #[error("Unexpected PAGETRAILER ptype: {0:?}")]
    UnexpectedPageType(PageType),
    #[error("Invalid PAGETRAILER dwCRC: 0x{0:08X}, computed 0x{1:08X}")]
    InvalidPageCrc(u32, u32),
    #[error("Invalid PAGETRAILER wSig: 0x{0:04X}, computed 0x{1:04X}")]
    InvalidPageSignature(u16, u16),
    #[error("Mismatch PAGETRAILER bid: {0:?}, expected {1:?}")]
    MismatchPageBlockId(BlockId, BlockId),
    #[error("Invalid BTPAGE cLevel: 0x{0:02X}")]
    InvalidBTreePageLevel(u8),
    #[error("Unexpected BTPAGE cLevel: 0x{0:02X}, expected 0x{1:02X}")]
    UnexpectedBTreePageLevel(u8, u8),
    #[error("Invalid BTPAGE cEnt: {0}")]
    InvalidBTreeEntryCount(usize),
    #[error("Invalid BTPAGE cEntMax: {0}")]
    InvalidBTreeEntryMaxCount(u8),
    #[error("Invalid BTPAGE cbEnt: {0}")]
    InvalidBTreeEntrySize(u8),
    #[error("Node not found in NBT: {0:?}")]
    NodeNotFound(NodeId),
    #[error("Block not found in BBT: {0:?}")]
    BlockNotFound(BlockId),
    #[error("Invalid BBTENTRY cb: 0x{0:04X}")]
    InvalidBlockSize(u16),
    #[error("Mismatch BLOCKTRAILER cb: 0x{0:04X}, expected 0x{1:04X}")]
    MismatchBlockSize(u16, u16),
    #[error("Invalid BLOCKTRAILER dwCRC: 0x{0:08X}, computed 0x{1:08X}")]
    InvalidBlockCrc(u32, u32),
    #[error("Invalid BLOCKTRAILER wSig: 0x{0:04X}, computed 0x{1:04X}")]
    InvalidBlockSignature(u16, u16),
    #[error("Mismatch BLOCKTRAILER bid: {0:?}, expected {1:?}")]
    MismatchBlockId(BlockId, BlockId),
    #[error("Invalid XBLOCK btype: 0x{0:02X}")]
    InvalidInternalBlockType(u8),
    #[error("Invalid XBLOCK cLevel: 0x{0:02X}")]
    InvalidInternalBlockLevel(u8),
    #[error("Invalid XBLOCK cEnt: {0}")]
    InvalidInternalBlockEntryCount(u16),
    #[error("Invalid XBLOCK lcbTotal: 0x{0:08X}, found 0x{1:X}")]
    InvalidInternalBlockTotalSize(u32, usize),
    #[error("Expected an external data block: {0:?}")]
    UnexpectedInternalBlock(BlockId),
    #[error("Expected an XBLOCK or XXBLOCK: {0:?}")]
    UnexpectedExternalBlock(BlockId),
    #[error("Invalid SLBLOCK btype: 0x{0:02X}")]
    InvalidSubNodeBlockType(u8),
    #[error("Invalid SLBLOCK cLevel: 0x{0:02X}")]
    InvalidSubNodeBlockLevel(u8),
    #[error("Invalid SLBLOCK cEnt: {0}")]
    InvalidSubNodeBlockEntryCount(u16),
    #[error("Subnode not found: {0:?}")]
    SubNodeNotFound(NodeId),
}

impl From<NdbError> for io::Error {
    fn from(err: NdbError) -> io::Error {
        match err {
            NdbError::Io(err) => err,
            err => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

pub type NdbResult<T> = Result<T, NdbError>;

/// Fail with [NdbError::Truncated] when `data` is shorter than the structure named by `what`.
pub(crate) fn check_size(what: &'static str, data: &[u8], expected: usize) -> NdbResult<()> {
    if data.len() < expected {
        Err(NdbError::Truncated(what, expected, data.len()))
    } else {
        Ok(())
    }
}
