//! ## [Lists, Tables, and Properties (LTP) Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/4c24c7d2-5c5a-4b99-88b2-f4b84cc293ae)

use std::io;
use thiserror::Error;

use crate::ndb::{node::Node, node_id::NodeIdType, NdbError};

pub mod heap;
pub mod prop_context;
pub mod prop_tag;
pub mod prop_type;
pub mod table_context;
pub mod tree;

use heap::{HeapNode, HeapNodeType};
use prop_context::PropertyContext;
use prop_type::PropertyType;
use table_context::TableContext;

#[derive(Error, Debug)]
pub enum LtpError {
    #[error("Node Database error: {0}")]
    NodeDatabaseError(#[from] NdbError),
    #[error("Truncated {0}: need 0x{1:X} bytes, found 0x{2:X}")]
    Truncated(&'static str, usize, usize),
    #[error("Invalid HID hidIndex: 0x{0:04X}")]
    InvalidHeapIndex(u16),
    #[error("HID hidBlockIndex not found: 0x{0:04X}")]
    HeapBlockIndexNotFound(u16),
    #[error("Invalid HID hidType: {0:?}")]
    InvalidHeapNodeType(NodeIdType),
    #[error("Invalid HNHDR bSig: 0x{0:02X}")]
    InvalidHeapNodeSignature(u8),
    #[error("Invalid HNHDR bClientSig: 0x{0:02X}")]
    InvalidHeapNodeTypeSignature(u8),
    #[error("Unexpected HNHDR bClientSig: {0:?}")]
    UnexpectedHeapNodeType(HeapNodeType),
    #[error("Invalid HNHDR rgbFillLevel: 0x{0:02X}")]
    InvalidHeapFillLevel(u8),
    #[error("Invalid HNPAGEMAP offset: 0x{0:04X}")]
    InvalidHeapPageMapOffset(u16),
    #[error("Invalid HNPAGEMAP rgibAlloc entry: 0x{0:04X}")]
    InvalidHeapPageAllocOffset(u16),
    #[error("Invalid BTHHEADER bType: {0:?}")]
    InvalidHeapTreeNodeType(HeapNodeType),
    #[error("Invalid BTHHEADER cbKey: 0x{0:02X}")]
    InvalidHeapTreeKeySize(u8),
    #[error("Invalid BTHHEADER cbEnt: 0x{0:02X}")]
    InvalidHeapTreeDataSize(u8),
    #[error("Invalid BTHHEADER bIdxLevels: 0x{0:02X}")]
    InvalidHeapTreeLevels(u8),
    #[error("Invalid BTH record buffer size: 0x{0:X}")]
    InvalidHeapTreeRecordsSize(usize),
    #[error("Invalid property type: 0x{0:04X}")]
    InvalidPropertyType(u16),
    #[error("Invalid {0:?} value size: 0x{1:X}")]
    InvalidPropertyValueSize(PropertyType, usize),
    #[error("Invalid multi-valued property offset: 0x{0:08X}")]
    InvalidMultiValueOffset(u32),
    #[error("Invalid PC BTH cbKey or cbEnt: (0x{0:02X}, 0x{1:02X})")]
    InvalidPropertyTreeEntrySize(u8, u8),
    #[error("Invalid TCINFO bType: {0:?}")]
    InvalidTableContextHeapType(HeapNodeType),
    #[error("Invalid TCINFO rgib: {0:?}")]
    InvalidTableContextGroupOffsets([u16; 4]),
    #[error("Invalid TCOLDESC for 0x{0:08X}: ibData 0x{1:04X}, cbData 0x{2:02X}")]
    InvalidTableColumnLayout(u32, u16, u8),
    #[error("Invalid TCOLDESC iBit: 0x{0:02X}")]
    InvalidTableColumnBitmapIndex(u8),
    #[error("Invalid TC row index BTH cbKey or cbEnt: (0x{0:02X}, 0x{1:02X})")]
    InvalidTableRowIndexEntrySize(u8, u8),
    #[error("Table row index out of bounds: {0}, row count {1}")]
    TableRowIndexOutOfBounds(usize, usize),
}

impl From<LtpError> for io::Error {
    fn from(err: LtpError) -> io::Error {
        match err {
            LtpError::NodeDatabaseError(err) => err.into(),
            err => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

impl From<io::Error> for LtpError {
    fn from(err: io::Error) -> Self {
        Self::NodeDatabaseError(NdbError::Io(err))
    }
}

pub type LtpResult<T> = Result<T, LtpError>;

pub(crate) fn check_size(what: &'static str, data: &[u8], expected: usize) -> LtpResult<()> {
    if data.len() < expected {
        Err(LtpError::Truncated(what, expected, data.len()))
    } else {
        Ok(())
    }
}

/// A heap-on-node opened as the structure its `bClientSig` names.
pub enum HeapContext<'a> {
    Properties(PropertyContext<'a>),
    Table(TableContext<'a>),
}

impl<'a> HeapContext<'a> {
    pub fn read(node: Node<'a>) -> LtpResult<Self> {
        let heap = HeapNode::read(&node)?;
        match heap.header().client_signature() {
            HeapNodeType::Properties => Ok(Self::Properties(PropertyContext::from_heap(
                node, heap,
            )?)),
            HeapNodeType::Table => Ok(Self::Table(TableContext::from_heap(node, heap)?)),
            other => Err(LtpError::UnexpectedHeapNodeType(other)),
        }
    }

    pub fn node(&self) -> &Node<'a> {
        match self {
            Self::Properties(properties) => properties.node(),
            Self::Table(table) => table.node(),
        }
    }
}
