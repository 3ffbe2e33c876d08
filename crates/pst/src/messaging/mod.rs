//! ## [Messaging Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/3f1bc553-d15d-4dcf-9b80-fbf1dd6c7e79)
//!
//! Only the named property map is read here. Folders, messages, and attachments are plain
//! [PropertyContext](crate::ltp::prop_context::PropertyContext) and
//! [TableContext](crate::ltp::table_context::TableContext) nodes.

use std::io;
use thiserror::Error;

use crate::ltp::prop_type::PropertyType;

pub mod named_prop;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Node Database error: {0}")]
    NodeDatabaseError(#[from] crate::ndb::NdbError),
    #[error("Lists, Tables, and Properties error: {0}")]
    ListsTablesPropertiesError(#[from] crate::ltp::LtpError),
    #[error("Not a named property id: 0x{0:04X}")]
    InvalidNamedPropertyId(u16),
    #[error("Named property index out of bounds: 0x{0:04X}")]
    NamedPropertyIndexOutOfBounds(u16),
    #[error("Named property GUID index out of bounds: 0x{0:04X}")]
    NamedPropertyGuidIndexOutOfBounds(u32),
    #[error("Invalid named property string offset: 0x{0:08X}")]
    InvalidNamedPropertyStringOffset(u32),
    #[error("Missing named property map stream: 0x{0:04X}")]
    NamedPropertyMapStreamNotFound(u16),
    #[error("Invalid named property map stream 0x{0:04X}: {1:?}")]
    InvalidNamedPropertyMapStream(u16, PropertyType),
    #[error("Invalid named property map stream 0x{0:04X} size: 0x{1:X}")]
    InvalidNamedPropertyMapStreamSize(u16, usize),
    #[error("Invalid named property map bucket count: {0}")]
    InvalidNamedPropertyMapBucketCount(i32),
}

impl From<MessagingError> for io::Error {
    fn from(err: MessagingError) -> io::Error {
        match err {
            MessagingError::NodeDatabaseError(err) => err.into(),
            MessagingError::ListsTablesPropertiesError(err) => err.into(),
            err => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
