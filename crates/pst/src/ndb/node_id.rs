//! [NID (Node ID)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/18d7644e-cb33-4e11-95c0-34d8a84fbff6)

use std::fmt::Debug;

use super::*;

/// `nidType`
///
/// ### See also
/// [NodeId]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NodeIdType {
    /// `NID_TYPE_HID`: Heap node
    HeapNode = 0x00,
    /// `NID_TYPE_INTERNAL`: Internal node
    Internal = 0x01,
    /// `NID_TYPE_NORMAL_FOLDER`: Normal Folder object (PC)
    NormalFolder = 0x02,
    /// `NID_TYPE_SEARCH_FOLDER`: Search Folder object (PC)
    SearchFolder = 0x03,
    /// `NID_TYPE_NORMAL_MESSAGE`: Normal Message object (PC)
    NormalMessage = 0x04,
    /// `NID_TYPE_ATTACHMENT`: Attachment object (PC)
    Attachment = 0x05,
    /// `NID_TYPE_SEARCH_UPDATE_QUEUE`: Queue of changed objects for search Folder objects
    SearchUpdateQueue = 0x06,
    /// `NID_TYPE_SEARCH_CRITERIA_OBJECT`: Defines the search criteria for a search Folder object
    SearchCriteria = 0x07,
    /// `NID_TYPE_ASSOC_MESSAGE`: Folder associated information (FAI) Message object (PC)
    AssociatedMessage = 0x08,
    /// `NID_TYPE_CONTENTS_TABLE_INDEX`: Internal, persisted view-related
    ContentsTableIndex = 0x0A,
    /// `NID_TYPE_RECEIVE_FOLDER_TABLE`: Receive Folder object (Inbox)
    ReceiveFolderTable = 0x0B,
    /// `NID_TYPE_OUTGOING_QUEUE_TABLE`: Outbound queue (Outbox)
    OutgoingQueueTable = 0x0C,
    /// `NID_TYPE_HIERARCHY_TABLE`: Hierarchy table (TC)
    HierarchyTable = 0x0D,
    /// `NID_TYPE_CONTENTS_TABLE`: Contents table (TC)
    ContentsTable = 0x0E,
    /// `NID_TYPE_ASSOC_CONTENTS_TABLE`: FAI contents table (TC)
    AssociatedContentsTable = 0x0F,
    /// `NID_TYPE_SEARCH_CONTENTS_TABLE`: Contents table (TC) of a search Folder object
    SearchContentsTable = 0x10,
    /// `NID_TYPE_ATTACHMENT_TABLE`: Attachment table (TC)
    AttachmentTable = 0x11,
    /// `NID_TYPE_RECIPIENT_TABLE`: Recipient table (TC)
    RecipientTable = 0x12,
    /// `NID_TYPE_SEARCH_TABLE_INDEX`: Internal, persisted view-related
    SearchTableIndex = 0x13,
    /// `NID_TYPE_LTP`: [LTP](crate::ltp)
    ListsTablesProperties = 0x1F,
}

impl TryFrom<u8> for NodeIdType {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => Self::HeapNode,
            0x01 => Self::Internal,
            0x02 => Self::NormalFolder,
            0x03 => Self::SearchFolder,
            0x04 => Self::NormalMessage,
            0x05 => Self::Attachment,
            0x06 => Self::SearchUpdateQueue,
            0x07 => Self::SearchCriteria,
            0x08 => Self::AssociatedMessage,
            0x0A => Self::ContentsTableIndex,
            0x0B => Self::ReceiveFolderTable,
            0x0C => Self::OutgoingQueueTable,
            0x0D => Self::HierarchyTable,
            0x0E => Self::ContentsTable,
            0x0F => Self::AssociatedContentsTable,
            0x10 => Self::SearchContentsTable,
            0x11 => Self::AttachmentTable,
            0x12 => Self::RecipientTable,
            0x13 => Self::SearchTableIndex,
            0x1F => Self::ListsTablesProperties,
            _ => return Err(NdbError::InvalidNodeIdType(value)),
        })
    }
}

/// Largest `nidIndex` that fits in the 27 bits above `nidType`.
pub const MAX_NODE_INDEX: u32 = (1 << 27) - 1;

/// A 32-bit `NID`. The low 5 bits hold the [NodeIdType], the rest hold the index.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id_type: NodeIdType, index: u32) -> NdbResult<Self> {
        if index > MAX_NODE_INDEX {
            return Err(NdbError::InvalidNodeIndex(index));
        }
        Ok(Self((index << 5) | id_type as u32))
    }

    pub fn id_type(&self) -> NdbResult<NodeIdType> {
        NodeIdType::try_from((self.0 & 0x1F) as u8)
    }

    pub fn index(&self) -> u32 {
        self.0 >> 5
    }

    /// The node with the same index and a different type. This is how a folder's hierarchy,
    /// contents, and FAI contents tables are found from the folder `NID`.
    pub fn with_type(&self, id_type: NodeIdType) -> Self {
        Self((self.0 & !0x1F) | id_type as u32)
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id_type() {
            Ok(id_type) => write!(f, "NodeId {{ {id_type:?}: 0x{:X} }}", self.index()),
            Err(_) => write!(f, "NodeId {{ 0x{:08X} }}", self.0),
        }
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<NodeId> for u32 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

/// `NID_MESSAGE_STORE`: Message store node
pub const NID_MESSAGE_STORE: NodeId = NodeId(0x21);
/// `NID_NAME_TO_ID_MAP`: Named Properties Map
pub const NID_NAME_TO_ID_MAP: NodeId = NodeId(0x61);
/// `NID_NORMAL_FOLDER_TEMPLATE`: Special template node for an empty Folder object
pub const NID_NORMAL_FOLDER_TEMPLATE: NodeId = NodeId(0xA1);
/// `NID_SEARCH_FOLDER_TEMPLATE`: Special template node for an empty search Folder object
pub const NID_SEARCH_FOLDER_TEMPLATE: NodeId = NodeId(0xC1);
/// `NID_ROOT_FOLDER`: Root Mailbox Folder object of PST
pub const NID_ROOT_FOLDER: NodeId = NodeId(0x122);
/// `NID_SEARCH_MANAGEMENT_QUEUE`: Queue of Pending Search-related updates
pub const NID_SEARCH_MANAGEMENT_QUEUE: NodeId = NodeId(0x1E1);
/// `NID_SEARCH_ACTIVITY_LIST`: Folder object NIDs with active Search activity
pub const NID_SEARCH_ACTIVITY_LIST: NodeId = NodeId(0x201);
/// `NID_SEARCH_DOMAIN_OBJECT`: Global list of all Folder objects that are referenced by any
/// Folder object's Search Criteria
pub const NID_SEARCH_DOMAIN_OBJECT: NodeId = NodeId(0x261);
/// `NID_SEARCH_GATHERER_QUEUE`: Search Gatherer Queue
pub const NID_SEARCH_GATHERER_QUEUE: NodeId = NodeId(0x281);
/// `NID_SEARCH_GATHERER_DESCRIPTOR`: Search Gatherer Descriptor
pub const NID_SEARCH_GATHERER_DESCRIPTOR: NodeId = NodeId(0x2A1);
/// `NID_SEARCH_GATHERER_FOLDER_QUEUE`: Search Gatherer Folder Queue
pub const NID_SEARCH_GATHERER_FOLDER_QUEUE: NodeId = NodeId(0x321);
/// `NID_HIERARCHY_TABLE_TEMPLATE`: Template for an empty hierarchy table
pub const NID_HIERARCHY_TABLE_TEMPLATE: NodeId = NodeId(0x60D);
/// `NID_CONTENTS_TABLE_TEMPLATE`: Template for an empty contents table
pub const NID_CONTENTS_TABLE_TEMPLATE: NodeId = NodeId(0x60E);
/// `NID_ASSOC_CONTENTS_TABLE_TEMPLATE`: Template for an empty FAI contents table
pub const NID_ASSOC_CONTENTS_TABLE_TEMPLATE: NodeId = NodeId(0x60F);
/// `NID_SEARCH_CONTENTS_TABLE_TEMPLATE`: Template for an empty search contents table
pub const NID_SEARCH_CONTENTS_TABLE_TEMPLATE: NodeId = NodeId(0x610);
/// `NID_ATTACHMENT_TABLE`: Subnode of a message holding its attachment table
pub const NID_ATTACHMENT_TABLE: NodeId = NodeId(0x671);
/// `NID_RECIPIENT_TABLE`: Subnode of a message holding its recipient table
pub const NID_RECIPIENT_TABLE: NodeId = NodeId(0x692);
/// `NID_SEARCH_TABLE_TEMPLATE`: Template for an empty search table
pub const NID_SEARCH_TABLE_TEMPLATE: NodeId = NodeId(0x6B6);
