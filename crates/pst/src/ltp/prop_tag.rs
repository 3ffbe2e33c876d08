//! ## Well-known property tags
//!
//! A small table of the property ids which the store, folders, messages, recipients, and
//! attachments commonly carry. Ids missing from the table are still readable: [lookup] just
//! returns `None` for them and the value keeps its stored [PropertyType].

use super::prop_type::PropertyType::{self, *};

pub const PID_TAG_IMPORTANCE: u16 = 0x0017;
pub const PID_TAG_MESSAGE_CLASS: u16 = 0x001A;
pub const PID_TAG_SUBJECT: u16 = 0x0037;
pub const PID_TAG_MESSAGE_DELIVERY_TIME: u16 = 0x0E06;
pub const PID_TAG_MESSAGE_FLAGS: u16 = 0x0E07;
pub const PID_TAG_MESSAGE_SIZE: u16 = 0x0E08;
pub const PID_TAG_RECORD_KEY: u16 = 0x0FF9;
pub const PID_TAG_BODY: u16 = 0x1000;
pub const PID_TAG_DISPLAY_NAME: u16 = 0x3001;
pub const PID_TAG_CONTENT_COUNT: u16 = 0x3602;
pub const PID_TAG_CONTENT_UNREAD_COUNT: u16 = 0x3603;
pub const PID_TAG_SUBFOLDERS: u16 = 0x360A;
pub const PID_TAG_ATTACH_DATA_BINARY: u16 = 0x3701;
pub const PID_TAG_ATTACH_LONG_FILENAME: u16 = 0x3707;
pub const PID_TAG_MID: u16 = 0x674A;
pub const PID_TAG_LTP_ROW_ID: u16 = 0x67F2;
pub const PID_TAG_LTP_ROW_VER: u16 = 0x67F3;

/// `PidTagMessageFlags` bits
pub const MSGFLAG_READ: i32 = 0x0001;
pub const MSGFLAG_UNMODIFIED: i32 = 0x0002;
pub const MSGFLAG_SUBMITTED: i32 = 0x0004;
pub const MSGFLAG_UNSENT: i32 = 0x0008;
pub const MSGFLAG_HASATTACH: i32 = 0x0010;
pub const MSGFLAG_FROMME: i32 = 0x0020;
pub const MSGFLAG_ASSOCIATED: i32 = 0x0040;
pub const MSGFLAG_RESEND: i32 = 0x0080;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyTagInfo {
    id: u16,
    name: &'static str,
    prop_type: PropertyType,
}

impl PropertyTagInfo {
    const fn new(id: u16, name: &'static str, prop_type: PropertyType) -> Self {
        Self {
            id,
            name,
            prop_type,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Canonical `PidTag…` name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The type this property is normally stored with.
    pub fn prop_type(&self) -> PropertyType {
        self.prop_type
    }
}

/// Sorted by id.
static PROPERTY_TAGS: &[PropertyTagInfo] = &[
    PropertyTagInfo::new(0x0002, "PidTagAlternateRecipientAllowed", Boolean),
    PropertyTagInfo::new(0x0017, "PidTagImportance", Integer32),
    PropertyTagInfo::new(0x001A, "PidTagMessageClass", Unicode),
    PropertyTagInfo::new(0x0023, "PidTagOriginatorDeliveryReportRequested", Boolean),
    PropertyTagInfo::new(0x0026, "PidTagPriority", Integer32),
    PropertyTagInfo::new(0x0029, "PidTagReadReceiptRequested", Boolean),
    PropertyTagInfo::new(0x002B, "PidTagRecipientReassignmentProhibited", Boolean),
    PropertyTagInfo::new(0x002E, "PidTagOriginalSensitivity", Integer32),
    PropertyTagInfo::new(0x0036, "PidTagSensitivity", Integer32),
    PropertyTagInfo::new(0x0037, "PidTagSubject", Unicode),
    PropertyTagInfo::new(0x0039, "PidTagClientSubmitTime", Time),
    PropertyTagInfo::new(0x0042, "PidTagSentRepresentingName", Unicode),
    PropertyTagInfo::new(0x0057, "PidTagMessageToMe", Boolean),
    PropertyTagInfo::new(0x0058, "PidTagMessageCcMe", Boolean),
    PropertyTagInfo::new(0x0065, "PidTagSentRepresentingEmailAddress", Unicode),
    PropertyTagInfo::new(0x0070, "PidTagConversationTopic", Unicode),
    PropertyTagInfo::new(0x0071, "PidTagConversationIndex", Binary),
    PropertyTagInfo::new(0x0C15, "PidTagRecipientType", Integer32),
    PropertyTagInfo::new(0x0C1A, "PidTagSenderName", Unicode),
    PropertyTagInfo::new(0x0C1F, "PidTagSenderEmailAddress", Unicode),
    PropertyTagInfo::new(0x0E03, "PidTagDisplayCc", Unicode),
    PropertyTagInfo::new(0x0E04, "PidTagDisplayTo", Unicode),
    PropertyTagInfo::new(0x0E06, "PidTagMessageDeliveryTime", Time),
    PropertyTagInfo::new(0x0E07, "PidTagMessageFlags", Integer32),
    PropertyTagInfo::new(0x0E08, "PidTagMessageSize", Integer32),
    PropertyTagInfo::new(0x0E17, "PidTagMessageStatus", Integer32),
    PropertyTagInfo::new(0x0E1F, "PidTagRtfInSync", Boolean),
    PropertyTagInfo::new(0x0E20, "PidTagAttachSize", Integer32),
    PropertyTagInfo::new(0x0E23, "PidTagInternetArticleNumber", Integer32),
    PropertyTagInfo::new(0x0E27, "PidTagSecurityDescriptor", Binary),
    PropertyTagInfo::new(0x0E30, "PidTagReplItemid", Integer32),
    PropertyTagInfo::new(0x0E33, "PidTagReplChangenum", Integer64),
    PropertyTagInfo::new(0x0E34, "PidTagReplVersionHistory", Binary),
    PropertyTagInfo::new(0x0E38, "PidTagReplFlags", Integer32),
    PropertyTagInfo::new(0x0E3C, "PidTagReplCopiedfromVersionhistory", Binary),
    PropertyTagInfo::new(0x0E3D, "PidTagReplCopiedfromItemid", Binary),
    PropertyTagInfo::new(0x0E79, "PidTagTrustSender", Integer32),
    PropertyTagInfo::new(0x0FF4, "PidTagAccess", Integer32),
    PropertyTagInfo::new(0x0FF7, "PidTagAccessLevel", Integer32),
    PropertyTagInfo::new(0x0FF9, "PidTagRecordKey", Binary),
    PropertyTagInfo::new(0x0FFE, "PidTagObjectType", Integer32),
    PropertyTagInfo::new(0x0FFF, "PidTagEntryId", Binary),
    PropertyTagInfo::new(0x1000, "PidTagBody", Unicode),
    PropertyTagInfo::new(0x1009, "PidTagRtfCompressed", Binary),
    PropertyTagInfo::new(0x1013, "PidTagHtml", Binary),
    PropertyTagInfo::new(0x1035, "PidTagInternetMessageId", Unicode),
    PropertyTagInfo::new(0x3001, "PidTagDisplayName", Unicode),
    PropertyTagInfo::new(0x3002, "PidTagAddressType", Unicode),
    PropertyTagInfo::new(0x3003, "PidTagEmailAddress", Unicode),
    PropertyTagInfo::new(0x3007, "PidTagCreationTime", Time),
    PropertyTagInfo::new(0x3008, "PidTagLastModificationTime", Time),
    PropertyTagInfo::new(0x300B, "PidTagSearchKey", Binary),
    PropertyTagInfo::new(0x35DF, "PidTagValidFolderMask", Integer32),
    PropertyTagInfo::new(0x35E0, "PidTagIpmSubtreeEntryId", Binary),
    PropertyTagInfo::new(0x35E3, "PidTagIpmWastebasketEntryId", Binary),
    PropertyTagInfo::new(0x35E7, "PidTagFinderEntryId", Binary),
    PropertyTagInfo::new(0x3602, "PidTagContentCount", Integer32),
    PropertyTagInfo::new(0x3603, "PidTagContentUnreadCount", Integer32),
    PropertyTagInfo::new(0x360A, "PidTagSubfolders", Boolean),
    PropertyTagInfo::new(0x3613, "PidTagContainerClass", Unicode),
    PropertyTagInfo::new(0x3617, "PidTagAssociatedContentCount", Integer32),
    PropertyTagInfo::new(0x3701, "PidTagAttachDataBinary", Binary),
    PropertyTagInfo::new(0x3704, "PidTagAttachFilename", Unicode),
    PropertyTagInfo::new(0x3705, "PidTagAttachMethod", Integer32),
    PropertyTagInfo::new(0x3707, "PidTagAttachLongFilename", Unicode),
    PropertyTagInfo::new(0x370B, "PidTagRenderingPosition", Integer32),
    PropertyTagInfo::new(0x370E, "PidTagAttachMimeTag", Unicode),
    PropertyTagInfo::new(0x3900, "PidTagDisplayType", Integer32),
    PropertyTagInfo::new(0x39FE, "PidTagSmtpAddress", Unicode),
    PropertyTagInfo::new(0x3A00, "PidTagAccount", Unicode),
    PropertyTagInfo::new(0x3FDE, "PidTagInternetCodepage", Integer32),
    PropertyTagInfo::new(0x3FF1, "PidTagMessageLocaleId", Integer32),
    PropertyTagInfo::new(0x3FFD, "PidTagMessageCodepage", Integer32),
    PropertyTagInfo::new(0x5FF6, "PidTagRecipientDisplayName", Unicode),
    PropertyTagInfo::new(0x5FFD, "PidTagRecipientFlags", Integer32),
    PropertyTagInfo::new(0x5FFF, "PidTagRecipientTrackStatus", Integer32),
    PropertyTagInfo::new(0x65E2, "PidTagChangeKey", Binary),
    PropertyTagInfo::new(0x65E3, "PidTagPredecessorChangeList", Binary),
    PropertyTagInfo::new(0x674A, "PidTagMid", Integer64),
    PropertyTagInfo::new(0x67F2, "PidTagLtpRowId", Integer32),
    PropertyTagInfo::new(0x67F3, "PidTagLtpRowVer", Integer32),
    PropertyTagInfo::new(0x67FF, "PidTagPstPassword", Integer32),
    PropertyTagInfo::new(0x7FFA, "PidTagAttachmentLinkId", Integer32),
    PropertyTagInfo::new(0x7FFD, "PidTagAttachmentFlags", Integer32),
    PropertyTagInfo::new(0x7FFE, "PidTagAttachmentHidden", Boolean),
];

pub fn property_tags() -> &'static [PropertyTagInfo] {
    PROPERTY_TAGS
}

pub fn lookup(prop_id: u16) -> Option<&'static PropertyTagInfo> {
    PROPERTY_TAGS
        .binary_search_by_key(&prop_id, PropertyTagInfo::id)
        .ok()
        .map(|index| &PROPERTY_TAGS[index])
}

/// Ids from `0x8000` up are assigned per file by the named property map.
pub fn is_named_property(prop_id: u16) -> bool {
    prop_id >= 0x8000
}
