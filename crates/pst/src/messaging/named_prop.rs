//! ## [Named Property Lookup Map](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e17e195d-0454-4b9b-b398-c9127a26a678)

use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

use super::*;
use crate::{
    crc::compute_crc,
    ltp::{
        prop_context::PropertyContext,
        prop_type::{GuidValue, PropertyValue},
    },
    ndb::node_id::NID_NAME_TO_ID_MAP,
    PstFile,
};

/// Lowest property id assigned to a named property.
pub const FIRST_NAMED_PROPERTY_ID: u16 = 0x8000;

const PROP_ID_BUCKET_COUNT: u16 = 0x0001;
const PROP_ID_STREAM_GUID: u16 = 0x0002;
const PROP_ID_STREAM_ENTRY: u16 = 0x0003;
const PROP_ID_STREAM_STRING: u16 = 0x0004;
const PROP_ID_FIRST_BUCKET: u16 = 0x1000;

pub const PS_MAPI: GuidValue = GuidValue::new(
    0x00020328,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const PS_PUBLIC_STRINGS: GuidValue = GuidValue::new(
    0x00020329,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

/// `dwPropertyID`: a numeric name, or the offset of a string name in the string stream. In the
/// hash buckets, string names store the CRC of the name instead of the offset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NamedPropertyId {
    Number(u32),
    StringOffset(u32),
}

/// Largest `wGuid`: it shares a `u16` with the string flag.
const MAX_GUID_VALUE: u16 = u16::MAX >> 1;

/// `wGuid`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NamedPropertyGuid {
    None,
    Mapi,
    PublicStrings,
    /// 0-based index into the GUID stream.
    GuidIndex(u16),
}

impl From<NamedPropertyGuid> for u32 {
    fn from(guid: NamedPropertyGuid) -> Self {
        match guid {
            NamedPropertyGuid::None => 0x0000,
            NamedPropertyGuid::Mapi => 0x0001,
            NamedPropertyGuid::PublicStrings => 0x0002,
            NamedPropertyGuid::GuidIndex(index) => u32::from(index) + 3,
        }
    }
}

impl From<u16> for NamedPropertyGuid {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => Self::None,
            0x0001 => Self::Mapi,
            0x0002 => Self::PublicStrings,
            index => Self::GuidIndex(index - 3),
        }
    }
}

/// [NAMEID](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e17e195d-0454-4b9b-b398-c9127a26a678)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NameIdEntry {
    id: NamedPropertyId,
    guid: NamedPropertyGuid,
    prop_index: u16,
}

impl NameIdEntry {
    pub const SIZE: usize = 8;

    pub fn read(data: &[u8; Self::SIZE]) -> Self {
        // dwPropertyID
        let prop_id = LittleEndian::read_u32(&data[0..4]);
        // N and wGuid
        let guid_index = LittleEndian::read_u16(&data[4..6]);
        // wPropIdx
        let prop_index = LittleEndian::read_u16(&data[6..8]);

        let id = if guid_index & 0x0001 == 0 {
            NamedPropertyId::Number(prop_id)
        } else {
            NamedPropertyId::StringOffset(prop_id)
        };

        Self {
            id,
            guid: NamedPropertyGuid::from(guid_index >> 1),
            prop_index,
        }
    }

    pub fn id(&self) -> NamedPropertyId {
        self.id
    }

    pub fn guid(&self) -> NamedPropertyGuid {
        self.guid
    }

    /// `0x8000 + wPropIdx`
    pub fn prop_id(&self) -> u16 {
        FIRST_NAMED_PROPERTY_ID.wrapping_add(self.prop_index)
    }

    fn read_stream(stream: u16, data: &[u8]) -> MessagingResult<Vec<Self>> {
        if data.len() % Self::SIZE != 0 {
            return Err(MessagingError::InvalidNamedPropertyMapStreamSize(
                stream,
                data.len(),
            ));
        }
        Ok(data
            .chunks_exact(Self::SIZE)
            .filter_map(|entry| entry.try_into().ok())
            .map(Self::read)
            .collect())
    }
}

/// Value used to pick the hash bucket: the numeric name, or the CRC of the UTF-16LE bytes of a
/// string name, combined with `wGuid` and the string flag.
pub fn hash_value(guid: NamedPropertyGuid, name: &NamedPropertyName) -> u32 {
    let guid = u32::from(guid) << 1;
    match name {
        NamedPropertyName::Number(id) => id ^ guid,
        NamedPropertyName::String(name) => name_crc(name) ^ (guid | 1),
    }
}

fn name_crc(name: &str) -> u32 {
    let bytes: Vec<u8> = name.encode_utf16().flat_map(u16::to_le_bytes).collect();
    compute_crc(0, &bytes)
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NamedPropertyName {
    Number(u32),
    String(String),
}

/// A resolved named property.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NamedProperty {
    prop_id: u16,
    guid: GuidValue,
    name: NamedPropertyName,
}

impl NamedProperty {
    pub fn prop_id(&self) -> u16 {
        self.prop_id
    }

    pub fn guid(&self) -> GuidValue {
        self.guid
    }

    pub fn name(&self) -> &NamedPropertyName {
        &self.name
    }
}

/// The streams of the property context at [NID_NAME_TO_ID_MAP].
#[derive(Clone, Debug, Default)]
pub struct NamedPropertyMap {
    bucket_count: u16,
    guids: Vec<GuidValue>,
    entries: Vec<NameIdEntry>,
    strings: Vec<u8>,
    buckets: BTreeMap<u16, Vec<NameIdEntry>>,
}

fn binary_stream(
    context: &PropertyContext<'_>,
    prop_id: u16,
) -> MessagingResult<Option<Vec<u8>>> {
    match context.get(prop_id)? {
        None => Ok(None),
        Some(PropertyValue::Binary(data)) => Ok(Some(data)),
        Some(invalid) => Err(MessagingError::InvalidNamedPropertyMapStream(
            prop_id,
            invalid.prop_type(),
        )),
    }
}

impl NamedPropertyMap {
    pub fn read(pst: &PstFile) -> MessagingResult<Self> {
        let context = pst.property_context(NID_NAME_TO_ID_MAP)?;
        Self::from_property_context(&context)
    }

    pub fn from_property_context(context: &PropertyContext<'_>) -> MessagingResult<Self> {
        let bucket_count = match context.get(PROP_ID_BUCKET_COUNT)? {
            Some(PropertyValue::Integer32(count)) => u16::try_from(count)
                .ok()
                .filter(|&count| count <= u16::MAX - PROP_ID_FIRST_BUCKET)
                .ok_or(MessagingError::InvalidNamedPropertyMapBucketCount(count))?,
            Some(invalid) => {
                return Err(MessagingError::InvalidNamedPropertyMapStream(
                    PROP_ID_BUCKET_COUNT,
                    invalid.prop_type(),
                ))
            }
            None => {
                return Err(MessagingError::NamedPropertyMapStreamNotFound(
                    PROP_ID_BUCKET_COUNT,
                ))
            }
        };

        let guid_stream = binary_stream(context, PROP_ID_STREAM_GUID)?
            .ok_or(MessagingError::NamedPropertyMapStreamNotFound(PROP_ID_STREAM_GUID))?;
        if guid_stream.len() % 16 != 0 {
            return Err(MessagingError::InvalidNamedPropertyMapStreamSize(
                PROP_ID_STREAM_GUID,
                guid_stream.len(),
            ));
        }
        let guids: Vec<GuidValue> = guid_stream
            .chunks_exact(16)
            .filter_map(|guid| guid.try_into().ok())
            .map(GuidValue::from_bytes)
            .collect();

        let entry_stream = binary_stream(context, PROP_ID_STREAM_ENTRY)?
            .ok_or(MessagingError::NamedPropertyMapStreamNotFound(PROP_ID_STREAM_ENTRY))?;
        let entries = NameIdEntry::read_stream(PROP_ID_STREAM_ENTRY, &entry_stream)?;

        let strings = binary_stream(context, PROP_ID_STREAM_STRING)?.unwrap_or_default();

        let mut buckets = BTreeMap::new();
        for record in context.records()? {
            let prop_id = record.prop_id();
            if prop_id < PROP_ID_FIRST_BUCKET || prop_id - PROP_ID_FIRST_BUCKET >= bucket_count {
                continue;
            }
            if let Some(bucket) = binary_stream(context, prop_id)? {
                buckets.insert(
                    prop_id - PROP_ID_FIRST_BUCKET,
                    NameIdEntry::read_stream(prop_id, &bucket)?,
                );
            }
        }

        debug!(
            "named property map: {} entries, {} GUIDs, {} of {bucket_count} buckets",
            entries.len(),
            guids.len(),
            buckets.len()
        );

        Ok(Self {
            bucket_count,
            guids,
            entries,
            strings,
            buckets,
        })
    }

    pub fn bucket_count(&self) -> u16 {
        self.bucket_count
    }

    pub fn guids(&self) -> &[GuidValue] {
        &self.guids
    }

    pub fn entries(&self) -> &[NameIdEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn guid(&self, guid: NamedPropertyGuid) -> MessagingResult<GuidValue> {
        match guid {
            NamedPropertyGuid::None => Ok(GuidValue::default()),
            NamedPropertyGuid::Mapi => Ok(PS_MAPI),
            NamedPropertyGuid::PublicStrings => Ok(PS_PUBLIC_STRINGS),
            NamedPropertyGuid::GuidIndex(index) => self
                .guids
                .get(usize::from(index))
                .copied()
                .ok_or(MessagingError::NamedPropertyGuidIndexOutOfBounds(u32::from(
                    guid,
                ))),
        }
    }

    /// The `wGuid` which refers to `guid` in this map, if any. GUIDs too far into the stream to
    /// fit in `wGuid` have none.
    pub fn guid_index(&self, guid: &GuidValue) -> Option<NamedPropertyGuid> {
        if *guid == PS_MAPI {
            Some(NamedPropertyGuid::Mapi)
        } else if *guid == PS_PUBLIC_STRINGS {
            Some(NamedPropertyGuid::PublicStrings)
        } else {
            self.guids
                .iter()
                .position(|candidate| candidate == guid)
                .and_then(|index| u16::try_from(index).ok())
                .filter(|index| index.checked_add(3).is_some_and(|value| value <= MAX_GUID_VALUE))
                .map(NamedPropertyGuid::GuidIndex)
        }
    }

    /// Read the length-prefixed UTF-16LE name at `offset` of the string stream. Unpaired
    /// surrogates decode as U+FFFD; [NamedPropertyMap::string_utf16] keeps the code units.
    pub fn string(&self, offset: u32) -> MessagingResult<String> {
        Ok(String::from_utf16_lossy(&self.string_utf16(offset)?))
    }

    /// The UTF-16 code units of the name at `offset` of the string stream.
    pub fn string_utf16(&self, offset: u32) -> MessagingResult<Vec<u16>> {
        let start = offset as usize;
        let invalid = || MessagingError::InvalidNamedPropertyStringOffset(offset);
        let size = self
            .strings
            .get(start..start + 4)
            .map(LittleEndian::read_u32)
            .ok_or_else(invalid)? as usize;
        let data = self
            .strings
            .get(start + 4..start + 4 + size)
            .filter(|data| data.len() % 2 == 0)
            .ok_or_else(invalid)?;
        Ok(data.chunks_exact(2).map(LittleEndian::read_u16).collect())
    }

    fn entry_name(&self, entry: &NameIdEntry) -> MessagingResult<NamedPropertyName> {
        Ok(match entry.id() {
            NamedPropertyId::Number(id) => NamedPropertyName::Number(id),
            NamedPropertyId::StringOffset(offset) => {
                NamedPropertyName::String(self.string(offset)?)
            }
        })
    }

    /// The name of an entry visited by [NamedPropertyMap::find], or `None` if it cannot be read.
    fn scanned_name(&self, entry: &NameIdEntry) -> Option<NamedPropertyName> {
        match self.entry_name(entry) {
            Ok(name) => Some(name),
            Err(err) => {
                warn!("skipping named property 0x{:04X}: {err}", entry.prop_id());
                None
            }
        }
    }

    /// Resolve a property id of `0x8000` or above to its GUID and name.
    pub fn resolve(&self, prop_id: u16) -> MessagingResult<NamedProperty> {
        let index = prop_id
            .checked_sub(FIRST_NAMED_PROPERTY_ID)
            .ok_or(MessagingError::InvalidNamedPropertyId(prop_id))?;
        let entry = self
            .entries
            .get(usize::from(index))
            .ok_or(MessagingError::NamedPropertyIndexOutOfBounds(prop_id))?;

        Ok(NamedProperty {
            prop_id,
            guid: self.guid(entry.guid())?,
            name: self.entry_name(entry)?,
        })
    }

    /// Find the property id assigned to `(guid, name)`, through its hash bucket when the bucket
    /// is present, otherwise by scanning every entry. Entries whose name cannot be read are
    /// skipped.
    pub fn find(&self, guid: &GuidValue, name: &NamedPropertyName) -> MessagingResult<Option<u16>> {
        let Some(guid_index) = self.guid_index(guid) else {
            return Ok(None);
        };

        if self.bucket_count > 0 {
            let hash = hash_value(guid_index, name);
            let bucket_index = (hash % u32::from(self.bucket_count)) as u16;
            match self.buckets.get(&bucket_index) {
                Some(bucket) => {
                    trace!("named property {name:?}: bucket 0x{bucket_index:04X}");
                    for candidate in bucket {
                        if candidate.guid() != guid_index {
                            continue;
                        }
                        let hit = match (name, candidate.id()) {
                            (NamedPropertyName::Number(id), NamedPropertyId::Number(other)) => {
                                *id == other
                            }
                            (
                                NamedPropertyName::String(name),
                                NamedPropertyId::StringOffset(crc),
                            ) => {
                                crc == name_crc(name)
                                    && self.matches_entry(candidate.prop_index, guid_index, name)
                            }
                            _ => false,
                        };
                        if hit {
                            return Ok(Some(candidate.prop_id()));
                        }
                    }
                }
                None => warn!(
                    "named property hash bucket 0x{bucket_index:04X} is missing, scanning entries"
                ),
            }
        }

        let found = self
            .entries
            .iter()
            .filter(|entry| entry.guid() == guid_index)
            .find(|entry| self.scanned_name(entry).as_ref() == Some(name));
        Ok(found.map(NameIdEntry::prop_id))
    }

    fn matches_entry(&self, prop_index: u16, guid_index: NamedPropertyGuid, name: &str) -> bool {
        let Some(entry) = self.entries.get(usize::from(prop_index)) else {
            return false;
        };
        if entry.guid() != guid_index {
            return false;
        }
        matches!(self.scanned_name(entry), Some(NamedPropertyName::String(other)) if other == name)
    }
}
