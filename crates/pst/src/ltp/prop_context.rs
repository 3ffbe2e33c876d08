//! ## [Property Context (PC)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/294c83c6-ff92-42f5-b6b6-876c29fa9737)

use byteorder::{ByteOrder, LittleEndian};
use std::vec;

use super::{heap::*, prop_type::*, tree::*, *};

/// [PC BTH Record](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/7daab6f5-ce65-437e-80d5-1b1be4088bd3)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyRecord {
    prop_id: u16,
    prop_type: PropertyType,
    value: u32,
}

impl PropertyRecord {
    fn read(record: HeapTreeRecord<'_>) -> LtpResult<Self> {
        let data = record.data();
        // wPropId
        let prop_id = LittleEndian::read_u16(record.key());
        // wPropType
        let prop_type = PropertyType::try_from(LittleEndian::read_u16(&data[0..2]))?;
        // dwValueHnid
        let value = LittleEndian::read_u32(&data[2..6]);

        Ok(Self {
            prop_id,
            prop_type,
            value,
        })
    }

    pub fn prop_id(&self) -> u16 {
        self.prop_id
    }

    pub fn prop_type(&self) -> PropertyType {
        self.prop_type
    }

    /// `dwValueHnid`: the value itself for types of up to 4 bytes, otherwise a `HID` or `HNID`.
    pub fn value(&self) -> u32 {
        self.value
    }
}

/// A property bag: the BTH at `hidUserRoot` of a heap with `bClientSig` `0xBC`.
pub struct PropertyContext<'a> {
    node: Node<'a>,
    heap: HeapNode,
}

impl<'a> PropertyContext<'a> {
    pub fn read(node: Node<'a>) -> LtpResult<Self> {
        let heap = HeapNode::read(&node)?;
        Self::from_heap(node, heap)
    }

    pub fn from_heap(node: Node<'a>, heap: HeapNode) -> LtpResult<Self> {
        let client_signature = heap.header().client_signature();
        if client_signature != HeapNodeType::Properties {
            return Err(LtpError::UnexpectedHeapNodeType(client_signature));
        }

        let context = Self { node, heap };
        let header = *context.tree()?.header();
        if header.key_size() != 2 || header.entry_size() != 6 {
            return Err(LtpError::InvalidPropertyTreeEntrySize(
                header.key_size(),
                header.entry_size(),
            ));
        }
        Ok(context)
    }

    pub fn node(&self) -> &Node<'a> {
        &self.node
    }

    pub fn heap(&self) -> &HeapNode {
        &self.heap
    }

    fn tree(&self) -> LtpResult<HeapTree<'_>> {
        HeapTree::read(&self.heap, self.heap.header().user_root())
    }

    /// Every record, ordered by property id.
    pub fn records(&self) -> LtpResult<Vec<PropertyRecord>> {
        self.tree()?
            .entries()?
            .into_iter()
            .map(PropertyRecord::read)
            .collect()
    }

    pub fn record(&self, prop_id: u16) -> LtpResult<Option<PropertyRecord>> {
        self.tree()?
            .find(u128::from(prop_id))?
            .map(PropertyRecord::read)
            .transpose()
    }

    /// The value of `prop_id`, or `None` if the bag does not have it.
    pub fn get(&self, prop_id: u16) -> LtpResult<Option<PropertyValue>> {
        self.record(prop_id)?
            .map(|record| self.read_value(&record))
            .transpose()
    }

    /// Decode the value a record refers to.
    pub fn read_value(&self, record: &PropertyRecord) -> LtpResult<PropertyValue> {
        PropertyValue::read(record.prop_type(), &self.read_bytes(record)?)
    }

    /// The stored bytes of the value a record refers to, before any decoding.
    pub fn read_bytes(&self, record: &PropertyRecord) -> LtpResult<Vec<u8>> {
        let prop_type = record.prop_type();
        if prop_type.is_inline() {
            let size = prop_type.fixed_size().unwrap_or_default();
            return Ok(record.value().to_le_bytes()[..size].to_vec());
        }

        if prop_type.fixed_size().is_some() || prop_type == PropertyType::Object {
            return Ok(self.heap.find_entry(HeapId::from(record.value()))?.to_vec());
        }

        self.heap.read_hnid(&self.node, record.value())
    }

    /// Every property in id order. Values are decoded as the iterator advances, and each call
    /// starts over from the first record.
    pub fn values(&self) -> LtpResult<PropertyValues<'_, 'a>> {
        Ok(PropertyValues {
            context: self,
            records: self.records()?.into_iter(),
        })
    }
}

pub struct PropertyValues<'c, 'a> {
    context: &'c PropertyContext<'a>,
    records: vec::IntoIter<PropertyRecord>,
}

impl Iterator for PropertyValues<'_, '_> {
    type Item = LtpResult<(u16, PropertyValue)>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            self.context
                .read_value(&record)
                .map(|value| (record.prop_id(), value)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}
