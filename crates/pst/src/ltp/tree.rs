//! ## [BTree-on-Heap (BTH)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/2dd1a95a-c8b1-4ac5-87d1-10cb8de64053)
//!
//! Keys are compared as little-endian unsigned integers of `cbKey` bytes. Records stay in their
//! on-disk form; callers decode the data part themselves.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Read;

use super::{heap::*, *};

/// `BTHHEADER`
#[derive(Clone, Copy, Debug)]
pub struct HeapTreeHeader {
    key_size: u8,
    entry_size: u8,
    levels: u8,
    root: HeapId,
}

impl HeapTreeHeader {
    pub const SIZE: usize = 8;

    pub fn read(f: &mut dyn Read) -> LtpResult<Self> {
        // bType
        let heap_type = HeapNodeType::try_from(f.read_u8()?)?;
        if heap_type != HeapNodeType::Tree {
            return Err(LtpError::InvalidHeapTreeNodeType(heap_type));
        }

        // cbKey
        let key_size = f.read_u8()?;
        if !matches!(key_size, 2 | 4 | 8 | 16) {
            return Err(LtpError::InvalidHeapTreeKeySize(key_size));
        }

        // cbEnt
        let entry_size = f.read_u8()?;
        if !(1..=32).contains(&entry_size) {
            return Err(LtpError::InvalidHeapTreeDataSize(entry_size));
        }

        // bIdxLevels
        let levels = f.read_u8()?;

        // hidRoot
        let root = HeapId::from(f.read_u32::<LittleEndian>()?);

        Ok(Self {
            key_size,
            entry_size,
            levels,
            root,
        })
    }

    pub fn key_size(&self) -> u8 {
        self.key_size
    }

    pub fn entry_size(&self) -> u8 {
        self.entry_size
    }

    pub fn levels(&self) -> u8 {
        self.levels
    }

    /// `hidRoot`; a null `HID` is an empty tree.
    pub fn root(&self) -> HeapId {
        self.root
    }
}

/// One leaf record: `key` is `cbKey` bytes, and `data` is `cbEnt` bytes.
///
/// ### See also
/// [Leaf BTH (Data) Records](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/660db569-c8f7-4516-82ad-44709b1c667f)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapTreeRecord<'h> {
    key: &'h [u8],
    data: &'h [u8],
}

impl<'h> HeapTreeRecord<'h> {
    pub fn key(&self) -> &'h [u8] {
        self.key
    }

    pub fn data(&self) -> &'h [u8] {
        self.data
    }

    /// The key widened to an integer.
    pub fn key_value(&self) -> u128 {
        key_value(self.key)
    }
}

fn key_value(key: &[u8]) -> u128 {
    key.iter()
        .rev()
        .fold(0_u128, |value, &byte| (value << 8) | u128::from(byte))
}

/// A BTH whose header lives at `hid` in `heap`.
pub struct HeapTree<'h> {
    heap: &'h HeapNode,
    header: HeapTreeHeader,
}

impl<'h> HeapTree<'h> {
    pub fn read(heap: &'h HeapNode, hid: HeapId) -> LtpResult<Self> {
        let data = heap.find_entry(hid)?;
        check_size("BTHHEADER", data, HeapTreeHeader::SIZE)?;
        let header = HeapTreeHeader::read(&mut &data[..])?;
        Ok(Self { heap, header })
    }

    pub fn header(&self) -> &HeapTreeHeader {
        &self.header
    }

    fn key_size(&self) -> usize {
        usize::from(self.header.key_size)
    }

    /// Intermediate records are a key and a `HID`; leaf records are a key and `cbEnt` bytes.
    fn record_size(&self, level: u8) -> usize {
        if level == 0 {
            self.key_size() + usize::from(self.header.entry_size)
        } else {
            self.key_size() + 4
        }
    }

    fn records(&self, hid: HeapId, level: u8) -> LtpResult<impl Iterator<Item = &'h [u8]>> {
        let data = self.heap.find_entry(hid)?;
        let record_size = self.record_size(level);
        if data.len() % record_size != 0 {
            return Err(LtpError::InvalidHeapTreeRecordsSize(data.len()));
        }
        Ok(data.chunks_exact(record_size))
    }

    fn child(&self, record: &[u8]) -> HeapId {
        HeapId::from(LittleEndian::read_u32(&record[self.key_size()..]))
    }

    /// Every leaf record in key order.
    pub fn entries(&self) -> LtpResult<Vec<HeapTreeRecord<'h>>> {
        let mut entries = Vec::new();
        if !self.header.root.is_null() {
            self.collect(self.header.root, self.header.levels, &mut entries)?;
        }
        Ok(entries)
    }

    fn collect(
        &self,
        hid: HeapId,
        level: u8,
        entries: &mut Vec<HeapTreeRecord<'h>>,
    ) -> LtpResult<()> {
        let key_size = self.key_size();
        for record in self.records(hid, level)? {
            if level == 0 {
                let (key, data) = record.split_at(key_size);
                entries.push(HeapTreeRecord { key, data });
            } else {
                self.collect(self.child(record), level - 1, entries)?;
            }
        }
        Ok(())
    }

    /// Binary search for the leaf record with exactly `key`.
    pub fn find(&self, key: u128) -> LtpResult<Option<HeapTreeRecord<'h>>> {
        if self.header.root.is_null() {
            return Ok(None);
        }

        let key_size = self.key_size();
        let mut hid = self.header.root;
        let mut level = self.header.levels;
        loop {
            let records: Vec<_> = self.records(hid, level)?.collect();
            if level == 0 {
                let found = records
                    .binary_search_by(|record| key_value(&record[..key_size]).cmp(&key))
                    .ok()
                    .map(|index| {
                        let (key, data) = records[index].split_at(key_size);
                        HeapTreeRecord { key, data }
                    });
                return Ok(found);
            }

            let index = records.partition_point(|record| key_value(&record[..key_size]) <= key);
            let Some(index) = index.checked_sub(1) else {
                return Ok(None);
            };
            hid = self.child(records[index]);
            level -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// A heap whose allocations are `items`, in order, starting at `HID` `0x20`.
    fn heap(items: &[Vec<u8>]) -> HeapNode {
        let mut data = vec![0; HeapNodeHeader::SIZE];
        let mut offsets = vec![data.len() as u16];
        for item in items {
            data.extend_from_slice(item);
            offsets.push(data.len() as u16);
        }
        let page_map_offset = data.len() as u16;
        data.extend_from_slice(&(items.len() as u16).to_le_bytes());
        data.extend_from_slice(&[0, 0]);
        for offset in offsets {
            data.extend_from_slice(&offset.to_le_bytes());
        }
        data[0..2].copy_from_slice(&page_map_offset.to_le_bytes());
        data[2] = 0xEC;
        data[3] = HeapNodeType::Properties as u8;
        data[4..8].copy_from_slice(&0x20_u32.to_le_bytes());

        let block: Arc<[u8]> = data.into();
        HeapNode::from_blocks(&[block]).unwrap()
    }

    fn header(key_size: u8, entry_size: u8, levels: u8, root: u32) -> Vec<u8> {
        let mut data = vec![HeapNodeType::Tree as u8, key_size, entry_size, levels];
        data.extend_from_slice(&root.to_le_bytes());
        data
    }

    fn leaf(records: &[(u16, u32)]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|(key, value)| {
                let mut record = key.to_le_bytes().to_vec();
                record.extend_from_slice(&value.to_le_bytes());
                record
            })
            .collect()
    }

    #[test]
    fn test_single_level() {
        let heap = heap(&[
            header(2, 4, 0, 0x40),
            leaf(&[(0x0037, 1), (0x0E07, 2), (0x3001, 3)]),
        ]);
        let tree = HeapTree::read(&heap, HeapId::from(0x20)).unwrap();

        let entries = tree.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].key_value(), 0x0E07);
        assert_eq!(entries[1].data(), &2_u32.to_le_bytes());

        let found = tree.find(0x3001).unwrap().unwrap();
        assert_eq!(found.data(), &3_u32.to_le_bytes());
        assert!(tree.find(0x0038).unwrap().is_none());
    }

    #[test]
    fn test_two_levels() {
        let mut index = Vec::new();
        index.extend_from_slice(&0x0001_u16.to_le_bytes());
        index.extend_from_slice(&0x60_u32.to_le_bytes());
        index.extend_from_slice(&0x1000_u16.to_le_bytes());
        index.extend_from_slice(&0x80_u32.to_le_bytes());

        let heap = heap(&[
            header(2, 4, 1, 0x40),
            index,
            leaf(&[(0x0001, 10), (0x0037, 11)]),
            leaf(&[(0x1000, 12), (0x8005, 13)]),
        ]);
        let tree = HeapTree::read(&heap, HeapId::from(0x20)).unwrap();

        let keys: Vec<_> = tree
            .entries()
            .unwrap()
            .iter()
            .map(|record| record.key_value())
            .collect();
        assert_eq!(keys, vec![0x0001, 0x0037, 0x1000, 0x8005]);

        let found = tree.find(0x8005).unwrap().unwrap();
        assert_eq!(found.data(), &13_u32.to_le_bytes());
        let found = tree.find(0x0037).unwrap().unwrap();
        assert_eq!(found.data(), &11_u32.to_le_bytes());
        assert!(tree.find(0x0000).unwrap().is_none());
        assert!(tree.find(0x0FFF).unwrap().is_none());
    }

    #[test]
    fn test_empty_tree() {
        let heap = heap(&[header(4, 4, 0, 0)]);
        let tree = HeapTree::read(&heap, HeapId::from(0x20)).unwrap();
        assert!(tree.entries().unwrap().is_empty());
        assert!(tree.find(1).unwrap().is_none());
    }

    #[test]
    fn test_invalid_key_size() {
        let heap = heap(&[header(3, 4, 0, 0)]);
        let Err(LtpError::InvalidHeapTreeKeySize(3)) = HeapTree::read(&heap, HeapId::from(0x20))
        else {
            panic!("cbKey must be 2, 4, 8, or 16");
        };
    }
}
