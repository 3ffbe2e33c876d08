//! ## [HN (Heap-on-Node)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/77ce49a3-3772-4d8d-bb2c-2f7520a238a6)

use byteorder::{LittleEndian, ReadBytesExt};
use std::{fmt::Debug, io::Read, ops::Range, sync::Arc};
use tracing::trace;

use super::*;
use crate::ndb::node_id::NodeId;

const HEAP_SIGNATURE: u8 = 0xEC;

/// Largest `hidIndex` that fits in the 11 bits between `hidType` and `hidBlockIndex`.
pub const MAX_HEAP_INDEX: u16 = (1 << 11) - 1;

/// [HID](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/85b9e985-ea53-447f-b70c-eb82bfbdcbc9)
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HeapId(u32);

impl HeapId {
    /// `index` is 1-based, as stored in the file.
    pub fn new(index: u16, block_index: u16) -> LtpResult<Self> {
        if index == 0 || index > MAX_HEAP_INDEX {
            return Err(LtpError::InvalidHeapIndex(index));
        }
        Ok(Self((u32::from(block_index) << 16) | (u32::from(index) << 5)))
    }

    /// `hidType`, which must be [NodeIdType::HeapNode] for a valid `HID`.
    pub fn id_type(&self) -> LtpResult<NodeIdType> {
        Ok(NodeId::from(self.0).id_type()?)
    }

    /// `hidIndex`: 1-based index into the `HNPAGEMAP` of the block.
    pub fn index(&self) -> u16 {
        ((self.0 >> 5) & u32::from(MAX_HEAP_INDEX)) as u16
    }

    /// `hidBlockIndex`: 0-based index into the data tree of the heap.
    pub fn block_index(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl Debug for HeapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HeapId {{ block: 0x{:04X}, index: 0x{:03X} }}",
            self.block_index(),
            self.index()
        )
    }
}

impl From<u32> for HeapId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<HeapId> for u32 {
    fn from(value: HeapId) -> Self {
        value.0
    }
}

/// `bClientSig`
///
/// ### See also
/// [HeapNodeHeader]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HeapNodeType {
    /// `bTypeReserved1`: Reserved
    Reserved1 = 0x6C,
    /// `bTypeTC`: Table Context (TC/HN)
    Table = 0x7C,
    /// `bTypeReserved2`: Reserved
    Reserved2 = 0x8C,
    /// `bTypeReserved3`: Reserved
    Reserved3 = 0x9C,
    /// `bTypeReserved4`: Reserved
    Reserved4 = 0xA5,
    /// `bTypeReserved5`: Reserved
    Reserved5 = 0xAC,
    /// `bTypeBTH`: BTree-on-Heap (BTH)
    Tree = 0xB5,
    /// `bTypePC`: Property Context (PC/BTH)
    Properties = 0xBC,
    /// `bTypeReserved6`: Reserved
    Reserved6 = 0xCC,
}

impl TryFrom<u8> for HeapNodeType {
    type Error = LtpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x6C => Ok(Self::Reserved1),
            0x7C => Ok(Self::Table),
            0x8C => Ok(Self::Reserved2),
            0x9C => Ok(Self::Reserved3),
            0xA5 => Ok(Self::Reserved4),
            0xAC => Ok(Self::Reserved5),
            0xB5 => Ok(Self::Tree),
            0xBC => Ok(Self::Properties),
            0xCC => Ok(Self::Reserved6),
            _ => Err(LtpError::InvalidHeapNodeTypeSignature(value)),
        }
    }
}

/// `rgbFillLevel`
///
/// ### See also
/// [HeapNodeHeader], [HeapNodeBitmapHeader]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum HeapFillLevel {
    /// `FILL_LEVEL_EMPTY`: At least 3584 bytes free / data block does not exist
    #[default]
    Empty = 0x00,
    /// `FILL_LEVEL_1`: 2560-3584 bytes free
    Level1 = 0x01,
    /// `FILL_LEVEL_2`: 2048-2560 bytes free
    Level2 = 0x02,
    /// `FILL_LEVEL_3`: 1792-2048 bytes free
    Level3 = 0x03,
    /// `FILL_LEVEL_4`: 1536-1792 bytes free
    Level4 = 0x04,
    /// `FILL_LEVEL_5`: 1280-1536 bytes free
    Level5 = 0x05,
    /// `FILL_LEVEL_6`: 1024-1280 bytes free
    Level6 = 0x06,
    /// `FILL_LEVEL_7`: 768-1024 bytes free
    Level7 = 0x07,
    /// `FILL_LEVEL_8`: 512-768 bytes free
    Level8 = 0x08,
    /// `FILL_LEVEL_9`: 256-512 bytes free
    Level9 = 0x09,
    /// `FILL_LEVEL_10`: 128-256 bytes free
    Level10 = 0x0A,
    /// `FILL_LEVEL_11`: 64-128 bytes free
    Level11 = 0x0B,
    /// `FILL_LEVEL_12`: 32-64 bytes free
    Level12 = 0x0C,
    /// `FILL_LEVEL_13`: 16-32 bytes free
    Level13 = 0x0D,
    /// `FILL_LEVEL_14`: 8-16 bytes free
    Level14 = 0x0E,
    /// `FILL_LEVEL_15`: Data block has less than 8 bytes free
    Level15 = 0x0F,
}

impl TryFrom<u8> for HeapFillLevel {
    type Error = LtpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Empty),
            0x01 => Ok(Self::Level1),
            0x02 => Ok(Self::Level2),
            0x03 => Ok(Self::Level3),
            0x04 => Ok(Self::Level4),
            0x05 => Ok(Self::Level5),
            0x06 => Ok(Self::Level6),
            0x07 => Ok(Self::Level7),
            0x08 => Ok(Self::Level8),
            0x09 => Ok(Self::Level9),
            0x0A => Ok(Self::Level10),
            0x0B => Ok(Self::Level11),
            0x0C => Ok(Self::Level12),
            0x0D => Ok(Self::Level13),
            0x0E => Ok(Self::Level14),
            0x0F => Ok(Self::Level15),
            _ => Err(LtpError::InvalidHeapFillLevel(value)),
        }
    }
}

impl HeapFillLevel {
    /// Two levels per byte, low nibble first.
    fn unpack(packed: &[u8], levels: &mut [HeapFillLevel]) -> LtpResult<()> {
        for (byte, levels) in packed.iter().zip(levels.chunks_mut(2)) {
            levels[0] = HeapFillLevel::try_from(byte & 0x0F)?;
            if let Some(level) = levels.get_mut(1) {
                *level = HeapFillLevel::try_from(byte >> 4)?;
            }
        }
        Ok(())
    }
}

/// [HNHDR](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/8e4ae05c-3c24-4103-b7e5-ffef6f244834)
#[derive(Clone, Copy, Debug)]
pub struct HeapNodeHeader {
    page_map_offset: u16,
    client_signature: HeapNodeType,
    user_root: HeapId,
    fill_levels: [HeapFillLevel; 8],
}

impl HeapNodeHeader {
    pub const SIZE: usize = 12;

    pub fn read(f: &mut dyn Read) -> LtpResult<Self> {
        // ibHnpm
        let page_map_offset = f.read_u16::<LittleEndian>()?;

        // bSig
        let signature = f.read_u8()?;
        if signature != HEAP_SIGNATURE {
            return Err(LtpError::InvalidHeapNodeSignature(signature));
        }

        // bClientSig
        let client_signature = HeapNodeType::try_from(f.read_u8()?)?;

        // hidUserRoot
        let user_root = HeapId::from(f.read_u32::<LittleEndian>()?);

        // rgbFillLevel
        let mut packed = [0; 4];
        f.read_exact(&mut packed)?;
        let mut fill_levels = [HeapFillLevel::Empty; 8];
        HeapFillLevel::unpack(&packed, &mut fill_levels)?;

        Ok(Self {
            page_map_offset,
            client_signature,
            user_root,
            fill_levels,
        })
    }

    pub fn page_map_offset(&self) -> u16 {
        self.page_map_offset
    }

    pub fn client_signature(&self) -> HeapNodeType {
        self.client_signature
    }

    pub fn user_root(&self) -> HeapId {
        self.user_root
    }

    pub fn fill_levels(&self) -> &[HeapFillLevel; 8] {
        &self.fill_levels
    }
}

/// [HNPAGEHDR](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/9c34ecf8-36bc-45a1-a2df-ee35c6dc840a)
#[derive(Clone, Copy, Debug)]
pub struct HeapNodePageHeader(u16);

impl HeapNodePageHeader {
    pub fn read(f: &mut dyn Read) -> LtpResult<Self> {
        // ibHnpm
        Ok(Self(f.read_u16::<LittleEndian>()?))
    }

    pub fn page_map_offset(&self) -> u16 {
        self.0
    }
}

/// [HNBITMAPHDR](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/822e2327-b29d-4ec4-91be-45637a438d40)
#[derive(Clone, Copy, Debug)]
pub struct HeapNodeBitmapHeader {
    page_map_offset: u16,
    fill_levels: [HeapFillLevel; 128],
}

impl HeapNodeBitmapHeader {
    pub fn read(f: &mut dyn Read) -> LtpResult<Self> {
        // ibHnpm
        let page_map_offset = f.read_u16::<LittleEndian>()?;

        // rgbFillLevel
        let mut packed = [0; 64];
        f.read_exact(&mut packed)?;
        let mut fill_levels = [HeapFillLevel::Empty; 128];
        HeapFillLevel::unpack(&packed, &mut fill_levels)?;

        Ok(Self {
            page_map_offset,
            fill_levels,
        })
    }

    pub fn page_map_offset(&self) -> u16 {
        self.page_map_offset
    }

    /// Fill levels of this block and the 127 blocks after it.
    pub fn fill_levels(&self) -> &[HeapFillLevel; 128] {
        &self.fill_levels
    }
}

/// Blocks 8, 136, 264, ... start with an [HeapNodeBitmapHeader].
pub const fn is_bitmap_block(block_index: usize) -> bool {
    block_index >= 8 && (block_index - 8) % 128 == 0
}

/// [HNPAGEMAP](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/291653c0-b347-4c5b-ba41-85ad780b4ba4)
#[derive(Clone, Default, Debug)]
pub struct HeapNodePageMap {
    offsets: Vec<u16>,
    free_count: u16,
}

impl HeapNodePageMap {
    /// Parse the page map at `page_map_offset`, checking that every allocation lies between the
    /// block header and the page map itself.
    pub fn read(data: &[u8], page_map_offset: u16, header_size: usize) -> LtpResult<Self> {
        let start = usize::from(page_map_offset);
        if start < header_size || start > data.len() {
            return Err(LtpError::InvalidHeapPageMapOffset(page_map_offset));
        }
        let mut cursor = &data[start..];
        check_size("HNPAGEMAP", cursor, 4)?;

        // cAlloc
        let alloc_count = cursor.read_u16::<LittleEndian>()?;
        // cFree
        let free_count = cursor.read_u16::<LittleEndian>()?;

        // rgibAlloc
        let count = usize::from(alloc_count) + 1;
        check_size("HNPAGEMAP rgibAlloc", cursor, count * 2)?;
        let offsets = (0..count)
            .map(|_| cursor.read_u16::<LittleEndian>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut last = header_size;
        for &offset in offsets.iter() {
            let offset_value = usize::from(offset);
            if offset_value < last || offset_value > start {
                return Err(LtpError::InvalidHeapPageAllocOffset(offset));
            }
            last = offset_value;
        }

        Ok(Self {
            offsets,
            free_count,
        })
    }

    /// `cAlloc`
    pub fn alloc_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// `cFree`
    pub fn free_count(&self) -> u16 {
        self.free_count
    }

    /// Byte range of the 1-based allocation `index`.
    pub fn range(&self, index: u16) -> Option<Range<usize>> {
        let index = usize::from(index);
        if index == 0 || index > self.alloc_count() {
            return None;
        }
        Some(usize::from(self.offsets[index - 1])..usize::from(self.offsets[index]))
    }
}

struct HeapBlock {
    data: Arc<[u8]>,
    page_map: HeapNodePageMap,
    bitmap: Option<HeapNodeBitmapHeader>,
}

/// One node's data tree parsed as a heap: the `HNHDR` from the first block, and the page map of
/// every block.
pub struct HeapNode {
    header: HeapNodeHeader,
    blocks: Vec<HeapBlock>,
}

impl HeapNode {
    pub fn read(node: &Node<'_>) -> LtpResult<Self> {
        let tree = node.data_tree()?;
        Self::from_blocks(tree.blocks())
    }

    pub fn from_blocks(data_blocks: &[Arc<[u8]>]) -> LtpResult<Self> {
        let Some(first) = data_blocks.first() else {
            return Err(LtpError::Truncated("HNHDR", HeapNodeHeader::SIZE, 0));
        };
        check_size("HNHDR", first, HeapNodeHeader::SIZE)?;
        let header = HeapNodeHeader::read(&mut &first[..])?;

        let mut blocks = Vec::with_capacity(data_blocks.len());
        for (index, data) in data_blocks.iter().enumerate() {
            let (page_map_offset, header_size, bitmap) = if index == 0 {
                (header.page_map_offset(), HeapNodeHeader::SIZE, None)
            } else if is_bitmap_block(index) {
                check_size("HNBITMAPHDR", data, 66)?;
                let bitmap = HeapNodeBitmapHeader::read(&mut &data[..])?;
                (bitmap.page_map_offset(), 66, Some(bitmap))
            } else {
                check_size("HNPAGEHDR", data, 2)?;
                let page = HeapNodePageHeader::read(&mut &data[..])?;
                (page.page_map_offset(), 2, None)
            };

            let page_map = HeapNodePageMap::read(data, page_map_offset, header_size)?;
            blocks.push(HeapBlock {
                data: data.clone(),
                page_map,
                bitmap,
            });
        }

        trace!(
            "heap {:?}: {} blocks, root {:?}",
            header.client_signature(),
            blocks.len(),
            header.user_root()
        );
        Ok(Self { header, blocks })
    }

    pub fn header(&self) -> &HeapNodeHeader {
        &self.header
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The page map of block `block_index`.
    pub fn page_map(&self, block_index: u16) -> LtpResult<&HeapNodePageMap> {
        self.blocks
            .get(usize::from(block_index))
            .map(|block| &block.page_map)
            .ok_or(LtpError::HeapBlockIndexNotFound(block_index))
    }

    /// The `HNBITMAPHDR` of block `block_index`, if it is a bitmap block.
    pub fn bitmap(&self, block_index: u16) -> LtpResult<Option<&HeapNodeBitmapHeader>> {
        self.blocks
            .get(usize::from(block_index))
            .map(|block| block.bitmap.as_ref())
            .ok_or(LtpError::HeapBlockIndexNotFound(block_index))
    }

    /// The block and byte range which hold `heap_id`.
    pub fn locate(&self, heap_id: HeapId) -> LtpResult<(u16, Range<usize>)> {
        let id_type = heap_id.id_type()?;
        if id_type != NodeIdType::HeapNode {
            return Err(LtpError::InvalidHeapNodeType(id_type));
        }

        let block_index = heap_id.block_index();
        let range = self
            .page_map(block_index)?
            .range(heap_id.index())
            .ok_or(LtpError::InvalidHeapIndex(heap_id.index()))?;
        Ok((block_index, range))
    }

    pub fn find_entry(&self, heap_id: HeapId) -> LtpResult<&[u8]> {
        let (block_index, range) = self.locate(heap_id)?;
        Ok(&self.blocks[usize::from(block_index)].data[range])
    }

    /// Read an `HNID`: `0` is an empty value, a `HID` is an allocation in this heap, and any other
    /// `NID` is a subnode of `node`.
    pub fn read_hnid(&self, node: &Node<'_>, hnid: u32) -> LtpResult<Vec<u8>> {
        if hnid == 0 {
            return Ok(Vec::new());
        }

        let node_id = NodeId::from(hnid);
        match node_id.id_type() {
            Ok(NodeIdType::HeapNode) => Ok(self.find_entry(HeapId::from(hnid))?.to_vec()),
            _ => Ok(node.sub_node(node_id)?.read_data()?),
        }
    }
}
