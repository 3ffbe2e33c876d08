#![allow(dead_code)]

//! Builds small PST files in memory, with real CRCs, signatures, and block encoding.

use std::collections::BTreeMap;

use outlook_pst::{
    block_sig::compute_sig,
    crc::compute_crc,
    encode::{cyclic, permute},
    ltp::{heap::HeapNodeType, prop_type::GuidValue},
    ndb::{
        block::block_size,
        block_id::BlockId,
        block_ref::ByteIndex,
        header::{NdbCryptMethod, NdbVersion},
        page::{PageType, PAGE_SIZE},
    },
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const FIRST_BLOCK_OFFSET: u64 = 0x4400;
const FIRST_PAGE_BLOCK: u64 = 0x10_0000;

pub const NID_MESSAGE_STORE: u32 = 0x21;
pub const NID_NAME_TO_ID_MAP: u32 = 0x61;
pub const NID_ROOT_FOLDER: u32 = 0x122;
pub const NID_ROOT_HIERARCHY: u32 = 0x12D;
pub const NID_INBOX: u32 = 0x8022;
pub const NID_INBOX_HIERARCHY: u32 = 0x802D;
pub const NID_INBOX_CONTENTS: u32 = 0x802E;
pub const NID_MESSAGE_1: u32 = 0x20_0024;
pub const NID_MESSAGE_2: u32 = 0x20_0044;

/// Subnode of the inbox contents table holding its row matrix.
pub const NID_CONTENTS_ROWS: u32 = 0x5F;
/// Subnode of the first message holding [large_binary].
pub const NID_LARGE_BINARY: u32 = 0x3F;

pub const PROP_ID_LARGE_BINARY: u16 = 0x1009;
pub const LARGE_BINARY_SIZE: usize = 10_000;
pub const CREATION_TIME: i64 = 0x01DA_0000_1234_5678;

/// `PSETID_Common`, the only GUID in the sample GUID stream.
pub const PSETID_COMMON: GuidValue = GuidValue::new(
    0x00062008,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

/// `PidLidSmartNoAttach`
pub const LID_SMART_NO_ATTACH: u32 = 0x8514;
pub const NAMED_BUCKET_COUNT: u32 = 5;

pub fn large_binary() -> Vec<u8> {
    (0..LARGE_BINARY_SIZE).map(|i| (i % 251) as u8).collect()
}

pub fn unicode(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

pub fn multi_unicode(values: &[&str]) -> Vec<u8> {
    let header_size = 4 + 4 * values.len();
    let mut offsets = Vec::new();
    let mut strings = Vec::new();
    for value in values {
        offsets.push((header_size + strings.len()) as u32);
        strings.extend(unicode(value));
    }

    let mut data = (values.len() as u32).to_le_bytes().to_vec();
    for offset in offsets {
        data.extend_from_slice(&offset.to_le_bytes());
    }
    data.extend(strings);
    data
}

fn put_id(out: &mut Vec<u8>, version: NdbVersion, value: u64) {
    match version {
        NdbVersion::Ansi => out.extend_from_slice(&(value as u32).to_le_bytes()),
        NdbVersion::Unicode => out.extend_from_slice(&value.to_le_bytes()),
    }
}

/// 1-based allocation index in block 0 of a heap.
pub fn hid(index: u16) -> u32 {
    u32::from(index) << 5
}

/// `HID` of the 1-based allocation `index` in heap block `block_index`.
pub fn block_hid(block_index: u16, index: u16) -> u32 {
    (u32::from(block_index) << 16) | hid(index)
}

/// A single-block heap: `HNHDR`, one allocation per item, and the page map.
pub fn heap(client: HeapNodeType, user_root: u32, items: &[Vec<u8>]) -> Vec<u8> {
    let mut header = vec![0; 12];
    header[2] = 0xEC;
    header[3] = client as u8;
    header[4..8].copy_from_slice(&user_root.to_le_bytes());
    heap_block(header, items)
}

/// A heap block after the first: `HNPAGEHDR`, or `HNBITMAPHDR` with `fill_levels` for block 8,
/// 136, and so on.
pub fn heap_page(fill_levels: Option<[u8; 64]>, items: &[Vec<u8>]) -> Vec<u8> {
    let mut header = vec![0; 2];
    if let Some(fill_levels) = fill_levels {
        header.extend_from_slice(&fill_levels);
    }
    heap_block(header, items)
}

/// Lay out `items` after `header` and append the page map. `ibHnpm` is the first field of every
/// heap block header.
fn heap_block(header: Vec<u8>, items: &[Vec<u8>]) -> Vec<u8> {
    let mut data = header;
    let mut offsets = vec![data.len() as u16];
    for item in items {
        data.extend_from_slice(item);
        offsets.push(data.len() as u16);
    }
    if data.len() % 2 != 0 {
        data.push(0);
    }

    let page_map = data.len() as u16;
    data.extend_from_slice(&(items.len() as u16).to_le_bytes());
    data.extend_from_slice(&0_u16.to_le_bytes());
    for offset in offsets {
        data.extend_from_slice(&offset.to_le_bytes());
    }

    data[0..2].copy_from_slice(&page_map.to_le_bytes());
    data
}

pub fn bth_header(key_size: u8, entry_size: u8, root: u32) -> Vec<u8> {
    let mut data = vec![HeapNodeType::Tree as u8, key_size, entry_size, 0];
    data.extend_from_slice(&root.to_le_bytes());
    data
}

/// Where a property context stores a value.
pub enum Value {
    Inline(u32),
    Heap(Vec<u8>),
    /// A subnode `NID` of the owning node.
    Node(u32),
}

/// Sorted `PC` records for properties whose values are already `HNID`s.
pub fn property_records(props: &[(u16, u16, u32)]) -> Vec<u8> {
    let mut sorted = props.to_vec();
    sorted.sort();
    let mut records = Vec::new();
    for (prop_id, prop_type, value) in sorted {
        records.extend_from_slice(&prop_id.to_le_bytes());
        records.extend_from_slice(&prop_type.to_le_bytes());
        records.extend_from_slice(&value.to_le_bytes());
    }
    records
}

/// A property context heap. Properties may be given in any order.
pub fn property_context(props: &[(u16, u16, Value)]) -> Vec<u8> {
    let mut sorted: Vec<_> = props.iter().collect();
    sorted.sort_by_key(|(prop_id, ..)| *prop_id);

    let mut records = Vec::new();
    let mut values = Vec::new();
    for (prop_id, prop_type, value) in sorted {
        let value = match value {
            Value::Inline(value) => *value,
            Value::Node(node) => *node,
            Value::Heap(data) => {
                values.push(data.clone());
                hid(values.len() as u16 + 2)
            }
        };
        records.extend_from_slice(&prop_id.to_le_bytes());
        records.extend_from_slice(&prop_type.to_le_bytes());
        records.extend_from_slice(&value.to_le_bytes());
    }

    let root = if props.is_empty() { 0 } else { hid(2) };
    let mut items = vec![bth_header(2, 6, root), records];
    items.extend(values);
    heap(HeapNodeType::Properties, hid(1), &items)
}

pub enum RowMatrix {
    Empty,
    Heap(Vec<u8>),
    /// A subnode `NID` of the owning node.
    Node(u32),
}

/// A table context heap. `extra` allocations come first, so they are `hid(1)` to `hid(n)` and
/// row cells can refer to them. `row_ids` are in row matrix order.
pub fn table_context(
    version: NdbVersion,
    columns: &[(u32, u16, u8, u8)],
    group_offsets: [u16; 4],
    row_ids: &[u32],
    rows: RowMatrix,
    extra: &[Vec<u8>],
) -> Vec<u8> {
    let base = extra.len() as u16;
    let (row_matrix, hnid_rows) = match rows {
        RowMatrix::Empty => (None, 0),
        RowMatrix::Heap(data) => (Some(data), hid(base + 4)),
        RowMatrix::Node(node) => (None, node),
    };

    let mut info = vec![HeapNodeType::Table as u8, columns.len() as u8];
    for offset in group_offsets {
        info.extend_from_slice(&offset.to_le_bytes());
    }
    info.extend_from_slice(&hid(base + 2).to_le_bytes());
    info.extend_from_slice(&hnid_rows.to_le_bytes());
    info.extend_from_slice(&0_u32.to_le_bytes());
    for (tag, offset, size, bit) in columns {
        info.extend_from_slice(&tag.to_le_bytes());
        info.extend_from_slice(&offset.to_le_bytes());
        info.push(*size);
        info.push(*bit);
    }

    let mut index: Vec<_> = row_ids.iter().copied().zip(0_u32..).collect();
    index.sort();
    let mut records = Vec::new();
    for (row_id, row_index) in index {
        records.extend_from_slice(&row_id.to_le_bytes());
        match version {
            NdbVersion::Ansi => records.extend_from_slice(&(row_index as u16).to_le_bytes()),
            NdbVersion::Unicode => records.extend_from_slice(&row_index.to_le_bytes()),
        }
    }

    let entry_size = match version {
        NdbVersion::Ansi => 2,
        NdbVersion::Unicode => 4,
    };
    let root = if row_ids.is_empty() { 0 } else { hid(base + 3) };

    let mut items = extra.to_vec();
    items.push(info);
    items.push(bth_header(4, entry_size, root));
    items.push(records);
    if let Some(row_matrix) = row_matrix {
        items.push(row_matrix);
    }
    heap(HeapNodeType::Table, hid(base + 1), &items)
}

/// Set existence bit `bit` of a row whose bitmap starts at `bitmap`.
pub fn set_bit(row: &mut [u8], bitmap: usize, bit: u8) {
    let bit = usize::from(bit);
    row[bitmap + bit / 8] |= 1 << (7 - bit % 8);
}

/// Collects blocks and nodes, then lays out a complete file: header, blocks from `0x4400`, and
/// the NBT and BBT pages.
///
/// Each BTree is a single leaf page unless [PstBuilder::with_leaf_pages] splits it under a level 1
/// branch page.
pub struct PstBuilder {
    version: NdbVersion,
    crypt_method: NdbCryptMethod,
    next_index: u64,
    blocks: Vec<(u64, Vec<u8>)>,
    nodes: Vec<(u32, u64, u64, u32)>,
    leaf_pages: usize,
    leaf_level: u8,
}

/// A page written by [PstBuilder::build]: `(bid, ib)`.
type PageRef = (u64, u64);

impl PstBuilder {
    pub fn new(version: NdbVersion, crypt_method: NdbCryptMethod) -> Self {
        Self {
            version,
            crypt_method,
            next_index: 1,
            blocks: Vec::new(),
            nodes: Vec::new(),
            leaf_pages: 1,
            leaf_level: 0,
        }
    }

    /// Spread the entries of each BTree over `count` leaf pages below one branch page.
    pub fn with_leaf_pages(mut self, count: usize) -> Self {
        assert!(count > 0);
        self.leaf_pages = count;
        self
    }

    /// Write `cLevel` as `level` on the leaf pages under the level 1 branch page.
    pub fn with_leaf_level(mut self, level: u8) -> Self {
        self.leaf_level = level;
        self
    }

    pub fn version(&self) -> NdbVersion {
        self.version
    }

    fn next_block_id(&mut self, internal: bool) -> u64 {
        let block = (self.next_index << 2) | if internal { 0x02 } else { 0x00 };
        self.next_index += 1;
        block
    }

    pub fn add_block(&mut self, data: Vec<u8>) -> u64 {
        assert!(data.len() <= self.version.max_block_data_size());
        let block = self.next_block_id(false);
        self.blocks.push((block, data));
        block
    }

    pub fn add_internal_block(&mut self, data: Vec<u8>) -> u64 {
        let block = self.next_block_id(true);
        self.blocks.push((block, data));
        block
    }

    /// Store `data` as one block, or as an `XBLOCK` over as many blocks as it needs.
    pub fn add_data(&mut self, data: &[u8]) -> u64 {
        let max_size = self.version.max_block_data_size();
        if data.len() <= max_size {
            return self.add_block(data.to_vec());
        }

        let chunks: Vec<_> = data.chunks(max_size).map(<[u8]>::to_vec).collect();
        self.add_data_blocks(chunks)
    }

    /// An `XBLOCK` over one external block per entry of `blocks`.
    pub fn add_data_blocks(&mut self, blocks: Vec<Vec<u8>>) -> u64 {
        let total_size = blocks.iter().map(Vec::len).sum::<usize>() as u32;
        let children: Vec<_> = blocks
            .into_iter()
            .map(|block| self.add_block(block))
            .collect();
        self.add_data_tree_block(1, total_size, &children)
    }

    /// An `XXBLOCK` over one `XBLOCK` per group of `blocks`.
    pub fn add_nested_data_blocks(&mut self, groups: Vec<Vec<Vec<u8>>>) -> u64 {
        let total_size = groups
            .iter()
            .flatten()
            .map(Vec::len)
            .sum::<usize>() as u32;
        let children: Vec<_> = groups
            .into_iter()
            .map(|blocks| self.add_data_blocks(blocks))
            .collect();
        self.add_data_tree_block(2, total_size, &children)
    }

    /// An `XBLOCK` or `XXBLOCK` with an explicit `lcbTotal`.
    pub fn add_data_tree_block(&mut self, level: u8, total_size: u32, children: &[u64]) -> u64 {
        let mut data = vec![0x01, level];
        data.extend_from_slice(&(children.len() as u16).to_le_bytes());
        data.extend_from_slice(&total_size.to_le_bytes());
        for &child in children {
            put_id(&mut data, self.version, child);
        }
        self.add_internal_block(data)
    }

    /// An `SLBLOCK` of `(nid, bidData, bidSub)` entries, which must be sorted by `nid`.
    pub fn add_sub_node_leaf(&mut self, entries: &[(u32, u64, u64)]) -> u64 {
        let mut data = vec![0x02, 0x00];
        data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        if self.version == NdbVersion::Unicode {
            data.extend_from_slice(&0_u32.to_le_bytes());
        }
        for &(node, block, sub_node) in entries {
            put_id(&mut data, self.version, u64::from(node));
            put_id(&mut data, self.version, block);
            put_id(&mut data, self.version, sub_node);
        }
        self.add_internal_block(data)
    }

    /// An `SIBLOCK` of `(nid, bid)` entries, each naming the first subnode of an `SLBLOCK`.
    pub fn add_sub_node_branch(&mut self, entries: &[(u32, u64)]) -> u64 {
        let mut data = vec![0x02, 0x01];
        data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        if self.version == NdbVersion::Unicode {
            data.extend_from_slice(&0_u32.to_le_bytes());
        }
        for &(node, block) in entries {
            put_id(&mut data, self.version, u64::from(node));
            put_id(&mut data, self.version, block);
        }
        self.add_internal_block(data)
    }

    pub fn add_node(&mut self, node: u32, data: u64, sub_node: u64, parent: u32) {
        self.nodes.push((node, data, sub_node, parent));
    }

    /// File offset of every block, in the order they were added.
    fn layout(&self) -> Vec<u64> {
        let trailer_size = self.version.block_trailer_size();
        let mut offset = FIRST_BLOCK_OFFSET;
        self.blocks
            .iter()
            .map(|(_, data)| {
                let index = offset;
                offset += block_size(data.len() + trailer_size) as u64;
                index
            })
            .collect()
    }

    pub fn block_offset(&self, block: u64) -> u64 {
        let index = self
            .blocks
            .iter()
            .position(|(id, _)| *id == block)
            .expect("unknown block");
        self.layout()[index]
    }

    pub fn build(&self) -> Vec<u8> {
        let version = self.version;
        let trailer_size = version.block_trailer_size();
        let offsets = self.layout();

        let mut file = vec![0_u8; FIRST_BLOCK_OFFSET as usize];
        let mut bbt_entries = Vec::new();
        for ((block, data), &offset) in self.blocks.iter().zip(offsets.iter()) {
            assert_eq!(file.len() as u64, offset);
            let size = block_size(data.len() + trailer_size);

            let mut stored = data.clone();
            if block & 0x02 == 0 {
                match self.crypt_method {
                    NdbCryptMethod::None => {}
                    NdbCryptMethod::Permute => permute::encode_block(&mut stored),
                    NdbCryptMethod::Cyclic => {
                        cyclic::encode_decode_block(&mut stored, *block as u32)
                    }
                }
            }
            let crc = compute_crc(0, &stored);
            let signature = compute_sig(ByteIndex::new(offset), BlockId::new(*block));

            stored.resize(size - trailer_size, 0);
            stored.extend_from_slice(&(data.len() as u16).to_le_bytes());
            stored.extend_from_slice(&signature.to_le_bytes());
            match version {
                NdbVersion::Ansi => {
                    put_id(&mut stored, version, *block);
                    stored.extend_from_slice(&crc.to_le_bytes());
                }
                NdbVersion::Unicode => {
                    stored.extend_from_slice(&crc.to_le_bytes());
                    put_id(&mut stored, version, *block);
                }
            }
            file.extend(stored);

            let mut entry = Vec::new();
            put_id(&mut entry, version, *block);
            put_id(&mut entry, version, offset);
            entry.extend_from_slice(&(data.len() as u16).to_le_bytes());
            entry.extend_from_slice(&2_u16.to_le_bytes());
            bbt_entries.push((*block, entry));
        }

        let mut nodes = self.nodes.clone();
        nodes.sort();
        let nbt_entries: Vec<_> = nodes
            .iter()
            .map(|&(node, data, sub_node, parent)| {
                let mut entry = Vec::new();
                put_id(&mut entry, version, u64::from(node));
                put_id(&mut entry, version, data);
                put_id(&mut entry, version, sub_node);
                entry.extend_from_slice(&parent.to_le_bytes());
                (u64::from(node), entry)
            })
            .collect();
        bbt_entries.sort();

        let (nbt_entry_size, bbt_entry_size) = match version {
            NdbVersion::Ansi => (16, 12),
            NdbVersion::Unicode => (32, 24),
        };

        file.resize(file.len().div_ceil(PAGE_SIZE) * PAGE_SIZE, 0);
        let mut next_page = FIRST_PAGE_BLOCK;
        let node_btree = self.btree(
            &mut file,
            &mut next_page,
            PageType::NodeBTree,
            nbt_entry_size,
            &nbt_entries,
        );
        let block_btree = self.btree(
            &mut file,
            &mut next_page,
            PageType::BlockBTree,
            bbt_entry_size,
            &bbt_entries,
        );

        let header = self.header(node_btree, block_btree, next_page, file.len() as u64);
        file[..header.len()].copy_from_slice(&header);
        file
    }

    /// Append the pages of one BTree to `file` and return its root page.
    fn btree(
        &self,
        file: &mut Vec<u8>,
        next_page: &mut u64,
        page_type: PageType,
        entry_size: usize,
        entries: &[(u64, Vec<u8>)],
    ) -> PageRef {
        let mut write_page = |file: &mut Vec<u8>, level: u8, size: usize, entries: &[Vec<u8>]| {
            let page = (*next_page, file.len() as u64);
            *next_page += 4;
            file.extend(self.page(page_type, level, size, entries, page));
            page
        };

        if self.leaf_pages == 1 {
            let records: Vec<_> = entries.iter().map(|(_, entry)| entry.clone()).collect();
            return write_page(file, 0, entry_size, &records);
        }

        let per_page = entries.len().div_ceil(self.leaf_pages).max(1);
        let mut branches = Vec::new();
        for chunk in entries.chunks(per_page) {
            let leaf: Vec<_> = chunk.iter().map(|(_, entry)| entry.clone()).collect();
            let (block, index) = write_page(file, self.leaf_level, entry_size, &leaf);

            let mut branch = Vec::new();
            put_id(&mut branch, self.version, chunk[0].0);
            put_id(&mut branch, self.version, block);
            put_id(&mut branch, self.version, index);
            branches.push(branch);
        }
        let branch_size = 3 * self.version.id_size();
        write_page(file, 1, branch_size, &branches)
    }

    fn page(
        &self,
        page_type: PageType,
        level: u8,
        entry_size: usize,
        entries: &[Vec<u8>],
        (block, offset): PageRef,
    ) -> Vec<u8> {
        let version = self.version;
        let entries_size = match version {
            NdbVersion::Ansi => 496,
            NdbVersion::Unicode => 488,
        };
        assert!(entries.len() * entry_size <= entries_size, "page is full");

        let mut page = vec![0_u8; PAGE_SIZE];
        for (index, entry) in entries.iter().enumerate() {
            let start = index * entry_size;
            page[start..start + entry.len()].copy_from_slice(entry);
        }
        page[entries_size] = entries.len() as u8;
        page[entries_size + 1] = (entries_size / entry_size) as u8;
        page[entries_size + 2] = entry_size as u8;
        page[entries_size + 3] = level;

        let trailer = PAGE_SIZE - version.page_trailer_size();
        page[trailer] = page_type as u8;
        page[trailer + 1] = page_type as u8;
        let signature = compute_sig(ByteIndex::new(offset), BlockId::new(block));
        page[trailer + 2..trailer + 4].copy_from_slice(&signature.to_le_bytes());
        let crc = compute_crc(0, &page[..trailer]);
        match version {
            NdbVersion::Ansi => {
                page[trailer + 4..trailer + 8].copy_from_slice(&(block as u32).to_le_bytes());
                page[trailer + 8..trailer + 12].copy_from_slice(&crc.to_le_bytes());
            }
            NdbVersion::Unicode => {
                page[trailer + 4..trailer + 8].copy_from_slice(&crc.to_le_bytes());
                page[trailer + 8..trailer + 16].copy_from_slice(&block.to_le_bytes());
            }
        }
        page
    }

    fn header(
        &self,
        node_btree: PageRef,
        block_btree: PageRef,
        next_page: u64,
        file_size: u64,
    ) -> Vec<u8> {
        let version = self.version;
        let next_block = self.next_index << 2;

        let mut header = Vec::new();
        // dwMagic, dwCRCPartial, wMagicClient
        header.extend_from_slice(b"!BDN");
        header.extend_from_slice(&0_u32.to_le_bytes());
        header.extend_from_slice(b"SM");
        // wVer, wVerClient
        let raw_version: u16 = match version {
            NdbVersion::Ansi => 15,
            NdbVersion::Unicode => 23,
        };
        header.extend_from_slice(&raw_version.to_le_bytes());
        header.extend_from_slice(&19_u16.to_le_bytes());
        // bPlatformCreate, bPlatformAccess, dwReserved1, dwReserved2
        header.extend_from_slice(&[0x01, 0x01]);
        header.extend_from_slice(&[0; 8]);

        match version {
            NdbVersion::Ansi => {
                put_id(&mut header, version, next_block);
                put_id(&mut header, version, next_page);
            }
            NdbVersion::Unicode => {
                put_id(&mut header, version, 0);
                put_id(&mut header, version, next_page);
            }
        }
        // dwUnique, rgnid
        header.extend_from_slice(&1_u32.to_le_bytes());
        header.extend_from_slice(&[0; 128]);
        if version == NdbVersion::Unicode {
            header.extend_from_slice(&[0; 8]);
        }

        // ROOT
        header.extend_from_slice(&0_u32.to_le_bytes());
        put_id(&mut header, version, file_size);
        put_id(&mut header, version, 0);
        put_id(&mut header, version, 0);
        put_id(&mut header, version, 0);
        put_id(&mut header, version, node_btree.0);
        put_id(&mut header, version, node_btree.1);
        put_id(&mut header, version, block_btree.0);
        put_id(&mut header, version, block_btree.1);
        header.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);

        if version == NdbVersion::Unicode {
            header.extend_from_slice(&0_u32.to_le_bytes());
        }
        // rgbFM, rgbFP
        header.extend_from_slice(&[0xFF; 256]);
        // bSentinel, bCryptMethod, rgbReserved
        header.push(0x80);
        header.push(self.crypt_method as u8);
        header.extend_from_slice(&[0; 2]);

        let header_size = match version {
            NdbVersion::Ansi => 512,
            NdbVersion::Unicode => {
                put_id(&mut header, version, next_block);
                564
            }
        };
        header.resize(header_size, 0);

        let crc = compute_crc(0, &header[8..8 + 471]);
        header[4..8].copy_from_slice(&crc.to_le_bytes());
        if version == NdbVersion::Unicode {
            let crc = compute_crc(0, &header[8..8 + 516]);
            header[524..528].copy_from_slice(&crc.to_le_bytes());
        }
        header
    }
}

pub struct SamplePst {
    pub data: Vec<u8>,
    /// File offset of the first message's property context block.
    pub message_block_offset: u64,
}

const HIERARCHY_COLUMNS: [(u32, u16, u8, u8); 4] = [
    (0x67F2_0003, 0, 4, 0),
    (0x67F3_0003, 4, 4, 1),
    (0x3001_001F, 8, 4, 2),
    (0x3602_0003, 12, 4, 3),
];

const CONTENTS_COLUMNS: [(u32, u16, u8, u8); 5] = [
    (0x67F2_0003, 0, 4, 0),
    (0x67F3_0003, 4, 4, 1),
    (0x674A_0014, 8, 8, 2),
    (0x0037_001F, 16, 4, 3),
    (0x0E07_0003, 20, 4, 4),
];

fn contents_row(message: u32, subject: u32, flags: Option<u32>) -> Vec<u8> {
    let mut row = vec![0; 25];
    row[0..4].copy_from_slice(&message.to_le_bytes());
    row[4..8].copy_from_slice(&1_u32.to_le_bytes());
    row[8..16].copy_from_slice(&u64::from(message).to_le_bytes());
    row[16..20].copy_from_slice(&subject.to_le_bytes());
    for bit in 0..4 {
        set_bit(&mut row, 24, bit);
    }
    if let Some(flags) = flags {
        row[20..24].copy_from_slice(&flags.to_le_bytes());
        set_bit(&mut row, 24, 4);
    }
    row
}

fn name_to_id_map() -> Vec<u8> {
    let keywords = unicode("Keywords");
    let mut strings = (keywords.len() as u32).to_le_bytes().to_vec();
    strings.extend_from_slice(&keywords);

    let numeric_guid: u16 = 3;
    let string_guid: u16 = 2;
    let name_id = |id: u32, guid: u16, is_string: bool, index: u16| {
        let mut data = id.to_le_bytes().to_vec();
        data.extend_from_slice(&((guid << 1) | u16::from(is_string)).to_le_bytes());
        data.extend_from_slice(&index.to_le_bytes());
        data
    };

    let mut entries = name_id(LID_SMART_NO_ATTACH, numeric_guid, false, 0);
    entries.extend(name_id(0, string_guid, true, 1));

    let keywords_crc = compute_crc(0, &keywords);
    let mut buckets: BTreeMap<u32, Vec<u8>> = BTreeMap::new();
    let numeric_hash = LID_SMART_NO_ATTACH ^ (u32::from(numeric_guid) << 1);
    buckets
        .entry(numeric_hash % NAMED_BUCKET_COUNT)
        .or_default()
        .extend(name_id(LID_SMART_NO_ATTACH, numeric_guid, false, 0));
    let string_hash = keywords_crc ^ ((u32::from(string_guid) << 1) | 1);
    buckets
        .entry(string_hash % NAMED_BUCKET_COUNT)
        .or_default()
        .extend(name_id(keywords_crc, string_guid, true, 1));

    let mut props = vec![
        (0x0001, 0x0003, Value::Inline(NAMED_BUCKET_COUNT)),
        (0x0002, 0x0102, Value::Heap(PSETID_COMMON.to_bytes().to_vec())),
        (0x0003, 0x0102, Value::Heap(entries)),
        (0x0004, 0x0102, Value::Heap(strings)),
    ];
    for (bucket, data) in buckets {
        props.push((0x1000 + bucket as u16, 0x0102, Value::Heap(data)));
    }
    property_context(&props)
}

/// A store with a root folder, an inbox, and two messages in the inbox.
///
/// The first message has subject "Hello", the read flag, two named properties, and a
/// [large_binary] in a subnode. The second has subject "World" and no flags in the contents
/// table. The contents table keeps its rows in a subnode.
pub fn sample_pst(version: NdbVersion, crypt_method: NdbCryptMethod) -> SamplePst {
    sample_pst_with(PstBuilder::new(version, crypt_method))
}

/// [sample_pst] laid out by `pst`.
pub fn sample_pst_with(mut pst: PstBuilder) -> SamplePst {
    let version = pst.version();

    let store = pst.add_block(property_context(&[
        (0x3001, 0x001F, Value::Heap(unicode("Sample Store"))),
        (0x0FF9, 0x0102, Value::Heap((0..16).collect())),
    ]));
    pst.add_node(NID_MESSAGE_STORE, store, 0, 0);

    let name_map = pst.add_block(name_to_id_map());
    pst.add_node(NID_NAME_TO_ID_MAP, name_map, 0, 0);

    let root = pst.add_block(property_context(&[
        (0x3001, 0x001F, Value::Heap(Vec::new())),
        (0x3602, 0x0003, Value::Inline(0)),
        (0x360A, 0x000B, Value::Inline(1)),
    ]));
    pst.add_node(NID_ROOT_FOLDER, root, 0, NID_ROOT_FOLDER);

    let mut inbox_row = vec![0; 17];
    inbox_row[0..4].copy_from_slice(&NID_INBOX.to_le_bytes());
    inbox_row[4..8].copy_from_slice(&1_u32.to_le_bytes());
    inbox_row[8..12].copy_from_slice(&hid(1).to_le_bytes());
    inbox_row[12..16].copy_from_slice(&2_u32.to_le_bytes());
    for bit in 0..4 {
        set_bit(&mut inbox_row, 16, bit);
    }
    let root_hierarchy = pst.add_block(table_context(
        version,
        &HIERARCHY_COLUMNS,
        [16, 16, 16, 17],
        &[NID_INBOX],
        RowMatrix::Heap(inbox_row),
        &[unicode("Inbox")],
    ));
    pst.add_node(NID_ROOT_HIERARCHY, root_hierarchy, 0, NID_ROOT_FOLDER);

    let inbox = pst.add_block(property_context(&[
        (0x3001, 0x001F, Value::Heap(unicode("Inbox"))),
        (0x3602, 0x0003, Value::Inline(2)),
        (0x3603, 0x0003, Value::Inline(1)),
        (0x360A, 0x000B, Value::Inline(0)),
    ]));
    pst.add_node(NID_INBOX, inbox, 0, NID_ROOT_FOLDER);

    let inbox_hierarchy = pst.add_block(table_context(
        version,
        &HIERARCHY_COLUMNS,
        [16, 16, 16, 17],
        &[],
        RowMatrix::Empty,
        &[],
    ));
    pst.add_node(NID_INBOX_HIERARCHY, inbox_hierarchy, 0, NID_INBOX);

    let mut rows = contents_row(NID_MESSAGE_1, hid(1), Some(0x0001));
    rows.extend(contents_row(NID_MESSAGE_2, hid(2), None));
    let rows = pst.add_block(rows);
    let contents_sub_nodes = pst.add_sub_node_leaf(&[(NID_CONTENTS_ROWS, rows, 0)]);
    let contents = pst.add_block(table_context(
        version,
        &CONTENTS_COLUMNS,
        [24, 24, 24, 25],
        &[NID_MESSAGE_1, NID_MESSAGE_2],
        RowMatrix::Node(NID_CONTENTS_ROWS),
        &[unicode("Hello"), unicode("World")],
    ));
    pst.add_node(NID_INBOX_CONTENTS, contents, contents_sub_nodes, NID_INBOX);

    let large = pst.add_data(&large_binary());
    let message_sub_nodes = pst.add_sub_node_leaf(&[(NID_LARGE_BINARY, large, 0)]);
    let message = pst.add_block(property_context(&[
        (0x001A, 0x001F, Value::Heap(unicode("IPM.Note"))),
        (0x0037, 0x001F, Value::Heap(unicode("Hello"))),
        (0x0E07, 0x0003, Value::Inline(0x0001)),
        (PROP_ID_LARGE_BINARY, 0x0102, Value::Node(NID_LARGE_BINARY)),
        (
            0x3007,
            0x0040,
            Value::Heap(CREATION_TIME.to_le_bytes().to_vec()),
        ),
        (0x8000, 0x000B, Value::Inline(1)),
        (0x8001, 0x101F, Value::Heap(multi_unicode(&["Red", "Blue"]))),
    ]));
    pst.add_node(NID_MESSAGE_1, message, message_sub_nodes, NID_INBOX);

    let message_2 = pst.add_block(property_context(&[
        (0x001A, 0x001F, Value::Heap(unicode("IPM.Note"))),
        (0x0037, 0x001F, Value::Heap(unicode("World"))),
        (0x0E07, 0x0003, Value::Inline(0)),
    ]));
    pst.add_node(NID_MESSAGE_2, message_2, 0, NID_INBOX);

    SamplePst {
        data: pst.build(),
        message_block_offset: pst.block_offset(message),
    }
}

pub const NID_LARGE_MESSAGE: u32 = 0x20_0064;
pub const NID_ATTACHMENT_1: u32 = 0x3F;
pub const NID_ATTACHMENT_2: u32 = 0x5F;
pub const NID_ATTACHMENT_3: u32 = 0x7F;
/// Subnode of [NID_LARGE_MESSAGE] stored as an `XXBLOCK`.
pub const NID_ATTACHMENT_DATA: u32 = 0x9F;

pub const PROP_ID_ATTACHMENT_DATA: u16 = 0x3701;
pub const ATTACHMENT_DATA_SIZE: usize = 20_000;
pub const ATTACHMENT_DATA_CHUNK: usize = 5_000;

/// Blocks in the heap of [NID_LARGE_MESSAGE].
pub const LARGE_HEAP_BLOCKS: usize = 10;
/// `rgbFillLevel` of the `HNBITMAPHDR` in heap block 8.
pub const BITMAP_FILL_LEVELS: [u8; 2] = [0x21, 0x43];

pub fn attachment_data() -> Vec<u8> {
    (0..ATTACHMENT_DATA_SIZE).map(|i| (i % 241) as u8).collect()
}

pub fn heap_block_8_value() -> Vec<u8> {
    (0..300).map(|i| (i % 7) as u8).collect()
}

/// A message whose property context heap spans [LARGE_HEAP_BLOCKS] blocks, and whose subnodes
/// sit in an `SIBLOCK` over two `SLBLOCK`s.
///
/// The subject lives in heap block 0, the body in block 1, [heap_block_8_value] in the bitmap
/// block 8, and the record key in block 9. [attachment_data] is an `XXBLOCK` over two `XBLOCK`s.
pub fn large_message_pst(version: NdbVersion, crypt_method: NdbCryptMethod) -> Vec<u8> {
    let mut pst = PstBuilder::new(version, crypt_method);

    let first = pst.add_block(unicode("first attachment"));
    let second = pst.add_block(unicode("second attachment"));
    let third = pst.add_block(unicode("third attachment"));

    let chunks: Vec<_> = attachment_data()
        .chunks(ATTACHMENT_DATA_CHUNK)
        .map(<[u8]>::to_vec)
        .collect();
    let groups = chunks.chunks(2).map(<[Vec<u8>]>::to_vec).collect();
    let nested = pst.add_nested_data_blocks(groups);

    let left = pst.add_sub_node_leaf(&[
        (NID_ATTACHMENT_1, first, 0),
        (NID_ATTACHMENT_2, second, 0),
    ]);
    let right = pst.add_sub_node_leaf(&[
        (NID_ATTACHMENT_3, third, 0),
        (NID_ATTACHMENT_DATA, nested, 0),
    ]);
    let sub_nodes =
        pst.add_sub_node_branch(&[(NID_ATTACHMENT_1, left), (NID_ATTACHMENT_3, right)]);

    let records = property_records(&[
        (0x0037, 0x001F, hid(3)),
        (0x0E07, 0x0003, 0x0001),
        (0x0FF9, 0x0102, block_hid(9, 1)),
        (0x1000, 0x001F, block_hid(1, 2)),
        (0x1009, 0x0102, block_hid(8, 1)),
        (PROP_ID_ATTACHMENT_DATA, 0x0102, NID_ATTACHMENT_DATA),
    ]);
    let mut heap_blocks = vec![heap(
        HeapNodeType::Properties,
        hid(1),
        &[bth_header(2, 6, hid(2)), records, unicode("Spilled")],
    )];
    heap_blocks.push(heap_page(
        None,
        &[vec![0xA5; 6_000], unicode("Body in the second heap block")],
    ));
    for block_index in 2..8 {
        heap_blocks.push(heap_page(None, &[vec![block_index as u8; 4_000]]));
    }
    let mut fill_levels = [0; 64];
    fill_levels[..2].copy_from_slice(&BITMAP_FILL_LEVELS);
    heap_blocks.push(heap_page(Some(fill_levels), &[heap_block_8_value()]));
    heap_blocks.push(heap_page(None, &[(0..16).rev().collect()]));
    assert_eq!(heap_blocks.len(), LARGE_HEAP_BLOCKS);

    let message = pst.add_data_blocks(heap_blocks);
    pst.add_node(NID_LARGE_MESSAGE, message, sub_nodes, 0);

    pst.build()
}
