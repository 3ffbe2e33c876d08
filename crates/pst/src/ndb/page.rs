//! [Pages](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5774b4f2-cdc4-453e-996a-8c8230116930)
//!
//! Only the two B-tree page types are read. Allocation and density list pages exist to support
//! writers and are never consulted.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::{
    io::{Cursor, Read},
    sync::Arc,
};
use tracing::{trace, warn};

use super::{block_id::*, block_ref::*, header::NdbVersion, node_id::*, *};
use crate::{block_sig::compute_sig, crc::compute_crc, PstFile};

/// Every page is 512 bytes.
pub const PAGE_SIZE: usize = 512;

/// `ptype`
///
/// ### See also
/// [PageTrailer]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PageType {
    /// `ptypeBBT`: Block BTree page
    BlockBTree = 0x80,
    /// `ptypeNBT`: Node BTree page
    NodeBTree = 0x81,
    /// `ptypeFMap`: Free Map page
    FreeMap = 0x82,
    /// `ptypePMap`: Allocation Page Map page
    AllocationPageMap = 0x83,
    /// `ptypeAMap`: Allocation Map page
    AllocationMap = 0x84,
    /// `ptypeFPMap`: Free Page Map page
    FreePageMap = 0x85,
    /// `ptypeDL`: Density List page
    DensityList = 0x86,
}

impl TryFrom<u8> for PageType {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(PageType::BlockBTree),
            0x81 => Ok(PageType::NodeBTree),
            0x82 => Ok(PageType::FreeMap),
            0x83 => Ok(PageType::AllocationPageMap),
            0x84 => Ok(PageType::AllocationMap),
            0x85 => Ok(PageType::FreePageMap),
            0x86 => Ok(PageType::DensityList),
            _ => Err(NdbError::InvalidPageType(value)),
        }
    }
}

/// [PAGETRAILER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/f4ccb38a-930a-4db4-98df-a69c195926ba)
#[derive(Clone, Copy, Debug)]
pub struct PageTrailer {
    page_type: PageType,
    signature: u16,
    crc: u32,
    block_id: BlockId,
}

impl PageTrailer {
    pub fn read(f: &mut dyn Read, version: NdbVersion) -> NdbResult<Self> {
        // ptype, ptypeRepeat
        let mut page_type = [0_u8; 2];
        f.read_exact(&mut page_type)?;
        if page_type[0] != page_type[1] {
            return Err(NdbError::MismatchPageTypeRepeat(page_type[0], page_type[1]));
        }
        let page_type = PageType::try_from(page_type[0])?;

        // wSig
        let signature = f.read_u16::<LittleEndian>()?;

        // dwCRC and bid are stored in opposite orders
        let (crc, block_id) = match version {
            NdbVersion::Unicode => {
                let crc = f.read_u32::<LittleEndian>()?;
                (crc, BlockId::read(f, version)?)
            }
            NdbVersion::Ansi => {
                let block_id = BlockId::read(f, version)?;
                (f.read_u32::<LittleEndian>()?, block_id)
            }
        };

        Ok(Self {
            page_type,
            signature,
            crc,
            block_id,
        })
    }

    pub fn page_type(&self) -> PageType {
        self.page_type
    }

    pub fn signature(&self) -> u16 {
        self.signature
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn block_id(&self) -> BlockId {
        self.block_id
    }
}

/// [BTPAGE](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/4f0cd8e7-c2d0-4975-90a4-d417cfca77f8)
///
/// Entries stay in their on-disk form and are decoded one at a time, so a lookup only touches the
/// entries its binary search visits.
#[derive(Debug)]
pub struct BTreePage {
    version: NdbVersion,
    trailer: PageTrailer,
    level: u8,
    entry_count: usize,
    entry_size: usize,
    data: Vec<u8>,
}

impl BTreePage {
    /// Validate and parse a page that was read from `page_ref`.
    pub fn read(
        data: Vec<u8>,
        version: NdbVersion,
        page_type: PageType,
        page_ref: BlockRef,
        verify_signature: bool,
    ) -> NdbResult<Self> {
        check_size("BTPAGE", &data, PAGE_SIZE)?;

        let trailer_offset = PAGE_SIZE - version.page_trailer_size();
        let trailer = PageTrailer::read(&mut &data[trailer_offset..PAGE_SIZE], version)?;
        if trailer.page_type() != page_type {
            return Err(NdbError::UnexpectedPageType(trailer.page_type()));
        }

        let crc = compute_crc(0, &data[..trailer_offset]);
        if crc != trailer.crc() {
            warn!(
                "BTPAGE CRC mismatch at {:?}: stored 0x{:08X}, computed 0x{crc:08X}",
                page_ref.index(),
                trailer.crc()
            );
            return Err(NdbError::InvalidPageCrc(trailer.crc(), crc));
        }

        if verify_signature {
            if trailer.block_id() != page_ref.block() {
                return Err(NdbError::MismatchPageBlockId(
                    trailer.block_id(),
                    page_ref.block(),
                ));
            }

            let signature = compute_sig(page_ref.index(), page_ref.block());
            if trailer.signature() != signature {
                return Err(NdbError::InvalidPageSignature(
                    trailer.signature(),
                    signature,
                ));
            }
        }

        let entries_size = match version {
            NdbVersion::Ansi => 496,
            NdbVersion::Unicode => 488,
        };
        let mut cursor = Cursor::new(&data[entries_size..trailer_offset]);

        // cEnt
        let entry_count = usize::from(cursor.read_u8()?);
        // cEntMax
        let max_entries = cursor.read_u8()?;
        // cbEnt
        let entry_size = cursor.read_u8()?;
        // cLevel
        let level = cursor.read_u8()?;
        if level > 8 {
            return Err(NdbError::InvalidBTreePageLevel(level));
        }

        let min_entry_size = match (level, page_type) {
            (0, PageType::NodeBTree) => NodeBTreeEntry::size(version),
            (0, _) => BlockBTreeEntry::size(version),
            _ => BTreeBranchEntry::size(version),
        };
        if usize::from(entry_size) < min_entry_size {
            return Err(NdbError::InvalidBTreeEntrySize(entry_size));
        }
        if usize::from(max_entries) > entries_size / usize::from(entry_size) {
            return Err(NdbError::InvalidBTreeEntryMaxCount(max_entries));
        }
        if entry_count > usize::from(max_entries) {
            return Err(NdbError::InvalidBTreeEntryCount(entry_count));
        }

        Ok(Self {
            version,
            trailer,
            level,
            entry_count,
            entry_size: usize::from(entry_size),
            data,
        })
    }

    pub fn page_type(&self) -> PageType {
        self.trailer.page_type()
    }

    pub fn trailer(&self) -> &PageTrailer {
        &self.trailer
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    fn entry(&self, index: usize) -> &[u8] {
        let start = index * self.entry_size;
        &self.data[start..start + self.entry_size]
    }

    /// The search key of an entry. Every entry type starts with its key, and `NID` keys only use
    /// the low 32 bits.
    pub fn key(&self, index: usize) -> u64 {
        let key = self.version.id_at(self.entry(index), 0);
        match self.page_type() {
            PageType::NodeBTree => key & u64::from(u32::MAX),
            _ => key,
        }
    }

    /// Number of entries whose key is less than or equal to `key`.
    fn upper_bound(&self, key: u64) -> usize {
        let (mut low, mut high) = (0, self.entry_count);
        while low < high {
            let mid = low + (high - low) / 2;
            if self.key(mid) <= key {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low
    }

    /// The branch entry whose key range covers `key`.
    pub fn find_branch(&self, key: u64) -> Option<usize> {
        self.upper_bound(key).checked_sub(1)
    }

    /// The leaf entry with exactly this `key`.
    pub fn find_leaf(&self, key: u64) -> Option<usize> {
        self.find_branch(key).filter(|&index| self.key(index) == key)
    }

    pub fn branch_entry(&self, index: usize) -> NdbResult<BTreeBranchEntry> {
        BTreeBranchEntry::read(self.entry(index), self.version)
    }

    pub fn node_entry(&self, index: usize) -> NdbResult<NodeBTreeEntry> {
        NodeBTreeEntry::read(self.entry(index), self.version)
    }

    pub fn block_entry(&self, index: usize) -> NdbResult<BlockBTreeEntry> {
        BlockBTreeEntry::read(self.entry(index), self.version)
    }
}

/// [BTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/bc8052a3-f300-4022-be31-f0f408fffca0)
#[derive(Clone, Copy, Debug)]
pub struct BTreeBranchEntry {
    key: u64,
    child: BlockRef,
}

impl BTreeBranchEntry {
    pub fn size(version: NdbVersion) -> usize {
        version.id_size() * 3
    }

    fn read(mut entry: &[u8], version: NdbVersion) -> NdbResult<Self> {
        // btkey
        let key = version.read_id(&mut entry)?;
        // BREF
        let child = BlockRef::read(&mut entry, version)?;
        Ok(Self { key, child })
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn child(&self) -> BlockRef {
        self.child
    }
}

/// [NBTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/53a4b926-8ac4-45c9-9c6d-8358d951dbcd)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NodeBTreeEntry {
    node: NodeId,
    data: BlockId,
    sub_node: Option<BlockId>,
    parent: Option<NodeId>,
}

impl NodeBTreeEntry {
    pub fn new(
        node: NodeId,
        data: BlockId,
        sub_node: Option<BlockId>,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            node,
            data,
            sub_node,
            parent,
        }
    }

    pub fn size(version: NdbVersion) -> usize {
        match version {
            NdbVersion::Ansi => 16,
            NdbVersion::Unicode => 32,
        }
    }

    fn read(mut entry: &[u8], version: NdbVersion) -> NdbResult<Self> {
        // nid
        let node = NodeId::from(version.read_id(&mut entry)? as u32);
        // bidData
        let data = BlockId::read(&mut entry, version)?;
        // bidSub
        let sub_node = BlockId::read(&mut entry, version)?;
        // nidParent
        let parent = NodeId::from(entry.read_u32::<LittleEndian>()?);

        Ok(Self {
            node,
            data,
            sub_node: (!sub_node.is_null()).then_some(sub_node),
            parent: (u32::from(parent) != 0).then_some(parent),
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn data(&self) -> BlockId {
        self.data
    }

    pub fn sub_node(&self) -> Option<BlockId> {
        self.sub_node
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// [BBTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/53a4b926-8ac4-45c9-9c6d-8358d951dbcd)
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockBTreeEntry {
    block: BlockRef,
    size: u16,
    ref_count: u16,
}

impl BlockBTreeEntry {
    pub fn new(block: BlockRef, size: u16, ref_count: u16) -> Self {
        Self {
            block,
            size,
            ref_count,
        }
    }

    pub fn size(version: NdbVersion) -> usize {
        match version {
            NdbVersion::Ansi => 12,
            NdbVersion::Unicode => 24,
        }
    }

    fn read(mut entry: &[u8], version: NdbVersion) -> NdbResult<Self> {
        // BREF
        let block = BlockRef::read(&mut entry, version)?;
        // cb
        let size = entry.read_u16::<LittleEndian>()?;
        // cRef
        let ref_count = entry.read_u16::<LittleEndian>()?;

        Ok(Self {
            block,
            size,
            ref_count,
        })
    }

    pub fn block(&self) -> BlockRef {
        self.block
    }

    /// `cb`: the size of the block data, excluding padding and the trailer.
    pub fn data_size(&self) -> u16 {
        self.size
    }

    pub fn ref_count(&self) -> u16 {
        self.ref_count
    }
}

impl NdbVersion {
    /// Decode a `BID` or `IB` sized field at `offset` of an already validated buffer.
    pub(crate) fn id_at(self, data: &[u8], offset: usize) -> u64 {
        match self {
            NdbVersion::Ansi => u64::from(LittleEndian::read_u32(&data[offset..offset + 4])),
            NdbVersion::Unicode => LittleEndian::read_u64(&data[offset..offset + 8]),
        }
    }
}

/// Descend from `root` to the leaf page that would hold `key`.
fn find_leaf(
    pst: &PstFile,
    root: BlockRef,
    page_type: PageType,
    key: u64,
) -> NdbResult<Option<(Arc<BTreePage>, usize)>> {
    let mut page_ref = root;
    let mut expected_level = None;

    loop {
        let page = pst.read_btree_page(page_ref, page_type)?;
        if let Some(level) = expected_level {
            if page.level() != level {
                return Err(NdbError::UnexpectedBTreePageLevel(page.level(), level));
            }
        }

        if page.level() == 0 {
            let index = page.find_leaf(key);
            return Ok(index.map(|index| (page, index)));
        }

        let Some(index) = page.find_branch(key) else {
            return Ok(None);
        };
        let child = page.branch_entry(index)?.child();
        trace!(
            "{page_type:?} level {} key 0x{key:X} -> {:?}",
            page.level(),
            child.index()
        );
        page_ref = child;
        expected_level = Some(page.level() - 1);
    }
}

/// Visit every leaf page below `page_ref` in key order.
fn visit_leaves(
    pst: &PstFile,
    page_ref: BlockRef,
    page_type: PageType,
    expected_level: Option<u8>,
    visit: &mut dyn FnMut(&BTreePage) -> NdbResult<()>,
) -> NdbResult<()> {
    let page = pst.read_btree_page(page_ref, page_type)?;
    if let Some(level) = expected_level {
        if page.level() != level {
            return Err(NdbError::UnexpectedBTreePageLevel(page.level(), level));
        }
    }

    if page.level() == 0 {
        return visit(&page);
    }

    for index in 0..page.len() {
        let child = page.branch_entry(index)?.child();
        visit_leaves(pst, child, page_type, Some(page.level() - 1), visit)?;
    }
    Ok(())
}

/// The Node BTree (NBT): maps a [NodeId] to its data block, subnode block, and parent.
#[derive(Clone, Copy)]
pub struct NodeBTree<'a> {
    pst: &'a PstFile,
    root: BlockRef,
}

impl<'a> NodeBTree<'a> {
    pub fn new(pst: &'a PstFile) -> Self {
        Self {
            pst,
            root: pst.header().root().node_btree(),
        }
    }

    /// Look up `node`; a missing entry is [NdbError::NodeNotFound].
    pub fn find(&self, node: NodeId) -> NdbResult<NodeBTreeEntry> {
        let key = u64::from(u32::from(node));
        let (page, index) = find_leaf(self.pst, self.root, PageType::NodeBTree, key)?
            .ok_or(NdbError::NodeNotFound(node))?;
        page.node_entry(index)
    }

    /// Every entry in the tree, ordered by [NodeId].
    pub fn entries(&self) -> NdbResult<Vec<NodeBTreeEntry>> {
        let mut entries = Vec::new();
        visit_leaves(
            self.pst,
            self.root,
            PageType::NodeBTree,
            None,
            &mut |page| {
                for index in 0..page.len() {
                    entries.push(page.node_entry(index)?);
                }
                Ok(())
            },
        )?;
        Ok(entries)
    }
}

/// The Block BTree (BBT): maps a [BlockId] to the location and size of the block.
#[derive(Clone, Copy)]
pub struct BlockBTree<'a> {
    pst: &'a PstFile,
    root: BlockRef,
}

impl<'a> BlockBTree<'a> {
    pub fn new(pst: &'a PstFile) -> Self {
        Self {
            pst,
            root: pst.header().root().block_btree(),
        }
    }

    /// Look up `block`; a missing entry is [NdbError::BlockNotFound].
    pub fn find(&self, block: BlockId) -> NdbResult<BlockBTreeEntry> {
        let key = u64::from(block.search_key());
        let (page, index) = find_leaf(self.pst, self.root, PageType::BlockBTree, key)?
            .ok_or(NdbError::BlockNotFound(block))?;
        page.block_entry(index)
    }

    /// Every entry in the tree, ordered by [BlockId].
    pub fn entries(&self) -> NdbResult<Vec<BlockBTreeEntry>> {
        let mut entries = Vec::new();
        visit_leaves(
            self.pst,
            self.root,
            PageType::BlockBTree,
            None,
            &mut |page| {
                for index in 0..page.len() {
                    entries.push(page.block_entry(index)?);
                }
                Ok(())
            },
        )?;
        Ok(entries)
    }
}
