//! Subnode BTree: `SLBLOCK` and `SIBLOCK`
//!
//! Nodes which need more than one stream (messages with attachments, tables with large rows, and
//! properties too big for a heap allocation) keep the extra streams in a private tree of subnodes
//! rooted at the `bidSub` of their NBT entry.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;
use tracing::trace;

use super::{block_id::*, header::NdbVersion, node_id::*, *};
use crate::PstFile;

/// `btype` of an `SLBLOCK` or `SIBLOCK`.
const SUB_NODE_BLOCK_TYPE: u8 = 0x02;

/// `SLBLOCK` and `SIBLOCK` header
#[derive(Clone, Copy, Debug)]
pub struct SubNodeTreeHeader {
    level: u8,
    entry_count: u16,
}

impl SubNodeTreeHeader {
    pub fn size(version: NdbVersion) -> usize {
        match version {
            NdbVersion::Ansi => 4,
            NdbVersion::Unicode => 8,
        }
    }

    pub fn read(f: &mut dyn Read, version: NdbVersion) -> NdbResult<Self> {
        // btype
        let block_type = f.read_u8()?;
        if block_type != SUB_NODE_BLOCK_TYPE {
            return Err(NdbError::InvalidSubNodeBlockType(block_type));
        }

        // cLevel
        let level = f.read_u8()?;
        if level > 1 {
            return Err(NdbError::InvalidSubNodeBlockLevel(level));
        }

        // cEnt
        let entry_count = f.read_u16::<LittleEndian>()?;

        if version == NdbVersion::Unicode {
            // dwPadding
            f.read_u32::<LittleEndian>()?;
        }

        Ok(Self { level, entry_count })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn entry_count(&self) -> u16 {
        self.entry_count
    }
}

/// `SLENTRY`: one subnode with its data tree and nested subnode tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubNodeEntry {
    node: NodeId,
    data: BlockId,
    sub_node: Option<BlockId>,
}

impl SubNodeEntry {
    pub fn new(node: NodeId, data: BlockId, sub_node: Option<BlockId>) -> Self {
        Self {
            node,
            data,
            sub_node,
        }
    }

    pub fn size(version: NdbVersion) -> usize {
        3 * version.id_size()
    }

    pub fn read(f: &mut dyn Read, version: NdbVersion) -> NdbResult<Self> {
        // nid, widened to the size of a BID in Unicode files
        let node = NodeId::from(version.read_id(f)? as u32);
        // bidData
        let data = BlockId::read(f, version)?;
        // bidSub
        let sub_node = BlockId::read(f, version)?;
        let sub_node = if sub_node.is_null() {
            None
        } else {
            Some(sub_node)
        };

        Ok(Self {
            node,
            data,
            sub_node,
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
}

/// `SIENTRY`
#[derive(Clone, Copy, Debug)]
struct SubNodeBranchEntry {
    node: NodeId,
    block: BlockId,
}

impl SubNodeBranchEntry {
    fn size(version: NdbVersion) -> usize {
        2 * version.id_size()
    }

    fn read(f: &mut dyn Read, version: NdbVersion) -> NdbResult<Self> {
        // nid
        let node = NodeId::from(version.read_id(f)? as u32);
        // bid
        let block = BlockId::read(f, version)?;
        Ok(Self { node, block })
    }
}

/// A single decoded `SLBLOCK` or `SIBLOCK`.
enum SubNodeBlock {
    Leaf(Vec<SubNodeEntry>),
    Branch(Vec<SubNodeBranchEntry>),
}

impl SubNodeBlock {
    fn read(data: &[u8], version: NdbVersion) -> NdbResult<Self> {
        let mut cursor = data;
        let header = SubNodeTreeHeader::read(&mut cursor, version)?;
        let entry_count = usize::from(header.entry_count());

        let entry_size = if header.level() == 0 {
            SubNodeEntry::size(version)
        } else {
            SubNodeBranchEntry::size(version)
        };
        if entry_count * entry_size > cursor.len() {
            return Err(NdbError::InvalidSubNodeBlockEntryCount(
                header.entry_count(),
            ));
        }

        if header.level() == 0 {
            let entries = (0..entry_count)
                .map(|_| SubNodeEntry::read(&mut cursor, version))
                .collect::<NdbResult<Vec<_>>>()?;
            Ok(Self::Leaf(entries))
        } else {
            let entries = (0..entry_count)
                .map(|_| SubNodeBranchEntry::read(&mut cursor, version))
                .collect::<NdbResult<Vec<_>>>()?;
            Ok(Self::Branch(entries))
        }
    }
}

/// The subnode tree of a single node.
#[derive(Clone, Copy)]
pub struct SubNodeTree<'a> {
    pst: &'a PstFile,
    root: BlockId,
}

impl<'a> SubNodeTree<'a> {
    pub fn new(pst: &'a PstFile, root: BlockId) -> Self {
        Self { pst, root }
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    fn read_block(&self, block: BlockId) -> NdbResult<SubNodeBlock> {
        if !block.is_internal() {
            return Err(NdbError::UnexpectedExternalBlock(block));
        }
        let data = self.pst.read_block(block)?;
        SubNodeBlock::read(&data, self.pst.header().version())
    }

    /// Look up the subnode `node`; a missing entry is [NdbError::SubNodeNotFound].
    pub fn find(&self, node: NodeId) -> NdbResult<SubNodeEntry> {
        let key = u32::from(node);
        let mut block = self.root;
        let mut expected_level = None;

        loop {
            match (self.read_block(block)?, expected_level) {
                (SubNodeBlock::Leaf(entries), None | Some(0)) => {
                    return entries
                        .binary_search_by_key(&key, |entry| u32::from(entry.node()))
                        .map(|index| entries[index])
                        .map_err(|_| NdbError::SubNodeNotFound(node));
                }
                (SubNodeBlock::Branch(entries), None) => {
                    let index = entries.partition_point(|entry| u32::from(entry.node) <= key);
                    let Some(index) = index.checked_sub(1) else {
                        return Err(NdbError::SubNodeNotFound(node));
                    };
                    trace!("subnode {node:?} -> {:?}", entries[index].block);
                    block = entries[index].block;
                    expected_level = Some(0);
                }
                (_, Some(level)) => return Err(NdbError::InvalidSubNodeBlockLevel(level + 1)),
            }
        }
    }

    /// Every subnode, ordered by [NodeId].
    pub fn entries(&self) -> NdbResult<Vec<SubNodeEntry>> {
        match self.read_block(self.root)? {
            SubNodeBlock::Leaf(entries) => Ok(entries),
            SubNodeBlock::Branch(branches) => {
                let mut entries = Vec::new();
                for branch in branches {
                    match self.read_block(branch.block)? {
                        SubNodeBlock::Leaf(leaf) => entries.extend(leaf),
                        SubNodeBlock::Branch(_) => {
                            return Err(NdbError::InvalidSubNodeBlockLevel(1));
                        }
                    }
                }
                Ok(entries)
            }
        }
    }
}
