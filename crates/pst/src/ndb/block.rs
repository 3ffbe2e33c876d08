//! [Blocks](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/a9c1981d-d1ea-457c-b39e-dc7fb0eb95d4)

use byteorder::{LittleEndian, ReadBytesExt};
use std::{io::Read, sync::Arc};
use tracing::{trace, warn};

use super::{block_id::*, header::*, page::BlockBTreeEntry, *};
use crate::{block_sig::compute_sig, crc::compute_crc, PstFile};

/// Blocks never exceed 8 KiB including padding and the trailer.
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Blocks are stored in multiples of 64 bytes.
pub const fn block_size(size: usize) -> usize {
    let size = size.div_ceil(64) * 64;
    if size > MAX_BLOCK_SIZE {
        MAX_BLOCK_SIZE
    } else {
        size
    }
}

/// [BLOCKTRAILER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/a14943ef-70c2-403f-898c-5bc3747117e1)
#[derive(Clone, Copy, Debug)]
pub struct BlockTrailer {
    size: u16,
    signature: u16,
    crc: u32,
    block_id: BlockId,
}

impl BlockTrailer {
    pub fn read(f: &mut dyn Read, version: NdbVersion) -> NdbResult<Self> {
        // cb
        let size = f.read_u16::<LittleEndian>()?;
        // wSig
        let signature = f.read_u16::<LittleEndian>()?;

        let (crc, block_id) = match version {
            NdbVersion::Unicode => {
                // dwCRC
                let crc = f.read_u32::<LittleEndian>()?;
                // bid
                (crc, BlockId::read(f, version)?)
            }
            NdbVersion::Ansi => {
                // bid
                let block_id = BlockId::read(f, version)?;
                // dwCRC
                (f.read_u32::<LittleEndian>()?, block_id)
            }
        };

        Ok(Self {
            size,
            signature,
            crc,
            block_id,
        })
    }

    pub fn size(&self) -> u16 {
        self.size
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

/// Validate the raw bytes of the block described by `entry` and return its payload, with the
/// file's obfuscation reversed for external blocks.
///
/// `raw` holds the whole on-disk block: data, padding, and trailer.
pub fn read_block_data(
    mut raw: Vec<u8>,
    entry: &BlockBTreeEntry,
    version: NdbVersion,
    crypt_method: NdbCryptMethod,
    verify_signature: bool,
) -> NdbResult<Vec<u8>> {
    let block = entry.block().block();
    let size = usize::from(entry.data_size());
    if size > version.max_block_data_size() {
        return Err(NdbError::InvalidBlockSize(entry.data_size()));
    }

    let trailer_size = version.block_trailer_size();
    let total_size = block_size(size + trailer_size);
    check_size("BLOCK", &raw, total_size)?;

    let trailer = BlockTrailer::read(&mut &raw[total_size - trailer_size..total_size], version)?;
    if trailer.size() != entry.data_size() {
        return Err(NdbError::MismatchBlockSize(
            trailer.size(),
            entry.data_size(),
        ));
    }

    let crc = compute_crc(0, &raw[..size]);
    if crc != trailer.crc() {
        warn!(
            "BLOCKTRAILER CRC mismatch for {block:?}: stored 0x{:08X}, computed 0x{crc:08X}",
            trailer.crc()
        );
        return Err(NdbError::InvalidBlockCrc(trailer.crc(), crc));
    }

    if verify_signature {
        if trailer.block_id().search_key() != block.search_key() {
            return Err(NdbError::MismatchBlockId(trailer.block_id(), block));
        }

        let signature = compute_sig(entry.block().index(), block);
        if trailer.signature() != signature {
            return Err(NdbError::InvalidBlockSignature(
                trailer.signature(),
                signature,
            ));
        }
    }

    raw.truncate(size);
    if !block.is_internal() {
        crypt_method.decode(block, &mut raw);
    }
    Ok(raw)
}

/// `btype` of an `XBLOCK` or `XXBLOCK`.
const DATA_TREE_BLOCK_TYPE: u8 = 0x01;

/// `XBLOCK` and `XXBLOCK` header
#[derive(Clone, Copy, Debug)]
pub struct DataTreeHeader {
    level: u8,
    entry_count: u16,
    total_size: u32,
}

impl DataTreeHeader {
    pub const SIZE: usize = 8;

    pub fn read(f: &mut dyn Read) -> NdbResult<Self> {
        // btype
        let block_type = f.read_u8()?;
        if block_type != DATA_TREE_BLOCK_TYPE {
            return Err(NdbError::InvalidInternalBlockType(block_type));
        }

        // cLevel
        let level = f.read_u8()?;
        if !(1..=2).contains(&level) {
            return Err(NdbError::InvalidInternalBlockLevel(level));
        }

        // cEnt
        let entry_count = f.read_u16::<LittleEndian>()?;

        // lcbTotal
        let total_size = f.read_u32::<LittleEndian>()?;

        Ok(Self {
            level,
            entry_count,
            total_size,
        })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn entry_count(&self) -> u16 {
        self.entry_count
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }
}

/// The payload of a node: either a single external block, or the leaves of an `XBLOCK` or
/// `XXBLOCK` tree in order.
#[derive(Clone, Debug, Default)]
pub struct DataTree {
    blocks: Vec<Arc<[u8]>>,
}

impl DataTree {
    pub fn read(pst: &PstFile, block: BlockId) -> NdbResult<Self> {
        let mut blocks = Vec::new();
        collect_data_blocks(pst, block, None, &mut blocks)?;
        trace!("data tree {block:?}: {} blocks", blocks.len());
        Ok(Self { blocks })
    }

    pub fn blocks(&self) -> &[Arc<[u8]>] {
        &self.blocks
    }

    /// Total size of all blocks.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|block| block.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate every block.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.len());
        for block in self.blocks.iter() {
            data.extend_from_slice(block);
        }
        data
    }
}

/// Append the external blocks below `block` to `blocks`, returning how many bytes they hold.
fn collect_data_blocks(
    pst: &PstFile,
    block: BlockId,
    expected_level: Option<u8>,
    blocks: &mut Vec<Arc<[u8]>>,
) -> NdbResult<usize> {
    let data = pst.read_block(block)?;

    if !block.is_internal() {
        if expected_level.is_some() {
            return Err(NdbError::UnexpectedExternalBlock(block));
        }
        let size = data.len();
        blocks.push(data);
        return Ok(size);
    }

    let mut cursor = &data[..];
    let header = DataTreeHeader::read(&mut cursor)?;
    if let Some(level) = expected_level {
        if header.level() != level {
            return Err(NdbError::InvalidInternalBlockLevel(header.level()));
        }
    }

    let version = pst.header().version();
    let entry_count = usize::from(header.entry_count());
    if entry_count * version.id_size() > cursor.len() {
        return Err(NdbError::InvalidInternalBlockEntryCount(
            header.entry_count(),
        ));
    }

    let mut size = 0;
    for _ in 0..entry_count {
        // rgbid
        let child = BlockId::read(&mut cursor, version)?;
        size += if header.level() == 1 {
            if child.is_internal() {
                return Err(NdbError::UnexpectedInternalBlock(child));
            }
            let data = pst.read_block(child)?;
            let size = data.len();
            blocks.push(data);
            size
        } else {
            collect_data_blocks(pst, child, Some(header.level() - 1), blocks)?
        };
    }

    if size != header.total_size() as usize {
        return Err(NdbError::InvalidInternalBlockTotalSize(
            header.total_size(),
            size,
        ));
    }
    Ok(size)
}
