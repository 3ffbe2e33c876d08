//! [HEADER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/c9876f5a-664b-46a3-9887-ba63f113abf5)

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};

use super::{block_id::*, block_ref::*, node_id::*, *};
use crate::{
    crc::compute_crc,
    encode::{cyclic, permute},
};

/// `dwMagic`
///
/// ### See also
/// [Header]
const HEADER_MAGIC: u32 = u32::from_be_bytes(*b"NDB!");

/// `wMagicClient`
const HEADER_MAGIC_CLIENT: u16 = u16::from_be_bytes(*b"MS");

const NDB_SENTINEL: u8 = 0x80;

/// `wVer` of a Unicode OST with 4K pages.
const NDB_VERSION_UNICODE_4K: u16 = 36;

/// Size of an ANSI `HEADER`, and the most any PST can be expected to hold.
pub const ANSI_HEADER_SIZE: usize = 512;

/// Size of a Unicode `HEADER`.
pub const UNICODE_HEADER_SIZE: usize = 564;

const CRC_PARTIAL_SIZE: usize = 471;
const CRC_FULL_SIZE: usize = 516;

/// `wVer`: selects the ANSI or Unicode layout of every NDB structure.
///
/// ### See also
/// [Header]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum NdbVersion {
    Ansi,
    #[default]
    Unicode,
}

impl TryFrom<u16> for NdbVersion {
    type Error = NdbError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            14..=15 => Ok(NdbVersion::Ansi),
            23 => Ok(NdbVersion::Unicode),
            NDB_VERSION_UNICODE_4K => Err(NdbError::UnsupportedNdbVersion(value)),
            _ => Err(NdbError::InvalidNdbVersion(value)),
        }
    }
}

impl NdbVersion {
    /// Width of a `BID` or `IB` field.
    pub const fn id_size(self) -> usize {
        match self {
            NdbVersion::Ansi => 4,
            NdbVersion::Unicode => 8,
        }
    }

    /// Size of a `PAGETRAILER`.
    pub const fn page_trailer_size(self) -> usize {
        match self {
            NdbVersion::Ansi => 12,
            NdbVersion::Unicode => 16,
        }
    }

    /// Size of a `BLOCKTRAILER`.
    pub const fn block_trailer_size(self) -> usize {
        match self {
            NdbVersion::Ansi => 12,
            NdbVersion::Unicode => 16,
        }
    }

    /// Largest payload of a single data block.
    pub const fn max_block_data_size(self) -> usize {
        block::MAX_BLOCK_SIZE - self.block_trailer_size()
    }

    /// Read a `BID` or `IB` sized field, widened to `u64`.
    pub fn read_id(self, f: &mut dyn Read) -> io::Result<u64> {
        match self {
            NdbVersion::Ansi => f.read_u32::<LittleEndian>().map(u64::from),
            NdbVersion::Unicode => f.read_u64::<LittleEndian>(),
        }
    }
}

/// `bCryptMethod`
///
/// ### See also
/// [Header]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum NdbCryptMethod {
    /// `NDB_CRYPT_NONE`: Data blocks are not encoded
    #[default]
    None = 0x00,
    /// `NDB_CRYPT_PERMUTE`: Encoded with the [Permutation algorithm](crate::encode::permute)
    Permute = 0x01,
    /// `NDB_CRYPT_CYCLIC`: Encoded with the [Cyclic algorithm](crate::encode::cyclic)
    Cyclic = 0x02,
}

impl TryFrom<u8> for NdbCryptMethod {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::Permute),
            0x02 => Ok(Self::Cyclic),
            _ => Err(NdbError::InvalidNdbCryptMethod(value)),
        }
    }
}

impl NdbCryptMethod {
    /// Reverse the obfuscation of an external data block in place.
    pub fn decode(self, block_id: BlockId, data: &mut [u8]) {
        match self {
            NdbCryptMethod::None => {}
            NdbCryptMethod::Permute => permute::decode_block(data),
            NdbCryptMethod::Cyclic => cyclic::encode_decode_block(data, u64::from(block_id) as u32),
        }
    }
}

/// `fAMapValid`
///
/// ### See also
/// [Root]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum AmapStatus {
    /// `INVALID_AMAP`: One or more AMaps in the PST are INVALID
    #[default]
    Invalid = 0x00,
    /// `VALID_AMAP1`: Deprecated. Implementations SHOULD NOT use this value. The AMaps are VALID.
    Valid1 = 0x01,
    /// `VALID_AMAP2`: The AMaps are VALID.
    Valid2 = 0x02,
}

impl TryFrom<u8> for AmapStatus {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(AmapStatus::Invalid),
            0x01 => Ok(AmapStatus::Valid1),
            0x02 => Ok(AmapStatus::Valid2),
            _ => Err(NdbError::InvalidAmapStatus(value)),
        }
    }
}

/// [ROOT](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/32ce8c94-4757-46c8-a169-3fd21abee584)
#[derive(Clone, Copy, Default, Debug)]
pub struct Root {
    file_eof_index: ByteIndex,
    amap_last_index: ByteIndex,
    amap_free_size: u64,
    pmap_free_size: u64,
    node_btree: BlockRef,
    block_btree: BlockRef,
    amap_is_valid: AmapStatus,
}

impl Root {
    fn read(f: &mut dyn Read, version: NdbVersion) -> NdbResult<Self> {
        // dwReserved
        f.read_u32::<LittleEndian>()?;

        // ibFileEof
        let file_eof_index = ByteIndex::read(f, version)?;
        // ibAMapLast
        let amap_last_index = ByteIndex::read(f, version)?;
        // cbAMapFree
        let amap_free_size = version.read_id(f)?;
        // cbPMapFree
        let pmap_free_size = version.read_id(f)?;
        // BREFNBT
        let node_btree = BlockRef::read(f, version)?;
        // BREFBBT
        let block_btree = BlockRef::read(f, version)?;
        // fAMapValid
        let amap_is_valid = AmapStatus::try_from(f.read_u8()?)?;

        // bReserved, wReserved
        f.read_u8()?;
        f.read_u16::<LittleEndian>()?;

        Ok(Self {
            file_eof_index,
            amap_last_index,
            amap_free_size,
            pmap_free_size,
            node_btree,
            block_btree,
            amap_is_valid,
        })
    }

    pub fn file_eof_index(&self) -> ByteIndex {
        self.file_eof_index
    }

    pub fn amap_last_index(&self) -> ByteIndex {
        self.amap_last_index
    }

    pub fn amap_free_size(&self) -> u64 {
        self.amap_free_size
    }

    pub fn pmap_free_size(&self) -> u64 {
        self.pmap_free_size
    }

    pub fn node_btree(&self) -> BlockRef {
        self.node_btree
    }

    pub fn block_btree(&self) -> BlockRef {
        self.block_btree
    }

    pub fn amap_is_valid(&self) -> AmapStatus {
        self.amap_is_valid
    }
}

/// The fixed `HEADER` at the start of the file.
#[derive(Clone, Debug)]
pub struct Header {
    version: NdbVersion,
    raw_version: u16,
    client_version: u16,
    next_block: BlockId,
    next_page: BlockId,
    unique: u32,
    nids: [NodeId; 32],
    root: Root,
    crypt_method: NdbCryptMethod,
}

impl Header {
    pub fn read(f: &mut dyn Read) -> NdbResult<Self> {
        let mut buffer = vec![0_u8; ANSI_HEADER_SIZE];
        read_header_bytes(f, &mut buffer)?;

        let mut cursor = Cursor::new(buffer.as_slice());

        // dwMagic
        let magic = cursor.read_u32::<LittleEndian>()?;
        if magic != HEADER_MAGIC {
            return Err(NdbError::InvalidNdbHeaderMagicValue(magic));
        }

        // dwCRCPartial
        let crc_partial = cursor.read_u32::<LittleEndian>()?;
        let computed = compute_crc(0, &buffer[8..8 + CRC_PARTIAL_SIZE]);
        if crc_partial != computed {
            return Err(NdbError::InvalidNdbHeaderPartialCrc(crc_partial, computed));
        }

        // wMagicClient
        let magic = cursor.read_u16::<LittleEndian>()?;
        if magic != HEADER_MAGIC_CLIENT {
            return Err(NdbError::InvalidNdbHeaderMagicClientValue(magic));
        }

        // wVer
        let raw_version = cursor.read_u16::<LittleEndian>()?;
        let version = NdbVersion::try_from(raw_version)?;

        if version == NdbVersion::Unicode {
            buffer.resize(UNICODE_HEADER_SIZE, 0);
            read_header_bytes(f, &mut buffer[ANSI_HEADER_SIZE..])?;

            // dwCRCFull
            let crc_full = u32::from_le_bytes([
                buffer[8 + CRC_FULL_SIZE],
                buffer[9 + CRC_FULL_SIZE],
                buffer[10 + CRC_FULL_SIZE],
                buffer[11 + CRC_FULL_SIZE],
            ]);
            let computed = compute_crc(0, &buffer[8..8 + CRC_FULL_SIZE]);
            if crc_full != computed {
                return Err(NdbError::InvalidNdbHeaderFullCrc(crc_full, computed));
            }
        }

        let mut cursor = Cursor::new(&buffer[12..]);

        // wVerClient
        let client_version = cursor.read_u16::<LittleEndian>()?;

        // bPlatformCreate, bPlatformAccess, dwReserved1, dwReserved2
        let mut reserved = [0_u8; 10];
        cursor.read_exact(&mut reserved)?;

        let mut next_block = BlockId::default();
        if version == NdbVersion::Ansi {
            // bidNextB
            next_block = BlockId::read(&mut cursor, version)?;
        } else {
            // bidUnused
            cursor.read_u64::<LittleEndian>()?;
        }

        // bidNextP
        let next_page = BlockId::read(&mut cursor, version)?;

        // dwUnique
        let unique = cursor.read_u32::<LittleEndian>()?;

        // rgnid
        let mut nids = [NodeId::default(); 32];
        for nid in nids.iter_mut() {
            *nid = NodeId::from(cursor.read_u32::<LittleEndian>()?);
        }

        if version == NdbVersion::Unicode {
            // qwUnused
            cursor.read_u64::<LittleEndian>()?;
        }

        // root
        let root = Root::read(&mut cursor, version)?;

        if version == NdbVersion::Unicode {
            // dwAlign
            cursor.read_u32::<LittleEndian>()?;
        }

        // rgbFM, rgbFP
        let mut free_maps = [0_u8; 256];
        cursor.read_exact(&mut free_maps)?;

        // bSentinel
        let sentinel = cursor.read_u8()?;
        if sentinel != NDB_SENTINEL {
            return Err(NdbError::InvalidNdbHeaderSentinelValue(sentinel));
        }

        // bCryptMethod
        let crypt_method = NdbCryptMethod::try_from(cursor.read_u8()?)?;

        // rgbReserved
        cursor.read_u16::<LittleEndian>()?;

        if version == NdbVersion::Unicode {
            // bidNextB
            next_block = BlockId::read(&mut cursor, version)?;
        }

        Ok(Self {
            version,
            raw_version,
            client_version,
            next_block,
            next_page,
            unique,
            nids,
            root,
            crypt_method,
        })
    }

    pub fn version(&self) -> NdbVersion {
        self.version
    }

    /// The `wVer` value as stored, which distinguishes the two ANSI revisions.
    pub fn raw_version(&self) -> u16 {
        self.raw_version
    }

    pub fn client_version(&self) -> u16 {
        self.client_version
    }

    pub fn next_block(&self) -> BlockId {
        self.next_block
    }

    pub fn next_page(&self) -> BlockId {
        self.next_page
    }

    pub fn unique(&self) -> u32 {
        self.unique
    }

    /// `rgnid`: the next free index for each [NodeIdType].
    pub fn nids(&self) -> &[NodeId; 32] {
        &self.nids
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn crypt_method(&self) -> NdbCryptMethod {
        self.crypt_method
    }
}

fn read_header_bytes(f: &mut dyn Read, buffer: &mut [u8]) -> NdbResult<()> {
    let mut filled = 0;
    while filled < buffer.len() {
        match f.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    check_size("HEADER", &buffer[..filled], buffer.len())
}
