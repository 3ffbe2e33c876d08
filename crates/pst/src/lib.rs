#![doc = include_str!("../README.md")]

use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Cursor, Read, Seek, SeekFrom},
    path::Path,
    sync::{Arc, Mutex, RwLock},
};
use tracing::{debug, trace};

pub mod block_sig;
pub mod crc;
pub mod encode;
pub mod ltp;
pub mod messaging;
pub mod ndb;

use ltp::{
    prop_context::PropertyContext, table_context::TableContext, HeapContext, LtpResult,
};
use messaging::{named_prop::NamedPropertyMap, MessagingResult};
use ndb::{
    block::{block_size, read_block_data},
    block_id::BlockId,
    block_ref::{BlockRef, ByteIndex},
    header::Header,
    node::Node,
    node_id::NodeId,
    page::{BTreePage, BlockBTree, NodeBTree, PageType, PAGE_SIZE},
    NdbError, NdbResult,
};

/// Default number of decoded blocks (and pages) kept in memory.
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 4096;

/// Settings which apply for the lifetime of an open [PstFile].
#[derive(Clone, Debug)]
pub struct PstOptions {
    block_cache_capacity: usize,
    verify_block_signatures: bool,
}

impl Default for PstOptions {
    fn default() -> Self {
        Self {
            block_cache_capacity: DEFAULT_BLOCK_CACHE_CAPACITY,
            verify_block_signatures: true,
        }
    }
}

impl PstOptions {
    /// How many decoded blocks and pages to keep. `0` disables the cache. When the cache is full
    /// it is emptied before the next insert.
    pub fn with_block_cache_capacity(mut self, capacity: usize) -> Self {
        self.block_cache_capacity = capacity;
        self
    }

    /// Check the `wSig` and `bid` of every page and block trailer. CRCs are always checked.
    pub fn with_verify_block_signatures(mut self, verify: bool) -> Self {
        self.verify_block_signatures = verify;
        self
    }

    pub fn block_cache_capacity(&self) -> usize {
        self.block_cache_capacity
    }

    pub fn verify_block_signatures(&self) -> bool {
        self.verify_block_signatures
    }
}

trait PstReader: Read + Seek + Send {}

impl<T> PstReader for T where T: Read + Seek + Send {}

#[derive(Default)]
struct BlockCache {
    blocks: RwLock<HashMap<BlockId, Arc<[u8]>>>,
    pages: RwLock<HashMap<(ByteIndex, PageType), Arc<BTreePage>>>,
}

fn cache_get<K, V>(cache: &RwLock<HashMap<K, V>>, key: &K) -> Option<V>
where
    K: Eq + std::hash::Hash,
    V: Clone,
{
    cache.read().ok()?.get(key).cloned()
}

fn cache_insert<K, V>(cache: &RwLock<HashMap<K, V>>, capacity: usize, key: K, value: V)
where
    K: Eq + std::hash::Hash,
{
    if capacity == 0 {
        return;
    }
    if let Ok(mut cache) = cache.write() {
        if cache.len() >= capacity {
            trace!("flushing {} cached entries", cache.len());
            cache.clear();
        }
        cache.insert(key, value);
    }
}

/// [PST File](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/6b57253b-0853-47bb-99bb-d4b8f78105f0)
pub struct PstFile {
    reader: Mutex<Box<dyn PstReader>>,
    header: Header,
    options: PstOptions,
    cache: BlockCache,
    named_properties: RwLock<Option<Arc<NamedPropertyMap>>>,
}

impl PstFile {
    pub fn open(path: impl AsRef<Path>) -> NdbResult<Self> {
        Self::open_with_options(path, Default::default())
    }

    pub fn open_with_options(path: impl AsRef<Path>, options: PstOptions) -> NdbResult<Self> {
        let path = path.as_ref();
        debug!("opening {}", path.display());
        let file = File::open(path)?;
        Self::read_from_with_options(BufReader::new(file), options)
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> NdbResult<Self> {
        Self::from_bytes_with_options(data, Default::default())
    }

    pub fn from_bytes_with_options(
        data: impl Into<Vec<u8>>,
        options: PstOptions,
    ) -> NdbResult<Self> {
        Self::read_from_with_options(Cursor::new(data.into()), options)
    }

    pub fn read_from<R>(reader: R) -> NdbResult<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        Self::read_from_with_options(reader, Default::default())
    }

    pub fn read_from_with_options<R>(mut reader: R, options: PstOptions) -> NdbResult<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        reader.seek(SeekFrom::Start(0))?;
        let header = Header::read(&mut reader)?;
        debug!(
            "{:?} PST, wVer {}, bCryptMethod {:?}, NBT at {:?}, BBT at {:?}",
            header.version(),
            header.raw_version(),
            header.crypt_method(),
            header.root().node_btree().index(),
            header.root().block_btree().index()
        );

        Ok(Self {
            reader: Mutex::new(Box::new(reader)),
            header,
            options,
            cache: Default::default(),
            named_properties: Default::default(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn options(&self) -> &PstOptions {
        &self.options
    }

    pub fn node_btree(&self) -> NodeBTree<'_> {
        NodeBTree::new(self)
    }

    pub fn block_btree(&self) -> BlockBTree<'_> {
        BlockBTree::new(self)
    }

    /// Read up to `size` bytes at `index`. The result is shorter only at the end of the file.
    fn read_at(&self, index: ByteIndex, size: usize) -> NdbResult<Vec<u8>> {
        let mut reader = self.reader.lock().map_err(|_| NdbError::FailedToLockFile)?;
        reader.seek(SeekFrom::Start(u64::from(index)))?;
        let mut data = Vec::with_capacity(size);
        Read::take(&mut **reader, size as u64).read_to_end(&mut data)?;
        Ok(data)
    }

    /// Read and validate the page at `page_ref`, which must be a `page_type` B-tree page.
    pub fn read_btree_page(
        &self,
        page_ref: BlockRef,
        page_type: PageType,
    ) -> NdbResult<Arc<BTreePage>> {
        let key = (page_ref.index(), page_type);
        if let Some(page) = cache_get(&self.cache.pages, &key) {
            return Ok(page);
        }

        trace!("reading {page_type:?} page at {:?}", page_ref.index());
        let data = self.read_at(page_ref.index(), PAGE_SIZE)?;
        let page = Arc::new(BTreePage::read(
            data,
            self.header.version(),
            page_type,
            page_ref,
            self.options.verify_block_signatures,
        )?);

        cache_insert(
            &self.cache.pages,
            self.options.block_cache_capacity,
            key,
            page.clone(),
        );
        Ok(page)
    }

    /// Look up `block` in the BBT, then read, validate, and decode it.
    pub fn read_block(&self, block: BlockId) -> NdbResult<Arc<[u8]>> {
        if let Some(data) = cache_get(&self.cache.blocks, &block) {
            trace!("cache hit {block:?}");
            return Ok(data);
        }

        let entry = self.block_btree().find(block)?;
        let version = self.header.version();
        let size = block_size(usize::from(entry.data_size()) + version.block_trailer_size());

        trace!(
            "reading {block:?} at {:?}, cb 0x{:X}",
            entry.block().index(),
            entry.data_size()
        );
        let raw = self.read_at(entry.block().index(), size)?;
        let data: Arc<[u8]> = read_block_data(
            raw,
            &entry,
            version,
            self.header.crypt_method(),
            self.options.verify_block_signatures,
        )?
        .into();

        cache_insert(
            &self.cache.blocks,
            self.options.block_cache_capacity,
            block,
            data.clone(),
        );
        Ok(data)
    }

    /// Look up a top level node in the NBT.
    pub fn node(&self, node: NodeId) -> NdbResult<Node<'_>> {
        let entry = self.node_btree().find(node)?;
        Ok(Node::from_node_entry(self, &entry))
    }

    pub fn heap_context(&self, node: NodeId) -> LtpResult<HeapContext<'_>> {
        self.node(node)?.heap_context()
    }

    pub fn property_context(&self, node: NodeId) -> LtpResult<PropertyContext<'_>> {
        self.node(node)?.property_context()
    }

    pub fn table_context(&self, node: NodeId) -> LtpResult<TableContext<'_>> {
        self.node(node)?.table_context()
    }

    /// The named property map, read from the file on first use.
    pub fn named_properties(&self) -> MessagingResult<Arc<NamedPropertyMap>> {
        if let Some(map) = self
            .named_properties
            .read()
            .ok()
            .and_then(|map| map.clone())
        {
            return Ok(map);
        }

        let map = Arc::new(NamedPropertyMap::read(self)?);
        if let Ok(mut cached) = self.named_properties.write() {
            *cached = Some(map.clone());
        }
        Ok(map)
    }
}
