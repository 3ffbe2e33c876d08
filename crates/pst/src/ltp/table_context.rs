//! ## [Table Context (TC)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5e48be0d-a75a-4918-a277-50408ff96740)

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::{io::Read, ops::Range, sync::Arc};
use tracing::trace;

use super::{heap::*, prop_tag::PID_TAG_LTP_ROW_VER, prop_type::*, tree::*, *};
use crate::ndb::{header::NdbVersion, node_id::NodeId};

/// [TCOLDESC](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/3a2f63cf-bb40-4559-910c-e55ec43d9cbb)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableColumnDescriptor {
    prop_type: PropertyType,
    prop_id: u16,
    offset: u16,
    size: u8,
    existence_bit: u8,
}

impl TableColumnDescriptor {
    pub const SIZE: usize = 8;

    pub fn read(f: &mut dyn Read) -> LtpResult<Self> {
        // tag
        let prop_type = PropertyType::try_from(f.read_u16::<LittleEndian>()?)?;
        let prop_id = f.read_u16::<LittleEndian>()?;
        // ibData
        let offset = f.read_u16::<LittleEndian>()?;
        // cbData
        let size = f.read_u8()?;
        // iBit
        let existence_bit = f.read_u8()?;

        Ok(Self {
            prop_type,
            prop_id,
            offset,
            size,
            existence_bit,
        })
    }

    pub fn prop_type(&self) -> PropertyType {
        self.prop_type
    }

    pub fn prop_id(&self) -> u16 {
        self.prop_id
    }

    /// The full property tag, id in the high word.
    pub fn tag(&self) -> u32 {
        (u32::from(self.prop_id) << 16) | u32::from(u16::from(self.prop_type))
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn existence_bit(&self) -> u8 {
        self.existence_bit
    }

    fn range(&self) -> Range<usize> {
        let start = usize::from(self.offset);
        start..start + usize::from(self.size)
    }
}

/// [TCINFO](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/45b3a0c5-d6d6-4e02-aebf-13766ff693f0)
#[derive(Clone, Debug)]
pub struct TableContextInfo {
    group_offsets: [u16; 4],
    row_index: HeapId,
    rows: u32,
    columns: Vec<TableColumnDescriptor>,
}

impl TableContextInfo {
    pub const HEADER_SIZE: usize = 22;

    pub fn read(data: &[u8]) -> LtpResult<Self> {
        check_size("TCINFO", data, Self::HEADER_SIZE)?;
        let mut cursor = data;

        // bType
        let heap_type = HeapNodeType::try_from(cursor.read_u8()?)?;
        if heap_type != HeapNodeType::Table {
            return Err(LtpError::InvalidTableContextHeapType(heap_type));
        }

        // cCols
        let column_count = usize::from(cursor.read_u8()?);

        // rgib
        let mut group_offsets = [0; 4];
        for offset in group_offsets.iter_mut() {
            *offset = cursor.read_u16::<LittleEndian>()?;
        }
        if group_offsets.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(LtpError::InvalidTableContextGroupOffsets(group_offsets));
        }

        // hidRowIndex
        let row_index = HeapId::from(cursor.read_u32::<LittleEndian>()?);
        // hnidRows
        let rows = cursor.read_u32::<LittleEndian>()?;
        // hidIndex
        cursor.read_u32::<LittleEndian>()?;

        // rgTCOLDESC
        check_size(
            "TCINFO rgTCOLDESC",
            cursor,
            column_count * TableColumnDescriptor::SIZE,
        )?;
        let columns = (0..column_count)
            .map(|_| TableColumnDescriptor::read(&mut cursor))
            .collect::<LtpResult<Vec<_>>>()?;

        let info = Self {
            group_offsets,
            row_index,
            rows,
            columns,
        };

        let bitmap_size = usize::from(info.end_existence_bitmap() - info.end_1byte_values());
        for column in info.columns.iter() {
            if column.range().end > usize::from(info.end_1byte_values()) {
                return Err(LtpError::InvalidTableColumnLayout(
                    column.tag(),
                    column.offset(),
                    column.size(),
                ));
            }
            if usize::from(column.existence_bit() / 8) >= bitmap_size {
                return Err(LtpError::InvalidTableColumnBitmapIndex(
                    column.existence_bit(),
                ));
            }
        }

        Ok(info)
    }

    /// `TCI_4b`: end of the 4 and 8 byte values.
    pub fn end_4byte_values(&self) -> u16 {
        self.group_offsets[0]
    }

    /// `TCI_2b`
    pub fn end_2byte_values(&self) -> u16 {
        self.group_offsets[1]
    }

    /// `TCI_1b`
    pub fn end_1byte_values(&self) -> u16 {
        self.group_offsets[2]
    }

    /// `TCI_bm`: end of the existence bitmap, which is the width of every row.
    pub fn end_existence_bitmap(&self) -> u16 {
        self.group_offsets[3]
    }

    pub fn row_size(&self) -> usize {
        usize::from(self.end_existence_bitmap())
    }

    /// `hidRowIndex`
    pub fn row_index(&self) -> HeapId {
        self.row_index
    }

    /// `hnidRows`
    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> &[TableColumnDescriptor] {
        &self.columns
    }
}

/// Where the [Row Data Format](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/c48fa6b4-bfd4-49d7-80f8-8718bc4bcddc)
/// rows are stored.
enum RowMatrix {
    Empty,
    Heap(HeapId),
    Blocks(Vec<Arc<[u8]>>),
}

/// A table: the `TCINFO` at `hidUserRoot` of a heap with `bClientSig` `0x7C`, the row index BTH,
/// and the row matrix, which is either one heap allocation or the data tree of a subnode.
pub struct TableContext<'a> {
    node: Node<'a>,
    heap: HeapNode,
    info: TableContextInfo,
    version: NdbVersion,
    matrix: RowMatrix,
    row_count: usize,
}

impl<'a> TableContext<'a> {
    pub fn read(node: Node<'a>) -> LtpResult<Self> {
        let heap = HeapNode::read(&node)?;
        Self::from_heap(node, heap)
    }

    pub fn from_heap(node: Node<'a>, heap: HeapNode) -> LtpResult<Self> {
        let client_signature = heap.header().client_signature();
        if client_signature != HeapNodeType::Table {
            return Err(LtpError::UnexpectedHeapNodeType(client_signature));
        }

        let info = TableContextInfo::read(heap.find_entry(heap.header().user_root())?)?;
        let version = node.pst().header().version();

        let row_count = match Self::row_index_tree(&heap, &info, version)? {
            Some(tree) => tree.entries()?.len(),
            None => 0,
        };

        let matrix = match info.rows() {
            0 => RowMatrix::Empty,
            hnid if NodeId::from(hnid).id_type().ok() == Some(NodeIdType::HeapNode) => {
                RowMatrix::Heap(HeapId::from(hnid))
            }
            hnid => {
                let tree = node.sub_node(NodeId::from(hnid))?.data_tree()?;
                RowMatrix::Blocks(tree.blocks().to_vec())
            }
        };

        trace!(
            "table {:?}: {} columns, {} rows of 0x{:X} bytes",
            node.id(),
            info.columns().len(),
            row_count,
            info.row_size()
        );

        Ok(Self {
            node,
            heap,
            info,
            version,
            matrix,
            row_count,
        })
    }

    fn row_index_tree<'h>(
        heap: &'h HeapNode,
        info: &TableContextInfo,
        version: NdbVersion,
    ) -> LtpResult<Option<HeapTree<'h>>> {
        if info.row_index().is_null() {
            return Ok(None);
        }

        let tree = HeapTree::read(heap, info.row_index())?;
        let entry_size = match version {
            NdbVersion::Ansi => 2,
            NdbVersion::Unicode => 4,
        };
        let header = tree.header();
        if header.key_size() != 4 || header.entry_size() != entry_size {
            return Err(LtpError::InvalidTableRowIndexEntrySize(
                header.key_size(),
                header.entry_size(),
            ));
        }
        Ok(Some(tree))
    }

    pub fn node(&self) -> &Node<'a> {
        &self.node
    }

    pub fn heap(&self) -> &HeapNode {
        &self.heap
    }

    pub fn info(&self) -> &TableContextInfo {
        &self.info
    }

    pub fn columns(&self) -> &[TableColumnDescriptor] {
        self.info.columns()
    }

    pub fn column(&self, prop_id: u16) -> Option<&TableColumnDescriptor> {
        self.columns()
            .iter()
            .find(|column| column.prop_id() == prop_id)
    }

    /// The number of entries in the row index.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Every [TCROWID](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e20b5cf4-ea56-48b8-a8fa-e086c9b862ca)
    /// as `(dwRowID, dwRowIndex)`, ordered by `dwRowID`.
    pub fn row_ids(&self) -> LtpResult<Vec<(u32, u32)>> {
        let Some(tree) = Self::row_index_tree(&self.heap, &self.info, self.version)? else {
            return Ok(Vec::new());
        };
        Ok(tree
            .entries()?
            .into_iter()
            .map(|record| (LittleEndian::read_u32(record.key()), self.row_index(record.data())))
            .collect())
    }

    fn row_index(&self, data: &[u8]) -> u32 {
        match self.version {
            NdbVersion::Ansi => u32::from(LittleEndian::read_u16(data)),
            NdbVersion::Unicode => LittleEndian::read_u32(data),
        }
    }

    /// The row stored at physical position `index` of the row matrix.
    pub fn get_row(&self, index: usize) -> LtpResult<TableRow<'_, 'a>> {
        if index >= self.row_count {
            return Err(LtpError::TableRowIndexOutOfBounds(index, self.row_count));
        }

        let row_size = self.info.row_size();
        let data = match &self.matrix {
            RowMatrix::Empty => return Err(LtpError::TableRowIndexOutOfBounds(index, 0)),
            RowMatrix::Heap(heap_id) => {
                let rows = self.heap.find_entry(*heap_id)?;
                let start = index * row_size;
                check_size("TC row matrix", rows, start + row_size)?;
                rows[start..start + row_size].to_vec()
            }
            RowMatrix::Blocks(blocks) => {
                let rows_per_block = (self.version.max_block_data_size() / row_size.max(1)).max(1);
                let block_index = index / rows_per_block;
                let start = (index % rows_per_block) * row_size;
                let block = blocks.get(block_index).ok_or(LtpError::Truncated(
                    "TC row matrix",
                    block_index + 1,
                    blocks.len(),
                ))?;
                check_size("TC row matrix block", block, start + row_size)?;
                block[start..start + row_size].to_vec()
            }
        };

        Ok(TableRow { table: self, data })
    }

    /// Look up a row by its `dwRowID` through the row index.
    pub fn find_row(&self, row_id: u32) -> LtpResult<Option<TableRow<'_, 'a>>> {
        let Some(tree) = Self::row_index_tree(&self.heap, &self.info, self.version)? else {
            return Ok(None);
        };
        let Some(record) = tree.find(u128::from(row_id))? else {
            return Ok(None);
        };
        let index = self.row_index(record.data()) as usize;
        self.get_row(index).map(Some)
    }

    /// Every row in row matrix order. Rows are read as the iterator advances, and each call starts
    /// over from the first row.
    pub fn rows(&self) -> TableRows<'_, 'a> {
        TableRows {
            table: self,
            next: 0,
        }
    }
}

pub struct TableRows<'t, 'a> {
    table: &'t TableContext<'a>,
    next: usize,
}

impl<'t, 'a> Iterator for TableRows<'t, 'a> {
    type Item = LtpResult<TableRow<'t, 'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.table.row_count() {
            return None;
        }
        let row = self.table.get_row(self.next);
        self.next += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.row_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

/// One row of a [TableContext].
pub struct TableRow<'t, 'a> {
    table: &'t TableContext<'a>,
    data: Vec<u8>,
}

impl TableRow<'_, '_> {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// `dwRowID`, which is always the first 4 bytes of the row.
    pub fn row_id(&self) -> u32 {
        self.data.get(..4).map_or(0, LittleEndian::read_u32)
    }

    /// `PidTagLtpRowVer`, if the table has that column.
    pub fn row_version(&self) -> LtpResult<Option<u32>> {
        Ok(self
            .value(PID_TAG_LTP_ROW_VER)?
            .and_then(|value| value.as_i32())
            .map(|value| value as u32))
    }

    /// Test the existence bitmap bit of `column`.
    pub fn is_present(&self, column: &TableColumnDescriptor) -> bool {
        let bit = usize::from(column.existence_bit());
        self.data
            .get(usize::from(self.table.info.end_1byte_values()) + bit / 8)
            .is_some_and(|byte| byte & (1 << (7 - (bit % 8))) != 0)
    }

    /// The value of `prop_id` in this row, or `None` if there is no such column or the existence
    /// bitmap says the cell is empty.
    pub fn value(&self, prop_id: u16) -> LtpResult<Option<PropertyValue>> {
        let Some(column) = self.table.column(prop_id) else {
            return Ok(None);
        };
        if !self.is_present(column) {
            return Ok(None);
        }
        self.read_cell(column).map(Some)
    }

    /// Every present cell in column order.
    pub fn values(&self) -> LtpResult<Vec<(u16, PropertyValue)>> {
        self.table
            .columns()
            .iter()
            .filter(|column| self.is_present(column))
            .map(|column| Ok((column.prop_id(), self.read_cell(column)?)))
            .collect()
    }

    /// Values of up to 8 bytes are stored in the row itself, and everything else as an `HNID`.
    fn read_cell(&self, column: &TableColumnDescriptor) -> LtpResult<PropertyValue> {
        let cell = &self.data[column.range()];
        let prop_type = column.prop_type();

        match prop_type.fixed_size() {
            Some(size) if size <= 8 => PropertyValue::read(prop_type, cell),
            _ => {
                if cell.len() != 4 {
                    return Err(LtpError::InvalidTableColumnLayout(
                        column.tag(),
                        column.offset(),
                        column.size(),
                    ));
                }
                let hnid = LittleEndian::read_u32(cell);
                let data = self.table.heap.read_hnid(&self.table.node, hnid)?;
                PropertyValue::read(prop_type, &data)
            }
        }
    }
}
