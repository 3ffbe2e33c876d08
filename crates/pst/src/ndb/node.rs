//! Nodes
//!
//! A [Node] is the unit the LTP layer is built on: a data tree holding its primary stream, and an
//! optional subnode tree holding any secondary streams. Top level nodes come from the NBT, and
//! subnodes come from the subnode tree of their owner, but both are read the same way.

use std::fmt::Debug;

use super::{block::DataTree, block_id::*, node_id::*, page::NodeBTreeEntry, sub_node::*, *};
use crate::{
    ltp::{
        prop_context::PropertyContext, table_context::TableContext, HeapContext, LtpResult,
    },
    PstFile,
};

#[derive(Clone, Copy)]
pub struct Node<'a> {
    pst: &'a PstFile,
    id: NodeId,
    data: BlockId,
    sub_node: Option<BlockId>,
    parent: Option<NodeId>,
}

impl<'a> Node<'a> {
    pub(crate) fn from_node_entry(pst: &'a PstFile, entry: &NodeBTreeEntry) -> Self {
        Self {
            pst,
            id: entry.node(),
            data: entry.data(),
            sub_node: entry.sub_node(),
            parent: entry.parent(),
        }
    }

    pub(crate) fn from_sub_node_entry(pst: &'a PstFile, entry: &SubNodeEntry) -> Self {
        Self {
            pst,
            id: entry.node(),
            data: entry.data(),
            sub_node: entry.sub_node(),
            parent: None,
        }
    }

    pub fn pst(&self) -> &'a PstFile {
        self.pst
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn data_block(&self) -> BlockId {
        self.data
    }

    pub fn sub_node_block(&self) -> Option<BlockId> {
        self.sub_node
    }

    /// `nidParent` from the NBT. Subnodes have no parent of their own.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The blocks of the primary stream, in order. A node without a data block has an empty tree.
    pub fn data_tree(&self) -> NdbResult<DataTree> {
        if self.data.is_null() {
            return Ok(Default::default());
        }
        DataTree::read(self.pst, self.data)
    }

    /// The primary stream as one contiguous buffer.
    pub fn read_data(&self) -> NdbResult<Vec<u8>> {
        Ok(self.data_tree()?.to_vec())
    }

    pub fn sub_node_tree(&self) -> Option<SubNodeTree<'a>> {
        self.sub_node
            .map(|block| SubNodeTree::new(self.pst, block))
    }

    /// Every subnode directly below this node.
    pub fn sub_nodes(&self) -> NdbResult<Vec<Node<'a>>> {
        let Some(tree) = self.sub_node_tree() else {
            return Ok(Vec::new());
        };
        Ok(tree
            .entries()?
            .iter()
            .map(|entry| Node::from_sub_node_entry(self.pst, entry))
            .collect())
    }

    /// Look up one subnode, [NdbError::SubNodeNotFound] if it is missing or there is no subnode
    /// tree at all.
    pub fn sub_node(&self, node: NodeId) -> NdbResult<Node<'a>> {
        let tree = self
            .sub_node_tree()
            .ok_or(NdbError::SubNodeNotFound(node))?;
        let entry = tree.find(node)?;
        Ok(Node::from_sub_node_entry(self.pst, &entry))
    }

    pub fn heap_context(&self) -> LtpResult<HeapContext<'a>> {
        HeapContext::read(*self)
    }

    pub fn property_context(&self) -> LtpResult<PropertyContext<'a>> {
        PropertyContext::read(*self)
    }

    pub fn table_context(&self) -> LtpResult<TableContext<'a>> {
        TableContext::read(*self)
    }
}

impl Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("data", &self.data)
            .field("sub_node", &self.sub_node)
            .field("parent", &self.parent)
            .finish()
    }
}
