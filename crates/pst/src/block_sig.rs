//! ## [Block Signature](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e700a913-9db5-46a4-ac76-37cabea823e1)
//!
//! The `wSig` field of page and block trailers is derived from where the block lives and what it
//! is called. Only the low `DWORD` of each value takes part.

use crate::ndb::{block_id::BlockId, block_ref::ByteIndex};

/// Compute `wSig` for a block or page stored at `index` with id `block_id`.
pub fn compute_sig(index: ByteIndex, block_id: BlockId) -> u16 {
    let value = (u64::from(index) as u32) ^ (u64::from(block_id) as u32);
    (value >> 16) as u16 ^ (value as u16)
}
