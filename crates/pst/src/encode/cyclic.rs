//! ## [Cyclic Encoding](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/9979fc01-0a3e-496f-900f-a6a867951f23)
//!
//! `NDB_CRYPT_CYCLIC`: a keystream seeded from the low 32 bits of the block's `BID` drives three
//! table substitutions per byte. The transform is its own inverse.

use super::*;

/// Encode or decode block data in place. `key` is the low `DWORD` of the block `BID`.
pub fn encode_decode_block(data: &mut [u8], key: u32) {
    let mut key = (key ^ (key >> 16)) as u16;

    for b in data.iter_mut() {
        let [low, high] = key.to_le_bytes();

        let mut value = b.wrapping_add(low);
        value = KEY_DATA_R[value as usize];
        value = value.wrapping_add(high);
        value = KEY_DATA_S[value as usize];
        value = value.wrapping_sub(high);
        value = KEY_DATA_I[value as usize];
        *b = value.wrapping_sub(low);

        key = key.wrapping_add(1);
    }
}
