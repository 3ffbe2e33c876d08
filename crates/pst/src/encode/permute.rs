//! ## [Permutative Encoding](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5faf4800-645d-49d1-9457-2ac40eb467bd)
//!
//! `NDB_CRYPT_PERMUTE`: every byte is substituted through a fixed table, independent of the block.

use super::*;

/// Obfuscate block data in place with `mpbbR`.
pub fn encode_block(data: &mut [u8]) {
    substitute(data, &KEY_DATA_R);
}

/// Recover block data in place with `mpbbI`.
pub fn decode_block(data: &mut [u8]) {
    substitute(data, &KEY_DATA_I);
}

fn substitute(data: &mut [u8], table: &[u8; 256]) {
    data.iter_mut().for_each(|b| *b = table[*b as usize]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_bytes() {
        let mut data = [0x00, 0x01, 0xFF];
        encode_block(&mut data);
        assert_eq!(data, [0x41, 0x36, 0x3D]);
        decode_block(&mut data);
        assert_eq!(data, [0x00, 0x01, 0xFF]);
    }

    #[test]
    fn test_decode_reverses_encode() {
        let original: Vec<u8> = (0..=255).collect();
        let mut data = original.clone();
        encode_block(&mut data);
        assert_ne!(original, data);
        decode_block(&mut data);
        assert_eq!(original, data);
    }
}
