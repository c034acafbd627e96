//! LZW compression as GIF image data wants it.
//!
//! Variable code width starting at `min_code_size + 1` bits and growing up to 12 bits, a Clear
//! code opening the stream and whenever the dictionary is full, an End-of-Information code
//! closing it. Codes are packed least significant bit first and the bytes are cut into
//! length-prefixed sub-blocks.
//!
//! The dictionary is an open-addressing hash table keyed by `(symbol, prefix code)`.

use crate::consts::{GIF_MAX_SUB_BLOCK, LZW_MAX_CODE_BITS};
use alloc::{vec, vec::Vec};

/// Prime, comfortably above the 4096 codes the dictionary can hold.
const HASH_SIZE: usize = 5003;
/// Shift applied to the symbol for the primary hash slot.
const HASH_SHIFT: u32 = 4;
const MAX_CODES: u16 = 1 << LZW_MAX_CODE_BITS;

/// Writes bytes as data sub-blocks: a length byte followed by up to 255 bytes.
struct SubBlocks<'a> {
    out: &'a mut Vec<u8>,
    block: [u8; GIF_MAX_SUB_BLOCK],
    len: usize,
}

impl<'a> SubBlocks<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            block: [0; GIF_MAX_SUB_BLOCK],
            len: 0,
        }
    }

    #[inline]
    fn push(&mut self, byte: u8) {
        self.block[self.len] = byte;
        self.len += 1;
        if self.len == GIF_MAX_SUB_BLOCK {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.len > 0 {
            self.out.push(self.len as u8);
            self.out.extend_from_slice(&self.block[..self.len]);
            self.len = 0;
        }
    }

    /// Flushes the pending block and writes the zero-length terminator.
    fn finish(mut self) {
        self.flush();
        self.out.push(0);
    }
}

/// Little-endian bit packer in front of the sub-block writer.
struct BitPacker<'a> {
    blocks: SubBlocks<'a>,
    buffer: u32,
    cursor: u8,
}

impl<'a> BitPacker<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            blocks: SubBlocks::new(out),
            buffer: 0,
            cursor: 0,
        }
    }

    #[inline]
    fn write(&mut self, amount: u8, code: u16) {
        let mask = (1 << amount) - 1;
        self.buffer |= (u32::from(code) & mask) << self.cursor;
        self.cursor += amount;

        while self.cursor >= 8 {
            self.blocks.push(self.buffer as u8);
            self.buffer >>= 8;
            self.cursor -= 8;
        }
    }

    fn finish(mut self) {
        if self.cursor > 0 {
            self.blocks.push(self.buffer as u8);
        }
        self.blocks.finish();
    }
}

enum Probe {
    Found(u16),
    Vacant(usize),
}

/// The dictionary: `(symbol << 12) + prefix` keys and the codes assigned to them.
struct CodeTable {
    keys: Vec<i32>,
    codes: Vec<u16>,
}

impl CodeTable {
    fn new() -> Self {
        Self {
            keys: vec![-1; HASH_SIZE],
            codes: vec![0; HASH_SIZE],
        }
    }

    fn clear(&mut self) {
        self.keys.fill(-1);
    }

    /// Looks up `key`, returning its code or the empty slot it should go into.
    #[inline]
    fn probe(&self, key: i32, symbol: u8, prefix: u16) -> Probe {
        let mut slot = (usize::from(symbol) << HASH_SHIFT) ^ usize::from(prefix);
        let displacement = if slot == 0 { 1 } else { HASH_SIZE - slot };

        loop {
            match self.keys[slot] {
                k if k == key => return Probe::Found(self.codes[slot]),
                k if k < 0 => return Probe::Vacant(slot),
                _ => {}
            }
            slot = if slot >= displacement {
                slot - displacement
            } else {
                slot + HASH_SIZE - displacement
            };
        }
    }

    #[inline]
    fn insert(&mut self, slot: usize, key: i32, code: u16) {
        self.keys[slot] = key;
        self.codes[slot] = code;
    }
}

/// Tracks the current code width while codes are written.
struct CodeWriter<'a> {
    packer: BitPacker<'a>,
    init_bits: u8,
    bits: u8,
    max_code: u16,
}

impl<'a> CodeWriter<'a> {
    fn new(out: &'a mut Vec<u8>, init_bits: u8) -> Self {
        Self {
            packer: BitPacker::new(out),
            init_bits,
            bits: init_bits,
            max_code: max_code(init_bits),
        }
    }

    /// Writes `code` at the current width, then adjusts the width for the next code: back to the
    /// initial width after a Clear, one bit wider once `next_code` no longer fits.
    #[inline]
    fn emit(&mut self, code: u16, next_code: u16, reset: bool) {
        self.packer.write(self.bits, code);

        if reset {
            self.bits = self.init_bits;
            self.max_code = max_code(self.bits);
        } else if next_code > self.max_code {
            self.bits += 1;
            self.max_code = if self.bits == LZW_MAX_CODE_BITS {
                MAX_CODES
            } else {
                max_code(self.bits)
            };
        }
    }
}

#[inline]
const fn max_code(bits: u8) -> u16 {
    (1 << bits) - 1
}

/// LZW encoder. The dictionary allocation is reused between calls to [`LzwEncoder::encode`].
pub struct LzwEncoder {
    table: CodeTable,
}

impl Default for LzwEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LzwEncoder {
    pub fn new() -> Self {
        Self {
            table: CodeTable::new(),
        }
    }

    /// Compresses `indices` and appends GIF image data to `out`: the minimum code size byte,
    /// the sub-blocks, and the zero-length terminator.
    ///
    /// # Panics
    ///
    /// Panics if `min_code_size` is not in `2..=8`, or, in debug builds, if an index does not
    /// fit in `min_code_size` bits.
    pub fn encode(&mut self, indices: &[u8], min_code_size: u8, out: &mut Vec<u8>) {
        assert!(
            (2..=8).contains(&min_code_size),
            "LZW minimum code size must be between 2 and 8, was {min_code_size}"
        );

        out.push(min_code_size);

        let clear_code: u16 = 1 << min_code_size;
        let end_code = clear_code + 1;
        let mut next_code = clear_code + 2;

        self.table.clear();
        let mut writer = CodeWriter::new(out, min_code_size + 1);
        writer.emit(clear_code, next_code, false);

        let mut symbols = indices.iter().copied();
        let Some(first) = symbols.next() else {
            writer.emit(end_code, next_code, false);
            writer.packer.finish();
            return;
        };

        let mut prefix = u16::from(first);
        for symbol in symbols {
            debug_assert!(u16::from(symbol) < clear_code, "index {symbol} out of range");

            let key = (i32::from(symbol) << LZW_MAX_CODE_BITS) + i32::from(prefix);
            match self.table.probe(key, symbol, prefix) {
                Probe::Found(code) => prefix = code,
                Probe::Vacant(slot) => {
                    writer.emit(prefix, next_code, false);
                    prefix = u16::from(symbol);

                    if next_code < MAX_CODES {
                        self.table.insert(slot, key, next_code);
                        next_code += 1;
                    } else {
                        self.table.clear();
                        next_code = clear_code + 2;
                        writer.emit(clear_code, next_code, true);
                    }
                }
            }
        }

        writer.emit(prefix, next_code, false);
        writer.emit(end_code, next_code, false);
        writer.packer.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    /// Splits GIF image data into its minimum code size and the concatenated sub-block payload.
    fn unblock(data: &[u8]) -> (u8, Vec<u8>) {
        let (&min_code_size, mut rest) = data.split_first().unwrap();
        let mut payload = vec![];
        loop {
            let (&len, tail) = rest.split_first().unwrap();
            if len == 0 {
                assert!(tail.is_empty(), "data after the terminator");
                break;
            }
            payload.extend_from_slice(&tail[..usize::from(len)]);
            rest = &tail[usize::from(len)..];
        }
        (min_code_size, payload)
    }

    fn decode(data: &[u8]) -> Vec<u8> {
        let (min_code_size, payload) = unblock(data);
        weezl::decode::Decoder::new(weezl::BitOrder::Lsb, min_code_size)
            .decode(&payload)
            .unwrap()
    }

    #[test]
    fn encode_small() {
        let mut out = vec![];
        LzwEncoder::new().encode(&[0, 0, 1, 3], 2, &mut out);
        assert_eq!(out, [0x02, 0x03, 0x04, 0x32, 0x05, 0x00]);
    }

    #[test]
    fn encode_empty() {
        let mut out = vec![];
        LzwEncoder::new().encode(&[], 2, &mut out);
        // Clear (4) then End (5), 3 bits each.
        assert_eq!(out, [0x02, 0x01, 0x2C, 0x00]);
    }

    #[test]
    fn bit_packer_little_endian() {
        let mut out = vec![];
        let mut packer = BitPacker::new(&mut out);
        packer.write(3, 4);
        packer.write(3, 1);
        packer.write(3, 6);
        packer.write(3, 6);
        packer.write(4, 2);
        packer.finish();

        assert_eq!(out, [0x02, 0x8C, 0x2D, 0x00]);
    }

    #[test]
    fn sub_blocks_are_at_most_255_bytes() {
        let mut out = vec![];
        let mut blocks = SubBlocks::new(&mut out);
        for i in 0..600u32 {
            blocks.push(i as u8);
        }
        blocks.finish();

        assert_eq!(out.len(), 600 + 3 + 1);
        assert_eq!(out[0], 255);
        assert_eq!(out[256], 255);
        assert_eq!(out[512], 90);
        assert_eq!(out.last(), Some(&0));
    }

    #[test]
    fn repetitive_data_roundtrips() {
        let data: Vec<u8> = (0..10_000).map(|i| ((i / 7) % 4) as u8).collect();
        let mut out = vec![];
        LzwEncoder::new().encode(&data, 2, &mut out);

        assert!(out.len() < data.len() / 4);
        assert_eq!(decode(&out), data);
    }

    #[test]
    fn noise_roundtrips_through_dictionary_resets() {
        let mut rng = StdRng::seed_from_u64(42);
        let data: Vec<u8> = (0..200_000).map(|_| rng.gen()).collect();

        let mut out = vec![];
        LzwEncoder::new().encode(&data, 8, &mut out);
        assert_eq!(decode(&out), data);
    }

    #[test]
    fn encoder_is_reusable() {
        let mut rng = StdRng::seed_from_u64(1);
        let first: Vec<u8> = (0..50_000).map(|_| rng.gen_range(0..32)).collect();
        let second: Vec<u8> = (0..3_000).map(|_| rng.gen_range(0..8)).collect();

        let mut encoder = LzwEncoder::new();
        let mut out = vec![];
        encoder.encode(&first, 5, &mut out);
        assert_eq!(decode(&out), first);

        let mut reused = vec![];
        encoder.encode(&second, 3, &mut reused);
        let mut fresh = vec![];
        LzwEncoder::new().encode(&second, 3, &mut fresh);

        assert_eq!(reused, fresh);
        assert_eq!(decode(&reused), second);
    }

    #[test]
    #[should_panic]
    fn rejects_oversized_code_size() {
        LzwEncoder::new().encode(&[0], 9, &mut vec![]);
    }
}
