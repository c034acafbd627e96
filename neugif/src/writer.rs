//! GIF block writer. Owns the output buffer of one encoding session.

use crate::{
    config::DisposalMethod,
    consts::*,
    lzw::LzwEncoder,
    quant::ColorTable,
    utils::{min_code_size, table_len},
};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Default)]
pub struct GifWriter {
    buf: Vec<u8>,
}

impl GifWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    fn write_u16(&mut self, value: u16) {
        let mut bytes = [0; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn write_signature(&mut self) {
        self.buf.extend_from_slice(GIF_SIGNATURE);
    }

    /// Logical screen descriptor announcing `global` as the global color table.
    pub fn write_screen_descriptor(&mut self, width: u16, height: u16, global: &ColorTable) {
        self.write_u16(width);
        self.write_u16(height);
        self.buf
            .push(GIF_COLOR_TABLE_PRESENT | GIF_COLOR_RESOLUTION_8 | (global.bits() - 1));
        // background color index, pixel aspect ratio
        self.buf.extend_from_slice(&[0, 0]);
    }

    /// Writes the table's colors, padded with black up to the declared power of two size.
    pub fn write_color_table(&mut self, table: &ColorTable) {
        let padded = table_len(table.bits());
        self.buf.reserve(padded * 3);
        for color in table.colors() {
            self.buf.extend_from_slice(color);
        }
        self.buf.resize(self.buf.len() + (padded - table.len()) * 3, 0);
    }

    /// NETSCAPE2.0 application extension. A loop count of 0 loops forever.
    pub fn write_loop_extension(&mut self, loop_count: u16) {
        self.buf
            .extend_from_slice(&[GIF_EXTENSION_INTRODUCER, GIF_APPLICATION_LABEL, 11]);
        self.buf.extend_from_slice(GIF_NETSCAPE_ID);
        self.buf.extend_from_slice(&[3, 1]);
        self.write_u16(loop_count);
        self.buf.push(0);
    }

    /// Graphic control extension. `delay` is in hundredths of a second.
    pub fn write_graphic_control(&mut self, disposal: DisposalMethod, delay: u16) {
        self.buf.extend_from_slice(&[
            GIF_EXTENSION_INTRODUCER,
            GIF_GRAPHIC_CONTROL_LABEL,
            4,
            (disposal as u8) << 2,
        ]);
        self.write_u16(delay);
        // transparent color index (unused), terminator
        self.buf.extend_from_slice(&[0, 0]);
    }

    /// Image descriptor for a full-canvas frame. When `local` is given, the packed field
    /// announces it and the caller writes it next.
    pub fn write_image_descriptor(&mut self, width: u16, height: u16, local: Option<&ColorTable>) {
        self.buf.push(GIF_IMAGE_SEPARATOR);
        self.write_u16(0);
        self.write_u16(0);
        self.write_u16(width);
        self.write_u16(height);
        self.buf.push(match local {
            Some(table) => GIF_COLOR_TABLE_PRESENT | (table.bits() - 1),
            None => 0,
        });
    }

    /// LZW-compressed image data for indices into a palette of `palette_len` colors.
    pub fn write_image_data(&mut self, lzw: &mut LzwEncoder, indices: &[u8], palette_len: usize) {
        lzw.encode(indices, min_code_size(palette_len), &mut self.buf);
    }

    pub fn write_trailer(&mut self) {
        self.buf.push(GIF_TRAILER);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_colors() -> ColorTable {
        ColorTable::new(vec![[255, 0, 0], [0, 0, 255]])
    }

    #[test]
    fn screen_descriptor() {
        let mut w = GifWriter::new();
        w.write_signature();
        w.write_screen_descriptor(320, 200, &two_colors());
        assert_eq!(
            w.as_bytes(),
            b"GIF89a\x40\x01\xC8\x00\xF0\x00\x00".as_slice()
        );
    }

    #[test]
    fn color_table_is_padded() {
        let mut w = GifWriter::new();
        w.write_color_table(&ColorTable::new(vec![[1, 2, 3], [4, 5, 6], [7, 8, 9]]));
        assert_eq!(w.as_bytes(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 0, 0]);

        let mut w = GifWriter::new();
        w.write_color_table(&ColorTable::new(vec![[9, 9, 9]]));
        assert_eq!(w.as_bytes(), [9, 9, 9, 0, 0, 0]);
    }

    #[test]
    fn loop_extension() {
        let mut w = GifWriter::new();
        w.write_loop_extension(0x0102);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 19);
        assert_eq!(&bytes[..3], [0x21, 0xFF, 11]);
        assert_eq!(&bytes[3..14], b"NETSCAPE2.0");
        assert_eq!(&bytes[14..], [3, 1, 0x02, 0x01, 0]);
    }

    #[test]
    fn graphic_control() {
        let mut w = GifWriter::new();
        w.write_graphic_control(DisposalMethod::Background, 500);
        assert_eq!(w.as_bytes(), [0x21, 0xF9, 4, 0b0000_1000, 0xF4, 0x01, 0, 0]);
    }

    #[test]
    fn image_descriptor() {
        let mut w = GifWriter::new();
        w.write_image_descriptor(2, 3, None);
        w.write_image_descriptor(2, 3, Some(&two_colors()));
        assert_eq!(
            w.as_bytes(),
            [
                0x2C, 0, 0, 0, 0, 2, 0, 3, 0, 0, //
                0x2C, 0, 0, 0, 0, 2, 0, 3, 0, 0x80,
            ]
        );
    }

    #[test]
    fn image_data_uses_palette_code_size() {
        let mut w = GifWriter::new();
        w.write_image_data(&mut LzwEncoder::new(), &[0, 0, 1, 3], 4);
        assert_eq!(w.as_bytes(), [0x02, 0x03, 0x04, 0x32, 0x05, 0x00]);

        let mut w = GifWriter::new();
        w.write_image_data(&mut LzwEncoder::new(), &[0; 16], 200);
        assert_eq!(w.as_bytes()[0], 8);
    }
}
