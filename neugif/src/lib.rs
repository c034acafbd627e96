//! Animated GIF encoder built from two classic pieces: the NeuQuant neural-net color quantizer
//! and the GIF variant of LZW.
//!
//! Each frame is a plain RGB buffer. The encoder learns a palette of up to 256 colors for the
//! frame, maps every pixel to its nearest palette entry, LZW-compresses the resulting indices and
//! appends the frame's blocks to a single output buffer. The whole stream is handed out at
//! [`GifEncoder::finish`].
//!
//! # Example
//!
//! ```
//! use neugif::{EncoderConfig, FrameOptions, GifEncoder, Repeat};
//!
//! let (width, height) = (4, 4);
//! let red = [255u8, 0, 0].repeat(width * height);
//! let blue = [0u8, 0, 255].repeat(width * height);
//!
//! let mut encoder = GifEncoder::new();
//! encoder
//!     .start(EncoderConfig::new(width as u16, height as u16).with_repeat(Repeat::Infinite))
//!     .unwrap();
//! encoder.add_frame(&red, FrameOptions::default()).unwrap();
//! encoder.add_frame(&blue, FrameOptions::default()).unwrap();
//!
//! let gif = encoder.finish().unwrap();
//! assert!(gif.starts_with(b"GIF89a"));
//! assert_eq!(gif.last(), Some(&0x3B));
//! ```
//!
//! # Stream layout
//!
//! ```plain
//! GIF89a
//! logical screen descriptor
//! global color table          (palette of the first frame)
//! NETSCAPE2.0 extension       (only when looping is configured)
//! per frame:
//!     graphic control extension
//!     image descriptor
//!     local color table       (every frame after the first, per-frame palette policy only)
//!     image data              (LZW code size + sub-blocks)
//! trailer
//! ```
//!
//! See [consts] for the exact bytes of every block.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod config;
pub mod encode;
pub mod lzw;
pub mod quant;
pub mod utils;
pub mod writer;

pub use config::{DisposalMethod, EncoderConfig, FrameOptions, PalettePolicy, Repeat};
pub use encode::{encode_frames, EncodeError, EncoderState, GifEncoder};
#[cfg(feature = "std")]
pub use encode::WriteError;
pub use quant::{ColorQuantizer, ColorTable};

pub mod consts {
    /// File signature and version.
    ///
    /// ```plain
    /// .- GIF_SIGNATURE --------------.
    /// |  G  |  I  |  F  |  8  |  9  |  a  |
    /// `------------------------------'
    /// ```
    pub const GIF_SIGNATURE: &[u8; 6] = b"GIF89a";

    /// Introduces every extension block.
    pub const GIF_EXTENSION_INTRODUCER: u8 = 0x21;

    /// Label of the application extension carrying the loop count.
    ///
    /// ```plain
    /// .- application extension (19 bytes) ------------------------------------.
    /// | 0x21 | 0xFF | 11 | "NETSCAPE2.0" | 3 | 1 | loop count u16le | 0      |
    /// `-----------------------------------------------------------------------'
    /// ```
    ///
    /// A loop count of 0 means "loop forever".
    pub const GIF_APPLICATION_LABEL: u8 = 0xFF;

    /// Identifier + authentication code of the looping extension.
    pub const GIF_NETSCAPE_ID: &[u8; 11] = b"NETSCAPE2.0";

    /// Label of the graphic control extension.
    ///
    /// ```plain
    /// .- graphic control extension (8 bytes) -----------------------------.
    /// | 0x21 | 0xF9 | 4 | packed | delay u16le | transparent idx | 0      |
    /// `-------------------------------------------------------------------'
    ///
    /// packed:
    /// |  7  6  5 |  4  3  2 |     1      |       0      |
    /// | reserved | disposal | user input | transparency |
    /// ```
    ///
    /// The delay is in hundredths of a second. Transparency is never used.
    pub const GIF_GRAPHIC_CONTROL_LABEL: u8 = 0xF9;

    /// Starts an image descriptor.
    ///
    /// ```plain
    /// .- image descriptor (10 bytes) --------------------------------------------.
    /// | 0x2C | left u16le | top u16le | width u16le | height u16le | packed      |
    /// `--------------------------------------------------------------------------'
    ///
    /// packed:
    /// |      7      |     6     |  5   |  4  3  |   2  1  0   |
    /// | local table | interlace | sort | reserved| table bits-1 |
    /// ```
    pub const GIF_IMAGE_SEPARATOR: u8 = 0x2C;

    /// Ends the stream.
    pub const GIF_TRAILER: u8 = 0x3B;

    /// Set in the screen descriptor and image descriptor when a color table follows.
    pub const GIF_COLOR_TABLE_PRESENT: u8 = 0b1000_0000;

    /// Color resolution field of the screen descriptor: 8 bits per primary color.
    ///
    /// ```plain
    /// .- screen descriptor packed byte -------------------------.
    /// |      7       |  6  5  4   |  3   |      2  1  0         |
    /// | global table | resolution | sort | global table bits-1  |
    /// `---------------------------------------------------------'
    /// ```
    pub const GIF_COLOR_RESOLUTION_8: u8 = 0b0111_0000;

    /// Largest payload of a single data sub-block.
    pub const GIF_MAX_SUB_BLOCK: usize = 255;

    /// Upper bound of the LZW code width.
    pub const LZW_MAX_CODE_BITS: u8 = 12;
}
