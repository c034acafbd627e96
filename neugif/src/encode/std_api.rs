use super::{EncodeError, GifEncoder};
use snafu::{ResultExt, Snafu};
use std::io::Write;

#[derive(Debug, Snafu)]
pub enum WriteError {
    #[snafu(display("Failed to finish the GIF stream"))]
    Encode { source: EncodeError },
    WriteIo { source: std::io::Error },
}

impl GifEncoder {
    /// Finishes the session like [`GifEncoder::finish`] and writes the stream to `w`.
    ///
    /// Returns the number of bytes written.
    pub fn finish_to_writer<W: Write>(&mut self, mut w: W) -> Result<usize, WriteError> {
        let gif = self.finish().context(EncodeSnafu)?;
        w.write_all(&gif).context(WriteIoSnafu)?;
        w.flush().context(WriteIoSnafu)?;
        Ok(gif.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EncoderConfig, FrameOptions};

    #[test]
    fn writes_the_finished_stream() {
        let mut encoder = GifEncoder::new();
        encoder.start(EncoderConfig::new(2, 1)).unwrap();
        encoder
            .add_frame(&[1, 2, 3, 4, 5, 6], FrameOptions::default())
            .unwrap();

        let mut out = vec![];
        let written = encoder.finish_to_writer(&mut out).unwrap();
        assert_eq!(written, out.len());
        assert!(out.starts_with(b"GIF89a"));
    }

    #[test]
    fn encode_errors_are_wrapped() {
        let mut out = vec![];
        assert!(matches!(
            GifEncoder::new().finish_to_writer(&mut out),
            Err(WriteError::Encode {
                source: EncodeError::NotStarted
            })
        ));
        assert!(out.is_empty());
    }
}
