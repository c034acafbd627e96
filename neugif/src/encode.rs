use crate::{
    config::{EncoderConfig, FrameOptions, PalettePolicy},
    lzw::LzwEncoder,
    quant::{ColorQuantizer, ColorTable},
    writer::GifWriter,
};
use alloc::{boxed::Box, vec::Vec};
use core::mem;
use itertools::Itertools;
use snafu::{ensure, Snafu};
use tracing::debug;

#[cfg(feature = "std")]
mod std_api;
#[cfg(feature = "std")]
pub use std_api::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EncodeError {
    #[snafu(display("the encoder has not been started"))]
    NotStarted,
    #[snafu(display("the encoder is already started, finish or abort the running session first"))]
    AlreadyStarted,
    #[snafu(display("the encoding session was aborted"))]
    Aborted,
    #[snafu(display("a GIF needs at least one frame"))]
    NoFrames,
    #[snafu(display(
        "Frame doesn't match the session dimensions: {width} * {height} needs {expected} bytes, but {actual} bytes were given"
    ))]
    FrameSizeMismatch {
        width: u16,
        height: u16,
        expected: usize,
        actual: usize,
    },
    #[snafu(display(
        "Invalid image dimensions {width}x{height}: both must be between 1 and 65535"
    ))]
    InvalidDimensions { width: u32, height: u32 },
    #[snafu(display("Sample factor must be between 1 and 20, was {sample_factor}"))]
    InvalidSampleFactor { sample_factor: u8 },
    #[snafu(display(
        "Loop count must be -1 (play once), 0 (loop forever) or at most 65535, was {loop_count}"
    ))]
    InvalidLoopCount { loop_count: i32 },
}

/// Where the encoder is in its `Idle -> Started -> Finished` lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    Idle,
    Started,
    Finished,
    /// Terminal: the session was abandoned and every further call fails.
    Aborted,
}

enum State {
    Idle,
    Started(Box<Session>),
    Finished,
    Aborted,
}

/// Everything one encoding session owns.
struct Session {
    config: EncoderConfig,
    writer: GifWriter,
    // Set on the first frame with the global palette policy.
    global: Option<ColorQuantizer>,
    frames: u32,
}

impl Session {
    fn new(config: EncoderConfig) -> Self {
        // Header blocks, a worst case global table and roughly one frame of indices.
        let capacity = 6 + 7 + 768 + 19 + config.pixel_count();
        let mut writer = GifWriter::with_capacity(capacity);
        writer.write_signature();

        Self {
            config,
            writer,
            global: None,
            frames: 0,
        }
    }

    fn encode_frame(
        &mut self,
        pixels: &[u8],
        options: FrameOptions,
        lzw: &mut LzwEncoder,
        indices: &mut Vec<u8>,
    ) {
        indices.clear();

        let (table, palette_len) = match &self.global {
            Some(quantizer) => {
                quantizer.index_pixels(pixels, indices);
                (None, quantizer.color_table().len())
            }
            None => {
                let quantizer = ColorQuantizer::train(pixels, options.sample_factor);
                quantizer.index_pixels(pixels, indices);

                let table = match self.config.palette_policy {
                    PalettePolicy::Global => {
                        let table = quantizer.color_table().clone();
                        self.global = Some(quantizer);
                        table
                    }
                    PalettePolicy::PerFrame => {
                        let mut table = quantizer.into_color_table();
                        table.retain_used(indices);
                        table
                    }
                };
                let len = table.len();
                (Some(table), len)
            }
        };

        let first = self.frames == 0;
        if let (true, Some(global)) = (first, &table) {
            self.write_preamble(global);
        }

        let (width, height) = (self.config.width, self.config.height);
        let start = self.writer.len();

        self.writer
            .write_graphic_control(self.config.disposal, options.delay);

        let local: Option<ColorTable> = table.filter(|_| !first);
        self.writer
            .write_image_descriptor(width, height, local.as_ref());
        if let Some(local) = &local {
            self.writer.write_color_table(local);
        }
        self.writer.write_image_data(lzw, indices, palette_len);

        self.frames += 1;

        debug!(
            frame = self.frames,
            colors = palette_len,
            local_table = local.is_some(),
            bytes = self.writer.len() - start,
            "frame encoded"
        );
    }

    /// Screen descriptor, global color table and looping extension.
    fn write_preamble(&mut self, global: &ColorTable) {
        self.writer
            .write_screen_descriptor(self.config.width, self.config.height, global);
        self.writer.write_color_table(global);
        if let Some(loop_count) = self.config.repeat.loop_count() {
            self.writer.write_loop_extension(loop_count);
        }
    }

    fn progress(&self) -> f32 {
        match self.config.expected_frames {
            Some(expected) => (self.frames as f32 / expected.get() as f32).min(1.0),
            None => 1.0,
        }
    }
}

fn started(state: &mut State) -> Result<&mut Session, EncodeError> {
    match state {
        State::Started(session) => Ok(session),
        State::Aborted => AbortedSnafu.fail(),
        State::Idle | State::Finished => NotStartedSnafu.fail(),
    }
}

/// Animated GIF encoder.
///
/// Frames are added one at a time and each one is fully quantized and compressed before
/// [`GifEncoder::add_frame`] returns, so callers may yield to an event loop between frames.
/// The encoder is not meant to be shared: wrap it in a lock for the whole session if it has to
/// cross threads.
pub struct GifEncoder {
    state: State,
    lzw: LzwEncoder,
    // Scratch buffers reused between frames.
    indices: Vec<u8>,
    rgb: Vec<u8>,
}

impl Default for GifEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GifEncoder {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            lzw: LzwEncoder::new(),
            indices: Vec::new(),
            rgb: Vec::new(),
        }
    }

    pub fn state(&self) -> EncoderState {
        match self.state {
            State::Idle => EncoderState::Idle,
            State::Started(_) => EncoderState::Started,
            State::Finished => EncoderState::Finished,
            State::Aborted => EncoderState::Aborted,
        }
    }

    /// Frames added to the running session. 0 when no session is running.
    pub fn frames_written(&self) -> u32 {
        match &self.state {
            State::Started(session) => session.frames,
            _ => 0,
        }
    }

    /// Starts a new session. Valid when idle or after a finished session.
    pub fn start(&mut self, config: EncoderConfig) -> Result<(), EncodeError> {
        match self.state {
            State::Started(_) => return AlreadyStartedSnafu.fail(),
            State::Aborted => return AbortedSnafu.fail(),
            State::Idle | State::Finished => {}
        }
        config.validate()?;

        debug!(
            width = config.width,
            height = config.height,
            repeat = ?config.repeat,
            palette_policy = ?config.palette_policy,
            "session started"
        );

        self.indices.clear();
        self.state = State::Started(Box::new(Session::new(config)));
        Ok(())
    }

    /// Quantizes, compresses and appends one RGB frame (`width * height * 3` bytes).
    ///
    /// Returns the session progress in `0.0..=1.0`, which is also passed to the configured
    /// progress callback. On error nothing is written and the session stays usable.
    pub fn add_frame(&mut self, pixels: &[u8], options: FrameOptions) -> Result<f32, EncodeError> {
        let session = started(&mut self.state)?;

        let expected = session.config.pixel_count() * 3;
        ensure!(
            pixels.len() == expected,
            FrameSizeMismatchSnafu {
                width: session.config.width,
                height: session.config.height,
                expected,
                actual: pixels.len(),
            }
        );
        options.validate()?;

        session.encode_frame(pixels, options, &mut self.lzw, &mut self.indices);

        let progress = session.progress();
        if let Some(on_progress) = &mut session.config.on_progress {
            on_progress(progress);
        }
        Ok(progress)
    }

    /// Adds an RGB frame with the session's default [`FrameOptions`], see
    /// [`EncoderConfig::with_default_delay`] and [`EncoderConfig::with_sample_factor`].
    pub fn add_default_frame(&mut self, pixels: &[u8]) -> Result<f32, EncodeError> {
        let options = started(&mut self.state)?.config.frame_options();
        self.add_frame(pixels, options)
    }

    /// Like [`GifEncoder::add_frame`] for RGBA frames (`width * height * 4` bytes). Alpha is
    /// ignored.
    pub fn add_frame_rgba(
        &mut self,
        pixels: &[u8],
        options: FrameOptions,
    ) -> Result<f32, EncodeError> {
        let session = started(&mut self.state)?;

        let expected = session.config.pixel_count() * 4;
        ensure!(
            pixels.len() == expected,
            FrameSizeMismatchSnafu {
                width: session.config.width,
                height: session.config.height,
                expected,
                actual: pixels.len(),
            }
        );

        let mut rgb = mem::take(&mut self.rgb);
        rgb.clear();
        rgb.reserve(pixels.len() / 4 * 3);
        for (r, g, b, _) in pixels.iter().copied().tuples() {
            rgb.extend_from_slice(&[r, g, b]);
        }

        let result = self.add_frame(&rgb, options);
        self.rgb = rgb;
        result
    }

    /// Ends the session: appends the trailer and hands out the finished stream.
    ///
    /// On error the encoder keeps its previous state.
    pub fn finish(&mut self) -> Result<Vec<u8>, EncodeError> {
        match mem::replace(&mut self.state, State::Finished) {
            State::Started(session) if session.frames > 0 => {
                let Session {
                    mut writer, frames, ..
                } = *session;
                writer.write_trailer();

                debug!(frames, bytes = writer.len(), "session finished");
                Ok(writer.into_bytes())
            }
            previous => {
                let error = match previous {
                    State::Started(_) => EncodeError::NoFrames,
                    State::Aborted => EncodeError::Aborted,
                    State::Idle | State::Finished => EncodeError::NotStarted,
                };
                self.state = previous;
                Err(error)
            }
        }
    }

    /// Abandons the session and releases its buffers. The encoder can't be used afterwards.
    pub fn abort(&mut self) {
        if matches!(self.state, State::Started(_)) {
            debug!("session aborted");
        }
        self.state = State::Aborted;
        self.indices = Vec::new();
        self.rgb = Vec::new();
    }
}

/// Encodes a whole animation in one go, reporting progress after every frame.
pub fn encode_frames<'a, I, F>(
    config: EncoderConfig,
    frames: I,
    mut on_progress: F,
) -> Result<Vec<u8>, EncodeError>
where
    I: IntoIterator<Item = (&'a [u8], FrameOptions)>,
    I::IntoIter: ExactSizeIterator,
    F: FnMut(f32),
{
    let frames = frames.into_iter();
    let config = config.with_expected_frames(frames.len() as u32);

    let mut encoder = GifEncoder::new();
    encoder.start(config)?;
    for (pixels, options) in frames {
        on_progress(encoder.add_frame(pixels, options)?);
    }
    encoder.finish()
}
