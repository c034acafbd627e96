use crate::{
    encode::{
        EncodeError, InvalidDimensionsSnafu, InvalidLoopCountSnafu, InvalidSampleFactorSnafu,
    },
    quant::{MAX_SAMPLE_FACTOR, MIN_SAMPLE_FACTOR},
    utils::millis_to_centis,
};
use alloc::boxed::Box;
use core::{fmt, num::NonZeroU32};
use snafu::ensure;

/// How often the animation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Repeat {
    /// Play once. No looping extension is written.
    #[default]
    Never,
    /// Loop forever (loop count 0 on the wire).
    Infinite,
    /// Loop count as stored in the NETSCAPE2.0 extension.
    Times(u16),
}

impl Repeat {
    /// Interprets the conventional signed loop count: `-1` plays once, `0` loops forever, any
    /// other positive value is written as is.
    pub fn from_loop_count(loop_count: i32) -> Result<Self, EncodeError> {
        match loop_count {
            -1 => Ok(Repeat::Never),
            0 => Ok(Repeat::Infinite),
            1..=0xFFFF => Ok(Repeat::Times(loop_count as u16)),
            _ => InvalidLoopCountSnafu { loop_count }.fail(),
        }
    }

    /// The loop count to write, if the looping extension is needed at all.
    pub fn loop_count(self) -> Option<u16> {
        match self {
            Repeat::Never => None,
            Repeat::Infinite => Some(0),
            Repeat::Times(n) => Some(n),
        }
    }
}

/// Where a frame's color table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PalettePolicy {
    /// Train a new palette for every frame. Every frame after the first carries a local color
    /// table.
    #[default]
    PerFrame,
    /// Train once on the first frame and map every later frame to that palette. Only the global
    /// color table is written.
    Global,
}

/// What a decoder does with a frame before drawing the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DisposalMethod {
    #[default]
    Unspecified = 0,
    Keep = 1,
    Background = 2,
    Previous = 3,
}

/// Progress callback, called after every frame with a fraction in `0.0..=1.0`.
pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// Session-wide settings, passed to [`GifEncoder::start`](crate::GifEncoder::start).
pub struct EncoderConfig {
    pub(crate) width: u16,
    pub(crate) height: u16,
    pub(crate) repeat: Repeat,
    pub(crate) palette_policy: PalettePolicy,
    pub(crate) disposal: DisposalMethod,
    pub(crate) expected_frames: Option<NonZeroU32>,
    pub(crate) frame_defaults: FrameOptions,
    pub(crate) on_progress: Option<ProgressCallback>,
}

impl EncoderConfig {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            repeat: Repeat::default(),
            palette_policy: PalettePolicy::default(),
            disposal: DisposalMethod::default(),
            expected_frames: None,
            frame_defaults: FrameOptions::default(),
            on_progress: None,
        }
    }

    /// Like [`EncoderConfig::new`], for callers holding wider integers.
    pub fn try_new(width: u32, height: u32) -> Result<Self, EncodeError> {
        ensure!(
            (1..=u32::from(u16::MAX)).contains(&width)
                && (1..=u32::from(u16::MAX)).contains(&height),
            InvalidDimensionsSnafu { width, height }
        );
        Ok(Self::new(width as u16, height as u16))
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_palette_policy(mut self, palette_policy: PalettePolicy) -> Self {
        self.palette_policy = palette_policy;
        self
    }

    pub fn with_disposal(mut self, disposal: DisposalMethod) -> Self {
        self.disposal = disposal;
        self
    }

    /// Number of frames the caller intends to add. Progress is reported relative to it.
    pub fn with_expected_frames(mut self, frames: u32) -> Self {
        self.expected_frames = NonZeroU32::new(frames);
        self
    }

    /// Delay in hundredths of a second for frames added without explicit [`FrameOptions`].
    pub fn with_default_delay(mut self, delay: u16) -> Self {
        self.frame_defaults.delay = delay;
        self
    }

    /// Sample factor for frames added without explicit [`FrameOptions`].
    pub fn with_sample_factor(mut self, sample_factor: u8) -> Self {
        self.frame_defaults.sample_factor = sample_factor;
        self
    }

    pub fn with_progress<F>(mut self, on_progress: F) -> Self
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    #[inline]
    pub fn palette_policy(&self) -> PalettePolicy {
        self.palette_policy
    }

    /// The options used by [`GifEncoder::add_default_frame`](crate::GifEncoder::add_default_frame).
    #[inline]
    pub fn frame_options(&self) -> FrameOptions {
        self.frame_defaults
    }

    pub(crate) fn validate(&self) -> Result<(), EncodeError> {
        ensure!(
            self.width > 0 && self.height > 0,
            InvalidDimensionsSnafu {
                width: self.width,
                height: self.height,
            }
        );
        self.frame_defaults.validate()
    }

    pub(crate) fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

impl fmt::Debug for EncoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderConfig")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("repeat", &self.repeat)
            .field("palette_policy", &self.palette_policy)
            .field("disposal", &self.disposal)
            .field("expected_frames", &self.expected_frames)
            .field("frame_defaults", &self.frame_defaults)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Per-frame settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOptions {
    /// Display time in hundredths of a second.
    pub delay: u16,
    /// Quantizer sampling factor, `1..=20`. 1 samples every pixel (best palette, slowest).
    pub sample_factor: u8,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            delay: 0,
            sample_factor: 10,
        }
    }
}

impl FrameOptions {
    pub fn new(delay: u16, sample_factor: u8) -> Self {
        Self {
            delay,
            sample_factor,
        }
    }

    /// Frame options with the delay given in milliseconds, rounded to centiseconds.
    pub fn from_millis(delay_ms: u32, sample_factor: u8) -> Self {
        Self::new(millis_to_centis(delay_ms), sample_factor)
    }

    pub(crate) fn validate(&self) -> Result<(), EncodeError> {
        ensure!(
            (MIN_SAMPLE_FACTOR..=MAX_SAMPLE_FACTOR).contains(&self.sample_factor),
            InvalidSampleFactorSnafu {
                sample_factor: self.sample_factor
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_counts() {
        assert_eq!(Repeat::from_loop_count(-1).unwrap(), Repeat::Never);
        assert_eq!(Repeat::from_loop_count(0).unwrap(), Repeat::Infinite);
        assert_eq!(Repeat::from_loop_count(3).unwrap(), Repeat::Times(3));
        assert!(matches!(
            Repeat::from_loop_count(-2),
            Err(EncodeError::InvalidLoopCount { loop_count: -2 })
        ));
        assert!(Repeat::from_loop_count(70_000).is_err());

        assert_eq!(Repeat::Never.loop_count(), None);
        assert_eq!(Repeat::Infinite.loop_count(), Some(0));
    }

    #[test]
    fn dimensions_must_fit_and_be_non_zero() {
        assert!(EncoderConfig::try_new(320, 240).is_ok());
        assert!(matches!(
            EncoderConfig::try_new(0, 240),
            Err(EncodeError::InvalidDimensions { .. })
        ));
        assert!(EncoderConfig::try_new(70_000, 1).is_err());
        assert!(EncoderConfig::new(3, 0).validate().is_err());
    }

    #[test]
    fn frame_defaults_are_validated() {
        let config = EncoderConfig::new(2, 2)
            .with_default_delay(25)
            .with_sample_factor(1);
        assert_eq!(config.frame_options(), FrameOptions::new(25, 1));
        assert!(config.validate().is_ok());

        assert!(matches!(
            EncoderConfig::new(2, 2).with_sample_factor(30).validate(),
            Err(EncodeError::InvalidSampleFactor { sample_factor: 30 })
        ));
    }

    #[test]
    fn sample_factor_range() {
        assert!(FrameOptions::new(0, 1).validate().is_ok());
        assert!(FrameOptions::new(0, 20).validate().is_ok());
        assert!(matches!(
            FrameOptions::new(0, 0).validate(),
            Err(EncodeError::InvalidSampleFactor { sample_factor: 0 })
        ));
        assert!(FrameOptions::new(0, 21).validate().is_err());
    }

    #[test]
    fn delay_from_millis() {
        assert_eq!(FrameOptions::from_millis(100, 10).delay, 10);
        assert_eq!(FrameOptions::from_millis(33, 10).delay, 3);
    }
}
