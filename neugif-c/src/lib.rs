use core::{ptr, slice};
use neugif::{utils::millis_to_centis, EncoderConfig, GifEncoder, PalettePolicy, Repeat};

/// Opaque encoder handle.
pub struct NeugifEncoder {
    inner: GifEncoder,
}

/// Creates a new, idle encoder. Free it with `neugif_encoder_free`.
#[no_mangle]
pub extern "C" fn neugif_encoder_new() -> *mut NeugifEncoder {
    Box::into_raw(Box::new(NeugifEncoder {
        inner: GifEncoder::new(),
    }))
}

/// Frees an encoder, including any unfinished session. Null is ignored.
///
/// # Safety
///
/// `encoder` must be null or come from `neugif_encoder_new`, and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn neugif_encoder_free(encoder: *mut NeugifEncoder) {
    if !encoder.is_null() {
        drop(unsafe { Box::from_raw(encoder) });
    }
}

/// Starts a session.
///
/// - `width`, `height`: canvas size, both at least 1
/// - `loop_count`: -1 plays once, 0 loops forever, n loops n times
/// - `delay_ms`: delay of every frame, in milliseconds
/// - `sample_factor`: quantizer sampling, 1 (best) to 20 (fastest)
/// - `global_palette`: non-zero to learn the palette once, from the first frame
/// - `expected_frames`: frame count used for progress reporting, 0 if unknown
///
/// Returns 0 on success, or -1 if the encoder is already running, was aborted, or a parameter is
/// out of range.
///
/// # Safety
///
/// `encoder` must come from `neugif_encoder_new`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn neugif_start(
    encoder: *mut NeugifEncoder,
    width: u16,
    height: u16,
    loop_count: i32,
    delay_ms: u32,
    sample_factor: u8,
    global_palette: u8,
    expected_frames: u32,
) -> i32 {
    let encoder = unsafe { &mut (*encoder).inner };

    let Ok(repeat) = Repeat::from_loop_count(loop_count) else {
        return -1;
    };
    let config = EncoderConfig::new(width, height)
        .with_repeat(repeat)
        .with_palette_policy(if global_palette != 0 {
            PalettePolicy::Global
        } else {
            PalettePolicy::PerFrame
        })
        .with_default_delay(millis_to_centis(delay_ms))
        .with_sample_factor(sample_factor)
        .with_expected_frames(expected_frames);

    match encoder.start(config) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Adds an RGB frame of `width * height * 3` bytes, using the delay and sample factor given to
/// `neugif_start`.
///
/// Returns the progress in `0.0..=1.0`, or -1.0 if no session is running or the buffer has the
/// wrong size. A failed call leaves the session untouched.
///
/// # Safety
///
/// `encoder` must come from `neugif_encoder_new`, and `pixels` must point to `pixels_len`
/// readable bytes.
#[no_mangle]
pub unsafe extern "C" fn neugif_add_frame(
    encoder: *mut NeugifEncoder,
    pixels: *const u8,
    pixels_len: usize,
) -> f32 {
    let encoder = unsafe { &mut (*encoder).inner };
    let pixels = unsafe { slice::from_raw_parts(pixels, pixels_len) };

    encoder.add_default_frame(pixels).unwrap_or(-1.0)
}

/// Finishes the session and hands out the GIF stream.
///
/// The length of the stream is written to `out_len`. Release the stream with
/// `neugif_buffer_free`. Returns null, and leaves `out_len` untouched, if no session is running
/// or it has no frames yet.
///
/// # Safety
///
/// `encoder` must come from `neugif_encoder_new`, and `out_len` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn neugif_finish(encoder: *mut NeugifEncoder, out_len: *mut usize) -> *mut u8 {
    let encoder = unsafe { &mut (*encoder).inner };

    match encoder.finish() {
        Ok(gif) => {
            let gif = gif.into_boxed_slice();
            unsafe { *out_len = gif.len() };
            Box::into_raw(gif).cast::<u8>()
        }
        Err(_) => ptr::null_mut(),
    }
}

/// Frees a stream returned by `neugif_finish`. Null is ignored.
///
/// # Safety
///
/// `buffer` and `len` must be exactly what `neugif_finish` returned.
#[no_mangle]
pub unsafe extern "C" fn neugif_buffer_free(buffer: *mut u8, len: usize) {
    if !buffer.is_null() {
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(buffer, len)) });
    }
}

/// Abandons the running session and releases its memory. Every later call on this encoder
/// fails; free it with `neugif_encoder_free`.
///
/// # Safety
///
/// `encoder` must come from `neugif_encoder_new`.
#[no_mangle]
pub unsafe extern "C" fn neugif_abort(encoder: *mut NeugifEncoder) {
    let encoder = unsafe { &mut (*encoder).inner };
    encoder.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_session() {
        unsafe {
            let encoder = neugif_encoder_new();
            assert_eq!(neugif_start(encoder, 2, 2, 0, 100, 10, 0, 2), 0);
            assert_eq!(neugif_start(encoder, 2, 2, 0, 100, 10, 0, 2), -1);

            let red = [255u8, 0, 0].repeat(4);
            let blue = [0u8, 0, 255].repeat(4);
            assert_eq!(neugif_add_frame(encoder, red.as_ptr(), red.len()), 0.5);
            assert_eq!(neugif_add_frame(encoder, blue.as_ptr(), 3), -1.0);
            assert_eq!(neugif_add_frame(encoder, blue.as_ptr(), blue.len()), 1.0);

            let mut len = 0;
            let gif = neugif_finish(encoder, &mut len);
            assert!(!gif.is_null());
            let bytes = slice::from_raw_parts(gif, len);
            assert!(bytes.starts_with(b"GIF89a"));
            assert_eq!(bytes.last(), Some(&0x3B));

            neugif_buffer_free(gif, len);
            neugif_encoder_free(encoder);
        }
    }

    #[test]
    fn errors_map_to_sentinels() {
        unsafe {
            let encoder = neugif_encoder_new();
            assert_eq!(neugif_start(encoder, 0, 2, 0, 100, 10, 0, 0), -1);
            assert_eq!(neugif_start(encoder, 2, 2, -2, 100, 10, 0, 0), -1);
            assert_eq!(neugif_start(encoder, 2, 2, 0, 100, 0, 0, 0), -1);

            let mut len = 7;
            assert!(neugif_finish(encoder, &mut len).is_null());
            assert_eq!(len, 7);

            assert_eq!(neugif_start(encoder, 1, 1, -1, 0, 10, 1, 0), 0);
            neugif_abort(encoder);
            let pixel = [1u8, 2, 3];
            assert_eq!(neugif_add_frame(encoder, pixel.as_ptr(), 3), -1.0);
            assert_eq!(neugif_start(encoder, 1, 1, -1, 0, 10, 1, 0), -1);

            neugif_encoder_free(encoder);
            neugif_encoder_free(ptr::null_mut());
        }
    }
}
