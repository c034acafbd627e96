use argh::FromArgs;
use image::{DynamicImage, ImageFormat};
use neugif::{utils::millis_to_centis, EncoderConfig, GifEncoder, PalettePolicy, Repeat};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    str::FromStr,
};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Animated GIF encoder.
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Encode(Encode),
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Png,
    Jpg,
    Bmp,
}

impl FromStr for Format {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        #[rustfmt::skip]
        let Some(format) = s.eq_ignore_ascii_case("png").then_some(Format::Png)
               .or_else(|| s.eq_ignore_ascii_case("jpg").then_some(Format::Jpg))
               .or_else(|| s.eq_ignore_ascii_case("bmp").then_some(Format::Bmp))
        else { return Err("invalid string"); };

        Ok(format)
    }
}

impl From<Format> for ImageFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => ImageFormat::Png,
            Format::Jpg => ImageFormat::Jpeg,
            Format::Bmp => ImageFormat::Bmp,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Cli { command } = argh::from_env();

    match command {
        Command::Encode(options) => encode(options),
    }
}

/// Encodes still images as the frames of an animated GIF.
#[derive(FromArgs)]
#[argh(subcommand, name = "encode")]
struct Encode {
    /// delay of every frame in milliseconds
    #[argh(option, default = "100")]
    delay: u32,

    /// -1 plays the animation once, 0 loops forever, n loops n times
    #[argh(option, default = "0")]
    loop_count: i32,

    /// quantizer sample factor, 1 (best colors, slowest) to 20 (fastest)
    #[argh(option, default = "10")]
    quality: u8,

    /// learn one palette from the first frame and use it for every frame
    #[argh(switch)]
    global_palette: bool,

    /// input format, optional (png, jpg, bmp). Guessed from the contents if missing.
    #[argh(option)]
    format: Option<Format>,

    /// log level (error, warn, info, debug, trace)
    #[argh(option, default = "Level::WARN")]
    log_level: Level,

    /// the output file
    #[argh(positional)]
    output: String,
    /// the input images, one per frame, in order
    #[argh(positional)]
    inputs: Vec<String>,
}

fn load(path: &str, format: Option<Format>) -> Result<DynamicImage, Box<dyn std::error::Error>> {
    let image = match format {
        Some(format) => {
            image::io::Reader::with_format(BufReader::new(File::open(path)?), format.into())
                .decode()?
        }
        None => image::io::Reader::open(path)?
            .with_guessed_format()?
            .decode()?,
    };
    Ok(image)
}

fn encode(options: Encode) -> Result<(), Box<dyn std::error::Error>> {
    let Encode {
        delay,
        loop_count,
        quality,
        global_palette,
        format,
        log_level,
        output,
        inputs,
    } = options;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(first) = inputs.first() else {
        return Err("at least one input image is needed".into());
    };
    let first = load(first, format)?;
    let (width, height) = (first.width(), first.height());

    println!("Encoding {} frames of {width}x{height}", inputs.len());

    let config = EncoderConfig::try_new(width, height)?
        .with_repeat(Repeat::from_loop_count(loop_count)?)
        .with_palette_policy(if global_palette {
            PalettePolicy::Global
        } else {
            PalettePolicy::PerFrame
        })
        .with_default_delay(millis_to_centis(delay))
        .with_sample_factor(quality)
        .with_expected_frames(inputs.len() as u32);

    let mut encoder = GifEncoder::new();
    encoder.start(config)?;

    let mut next = Some(first);
    for (i, input) in inputs.iter().enumerate() {
        let image = match next.take() {
            Some(image) => image,
            None => load(input, format)?,
        };
        if (image.width(), image.height()) != (width, height) {
            encoder.abort();
            return Err(format!(
                "`{input}` is {}x{}, but the animation is {width}x{height}",
                image.width(),
                image.height()
            )
            .into());
        }

        debug!(input = %input, "loaded frame");
        let progress = encoder.add_default_frame(image.into_rgb8().as_raw())?;
        info!(frame = i + 1, progress, "frame added");
    }

    let written = encoder.finish_to_writer(BufWriter::new(File::create(&output)?))?;
    println!("Written {written} bytes to `{output}`");

    Ok(())
}
