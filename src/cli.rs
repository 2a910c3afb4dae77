use crate::formats::OutputFormatRequest;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "img-yasuo",
    about = "Image compression with optional quantization and lossless optimizer backends",
    long_about = "img-yasuo re-encodes JPEG, PNG, BMP and WebP images with format-specific strategies. \
                  It uses libimagequant, jpegtran and oxipng when they are available and falls back \
                  to built-in encoders when they are not.",
    version,
    after_help = "EXAMPLES:\n  \
    img-yasuo compress photo.jpg -Q 80\n  \
    img-yasuo compress logo.png logo_small.png\n  \
    img-yasuo batch ./images -o ./compressed -f webp\n  \
    img-yasuo batch \"./images/*.png\" --json\n  \
    img-yasuo capabilities"
)]
pub struct Args {
    #[arg(
        short = 'v',
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v info, -vv debug)"
    )]
    pub verbose: u8,

    #[arg(short = 'q', long, global = true, help = "Suppress progress and summary output")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Compress a single image file",
        long_about = "Compress a single image file. Without an output path the result is written \
                      next to the input as <name>_compressed.<ext>."
    )]
    Compress {
        #[arg(help = "Input image file path")]
        input: PathBuf,

        #[arg(help = "Output image file path (default: <name>_compressed.<ext>)")]
        output: Option<PathBuf>,

        #[arg(
            short = 'Q',
            long,
            help = "Compression quality (1-100, default: 85)",
            long_help = "Compression quality from 1 (lowest) to 100 (highest). \
                         For PNG it sets the palette size, for JPEG and WebP the encoder quality."
        )]
        quality: Option<u8>,

        #[arg(
            short = 'f',
            long,
            default_value_t = OutputFormatRequest::Original,
            help = "Output format (original, jpeg, png, webp)"
        )]
        format: OutputFormatRequest,
    },

    #[command(
        about = "Compress every image in a directory or glob",
        long_about = "Compress images one after another. A directory is scanned at the top level only; \
                      a glob pattern is expanded as given. Failed files are reported and skipped."
    )]
    Batch {
        #[arg(
            help = "Input directory, file, or glob",
            long_help = "Input can be a directory path, a single file or a glob expression. \
                         Examples: './images', './images/*.png'"
        )]
        input: String,

        #[arg(short = 'o', long, help = "Output directory (default: next to each input)")]
        output: Option<PathBuf>,

        #[arg(short = 'Q', long, help = "Compression quality (1-100, default: 85)")]
        quality: Option<u8>,

        #[arg(
            short = 'f',
            long,
            default_value_t = OutputFormatRequest::Original,
            help = "Output format (original, jpeg, png, webp)"
        )]
        format: OutputFormatRequest,

        #[arg(long, help = "Print results and summary as JSON")]
        json: bool,
    },

    #[command(about = "Show which optional compression backends are available")]
    Capabilities {
        #[arg(long, help = "Print the capability descriptor as JSON")]
        json: bool,
    },
}
