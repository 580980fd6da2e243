use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pdf_slim::{export_images, parse_document, read_file, CompressOptions, PdfSlim};

#[derive(Parser, Debug)]
#[command(name = "pdf-slim")]
#[command(author, version, about = "Shrink PDF files by re-encoding their embedded images")]
struct Args {
    /// Input PDF file path
    #[arg(required = true)]
    input: PathBuf,

    /// Output PDF file path (defaults to <input>-slim.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rewrite the file without touching image streams
    #[arg(long)]
    no_compress: bool,

    /// JPEG quality for re-encoded images
    #[arg(short, long, default_value_t = pdf_slim::images::DEFAULT_QUALITY,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Also process CCITT fax images through the TIFF path
    #[arg(long)]
    fax_images: bool,

    /// Write image stream bodies into this directory instead of rewriting the PDF
    #[arg(long, value_name = "DIR")]
    export_images: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self
                .input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            self.input.with_file_name(format!("{}-slim.pdf", stem))
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .parse_default_env()
        .init();

    if let Some(dir) = &args.export_images {
        let data = read_file(&args.input)
            .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;
        let document = parse_document(&data).with_context(|| "Failed to parse PDF")?;
        let written = export_images(&document, dir, args.fax_images)
            .with_context(|| format!("Failed to export images to {}", dir.display()))?;
        println!("Exported {} images to {}", written.len(), dir.display());
        return Ok(());
    }

    let options = CompressOptions {
        quality: args.quality,
        fax_images: args.fax_images,
    };
    let slim = PdfSlim::with_options(options)
        .with_context(|| "Invalid compression options")?
        .compress(!args.no_compress);

    let output_path = args.output_path();
    let report = slim
        .process_file(&args.input, &output_path)
        .with_context(|| format!("Failed to process {}", args.input.display()))?;

    log::info!(
        "{} of {} images recompressed",
        report.images_replaced,
        report.images_seen
    );
    println!(
        "Wrote {} ({} bytes saved)",
        output_path.display(),
        report.bytes_saved
    );
    Ok(())
}
