use clap::{Parser, Subcommand};
use pixelmind::codec::EncodedImage;
use pixelmind::header::PayloadHeader;
use pixelmind::{Config, ImageExtractor, Pipeline, SourceFile};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pixelmind", about = "Turn files into lossless images, PDFs and back")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Per-file payload ceiling in bytes (overrides the config file)
    #[arg(long, global = true)]
    max_size: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode files into images and pack them into one PDF, one page each
    Encrypt {
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Extract and decode every image of a PDF into a zip archive
    Decrypt {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List the images embedded in a PDF
    List {
        input: PathBuf,
    },
    /// Encode a single file into a PNG
    EncodePng {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decode a single PNG back into the original file
    DecodePng {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None       => Config::default(),
    };
    if let Some(max) = cli.max_size {
        config.pipeline.max_payload_bytes = max;
    }
    let pipeline = Pipeline::new(&config.pipeline);

    match cli.command {

        // ── Encrypt ──────────────────────────────────────────────────────────
        Commands::Encrypt { output, input } => {
            let mut files = Vec::with_capacity(input.len());
            for path in &input {
                files.push(SourceFile::new(display_name(path), std::fs::read(path)?));
            }
            let report = pipeline.encrypt(&files, &output)?;
            for name in &report.packed {
                println!("  packed   {name}");
            }
            for skip in &report.skipped {
                println!("  skipped  {} — {}", skip.name, skip.reason);
            }
            println!("Created: {} ({} page(s), {} skipped)",
                report.document.display(), report.packed.len(), report.skipped_count());
        }

        // ── Decrypt ──────────────────────────────────────────────────────────
        Commands::Decrypt { input, output } => {
            let report = pipeline.decrypt(&input, &output)?;
            for name in &report.bundled {
                println!("  decoded  {name}");
            }
            for skip in &report.skipped {
                println!("  skipped  {} — {}", skip.name, skip.reason);
            }
            println!("Created: {} ({} file(s), {} skipped)",
                report.archive.display(), report.bundled.len(), report.skipped_count());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input } => {
            let images = ImageExtractor::scan_path(&input)?;
            println!("Document: {}", input.display());
            println!("{:>5} {:>4} {:>11} {:>12} {:>9}  Payload hash",
                     "Page", "Pos", "Size", "Payload", "CRC32");
            for img in &images {
                let size = format!("{}x{}", img.width, img.height);
                let (declared, crc) = header_fields(&img.pixels);
                let hash = pipeline.codec().decode(&img.pixels)
                    .map(|bytes| hex::encode(&blake3::hash(&bytes).as_bytes()[..6]))
                    .unwrap_or_else(|e| format!("— ({e})"));
                println!("{:>5} {:>4} {:>11} {:>12} {:>9}  {}",
                    img.page_index, img.position, size, declared, crc, hash);
            }
        }

        // ── Single-image codec ───────────────────────────────────────────────
        Commands::EncodePng { input, output } => {
            let data = std::fs::read(&input)?;
            let image = pipeline.codec().encode(&data)?;
            std::fs::write(&output, image.to_png()?)?;
            println!("Encoded {} B → {}x{} {}", data.len(), image.width, image.height, output.display());
        }

        Commands::DecodePng { input, output } => {
            let image = EncodedImage::from_png(&std::fs::read(&input)?)?;
            let data = pipeline.codec().decode_image(&image)?;
            std::fs::write(&output, &data)?;
            println!("Decoded {} B → {}", data.len(), output.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn header_fields(pixels: &[u8]) -> (String, String) {
    match PayloadHeader::read(pixels) {
        Ok(h) if h.has_valid_magic() => (h.payload_len.to_string(), format!("{:08x}", h.checksum)),
        _ => ("—".into(), "—".into()),
    }
}
