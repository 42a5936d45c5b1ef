//! # bleprint CLI
//!
//! Command-line interface for thermal printing over Bluetooth.
//!
//! ## Usage
//!
//! ```bash
//! # Print a line of text
//! bleprint --device /dev/rfcomm0 text "Hello"
//!
//! # Print an image scaled to the paper width
//! bleprint --paper 80mm image logo.png
//!
//! # Barcodes and QR codes
//! bleprint barcode --format EAN13 5901234123457
//! bleprint qr "https://example.com"
//!
//! # Check content without printing (JSON report)
//! bleprint validate --format UPCA 03600029145
//!
//! # Show the bytes and chunking without a printer
//! bleprint --dry-run text "Hi"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bleprint::{
    BleprintError, Settings,
    error::EncodeError,
    printer::{PaperWidth, PrinterConfig},
    protocol::{
        PrintBuilder,
        barcode::{LinearOptions, QrErrorLevel, QrOptions},
        text::{Alignment, TextEncoding},
        validate::{BarcodeFormat, validate},
    },
    queue::{JobOptions, JobSnapshot, JobStatus, LinkExecutor, PrintQueue},
    transport::{AdaptiveWriter, Link, MemoryLink, RfcommLink, WriteReport, rfcomm},
};

/// bleprint - ESC/POS thermal printing over Bluetooth
#[derive(Parser, Debug)]
#[command(name = "bleprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Printer device path or MAC address
    #[arg(long, global = true)]
    device: Option<String>,

    /// Settings file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Text encoding (ascii, cp437, gbk, utf-8)
    #[arg(long, global = true)]
    encoding: Option<TextEncoding>,

    /// Paper width (58mm, 80mm)
    #[arg(long, global = true)]
    paper: Option<PaperWidth>,

    /// Encode and chunk through an in-memory link instead of a printer
    #[arg(long, global = true)]
    dry_run: bool,

    /// Job priority; higher prints first
    #[arg(long, global = true, default_value_t = 0, allow_hyphen_values = true)]
    priority: i32,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print text
    Text {
        text: String,

        #[arg(long, value_enum, default_value_t = AlignArg::Left)]
        align: AlignArg,

        #[arg(long)]
        bold: bool,

        /// Lines to feed before cutting
        #[arg(long, default_value_t = 3)]
        feed: u32,

        #[arg(long)]
        no_cut: bool,
    },

    /// Print an image (PNG, JPEG, ...)
    Image {
        path: PathBuf,

        #[arg(long, default_value_t = 3)]
        feed: u32,

        #[arg(long)]
        no_cut: bool,
    },

    /// Print a 1-D barcode
    Barcode {
        #[arg(long, default_value = "CODE128")]
        format: BarcodeFormat,

        content: String,

        /// Bar height in dots
        #[arg(long, default_value_t = 80)]
        height: u16,

        /// Module width in dots (2-6)
        #[arg(long, default_value_t = 3)]
        module_width: u8,
    },

    /// Print a QR code
    Qr {
        content: String,

        /// Module size in dots (1-16)
        #[arg(long, default_value_t = 6)]
        size: u8,

        #[arg(long, value_enum, default_value_t = EccArg::M)]
        error_correction: EccArg,
    },

    /// Validate barcode or QR content and print the report as JSON
    Validate {
        #[arg(long)]
        format: BarcodeFormat,

        content: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlignArg {
    Left,
    Center,
    Right,
}

impl From<AlignArg> for Alignment {
    fn from(arg: AlignArg) -> Self {
        match arg {
            AlignArg::Left => Alignment::Left,
            AlignArg::Center => Alignment::Center,
            AlignArg::Right => Alignment::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EccArg {
    L,
    M,
    Q,
    H,
}

impl From<EccArg> for QrErrorLevel {
    fn from(arg: EccArg) -> Self {
        match arg {
            EccArg::L => QrErrorLevel::L,
            EccArg::M => QrErrorLevel::M,
            EccArg::Q => QrErrorLevel::Q,
            EccArg::H => QrErrorLevel::H,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), BleprintError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(device) = &cli.device {
        settings.device = Some(device.clone());
    }
    if let Some(encoding) = cli.encoding {
        settings.printer.encoding = encoding;
    }
    if let Some(paper) = cli.paper {
        settings.printer.paper = paper;
    }

    let encoding = settings.printer.encoding;
    let builder = PrintBuilder::new(encoding).init();

    let payload = match cli.command {
        Commands::Validate { format, content } => {
            let report = validate(format, &content);
            println!("{}", serde_json::to_string_pretty(&report)?);
            return report
                .into_result()
                .map_err(|report| EncodeError::Invalid(report).into());
        }
        Commands::Text {
            text,
            align,
            bold,
            feed,
            no_cut,
        } => {
            let builder = builder.align(align.into()).bold(bold).line(&text)?.bold(false);
            finish(builder, feed, no_cut)
        }
        Commands::Image { path, feed, no_cut } => {
            let (pixels, width, height) = load_image(&path, settings.printer.paper.config())?;
            let builder = builder.image(&pixels, width, height)?;
            finish(builder, feed, no_cut)
        }
        Commands::Barcode {
            format,
            content,
            height,
            module_width,
        } => {
            let options = LinearOptions {
                height,
                module_width,
                ..LinearOptions::new(format)
            };
            let builder = builder.align(Alignment::Center).barcode(&content, &options)?;
            finish(builder, 3, false)
        }
        Commands::Qr {
            content,
            size,
            error_correction,
        } => {
            let options = QrOptions {
                size,
                error_correction: error_correction.into(),
                ..QrOptions::default()
            };
            let builder = builder.align(Alignment::Center).qr(&content, &options)?;
            finish(builder, 3, false)
        }
    };

    info!(bytes = payload.len(), encoding = %encoding, "payload encoded");

    if cli.dry_run {
        let link = Arc::new(MemoryLink::new());
        let (job, report) = submit(Arc::clone(&link), "memory", &settings, payload, cli.priority).await?;
        print!("{}", hex_dump(&link.written()));
        print_report(&job, report.as_ref());
        return Ok(());
    }

    let device = settings
        .device
        .clone()
        .unwrap_or_else(|| rfcomm::DEFAULT_DEVICE.to_string());
    let (job, report) = submit(Arc::new(RfcommLink::new()), &device, &settings, payload, cli.priority).await?;
    print_report(&job, report.as_ref());
    println!("Printed successfully!");
    Ok(())
}

fn finish(builder: PrintBuilder, feed: u32, no_cut: bool) -> Vec<u8> {
    let builder = builder.feed(feed);
    if no_cut { builder.build() } else { builder.cut().build() }
}

/// Load an image as RGBA, scaled down to the printable width.
fn load_image(path: &PathBuf, printer: PrinterConfig) -> Result<(Vec<u8>, usize, usize), BleprintError> {
    let img = image::open(path)
        .map_err(|e| BleprintError::Image(format!("Failed to open {}: {}", path.display(), e)))?
        .to_rgba8();
    let (width, height) = printer.fit_width(img.width(), img.height());
    let img = if (width, height) == img.dimensions() {
        img
    } else {
        debug!(from = ?img.dimensions(), to = ?(width, height), "scaling image");
        image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle)
    };
    Ok((img.into_raw(), width as usize, height as usize))
}

/// Run one payload through a queue and wait for its outcome.
async fn submit<L: Link + 'static>(
    link: Arc<L>,
    device: &str,
    settings: &Settings,
    payload: Vec<u8>,
    priority: i32,
) -> Result<(JobSnapshot, Option<WriteReport>), BleprintError> {
    let writer = AdaptiveWriter::new(settings.transport).with_limits(settings.limits);
    let executor = Arc::new(LinkExecutor::new(link, device, writer));
    let queue = PrintQueue::with_shared_executor(settings.queue, executor.clone());
    queue.subscribe(|event| {
        if let Ok(json) = serde_json::to_string(event) {
            debug!(event = event.name(), %json, "queue event");
        }
    });

    let id = queue.add(payload, JobOptions::priority(priority).with_target(device))?;
    queue.process();
    queue.wait_idle().await;
    executor.close().await?;

    let job = queue
        .get(id)
        .ok_or_else(|| BleprintError::JobFailed {
            id: id.to_string(),
            reason: "job vanished from the queue".to_string(),
        })?;
    if job.status != JobStatus::Completed {
        return Err(BleprintError::JobFailed {
            id: id.to_string(),
            reason: job.last_error.clone().unwrap_or_else(|| job.status.to_string()),
        });
    }
    Ok((job, executor.last_report()))
}

fn print_report(job: &JobSnapshot, report: Option<&WriteReport>) {
    println!("Job {} {} after {} attempt(s)", job.id, job.status, job.attempts);
    if let Some(r) = report {
        println!(
            "{} bytes in {} chunks ({} retries), chunk size {}..{}, final delay {:.1} ms",
            r.bytes_written, r.chunks, r.retries, r.min_chunk_size, r.max_chunk_size, r.final_delay_ms
        );
    }
}

fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, row) in data.chunks(16).enumerate() {
        let hex: Vec<String> = row.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = row
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!("{:08x}  {:<47}  |{}|\n", i * 16, hex.join(" "), ascii));
    }
    out
}
