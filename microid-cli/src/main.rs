use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use microid::codec::{self, Decoded, Grid, Serial};
use microid::enhance::EnhanceConfig;
use microid::extract::{ExtractConfig, Rotation};
use microid::image::{ImageRgb8, ImageU8, Rgb};
use microid::layout::PARITY;
use microid::locate::{LocateStages, LocatorConfig};
use microid::module_spec::ModuleTable;
use microid::pipeline::{DecodePipeline, DecodeReport, DecodeStatus, PipelineConfig};
use microid::reader::{FixedReader, GridReader, ThresholdReader};
use microid::render::{draw_outline, render, RenderOptions};

mod write_png;

/// Micro-ID codec and photo decoder
#[derive(Parser)]
#[command(name = "microid", version)]
struct Cli {
    /// Log pipeline stages to stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the grid for a serial number
    Encode {
        serial: u64,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Decode 25 characters of grid text (non-binary characters are ignored)
    DecodeGrid {
        text: String,
        /// Serial the grid should carry
        #[arg(long)]
        expected: Option<u64>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Render a serial as a PNG picture
    Render {
        serial: u64,
        /// Output file path
        #[arg(short, long, default_value = "microid.png")]
        output: PathBuf,
        /// Pixels per cell
        #[arg(long, default_value = "100")]
        cell_size: u32,
        /// Dot colour as #RRGGBB
        #[arg(long, default_value = "#CD7F32")]
        dot_color: Rgb,
        /// Background colour as #RRGGBB
        #[arg(long, default_value = "#FFFFFF")]
        background: Rgb,
        /// Leave out the faint cell gridlines
        #[arg(long)]
        no_gridlines: bool,
    },
    /// Decode Micro-IDs from module photos (PNG or JPEG)
    Decode(DecodeArgs),
    /// List the calibration table
    Modules {
        /// Extra calibration table (TOML with [[module]] entries)
        #[arg(long)]
        modules: Option<PathBuf>,
    },
}

#[derive(Args)]
struct DecodeArgs {
    /// Photos, or directories whose *.png, *.jpg and *.jpeg files are decoded
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Module type to look up in the calibration table
    #[arg(short, long, default_value = "SZ-04")]
    module: String,
    /// Extra calibration table (TOML with [[module]] entries)
    #[arg(long)]
    modules: Option<PathBuf>,
    /// Skip contrast enhancement and keep colour
    #[arg(long)]
    raw: bool,
    /// Write every normalised crop as PNG into this directory
    #[arg(long)]
    save_crops: Option<PathBuf>,
    /// Write the locator's intermediate maps and the detected outline as PNG into this directory
    #[arg(long)]
    save_stages: Option<PathBuf>,
    /// Grid text for a rotation instead of the threshold reader, e.g. 90=1000...
    #[arg(long = "grid", value_name = "ROT=TEXT")]
    grids: Vec<String>,
    /// Serial the photo should carry
    #[arg(long)]
    expected: Option<u64>,
    /// Decimate photos whose longer side exceeds this
    #[arg(long, default_value = "1200")]
    max_dimension: u32,
    /// Border around the footprint, as a fraction of its size
    #[arg(long, default_value = "0.3")]
    margin: f64,
    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

impl DecodeArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            locator: LocatorConfig {
                max_dimension: self.max_dimension,
                ..LocatorConfig::default()
            },
            extract: ExtractConfig {
                margin: self.margin,
                ..ExtractConfig::default()
            },
            enhance: EnhanceConfig {
                raw: self.raw,
                ..EnhanceConfig::default()
            },
        }
    }
}

#[derive(Serialize)]
struct GridOutput {
    serial: String,
    value: u32,
    binary: String,
    grid: String,
    anchors_valid: bool,
    parity_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_match: Option<bool>,
}

impl GridOutput {
    fn new(d: &Decoded, expected: Option<Serial>) -> Self {
        GridOutput {
            serial: d.serial.to_string(),
            value: d.serial.value(),
            binary: d.binary(),
            grid: d.grid.to_string(),
            anchors_valid: d.anchors_valid,
            parity_valid: d.parity_valid,
            expected_match: expected.map(|e| d.is_valid() && d.serial == e),
        }
    }
}

/// Serials the same dots carry when read a quarter turn off.
#[derive(Serialize)]
struct TurnedOutput {
    rotation: u16,
    serial: String,
}

#[derive(Serialize)]
struct DecodeGridOutput {
    #[serde(flatten)]
    grid: GridOutput,
    turned: Vec<TurnedOutput>,
}

#[derive(Serialize)]
struct PhotoOutput {
    file: String,
    module_type: String,
    image_width: u32,
    image_height: u32,
    module: Option<ModuleOutput>,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_match: Option<bool>,
    candidates: Vec<CandidateOutput>,
    unreadable: Vec<UnreadableOutput>,
}

#[derive(Serialize)]
struct ModuleOutput {
    center: [f64; 2],
    corners: [[f64; 2]; 4],
    angle_deg: f64,
    longest_side_px: f64,
    score: f64,
}

#[derive(Serialize)]
struct CandidateOutput {
    rotation: u16,
    center: [f64; 2],
    scale_px_per_mm: f64,
    #[serde(flatten)]
    grid: GridOutput,
}

#[derive(Serialize)]
struct UnreadableOutput {
    rotation: u16,
    reason: String,
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_table(extra: Option<&Path>) -> Result<ModuleTable> {
    let mut table = ModuleTable::builtin();
    if let Some(path) = extra {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading module table {}", path.display()))?;
        let more = ModuleTable::from_toml(&text)
            .with_context(|| format!("loading module table {}", path.display()))?;
        table.extend(more)?;
    }
    Ok(table)
}

fn load_image(path: &Path) -> Result<ImageRgb8> {
    let img = image::open(path)
        .with_context(|| format!("failed to open image: {}", path.display()))?
        .into_rgb8();
    let (width, height) = (img.width(), img.height());
    Ok(ImageRgb8::from_raw(width, height, img.into_raw()))
}

fn expected_serial(expected: Option<u64>) -> Result<Option<Serial>> {
    expected
        .map(|v| Serial::new(v).context("--expected is out of range"))
        .transpose()
}

/// Parse `ROT=TEXT` answers into a reader.
fn fixed_reader(grids: &[String]) -> Result<FixedReader> {
    let mut reader = FixedReader::new();
    for answer in grids {
        let (rot, text) = answer
            .split_once('=')
            .with_context(|| format!("--grid expects ROT=TEXT, got '{answer}'"))?;
        let degrees: u16 = rot
            .trim()
            .parse()
            .with_context(|| format!("bad rotation '{rot}'"))?;
        let Some(rotation) = Rotation::from_degrees(degrees) else {
            bail!("rotation must be 0, 90, 180 or 270, got {degrees}");
        };
        reader = reader.with(rotation, text.trim());
    }
    let given: Vec<u16> = reader.rotations().map(|r| r.degrees()).collect();
    tracing::debug!(rotations = ?given, "using fixed grid answers");
    Ok(reader)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

fn flag(ok: bool) -> &'static str {
    if ok {
        "valid"
    } else {
        "INVALID"
    }
}

fn run_encode(serial: u64, json: bool) -> Result<()> {
    let grid = codec::encode(serial)?;
    let decoded = codec::decode_grid(&grid);
    if json {
        return print_json(&GridOutput::new(&decoded, None), false);
    }
    println!("Serial: {}", decoded.serial);
    println!("Binary: {}", decoded.binary());
    println!("Parity: {}", u8::from(grid.get(PARITY)));
    println!("Grid:   {grid}");
    println!();
    println!("{}", grid.pretty());
    Ok(())
}

fn run_decode_grid(text: &str, expected: Option<u64>, json: bool) -> Result<()> {
    let expected = expected_serial(expected)?;
    let [decoded, turned @ ..] = codec::decode_rotations(&Grid::parse(text)?);
    if json {
        return print_json(
            &DecodeGridOutput {
                grid: GridOutput::new(&decoded, expected),
                turned: turned
                    .iter()
                    .zip([90u16, 180, 270])
                    .map(|(d, rotation)| TurnedOutput {
                        rotation,
                        serial: d.serial.to_string(),
                    })
                    .collect(),
            },
            false,
        );
    }
    println!("Serial:  {}", decoded.serial);
    println!("Binary:  {}", decoded.binary());
    println!("Anchors: {}", flag(decoded.anchors_valid));
    println!("Parity:  {}", flag(decoded.parity_valid));
    if let Some(e) = expected {
        let verdict = if decoded.is_valid() && decoded.serial == e {
            "MATCH"
        } else {
            "MISMATCH"
        };
        println!("Expected {e}: {verdict}");
    }
    for (d, degrees) in turned.iter().zip([90, 180, 270]) {
        println!("Turned {degrees:>3}°: {}", d.serial);
    }
    println!();
    println!("{}", decoded.grid.pretty());
    Ok(())
}

fn run_render(serial: u64, output: &Path, opts: RenderOptions) -> Result<()> {
    let img = render(serial, &opts)?;
    write_png::write_rgb_png(output, &img)?;
    let grid = opts.grid_bounds();
    eprintln!(
        "wrote {} ({}x{}, grid at {},{} size {})",
        output.display(),
        img.width,
        img.height,
        grid.x,
        grid.y,
        grid.size
    );
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string())
}

fn save_crops(dir: &Path, image_path: &Path, report: &DecodeReport) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let stem = file_stem(image_path);
    let crops = report
        .candidates
        .iter()
        .map(|c| (c.rotation, &c.crop))
        .chain(report.unreadable.iter().map(|u| (u.rotation, &u.crop)));
    for (rotation, crop) in crops {
        let path = dir.join(format!("{stem}_rot{}.png", rotation.degrees()));
        write_png::write_rgb_png(&path, &crop.pixels.to_rgb())?;
    }
    Ok(())
}

fn photo_output(
    file: &Path,
    module_type: &str,
    img: &ImageRgb8,
    report: &DecodeReport,
    expected: Option<Serial>,
) -> PhotoOutput {
    let status = match report.status {
        DecodeStatus::Accepted => "accepted",
        DecodeStatus::Ambiguous => "ambiguous",
        DecodeStatus::NoValid => "no_valid",
    };
    PhotoOutput {
        file: file.display().to_string(),
        module_type: module_type.to_string(),
        image_width: img.width,
        image_height: img.height,
        module: report.module.as_ref().map(|m| ModuleOutput {
            center: m.center,
            corners: m.corners,
            angle_deg: m.angle.to_degrees(),
            longest_side_px: m.longest_side_px(),
            score: m.score,
        }),
        status,
        serial: report.accepted().map(|c| c.decoded.serial.to_string()),
        expected_match: expected.map(|e| report.accepted().is_some() && !report.matching(e).is_empty()),
        candidates: report
            .candidates
            .iter()
            .map(|c| CandidateOutput {
                rotation: c.rotation.degrees(),
                center: c.center,
                scale_px_per_mm: c.scale,
                grid: GridOutput::new(&c.decoded, expected),
            })
            .collect(),
        unreadable: report
            .unreadable
            .iter()
            .map(|u| UnreadableOutput {
                rotation: u.rotation.degrees(),
                reason: u.reason.to_string(),
            })
            .collect(),
    }
}

const OUTLINE: Rgb = Rgb([0, 255, 0]);

/// Write the locator's maps and the photo with the detected outline drawn on.
fn save_stages(
    dir: &Path,
    image_path: &Path,
    img: &ImageRgb8,
    stages: &LocateStages,
    outline: Option<[[f64; 2]; 4]>,
) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let stem = file_stem(image_path);
    let maps: [(&str, &ImageU8); 5] = [
        ("01_gray", &stages.gray),
        ("02a_blurred", &stages.blurred),
        ("02b_edges", &stages.edges),
        ("02c_dilated", &stages.dilated),
        ("02d_filled", &stages.filled),
    ];
    for (name, map) in maps {
        let path = dir.join(format!("{stem}_{name}.png"));
        write_png::write_rgb_png(&path, &ImageRgb8::from_luma(map))?;
    }
    let mut overlay = img.clone();
    if let Some(corners) = outline {
        let width = (img.width.max(img.height) / 300).max(2);
        draw_outline(&mut overlay, &corners, OUTLINE, width);
    }
    write_png::write_rgb_png(&dir.join(format!("{stem}_03_detected.png")), &overlay)
}

fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
}

/// Replace each directory by its PNG and JPEG files, sorted by name.
fn collect_images(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in std::fs::read_dir(input)
            .with_context(|| format!("reading directory {}", input.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_photo(&path) {
                found.push(path);
            }
        }
        if found.is_empty() {
            tracing::warn!(dir = %input.display(), "no PNG or JPEG files in directory");
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn run_decode(args: &DecodeArgs) -> Result<()> {
    let expected = expected_serial(args.expected)?;
    let table = load_table(args.modules.as_deref())?;
    let reader: Box<dyn GridReader> = if args.grids.is_empty() {
        Box::new(ThresholdReader::default())
    } else {
        Box::new(fixed_reader(&args.grids)?)
    };
    let pipeline = DecodePipeline::new(&table, &args.module, reader, args.pipeline_config())?;
    let spec = pipeline.spec();

    for path in collect_images(&args.images)? {
        let img = load_image(&path)?;
        tracing::info!(file = %path.display(), width = img.width, height = img.height, "decoding");
        let report = pipeline.decode(&img);
        if let Some(dir) = &args.save_stages {
            let trace = pipeline.locator().locate_traced(&img);
            let outline = trace.result.as_ref().ok().map(|m| m.corners);
            save_stages(dir, &path, &img, &trace.stages, outline)?;
        }
        if let Some(dir) = &args.save_crops {
            save_crops(dir, &path, &report)?;
        }
        print_json(&photo_output(&path, &spec.name, &img, &report, expected), args.pretty)?;
    }
    Ok(())
}

fn run_modules(modules: Option<&Path>) -> Result<()> {
    let table = load_table(modules)?;
    println!(
        "{:<12} {:>8} {:>8} {:>10} {:>10} {:>9} {:>9}",
        "NAME", "W mm", "H mm", "ID x mm", "ID y mm", "size mm", "pad mm"
    );
    for spec in table.iter() {
        println!(
            "{:<12} {:>8.3} {:>8.3} {:>10.4} {:>10.4} {:>9.4} {:>9.3}",
            spec.name,
            spec.width_mm,
            spec.height_mm,
            spec.microid_x_mm,
            spec.microid_y_mm,
            spec.microid_size_mm,
            spec.padding_mm
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Encode { serial, json } => run_encode(serial, json),
        Command::DecodeGrid {
            text,
            expected,
            json,
        } => run_decode_grid(&text, expected, json),
        Command::Render {
            serial,
            output,
            cell_size,
            dot_color,
            background,
            no_gridlines,
        } => run_render(
            serial,
            &output,
            RenderOptions {
                cell_size,
                dot_color,
                background,
                show_gridlines: !no_gridlines,
                ..RenderOptions::default()
            },
        ),
        Command::Decode(args) => run_decode(&args),
        Command::Modules { modules } => run_modules(modules.as_deref()),
    }
}
