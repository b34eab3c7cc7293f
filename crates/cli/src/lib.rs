mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_model::{ImageRef, Size, Stamp};
use pdf_engine::{default_rasterizer, OpenSource, PageRasterizer};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::Storage;

pub use replay::{ReplayAction, ReplayReport};

#[derive(Debug, Parser)]
#[command(name = "dropshelf-cli")]
#[command(about = "Dropshelf document viewer CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Drive a headless viewer through a JSON action script.
    Replay {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(long, value_parser = parse_viewport, default_value = "800x600")]
        viewport: Size,
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },
    /// Render one page to a PNG.
    RenderPage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Manage the saved stamp library.
    Stamps {
        #[command(subcommand)]
        command: StampsCommand,
        #[arg(long, value_name = "DIR", global = true)]
        data_dir: Option<PathBuf>,
    },
    /// Print the effective viewer settings.
    Settings {
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum StampsCommand {
    List,
    Add {
        #[arg(long)]
        label: String,
        #[arg(long, value_name = "REF")]
        image: String,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Replay { file, script, viewport, data_dir } => {
            run_replay(&file, &script, viewport, data_dir)
        }
        Commands::RenderPage { file, page, scale, output } => {
            run_render_page(&file, page, scale, output.as_deref())
        }
        Commands::Stamps { command, data_dir } => run_stamps(command, data_dir),
        Commands::Settings { data_dir } => {
            let storage = open_storage(data_dir)?;
            let settings = storage.load_settings().context("failed to load settings")?;
            print_json(&settings)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut rasterizer = default_rasterizer();
    let opened = rasterizer.open(OpenSource::from(file)).context("failed to open PDF")?;

    let pages = (0..opened.page_count)
        .map(|index| -> Result<PageSizeOutput> {
            let size = rasterizer.page_size(opened.handle, index)?;
            Ok(PageSizeOutput { width: size.width_pt, height: size.height_pt })
        })
        .collect::<Result<Vec<_>>>()
        .context("failed to read page sizes")?;

    let payload =
        InfoOutput { path: file.display().to_string(), page_count: opened.page_count, pages };
    print_json(&payload)?;

    rasterizer.close(opened.handle)?;
    Ok(())
}

fn run_replay(file: &Path, script: &Path, viewport: Size, data_dir: Option<PathBuf>) -> Result<()> {
    ensure_pdf_exists(file)?;

    let raw = fs::read(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;
    let actions: Vec<ReplayAction> = serde_json::from_slice(&raw)
        .with_context(|| format!("invalid replay script {}", script.display()))?;

    let storage = open_storage(data_dir)?;
    let report = replay::replay(file, &actions, viewport, &storage)?;
    print_json(&report)
}

fn run_render_page(file: &Path, page: u32, scale: f32, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    if !(scale.is_finite() && scale > 0.0) {
        anyhow::bail!("--scale must be a positive number");
    }

    let mut rasterizer = default_rasterizer();
    let opened = rasterizer.open(OpenSource::from(file)).context("failed to open PDF")?;

    let image = rasterizer
        .render_page(opened.handle, page - 1, scale)
        .context("failed to render page")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_page_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    rasterizer.close(opened.handle)?;
    Ok(())
}

fn run_stamps(command: StampsCommand, data_dir: Option<PathBuf>) -> Result<()> {
    let storage = open_storage(data_dir)?;

    match command {
        StampsCommand::List => {
            let stamps = storage.load_stamps().context("failed to load stamps")?;
            print_json(&stamps)
        }
        StampsCommand::Add { label, image } => {
            let stamp = Stamp::new(label, ImageRef(image));
            let id = stamp.id;
            storage.append_stamp(stamp).context("failed to save stamp")?;
            println!("{id}");
            Ok(())
        }
    }
}

fn open_storage(data_dir: Option<PathBuf>) -> Result<Storage> {
    match data_dir {
        Some(root) => Ok(Storage::with_root(root)),
        None => Storage::from_default_project().context("failed to locate data directory"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn parse_viewport(raw: &str) -> Result<Size, String> {
    let (width, height) =
        raw.split_once(['x', 'X']).ok_or_else(|| format!("expected WIDTHxHEIGHT, got {raw}"))?;

    let parse = |value: &str| {
        value
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|value| value.is_finite() && *value > 0.0)
            .ok_or_else(|| format!("invalid viewport dimension: {value}"))
    };

    Ok(Size::new(parse(width)?, parse(height)?))
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_page_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
