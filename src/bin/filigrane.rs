use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use filigrane::{
    ARCHIVE_NAME, BatchDriver, Compositor, CompositorOpts, ContentKind, DirectoryPackager,
    ImageFile, JsonStore, PackageOutcome, Packager, SeedPolicy, Watermark, WatermarkSettings,
    ZipPackager,
};

#[derive(Parser, Debug)]
#[command(name = "filigrane", version, about = "Batch watermarking")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a downscaled preview of one image as a PNG.
    Preview(PreviewArgs),
    /// Watermark every input image and package the results.
    Batch(BatchArgs),
    /// List or clear recent batch sessions.
    Sessions(SessionsArgs),
    /// Manage named settings presets.
    Presets(PresetsArgs),
}

#[derive(Args, Debug)]
struct WatermarkArgs {
    /// Settings JSON. Falls back to the store snapshot, then to defaults.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Load settings from a named preset in the store.
    #[arg(long, conflicts_with = "settings")]
    preset: Option<String>,

    /// Store directory for settings, sessions and presets.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Text watermark (switches content to text).
    #[arg(long, conflicts_with = "watermark_image")]
    text: Option<String>,

    /// Image watermark, raster or SVG (switches content to image).
    #[arg(long)]
    watermark_image: Option<PathBuf>,

    /// Register a font as `Family=path/to/font.ttf`. Repeatable.
    #[arg(long = "font", value_parser = parse_font_arg)]
    fonts: Vec<(String, PathBuf)>,

    /// Seed for the random pattern. Defaults to the current time.
    #[arg(long)]
    seed: Option<u64>,

    /// Draw a new random-pattern seed for every image instead of one per run.
    #[arg(long, conflicts_with = "seed")]
    seed_per_image: bool,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Base image.
    #[arg(long)]
    image: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Longest preview edge in px.
    #[arg(long)]
    max: Option<u32>,

    #[command(flatten)]
    watermark: WatermarkArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Base images, processed in the order given.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Output zip path, or directory with `--dir`.
    #[arg(long, default_value = ARCHIVE_NAME)]
    out: PathBuf,

    /// Write loose PNG files into `--out` instead of a zip archive.
    #[arg(long)]
    dir: bool,

    #[command(flatten)]
    watermark: WatermarkArgs,
}

#[derive(Args, Debug)]
struct SessionsArgs {
    /// Store directory.
    #[arg(long)]
    store: PathBuf,

    /// Forget every recorded session.
    #[arg(long)]
    clear: bool,
}

#[derive(Args, Debug)]
struct PresetsArgs {
    /// Store directory.
    #[arg(long)]
    store: PathBuf,

    /// Save the current store settings (or `--settings`) under this name.
    #[arg(long, conflicts_with = "delete")]
    save: Option<String>,

    /// Settings JSON to save instead of the store snapshot.
    #[arg(long, requires = "save")]
    settings: Option<PathBuf>,

    /// Delete the preset with this name.
    #[arg(long)]
    delete: Option<String>,
}

fn parse_font_arg(s: &str) -> Result<(String, PathBuf), String> {
    let (family, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected Family=path, got '{s}'"))?;
    if family.trim().is_empty() || path.is_empty() {
        return Err(format!("expected Family=path, got '{s}'"));
    }
    Ok((family.trim().to_owned(), PathBuf::from(path)))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Preview(args) => cmd_preview(args),
        Command::Batch(args) => cmd_batch(args),
        Command::Sessions(args) => cmd_sessions(args),
        Command::Presets(args) => cmd_presets(args),
    }
}

struct Prepared {
    settings: WatermarkSettings,
    watermark_image: Option<ImageFile>,
    store: Option<JsonStore>,
    seed_policy: SeedPolicy,
}

fn prepare(args: &WatermarkArgs, compositor: &mut Compositor) -> anyhow::Result<Prepared> {
    let store = args.store.as_ref().map(JsonStore::open).transpose()?;

    let mut settings = match (&args.settings, &args.preset, &store) {
        (Some(path), _, _) => WatermarkSettings::from_path(path)?,
        (None, Some(name), Some(store)) => {
            store
                .preset(name)
                .with_context(|| format!("no preset named '{name}'"))?
                .settings
        }
        (None, Some(_), None) => anyhow::bail!("--preset requires --store"),
        (None, None, Some(store)) => store.load_settings(),
        (None, None, None) => WatermarkSettings::default(),
    };

    if let Some(text) = &args.text {
        settings.content_kind = ContentKind::Text;
        settings.text = text.clone();
    }
    let watermark_image = match &args.watermark_image {
        Some(path) => {
            settings.content_kind = ContentKind::Image;
            Some(ImageFile::from_path(path)?)
        }
        None => None,
    };

    for (family, path) in &args.fonts {
        compositor.fonts_mut().register_path(family, path)?;
    }

    Ok(Prepared {
        settings,
        watermark_image,
        store,
        seed_policy: match (args.seed, args.seed_per_image) {
            (Some(seed), _) => SeedPolicy::Fixed(seed),
            (None, true) => SeedPolicy::PerRender,
            (None, false) => SeedPolicy::fixed_now(),
        },
    })
}

fn create_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

/// Read every input, naming each one that fails. An incomplete batch is never packaged, so any
/// unreadable input stops the run before rendering.
fn load_bases(paths: &[PathBuf]) -> anyhow::Result<Vec<ImageFile>> {
    let mut bases = Vec::with_capacity(paths.len());
    let mut unreadable = 0usize;
    for path in paths {
        match ImageFile::from_path(path) {
            Ok(file) => bases.push(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "input unreadable");
                eprintln!("failed: {} (Decode): {e}", path.display());
                unreadable += 1;
            }
        }
    }
    if unreadable > 0 {
        anyhow::bail!(
            "{unreadable} of {} inputs could not be read, nothing packaged",
            paths.len()
        );
    }
    Ok(bases)
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let mut opts = CompositorOpts::default();
    if let Some(max) = args.max {
        opts = opts.with_preview_max(max);
    }
    let mut compositor = Compositor::new(opts);
    let prepared = prepare(&args.watermark, &mut compositor)?;
    prepared.settings.validate()?;

    let base = ImageFile::from_path(&args.image)?;
    let watermark = Watermark::select(&prepared.settings, prepared.watermark_image.as_ref())?;
    let seed = prepared.seed_policy.resolve();
    let frame = compositor.render_preview(&base, &prepared.settings, watermark, seed)?;

    create_parent(&args.out)?;
    std::fs::write(&args.out, frame.encode_png()?)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    if let Some(store) = &prepared.store {
        store.save_settings(&prepared.settings)?;
    }
    eprintln!(
        "wrote {} ({}x{}, seed {})",
        args.out.display(),
        frame.width,
        frame.height,
        seed
    );
    Ok(())
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let mut compositor = Compositor::default();
    let mut prepared = prepare(&args.watermark, &mut compositor)?;

    let bases = load_bases(&args.images)?;

    let mut packager: Box<dyn Packager> = if args.dir {
        Box::new(DirectoryPackager::new(&args.out))
    } else {
        create_parent(&args.out)?;
        Box::new(ZipPackager::new(&args.out))
    };

    let total = bases.len();
    let mut driver = BatchDriver::new()
        .with_seed_policy(prepared.seed_policy)
        .on_progress(move |p| {
            let status = if p.ok { "ok" } else { "failed" };
            eprintln!("[{}/{}] {} {status}", p.processed, total, p.name);
        });

    let sessions = prepared
        .store
        .as_mut()
        .map(|s| s as &mut dyn filigrane::SessionLog);
    let report = driver.run(
        &mut compositor,
        &bases,
        &prepared.settings,
        prepared.watermark_image.as_ref(),
        packager.as_mut(),
        sessions,
    )?;

    for failure in &report.output.failures {
        eprintln!(
            "failed: {} ({:?}): {}",
            failure.name, failure.step, failure.message
        );
    }
    match report.packaging {
        PackageOutcome::Packaged(receipt) => {
            if let Some(store) = &prepared.store {
                store.save_settings(&prepared.settings)?;
            }
            eprintln!("wrote {} ({} images)", receipt.location, receipt.entries);
            Ok(())
        }
        PackageOutcome::Skipped => anyhow::bail!(
            "batch incomplete: {} of {} images rendered, nothing packaged",
            report.output.outputs.len(),
            report.output.total
        ),
        PackageOutcome::Failed(e) => Err(e).context("packaging failed"),
    }
}

fn cmd_sessions(args: SessionsArgs) -> anyhow::Result<()> {
    let store = JsonStore::open(&args.store)?;
    if args.clear {
        store.clear_sessions()?;
        eprintln!("cleared sessions");
        return Ok(());
    }
    for session in store.recent_sessions() {
        println!(
            "{}  {}  {} images  pattern={:?}",
            session.date.to_rfc3339(),
            session.id,
            session.image_count,
            session.settings.pattern
        );
    }
    Ok(())
}

fn cmd_presets(args: PresetsArgs) -> anyhow::Result<()> {
    let store = JsonStore::open(&args.store)?;
    if let Some(name) = &args.save {
        let settings = match &args.settings {
            Some(path) => WatermarkSettings::from_path(path)?,
            None => store.load_settings(),
        };
        store.save_preset(name, &settings)?;
        eprintln!("saved preset '{name}'");
        return Ok(());
    }
    if let Some(name) = &args.delete {
        if !store.delete_preset(name)? {
            anyhow::bail!("no preset named '{name}'");
        }
        eprintln!("deleted preset '{name}'");
        return Ok(());
    }
    for preset in store.presets() {
        println!("{}  {}", preset.created_at.to_rfc3339(), preset.name);
    }
    Ok(())
}
