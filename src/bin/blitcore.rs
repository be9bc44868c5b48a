use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "blitcore", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a JSON job into a PNG.
    Compose(ComposeArgs),
    /// List the available draw units and their format support.
    Units,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Input job JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Run disjoint tasks concurrently (overrides the job file).
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,

    /// Print dispatch statistics as JSON on stdout.
    #[arg(long, default_value_t = false)]
    stats: bool,
}

#[derive(Deserialize, Debug)]
struct Job {
    target: JobTarget,
    #[serde(default)]
    dispatch: blitcore::DispatchOpts,
    #[serde(default)]
    tasks: Vec<JobTask>,
}

#[derive(Deserialize, Debug)]
struct JobTarget {
    area: blitcore::Area,
    format: blitcore::ColorFormat,
    #[serde(default)]
    stride: Option<usize>,
    /// Straight RGBA.
    #[serde(default)]
    clear: Option<[u8; 4]>,
}

#[derive(Deserialize, Debug)]
struct JobTask {
    /// Encoded image, relative to the job file.
    image: PathBuf,
    coords: blitcore::Area,
    #[serde(default)]
    image_area: Option<blitcore::Area>,
    #[serde(default)]
    clip: Option<blitcore::Area>,
    #[serde(default = "default_opa")]
    opa: blitcore::Opa,
    #[serde(default)]
    blend: blitcore::BlendMode,
    #[serde(default)]
    rotation: i32,
    #[serde(default)]
    scale: Option<[i32; 2]>,
    #[serde(default)]
    pivot: Option<blitcore::Point>,
    #[serde(default)]
    tile: bool,
    #[serde(default)]
    antialias: bool,
}

fn default_opa() -> blitcore::Opa {
    blitcore::OPA_COVER
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Compose(args) => cmd_compose(args),
        Command::Units => cmd_units(),
    }
}

fn read_job_json(path: &Path) -> anyhow::Result<Job> {
    let f = File::open(path).with_context(|| format!("open job '{}'", path.display()))?;
    let r = BufReader::new(f);
    let job: Job = serde_json::from_reader(r).with_context(|| "parse job JSON")?;
    Ok(job)
}

fn read_image(entry: &JobTask, root: &Path) -> anyhow::Result<Vec<u8>> {
    let path = root.join(&entry.image);
    std::fs::read(&path).with_context(|| format!("read image '{}'", path.display()))
}

/// An unreadable image still yields a task; its empty source fails when opened.
fn build_task(entry: &JobTask, bytes: Vec<u8>) -> blitcore::DrawTask {
    let src = blitcore::ImageSource::Encoded(bytes.into());
    let mut task = blitcore::DrawTask::new(src, entry.coords)
        .with_opa(entry.opa)
        .with_blend(entry.blend)
        .with_rotation(entry.rotation)
        .with_tile(entry.tile)
        .with_antialias(entry.antialias);
    if let Some(area) = entry.image_area {
        task = task.with_image_area(area);
    }
    if let Some(clip) = entry.clip {
        task = task.with_clip(clip);
    }
    if let Some([sx, sy]) = entry.scale {
        task = task.with_scale(sx, sy);
    }
    if let Some(pivot) = entry.pivot {
        task = task.with_pivot(pivot);
    }
    task
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let job = read_job_json(&args.in_path)?;

    let mut opts = job.dispatch.with_env_overrides()?;
    if args.parallel {
        opts = opts.with_parallel(true);
    }
    if args.threads.is_some() {
        opts = opts.with_threads(args.threads);
    }
    let mut dispatcher = blitcore::Dispatcher::from_opts(opts)?;

    let t = &job.target;
    let mut target = match t.stride {
        Some(stride) => blitcore::TargetBuffer::with_stride(t.area, t.format, stride)?,
        None => blitcore::TargetBuffer::new(t.area, t.format)?,
    };
    if let Some([r, g, b, a]) = t.clear {
        target.fill(blitcore::Color32::new(r, g, b, a));
    }

    let root = args.in_path.parent().unwrap_or_else(|| Path::new("."));
    let mut queue = blitcore::TaskQueue::new();
    let mut unreadable = Vec::with_capacity(job.tasks.len());
    for entry in &job.tasks {
        let bytes = match read_image(entry, root) {
            Ok(bytes) => {
                unreadable.push(None);
                bytes
            }
            Err(err) => {
                unreadable.push(Some(format!("{err:#}")));
                Vec::new()
            }
        };
        queue.push(build_task(entry, bytes));
    }

    let stats = dispatcher.dispatch(&mut queue, &mut target)?;
    for rec in queue.iter() {
        if let blitcore::TaskState::Failed(msg) = &rec.state {
            let why = unreadable.get(rec.id.0 as usize).cloned().flatten();
            eprintln!("task {} failed: {}", rec.id.0, why.as_deref().unwrap_or(msg));
        }
    }

    let area = target.area();
    let mut rgba = Vec::with_capacity(area.width() as usize * area.height() as usize * 4);
    for y in area.y1..=area.y2 {
        for x in area.x1..=area.x2 {
            let c = target.pixel(x, y).unwrap_or_default();
            rgba.extend_from_slice(&[c.r, c.g, c.b, c.a]);
        }
    }

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &rgba,
        area.width() as u32,
        area.height() as u32,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    if args.stats {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_units() -> anyhow::Result<()> {
    let coherency = Arc::new(blitcore::CoherencyManager::default());
    for kind in [
        blitcore::UnitKind::Dma2d,
        blitcore::UnitKind::Gpu,
        blitcore::UnitKind::Software,
    ] {
        let unit = blitcore::create_unit(kind, coherency.clone(), true);
        let reads: Vec<String> = blitcore::ColorFormat::ALL
            .into_iter()
            .filter(|cf| unit.supports(*cf, blitcore::OpKind::ReadSource))
            .map(|cf| format!("{cf:?}"))
            .collect();
        let writes: Vec<String> = blitcore::ColorFormat::ALL
            .into_iter()
            .filter(|cf| unit.supports(*cf, blitcore::OpKind::WriteTarget))
            .map(|cf| format!("{cf:?}"))
            .collect();
        let blends: Vec<String> = blitcore::BlendMode::ALL
            .into_iter()
            .filter(|m| unit.supports(blitcore::ColorFormat::Argb8888, blitcore::OpKind::Blend(*m)))
            .map(|m| format!("{m:?}"))
            .collect();
        println!("{}:", unit.name());
        println!("  preference: {}", unit.preference());
        println!("  reads:      {}", reads.join(", "));
        println!("  writes:     {}", writes.join(", "));
        println!("  blends:     {}", blends.join(", "));
        println!(
            "  tile:       {}",
            unit.supports(blitcore::ColorFormat::Argb8888, blitcore::OpKind::Tile)
        );
        println!(
            "  transform:  {}",
            unit.supports(blitcore::ColorFormat::Argb8888, blitcore::OpKind::Transform)
        );
    }
    Ok(())
}
