use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use log::*;
use rif_core::{init_thread_pool, RuntimeConfig};
use rif_descriptor::RifExtractor;
use rif_cli::{overlay, pnm, CliError, CliResult, CoordinatorConfig, FrameProcessor, ReferenceImage};
use rif_track::{load_gray_image, Matcher, TrackedPolygon};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "rif", about = "Rotation-invariant feature tracking and image matching")]
struct Opt {
    /// TOML pipeline config with `track`, `matcher` and `query_period` sections.
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,
    /// Worker threads for extraction and matching (defaults to the CPU count).
    #[structopt(short, long)]
    threads: Option<usize>,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Track camera motion over an image sequence
    Track {
        /// Reference image to recognise and outline; repeat for several.
        #[structopt(long, number_of_values = 1, parse(from_os_str))]
        db: Vec<PathBuf>,
        /// Directory for annotated PPM frames.
        #[structopt(long, parse(from_os_str))]
        overlay: Option<PathBuf>,
        #[structopt(required = true, parse(from_os_str))]
        frames: Vec<PathBuf>,
    },
    /// Find database images in a query image
    Match {
        /// Database image; repeat for several.
        #[structopt(long, required = true, number_of_values = 1, parse(from_os_str))]
        db: Vec<PathBuf>,
        /// Directory for the annotated query image.
        #[structopt(long, parse(from_os_str))]
        overlay: Option<PathBuf>,
        #[structopt(parse(from_os_str))]
        query: PathBuf,
    },
    /// Write the RIF features of an image to a feature store file
    Extract {
        /// Use the multi-scale database extractor instead of the tracking one.
        #[structopt(long)]
        database: bool,
        /// Write the plain text format instead of binary.
        #[structopt(long)]
        text: bool,
        #[structopt(parse(from_os_str))]
        image: PathBuf,
        #[structopt(parse(from_os_str))]
        output: PathBuf,
    },
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(opt: Opt) -> CliResult<()> {
    let runtime = RuntimeConfig {
        n_threads: opt.threads.unwrap_or_else(|| RuntimeConfig::default().n_threads),
    };
    init_thread_pool(runtime.n_threads)?;

    let config = match &opt.config {
        Some(path) => load_config(path)?,
        None => CoordinatorConfig::default(),
    };
    debug!("{}", config.summary());

    match opt.command {
        Command::Track { db, overlay, frames } => track(config, &db, overlay.as_deref(), &frames),
        Command::Match { db, overlay, query } => match_query(config, &db, overlay.as_deref(), &query),
        Command::Extract { database, text, image, output } => extract(config, database, text, &image, &output),
    }
}

fn load_config(path: &Path) -> CliResult<CoordinatorConfig> {
    CoordinatorConfig::load_toml(path).map_err(|e| CliError::Config {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn load_references(paths: &[PathBuf]) -> CliResult<Vec<ReferenceImage>> {
    paths
        .iter()
        .map(|path| -> CliResult<ReferenceImage> { Ok(ReferenceImage::open(path, file_label(path))?) })
        .collect()
}

fn track(config: CoordinatorConfig, db: &[PathBuf], overlay_dir: Option<&Path>, frames: &[PathBuf]) -> CliResult<()> {
    if let Some(dir) = overlay_dir {
        std::fs::create_dir_all(dir)?;
    }
    let mut processor = FrameProcessor::with_references(config, load_references(db)?);

    let start = Instant::now();
    for (i, path) in frames.iter().enumerate() {
        let gray = load_gray_image(path)?;
        let (report, rgb) = processor.process_image(&gray)?;

        println!(
            "{:5} {:3} matches {:>7} yaw {:6.2} pitch {:6.2} roll {:6.2}  {}",
            i,
            report.match_count,
            if report.valid { "valid" } else { "invalid" },
            report.yaw,
            report.pitch,
            report.roll,
            path.display()
        );
        for polygon in processor.polygons() {
            let (x, y) = polygon.centroid();
            info!("Frame {}: {} at ({:.1}, {:.1})", i, polygon.label, x, y);
        }

        if let Some(dir) = overlay_dir {
            let out = dir.join(format!("{}.ppm", file_label(path)));
            pnm::write_pnm(out, &pnm::rgb_to_buffer(&rgb)?)?;
        }
    }

    let elapsed = start.elapsed();
    info!(
        "Tracked {} frames in {:.2?} ({:.1} fps)",
        frames.len(),
        elapsed,
        frames.len() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}

fn match_query(config: CoordinatorConfig, db: &[PathBuf], overlay_dir: Option<&Path>, query: &Path) -> CliResult<()> {
    let mut matcher = Matcher::new(config.matcher)?;
    let start = Instant::now();
    matcher.build_database(&load_references(db)?)?;
    info!(
        "Database of {} images, {} descriptors built in {:.2?}",
        matcher.len(),
        matcher.descriptor_count(),
        start.elapsed()
    );

    let image = load_gray_image(query)?;
    let start = Instant::now();
    let (store, result) = matcher.query_image(&image)?;
    info!("Queried {} features in {:.2?}", store.len(), start.elapsed());

    let labels = matcher.labels();
    let sizes = matcher.reference_sizes();
    let mut polygons = Vec::new();
    for (i, model) in result.models.iter().enumerate() {
        match model {
            Some(model) => {
                println!(
                    "{}: recognised, {} matches, {} inliers, model {:?}",
                    labels[i],
                    result.matches[i].len(),
                    result.inliers[i].len(),
                    model.params()
                );
                polygons.push(TrackedPolygon::from_reference(i, &labels[i], sizes[i], model));
            }
            None => println!("{}: not found ({} matches)", labels[i], result.matches[i].len()),
        }
    }

    if let Some(dir) = overlay_dir {
        std::fs::create_dir_all(dir)?;
        let mut rgb = pnm::gray_to_rgb(&image);
        overlay::draw_polygons(&mut rgb, &polygons, 1.0);
        let out = dir.join(format!("{}_matches.ppm", file_label(query)));
        pnm::write_pnm(&out, &pnm::rgb_to_buffer(&rgb)?)?;
        info!("Saved overlay to {}", out.display());
    }
    Ok(())
}

fn extract(config: CoordinatorConfig, database: bool, text: bool, image: &Path, output: &Path) -> CliResult<()> {
    let extractor_config = if database {
        config.matcher.extractor
    } else {
        config.track.extractor
    };
    let extractor: RifExtractor = RifExtractor::new(extractor_config)?;

    let gray = load_gray_image(image)?;
    let start = Instant::now();
    let store = extractor.extract_store(&gray, 0)?;
    info!("Extracted {} features in {:.2?}", store.len(), start.elapsed());

    if text {
        store.write_text(output)?;
    } else {
        store.write_binary(output)?;
    }
    println!("Wrote {} features to {}", store.len(), output.display());
    Ok(())
}
