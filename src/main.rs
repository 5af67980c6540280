use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;

use pixellab::config::AppConfig;
use pixellab::{Catalog, Pipeline, PipelineRecord, io, preset};

#[derive(Debug, Clone, PartialEq)]
enum PresetSource {
    File(PathBuf),
    /// `None` picks between one and three effects.
    Random(Option<usize>),
}

/// Headless PixelLab: run an effect preset over a batch of images.
///
/// Without `--preset` or `--random`, a random preset of one to three effects
/// is generated.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "pixellab", about = "Apply PixelLab effect presets to images")]
struct CliArgs {
    /// Preset JSON file to apply.
    #[arg(long, value_name = "FILE", conflicts_with = "random")]
    preset: Option<PathBuf>,

    /// Generate a random preset with N effects (0 picks one to three).
    #[arg(long, value_name = "N")]
    random: Option<usize>,

    /// Seed for the random preset; the clock is used when omitted.
    #[arg(long, value_name = "S")]
    seed: Option<u64>,

    /// Write the effective preset to this file.
    #[arg(long, value_name = "FILE")]
    save_preset: Option<PathBuf>,

    /// Downscale inputs to the configured preview size first.
    #[arg(long)]
    preview: bool,

    /// Output directory (defaults to the configured one, else ./out).
    #[arg(long = "out", value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Input images.
    #[arg(value_name = "INPUT", num_args = 1.., required_unless_present = "save_preset")]
    inputs: Vec<PathBuf>,
}

impl CliArgs {
    fn preset_source(&self) -> PresetSource {
        match (&self.preset, self.random) {
            (Some(path), _) => PresetSource::File(path.clone()),
            (None, Some(n)) if n > 0 => PresetSource::Random(Some(n)),
            (None, _) => PresetSource::Random(None),
        }
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

fn resolve_preset(args: &CliArgs, catalog: &Catalog) -> Result<PipelineRecord> {
    match args.preset_source() {
        PresetSource::File(path) => preset::load(&path)
            .with_context(|| format!("could not load preset {}", path.display())),
        PresetSource::Random(count) => {
            let seed = args.seed.unwrap_or_else(clock_seed);
            tracing::info!(seed, "generating random preset");
            Ok(preset::random_preset_seeded(catalog, count, seed))
        }
    }
}

fn process_one(
    pipeline: &Pipeline,
    input: &Path,
    out_dir: &Path,
    preview_max: Option<u32>,
    jpeg_quality: u8,
) -> Result<PathBuf> {
    let started = Instant::now();
    let mut img = io::open_image(input)?;
    if let Some(max) = preview_max {
        img = io::ensure_preview_size(img, max);
    }
    let processed = pipeline.apply(&img);
    let output = io::output_path(input, out_dir);
    io::save_image(&processed, &output, jpeg_quality)?;
    tracing::debug!(
        input = %input.display(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "processed"
    );
    Ok(output)
}

fn run(args: CliArgs, config: &AppConfig) -> Result<usize> {
    let catalog = Catalog::builtin();
    let record = resolve_preset(&args, &catalog)?;

    if let Some(path) = &args.save_preset {
        preset::save(&record, path)?;
        eprintln!("pixellab: preset written to {}", path.display());
    }

    let mut pipeline = Pipeline::with_max_history(config.max_history());
    preset::decode_into(&mut pipeline, &record, &catalog);
    let names: Vec<&str> = pipeline.effects().iter().map(|e| e.kind.name()).collect();
    tracing::info!(effects = ?names, "pipeline ready");

    let out_dir = args.out_dir.clone().unwrap_or_else(|| config.output_dir());
    let preview_max = args.preview.then(|| config.preview_max());
    let jpeg_quality = config.jpeg_quality();

    let failures = args
        .inputs
        .par_iter()
        .filter(|input| {
            match process_one(&pipeline, input, &out_dir, preview_max, jpeg_quality) {
                Ok(output) => {
                    println!("{} -> {}", input.display(), output.display());
                    false
                }
                Err(err) => {
                    tracing::error!(input = %input.display(), "failed: {err:#}");
                    true
                }
            }
        })
        .count();
    Ok(failures)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();
    let config = AppConfig::load();
    let total = args.inputs.len();
    match run(args, &config) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            eprintln!("pixellab: {failed} of {total} images failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("pixellab: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::{DynamicImage, ImageBuffer, Rgb};

    use clap::Parser;
    use clap::error::ErrorKind;

    use super::{CliArgs, PresetSource, run};
    use pixellab::config::AppConfig;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("pixellab").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_to_a_random_preset() {
        let args = parse(&["a.png", "b.jpg"]).unwrap();
        assert_eq!(args.preset_source(), PresetSource::Random(None));
        assert_eq!(args.inputs, vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
        assert!(!args.preview);
    }

    #[test]
    fn parses_every_option() {
        let args = parse(&[
            "--random", "2", "--seed", "7", "--preview", "--out", "renders", "--save-preset",
            "p.json", "in.png",
        ])
        .unwrap();
        assert_eq!(args.preset_source(), PresetSource::Random(Some(2)));
        assert_eq!(args.seed, Some(7));
        assert!(args.preview);
        assert_eq!(args.out_dir, Some(PathBuf::from("renders")));
        assert_eq!(args.save_preset, Some(PathBuf::from("p.json")));

        let file = parse(&["--preset", "look.json", "x.png"]).unwrap();
        assert_eq!(file.preset_source(), PresetSource::File(PathBuf::from("look.json")));
    }

    #[test]
    fn random_zero_means_one_to_three() {
        let args = parse(&["--random", "0", "x.png"]).unwrap();
        assert_eq!(args.preset_source(), PresetSource::Random(None));
    }

    #[test]
    fn saving_a_preset_needs_no_inputs() {
        let args = parse(&["--random", "1", "--save-preset", "p.json"]).unwrap();
        assert!(args.inputs.is_empty());
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse(&[]).unwrap_err().kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(
            parse(&["--preset", "a.json", "--random", "1", "x.png"]).unwrap_err().kind(),
            ErrorKind::ArgumentConflict
        );
        assert!(parse(&["--seed"]).is_err());
        assert_eq!(
            parse(&["--seed", "abc", "x.png"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert_eq!(
            parse(&["--bogus", "x.png"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
        assert_eq!(parse(&["--help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn batch_run_writes_outputs_and_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pic.png");
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(20, 10, |x, y| {
            Rgb([(x * 10) as u8, (y * 20) as u8, 90])
        }))
        .save(&input)
        .unwrap();
        let out = dir.path().join("out");
        let preset = dir.path().join("preset.json");

        let args = parse(&[
            "--random",
            "2",
            "--seed",
            "3",
            "--save-preset",
            preset.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            input.to_str().unwrap(),
            dir.path().join("missing.png").to_str().unwrap(),
        ])
        .unwrap();
        let failed = run(args, &AppConfig::default()).unwrap();
        assert_eq!(failed, 1);
        assert!(out.join("pic.png").exists());
        assert!(pixellab::preset::load(&preset).is_some());
    }
}
