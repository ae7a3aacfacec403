//! Entry point: prepare the glyph dataset and optionally benchmark it.

use std::path::PathBuf;

use glyphset::config::{NUM_CLASSES, PipelineConfig};
use glyphset::logging;
use glyphset::ml;
use glyphset::pipeline::{self, ForceFlags, PreparedDataset, bundle};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let mut config = match &options.config_path {
        Some(path) => PipelineConfig::load(path).map_err(|err| err.to_string())?,
        None => PipelineConfig::default(),
    };
    if let Some(data_root) = &options.data_root {
        config.data_root = data_root.clone();
    }
    if let Some(train_size) = options.train_size {
        config.train_size = train_size;
    }
    if let Some(valid_size) = options.valid_size {
        config.valid_size = valid_size;
    }
    if let Some(test_size) = options.test_size {
        config.test_size = test_size;
    }
    if let Some(seed) = options.seed {
        config.seed = seed;
    }

    let prepared = pipeline::prepare(&config, options.force).map_err(|err| err.to_string())?;
    println!(
        "Training: {:?} {:?}",
        prepared.train.dataset.dim(),
        prepared.train.labels.dim()
    );
    println!(
        "Validation: {:?} {:?}",
        prepared.valid.dataset.dim(),
        prepared.valid.labels.dim()
    );
    println!(
        "Testing: {:?} {:?}",
        prepared.test.dataset.dim(),
        prepared.test.labels.dim()
    );

    if let Some(dir) = &options.bundle_out {
        bundle::export_bundle(dir, &prepared.train, &prepared.valid, &prepared.test)
            .map_err(|err| err.to_string())?;
        println!("Bundle written to {}", dir.display());
    }

    if options.bench {
        run_benchmark(&prepared)?;
    }
    Ok(())
}

fn run_benchmark(prepared: &PreparedDataset) -> Result<(), String> {
    let train = ml::feature_set(&prepared.train);
    let test = ml::feature_set(&prepared.test);
    for (name, train_options) in ml::benchmark_heads() {
        let model = ml::linear::train_linear(&train, NUM_CLASSES, &train_options)?;
        println!("{name}: {:.4}", model.score(&test));
        let points = ml::learning_curve(
            &train,
            &test,
            NUM_CLASSES,
            ml::LEARNING_CURVE_SIZES,
            &train_options,
        )?;
        for point in points {
            println!(
                "{name} @ {} samples: train {:.4}, test {:.4}",
                point.train_size, point.train_accuracy, point.test_accuracy
            );
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config_path: Option<PathBuf>,
    data_root: Option<PathBuf>,
    train_size: Option<usize>,
    valid_size: Option<usize>,
    test_size: Option<usize>,
    seed: Option<u64>,
    force: ForceFlags,
    bundle_out: Option<PathBuf>,
    bench: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--data-root" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--data-root requires a value".to_string())?;
                options.data_root = Some(PathBuf::from(value));
            }
            "--train-size" => {
                idx += 1;
                options.train_size = Some(parse_usize(&args, idx, "--train-size")?);
            }
            "--valid-size" => {
                idx += 1;
                options.valid_size = Some(parse_usize(&args, idx, "--valid-size")?);
            }
            "--test-size" => {
                idx += 1;
                options.test_size = Some(parse_usize(&args, idx, "--test-size")?);
            }
            "--seed" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--seed requires a value".to_string())?;
                options.seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            "--force-download" => options.force.download = true,
            "--force-extract" => options.force.extract = true,
            "--force-normalize" => options.force.normalize = true,
            "--bundle-out" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--bundle-out requires a value".to_string())?;
                options.bundle_out = Some(PathBuf::from(value));
            }
            "--bench" => options.bench = true,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn parse_usize(args: &[String], idx: usize, flag: &str) -> Result<usize, String> {
    let value = args
        .get(idx)
        .ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse::<usize>()
        .map_err(|_| format!("Invalid {flag} value: {value}"))
}

fn help_text() -> String {
    [
        "glyphset",
        "",
        "Prepares the notMNIST glyph dataset into shuffled train/valid/test splits.",
        "",
        "Usage:",
        "  glyphset [options]",
        "",
        "Options:",
        "  --config <file>        TOML configuration file (defaults are built in).",
        "  --data-root <dir>      Root directory for archives, folders, and caches.",
        "  --train-size <n>       Per-class train rows (default: 100).",
        "  --valid-size <n>       Per-class validation rows (default: 10).",
        "  --test-size <n>        Per-class test rows (default: 10).",
        "  --seed <u64>           RNG seed (default: 133).",
        "  --force-download       Re-download archives.",
        "  --force-extract        Re-extract archives.",
        "  --force-normalize      Rebuild per-class tensor caches.",
        "  --bundle-out <dir>     Export the six final tensors as a bundle.",
        "  --bench                Train and score the linear classifiers.",
    ]
    .join("\n")
}
