//! Score the linear benchmark heads against an exported dataset bundle.

use std::path::PathBuf;

use glyphset::ml;
use glyphset::pipeline::bundle;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let bundle = bundle::load_bundle(&options.bundle_dir).map_err(|err| err.to_string())?;
    let num_classes = num_classes(&bundle)?;

    let train = ml::feature_set(&bundle.train);
    let test = ml::feature_set(&bundle.test);
    println!(
        "Loaded bundle: {} train rows, {} test rows, {num_classes} classes",
        train.len(),
        test.len()
    );

    for (name, train_options) in ml::benchmark_heads() {
        let model = ml::linear::train_linear(&train, num_classes, &train_options)?;
        println!("{name}: {:.4}", model.score(&test));
        if options.curve {
            let points = ml::learning_curve(
                &train,
                &test,
                num_classes,
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
    }
    Ok(())
}

fn num_classes(bundle: &bundle::Bundle) -> Result<usize, String> {
    let max = bundle
        .train
        .labels
        .iter()
        .chain(bundle.valid.labels.iter())
        .chain(bundle.test.labels.iter())
        .copied()
        .max()
        .ok_or_else(|| "Bundle contains no labels".to_string())?;
    if max < 0 {
        return Err(format!("Bundle contains negative label {max}"));
    }
    Ok(max as usize + 1)
}

#[derive(Debug, Clone)]
struct CliOptions {
    bundle_dir: PathBuf,
    curve: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut bundle_dir = None;
    let mut curve = false;
    for arg in &args {
        match arg.as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--curve" => curve = true,
            other if other.starts_with('-') => {
                return Err(format!("Unknown argument: {other}\n\n{}", help_text()));
            }
            path => {
                if bundle_dir.replace(PathBuf::from(path)).is_some() {
                    return Err("Expected exactly one bundle directory".to_string());
                }
            }
        }
    }
    let bundle_dir = bundle_dir.ok_or_else(help_text)?;
    Ok(CliOptions { bundle_dir, curve })
}

fn help_text() -> String {
    [
        "glyphset-bench <bundle-dir> [--curve]",
        "",
        "Trains the three linear heads on an exported bundle and prints their",
        "test accuracy. With --curve, also traces accuracy at growing",
        "training-set sizes.",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bundle_dir_and_curve_flag() {
        let options =
            parse_args(vec!["/tmp/bundle".to_string(), "--curve".to_string()]).unwrap();
        assert_eq!(options.bundle_dir, PathBuf::from("/tmp/bundle"));
        assert!(options.curve);
    }

    #[test]
    fn rejects_two_positional_arguments() {
        let err = parse_args(vec!["a".to_string(), "b".to_string()]).unwrap_err();
        assert!(err.contains("exactly one"));
    }

    #[test]
    fn missing_bundle_dir_shows_usage() {
        let err = parse_args(Vec::new()).unwrap_err();
        assert!(err.contains("glyphset-bench"));
    }
}
