//! denoise-train: learn a denoising filter from paired noisy micrographs
//!
//! Usage:
//!   denoise-train --pairs train.txt [--val-pairs val.txt] [--config train.json] [overrides...]
//!
//! A pair list holds one `x1 x2` pair of image paths per line. Each run gets
//! its own timestamped directory under `runs/` with the resolved config, a
//! JSON line per epoch, and the learned filter.

use anyhow::{bail, Context, Result};
use denoise_rs::config::TrainConfig;
use denoise_rs::data::{parse_pair_list, BatchLoader, PairedDataset};
use denoise_rs::io::{load_filter, save_filter, FilterMetadata};
use denoise_rs::models::AffineFilter;
use denoise_rs::optim::{EpochSummary, Trainer};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::OffsetDateTime;

/// `YYYYMMDD_HHMM` in UTC.
fn timestamp(now: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute()
    )
}

/// Create a fresh run directory, appending `.N` on collisions.
fn create_run_directory(root: &Path, name: &str) -> std::io::Result<PathBuf> {
    let sanitized = name.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
    let base = root.join(format!("{}_{}", timestamp(OffsetDateTime::now_utc()), sanitized));

    let mut path = base.clone();
    let mut counter = 1;
    while path.exists() {
        path = PathBuf::from(format!("{}.{}", base.display(), counter));
        counter += 1;
    }

    std::fs::create_dir_all(&path)?;
    Ok(path)
}

fn save_run_metadata(out_dir: &Path, args: &[String], cfg: &TrainConfig) -> Result<()> {
    let mut file = std::fs::File::create(out_dir.join("run_metadata.txt"))?;
    writeln!(file, "=== Training Run Metadata ===")?;
    writeln!(file)?;
    writeln!(file, "Command:")?;
    writeln!(file, "denoise-train {}", args.join(" "))?;
    writeln!(file)?;
    writeln!(file, "Started: {}", timestamp(OffsetDateTime::now_utc()))?;
    if let Some(seed) = cfg.seed {
        writeln!(file, "Seed: {seed}")?;
    }
    writeln!(file)?;
    writeln!(file, "System:")?;
    writeln!(file, "  Platform: {}", std::env::consts::OS)?;
    writeln!(file, "  Architecture: {}", std::env::consts::ARCH)?;
    writeln!(file, "  Package version: {}", denoise_rs::VERSION)?;

    let config_json = serde_json::to_string_pretty(cfg)?;
    std::fs::write(out_dir.join("config.json"), config_json + "\n")?;
    Ok(())
}

fn value<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = args.next().with_context(|| format!("missing value for {flag}"))?;
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value '{raw}' for {flag}: {e}"))
}

fn load_pairs(list: &Path, cutoff: f32) -> Result<PairedDataset> {
    let text = std::fs::read_to_string(list)
        .with_context(|| format!("failed to read pair list {}", list.display()))?;
    let base = list.parent().unwrap_or_else(|| Path::new("."));
    let pairs = parse_pair_list(&text, base)
        .map_err(|e| anyhow::anyhow!("{}: {e}", list.display()))?;
    let dataset = PairedDataset::load(&pairs, cutoff)?;
    Ok(dataset)
}

fn print_help() {
    eprintln!("Usage:");
    eprintln!("  denoise-train --pairs <list> [--val-pairs <list>] [--config <json>] [overrides...]");
    eprintln!();
    eprintln!("Overrides:");
    eprintln!("  --epochs N            number of epochs (default 100)");
    eprintln!("  --lr F                learning rate (default 0.001)");
    eprintln!("  --optimizer NAME      adam | adagrad | sgd (default adagrad)");
    eprintln!("  --criterion NAME      l1 | l2 | l0 (default l2)");
    eprintln!("  --weight-gradient F   > 0 scores both pair directions (default 0.01)");
    eprintln!("  --batch-size N        (default 10)");
    eprintln!("  --filter-size K       odd kernel width (default 11)");
    eprintln!("  --cutoff F            zero standardized values beyond +-F (default 0, off)");
    eprintln!("  --device NAME         cpu | parallel");
    eprintln!("  --seed U64            shuffle seed");
    eprintln!("  --no-shuffle          keep pair-list order");
    eprintln!("  --init <filter.json>  start from a saved filter");
    eprintln!("  --out-dir DIR         run directory root (default runs/)");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("denoise-train v{}", denoise_rs::VERSION);

    let raw_args: Vec<String> = std::env::args().skip(1).collect();

    // The config file is applied first so later flags override it.
    let mut cfg = TrainConfig::default();
    if let Some(pos) = raw_args.iter().position(|a| a == "--config") {
        let path = raw_args
            .get(pos + 1)
            .context("missing value for --config")?;
        cfg = TrainConfig::from_json_file(Path::new(path))?;
    }

    let mut pairs: Option<PathBuf> = None;
    let mut val_pairs: Option<PathBuf> = None;
    let mut init: Option<PathBuf> = None;
    let mut out_root = PathBuf::from("runs");

    let mut args = raw_args.clone().into_iter();
    while let Some(a) = args.next() {
        match a.as_str() {
            "--config" => {
                args.next();
            }
            "--pairs" => pairs = Some(value(&mut args, "--pairs")?),
            "--val-pairs" => val_pairs = Some(value(&mut args, "--val-pairs")?),
            "--init" => init = Some(value(&mut args, "--init")?),
            "--out-dir" => out_root = value(&mut args, "--out-dir")?,
            "--epochs" => cfg.num_epochs = value(&mut args, "--epochs")?,
            "--lr" => cfg.lr = value(&mut args, "--lr")?,
            "--optimizer" => cfg.optimizer = value(&mut args, "--optimizer")?,
            "--criterion" => cfg.criterion = value(&mut args, "--criterion")?,
            "--weight-gradient" => cfg.weight_gradient = value(&mut args, "--weight-gradient")?,
            "--batch-size" => cfg.batch_size = value(&mut args, "--batch-size")?,
            "--filter-size" => cfg.filter_size = value(&mut args, "--filter-size")?,
            "--cutoff" => cfg.cutoff = value(&mut args, "--cutoff")?,
            "--device" => cfg.device = value(&mut args, "--device")?,
            "--seed" => cfg.seed = Some(value(&mut args, "--seed")?),
            "--no-shuffle" => cfg.shuffle = false,
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                print_help();
                bail!("unknown argument: {other}");
            }
        }
    }
    cfg.validate()?;

    let Some(pairs) = pairs else {
        print_help();
        bail!("--pairs is required");
    };

    let train_set = load_pairs(&pairs, cfg.cutoff)?;
    if train_set.is_empty() {
        bail!("{} lists no image pairs", pairs.display());
    }
    println!("Training pairs: {}", train_set.len());
    let mut train = BatchLoader::new(train_set, cfg.batch_size);
    if cfg.shuffle {
        train = train.shuffled(cfg.seed);
    }

    let validation = match &val_pairs {
        Some(list) => {
            let set = load_pairs(list, cfg.cutoff)?;
            println!("Validation pairs: {}", set.len());
            Some(BatchLoader::new(set, cfg.batch_size))
        }
        None => None,
    };

    let mut filter = match &init {
        Some(path) => {
            let (filter, _) = load_filter(path)
                .with_context(|| format!("failed to load initial filter {}", path.display()))?;
            filter
        }
        None => AffineFilter::identity(cfg.filter_size),
    };

    let run_name = pairs
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "run".to_string());
    let out_dir = create_run_directory(&out_root, &run_name)
        .with_context(|| format!("failed to create run directory under {}", out_root.display()))?;
    println!("Output: {}", out_dir.display());
    save_run_metadata(&out_dir, &raw_args, &cfg)
        .unwrap_or_else(|e| eprintln!("Warning: Failed to save metadata: {e}"));

    let mut log = std::io::BufWriter::new(std::fs::File::create(out_dir.join("epochs.jsonl"))?);
    let mut last: Option<EpochSummary> = None;
    let mut failure = None;

    for result in Trainer::new(&mut filter, &cfg).epochs(train, validation) {
        match result {
            Ok(summary) => {
                match summary.val_loss {
                    Some(v) => println!(
                        "[{}/{}] train={:.5} val={:.5}",
                        summary.epoch, cfg.num_epochs, summary.train_loss, v
                    ),
                    None => println!("[{}/{}] train={:.5}", summary.epoch, cfg.num_epochs, summary.train_loss),
                }
                serde_json::to_writer(&mut log, &summary)?;
                writeln!(log)?;
                log.flush()?;
                last = Some(summary);
            }
            Err(e) => failure = Some(e),
        }
    }

    // Saved even after a failed epoch; batches applied before the failure are kept.
    let metadata = FilterMetadata {
        epochs: last.as_ref().map_or(0, |s| s.epoch),
        final_loss: last.as_ref().map(|s| s.train_loss),
        criterion: Some(cfg.criterion),
        dataset_path: pairs.display().to_string(),
        created: timestamp(OffsetDateTime::now_utc()),
    };
    let model_path = out_dir.join("model.json");
    save_filter(&model_path, &filter, &metadata)?;
    println!("Saved filter to {}", model_path.display());

    if let Some(e) = failure {
        return Err(e.into());
    }
    Ok(())
}
