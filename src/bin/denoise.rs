//! denoise: apply a denoising model to micrographs
//!
//! Usage:
//!   denoise [--model none|gaussian|<filter.json>] [--patch-size N] [--padding N] -o <dir> <image>...

use anyhow::{bail, Context, Result};
use denoise_rs::config::DenoiseConfig;
use denoise_rs::core::standardize;
use denoise_rs::io::{load_micrograph, save_micrograph};
use denoise_rs::models::ModelKind;
use denoise_rs::TiledDenoiser;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::info;

fn value<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = args.next().with_context(|| format!("missing value for {flag}"))?;
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value '{raw}' for {flag}: {e}"))
}

fn print_help() {
    eprintln!("Usage:");
    eprintln!("  denoise [options] -o <output-dir> <image>...");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <json>     inference config; later flags override it");
    eprintln!("  --model NAME        none | gaussian | path to a saved filter (default none)");
    eprintln!("  --sigma F           Gaussian sigma for --model gaussian (default 1)");
    eprintln!("  --patch-size N      tile size; <= 0 denoises the whole image (default -1)");
    eprintln!("  --padding N         context pixels around each tile (default 128)");
    eprintln!("  --device NAME       cpu | parallel");
    eprintln!("  --normalize         standardize each image before denoising");
    eprintln!("  --format NAME       png8 | png16 (default png8)");
    eprintln!("  -o, --output DIR    output directory");
}

fn output_path(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    out_dir.join(format!("{stem}.png"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("denoise v{}", denoise_rs::VERSION);

    let raw_args: Vec<String> = std::env::args().skip(1).collect();

    let mut cfg = DenoiseConfig::default();
    if let Some(pos) = raw_args.iter().position(|a| a == "--config") {
        let path = raw_args
            .get(pos + 1)
            .context("missing value for --config")?;
        cfg = DenoiseConfig::from_json_file(Path::new(path))?;
    }

    let mut out_dir: Option<PathBuf> = None;
    let mut inputs: Vec<PathBuf> = Vec::new();

    let mut args = raw_args.into_iter();
    while let Some(a) = args.next() {
        match a.as_str() {
            "--config" => {
                args.next();
            }
            "--model" => cfg.model = value(&mut args, "--model")?,
            "--sigma" => cfg.sigma = value(&mut args, "--sigma")?,
            "--patch-size" => cfg.patch_size = value(&mut args, "--patch-size")?,
            "--padding" => cfg.padding = value(&mut args, "--padding")?,
            "--device" => cfg.device = value(&mut args, "--device")?,
            "--normalize" => cfg.normalize = true,
            "--format" => cfg.output_format = value(&mut args, "--format")?,
            "-o" | "--output" => out_dir = Some(value(&mut args, "--output")?),
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            flag if flag.starts_with('-') && flag != "-" => {
                print_help();
                bail!("unknown argument: {flag}");
            }
            path => inputs.push(PathBuf::from(path)),
        }
    }
    cfg.validate()?;

    let Some(out_dir) = out_dir else {
        print_help();
        bail!("an output directory is required (-o)");
    };
    if inputs.is_empty() {
        print_help();
        bail!("no input images given");
    }
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let model = ModelKind::from_config(&cfg)
        .with_context(|| format!("failed to load model '{}'", cfg.model))?;
    let engine = TiledDenoiser::new(cfg.patch_size, cfg.padding).with_device(cfg.device);
    info!(model = model.name(), patch_size = cfg.patch_size, padding = cfg.padding, "denoising");

    for input in &inputs {
        let start = Instant::now();
        let mut image = load_micrograph(input)?;
        if cfg.normalize {
            standardize(&mut image, 0.0);
        }

        let denoised = engine
            .apply(&model, &image)
            .with_context(|| format!("model failed on {}", input.display()))?;

        let out_path = output_path(&out_dir, input);
        save_micrograph(&out_path, &denoised, cfg.output_format)?;
        println!(
            "{} -> {} ({}x{}, {}, {:.2}s)",
            input.display(),
            out_path.display(),
            image.ncols(),
            image.nrows(),
            if engine.is_tiled(image.shape()) { "tiled" } else { "whole" },
            start.elapsed().as_secs_f32()
        );
    }

    Ok(())
}
