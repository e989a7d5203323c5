//! Files on disk through loading, training, saving and tiled inference.

use denoise_rs::config::TrainConfig;
use denoise_rs::core::mean_std;
use denoise_rs::data::{parse_pair_list, BatchLoader, PairedDataset};
use denoise_rs::io::{load_filter, save_filter, save_png16, FilterMetadata};
use denoise_rs::models::{load_model, AffineFilter, ModelKind};
use denoise_rs::{Denoiser, Image, TiledDenoiser, Trainer};
use std::path::Path;

fn write_pair(dir: &Path, name: &str, shift: f32) {
    let x1 = Image::from_fn(24, 20, |r, c| ((r * 20 + c) as f32 * 0.11).sin() + shift);
    let x2 = Image::from_fn(24, 20, |r, c| ((r * 20 + c) as f32 * 0.11).sin() - shift);
    save_png16(&dir.join(format!("{name}_a.png")), &x1).unwrap();
    save_png16(&dir.join(format!("{name}_b.png")), &x2).unwrap();
}

#[test]
fn test_pair_list_loads_standardized_images() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path(), "m0", 0.1);
    write_pair(dir.path(), "m1", 0.2);
    let list = "# x1 x2\nm0_a.png m0_b.png\n\nm1_a.png m1_b.png\n";

    let pairs = parse_pair_list(list, dir.path()).unwrap();
    assert_eq!(pairs.len(), 2);
    let dataset = PairedDataset::load(&pairs, 0.0).unwrap();
    assert_eq!(dataset.len(), 2);

    for s in dataset.samples() {
        assert_eq!(s.shape(), (24, 20));
        let (mean, std) = mean_std(s.x1());
        assert!(mean.abs() < 1e-4, "mean {mean}");
        assert!((std - 1.0).abs() < 1e-3, "std {std}");
    }
}

#[test]
fn test_mismatched_pair_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    save_png16(&dir.path().join("a.png"), &Image::from_fn(8, 8, |r, c| (r + c) as f32)).unwrap();
    save_png16(&dir.path().join("b.png"), &Image::from_fn(8, 9, |r, c| (r + c) as f32)).unwrap();
    let pairs = parse_pair_list("a.png b.png", dir.path()).unwrap();
    assert!(PairedDataset::load(&pairs, 0.0).is_err());
}

#[test]
fn test_pair_list_rejects_malformed_lines() {
    assert!(parse_pair_list("only_one.png\n", Path::new(".")).is_err());
    assert!(parse_pair_list("a.png b.png c.png\n", Path::new(".")).is_err());
}

#[test]
fn test_trained_filter_round_trips_into_tiled_inference() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path(), "m0", 0.05);
    let pairs = parse_pair_list("m0_a.png m0_b.png", dir.path()).unwrap();
    let dataset = PairedDataset::load(&pairs, 3.0).unwrap();

    let cfg = TrainConfig {
        num_epochs: 2,
        batch_size: 1,
        filter_size: 5,
        shuffle: false,
        ..TrainConfig::default()
    };
    let mut filter = AffineFilter::identity(cfg.filter_size);
    let last = Trainer::new(&mut filter, &cfg)
        .epochs(BatchLoader::new(dataset.clone(), cfg.batch_size), None)
        .last()
        .unwrap()
        .unwrap();

    let path = dir.path().join("model.json");
    let metadata = FilterMetadata {
        epochs: last.epoch,
        final_loss: Some(last.train_loss),
        ..FilterMetadata::default()
    };
    save_filter(&path, &filter, &metadata).unwrap();

    let (loaded, meta) = load_filter(&path).unwrap();
    assert_eq!(loaded.weights(), filter.weights());
    assert_eq!(loaded.bias(), filter.bias());
    assert_eq!(meta.epochs, 2);

    let model = load_model(path.to_str().unwrap()).unwrap();
    assert!(matches!(model, ModelKind::Affine(_)));

    // A 5x5 filter needs 2 pixels of context.
    let x = dataset.samples()[0].x1();
    let whole = model.forward(x);
    let tiled = TiledDenoiser::new(7, 2).apply(&model, x).unwrap();
    for (a, b) in tiled.iter().zip(whole.iter()) {
        assert!((a - b).abs() < 1e-5);
    }
}
