//! Feedback loop: publishing a product records an engagement sample, and
//! retraining rebuilds the forest from the accumulated corpus.
//!
//! No ad platform is wired in yet, so the measured click-through rate is
//! simulated as noise around the predicted rate. The data path is the real
//! one either way; only the measurement is synthetic.

use std::fs;

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{info, warn};

use crate::ml::dataset::{self, TrainingSample};
use crate::ml::forest::{ForestParams, ForestRegressor};
use crate::ml::predictor::{ModelStore, TrainedModel};
use crate::paths::Paths;
use crate::pipeline::product::ProductResult;

/// Predicted rate to simulate around when the analysis record predates the
/// trained model.
const DEFAULT_PREDICTED_RATE: f64 = 0.045;
const CTR_NOISE_STD: f64 = 0.004;
const CTR_FLOOR: f64 = 0.01;
const CTR_CEILING: f64 = 0.12;
const MIN_RETRAIN_SAMPLES: usize = 5;
const SPLIT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy)]
pub struct RetrainReport {
    pub n_samples: usize,
    pub mae: f64,
    pub r2: f64,
}

fn simulate_ctr(predicted: f64, rng: &mut impl Rng) -> f64 {
    let noise = Normal::new(0.0, CTR_NOISE_STD)
        .map(|dist| dist.sample(rng))
        .unwrap_or(0.0);
    let ctr = (predicted + noise).clamp(CTR_FLOOR, CTR_CEILING);
    (ctr * 10_000.0).round() / 10_000.0
}

/// Appends an engagement sample for a just-published product.
///
/// The settings preference order matters: the consensus settings are what
/// the image was actually rendered with, so they win over the raw
/// prediction. Recording is best-effort; a failure never undoes a publish.
pub fn record_published_product(result: &ProductResult, paths: &Paths) -> Option<TrainingSample> {
    let features = result.features.as_ref()?;
    let settings = result
        .consensus
        .as_ref()
        .map(|c| c.final_image_settings)
        .or_else(|| result.prediction.as_ref().map(|p| p.image_settings))?;
    let predicted = result
        .prediction
        .as_ref()
        .map(|p| p.predicted_rate)
        .unwrap_or(DEFAULT_PREDICTED_RATE);

    let mut rng = rand::thread_rng();
    let ctr = simulate_ctr(predicted, &mut rng);
    let impressions = rng.gen_range(500..=5000);
    let sample = TrainingSample::new(features, settings, ctr, impressions);

    match dataset::append_sample(&paths.ctr_dataset, sample.clone()) {
        Ok(()) => {
            info!(
                "recorded engagement sample: ctr {:.4} over {} impressions",
                ctr, impressions
            );
            Some(sample)
        }
        Err(err) => {
            warn!("failed to record engagement sample: {err:#}");
            None
        }
    }
}

pub fn dataset_len(paths: &Paths) -> usize {
    dataset::read_corpus(&paths.ctr_dataset)
        .map(|samples| samples.len())
        .unwrap_or(0)
}

fn write_artifact(path: &std::path::Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("bin.tmp");
    fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

/// Retrains the engagement forest from the full corpus and installs the new
/// model. Holds out a fifth of the corpus (at least one sample) to report
/// test-set error.
pub fn retrain(paths: &Paths, store: &ModelStore) -> Result<RetrainReport> {
    let samples = dataset::read_corpus(&paths.ctr_dataset)?;
    if samples.len() < MIN_RETRAIN_SAMPLES {
        return Err(anyhow!(
            "engagement corpus has {} samples, need at least {MIN_RETRAIN_SAMPLES}",
            samples.len()
        ));
    }

    let columns = dataset::feature_columns();
    let mut indices: Vec<usize> = (0..samples.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(SPLIT_SEED));
    let n_test = (samples.len() / 5).max(1);
    let (test_idx, train_idx) = indices.split_at(n_test);

    let encode = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<f64>) {
        let x = idx
            .iter()
            .map(|&i| dataset::encode_sample(&samples[i], &columns))
            .collect();
        let y = idx.iter().map(|&i| samples[i].ctr).collect();
        (x, y)
    };
    let (train_x, train_y) = encode(train_idx);
    let (test_x, test_y) = encode(test_idx);

    let forest = ForestRegressor::fit(&train_x, &train_y, ForestParams::default())?;

    let predictions: Vec<f64> = test_x.iter().map(|row| forest.predict(row)).collect();
    let n = test_y.len() as f64;
    let mae = predictions
        .iter()
        .zip(&test_y)
        .map(|(p, y)| (p - y).abs())
        .sum::<f64>()
        / n;
    let mean = test_y.iter().sum::<f64>() / n;
    let ss_res: f64 = predictions
        .iter()
        .zip(&test_y)
        .map(|(p, y)| (y - p) * (y - p))
        .sum();
    let ss_tot: f64 = test_y.iter().map(|y| (y - mean) * (y - mean)).sum();
    let r2 = if ss_tot > 1e-12 { 1.0 - ss_res / ss_tot } else { 0.0 };

    paths.ensure_directories()?;
    write_artifact(&paths.forest_model, &bincode::serialize(&forest)?)?;
    write_artifact(&paths.feature_columns, &bincode::serialize(&columns)?)?;
    store.install(TrainedModel { forest, columns });

    let report = RetrainReport {
        n_samples: samples.len(),
        mae,
        r2,
    };
    info!(
        "retrained on {} samples: mae {:.4}, r2 {:.3}",
        report.n_samples, report.mae, report.r2
    );
    Ok(report)
}
