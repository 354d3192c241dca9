use std::fs;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ml::dataset;
use crate::ml::forest::ForestRegressor;
use crate::paths::Paths;
use crate::taxonomy::{
    Angle, Background, Expression, ImageSettings, Lighting, Pose, ProductFeatures, Style,
};

/// Fixed confidence reported with every model prediction. The forest does
/// not estimate its own uncertainty; downstream consumers treat this as a
/// nominal weight, not a calibrated probability.
pub const PREDICTION_CONFIDENCE: f64 = 0.82;

#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error("no trained engagement model on disk; run retrain first")]
    ModelUnavailable,
    #[error("failed to load model artifacts: {0}")]
    LoadFailed(#[source] anyhow::Error),
}

/// A loaded model plus the column schema it was trained against. The two
/// artifacts are only ever read and written together.
#[derive(Debug)]
pub struct TrainedModel {
    pub forest: ForestRegressor,
    pub columns: Vec<String>,
}

struct StoreState {
    generation: u64,
    cached: Option<(u64, Arc<TrainedModel>)>,
}

/// Shared handle to the current engagement model.
///
/// The generation counter invalidates the in-memory copy: retraining bumps
/// it, so the next prediction reloads (or receives the freshly installed
/// model) instead of scoring against a stale cache.
pub struct ModelStore {
    state: RwLock<StoreState>,
}

impl ModelStore {
    pub fn new() -> Self {
        ModelStore {
            state: RwLock::new(StoreState {
                generation: 0,
                cached: None,
            }),
        }
    }

    /// Installs a freshly trained model under a new generation.
    pub fn install(&self, model: TrainedModel) {
        let mut state = self.state.write();
        state.generation += 1;
        state.cached = Some((state.generation, Arc::new(model)));
        debug!("installed engagement model, generation {}", state.generation);
    }

    /// Returns the current model, reloading from disk when the cached copy
    /// is missing or from an older generation.
    pub fn current(&self, paths: &Paths) -> Result<Arc<TrainedModel>, PredictorError> {
        {
            let state = self.state.read();
            if let Some((generation, model)) = &state.cached {
                if *generation == state.generation {
                    return Ok(model.clone());
                }
            }
        }

        if !paths.model_artifacts_exist() {
            return Err(PredictorError::ModelUnavailable);
        }

        let forest_bytes =
            fs::read(&paths.forest_model).map_err(|e| PredictorError::LoadFailed(e.into()))?;
        let column_bytes =
            fs::read(&paths.feature_columns).map_err(|e| PredictorError::LoadFailed(e.into()))?;
        let forest: ForestRegressor =
            bincode::deserialize(&forest_bytes).map_err(|e| PredictorError::LoadFailed(e.into()))?;
        let columns: Vec<String> =
            bincode::deserialize(&column_bytes).map_err(|e| PredictorError::LoadFailed(e.into()))?;

        let model = Arc::new(TrainedModel { forest, columns });
        let mut state = self.state.write();
        state.cached = Some((state.generation, model.clone()));
        info!("loaded engagement model from {}", paths.forest_model.display());
        Ok(model)
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        ModelStore::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub image_settings: ImageSettings,
    pub predicted_rate: f64,
    pub confidence: f64,
    pub reasoning: String,
}

fn first_candidate() -> ImageSettings {
    ImageSettings {
        style: Style::ALL[0],
        lighting: Lighting::ALL[0],
        background: Background::ALL[0],
        pose: Pose::ALL[0],
        expression: Expression::ALL[0],
        angle: Angle::ALL[0],
    }
}

/// Scores every settings combination for the product and returns the best.
///
/// Ties keep the earliest combination in enumeration order, so repeated
/// calls against the same model and features always agree.
pub fn best_settings(model: &TrainedModel, features: &ProductFeatures) -> (ImageSettings, f64) {
    let score = |settings: &ImageSettings| {
        let row = dataset::encode_candidate(features, settings, &model.columns);
        model.forest.predict(&row)
    };

    let seed = first_candidate();
    let mut best = (seed, score(&seed));
    for settings in ImageSettings::enumerate_all().skip(1) {
        let rate = score(&settings);
        if rate > best.1 {
            best = (settings, rate);
        }
    }
    best
}

/// Predicts the photography settings expected to maximize engagement.
pub struct Predictor {
    store: Arc<ModelStore>,
    paths: Paths,
}

impl Predictor {
    pub fn new(store: Arc<ModelStore>, paths: Paths) -> Self {
        Predictor { store, paths }
    }

    pub fn predict(&self, features: &ProductFeatures) -> Result<PredictionResult, PredictorError> {
        let model = self.store.current(&self.paths)?;
        let (image_settings, raw_rate) = best_settings(&model, features);
        let predicted_rate = raw_rate.clamp(0.0, 1.0);
        let combinations = ImageSettings::enumerate_all().count();

        debug!(
            "predicted settings for {} {}: {:.4} engagement",
            features.color, features.garment_type, predicted_rate
        );

        Ok(PredictionResult {
            image_settings,
            predicted_rate,
            confidence: PREDICTION_CONFIDENCE,
            reasoning: format!(
                "Highest predicted engagement ({predicted_rate:.4}) across {combinations} \
                 candidate setting combinations for this {} {} {}.",
                features.color, features.fit, features.garment_type
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::forest::ForestParams;
    use crate::taxonomy::{Color, Fit, GarmentType, Gender};

    fn features() -> ProductFeatures {
        ProductFeatures {
            garment_type: GarmentType::Hoodie,
            color: Color::Black,
            fit: Fit::Loose,
            gender: Gender::Male,
            composition: String::new(),
            art_nr: String::new(),
            image_ref: String::new(),
        }
    }

    fn settings_with_style(style: Style) -> ImageSettings {
        ImageSettings {
            style,
            lighting: Lighting::Studio,
            background: Background::StudioWhite,
            pose: Pose::Standing,
            expression: Expression::Neutral,
            angle: Angle::Front,
        }
    }

    fn fit_model(rows: &[(ImageSettings, f64)]) -> TrainedModel {
        let columns = dataset::feature_columns();
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..20 {
            for (settings, ctr) in rows {
                x.push(dataset::encode_candidate(&features(), settings, &columns));
                y.push(*ctr);
            }
        }
        let params = ForestParams {
            n_trees: 25,
            ..ForestParams::default()
        };
        let forest = ForestRegressor::fit(&x, &y, params).unwrap();
        TrainedModel { forest, columns }
    }

    #[test]
    fn constant_model_ties_break_to_first_enumerated_combination() {
        let rows: Vec<(ImageSettings, f64)> = Style::ALL
            .iter()
            .map(|&style| (settings_with_style(style), 0.05))
            .collect();
        let model = fit_model(&rows);
        let (best, rate) = best_settings(&model, &features());
        assert_eq!(best, first_candidate());
        assert!((rate - 0.05).abs() < 1e-9);
    }

    #[test]
    fn prefers_the_style_with_higher_observed_engagement() {
        let rows: Vec<(ImageSettings, f64)> = Style::ALL
            .iter()
            .map(|&style| {
                let ctr = if style == Style::Streetwear { 0.09 } else { 0.02 };
                (settings_with_style(style), ctr)
            })
            .collect();
        let model = fit_model(&rows);
        let (best, rate) = best_settings(&model, &features());
        assert_eq!(best.style, Style::Streetwear);
        assert!(rate > 0.05);
    }

    #[test]
    fn best_settings_is_deterministic() {
        let rows: Vec<(ImageSettings, f64)> = Style::ALL
            .iter()
            .enumerate()
            .map(|(i, &style)| (settings_with_style(style), 0.02 + i as f64 * 0.01))
            .collect();
        let model = fit_model(&rows);
        let a = best_settings(&model, &features());
        let b = best_settings(&model, &features());
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn missing_artifacts_surface_as_model_unavailable() {
        let store = ModelStore::new();
        let paths = Paths::new(std::path::Path::new("/nonexistent/model-store-test"));
        match store.current(&paths) {
            Err(PredictorError::ModelUnavailable) => {}
            other => panic!("expected ModelUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn installed_model_is_served_without_touching_disk() {
        let rows = vec![(settings_with_style(Style::Streetwear), 0.05)];
        let store = ModelStore::new();
        store.install(fit_model(&rows));
        let paths = Paths::new(std::path::Path::new("/nonexistent/model-store-test"));
        assert!(store.current(&paths).is_ok());
    }
}
