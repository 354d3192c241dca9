use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::taxonomy::{
    Angle, Background, Color, Expression, Fit, GarmentType, Gender, ImageSettings, Lighting,
    Pose, ProductFeatures, Style,
};

/// One observed engagement outcome: the product features and photography
/// settings a published image used, plus its measured click-through rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub garment_type: GarmentType,
    pub color: Color,
    pub fit: Fit,
    pub gender: Gender,
    pub style: Style,
    pub lighting: Lighting,
    pub background: Background,
    pub pose: Pose,
    pub expression: Expression,
    pub angle: Angle,
    pub ctr: f64,
    pub impressions: u32,
}

impl TrainingSample {
    pub fn new(features: &ProductFeatures, settings: ImageSettings, ctr: f64, impressions: u32) -> Self {
        TrainingSample {
            garment_type: features.garment_type,
            color: features.color,
            fit: features.fit,
            gender: features.gender,
            style: settings.style,
            lighting: settings.lighting,
            background: settings.background,
            pose: settings.pose,
            expression: settings.expression,
            angle: settings.angle,
            ctr,
            impressions,
        }
    }

    fn active_columns(&self) -> Vec<String> {
        vec![
            column_name(GarmentType::FIELD, self.garment_type.as_str()),
            column_name(Color::FIELD, self.color.as_str()),
            column_name(Fit::FIELD, self.fit.as_str()),
            column_name(Gender::FIELD, self.gender.as_str()),
            column_name(Style::FIELD, self.style.as_str()),
            column_name(Lighting::FIELD, self.lighting.as_str()),
            column_name(Background::FIELD, self.background.as_str()),
            column_name(Pose::FIELD, self.pose.as_str()),
            column_name(Expression::FIELD, self.expression.as_str()),
            column_name(Angle::FIELD, self.angle.as_str()),
        ]
    }
}

fn column_name(field: &str, label: &str) -> String {
    format!("{field}_{label}")
}

/// The fixed one-hot schema: every vocabulary label becomes a column, in
/// vocabulary declaration order. Persisted alongside the model so encoding
/// at prediction time matches encoding at training time exactly.
pub fn feature_columns() -> Vec<String> {
    let mut columns = Vec::new();
    let mut extend = |field: &str, labels: &[&str]| {
        columns.extend(labels.iter().map(|label| column_name(field, label)));
    };
    extend(GarmentType::FIELD, GarmentType::ACCEPTED);
    extend(Color::FIELD, Color::ACCEPTED);
    extend(Fit::FIELD, Fit::ACCEPTED);
    extend(Gender::FIELD, Gender::ACCEPTED);
    extend(Style::FIELD, Style::ACCEPTED);
    extend(Lighting::FIELD, Lighting::ACCEPTED);
    extend(Background::FIELD, Background::ACCEPTED);
    extend(Pose::FIELD, Pose::ACCEPTED);
    extend(Expression::FIELD, Expression::ACCEPTED);
    extend(Angle::FIELD, Angle::ACCEPTED);
    columns
}

fn one_hot(active: &[String], columns: &[String]) -> Vec<f64> {
    columns
        .iter()
        .map(|column| if active.contains(column) { 1.0 } else { 0.0 })
        .collect()
}

/// Encodes a stored sample against the persisted column schema.
pub fn encode_sample(sample: &TrainingSample, columns: &[String]) -> Vec<f64> {
    one_hot(&sample.active_columns(), columns)
}

/// Encodes a prediction candidate: the product's fixed features combined
/// with one settings vector from the enumeration.
pub fn encode_candidate(
    features: &ProductFeatures,
    settings: &ImageSettings,
    columns: &[String],
) -> Vec<f64> {
    let active = vec![
        column_name(GarmentType::FIELD, features.garment_type.as_str()),
        column_name(Color::FIELD, features.color.as_str()),
        column_name(Fit::FIELD, features.fit.as_str()),
        column_name(Gender::FIELD, features.gender.as_str()),
        column_name(Style::FIELD, settings.style.as_str()),
        column_name(Lighting::FIELD, settings.lighting.as_str()),
        column_name(Background::FIELD, settings.background.as_str()),
        column_name(Pose::FIELD, settings.pose.as_str()),
        column_name(Expression::FIELD, settings.expression.as_str()),
        column_name(Angle::FIELD, settings.angle.as_str()),
    ];
    one_hot(&active, columns)
}

/// Reads the whole engagement corpus. The corpus is a single JSON array;
/// a missing file is an empty corpus, anything unreadable is an error.
pub fn read_corpus(path: &Path) -> anyhow::Result<Vec<TrainingSample>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read engagement corpus {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("engagement corpus {} is not valid JSON", path.display()))
}

/// Appends one sample by rewriting the whole array. The corpus stays small
/// enough that read-modify-write is the simplest correct update.
pub fn append_sample(path: &Path, sample: TrainingSample) -> anyhow::Result<()> {
    let mut samples = read_corpus(path)?;
    samples.push(sample);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(&samples)?;
    fs::write(path, body)
        .with_context(|| format!("failed to write engagement corpus {}", path.display()))?;
    Ok(())
}
