//! Product intake: catalog metadata lookup, feature extraction from the
//! garment photo, and storefront copy.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tokio::fs;

use crate::llm::{strip_code_fences, ImagePart, LanguageModel};
use crate::paths::Paths;
use crate::prompts;
use crate::taxonomy::ProductFeatures;

/// Extraction output: validated features plus the short product title and
/// the merged raw record the analysis file keeps.
#[derive(Debug, Clone)]
pub struct ExtractedProduct {
    pub features: ProductFeatures,
    pub title: String,
    pub raw: Value,
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Looks up the supplier metadata row for an input image by filename stem.
/// A product image without a catalog row is a configuration error, not
/// something to paper over with guessed features.
pub async fn load_product_metadata(paths: &Paths, image_path: &Path) -> Result<Value> {
    let stem = file_stem(image_path);
    let bytes = fs::read(&paths.products_json).await.with_context(|| {
        format!("failed to read product catalog {}", paths.products_json.display())
    })?;
    let products: Vec<Value> = serde_json::from_slice(&bytes).with_context(|| {
        format!("product catalog {} is not a JSON array", paths.products_json.display())
    })?;

    products
        .into_iter()
        .find(|product| {
            product
                .get("image")
                .and_then(Value::as_str)
                .map(|image| file_stem(Path::new(image)) == stem)
                .unwrap_or(false)
        })
        .ok_or_else(|| {
            anyhow!(
                "no product in {} matches image '{}'",
                paths.products_json.display(),
                stem
            )
        })
}

/// Extracts and validates product features for one input image.
///
/// The model sees the garment photo plus the catalog row; its reply is
/// merged over the catalog row (catalog values fill anything the model
/// omitted) and then normalized against the closed vocabularies.
pub async fn extract_features(
    model: &dyn LanguageModel,
    paths: &Paths,
    image_path: &Path,
) -> Result<ExtractedProduct> {
    let metadata = load_product_metadata(paths, image_path).await?;
    let image_bytes = fs::read(image_path)
        .await
        .with_context(|| format!("failed to read input image {}", image_path.display()))?;
    let reference = ImagePart::from_bytes(image_bytes);

    let prompt = prompts::feature_extraction(&metadata);
    let reply = model.complete_with_images(&[reference], &prompt).await?;
    let mut merged: Value = serde_json::from_str(strip_code_fences(&reply))
        .context("feature extraction reply is not valid JSON")?;

    if let (Some(target), Some(source)) = (merged.as_object_mut(), metadata.as_object()) {
        for (key, value) in source {
            target.entry(key.clone()).or_insert(value.clone());
        }
    }

    let features = ProductFeatures::normalize(&merged)?;
    let title = merged
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(ExtractedProduct {
        features,
        title,
        raw: merged,
    })
}

/// Writes the storefront description once the scenario is final.
pub async fn generate_description(
    model: &dyn LanguageModel,
    features: &ProductFeatures,
    scenario: &Value,
    brand_identity: &str,
) -> Result<String> {
    let prompt = prompts::description(features, scenario, brand_identity);
    let reply = model.complete(&prompt).await?;
    Ok(reply.trim().to_string())
}
