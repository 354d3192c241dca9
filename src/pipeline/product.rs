//! Product orchestration: intake, prediction, debate, scenario, the main
//! generate/validate loop, variants, analysis record, publish and batch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::config::Config;
use crate::debate::{self, ConsensusResult, DebateTranscript};
use crate::llm::{ImageComparator, ImageGenerator, ImagePart, LanguageModel};
use crate::ml::feedback;
use crate::ml::predictor::{ModelStore, PredictionResult, Predictor};
use crate::paths::Paths;
use crate::pipeline::view::{run_view, View, ViewOutcome, ViewRequest};
use crate::prompts;
use crate::scenario;
use crate::shopify;
use crate::taxonomy::ProductFeatures;
use crate::vision;

/// The full analysis record for one product, persisted as
/// `<stem>_analysis.json` next to the generated images.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductResult {
    pub image: String,
    pub title: String,
    pub features: Option<ProductFeatures>,
    pub description: String,
    pub photography_scenario: Option<Value>,
    pub prediction: Option<PredictionResult>,
    pub consensus: Option<ConsensusResult>,
    pub debate_transcript: Option<DebateTranscript>,
    pub generated_image_path: Option<PathBuf>,
    pub variant_paths: BTreeMap<String, PathBuf>,
    pub main_rejection: Option<String>,
}

pub struct ProductPipeline {
    config: Config,
    paths: Paths,
    language: Arc<dyn LanguageModel>,
    generator: Arc<dyn ImageGenerator>,
    comparator: Arc<dyn ImageComparator>,
    store: Arc<ModelStore>,
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn is_variant_stem(stem: &str) -> bool {
    stem.ends_with("_back") || stem.ends_with("_side")
}

impl ProductPipeline {
    pub fn new(
        config: Config,
        language: Arc<dyn LanguageModel>,
        generator: Arc<dyn ImageGenerator>,
        comparator: Arc<dyn ImageComparator>,
        store: Arc<ModelStore>,
    ) -> Self {
        let paths = Paths::new(&config.data_dir);
        ProductPipeline {
            config,
            paths,
            language,
            generator,
            comparator,
            store,
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    fn analysis_path(&self, stem: &str) -> PathBuf {
        self.paths.output_dir.join(format!("{stem}_analysis.json"))
    }

    /// Discovers all reference photos for a product by filename convention:
    /// `stem.jpg` always, plus `stem_back.jpg` / `stem_side.jpg` if present.
    fn find_product_images(&self, image_path: &Path) -> Vec<PathBuf> {
        let stem = stem_of(image_path);
        let extension = image_path
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_else(|| "jpg".to_string());
        let parent = image_path.parent().unwrap_or_else(|| Path::new("."));

        let mut found = vec![image_path.to_path_buf()];
        for suffix in ["_back", "_side"] {
            let candidate = parent.join(format!("{stem}{suffix}.{extension}"));
            if candidate.exists() {
                found.push(candidate);
            }
        }
        found
    }

    async fn load_parts(&self, paths: &[PathBuf]) -> Result<Vec<ImagePart>> {
        let mut parts = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = fs::read(path)
                .await
                .with_context(|| format!("failed to read reference image {}", path.display()))?;
            parts.push(ImagePart::from_bytes(bytes));
        }
        Ok(parts)
    }

    async fn write_analysis(&self, stem: &str, result: &ProductResult) -> Result<()> {
        let path = self.analysis_path(stem);
        let body = serde_json::to_vec_pretty(result)?;
        fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("analysis saved: {}", path.display());
        Ok(())
    }

    async fn load_analysis(&self, stem: &str) -> Result<ProductResult> {
        let path = self.analysis_path(stem);
        let bytes = fs::read(&path)
            .await
            .with_context(|| format!("no analysis record at {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("analysis record {} is unreadable", path.display()))
    }

    /// Runs the full pipeline for one input image.
    ///
    /// Intake failures (catalog miss, missing model, unreadable image) are
    /// errors; a main view that never validates is a reported outcome, with
    /// the analysis record still written.
    pub async fn process_product(
        &self,
        image_path: &Path,
        user_guidance: Option<&str>,
    ) -> Result<ProductResult> {
        self.paths.ensure_directories()?;
        let stem = stem_of(image_path);
        info!("processing product '{stem}'");

        let extracted =
            vision::extract_features(self.language.as_ref(), &self.paths, image_path).await?;
        info!(
            "features: {} ({}, {}, {})",
            extracted.features.garment_type,
            extracted.features.color,
            extracted.features.fit,
            extracted.features.gender
        );
        tokio::time::sleep(self.config.rate_limit_delay()).await;

        let predictor = Predictor::new(self.store.clone(), self.paths.clone());
        let prediction = predictor.predict(&extracted.features)?;
        info!(
            "predicted engagement {:.2}% with {} / {}",
            prediction.predicted_rate * 100.0,
            prediction.image_settings.style,
            prediction.image_settings.lighting
        );

        let debate_outcome = debate::resolve_consensus(
            self.language.as_ref(),
            &prediction,
            &extracted.features,
            &self.config.brand_identity,
            self.config.rate_limit_delay(),
        )
        .await;
        tokio::time::sleep(self.config.rate_limit_delay()).await;

        let settings = debate_outcome.consensus.final_image_settings;
        let scenario_doc = scenario::render_scenario(&settings, &extracted.features, user_guidance);

        let description = match vision::generate_description(
            self.language.as_ref(),
            &extracted.features,
            &scenario_doc,
            &self.config.brand_identity,
        )
        .await
        {
            Ok(text) => text,
            Err(err) => {
                warn!("description generation failed, continuing without: {err:#}");
                String::new()
            }
        };
        tokio::time::sleep(self.config.rate_limit_delay()).await;

        let mut result = ProductResult {
            image: image_path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
            title: extracted.title.clone(),
            features: Some(extracted.features.clone()),
            description,
            photography_scenario: Some(scenario_doc.clone()),
            prediction: Some(prediction),
            consensus: Some(debate_outcome.consensus),
            debate_transcript: Some(debate_outcome.transcript),
            ..ProductResult::default()
        };

        let original = self.load_parts(&[image_path.to_path_buf()]).await?;
        let generation_prompt =
            prompts::image_generation(&scenario_doc, &settings, extracted.features.gender);
        let validation_prompt = prompts::validation(&extracted.features);

        let outcome = run_view(
            self.generator.as_ref(),
            self.comparator.as_ref(),
            ViewRequest {
                view: View::Main,
                generation_prompt: &generation_prompt,
                validation_prompt: &validation_prompt,
                generation_references: &original,
                validation_references: &original,
                max_attempts: self.config.max_generation_attempts,
                pause: self.config.rate_limit_delay(),
            },
        )
        .await;

        match outcome {
            ViewOutcome::Accepted { bytes, .. } => {
                let main_path = self.paths.output_dir.join(format!("{stem}_generated.jpg"));
                fs::write(&main_path, &bytes)
                    .await
                    .with_context(|| format!("failed to write {}", main_path.display()))?;
                info!("main view saved: {}", main_path.display());
                result.generated_image_path = Some(main_path);
                result.variant_paths = self
                    .generate_variants(image_path, &stem, &extracted.features, &bytes)
                    .await?;
            }
            ViewOutcome::Abandoned { attempts, last_rejection } => {
                warn!("'{stem}' abandoned after {attempts} main attempts");
                result.main_rejection = Some(last_rejection);
            }
        }

        self.write_analysis(&stem, &result).await?;

        if self.config.upload_to_shop && result.generated_image_path.is_some() {
            match self.publish(&result, &stem).await {
                Ok(product_id) => info!("'{stem}' auto-published as product {product_id}"),
                Err(err) => warn!("auto-publish for '{stem}' failed: {err:#}"),
            }
        }

        Ok(result)
    }

    /// Side and back variants, each with its own attempt budget. A failed
    /// variant leaves a gap in the listing; it never fails the product.
    async fn generate_variants(
        &self,
        image_path: &Path,
        stem: &str,
        features: &ProductFeatures,
        main_bytes: &[u8],
    ) -> Result<BTreeMap<String, PathBuf>> {
        let original_paths = self.find_product_images(image_path);
        let original_parts = self.load_parts(&original_paths).await?;
        let main_part = ImagePart::from_bytes(main_bytes.to_vec());

        let mut variant_paths = BTreeMap::new();
        for view in [View::Side, View::Back] {
            let generation_prompt = prompts::variant(view.angle(), original_paths.len());
            let validation_prompt = prompts::variant_validation(features, view.angle());

            // Garment references first, accepted scene last.
            let mut generation_references = original_parts.clone();
            generation_references.push(main_part.clone());

            let outcome = run_view(
                self.generator.as_ref(),
                self.comparator.as_ref(),
                ViewRequest {
                    view,
                    generation_prompt: &generation_prompt,
                    validation_prompt: &validation_prompt,
                    generation_references: &generation_references,
                    validation_references: &original_parts,
                    max_attempts: self.config.max_variant_attempts,
                    pause: self.config.rate_limit_delay(),
                },
            )
            .await;

            match outcome {
                ViewOutcome::Accepted { bytes, .. } => {
                    let path = self
                        .paths
                        .output_dir
                        .join(format!("{stem}_generated_{view}.jpg"));
                    fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("{view} view saved: {}", path.display());
                    variant_paths.insert(view.as_str().to_string(), path);
                }
                ViewOutcome::Abandoned { attempts, .. } => {
                    warn!("{view} view abandoned after {attempts} attempts");
                }
            }
        }
        Ok(variant_paths)
    }

    /// Edits the accepted main image from free-text feedback and regenerates
    /// the variants from the refined scene. Requires a prior successful run.
    pub async fn refine_product(&self, image_path: &Path, feedback_text: &str) -> Result<ProductResult> {
        let stem = stem_of(image_path);
        let mut result = self.load_analysis(&stem).await?;

        let main_path = result
            .generated_image_path
            .clone()
            .ok_or_else(|| anyhow!("'{stem}' has no generated image to refine"))?;
        let features = result
            .features
            .clone()
            .ok_or_else(|| anyhow!("analysis record for '{stem}' has no features"))?;

        info!("refining '{stem}': {feedback_text}");
        let current = self.load_parts(&[main_path.clone()]).await?;
        let original = self.load_parts(&[image_path.to_path_buf()]).await?;

        let generation_prompt = prompts::refinement_edit(feedback_text);
        let validation_prompt = prompts::validation(&features);

        let outcome = run_view(
            self.generator.as_ref(),
            self.comparator.as_ref(),
            ViewRequest {
                view: View::Main,
                generation_prompt: &generation_prompt,
                validation_prompt: &validation_prompt,
                generation_references: &current,
                validation_references: &original,
                max_attempts: self.config.max_generation_attempts,
                pause: self.config.rate_limit_delay(),
            },
        )
        .await;

        match outcome {
            ViewOutcome::Accepted { bytes, .. } => {
                fs::write(&main_path, &bytes)
                    .await
                    .with_context(|| format!("failed to write {}", main_path.display()))?;
                result.variant_paths = self
                    .generate_variants(image_path, &stem, &features, &bytes)
                    .await?;
                result.main_rejection = None;
                self.write_analysis(&stem, &result).await?;
                info!("refinement of '{stem}' complete");
            }
            ViewOutcome::Abandoned { attempts, .. } => {
                warn!(
                    "refinement of '{stem}' abandoned after {attempts} attempts, keeping current image"
                );
            }
        }

        Ok(result)
    }

    /// Publishes a previously processed product and records the feedback
    /// sample on success.
    pub async fn publish_product(&self, image_path: &Path) -> Result<shopify::ProductId> {
        let stem = stem_of(image_path);
        let result = self.load_analysis(&stem).await?;
        if result.generated_image_path.is_none() {
            return Err(anyhow!("'{stem}' has no approved image; nothing to publish"));
        }
        self.publish(&result, &stem).await
    }

    async fn publish(&self, result: &ProductResult, stem: &str) -> Result<shopify::ProductId> {
        let mut images: Vec<PathBuf> = Vec::new();
        if let Some(main) = &result.generated_image_path {
            if main.exists() {
                images.push(main.clone());
            }
        }
        for path in result.variant_paths.values() {
            if path.exists() {
                images.push(path.clone());
            }
        }
        if images.is_empty() {
            return Err(anyhow!("no generated images on disk for '{stem}'"));
        }

        let features = result.features.as_ref();
        let sku = features
            .map(|f| f.art_nr.clone())
            .filter(|sku| !sku.is_empty())
            .unwrap_or_else(|| format!("AI-{}", stem.to_uppercase()));
        let mut tags: Vec<String> = Vec::new();
        if let Some(f) = features {
            tags.push(f.garment_type.to_string());
            tags.push(f.gender.to_string());
            tags.push(f.color.to_string());
            tags.push(f.fit.to_string());
        }
        tags.push("ai-generated".to_string());

        let listing = shopify::ProductListing {
            title: if result.title.is_empty() {
                "AI Generated Product".to_string()
            } else {
                result.title.clone()
            },
            description: result.description.clone(),
            sku,
            tags,
            price: self.config.shop_default_price.clone(),
        };

        let product_id = shopify::upload_product(&self.config, &listing, &images).await?;

        if feedback::record_published_product(result, &self.paths).is_some() {
            info!(
                "feedback sample recorded; corpus now holds {} samples",
                feedback::dataset_len(&self.paths)
            );
        }

        Ok(product_id)
    }

    /// Processes every non-variant image in the input directory. One bad
    /// product is logged and skipped; the batch carries on.
    pub async fn process_batch(&self) -> Result<Vec<ProductResult>> {
        self.paths.ensure_directories()?;

        let mut images: Vec<PathBuf> = std::fs::read_dir(&self.paths.input_dir)
            .with_context(|| format!("failed to list {}", self.paths.input_dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("jpg") | Some("png")
                ) && !is_variant_stem(&stem_of(path))
            })
            .collect();
        images.sort();

        if images.is_empty() {
            warn!("no product images found in {}", self.paths.input_dir.display());
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for (index, image_path) in images.iter().enumerate() {
            info!("[{}/{}] {}", index + 1, images.len(), image_path.display());
            match self.process_product(image_path, None).await {
                Ok(result) => results.push(result),
                Err(err) => warn!("skipping {}: {err:#}", image_path.display()),
            }
            if index + 1 < images.len() {
                tokio::time::sleep(self.config.processing_delay()).await;
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationOutcome;
    use crate::ml::dataset;
    use crate::ml::forest::{ForestParams, ForestRegressor};
    use crate::ml::predictor::TrainedModel;
    use crate::taxonomy::{
        Angle, Background, Color, Expression, Fit, GarmentType, Gender, ImageSettings, Lighting,
        Pose, Style,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 10, 10]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    struct ScriptedLanguage {
        replies: Mutex<VecDeque<String>>,
    }

    #[async_trait]
    impl LanguageModel for ScriptedLanguage {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.next()
        }

        async fn complete_with_images(
            &self,
            _references: &[ImagePart],
            _prompt: &str,
        ) -> Result<String> {
            self.next()
        }
    }

    impl ScriptedLanguage {
        fn new(replies: Vec<String>) -> Self {
            ScriptedLanguage {
                replies: Mutex::new(replies.into()),
            }
        }

        fn next(&self) -> Result<String> {
            self.replies
                .lock()
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted reply left"))
        }
    }

    struct StubGenerator {
        produce_images: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageGenerator for StubGenerator {
        async fn generate(
            &self,
            _references: &[ImagePart],
            _prompt: &str,
        ) -> Result<GenerationOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.produce_images {
                Ok(GenerationOutcome::Image(png_bytes(800, 1000)))
            } else {
                Ok(GenerationOutcome::Empty)
            }
        }
    }

    struct StubComparator {
        approve: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImageComparator for StubComparator {
        async fn compare(
            &self,
            _references: &[ImagePart],
            _candidate: &ImagePart,
            _prompt: &str,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.approve {
                Ok("APPROVED\nconsistent".to_string())
            } else {
                Ok("REJECTED\nwrong color".to_string())
            }
        }
    }

    fn temp_data_dir(name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            name,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        std::env::temp_dir().join(unique)
    }

    fn trained_store() -> Arc<ModelStore> {
        let columns = dataset::feature_columns();
        let settings = ImageSettings {
            style: Style::Streetwear,
            lighting: Lighting::Dramatic,
            background: Background::UrbanStreet,
            pose: Pose::Dynamic,
            expression: Expression::Confident,
            angle: Angle::Front,
        };
        let features = ProductFeatures {
            garment_type: GarmentType::Hoodie,
            color: Color::Black,
            fit: Fit::Loose,
            gender: Gender::Male,
            composition: String::new(),
            art_nr: String::new(),
            image_ref: String::new(),
        };
        let row = dataset::encode_candidate(&features, &settings, &columns);
        let x = vec![row.clone(), row];
        let y = vec![0.05, 0.05];
        let forest = ForestRegressor::fit(
            &x,
            &y,
            ForestParams {
                n_trees: 5,
                ..ForestParams::default()
            },
        )
        .unwrap();

        let store = Arc::new(ModelStore::new());
        store.install(TrainedModel { forest, columns });
        store
    }

    fn seed_input(paths: &Paths) -> PathBuf {
        paths.ensure_directories().unwrap();
        let catalog = json!([
            {
                "image": "honda.jpg",
                "art_nr": "HD-001",
                "color": "black",
                "fit": "Loose fit",
                "gender": "male",
                "composition": {"Shell": "100% Cotton"}
            }
        ]);
        std::fs::write(
            &paths.products_json,
            serde_json::to_vec_pretty(&catalog).unwrap(),
        )
        .unwrap();
        let image_path = paths.input_dir.join("honda.jpg");
        std::fs::write(&image_path, png_bytes(800, 1000)).unwrap();
        image_path
    }

    fn extraction_reply() -> String {
        "{\"garment_type\": \"hoodie\", \"title\": \"Midnight Hoodie\"}".to_string()
    }

    fn moderator_reply() -> String {
        json!({
            "final_image_settings": {
                "style": "streetwear",
                "lighting": "dramatic",
                "background": "urban_street",
                "pose": "dynamic",
                "expression": "confident",
                "angle": "front"
            },
            "reasoning": "street fits the brand",
            "consensus_type": "hybrid_approach"
        })
        .to_string()
    }

    fn full_script() -> Vec<String> {
        vec![
            extraction_reply(),
            "studio converts best".to_string(),
            "street fits the brand".to_string(),
            moderator_reply(),
            "A clean black hoodie for the city.".to_string(),
        ]
    }

    fn pipeline(
        data_dir: PathBuf,
        produce_images: bool,
        approve: bool,
    ) -> (ProductPipeline, Arc<StubGenerator>, Arc<StubComparator>) {
        let generator = Arc::new(StubGenerator {
            produce_images,
            calls: AtomicUsize::new(0),
        });
        let comparator = Arc::new(StubComparator {
            approve,
            calls: AtomicUsize::new(0),
        });
        let pipeline = ProductPipeline::new(
            Config::for_tests(data_dir),
            Arc::new(ScriptedLanguage::new(full_script())),
            generator.clone(),
            comparator.clone(),
            trained_store(),
        );
        (pipeline, generator, comparator)
    }

    #[tokio::test]
    async fn happy_path_produces_main_view_both_variants_and_analysis() {
        let data_dir = temp_data_dir("pipeline-happy");
        let (pipeline, _, _) = pipeline(data_dir, true, true);
        let image_path = seed_input(pipeline.paths());

        let result = pipeline.process_product(&image_path, None).await.unwrap();

        assert_eq!(result.title, "Midnight Hoodie");
        assert!(result.description.contains("black hoodie"));
        assert_eq!(
            result.consensus.as_ref().unwrap().final_image_settings.style,
            Style::Streetwear
        );
        let main = result.generated_image_path.as_ref().unwrap();
        assert!(main.exists());
        assert_eq!(result.variant_paths.len(), 2);
        assert!(result.variant_paths["side"].exists());
        assert!(result.variant_paths["back"].exists());
        assert!(result.main_rejection.is_none());

        let analysis: ProductResult = serde_json::from_slice(
            &std::fs::read(pipeline.analysis_path("honda")).unwrap(),
        )
        .unwrap();
        assert_eq!(analysis.title, "Midnight Hoodie");
    }

    #[tokio::test]
    async fn abandoned_main_short_circuits_variants() {
        let data_dir = temp_data_dir("pipeline-abandon");
        let (pipeline, generator, comparator) = pipeline(data_dir, false, true);
        let image_path = seed_input(pipeline.paths());

        let result = pipeline.process_product(&image_path, None).await.unwrap();

        assert!(result.generated_image_path.is_none());
        assert!(result.variant_paths.is_empty());
        assert!(result.main_rejection.is_some());
        // Exactly the main budget; zero variant generations, zero validations.
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(comparator.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.analysis_path("honda").exists());
    }

    #[tokio::test]
    async fn always_rejecting_comparator_leaves_no_image() {
        let data_dir = temp_data_dir("pipeline-reject");
        let (pipeline, generator, _) = pipeline(data_dir, true, false);
        let image_path = seed_input(pipeline.paths());

        let result = pipeline.process_product(&image_path, None).await.unwrap();

        assert!(result.generated_image_path.is_none());
        assert!(result
            .main_rejection
            .as_ref()
            .unwrap()
            .contains("wrong color"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn variant_references_include_extra_product_photos() {
        let data_dir = temp_data_dir("pipeline-refs");
        let (pipeline, _, _) = pipeline(data_dir, true, true);
        let image_path = seed_input(pipeline.paths());
        std::fs::write(
            pipeline.paths().input_dir.join("honda_back.jpg"),
            png_bytes(800, 1000),
        )
        .unwrap();

        let found = pipeline.find_product_images(&image_path);
        assert_eq!(found.len(), 2);
        assert!(found[1].ends_with("honda_back.jpg"));
    }

    #[tokio::test]
    async fn batch_skips_variant_stems() {
        let data_dir = temp_data_dir("pipeline-batch");
        let (pipeline, generator, _) = pipeline(data_dir, false, true);
        seed_input(pipeline.paths());
        std::fs::write(
            pipeline.paths().input_dir.join("honda_side.jpg"),
            png_bytes(800, 1000),
        )
        .unwrap();

        let results = pipeline.process_batch().await.unwrap();
        // honda_side.jpg is a reference photo, not a product of its own.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].image, "honda.jpg");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }
}
