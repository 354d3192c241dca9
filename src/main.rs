use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use tracing::info;

mod config;
mod debate;
mod llm;
mod ml;
mod paths;
mod pipeline;
mod prompts;
mod scenario;
mod shopify;
mod taxonomy;
mod utils;
mod vision;

use config::Config;
use llm::{GeminiClient, ImageComparator, ImageGenerator, LanguageModel};
use ml::feedback;
use ml::predictor::ModelStore;
use pipeline::product::ProductPipeline;
use utils::logging::init_logging;

enum Command {
    Batch,
    Product { image: PathBuf, hint: Option<String> },
    Refine { image: PathBuf, feedback: String },
    Publish { image: PathBuf },
    Retrain,
}

fn usage() -> &'static str {
    "Usage:\n  \
     garment_photo_studio batch\n  \
     garment_photo_studio product --image <path> [--hint <text>]\n  \
     garment_photo_studio refine <image> <feedback text...>\n  \
     garment_photo_studio publish <image>\n  \
     garment_photo_studio retrain"
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.get(1).map(|value| value.as_str()) {
        Some("batch") | None => Ok(Command::Batch),
        Some("product") => {
            let mut image: Option<PathBuf> = None;
            let mut hint: Option<String> = None;
            let mut index = 2;
            while index < args.len() {
                match args[index].as_str() {
                    "--image" => {
                        index += 1;
                        let value = args
                            .get(index)
                            .ok_or_else(|| anyhow!("Missing value for --image"))?;
                        image = Some(PathBuf::from(value));
                    }
                    "--hint" => {
                        index += 1;
                        let value = args
                            .get(index)
                            .ok_or_else(|| anyhow!("Missing value for --hint"))?;
                        hint = Some(value.clone());
                    }
                    "--help" | "-h" => return Err(anyhow!(usage())),
                    other => return Err(anyhow!("Unknown product argument: {other}\n{}", usage())),
                }
                index += 1;
            }
            let image = image.ok_or_else(|| anyhow!("--image is required"))?;
            Ok(Command::Product { image, hint })
        }
        Some("refine") => {
            let image = args
                .get(2)
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("refine needs an image path\n{}", usage()))?;
            let feedback = args[3..].join(" ");
            if feedback.trim().is_empty() {
                return Err(anyhow!("refine needs feedback text\n{}", usage()));
            }
            Ok(Command::Refine { image, feedback })
        }
        Some("publish") => {
            let image = args
                .get(2)
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("publish needs an image path\n{}", usage()))?;
            Ok(Command::Publish { image })
        }
        Some("retrain") => Ok(Command::Retrain),
        Some("--help") | Some("-h") => Err(anyhow!(usage())),
        Some(other) => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = std::env::args().collect();
    let command = parse_command(&args)?;

    let config = Config::from_env()?;
    let _guards = init_logging(&config.log_level);
    info!("Starting garment photo studio");

    let store = Arc::new(ModelStore::new());
    let gemini = Arc::new(GeminiClient::new(&config));
    let language: Arc<dyn LanguageModel> = gemini.clone();
    let generator: Arc<dyn ImageGenerator> = gemini.clone();
    let comparator: Arc<dyn ImageComparator> = gemini;

    let pipeline = ProductPipeline::new(config, language, generator, comparator, store.clone());

    match command {
        Command::Batch => {
            let results = pipeline.process_batch().await?;
            let accepted = results
                .iter()
                .filter(|result| result.generated_image_path.is_some())
                .count();
            info!(
                "Batch complete: {} products processed, {} with approved imagery",
                results.len(),
                accepted
            );
        }
        Command::Product { image, hint } => {
            let result = pipeline.process_product(&image, hint.as_deref()).await?;
            match &result.generated_image_path {
                Some(path) => info!("Product complete: {}", path.display()),
                None => info!(
                    "Product finished without an approved image: {}",
                    result.main_rejection.as_deref().unwrap_or("no detail")
                ),
            }
        }
        Command::Refine { image, feedback } => {
            pipeline.refine_product(&image, &feedback).await?;
        }
        Command::Publish { image } => {
            let product_id = pipeline.publish_product(&image).await?;
            info!("Published product {product_id}");
        }
        Command::Retrain => {
            let report = feedback::retrain(pipeline.paths(), &store)?;
            info!(
                "Retrain complete: {} samples, mae {:.4}, r2 {:.3}",
                report.n_samples, report.mae, report.r2
            );
        }
    }

    Ok(())
}
