//! Shopify Admin API upload. Product creation is all-or-nothing; image
//! attachments after it are best-effort so one bad file never strands an
//! otherwise complete listing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::utils::http::get_http_client;

const API_VERSION: &str = "2024-01";
const VENDOR: &str = "Skejl AI";
const PRODUCT_TYPE: &str = "Apparel";
// Flat pacing between Admin API calls, same idea as the generation pauses.
const UPLOAD_PACING: Duration = Duration::from_millis(500);

pub type ProductId = u64;

/// Everything the storefront listing needs, assembled from the analysis
/// record by the pipeline.
#[derive(Debug, Clone)]
pub struct ProductListing {
    pub title: String,
    pub description: String,
    pub sku: String,
    pub tags: Vec<String>,
    pub price: String,
}

fn api_url(config: &Config, path: &str) -> String {
    format!(
        "https://{}.myshopify.com/admin/api/{API_VERSION}/{path}",
        config.shop_name
    )
}

fn alt_text(title: &str, image_path: &Path) -> String {
    let filename = image_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let view = if filename.contains("front") {
        "Front view"
    } else if filename.contains("side") {
        "Side view"
    } else if filename.contains("back") {
        "Back view"
    } else {
        "Product view"
    };
    format!("{title} - {view}")
}

async fn post_json(config: &Config, url: &str, body: Value) -> Result<Value> {
    let response = get_http_client()
        .post(url)
        .header("X-Shopify-Access-Token", &config.shop_access_token)
        .json(&body)
        .send()
        .await
        .context("Shopify request failed to send")?;
    tokio::time::sleep(UPLOAD_PACING).await;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        let detail: String = detail.chars().take(500).collect();
        return Err(anyhow!("Shopify API error {status}: {detail}"));
    }
    Ok(response.json().await?)
}

async fn create_product(config: &Config, listing: &ProductListing) -> Result<ProductId> {
    let body = json!({
        "product": {
            "title": listing.title,
            "body_html": listing.description,
            "vendor": VENDOR,
            "product_type": PRODUCT_TYPE,
            "tags": listing.tags.join(", "),
            "variants": [{
                "sku": listing.sku,
                "price": listing.price,
            }],
        }
    });

    let result = post_json(config, &api_url(config, "products.json"), body).await?;
    let product_id = result
        .pointer("/product/id")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("Shopify create-product response has no product id"))?;

    info!("created Shopify product '{}' (id {product_id})", listing.title);
    Ok(product_id)
}

async fn upload_image(
    config: &Config,
    product_id: ProductId,
    image_path: &Path,
    alt: &str,
) -> Result<()> {
    let bytes = tokio::fs::read(image_path)
        .await
        .with_context(|| format!("failed to read {}", image_path.display()))?;
    let body = json!({
        "image": {
            "attachment": general_purpose::STANDARD.encode(&bytes),
            "alt": alt,
        }
    });

    let path = format!("products/{product_id}/images.json");
    post_json(config, &api_url(config, &path), body).await?;
    info!("uploaded image: {alt}");
    Ok(())
}

/// Creates the product and attaches its images.
///
/// A create failure is the caller's problem; a single image failure is
/// logged and skipped.
pub async fn upload_product(
    config: &Config,
    listing: &ProductListing,
    images: &[PathBuf],
) -> Result<ProductId> {
    if config.shop_name.trim().is_empty() || config.shop_access_token.trim().is_empty() {
        return Err(anyhow!("SHOP_NAME and SHOP_ACCESS_TOKEN must be set to publish"));
    }

    let product_id = create_product(config, listing).await?;

    for image_path in images {
        let alt = alt_text(&listing.title, image_path);
        if let Err(err) = upload_image(config, product_id, image_path, &alt).await {
            warn!("skipping image {}: {err:#}", image_path.display());
        }
    }

    info!(
        "published https://{}.myshopify.com/admin/products/{product_id}",
        config.shop_name
    );
    Ok(product_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_text_identifies_the_view_from_the_filename() {
        let title = "Midnight Hoodie";
        assert_eq!(
            alt_text(title, Path::new("out/honda_generated_side.jpg")),
            "Midnight Hoodie - Side view"
        );
        assert_eq!(
            alt_text(title, Path::new("out/honda_generated_back.jpg")),
            "Midnight Hoodie - Back view"
        );
        assert_eq!(
            alt_text(title, Path::new("out/honda_generated.jpg")),
            "Midnight Hoodie - Product view"
        );
    }

    #[test]
    fn api_url_targets_the_configured_shop() {
        let mut config = Config::for_tests(std::path::PathBuf::from("/tmp"));
        config.shop_name = "test-shop".to_string();
        assert_eq!(
            api_url(&config, "products.json"),
            "https://test-shop.myshopify.com/admin/api/2024-01/products.json"
        );
    }

    #[tokio::test]
    async fn publishing_without_credentials_is_rejected() {
        let config = Config::for_tests(std::path::PathBuf::from("/tmp"));
        let listing = ProductListing {
            title: "T".to_string(),
            description: String::new(),
            sku: "S".to_string(),
            tags: vec![],
            price: "299.00".to_string(),
        };
        assert!(upload_product(&config, &listing, &[]).await.is_err());
    }
}
