use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

/// Runtime configuration, loaded once from the environment and passed by
/// reference into the pipeline entry points. A session that needs different
/// knobs constructs a new value; nothing here is mutated in place.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_image_model: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub brand_identity: String,
    pub max_generation_attempts: u32,
    pub max_variant_attempts: u32,
    pub rate_limit_delay_secs: u64,
    pub processing_delay_secs: u64,
    pub upload_to_shop: bool,
    pub shop_name: String,
    pub shop_access_token: String,
    pub shop_default_price: String,
    pub data_dir: PathBuf,
}

const DEFAULT_BRAND_IDENTITY: &str = "A modern, minimalist streetwear brand. Clean, \
confident imagery with an urban edge; never cluttered, never generic catalog shots.";

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
        if gemini_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("GEMINI_API_KEY is required"));
        }

        Ok(Config {
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            gemini_api_key,
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.5-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-3-pro-image-preview"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 2048),
            brand_identity: env_string("BRAND_IDENTITY", DEFAULT_BRAND_IDENTITY),
            max_generation_attempts: env_u32("MAX_GENERATION_ATTEMPTS", 2).max(1),
            max_variant_attempts: env_u32("MAX_VARIANT_ATTEMPTS", 2).max(1),
            rate_limit_delay_secs: env_u64("RATE_LIMIT_DELAY_SECONDS", 3),
            processing_delay_secs: env_u64("PROCESSING_DELAY_SECONDS", 5),
            upload_to_shop: env_bool("UPLOAD_TO_SHOP", false),
            shop_name: env_string("SHOP_NAME", ""),
            shop_access_token: env_string("SHOP_ACCESS_TOKEN", ""),
            shop_default_price: env_string("SHOP_DEFAULT_PRICE", "299.00"),
            data_dir: PathBuf::from(env_string("DATA_DIR", "data")),
        })
    }

    /// Flat pause enforced after every external API call. Deliberately not a
    /// backoff: upstream rate limits are paced, not probed.
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit_delay_secs)
    }

    pub fn processing_delay(&self) -> Duration {
        Duration::from_secs(self.processing_delay_secs)
    }
}

#[cfg(test)]
impl Config {
    /// Config for tests: no network credentials, zero delays so retry loops
    /// run instantly.
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Config {
            log_level: "info".to_string(),
            gemini_api_key: "test-key".to_string(),
            gemini_model: "test-model".to_string(),
            gemini_image_model: "test-image-model".to_string(),
            gemini_temperature: 0.7,
            gemini_top_k: 40,
            gemini_top_p: 0.95,
            gemini_max_output_tokens: 2048,
            brand_identity: DEFAULT_BRAND_IDENTITY.to_string(),
            max_generation_attempts: 2,
            max_variant_attempts: 2,
            rate_limit_delay_secs: 0,
            processing_delay_secs: 0,
            upload_to_shop: false,
            shop_name: String::new(),
            shop_access_token: String::new(),
            shop_default_price: "299.00".to_string(),
            data_dir,
        }
    }
}
