use std::io;
use std::path::{Path, PathBuf};

/// On-disk layout under the configured data directory. Input images and
/// catalog metadata live in `input/`, generated artifacts in `output/`,
/// model blobs in `models/`.
#[derive(Debug, Clone)]
pub struct Paths {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub models_dir: PathBuf,
    pub products_json: PathBuf,
    pub ctr_dataset: PathBuf,
    pub forest_model: PathBuf,
    pub feature_columns: PathBuf,
}

impl Paths {
    pub fn new(data_dir: &Path) -> Self {
        let input_dir = data_dir.join("input");
        let output_dir = data_dir.join("output");
        let models_dir = data_dir.join("models");
        Paths {
            products_json: input_dir.join("products.json"),
            ctr_dataset: input_dir.join("ctr_dataset.json"),
            forest_model: models_dir.join("ctr_forest.bin"),
            feature_columns: models_dir.join("feature_columns.bin"),
            input_dir,
            output_dir,
            models_dir,
        }
    }

    pub fn ensure_directories(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.input_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.models_dir)?;
        Ok(())
    }

    /// `true` when both model artifacts are present. They are written
    /// together; one without the other means a broken install.
    pub fn model_artifacts_exist(&self) -> bool {
        self.forest_model.exists() && self.feature_columns.exists()
    }
}
