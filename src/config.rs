//! Runtime configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides:
//!
//! ```json
//! { "pipeline": { "max_payload_bytes": 1048576, "parallel": false },
//!   "service":  { "encrypt_categories": ["text"] } }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::category::FileCategory;
use crate::codec::DEFAULT_MAX_PAYLOAD;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Per-file ceiling; larger inputs are skipped.
    pub max_payload_bytes: usize,
    /// Encode/decode items on the Rayon pool. Ignored without the
    /// `parallel` feature.
    pub parallel:          bool,
    pub document_name:     String,
    pub archive_name:      String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD,
            parallel:          true,
            document_name:     "encrypted_images.pdf".into(),
            archive_name:      "decrypted_files.zip".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    /// Upload categories the encrypt flow accepts.
    pub encrypt_categories: Vec<FileCategory>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self { encrypt_categories: FileCategory::ALL.to_vec() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineOptions,
    pub service:  ServiceOptions,
}

impl Config {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read(path)?)
    }
}
