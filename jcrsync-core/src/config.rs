//! Import configuration
//!
//! Stored as JSON; every field has a default, so an empty object is a valid
//! configuration.

use crate::descriptor::DESCRIPTOR_FILE_NAME;
use crate::mime::MimeTypeResolver;
use crate::names::{NT_FILE, NT_FOLDER, NT_RESOURCE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Settings for one import run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// File name of the per-directory descriptor document.
    pub descriptor_name: String,
    /// Node type for directories without a descriptor.
    pub folder_type: String,
    /// Node type wrapping each imported file.
    pub file_type: String,
    /// Node type of the resource child holding a file's bytes.
    pub resource_type: String,
    /// Directory name marking the top of the content tree on disk.
    pub content_root_marker: String,
    /// Create missing destination nodes instead of failing.
    pub create_missing_roots: bool,
    /// Extra `extension -> content type` entries.
    pub mime_types: BTreeMap<String, String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            descriptor_name: DESCRIPTOR_FILE_NAME.to_string(),
            folder_type: NT_FOLDER.to_string(),
            file_type: NT_FILE.to_string(),
            resource_type: NT_RESOURCE.to_string(),
            content_root_marker: "jcr_root".to_string(),
            create_missing_roots: false,
            mime_types: BTreeMap::new(),
        }
    }
}

impl ImportConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read import config from {:?}", path))?;
        let config: ImportConfig = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse import config {:?}", path))?;
        Ok(config)
    }

    /// Load a configuration file, or the defaults when none is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Content type resolver with this configuration's overrides
    pub fn mime_resolver(&self) -> MimeTypeResolver {
        MimeTypeResolver::with_overrides(self.mime_types.iter().map(|(k, v)| (k, v.clone())))
    }
}
