//! Profile document files.
//!
//! Reads backend responses saved to disk and writes the editing model or the
//! save payload back out as pretty JSON, mirroring how the editor talks to
//! the profile store.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::model::{DeviceConfig, ProfileSet};
use crate::serializer::{prepare_config_for_save, SavePayload};

/// Write any serializable document as pretty JSON
pub fn write_document<T: Serialize, P: AsRef<Path>>(document: &T, path: P) -> Result<()> {
    let json =
        serde_json::to_string_pretty(document).context("Failed to serialize document to JSON")?;

    fs::write(&path, json + "\n")
        .with_context(|| format!("Failed to write document to {:?}", path.as_ref()))?;

    Ok(())
}

impl ProfileSet {
    /// Load and normalize a profile response from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read profile document from {:?}", path.as_ref()))?;

        let set = Self::parse(&content).context("Failed to parse profile document")?;

        debug!(path = ?path.as_ref(), devices = set.config.devices.len(), "loaded profile document");
        Ok(set)
    }
}

impl DeviceConfig {
    /// Save the canonical editing model to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_document(self, path)
    }

    /// Save the backend payload for this model to a JSON file
    pub fn save_payload_to_file<P: AsRef<Path>>(&self, path: P) -> Result<SavePayload> {
        let payload = prepare_config_for_save(self);
        write_document(&payload, path)?;
        Ok(payload)
    }
}
