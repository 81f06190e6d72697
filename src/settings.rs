// src/settings.rs
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::EaselError;
use crate::models::ProviderKind;

/// Client-side settings with an explicit load/save lifecycle: loaded once
/// at app start, written back on a settings-save action. Call sites read
/// the loaded value; nothing reads or writes the file ad hoc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserSettings {
    pub relay_base_url: String,
    pub gemini_api_key: Option<String>,
    pub modelscope_api_key: Option<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            relay_base_url: "http://localhost:8080".to_string(),
            gemini_api_key: None,
            modelscope_api_key: None,
        }
    }
}

impl UserSettings {
    /// Reads settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, EaselError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(EaselError::Internal(format!(
                    "cannot read settings {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        serde_json::from_str(&raw).map_err(|e| {
            EaselError::InvalidInput(format!("settings file is not valid JSON: {}", e))
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), EaselError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EaselError::Internal(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| EaselError::Internal(format!("cannot serialize settings: {}", e)))?;
        std::fs::write(path, raw).map_err(|e| {
            EaselError::Internal(format!("cannot write settings {}: {}", path.display(), e))
        })
    }

    pub fn key_for(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
            ProviderKind::ModelScope => self.modelscope_api_key.as_deref(),
        }
    }
}
