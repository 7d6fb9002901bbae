//! Optional TOML settings file.
//!
//! ```toml
//! database_suffixes = [".dylib", ".js"]
//!
//! [stages]
//! sign_plugins = true
//! move_plugin_manifest = true
//!
//! [info_plist]
//! NSCameraUsageDescription = "Scans barcodes"
//!
//! [entitlements]
//! "com.apple.security.cs.allow-jit" = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::StageFlags;
use crate::error::ConfigError;
use crate::plist_editor::{EntitlementSet, PlistMapping};

const APP_DIR: &str = "app-codesign";
const FILE_NAME: &str = "codesign.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub stages: StageFlags,
    /// Replaces the built-in `Info.plist` keys when present.
    pub info_plist: Option<PlistMapping>,
    /// Replaces the built-in entitlements when present.
    pub entitlements: Option<EntitlementSet>,
    pub database_suffixes: Option<Vec<String>>,
}

impl Settings {
    /// `<config_dir>/app-codesign/codesign.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(FILE_NAME))
    }

    /// Load settings from `explicit` if given (it must exist), else from the
    /// default location if a file is there, else use built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                debug!("No settings file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let settings = Self::parse(&text, path)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Settings {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })
    }
}
