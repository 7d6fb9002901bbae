//! Configuration of one signing run.

mod defaults;
mod identity;
mod settings;
mod stages;

use std::path::PathBuf;

use log::debug;

pub use defaults::{
    DEFAULT_DATABASE_SUFFIXES, default_database_suffixes, default_hardened_runtime_entitlements,
    default_info_plist_properties,
};
pub use identity::{DEVELOPER_ID_APPLICATION, KeychainIdentity, parse_identities, resolve_signing_identity};
pub use settings::Settings;
pub use stages::StageFlags;

use crate::error::{ConfigError, Result};
use crate::plist_editor::{EntitlementSet, PlistMapping};
use crate::process::ProcessRunner;

/// Marker every application signing identity carries.
pub const IDENTITY_MARKER: &str = "Developer ID Application:";

/// Everything a [`crate::Codesigner`] needs to know about a bundle. Built
/// once per invocation and never changed afterwards.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    pub bundle_path: PathBuf,
    pub signing_identity: Option<String>,
    /// `None` selects [`default_info_plist_properties`].
    pub plist_overrides: Option<PlistMapping>,
    pub entitlements: EntitlementSet,
    pub stages: StageFlags,
    pub database_suffixes: Vec<String>,
    /// Skip the trusted timestamp (no network round trip).
    pub local: bool,
    /// Deep-verify the bundle after signing its root.
    pub verify: bool,
}

impl BundleConfig {
    /// Config with built-in defaults and the given identity, as is.
    pub fn with_identity(bundle_path: impl Into<PathBuf>, signing_identity: Option<String>) -> Self {
        Self {
            bundle_path: bundle_path.into(),
            signing_identity: signing_identity.filter(|id| !id.is_empty()),
            plist_overrides: None,
            entitlements: default_hardened_runtime_entitlements(),
            stages: StageFlags::default(),
            database_suffixes: default_database_suffixes(),
            local: false,
            verify: false,
        }
    }

    /// Config with built-in defaults. A missing or empty identity is looked
    /// up in the keychain now and stored.
    pub fn new(
        bundle_path: impl Into<PathBuf>,
        signing_identity: Option<String>,
        runner: &dyn ProcessRunner,
    ) -> Result<Self> {
        let mut config = Self::with_identity(bundle_path, signing_identity);
        if config.signing_identity.is_none() {
            config.signing_identity = resolve_signing_identity(runner, DEVELOPER_ID_APPLICATION)?;
        }
        Ok(config)
    }

    /// Overlay values from a settings file.
    pub fn apply_settings(mut self, settings: Settings) -> Self {
        self.stages = settings.stages;
        if settings.info_plist.is_some() {
            self.plist_overrides = settings.info_plist;
        }
        if let Some(entitlements) = settings.entitlements {
            self.entitlements = entitlements;
        }
        if let Some(suffixes) = settings.database_suffixes {
            self.database_suffixes = suffixes;
        }
        self
    }

    /// Keys merged into every `.app` bundle's `Info.plist`.
    pub fn info_plist_properties(&self) -> PlistMapping {
        self.plist_overrides
            .clone()
            .unwrap_or_else(default_info_plist_properties)
    }

    /// Validated identity. Fails when none was given or found.
    pub fn identity(&self) -> std::result::Result<&str, ConfigError> {
        match self.signing_identity.as_deref() {
            Some(id) if id.contains(IDENTITY_MARKER) => Ok(id),
            other => Err(ConfigError::InvalidIdentity(other.map(str::to_string))),
        }
    }

    /// Check that signing can start on this machine.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.validate_for_os(std::env::consts::OS)
    }

    /// [`BundleConfig::validate`] with the operating system name given
    /// (`std::env::consts::OS` spelling).
    pub fn validate_for_os(&self, os: &str) -> std::result::Result<(), ConfigError> {
        debug!("Validating expectations ...");

        if os != "macos" {
            return Err(ConfigError::WrongPlatform(os.to_string()));
        }

        let path = &self.bundle_path;
        if !path.exists() {
            return Err(ConfigError::BundleMissing(path.clone()));
        }
        if path.is_file() {
            return Err(ConfigError::BundleIsFile(path.clone()));
        }
        if path.extension().is_none_or(|ext| ext != "app") {
            return Err(ConfigError::WrongSuffix(path.clone()));
        }
        self.identity()?;

        debug!(
            "Hardened runtime entitlements are: {}",
            serde_json::to_string_pretty(&self.entitlements).unwrap_or_default()
        );
        debug!(
            "Info.plist properties to modify are: {}",
            serde_json::to_string_pretty(&self.info_plist_properties()).unwrap_or_default()
        );

        debug!("Validated expectations");
        Ok(())
    }
}
