//! The fixed, bottom-up sequence of signing stages.

use std::fmt;

use crate::config::StageFlags;

/// One step of a signing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RemoveTempFiles,
    PreCleanup,
    SignHelpers,
    SignNativeComponents,
    SignUpdater,
    SignFrameworks,
    SignMobile,
    SignInternalComponents,
    RemoveComponentPlugins,
    SignPlugins,
    SignComponents,
    SignDatabase,
    SignMecab,
    SignSaslPlugins,
    SignContents,
    RemovePhp,
    SignPhp,
    SignBinDirectory,
    SignApp,
}

impl Stage {
    /// Execution order. Nested code comes before the bundles that contain
    /// it, and the bundle root is always last.
    pub const ORDER: &'static [Stage] = &[
        Stage::RemoveTempFiles,
        Stage::PreCleanup,
        Stage::SignHelpers,
        Stage::SignNativeComponents,
        Stage::SignUpdater,
        Stage::SignFrameworks,
        Stage::SignMobile,
        Stage::SignInternalComponents,
        Stage::RemoveComponentPlugins,
        Stage::SignPlugins,
        Stage::SignComponents,
        Stage::SignDatabase,
        Stage::SignMecab,
        Stage::SignSaslPlugins,
        Stage::SignContents,
        Stage::RemovePhp,
        Stage::SignPhp,
        Stage::SignBinDirectory,
        Stage::SignApp,
    ];

    /// Name as used in the `[stages]` table of the settings file.
    pub fn name(self) -> &'static str {
        match self {
            Stage::RemoveTempFiles => "remove_temp_files",
            Stage::PreCleanup => "pre_cleanup",
            Stage::SignHelpers => "sign_helpers",
            Stage::SignNativeComponents => "sign_native_components",
            Stage::SignUpdater => "sign_updater",
            Stage::SignFrameworks => "sign_frameworks",
            Stage::SignMobile => "sign_mobile",
            Stage::SignInternalComponents => "sign_internal_components",
            Stage::RemoveComponentPlugins => "remove_component_plugins",
            Stage::SignPlugins => "sign_plugins",
            Stage::SignComponents => "sign_components",
            Stage::SignDatabase => "sign_database",
            Stage::SignMecab => "sign_mecab",
            Stage::SignSaslPlugins => "sign_sasl_plugins",
            Stage::SignContents => "sign_contents",
            Stage::RemovePhp => "remove_php",
            Stage::SignPhp => "sign_php",
            Stage::SignBinDirectory => "sign_bin_directory",
            Stage::SignApp => "sign_app",
        }
    }

    /// Whether this stage runs under `flags`. [`Stage::SignApp`] always runs.
    pub fn is_enabled(self, flags: &StageFlags) -> bool {
        match self {
            Stage::RemoveTempFiles => flags.remove_temp_files,
            Stage::PreCleanup => flags.pre_cleanup,
            Stage::SignHelpers => flags.sign_helpers,
            Stage::SignNativeComponents => flags.sign_native_components,
            Stage::SignUpdater => flags.sign_updater,
            Stage::SignFrameworks => flags.sign_frameworks,
            Stage::SignMobile => flags.sign_mobile,
            Stage::SignInternalComponents => flags.sign_internal_components,
            Stage::RemoveComponentPlugins => flags.remove_component_plugins,
            Stage::SignPlugins => flags.sign_plugins,
            Stage::SignComponents => flags.sign_components,
            Stage::SignDatabase => flags.sign_database,
            Stage::SignMecab => flags.sign_mecab,
            Stage::SignSaslPlugins => flags.sign_sasl_plugins,
            Stage::SignContents => flags.sign_contents,
            Stage::RemovePhp => flags.remove_php,
            Stage::SignPhp => flags.sign_php,
            Stage::SignBinDirectory => flags.sign_bin_directory,
            Stage::SignApp => true,
        }
    }

    /// Enabled stages in execution order.
    pub fn enabled(flags: &StageFlags) -> Vec<Stage> {
        Self::ORDER
            .iter()
            .copied()
            .filter(|stage| stage.is_enabled(flags))
            .collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
