use serde::{Deserialize, Serialize};

/// Switches for the optional signing stages.
///
/// The bundle-root stage has no switch; it always runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageFlags {
    pub remove_temp_files: bool,
    pub pre_cleanup: bool,
    pub sign_helpers: bool,
    /// Known to leave the embedded web viewer unable to open outbound
    /// connections on some builds. Keep off unless the bundle needs it.
    pub sign_native_components: bool,
    pub sign_updater: bool,
    pub sign_frameworks: bool,
    pub sign_mobile: bool,
    pub sign_internal_components: bool,
    pub remove_component_plugins: bool,
    pub sign_plugins: bool,
    /// Move `Contents/manifest.json` of each plugin into `Contents/Resources`
    /// before signing it.
    pub move_plugin_manifest: bool,
    pub sign_components: bool,
    /// `lib4d-arm64.dylib` under the database directories is mis-signed by
    /// the build step, so this stays on by default.
    pub sign_database: bool,
    pub sign_mecab: bool,
    pub sign_sasl_plugins: bool,
    pub sign_contents: bool,
    pub remove_php: bool,
    pub sign_php: bool,
    pub sign_bin_directory: bool,
}

impl Default for StageFlags {
    fn default() -> Self {
        Self {
            pre_cleanup: true,
            sign_database: true,
            ..Self::none()
        }
    }
}

impl StageFlags {
    /// Every optional stage disabled.
    pub fn none() -> Self {
        Self::uniform(false)
    }

    /// Every optional stage enabled, including the ones that fail or are
    /// destructive.
    pub fn all() -> Self {
        Self::uniform(true)
    }

    fn uniform(on: bool) -> Self {
        Self {
            remove_temp_files: on,
            pre_cleanup: on,
            sign_helpers: on,
            sign_native_components: on,
            sign_updater: on,
            sign_frameworks: on,
            sign_mobile: on,
            sign_internal_components: on,
            remove_component_plugins: on,
            sign_plugins: on,
            move_plugin_manifest: on,
            sign_components: on,
            sign_database: on,
            sign_mecab: on,
            sign_sasl_plugins: on,
            sign_contents: on,
            remove_php: on,
            sign_php: on,
            sign_bin_directory: on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_table_keeps_other_defaults() {
        let flags: StageFlags = toml::from_str("sign_plugins = true\npre_cleanup = false").unwrap();
        assert!(flags.sign_plugins);
        assert!(!flags.pre_cleanup);
        assert!(flags.sign_database);
        assert!(!flags.move_plugin_manifest);
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let err = toml::from_str::<StageFlags>("sign_plugin = true").unwrap_err();
        assert!(err.to_string().contains("sign_plugin"));
    }
}
