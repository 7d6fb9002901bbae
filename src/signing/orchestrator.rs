//! The signing pipeline.
//!
//! [`Codesigner::run`] walks [`Stage::ORDER`], skipping disabled stages, and
//! finishes with the bundle root. Every stage only looks at what is on disk,
//! so any stage can be re-run on its own.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::item::{BundleItem, ItemKind};
use super::stage::Stage;
use super::walk::{self, has_suffix};
use super::SigningInvoker;
use crate::config::BundleConfig;
use crate::error::{CodesignError, Result};
use crate::plist_editor::{PlistEditor, build_entitlements_file};
use crate::process::ProcessRunner;

/// Suffixes signed below the component directories.
pub const COMPONENT_SUFFIXES: &[&str] = &[".html", ".htm", ".json", ".js", ".dylib"];

/// Top-level files of `Contents` that are never signed.
pub const CONTENTS_EXCLUDED: &[&str] = &["PkgInfo", "CodeResources", "Info.plist"];

const TEMP_FILE_SUFFIX: &str = ".cstemp";

const HELPERS: &[&str] = &[
    "Contents/MacOS/HelperTool",
    "Contents/MacOS/InstallTool",
    "Contents/MacOS/InstallTool.app/Contents/Library/LaunchServices/com.4D.Helper",
    "Contents/MacOS/InstallTool.app",
];

const NATIVE_COMPONENTS: &str = "Contents/Native Components";
const WEBVIEWER_BUNDLE: &str = "WebViewerCEF.bundle";
const HELPER_APP: &str = "Contents/Frameworks/4D Helper.app";
const HELPER_EXECUTABLE: &str = "Contents/MacOS/4D Helper";
const CHROMIUM_FRAMEWORK: &str = "Contents/Frameworks/Chromium Embedded Framework.framework";
const CHROMIUM_FROM: &str =
    "@executable_path/../Frameworks/Chromium Embedded Framework.framework/Chromium Embedded Framework";
const CHROMIUM_TO: &str = "@executable_path/../../../../Frameworks/Chromium Embedded Framework.framework/Chromium Embedded Framework";
const WEBVIEWER_HELPER_APPS: &[&str] = &[
    "4D Helper (Plugin).app",
    "4D Helper (GPU).app",
    "4D Helper (Renderer).app",
    "4D Helper.app",
];

const UPDATER_APP: &str = "Contents/Resources/Updater/Updater.app";
const FRAMEWORKS: &str = "Contents/Frameworks";
const INTERNAL_COMPONENTS: &str = "Contents/Resources/Internal Components";
const COMPONENTS: &str = "Contents/Components";
const PLUGINS: &str = "Contents/Plugins";
const DATABASE_DIRS: &[&str] = &["Contents/Database", "Contents/Server Database"];
const MECAB_BUNDLE: &str = "Contents/Resources/mecab/mecab.bundle";
const SASL_PLUGIN: &str = "Contents/SASL Plugins/libdigestmd5.plugin";
const PHP_DIR: &str = "Contents/Resources/php/Mac";
const PHP_BINARY: &str = "php-fcgi-4d";
const BIN_DIR: &str = "Contents/Resources/bin";

/// Per-call switches of [`Codesigner::codesign`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignOptions {
    /// Pass `--force` to replace an existing signature.
    pub force: bool,
    /// Lowercase `CFBundleExecutable` before signing.
    pub lowercase_executable: bool,
}

impl SignOptions {
    pub const NONE: SignOptions = SignOptions {
        force: false,
        lowercase_executable: false,
    };

    pub const FORCE: SignOptions = SignOptions {
        force: true,
        lowercase_executable: false,
    };
}

/// Drives a full signing run over one application bundle.
pub struct Codesigner<'a> {
    config: BundleConfig,
    invoker: SigningInvoker<'a>,
}

impl<'a> Codesigner<'a> {
    pub fn new(config: BundleConfig, runner: &'a dyn ProcessRunner) -> Self {
        Self {
            config,
            invoker: SigningInvoker::new(runner),
        }
    }

    /// Validate the configuration, then run every enabled stage in order.
    pub fn run(&self) -> Result<()> {
        self.run_for_os(std::env::consts::OS)
    }

    /// [`Codesigner::run`] with the operating system name given.
    pub fn run_for_os(&self, os: &str) -> Result<()> {
        let name = self.app_name();
        info!("Running codesign process for application \"{name}\"");

        self.config.validate_for_os(os)?;

        for stage in Stage::enabled(&self.config.stages) {
            debug!("Entering stage {stage}");
            self.run_stage(stage)?;
        }

        info!("Finished codesign process for application \"{name}\"");
        Ok(())
    }

    /// Run a single stage regardless of its flag.
    pub fn run_stage(&self, stage: Stage) -> Result<()> {
        match stage {
            Stage::RemoveTempFiles => self.remove_temp_files(),
            Stage::PreCleanup => self.pre_cleanup(),
            Stage::SignHelpers => self.sign_helpers(),
            Stage::SignNativeComponents => self.sign_native_components(),
            Stage::SignUpdater => self.sign_updater(),
            Stage::SignFrameworks => self.sign_frameworks(),
            Stage::SignMobile => self.sign_mobile(),
            Stage::SignInternalComponents => {
                self.sign_by_suffix(&self.path(INTERNAL_COMPONENTS), COMPONENT_SUFFIXES)
            }
            Stage::RemoveComponentPlugins => self.remove_component_plugins(),
            Stage::SignPlugins => self.sign_plugins(),
            Stage::SignComponents => self.sign_by_suffix(&self.path(COMPONENTS), COMPONENT_SUFFIXES),
            Stage::SignDatabase => self.sign_database(),
            Stage::SignMecab => self.sign_if_present(
                MECAB_BUNDLE,
                false,
                SignOptions {
                    force: true,
                    lowercase_executable: true,
                },
            ),
            Stage::SignSaslPlugins => self.sign_if_present(SASL_PLUGIN, false, SignOptions::FORCE),
            Stage::SignContents => self.sign_contents(),
            Stage::RemovePhp => self.remove_php(),
            Stage::SignPhp => self.sign_if_present(
                &format!("{PHP_DIR}/{PHP_BINARY}"),
                true,
                SignOptions::FORCE,
            ),
            Stage::SignBinDirectory => self.sign_bin_directory(),
            Stage::SignApp => self.sign_app(),
        }
    }

    /// Sign one file or bundle.
    ///
    /// Directories must carry a metadata file. Its executable name is
    /// lowercased on request, and `.app` bundles get the configured
    /// `Info.plist` keys merged in; each edit re-signs the metadata file
    /// before the item itself is signed.
    pub fn codesign(&self, path: &Path, hardened: bool, options: SignOptions) -> Result<()> {
        let identity = self.config.identity()?;
        let item = BundleItem::inspect(path);

        if item.is_dir() {
            let metadata = item
                .metadata
                .as_deref()
                .ok_or_else(|| CodesignError::MetadataNotFound {
                    item: item.path.clone(),
                })?;
            let editor = PlistEditor::new(&self.invoker, identity);

            if options.lowercase_executable {
                editor.lowercase_executable_name(metadata)?;
            }
            if item.kind == ItemKind::App {
                editor.upsert_keys(metadata, &self.config.info_plist_properties())?;
            }
        }

        let mut args = Vec::new();
        if !self.config.local {
            args.push("--timestamp");
        }
        if options.force {
            args.push("--force");
        }

        if hardened {
            let entitlements = build_entitlements_file(&self.config.entitlements)?;
            self.invoker
                .sign_hardened(&item.path, identity, entitlements.path(), &args)?;
        } else {
            self.invoker.sign(&item.path, identity, &args)?;
        }
        Ok(())
    }

    fn remove_temp_files(&self) -> Result<()> {
        debug!("Removing temporary files matching \"*{TEMP_FILE_SUFFIX}\"");
        for file in walk::files_matching(&self.config.bundle_path, TEMP_FILE_SUFFIX)? {
            fs::remove_file(&file)
                .map_err(|e| CodesignError::io(format!("failed to remove {}", file.display()), e))?;
            debug!("Removed {}", file.display());
        }
        Ok(())
    }

    fn pre_cleanup(&self) -> Result<()> {
        info!("Running pre-cleanup ...");
        self.clean(&self.config.bundle_path)?;

        if self.config.stages.sign_native_components {
            for component in walk::top_level(&self.path(NATIVE_COMPONENTS))? {
                self.clean(&component)?;
            }
        }
        info!("Finished pre-cleanup (removed signatures)");
        Ok(())
    }

    fn clean(&self, path: &Path) -> Result<()> {
        self.invoker.remove_extended_attributes(path)?;
        self.invoker.remove_signature(path)?;
        Ok(())
    }

    fn sign_helpers(&self) -> Result<()> {
        info!("Signing helpers ...");
        for helper in HELPERS {
            self.sign_if_present(helper, true, SignOptions::FORCE)?;
        }
        info!("Finished signing helpers");
        Ok(())
    }

    fn sign_native_components(&self) -> Result<()> {
        info!("Signing native components ...");
        let native = self.path(NATIVE_COMPONENTS);
        let webviewer = native.join(WEBVIEWER_BUNDLE);
        let helper_app = webviewer.join(HELPER_APP);
        let frameworks = webviewer.join(FRAMEWORKS);
        let chromium = webviewer.join(CHROMIUM_FRAMEWORK);

        // The helper's own Frameworks dir only holds a symlink to the Chromium
        // framework, which codesign rejects. Link the framework directly.
        let symlink_dir = helper_app.join(FRAMEWORKS);
        if symlink_dir.is_dir() {
            fs::remove_dir_all(&symlink_dir).map_err(|e| {
                CodesignError::io(format!("failed to remove {}", symlink_dir.display()), e)
            })?;
            info!("Removed framework dir from native component: \"{}\"", symlink_dir.display());

            let executable = helper_app.join(HELPER_EXECUTABLE);
            self.invoker
                .rewrite_linked_library_path(&executable, CHROMIUM_FROM, Some(CHROMIUM_TO))?;
            self.codesign(&executable, false, SignOptions::FORCE)?;
        }

        for app in WEBVIEWER_HELPER_APPS {
            let app = frameworks.join(app);
            if app.exists() {
                self.codesign(&app, true, SignOptions::FORCE)?;
            }
        }

        for library in walk::recursive(&chromium.join("Libraries"), |_| true)? {
            self.codesign(&library, false, SignOptions::FORCE)?;
        }
        if chromium.exists() {
            self.codesign(&chromium, false, SignOptions::FORCE)?;
        }

        // never --deep here, it invalidates the helper apps signed above
        for component in walk::top_level(&native)? {
            self.codesign(&component, false, SignOptions::NONE)?;
        }

        info!("Finished signing native components");
        Ok(())
    }

    fn sign_updater(&self) -> Result<()> {
        info!("Signing updater ...");
        let updater = self.path(UPDATER_APP);
        for item in walk::recursive(&updater.join(FRAMEWORKS), |_| true)? {
            self.codesign(&item, false, SignOptions::FORCE)?;
        }
        if updater.exists() {
            self.codesign(&updater, true, SignOptions::FORCE)?;
        }
        info!("Finished signing updater");
        Ok(())
    }

    fn sign_frameworks(&self) -> Result<()> {
        let frameworks = self.path(FRAMEWORKS);
        if !frameworks.exists() {
            return Ok(());
        }
        info!("Signing frameworks ...");
        for item in walk::top_level(&frameworks)? {
            self.codesign(&item, false, SignOptions::FORCE)?;
        }
        info!("Finished signing frameworks");
        Ok(())
    }

    fn sign_mobile(&self) -> Result<()> {
        Err(CodesignError::NotImplemented(
            "signing for mobile applications".to_string(),
        ))
    }

    fn sign_by_suffix(&self, dir: &Path, suffixes: &[impl AsRef<str>]) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }
        info!("Signing \"{}\" ...", dir_label(dir));
        for item in walk::recursive(dir, |p| has_suffix(p, suffixes))? {
            self.codesign(&item, false, SignOptions::FORCE)?;
        }
        info!("Finished signing \"{}\"", dir_label(dir));
        Ok(())
    }

    fn remove_component_plugins(&self) -> Result<()> {
        info!("Removing component plugins ...");
        for component in walk::top_level(&self.path(COMPONENTS))? {
            let plugins = component.join("Plugins");
            if plugins.is_dir() {
                fs::remove_dir_all(&plugins).map_err(|e| {
                    CodesignError::io(format!("failed to remove {}", plugins.display()), e)
                })?;
                info!(
                    "Removed \"Plugins\" directory within component \"{}\"",
                    dir_label(&component)
                );
            }
        }
        info!("Finished removing component plugins");
        Ok(())
    }

    fn sign_plugins(&self) -> Result<()> {
        let plugins = self.path(PLUGINS);
        if !plugins.exists() {
            return Ok(());
        }
        info!("Signing plugins ...");
        for plugin in walk::top_level(&plugins)? {
            if !has_suffix(&plugin, &[".bundle"]) {
                continue;
            }

            let mut manifest = plugin.join("Contents/manifest.json");
            if manifest.exists() {
                if self.config.stages.move_plugin_manifest {
                    let destination = plugin.join("Contents/Resources/manifest.json");
                    move_file(&manifest, &destination)?;
                    info!(
                        "Moved plugin manifest from \"{}\" to \"{}\"",
                        manifest.display(),
                        destination.display()
                    );
                    manifest = destination;
                }
                self.codesign(&manifest, true, SignOptions::FORCE)?;
            }
            self.codesign(&plugin, false, SignOptions::FORCE)?;
        }
        info!("Finished signing plugins");
        Ok(())
    }

    fn sign_database(&self) -> Result<()> {
        info!("Signing database directories ...");
        let suffixes = self.config.database_suffixes.as_slice();
        for dir in DATABASE_DIRS {
            let dir = self.path(dir);
            for item in walk::recursive(&dir, |p| has_suffix(p, suffixes))? {
                self.codesign(&item, false, SignOptions::FORCE)?;
            }
        }
        info!("Finished signing database directories");
        Ok(())
    }

    fn sign_contents(&self) -> Result<()> {
        let contents = self.path("Contents");
        if !contents.exists() {
            return Ok(());
        }
        info!("Signing \"Contents\" directory ...");
        for item in walk::top_level(&contents)? {
            let excluded = item
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| CONTENTS_EXCLUDED.contains(&n));
            if item.is_file() && !excluded {
                self.codesign(&item, false, SignOptions::FORCE)?;
            }
        }
        info!("Finished signing \"Contents\" directory");
        Ok(())
    }

    fn remove_php(&self) -> Result<()> {
        let php = self.path(PHP_DIR);
        if !php.exists() {
            debug!("No PHP directory at \"{}\"", php.display());
            return Ok(());
        }
        fs::remove_dir_all(&php)
            .map_err(|e| CodesignError::io(format!("failed to remove {}", php.display()), e))?;
        info!("Removed PHP for macOS at \"{}\"", php.display());
        Ok(())
    }

    fn sign_bin_directory(&self) -> Result<()> {
        let bin = self.path(BIN_DIR);
        if !bin.exists() {
            return Ok(());
        }
        info!("Signing bin directory ...");
        for item in walk::recursive(&bin, |_| true)? {
            self.codesign(&item, true, SignOptions::FORCE)?;
        }
        info!("Finished signing bin directory");
        Ok(())
    }

    fn sign_app(&self) -> Result<()> {
        let app = &self.config.bundle_path;
        info!("Signing main application bundle \"{}\" ...", self.app_name());
        self.codesign(app, true, SignOptions::NONE)?;
        if self.config.verify {
            self.invoker.verify(app)?;
        }
        info!("Finished signing main application bundle \"{}\"", self.app_name());
        Ok(())
    }

    fn sign_if_present(&self, relative: &str, hardened: bool, options: SignOptions) -> Result<()> {
        let path = self.path(relative);
        if path.exists() {
            self.codesign(&path, hardened, options)?;
        } else {
            debug!("Skipping missing item \"{relative}\"");
        }
        Ok(())
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.config.bundle_path.join(relative)
    }

    fn app_name(&self) -> String {
        dir_label(&self.config.bundle_path)
    }
}

fn dir_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CodesignError::io(format!("failed to create {}", parent.display()), e))?;
    }
    fs::rename(from, to).map_err(|e| {
        CodesignError::io(
            format!("failed to move {} to {}", from.display(), to.display()),
            e,
        )
    })
}
