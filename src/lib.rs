//! Bottom-up re-signing of nested macOS application bundles.
//!
//! ```no_run
//! use app_codesign::{BundleConfig, Codesigner, process::SystemRunner};
//!
//! # fn main() -> app_codesign::Result<()> {
//! let runner = SystemRunner::new();
//! let config = BundleConfig::new("/Users/me/build/My.app", None, &runner)?;
//! Codesigner::new(config, &runner).run()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod plist_editor;
pub mod process;
pub mod signing;
pub mod testing;

pub use config::{BundleConfig, StageFlags};
pub use error::{CodesignError, ConfigError, Result};
pub use plist_editor::{EntitlementSet, PlistEditor, PlistMapping, PlistValue};
pub use signing::{BundleItem, Codesigner, ItemKind, SignOptions, SigningInvoker, Stage};
