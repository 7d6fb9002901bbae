#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use app_codesign::{BundleConfig, StageFlags};
use plist::{Dictionary, Value};

pub const IDENTITY: &str = "Developer ID Application: Example Corp (1AB1234567)";

pub fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"\xca\xfe\xba\xbe").unwrap();
}

pub fn write_plist(path: &Path, entries: &[(&str, Value)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut root = Dictionary::new();
    for (key, value) in entries {
        root.insert((*key).to_string(), value.clone());
    }
    Value::Dictionary(root).to_file_xml(path).unwrap();
}

/// A bundle directory with `Contents/Info.plist`.
pub fn make_bundle(path: &Path, executable: &str) -> PathBuf {
    write_plist(
        &path.join("Contents/Info.plist"),
        &[("CFBundleExecutable", Value::String(executable.into()))],
    );
    path.to_path_buf()
}

pub fn config(app: &Path, stages: StageFlags) -> BundleConfig {
    let mut config = BundleConfig::with_identity(app, Some(IDENTITY.into()));
    config.stages = stages;
    config
}
