//! Property-list editing for `Info.plist` files and transient entitlements.
//!
//! Any edit to a file inside a signed bundle invalidates its signature, so
//! every mutating operation here re-signs the edited file before returning.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info};
use plist::{Dictionary, Value};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::error::{CodesignError, Result};
use crate::signing::SigningInvoker;

/// Key holding the bundle's executable name.
pub const BUNDLE_EXECUTABLE_KEY: &str = "CFBundleExecutable";

/// File name of the generated entitlements list.
pub const ENTITLEMENTS_FILE_NAME: &str = "entitlements.plist";

/// A value this crate knows how to write into a property list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlistValue {
    Bool(bool),
    Str(String),
    StringList(Vec<String>),
}

impl PlistValue {
    /// Read back a value written by [`PlistEditor::upsert_keys`]. Returns
    /// `None` for value kinds outside the supported set.
    pub fn from_plist(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(PlistValue::Bool(*b)),
            Value::String(s) => Some(PlistValue::Str(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_string().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(PlistValue::StringList),
            _ => None,
        }
    }

    fn to_plist(&self) -> Value {
        match self {
            PlistValue::Str(s) => Value::String(s.clone()),
            PlistValue::Bool(b) => Value::Boolean(*b),
            PlistValue::StringList(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

impl From<&str> for PlistValue {
    fn from(s: &str) -> Self {
        PlistValue::Str(s.to_string())
    }
}

impl From<bool> for PlistValue {
    fn from(b: bool) -> Self {
        PlistValue::Bool(b)
    }
}

/// Key → value mapping merged into a property list, in insertion order.
pub type PlistMapping = IndexMap<String, PlistValue>;

/// On-disk encoding of a property list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlistFormat {
    Xml,
    Binary,
}

/// A parsed property list whose root is a dictionary.
#[derive(Debug, Clone)]
pub struct PlistDocument {
    pub path: PathBuf,
    pub format: PlistFormat,
    pub root: Dictionary,
}

impl PlistDocument {
    /// Write the dictionary back in the encoding it was read in.
    pub fn save(&self) -> Result<()> {
        let value = Value::Dictionary(self.root.clone());
        match self.format {
            PlistFormat::Xml => value.to_file_xml(&self.path)?,
            PlistFormat::Binary => value.to_file_binary(&self.path)?,
        }
        Ok(())
    }
}

/// Parse `path` and return its root dictionary.
pub fn read_dictionary_root(path: &Path) -> Result<PlistDocument> {
    if !path.exists() {
        return Err(CodesignError::MetadataNotFound {
            item: path.to_path_buf(),
        });
    }

    debug!("Parsing {}", path.display());
    let bytes = fs::read(path)
        .map_err(|e| CodesignError::io(format!("failed to read {}", path.display()), e))?;
    let format = if bytes.starts_with(b"bplist") {
        PlistFormat::Binary
    } else {
        PlistFormat::Xml
    };

    match Value::from_reader(std::io::Cursor::new(bytes))? {
        Value::Dictionary(root) => Ok(PlistDocument {
            path: path.to_path_buf(),
            format,
            root,
        }),
        _ => Err(CodesignError::NotADictionary {
            path: path.to_path_buf(),
        }),
    }
}

/// Mutates metadata files and re-signs each one it touches.
pub struct PlistEditor<'a> {
    invoker: &'a SigningInvoker<'a>,
    identity: &'a str,
}

impl<'a> PlistEditor<'a> {
    pub fn new(invoker: &'a SigningInvoker<'a>, identity: &'a str) -> Self {
        Self { invoker, identity }
    }

    /// Replace or append every key of `mapping` in the plist at `path`.
    ///
    /// An existing entry with the same key is removed before the new one is
    /// appended, so the file never carries duplicate keys.
    pub fn upsert_keys(&self, path: &Path, mapping: &PlistMapping) -> Result<()> {
        info!("Updating properties of plist at \"{}\"", path.display());
        let mut doc = read_dictionary_root(path)?;
        let file_name = display_name(path);

        let mut root = Dictionary::new();
        for (key, value) in std::mem::take(&mut doc.root) {
            if mapping.contains_key(&key) {
                debug!("Removed <key> {key:?} ({value:?}) from {file_name}");
            } else {
                root.insert(key, value);
            }
        }
        for (key, value) in mapping {
            root.insert(key.clone(), value.to_plist());
            debug!("Appended <key> {key:?} = {value:?} to {file_name}");
        }
        doc.root = root;

        doc.save()?;
        self.invoker.sign(path, self.identity, &[])?;

        info!("Finished updating properties of plist at \"{}\"", path.display());
        Ok(())
    }

    /// Lowercase the `CFBundleExecutable` value in place.
    ///
    /// Returns `false` without writing or re-signing when the key is missing
    /// or its value is empty.
    pub fn lowercase_executable_name(&self, path: &Path) -> Result<bool> {
        let mut doc = read_dictionary_root(path)?;

        let Some(Value::String(name)) = doc.root.get_mut(BUNDLE_EXECUTABLE_KEY) else {
            return Ok(false);
        };
        if name.is_empty() {
            return Ok(false);
        }

        let original = name.clone();
        *name = original.to_lowercase();

        doc.save()?;
        self.invoker.sign(path, self.identity, &[])?;

        info!(
            "Changed bundle executable name: \"{}\" --> \"{}\"",
            original,
            original.to_lowercase()
        );
        Ok(true)
    }
}

/// Entitlement key → value, written to a temporary plist for one signing call.
pub type EntitlementSet = IndexMap<String, PlistValue>;

/// A generated `entitlements.plist` inside its own temporary directory.
/// Dropping the value deletes the directory.
#[derive(Debug)]
pub struct EntitlementsFile {
    dir: TempDir,
    path: PathBuf,
}

impl EntitlementsFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Build an entitlements plist in a fresh directory under the system temp dir.
pub fn build_entitlements_file(entitlements: &EntitlementSet) -> Result<EntitlementsFile> {
    build_entitlements_file_in(&std::env::temp_dir(), entitlements)
}

/// Build an entitlements plist in a fresh directory under `parent`.
///
/// Only string and boolean entitlements are supported. On any failure the
/// temporary directory is removed before the error is returned.
pub fn build_entitlements_file_in(
    parent: &Path,
    entitlements: &EntitlementSet,
) -> Result<EntitlementsFile> {
    let dir = tempfile::Builder::new()
        .prefix("entitlements-")
        .tempdir_in(parent)
        .map_err(|e| CodesignError::io("failed to create temporary directory", e))?;
    let path = dir.path().join(ENTITLEMENTS_FILE_NAME);

    let mut root = Dictionary::new();
    for (key, value) in entitlements {
        let value = match value {
            PlistValue::Str(s) => Value::String(s.clone()),
            PlistValue::Bool(b) => Value::Boolean(*b),
            PlistValue::StringList(_) => {
                return Err(CodesignError::NotImplemented(format!(
                    "entitlement {key:?}: list values are not supported"
                )));
            }
        };
        root.insert(key.clone(), value);
    }

    Value::Dictionary(root).to_file_xml(&path)?;

    if log::log_enabled!(log::Level::Debug) {
        let content = fs::read_to_string(&path).unwrap_or_default();
        debug!("Generated {ENTITLEMENTS_FILE_NAME} is:\n{content}");
    }

    Ok(EntitlementsFile { dir, path })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRunner, write_info_plist};

    const IDENTITY: &str = "Developer ID Application: Example Corp (1AB1234567)";

    fn sample_plist(dir: &Path) -> PathBuf {
        let path = dir.join("Info.plist");
        write_info_plist(
            &path,
            &[
                ("CFBundleExecutable", "TestApplicationArtifact"),
                ("CFBundleIdentifier", "com.example.test"),
                ("NSCameraUsageDescription", "old camera text"),
            ],
        )
        .unwrap();
        path
    }

    #[test]
    fn read_dictionary_root_fails_for_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_dictionary_root(&tmp.path().join("Info.plist")).unwrap_err();
        assert!(matches!(err, CodesignError::MetadataNotFound { .. }));
    }

    #[test]
    fn read_dictionary_root_rejects_non_dictionary_root() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("list.plist");
        Value::Array(vec![Value::String("a".into())])
            .to_file_xml(&path)
            .unwrap();
        let err = read_dictionary_root(&path).unwrap_err();
        assert!(matches!(err, CodesignError::NotADictionary { .. }));
    }

    #[test]
    fn upsert_replaces_existing_keys_and_resigns() {
        let tmp = tempfile::tempdir().unwrap();
        let path = sample_plist(tmp.path());
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        let editor = PlistEditor::new(&invoker, IDENTITY);

        let mut mapping = PlistMapping::new();
        mapping.insert("NSCameraUsageDescription".into(), "new camera text".into());
        mapping.insert("NSRequiresAquaSystemAppearance".into(), true.into());

        editor.upsert_keys(&path, &mapping).unwrap();

        let doc = read_dictionary_root(&path).unwrap();
        assert_eq!(doc.root.len(), 4);
        assert_eq!(
            doc.root.get("NSCameraUsageDescription").and_then(Value::as_string),
            Some("new camera text")
        );
        assert_eq!(
            doc.root.get("NSRequiresAquaSystemAppearance").and_then(Value::as_boolean),
            Some(true)
        );

        let calls = runner.command_lines();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("codesign --verbose --sign"));
        assert!(calls[0].ends_with("Info.plist"));
    }

    #[test]
    fn upsert_appends_in_mapping_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = sample_plist(tmp.path());
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        let editor = PlistEditor::new(&invoker, IDENTITY);

        let mut mapping = PlistMapping::new();
        mapping.insert("NSMicrophoneUsageDescription".into(), "mic".into());
        mapping.insert("NSCameraUsageDescription".into(), "camera".into());
        mapping.insert("LSMinimumSystemVersion".into(), "11.0".into());

        editor.upsert_keys(&path, &mapping).unwrap();

        let doc = read_dictionary_root(&path).unwrap();
        let keys: Vec<&str> = doc.root.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "CFBundleExecutable",
                "CFBundleIdentifier",
                "NSMicrophoneUsageDescription",
                "NSCameraUsageDescription",
                "LSMinimumSystemVersion",
            ]
        );
    }

    #[test]
    fn upsert_is_idempotent_in_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = sample_plist(tmp.path());
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        let editor = PlistEditor::new(&invoker, IDENTITY);

        let mut mapping = PlistMapping::new();
        mapping.insert("NSCameraUsageDescription".into(), "camera".into());
        mapping.insert(
            "LSEnvironment".into(),
            PlistValue::StringList(vec!["a".into(), "b".into()]),
        );

        editor.upsert_keys(&path, &mapping).unwrap();
        let first = read_dictionary_root(&path).unwrap().root;
        editor.upsert_keys(&path, &mapping).unwrap();
        let second = read_dictionary_root(&path).unwrap().root;

        assert_eq!(first.len(), second.len());
        for (key, value) in first.iter() {
            assert_eq!(second.get(key), Some(value), "key {key} differs");
        }
        // one re-sign per call
        assert_eq!(runner.command_lines().len(), 2);
    }

    #[test]
    fn upsert_preserves_binary_encoding() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Info.plist");
        let mut root = Dictionary::new();
        root.insert("CFBundleName".into(), Value::String("Test".into()));
        Value::Dictionary(root).to_file_binary(&path).unwrap();

        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        let editor = PlistEditor::new(&invoker, IDENTITY);
        let mut mapping = PlistMapping::new();
        mapping.insert("NSMicrophoneUsageDescription".into(), "".into());
        editor.upsert_keys(&path, &mapping).unwrap();

        let doc = read_dictionary_root(&path).unwrap();
        assert_eq!(doc.format, PlistFormat::Binary);
        assert_eq!(doc.root.len(), 2);
    }

    #[test]
    fn round_trip_of_each_value_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let path = sample_plist(tmp.path());
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        let editor = PlistEditor::new(&invoker, IDENTITY);

        let mut mapping = PlistMapping::new();
        mapping.insert("AString".into(), "text".into());
        mapping.insert("ATrue".into(), true.into());
        mapping.insert("AFalse".into(), false.into());
        mapping.insert(
            "AList".into(),
            PlistValue::StringList(vec!["1".into(), "2".into(), "3".into()]),
        );
        editor.upsert_keys(&path, &mapping).unwrap();

        let doc = read_dictionary_root(&path).unwrap();
        for (key, expected) in &mapping {
            let actual = doc.root.get(key).and_then(PlistValue::from_plist);
            assert_eq!(actual.as_ref(), Some(expected), "key {key}");
        }
    }

    #[test]
    fn lowercase_executable_name_changes_only_that_value() {
        let tmp = tempfile::tempdir().unwrap();
        let path = sample_plist(tmp.path());
        let before = read_dictionary_root(&path).unwrap().root;
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        let editor = PlistEditor::new(&invoker, IDENTITY);

        assert!(editor.lowercase_executable_name(&path).unwrap());

        let after = read_dictionary_root(&path).unwrap().root;
        assert_eq!(
            after.get(BUNDLE_EXECUTABLE_KEY).and_then(Value::as_string),
            Some("testapplicationartifact")
        );
        for (key, value) in before.iter().filter(|(k, _)| *k != BUNDLE_EXECUTABLE_KEY) {
            assert_eq!(after.get(key), Some(value));
        }
        assert_eq!(runner.command_lines().len(), 1);
    }

    #[test]
    fn lowercase_executable_name_is_noop_without_key_or_value() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        let editor = PlistEditor::new(&invoker, IDENTITY);

        let missing = tmp.path().join("Missing.plist");
        write_info_plist(&missing, &[("CFBundleName", "mecab")]).unwrap();
        let empty = tmp.path().join("Empty.plist");
        write_info_plist(&empty, &[(BUNDLE_EXECUTABLE_KEY, "")]).unwrap();

        for path in [&missing, &empty] {
            let bytes_before = fs::read(path).unwrap();
            assert!(!editor.lowercase_executable_name(path).unwrap());
            assert_eq!(fs::read(path).unwrap(), bytes_before);
        }
        assert!(runner.command_lines().is_empty());
    }

    #[test]
    fn entitlements_file_is_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let mut entitlements = EntitlementSet::new();
        entitlements.insert("com.apple.security.cs.allow-jit".into(), true.into());
        entitlements.insert("com.apple.security.cs.debugger".into(), false.into());

        let file = build_entitlements_file_in(parent.path(), &entitlements).unwrap();
        assert_eq!(file.path().file_name().unwrap(), ENTITLEMENTS_FILE_NAME);
        let doc = read_dictionary_root(file.path()).unwrap();
        assert_eq!(
            doc.root.get("com.apple.security.cs.allow-jit").and_then(Value::as_boolean),
            Some(true)
        );
        assert_eq!(doc.root.len(), 2);

        let dir = file.dir().to_path_buf();
        drop(file);
        assert!(!dir.exists());
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn entitlements_file_rejects_lists_and_cleans_up() {
        let parent = tempfile::tempdir().unwrap();
        let mut entitlements = EntitlementSet::new();
        entitlements.insert("com.apple.security.smartcard".into(), true.into());
        entitlements.insert(
            "com.apple.security.application-groups".into(),
            PlistValue::StringList(vec!["group.example".into()]),
        );

        let err = build_entitlements_file_in(parent.path(), &entitlements).unwrap_err();
        assert!(matches!(err, CodesignError::NotImplemented(_)));
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn plist_value_deserializes_untagged() {
        #[derive(Deserialize)]
        struct Wrapper {
            values: PlistMapping,
        }
        let parsed: Wrapper = toml::from_str(
            r#"
            [values]
            text = "hello"
            flag = false
            list = ["a", "b"]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.values["text"], PlistValue::Str("hello".into()));
        assert_eq!(parsed.values["flag"], PlistValue::Bool(false));
        assert_eq!(
            parsed.values["list"],
            PlistValue::StringList(vec!["a".into(), "b".into()])
        );
    }
}
