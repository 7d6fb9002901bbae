use std::fs;
use std::path::{Path, PathBuf};

/// File name of a bundle's metadata file.
pub const INFO_PLIST: &str = "Info.plist";

/// What a signable path looks like on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    App,
    Framework,
    /// Any other directory (`.bundle`, `.plugin`, ...).
    Bundle,
    PlainFile,
}

/// A path about to be signed, with its kind and metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleItem {
    pub path: PathBuf,
    pub kind: ItemKind,
    /// `Contents/Info.plist`, or `Resources/Info.plist` for flat framework
    /// layouts. Always `None` for plain files.
    pub metadata: Option<PathBuf>,
}

impl BundleItem {
    pub fn inspect(path: &Path) -> Self {
        if !path.is_dir() {
            return Self {
                path: path.to_path_buf(),
                kind: ItemKind::PlainFile,
                metadata: None,
            };
        }

        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("app") => ItemKind::App,
            Some("framework") => ItemKind::Framework,
            _ => ItemKind::Bundle,
        };

        Self {
            path: path.to_path_buf(),
            kind,
            metadata: locate_metadata(path),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind != ItemKind::PlainFile
    }
}

fn locate_metadata(dir: &Path) -> Option<PathBuf> {
    let contents = dir.join("Contents").join(INFO_PLIST);
    if contents.is_file() {
        return Some(contents);
    }
    // `Resources` is usually a symlink into `Versions/Current`
    let resources = fs::canonicalize(dir.join("Resources")).ok()?;
    let plist = resources.join(INFO_PLIST);
    plist.is_file().then_some(plist)
}
