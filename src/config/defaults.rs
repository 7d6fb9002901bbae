//! Built-in `Info.plist` keys and hardened-runtime entitlements.

use crate::plist_editor::{EntitlementSet, PlistMapping, PlistValue};

/// Suffixes signed below the database directories. Only the architecture
/// specific libraries need re-signing after a build.
pub const DEFAULT_DATABASE_SUFFIXES: &[&str] = &[".dylib"];

/// Usage-description keys must exist before notarization; they cannot be
/// added to a signed bundle later.
const INFO_PLIST_PROPERTIES: &[(&str, &str)] = &[
    ("NSRequiresAquaSystemAppearance", "NO"),
    ("NSAppleEventsUsageDescription", ""),
    ("NSCalendarsUsageDescription", ""),
    ("NSContactsUsageDescription", ""),
    ("NSRemindersUsageDescription", ""),
    ("NSCameraUsageDescription", ""),
    ("NSMicrophoneUsageDescription", ""),
    ("NSLocationUsageDescription", ""),
    ("NSPhotoLibraryUsageDescription", ""),
    ("NSSystemAdministrationUsageDescription", ""),
];

const HARDENED_RUNTIME_ENTITLEMENTS: &[&str] = &[
    "com.apple.security.smartcard",
    "com.apple.security.automation.apple-events",
    "com.apple.security.cs.allow-dyld-environment-variables",
    "com.apple.security.cs.allow-jit",
    "com.apple.security.cs.allow-unsigned-executable-memory",
    "com.apple.security.cs.debugger",
    "com.apple.security.cs.disable-executable-page-protection",
    "com.apple.security.cs.disable-library-validation",
    // plugin debugging
    "com.apple.security.get-task-allow",
    "com.apple.security.device.audio-input",
    "com.apple.security.device.camera",
    "com.apple.security.personal-information.photos-library",
    "com.apple.security.personal-information.location",
    "com.apple.security.personal-information.addressbook",
    "com.apple.security.personal-information.calendars",
];

pub fn default_info_plist_properties() -> PlistMapping {
    INFO_PLIST_PROPERTIES
        .iter()
        .map(|(key, value)| ((*key).to_string(), PlistValue::from(*value)))
        .collect()
}

pub fn default_hardened_runtime_entitlements() -> EntitlementSet {
    HARDENED_RUNTIME_ENTITLEMENTS
        .iter()
        .map(|key| ((*key).to_string(), PlistValue::Bool(true)))
        .collect()
}

pub fn default_database_suffixes() -> Vec<String> {
    DEFAULT_DATABASE_SUFFIXES.iter().map(|s| s.to_string()).collect()
}
