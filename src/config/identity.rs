//! Keychain lookup of a code-signing identity.

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::process::{CommandBuilder, ProcessRunner};

/// Kind of certificate used to sign application code.
pub const DEVELOPER_ID_APPLICATION: &str = "Developer ID Application";

/// `  1) 0123ABCD... "Developer ID Application: Example Corp (1AB1234567)"`
static IDENTITY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)\s+(\d+\))\s+([0-9a-fA-F]+)\s+"([^"]+)"$"#)
        .expect("identity pattern compiles")
});

/// One entry listed by `security find-identity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeychainIdentity {
    pub index: String,
    pub hash: String,
    pub name: String,
}

/// Extract the identities from `security find-identity -v` output.
pub fn parse_identities(output: &str) -> Vec<KeychainIdentity> {
    IDENTITY_LINE
        .captures_iter(output)
        .map(|caps| KeychainIdentity {
            index: caps[1].to_string(),
            hash: caps[2].to_string(),
            name: caps[3].to_string(),
        })
        .collect()
}

/// Name of the first valid keychain identity whose name contains `kind`,
/// e.g. `Developer ID Application: Example Corp (1AB1234567)`.
///
/// Finding nothing is not an error here; the caller's validation rejects
/// the missing identity.
pub fn resolve_signing_identity(runner: &dyn ProcessRunner, kind: &str) -> Result<Option<String>> {
    debug!("Searching for local codesign identity of type \"{kind}\"");
    let cmd = CommandBuilder::new("security").args(["find-identity", "-p", "basic", "-v"]);
    let output = runner.run(&cmd)?;

    let found = parse_identities(&output.stdout)
        .into_iter()
        .find(|identity| identity.name.contains(kind))
        .map(|identity| identity.name);

    match &found {
        Some(_) => debug!("Found local codesign identity for type \"{kind}\""),
        None => warn!("Did not find local codesign identity for type \"{kind}\""),
    }
    Ok(found)
}
