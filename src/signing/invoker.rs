//! Command shaping for the platform signing tools.
//!
//! Nothing here decides *what* to sign; each method maps one operation onto
//! one tool invocation and hands it to the [`ProcessRunner`].

use std::path::Path;

use log::{debug, info};

use crate::error::Result;
use crate::process::{CommandBuilder, ProcessOutput, ProcessRunner};

const CODESIGN: &str = "codesign";
const INSTALL_NAME_TOOL: &str = "install_name_tool";
const XATTR: &str = "xattr";

/// Stateless wrapper over `codesign`, `install_name_tool` and `xattr`.
#[derive(Clone, Copy)]
pub struct SigningInvoker<'a> {
    runner: &'a dyn ProcessRunner,
}

impl<'a> SigningInvoker<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self { runner }
    }

    /// `codesign --verbose <extra> --sign <identity> <path>`
    pub fn sign(&self, path: &Path, identity: &str, extra_args: &[&str]) -> Result<ProcessOutput> {
        let cmd = CommandBuilder::new(CODESIGN)
            .arg("--verbose")
            .args(extra_args)
            .args(["--sign", identity])
            .arg(path);
        self.exec(cmd, "Signed", path)
    }

    /// `codesign --verbose --deep <extra> --sign <identity> --options=runtime
    /// --entitlements <file> <path>`
    pub fn sign_hardened(
        &self,
        path: &Path,
        identity: &str,
        entitlements: &Path,
        extra_args: &[&str],
    ) -> Result<ProcessOutput> {
        let cmd = CommandBuilder::new(CODESIGN)
            .args(["--verbose", "--deep"])
            .args(extra_args)
            .args(["--sign", identity, "--options=runtime", "--entitlements"])
            .arg(entitlements)
            .arg(path);
        self.exec(cmd, "Signed (hardened runtime)", path)
    }

    pub fn remove_signature(&self, path: &Path) -> Result<ProcessOutput> {
        let cmd = CommandBuilder::new(CODESIGN)
            .arg("--remove-signature")
            .arg(path);
        self.exec(cmd, "Removed signature of", path)
    }

    /// Change a linked library path inside `binary`. Without `to`, the
    /// binary's own install name is set to `from` instead.
    pub fn rewrite_linked_library_path(
        &self,
        binary: &Path,
        from: &str,
        to: Option<&str>,
    ) -> Result<ProcessOutput> {
        let cmd = match to {
            Some(to) => CommandBuilder::new(INSTALL_NAME_TOOL).args(["-change", from, to]),
            None => CommandBuilder::new(INSTALL_NAME_TOOL).args(["-id", from]),
        }
        .arg(binary);
        self.exec(cmd, "Rewrote linked library path of", binary)
    }

    /// Recursively clear extended attributes (quarantine flags, Finder info).
    pub fn remove_extended_attributes(&self, path: &Path) -> Result<ProcessOutput> {
        let cmd = CommandBuilder::new(XATTR).arg("-cr").arg(path);
        self.exec(cmd, "Removed extended attributes of", path)
    }

    pub fn verify(&self, path: &Path) -> Result<ProcessOutput> {
        let cmd = CommandBuilder::new(CODESIGN)
            .args(["--verify", "--deep", "--verbose"])
            .arg(path);
        self.exec(cmd, "Verified", path)
    }

    fn exec(&self, cmd: CommandBuilder, verb: &str, path: &Path) -> Result<ProcessOutput> {
        debug!("{}", cmd.to_command_line());
        let output = self.runner.run(&cmd)?;
        let combined = output.combined();
        if !combined.is_empty() {
            debug!("{}", combined);
        }
        info!("{verb} \"{}\"", short_name(path));
        Ok(output)
    }
}

fn short_name(path: &Path) -> std::borrow::Cow<'_, str> {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodesignError;
    use crate::testing::RecordingRunner;
    use std::path::PathBuf;

    const IDENTITY: &str = "Developer ID Application: Example Corp (1AB1234567)";

    #[test]
    fn plain_sign_places_extra_args_before_identity() {
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        invoker
            .sign(Path::new("/tmp/A.app/Contents/x.dylib"), IDENTITY, &["--timestamp", "--force"])
            .unwrap();

        assert_eq!(
            runner.argv(0),
            vec![
                "codesign",
                "--verbose",
                "--timestamp",
                "--force",
                "--sign",
                IDENTITY,
                "/tmp/A.app/Contents/x.dylib"
            ]
        );
    }

    #[test]
    fn hardened_sign_is_deep_with_runtime_and_entitlements() {
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        invoker
            .sign_hardened(
                Path::new("/tmp/A.app"),
                IDENTITY,
                Path::new("/tmp/ent/entitlements.plist"),
                &["--timestamp"],
            )
            .unwrap();

        assert_eq!(
            runner.argv(0),
            vec![
                "codesign",
                "--verbose",
                "--deep",
                "--timestamp",
                "--sign",
                IDENTITY,
                "--options=runtime",
                "--entitlements",
                "/tmp/ent/entitlements.plist",
                "/tmp/A.app"
            ]
        );
    }

    #[test]
    fn install_name_tool_change_and_id_forms() {
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        let binary = PathBuf::from("/tmp/Helper");
        invoker
            .rewrite_linked_library_path(&binary, "@rpath/old", Some("@rpath/new"))
            .unwrap();
        invoker
            .rewrite_linked_library_path(&binary, "@rpath/self", None)
            .unwrap();

        assert_eq!(
            runner.argv(0),
            vec!["install_name_tool", "-change", "@rpath/old", "@rpath/new", "/tmp/Helper"]
        );
        assert_eq!(
            runner.argv(1),
            vec!["install_name_tool", "-id", "@rpath/self", "/tmp/Helper"]
        );
    }

    #[test]
    fn cleanup_and_verify_commands() {
        let runner = RecordingRunner::new();
        let invoker = SigningInvoker::new(&runner);
        let app = Path::new("/tmp/A.app");
        invoker.remove_extended_attributes(app).unwrap();
        invoker.remove_signature(app).unwrap();
        invoker.verify(app).unwrap();

        assert_eq!(
            runner.command_lines(),
            vec![
                "xattr -cr /tmp/A.app",
                "codesign --remove-signature /tmp/A.app",
                "codesign --verify --deep --verbose /tmp/A.app",
            ]
        );
    }

    #[test]
    fn tool_failure_propagates() {
        let runner = RecordingRunner::new().failing_on("codesign", "no identity found");
        let invoker = SigningInvoker::new(&runner);
        let err = invoker
            .sign(Path::new("/tmp/A.app"), IDENTITY, &[])
            .unwrap_err();
        match err {
            CodesignError::ToolFailed { program, output, .. } => {
                assert_eq!(program, "codesign");
                assert_eq!(output, "no identity found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
