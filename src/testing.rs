//! A [`ProcessRunner`] that records commands instead of running them, plus a
//! plist fixture writer. Used by the unit and integration tests.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use plist::{Dictionary, Value};

use crate::error::{CodesignError, Result};
use crate::process::{CommandBuilder, ProcessOutput, ProcessRunner};

/// Which recorded command a canned failure applies to.
enum Matcher {
    Program(String),
    LineContaining(String),
}

impl Matcher {
    fn matches(&self, command: &CommandBuilder) -> bool {
        match self {
            Matcher::Program(program) => command.program_name() == *program,
            Matcher::LineContaining(needle) => command.to_command_line().contains(needle.as_str()),
        }
    }
}

/// Records every command instead of running it.
#[derive(Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<CommandBuilder>>,
    responses: Vec<(String, String)>,
    failures: Vec<(Matcher, String)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `program` with `stdout`.
    pub fn responding(mut self, program: &str, stdout: &str) -> Self {
        self.responses.push((program.into(), stdout.into()));
        self
    }

    /// Fail every call to `program` with exit code 1 and `output`.
    pub fn failing_on(mut self, program: &str, output: &str) -> Self {
        self.failures
            .push((Matcher::Program(program.into()), output.into()));
        self
    }

    /// Fail every command whose rendered line contains `needle`.
    pub fn failing_on_line(mut self, needle: &str, output: &str) -> Self {
        self.failures
            .push((Matcher::LineContaining(needle.into()), output.into()));
        self
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(CommandBuilder::to_command_line)
            .collect()
    }

    /// Index of the first recorded command line for which `pred` holds.
    pub fn position(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.command_lines().iter().position(|l| pred(l))
    }

    /// Program and arguments of the `index`th call; empty if there is none.
    pub fn argv(&self, index: usize) -> Vec<String> {
        let calls = self.calls.borrow();
        let Some(cmd) = calls.get(index) else {
            return Vec::new();
        };
        std::iter::once(&cmd.program)
            .chain(cmd.args.iter())
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, command: &CommandBuilder) -> Result<ProcessOutput> {
        self.calls.borrow_mut().push(command.clone());
        let program = command.program_name();

        if let Some((_, output)) = self.failures.iter().find(|(m, _)| m.matches(command)) {
            return Err(CodesignError::ToolFailed {
                program,
                code: "1".into(),
                output: output.clone(),
            });
        }

        let stdout = self
            .responses
            .iter()
            .find(|(p, _)| *p == program)
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(ProcessOutput {
            stdout,
            stderr: String::new(),
        })
    }
}

/// Write an XML plist whose root dictionary holds the given string entries.
pub fn write_info_plist(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CodesignError::io(format!("failed to create {}", parent.display()), e))?;
    }
    let mut root = Dictionary::new();
    for (key, value) in entries {
        root.insert((*key).to_string(), Value::String((*value).to_string()));
    }
    Value::Dictionary(root).to_file_xml(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_match_by_program_or_line() {
        let runner = RecordingRunner::new()
            .failing_on("xattr", "denied")
            .failing_on_line("Broken.app", "not signed");

        assert!(runner.run(&CommandBuilder::new("codesign").arg("Fine.app")).is_ok());
        assert!(runner.run(&CommandBuilder::new("codesign").arg("Broken.app")).is_err());
        assert!(runner.run(&CommandBuilder::new("xattr").arg("-cr")).is_err());

        assert_eq!(runner.command_lines().len(), 3);
        assert_eq!(runner.position(|l| l.ends_with("Broken.app")), Some(1));
        assert_eq!(runner.argv(2), ["xattr", "-cr"]);
        assert!(runner.argv(3).is_empty());
    }
}
