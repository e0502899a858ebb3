//! Best-effort formatting of generated source.

use std::path::Path;
use std::process::Command;

pub const CLANG_FORMAT: &str = "clang-format";

/// Runs `clang-format` in place. Failures are logged, never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFormatter {
    program: String,
    style: Option<String>,
}

impl SourceFormatter {
    pub fn new(style: Option<&str>) -> Self {
        Self {
            program: CLANG_FORMAT.to_string(),
            style: style.map(str::to_string),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.style.is_some()
    }

    /// Format `path` in place. Returns whether the file was formatted.
    pub fn format(&self, path: &Path) -> bool {
        let Some(style) = &self.style else {
            return false;
        };
        let result = Command::new(&self.program)
            .arg("-i")
            .arg(format!("--style={style}"))
            .arg(path)
            .output();
        match result {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                tracing::warn!(
                    target: "xenoform",
                    path = %path.display(),
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                false
            }
            Err(err) => {
                tracing::warn!(
                    target: "xenoform",
                    path = %path.display(),
                    "could not run {}: {err}",
                    self.program
                );
                false
            }
        }
    }
}
