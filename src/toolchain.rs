//! Compiler toolchain seam.
//!
//! The build driver only needs "turn this source into a loadable artifact".
//! [`CxxToolchain`] does that with a command-line C++ compiler; tests plug in
//! their own [`Toolchain`].

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use xenoform_codegen::ModuleSpec;
use xenoform_core::{deduplicate, parse_macros};

use crate::settings::Settings;

/// Compiler used when `CXX` is not set.
pub const DEFAULT_COMPILER: &str = "c++";

/// Everything needed to compile one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    pub module: String,
    pub source: PathBuf,
    pub output: PathBuf,
    pub working_dir: PathBuf,
    pub language_standard: u32,
    /// `(name, value)` pairs, deduplicated.
    pub define_macros: Vec<(String, Option<String>)>,
    /// Base include directories followed by the module's extra paths.
    pub include_dirs: Vec<PathBuf>,
    pub compile_args: Vec<String>,
    pub link_args: Vec<String>,
}

impl CompileJob {
    pub fn new(
        module: &ModuleSpec,
        settings: &Settings,
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        let source = source.into();
        let working_dir = source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let (macros, paths, compile_args, link_args) = match module.toolchain_config() {
            Some(config) => (
                parse_macros(&deduplicate(&config.define_macros)),
                deduplicate(&config.extra_include_paths),
                deduplicate(&config.extra_compile_args),
                deduplicate(&config.extra_link_args),
            ),
            None => Default::default(),
        };
        let mut include_dirs = settings.include_dirs.clone();
        include_dirs.extend(paths.into_iter().map(PathBuf::from));

        Self {
            module: module.name().to_string(),
            source,
            output: output.into(),
            working_dir,
            language_standard: module.language_standard(),
            define_macros: macros,
            include_dirs,
            compile_args,
            link_args,
        }
    }
}

/// Result of one toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainOutput {
    pub success: bool,
    /// The command as run, for the build log.
    pub command: String,
    /// Raw compiler output.
    pub diagnostics: String,
}

impl ToolchainOutput {
    /// Full text for `build.log`.
    pub fn log_text(&self) -> String {
        format!("$ {}\n{}", self.command, self.diagnostics)
    }
}

pub trait Toolchain: Send + Sync {
    fn compile(&self, job: &CompileJob) -> ToolchainOutput;

    /// File name of the artifact produced for `module`.
    fn artifact_file_name(&self, module: &str) -> String {
        format!("{module}{}", env::consts::DLL_SUFFIX)
    }
}

/// Runs a command-line C++ compiler to build a shared library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CxxToolchain {
    compiler: PathBuf,
}

impl Default for CxxToolchain {
    fn default() -> Self {
        Self::new(DEFAULT_COMPILER)
    }
}

impl CxxToolchain {
    pub fn new(compiler: impl Into<PathBuf>) -> Self {
        Self {
            compiler: compiler.into(),
        }
    }

    /// Use `CXX` if set, otherwise [`DEFAULT_COMPILER`].
    #[must_use]
    pub fn from_env() -> Self {
        match env::var_os("CXX").filter(|v| !v.is_empty()) {
            Some(compiler) => Self::new(compiler),
            None => Self::default(),
        }
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    pub fn command(&self, job: &CompileJob) -> Command {
        let mut cmd = Command::new(&self.compiler);
        cmd.current_dir(&job.working_dir);
        cmd.arg("-shared")
            .arg("-fPIC")
            .arg("-fvisibility=hidden")
            .arg(format!("-std=c++{}", job.language_standard));
        if cfg!(target_os = "macos") {
            cmd.args(["-undefined", "dynamic_lookup"]);
        }
        for (name, value) in &job.define_macros {
            match value {
                Some(value) => cmd.arg(format!("-D{name}={value}")),
                None => cmd.arg(format!("-D{name}")),
            };
        }
        for dir in &job.include_dirs {
            cmd.arg("-I").arg(dir);
        }
        cmd.args(&job.compile_args);
        cmd.arg(&job.source).arg("-o").arg(&job.output);
        cmd.args(&job.link_args);
        cmd
    }
}

impl Toolchain for CxxToolchain {
    fn compile(&self, job: &CompileJob) -> ToolchainOutput {
        let mut cmd = self.command(job);
        let command = format!("{cmd:?}");
        match cmd.output() {
            Ok(output) => {
                let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
                diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
                if !output.status.success() && diagnostics.is_empty() {
                    diagnostics = format!("compiler exited with status {}", output.status);
                }
                ToolchainOutput {
                    success: output.status.success(),
                    command,
                    diagnostics,
                }
            }
            Err(err) => ToolchainOutput {
                success: false,
                command,
                diagnostics: format!(
                    "failed to spawn {}: {err}",
                    self.compiler.display()
                ),
            },
        }
    }
}
