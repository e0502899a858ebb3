//! Process-wide settings read from the environment.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Root directory for generated modules.
pub const ENV_EXTMODULE_ROOT: &str = "XENOFORM_EXTMODULE_ROOT";
/// Present (with any value) to build modules that keep the interpreter lock.
pub const ENV_DISABLE_FT: &str = "XENOFORM_DISABLE_FT";
/// `clang-format` style, or `none` to leave generated source unformatted.
pub const ENV_CPP_FORMAT: &str = "XENOFORM_CPP_FORMAT";
/// Platform path list of include directories every build needs.
pub const ENV_INCLUDE_DIRS: &str = "XENOFORM_INCLUDE_DIRS";

pub const DEFAULT_EXTMODULE_ROOT: &str = "./ext";
pub const DEFAULT_CPP_FORMAT: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub extmodule_root: PathBuf,
    pub disable_ft: bool,
    pub cpp_format: String,
    /// Base include directories (binding framework, numpy, host headers).
    pub include_dirs: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extmodule_root: PathBuf::from(DEFAULT_EXTMODULE_ROOT),
            disable_ft: false,
            cpp_format: DEFAULT_CPP_FORMAT.to_string(),
            include_dirs: Vec::new(),
        }
    }
}

impl Settings {
    /// Defaults with a different artifact root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            extmodule_root: root.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Read settings through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let mut settings = Self::default();
        if let Some(root) = lookup(ENV_EXTMODULE_ROOT).filter(|v| !v.is_empty()) {
            settings.extmodule_root = PathBuf::from(root);
        }
        settings.disable_ft = lookup(ENV_DISABLE_FT).is_some();
        if let Some(style) = lookup(ENV_CPP_FORMAT) {
            settings.cpp_format = style.to_string_lossy().trim().to_string();
        }
        if let Some(dirs) = lookup(ENV_INCLUDE_DIRS) {
            settings.include_dirs = env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        settings
    }

    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn cpp_format(mut self, style: impl Into<String>) -> Self {
        self.cpp_format = style.into();
        self
    }

    pub fn disable_free_threading(mut self, disable: bool) -> Self {
        self.disable_ft = disable;
        self
    }

    /// Working directory for one module: `<root>/<module>_ext`.
    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.extmodule_root.join(format!("{module}_ext"))
    }

    pub fn root(&self) -> &Path {
        &self.extmodule_root
    }

    /// Formatter style, `None` when formatting is disabled.
    pub fn format_style(&self) -> Option<&str> {
        match self.cpp_format.as_str() {
            "" | "none" => None,
            style => Some(style),
        }
    }

    /// Free-threaded modules need a free-threaded host and no opt-out.
    pub fn build_free_threaded(&self, host_free_threaded: bool) -> bool {
        host_free_threaded && !self.disable_ft
    }
}
