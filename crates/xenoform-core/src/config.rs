//! Per-declaration compile settings.
//!
//! [`CompileConfig`] carries every option a host declaration can pass. The
//! subset that changes how the toolchain is invoked is exposed as a
//! [`ToolchainSignature`]; all functions in one module must share it.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// Default target language standard (C++20).
pub const DEFAULT_LANGUAGE_STANDARD: u32 = 20;

/// How the binding framework manages ownership of returned values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ReturnValuePolicy {
    #[default]
    Automatic,
    AutomaticReference,
    TakeOwnership,
    Copy,
    Move,
    Reference,
    ReferenceInternal,
}

impl ReturnValuePolicy {
    /// Spelling inside the binding framework's namespace.
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnValuePolicy::Automatic => "automatic",
            ReturnValuePolicy::AutomaticReference => "automatic_reference",
            ReturnValuePolicy::TakeOwnership => "take_ownership",
            ReturnValuePolicy::Copy => "copy",
            ReturnValuePolicy::Move => "move",
            ReturnValuePolicy::Reference => "reference",
            ReturnValuePolicy::ReferenceInternal => "reference_internal",
        }
    }
}

impl fmt::Display for ReturnValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "py::return_value_policy::{}", self.as_str())
    }
}

/// Options recognized at declaration time.
///
/// Field order is part of the build hash encoding, append new fields at the
/// end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CompileConfig {
    /// Also register a broadcasting (vectorized) entry point.
    pub vectorize: bool,
    /// `NAME` or `NAME=VALUE` preprocessor definitions.
    pub define_macros: Vec<String>,
    /// Headers or inline code to add to the module.
    pub extra_includes: Vec<String>,
    pub extra_include_paths: Vec<String>,
    pub extra_compile_args: Vec<String>,
    pub extra_link_args: Vec<String>,
    pub language_standard: u32,
    pub return_value_policy: ReturnValuePolicy,
    /// Docstring attached to the compiled function.
    pub help: Option<String>,
    /// Report lifecycle events at info level.
    pub verbose: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            vectorize: false,
            define_macros: Vec::new(),
            extra_includes: Vec::new(),
            extra_include_paths: Vec::new(),
            extra_compile_args: Vec::new(),
            extra_link_args: Vec::new(),
            language_standard: DEFAULT_LANGUAGE_STANDARD,
            return_value_policy: ReturnValuePolicy::Automatic,
            help: None,
            verbose: false,
        }
    }
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl CompileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vectorize(mut self, vectorize: bool) -> Self {
        self.vectorize = vectorize;
        self
    }

    pub fn define_macros<I: IntoIterator<Item = S>, S: Into<String>>(mut self, macros: I) -> Self {
        self.define_macros = strings(macros);
        self
    }

    pub fn extra_includes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, includes: I) -> Self {
        self.extra_includes = strings(includes);
        self
    }

    pub fn extra_include_paths<I: IntoIterator<Item = S>, S: Into<String>>(mut self, paths: I) -> Self {
        self.extra_include_paths = strings(paths);
        self
    }

    pub fn extra_compile_args<I: IntoIterator<Item = S>, S: Into<String>>(mut self, args: I) -> Self {
        self.extra_compile_args = strings(args);
        self
    }

    pub fn extra_link_args<I: IntoIterator<Item = S>, S: Into<String>>(mut self, args: I) -> Self {
        self.extra_link_args = strings(args);
        self
    }

    pub fn language_standard(mut self, standard: u32) -> Self {
        self.language_standard = standard;
        self
    }

    pub fn return_value_policy(mut self, policy: ReturnValuePolicy) -> Self {
        self.return_value_policy = policy;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The settings that must agree across a module.
    pub fn toolchain_signature(&self) -> ToolchainSignature<'_> {
        ToolchainSignature {
            language_standard: self.language_standard,
            define_macros: &self.define_macros,
            extra_include_paths: &self.extra_include_paths,
            extra_compile_args: &self.extra_compile_args,
            extra_link_args: &self.extra_link_args,
        }
    }
}

/// Borrowed view of the toolchain-affecting fields of a [`CompileConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolchainSignature<'a> {
    pub language_standard: u32,
    pub define_macros: &'a [String],
    pub extra_include_paths: &'a [String],
    pub extra_compile_args: &'a [String],
    pub extra_link_args: &'a [String],
}

impl ToolchainSignature<'_> {
    /// First field that differs, with both values rendered for diagnostics.
    pub fn first_difference(&self, other: &Self) -> Option<(&'static str, String, String)> {
        if self.language_standard != other.language_standard {
            return Some((
                "language_standard",
                self.language_standard.to_string(),
                other.language_standard.to_string(),
            ));
        }
        let lists = [
            ("define_macros", self.define_macros, other.define_macros),
            ("extra_include_paths", self.extra_include_paths, other.extra_include_paths),
            ("extra_compile_args", self.extra_compile_args, other.extra_compile_args),
            ("extra_link_args", self.extra_link_args, other.extra_link_args),
        ];
        lists
            .into_iter()
            .find(|(_, a, b)| a != b)
            .map(|(field, a, b)| (field, format!("{a:?}"), format!("{b:?}")))
    }
}

/// Remove duplicates while preserving first-seen order.
pub fn deduplicate<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    items
        .iter()
        .map(|item| item.as_ref())
        .filter(|item| seen.insert(*item))
        .map(str::to_string)
        .collect()
}

/// Split `["DEF1", "DEF2=3"]` into `[("DEF1", None), ("DEF2", Some("3"))]`.
pub fn parse_macros<S: AsRef<str>>(macros: &[S]) -> Vec<(String, Option<String>)> {
    macros
        .iter()
        .map(|m| match m.as_ref().split_once('=') {
            Some((name, value)) => (name.to_string(), Some(value.to_string())),
            None => (m.as_ref().to_string(), None),
        })
        .collect()
}

/// Host platforms with platform-specific settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
}

impl Platform {
    /// The platform this process runs on, if it is one of the known ones.
    pub fn current() -> Option<Self> {
        match std::env::consts::OS {
            "linux" => Some(Platform::Linux),
            "macos" => Some(Platform::Darwin),
            "windows" => Some(Platform::Windows),
            _ => None,
        }
    }
}

/// Pick the settings for the current platform, if any were given.
pub fn platform_specific(settings: &FxHashMap<Platform, Vec<String>>) -> Option<Vec<String>> {
    Platform::current().and_then(|p| settings.get(&p).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CompileConfig::default();
        assert!(!config.vectorize);
        assert_eq!(config.language_standard, 20);
        assert_eq!(config.return_value_policy, ReturnValuePolicy::Automatic);
        assert!(config.help.is_none());
        assert!(!config.verbose);
    }

    #[test]
    fn policy_display() {
        assert_eq!(
            ReturnValuePolicy::ReferenceInternal.to_string(),
            "py::return_value_policy::reference_internal"
        );
        assert_eq!(
            ReturnValuePolicy::default().to_string(),
            "py::return_value_policy::automatic"
        );
    }

    #[test]
    fn signature_ignores_per_function_fields() {
        let a = CompileConfig::new().help("a").vectorize(true);
        let b = CompileConfig::new()
            .return_value_policy(ReturnValuePolicy::Copy)
            .extra_includes(["<numeric>"]);
        assert_eq!(a.toolchain_signature(), b.toolchain_signature());
        assert!(a.toolchain_signature().first_difference(&b.toolchain_signature()).is_none());
    }

    #[test]
    fn signature_reports_first_difference() {
        let a = CompileConfig::new().language_standard(20);
        let b = CompileConfig::new().language_standard(17);
        assert_eq!(
            a.toolchain_signature().first_difference(&b.toolchain_signature()),
            Some(("language_standard", "20".to_string(), "17".to_string()))
        );

        let c = CompileConfig::new().define_macros(["NDEBUG"]);
        let (field, _, requested) = a
            .toolchain_signature()
            .first_difference(&c.toolchain_signature())
            .unwrap();
        assert_eq!(field, "define_macros");
        assert_eq!(requested, "[\"NDEBUG\"]");
    }

    #[test]
    fn parse_macros_splits_values() {
        assert!(parse_macros::<&str>(&[]).is_empty());
        assert_eq!(parse_macros(&["NDEBUG"]), vec![("NDEBUG".to_string(), None)]);
        assert_eq!(
            parse_macros(&["VER=3"]),
            vec![("VER".to_string(), Some("3".to_string()))]
        );
        assert_eq!(
            parse_macros(&["NDEBUG", "VER=3"]),
            vec![
                ("NDEBUG".to_string(), None),
                ("VER".to_string(), Some("3".to_string()))
            ]
        );
    }

    #[test]
    fn deduplicate_keeps_first_seen_order() {
        assert_eq!(
            deduplicate(&["b", "a", "b", "c", "a"]),
            vec!["b".to_string(), "a".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn platform_specific_settings() {
        assert!(platform_specific(&FxHashMap::default()).is_none());

        let mut settings = FxHashMap::default();
        settings.insert(Platform::Linux, vec!["linux".to_string()]);
        settings.insert(Platform::Darwin, vec!["darwin".to_string()]);
        settings.insert(Platform::Windows, vec!["windows".to_string()]);

        let expected = match Platform::current() {
            Some(Platform::Linux) => Some(vec!["linux".to_string()]),
            Some(Platform::Darwin) => Some(vec!["darwin".to_string()]),
            Some(Platform::Windows) => Some(vec!["windows".to_string()]),
            None => None,
        };
        assert_eq!(platform_specific(&settings), expected);
    }
}
