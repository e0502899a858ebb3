//! Content hashing for build-cache validity.
//!
//! The hash covers everything that can change the compiled artifact: the
//! assembled source (placeholder still in place), every function's full
//! configuration, the language standard and the free-threading flag. Inputs
//! are encoded through serde so the byte stream is canonical: struct fields
//! serialize in declaration order and sequences keep their order.

use std::fmt;

use serde::{Deserialize, Serialize};
use xenoform_codegen::{AssembledModule, AssemblyOptions, ModuleSpec};
use xenoform_core::{BuildError, CompileConfig};
use xxhash_rust::xxh3::xxh3_128;

/// Bumped whenever the generated source or the hash encoding changes shape.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct HashInput<'a> {
    format_version: u32,
    module: &'a str,
    source: &'a str,
    language_standard: u32,
    free_threaded: bool,
    functions: Vec<FunctionInput<'a>>,
}

#[derive(Serialize)]
struct FunctionInput<'a> {
    entry: String,
    config: &'a CompileConfig,
}

/// Hex-encoded 128-bit content hash of a module build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildHash(String);

impl BuildHash {
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compute(
        module: &ModuleSpec,
        assembled: &AssembledModule,
        options: &AssemblyOptions,
    ) -> Result<Self, BuildError> {
        let input = HashInput {
            format_version: CACHE_FORMAT_VERSION,
            module: module.name(),
            source: &assembled.text,
            language_standard: module.language_standard(),
            free_threaded: options.free_threaded,
            functions: module
                .functions()
                .iter()
                .map(|f| FunctionInput {
                    entry: f.entry_name(),
                    config: &f.config,
                })
                .collect(),
        };
        let encoded = serde_json::to_vec(&input).map_err(|e| BuildError::Encoding {
            module: module.name().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_bytes(&encoded))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        BuildHash(format!("{:032x}", xxh3_128(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
