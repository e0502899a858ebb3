//! # xenoform
//!
//! Compile inline C++ function bodies into native modules on first use.
//!
//! A host declares a function, with its signature and a C++ body, through
//! [`Context::declare`]. Functions declared in the same host module are
//! compiled together into one binding-framework module the first time any of
//! them is resolved. Built artifacts are cached on disk and reused for as
//! long as their content hash matches.
//!
//! ## Pipeline
//!
//! ```text
//! HostFunction --extract--> FunctionSpec --add--> ModuleSpec
//!     --assemble--> source --hash/compile--> artifact --load--> entry point
//! ```
//!
//! - [`xenoform_core`]: type model, type mapper, configuration, errors
//! - [`xenoform_codegen`]: signature extraction and module assembly
//! - this crate: build cache, toolchain driver, loader, registry
//!
//! ## Configuration
//!
//! [`Settings::from_env`] reads `XENOFORM_EXTMODULE_ROOT`,
//! `XENOFORM_DISABLE_FT`, `XENOFORM_CPP_FORMAT` and `XENOFORM_INCLUDE_DIRS`.
//! [`CxxToolchain::from_env`] reads `CXX`.
//!
//! ## Logging
//!
//! Lifecycle events are emitted through `tracing` with target `xenoform`.

#[macro_use]
mod logging;

pub mod context;
pub mod driver;
pub mod format;
pub mod function;
pub mod hash;
pub mod loader;
pub mod record;
pub mod registry;
pub mod settings;
pub mod toolchain;

pub use context::Context;
pub use driver::{BuildCache, BuildOutcome};
pub use format::SourceFormatter;
pub use function::{EntryOf, LazyFunction};
pub use hash::{BuildHash, CACHE_FORMAT_VERSION};
pub use loader::{ArtifactLoader, DylibArtifact, DylibEntry, DylibLoader, LoadedArtifact};
pub use logging::LOG_TARGET;
pub use record::BuildRecord;
pub use registry::{ModuleSlot, Phase, Registry};
pub use settings::Settings;
pub use toolchain::{CompileJob, CxxToolchain, Toolchain, ToolchainOutput};

pub use xenoform_codegen::{
    Annotation, AnnotationExtra, AssembledModule, AssemblyOptions, CHECKSUM_PLACEHOLDER,
    HostFunction, HostParam, ModuleSpec, extract,
};
pub use xenoform_core::{
    AssemblyError, BuildError, CompileConfig, Container, DeclarationError, FunctionKind,
    FunctionSpec, LoadError, Primitive, QualifiedName, Qualifier, ReturnValuePolicy, TypeError,
    TypeNode, XenoformError, map_type,
};

pub type Result<T> = std::result::Result<T, XenoformError>;
