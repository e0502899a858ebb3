//! Core data model for xenoform.
//!
//! This crate holds the pieces every other stage depends on:
//!
//! - [`types`]: the closed [`TypeNode`] model of host type annotations
//! - [`qualifier`]: reference/pointer [`Qualifier`]s
//! - [`mapper`]: the host-to-target type mapper and header inference
//! - [`config`]: per-declaration [`CompileConfig`]
//! - [`function`]: normalized [`FunctionSpec`]s
//! - [`error`]: the error hierarchy shared by all stages

pub mod config;
pub mod error;
pub mod function;
pub mod mapper;
mod qualified_name;
pub mod qualifier;
pub mod types;

pub use config::{
    CompileConfig, DEFAULT_LANGUAGE_STANDARD, Platform, ReturnValuePolicy, ToolchainSignature,
    deduplicate, parse_macros, platform_specific,
};
pub use error::{AssemblyError, BuildError, DeclarationError, LoadError, TypeError, XenoformError};
pub use function::{FunctionKind, FunctionSpec, ParamFlags, ParameterSpec};
pub use mapper::{map_type, required_headers};
pub use qualified_name::QualifiedName;
pub use qualifier::Qualifier;
pub use types::{Container, Primitive, TypeNode, TypeTag};
