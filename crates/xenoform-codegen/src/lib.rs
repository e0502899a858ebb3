//! C++ source generation for xenoform.
//!
//! - [`declaration`]: host declarations as data
//! - [`signature`]: validation and extraction into [`FunctionSpec`]s
//! - [`emit`]: lambda and registration text for one function
//! - [`headers`]: header grouping
//! - [`module`]: whole-module assembly
//!
//! [`FunctionSpec`]: xenoform_core::FunctionSpec

pub mod declaration;
pub mod emit;
pub mod headers;
pub mod module;
pub mod signature;

pub use declaration::{Annotation, AnnotationExtra, HostFunction, HostParam};
pub use headers::{HeaderGroups, PYBIND11_HEADER, group_headers};
pub use module::{
    AssembledModule, AssemblyOptions, CHECKSUM_PLACEHOLDER, CHECKSUM_SYMBOL, ModuleSpec,
};
pub use signature::{extract, resolve_annotation};
