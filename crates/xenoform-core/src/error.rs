//! Unified error types for xenoform.
//!
//! Every phase of turning a host declaration into a redirected native
//! function has its own error type. They are collected under
//! [`XenoformError`] for callers that only care about the outcome.
//!
//! ## Error Hierarchy
//!
//! ```text
//! XenoformError (top-level wrapper)
//! ├── TypeError         - a host type that cannot be mapped (UnsupportedType)
//! ├── DeclarationError  - signature extraction failures
//! ├── AssemblyError     - module assembly failures (ConflictingConfig, ...)
//! ├── BuildError        - toolchain failures (BuildFailure)
//! └── LoadError         - artifact loading failures (LoadFailure)
//! ```
//!
//! Type, declaration and assembly errors are permanent for a declaration.
//! Build and load errors are retried on the next call, see
//! [`XenoformError::is_retryable`].
//!
//! All errors are `Clone` so that a single build failure can be handed to
//! every thread that was waiting on that build.

use std::path::PathBuf;

use thiserror::Error;

use crate::qualifier::Qualifier;

// ============================================================================
// Type Errors
// ============================================================================

/// A host type that has no target-language equivalent (UnsupportedType).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// No default mapping exists and no override was given.
    #[error("no target type for '{ty}' and no override provided")]
    Unmapped { ty: String },

    /// An override attached to an element inside another type.
    #[error("override on nested element of '{ty}': overrides apply only to the outermost type")]
    NestedOverride { ty: String },

    /// An ellipsis nested inside a container, union, optional or callable.
    #[error("'...' is not supported inside '{ty}'")]
    NestedEllipsis { ty: String },

    /// `None` used as an element of another type.
    #[error("'None' is not supported inside '{ty}'")]
    NestedNone { ty: String },

    /// A reference or pointer qualifier on `None`.
    #[error("qualifier {qualifier} cannot be applied to 'None'")]
    QualifiedNone { qualifier: Qualifier },

    /// An annotation applied to an ellipsis nested inside a container.
    #[error("annotated '...' inside '{ty}' is not supported")]
    AnnotatedNestedEllipsis { ty: String },

    /// An annotation applied to an already annotated type.
    #[error("annotation applied to already annotated type '{ty}'")]
    NestedAnnotation { ty: String },

    /// The same kind of annotation given twice at one position.
    #[error("more than one {kind} annotation on '{ty}'")]
    DuplicateAnnotation { ty: String, kind: &'static str },

    /// An annotation wrapper with nothing in it.
    #[error("empty annotation on '{ty}'")]
    EmptyAnnotation { ty: String },

    /// Wrong number of type arguments.
    #[error("'{ty}' expects {expected} type argument(s), got {got}")]
    Arity {
        ty: String,
        expected: &'static str,
        got: usize,
    },
}

// ============================================================================
// Declaration Errors
// ============================================================================

/// Errors raised while extracting a function specification from a host
/// declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// A parameter or return type could not be mapped.
    #[error("in '{function}' ({position}): {source}")]
    UnsupportedType {
        function: String,
        position: String,
        source: TypeError,
    },

    /// Parameters (or the return value) without annotations.
    #[error("function '{function}' has missing annotations: {}", missing.join(", "))]
    MissingAnnotations {
        function: String,
        missing: Vec<String>,
    },

    /// A method whose first parameter does not identify its binding context.
    #[error("method '{function}' must annotate its first (context) parameter")]
    MissingContextAnnotation { function: String },

    /// Closures over enclosing scope, or recursion across the host boundary.
    #[error("function '{function}' uses an unsupported construct: {construct}")]
    UnsupportedConstruct { function: String, construct: String },
}

impl DeclarationError {
    /// The host name of the function that failed.
    pub fn function(&self) -> &str {
        match self {
            DeclarationError::UnsupportedType { function, .. } => function,
            DeclarationError::MissingAnnotations { function, .. } => function,
            DeclarationError::MissingContextAnnotation { function } => function,
            DeclarationError::UnsupportedConstruct { function, .. } => function,
        }
    }
}

// ============================================================================
// Assembly Errors
// ============================================================================

/// Errors raised while grouping functions into a module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// Two functions in one module disagree on a toolchain-affecting setting.
    #[error(
        "conflicting '{field}' for '{function}' in module '{module}': module uses {existing}, function requests {requested}"
    )]
    ConflictingConfig {
        module: String,
        function: String,
        field: &'static str,
        existing: String,
        requested: String,
    },

    /// Two functions would register the same entry point.
    #[error("duplicate function '{name}' in module '{module}'")]
    DuplicateFunction { module: String, name: String },

    /// A function declared for a different module.
    #[error("function '{function}' belongs to module '{declared}', not '{module}'")]
    ForeignFunction {
        module: String,
        function: String,
        declared: String,
    },

    /// A function declared after its module was already compiled and loaded.
    #[error("module '{module}' is already compiled, cannot add '{function}'")]
    ModuleAlreadyCompiled { module: String, function: String },

    /// A function whose types no longer map (it bypassed extraction).
    #[error("in module '{module}', function '{function}': {source}")]
    UnsupportedType {
        module: String,
        function: String,
        source: TypeError,
    },
}

// ============================================================================
// Build Errors
// ============================================================================

/// Errors raised while producing an artifact (BuildFailure).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The toolchain failed. `diagnostics` is its raw output.
    #[error("build of module '{module}' failed:\n{diagnostics}")]
    Toolchain { module: String, diagnostics: String },

    /// The working area could not be written.
    #[error("i/o error at '{}': {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// Build metadata could not be encoded.
    #[error("failed to encode build metadata for module '{module}': {message}")]
    Encoding { module: String, message: String },
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Load Errors
// ============================================================================

/// Errors raised while loading an artifact or resolving its entry points
/// (LoadFailure).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The artifact exists but could not be loaded.
    #[error("failed to load '{}': {message}", path.display())]
    Load { path: PathBuf, message: String },

    /// The artifact does not provide an expected entry point.
    #[error("module '{module}' has no entry point '{name}'")]
    MissingEntry { module: String, name: String },
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// The unified error type for all xenoform operations.
///
/// Each variant uses `#[from]` so the `?` operator converts phase errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XenoformError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl XenoformError {
    /// Build and load failures may succeed on a later call, everything else
    /// is permanent for the declaration that caused it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, XenoformError::Build(_) | XenoformError::Load(_))
    }

    pub fn is_build(&self) -> bool {
        matches!(self, XenoformError::Build(_))
    }

    pub fn is_load(&self) -> bool {
        matches!(self, XenoformError::Load(_))
    }

    pub fn is_assembly(&self) -> bool {
        matches!(self, XenoformError::Assembly(_))
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self, XenoformError::Declaration(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
