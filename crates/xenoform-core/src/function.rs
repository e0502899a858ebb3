//! Normalized function specifications.
//!
//! A [`FunctionSpec`] is produced once per host declaration by the signature
//! extractor and never changes afterwards. It carries everything the module
//! assembler needs: parameter types and qualifiers, the return type, the
//! verbatim body text and the compile settings.

use bitflags::bitflags;

use crate::config::CompileConfig;
use crate::qualified_name::QualifiedName;
use crate::qualifier::Qualifier;
use crate::types::TypeNode;

bitflags! {
    /// Calling-convention flags of a host parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamFlags: u8 {
        /// May only be passed positionally (declared before `/`).
        const POSITIONAL_ONLY = 1 << 0;
        /// May only be passed by keyword (declared after `*`).
        const KEYWORD_ONLY = 1 << 1;
        /// Collects extra positional arguments (`*args`).
        const VAR_POSITIONAL = 1 << 2;
        /// Collects extra keyword arguments (`**kwargs`).
        const VAR_KEYWORD = 1 << 3;
    }
}

impl ParamFlags {
    pub fn is_variadic(self) -> bool {
        self.intersects(ParamFlags::VAR_POSITIONAL | ParamFlags::VAR_KEYWORD)
    }
}

/// One parameter of a function specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: TypeNode,
    pub qualifier: Qualifier,
    /// Default value as written at the declaration site.
    pub default: Option<String>,
    pub flags: ParamFlags,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, ty: TypeNode) -> Self {
        Self {
            name: name.into(),
            ty,
            qualifier: Qualifier::Auto,
            default: None,
            flags: ParamFlags::empty(),
        }
    }

    pub fn is_variadic(&self) -> bool {
        self.flags.is_variadic()
    }
}

/// What kind of callable the host declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FunctionKind {
    /// Module-level function.
    #[default]
    Free,
    /// Method bound to an instance; the first parameter is the instance.
    Instance,
    /// Method bound to a class; the first parameter is the class.
    Class,
    /// Method with no binding context.
    Static,
}

impl FunctionKind {
    /// Whether the first parameter identifies the binding context.
    pub fn has_context_param(self) -> bool {
        matches!(self, FunctionKind::Instance | FunctionKind::Class)
    }
}

/// A normalized, immutable description of one compiled function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSpec {
    pub name: QualifiedName,
    /// Identity of the owning module (derived from the host source file).
    pub module: String,
    pub kind: FunctionKind,
    pub params: Vec<ParameterSpec>,
    pub return_type: TypeNode,
    pub return_qualifier: Qualifier,
    /// Target-language body, verbatim.
    pub body: String,
    pub config: CompileConfig,
}

impl FunctionSpec {
    /// Name of the compiled entry point within the module.
    pub fn entry_name(&self) -> String {
        self.name.entry_name()
    }

    pub fn is_vectorized(&self) -> bool {
        self.config.vectorize
    }

    /// Parameters that go through type mapping (everything but `*args` and
    /// `**kwargs`).
    pub fn mapped_params(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params.iter().filter(|p| !p.is_variadic())
    }
}
