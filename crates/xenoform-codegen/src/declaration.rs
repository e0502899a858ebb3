//! Host declarations as data.
//!
//! The host runtime reflects a decorated function into a [`HostFunction`]:
//! its qualified name, owning module, parameters with their annotations and
//! defaults, the return annotation and the verbatim target-language body.
//! Nothing here is validated; that is the job of
//! [`extract`](crate::signature::extract).

use std::fmt;

use xenoform_core::{FunctionKind, ParamFlags, Qualifier, TypeNode};

/// Extra metadata attached to a host annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotationExtra {
    /// Emit this target type verbatim instead of mapping the base type.
    Override(String),
    /// Pass the mapped type by reference or pointer.
    Qualifier(Qualifier),
}

/// A host type annotation, optionally wrapped with extras.
///
/// ```
/// use xenoform_codegen::{Annotation, AnnotationExtra};
/// use xenoform_core::{Primitive, Qualifier, TypeNode};
///
/// let text = Annotation::qualified(TypeNode::primitive(Primitive::Str), Qualifier::CRef);
/// assert_eq!(text.to_string(), "Annotated[str, CRef]");
///
/// let fixed = Annotation::overridden(TypeNode::primitive(Primitive::Int), "uint64_t");
/// assert!(matches!(fixed, Annotation::Annotated { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Annotation {
    Plain(TypeNode),
    Annotated {
        base: Box<Annotation>,
        extras: Vec<AnnotationExtra>,
    },
}

impl Annotation {
    pub fn annotated(base: impl Into<Annotation>, extras: Vec<AnnotationExtra>) -> Self {
        Annotation::Annotated {
            base: Box::new(base.into()),
            extras,
        }
    }

    pub fn overridden(base: impl Into<Annotation>, target: impl Into<String>) -> Self {
        Self::annotated(base, vec![AnnotationExtra::Override(target.into())])
    }

    pub fn qualified(base: impl Into<Annotation>, qualifier: Qualifier) -> Self {
        Self::annotated(base, vec![AnnotationExtra::Qualifier(qualifier)])
    }

    /// The innermost host type.
    pub fn base_type(&self) -> &TypeNode {
        match self {
            Annotation::Plain(node) => node,
            Annotation::Annotated { base, .. } => base.base_type(),
        }
    }
}

impl From<TypeNode> for Annotation {
    fn from(node: TypeNode) -> Self {
        Annotation::Plain(node)
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Plain(node) => write!(f, "{node}"),
            Annotation::Annotated { base, extras } => {
                write!(f, "Annotated[{base}")?;
                for extra in extras {
                    match extra {
                        AnnotationExtra::Override(target) => write!(f, ", \"{target}\"")?,
                        AnnotationExtra::Qualifier(q) => write!(f, ", {q}")?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostParam {
    pub name: String,
    pub annotation: Option<Annotation>,
    /// Default expression, as written.
    pub default: Option<String>,
    pub flags: ParamFlags,
}

impl HostParam {
    pub fn new(name: impl Into<String>, annotation: impl Into<Annotation>) -> Self {
        Self {
            name: name.into(),
            annotation: Some(annotation.into()),
            default: None,
            flags: ParamFlags::empty(),
        }
    }

    pub fn unannotated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            default: None,
            flags: ParamFlags::empty(),
        }
    }

    /// `*name`
    pub fn var_positional(name: impl Into<String>, annotation: impl Into<Annotation>) -> Self {
        Self::new(name, annotation).with_flags(ParamFlags::VAR_POSITIONAL)
    }

    /// `**name`
    pub fn var_keyword(name: impl Into<String>, annotation: impl Into<Annotation>) -> Self {
        Self::new(name, annotation).with_flags(ParamFlags::VAR_KEYWORD)
    }

    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    pub fn positional_only(self) -> Self {
        self.with_flags(ParamFlags::POSITIONAL_ONLY)
    }

    pub fn keyword_only(self) -> Self {
        self.with_flags(ParamFlags::KEYWORD_ONLY)
    }

    fn with_flags(mut self, flags: ParamFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// A reflected host function declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostFunction {
    /// Dotted host name, e.g. `max` or `Vec.norm`.
    pub qualname: String,
    /// Owning module identity (the host source file stem).
    pub module: String,
    pub kind: FunctionKind,
    pub params: Vec<HostParam>,
    pub returns: Option<Annotation>,
    /// Target-language body text.
    pub body: String,
    /// Names the host function closes over from enclosing scopes.
    pub captures: Vec<String>,
}

impl HostFunction {
    pub fn new(
        qualname: impl Into<String>,
        module: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            qualname: qualname.into(),
            module: module.into(),
            kind: FunctionKind::Free,
            params: Vec::new(),
            returns: None,
            body: body.into(),
            captures: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: FunctionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn param(mut self, param: HostParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, annotation: impl Into<Annotation>) -> Self {
        self.returns = Some(annotation.into());
        self
    }

    pub fn capture(mut self, name: impl Into<String>) -> Self {
        self.captures.push(name.into());
        self
    }
}
