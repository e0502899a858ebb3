//! Host type model.
//!
//! [`TypeNode`] is a closed, tagged description of a host type annotation.
//! It replaces runtime type inspection: a host-side shim turns each annotation
//! into a `TypeNode` tree once, and everything downstream (the type mapper,
//! header inference, hashing) is a pure function over that tree.
//!
//! # Example
//!
//! ```
//! use xenoform_core::{Container, Primitive, TypeNode};
//!
//! // dict[str, list[float]]
//! let ty = TypeNode::container(
//!     Container::Dict,
//!     vec![
//!         TypeNode::primitive(Primitive::Str),
//!         TypeNode::container(Container::List, vec![TypeNode::primitive(Primitive::Float)]),
//!     ],
//! );
//! assert_eq!(ty.to_string(), "dict[str, list[float]]");
//! ```

use std::fmt;

/// Scalar host types with a fixed target mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// The absent value (`None`), mapped to `void`.
    None,
    Int,
    Int32,
    Int64,
    Bool,
    Float,
    Float32,
    Float64,
    Complex,
    Complex64,
    Complex128,
    Str,
    Bytes,
    ByteArray,
    Slice,
    /// A host type object (`type`).
    Type,
    /// A host class with no default mapping. Only usable with an override.
    Class(String),
}

impl Primitive {
    /// Host-side spelling, used for diagnostics.
    pub fn host_name(&self) -> &str {
        match self {
            Primitive::None => "None",
            Primitive::Int => "int",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Bool => "bool",
            Primitive::Float => "float",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::Complex => "complex",
            Primitive::Complex64 => "complex64",
            Primitive::Complex128 => "complex128",
            Primitive::Str => "str",
            Primitive::Bytes => "bytes",
            Primitive::ByteArray => "bytearray",
            Primitive::Slice => "slice",
            Primitive::Type => "type",
            Primitive::Class(name) => name,
        }
    }
}

/// Generic host containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// Ordered sequence (`list[T]`).
    List,
    /// Set (`set[T]`).
    Set,
    /// Immutable unique set (`frozenset[T]`).
    FrozenSet,
    /// Mapping (`dict[K, V]`).
    Dict,
    /// Fixed heterogeneous sequence (`tuple[A, B, ...]`).
    Tuple,
    /// N-dimensional numeric array (`NDArray[T]`).
    Array,
}

impl Container {
    pub fn host_name(self) -> &'static str {
        match self {
            Container::List => "list",
            Container::Set => "set",
            Container::FrozenSet => "frozenset",
            Container::Dict => "dict",
            Container::Tuple => "tuple",
            Container::Array => "NDArray",
        }
    }

    /// Number of type arguments the container takes, `None` if variable.
    pub fn arity(self) -> Option<usize> {
        match self {
            Container::List | Container::Set | Container::FrozenSet | Container::Array => Some(1),
            Container::Dict => Some(2),
            Container::Tuple => None,
        }
    }
}

/// The closed set of type tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Primitive(Primitive),
    Container(Container),
    /// Exactly one present type or absence.
    Optional,
    /// Two or more alternatives, order significant.
    Union,
    /// Children are the return type followed by the parameter types.
    Callable,
    /// Ellipsis / variadic slice marker.
    Ellipsis,
    /// Any host object.
    Object,
}

/// A recursive host type description.
///
/// A node carrying an override string is emitted verbatim by the type mapper
/// and its children are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeNode {
    pub tag: TypeTag,
    pub children: Vec<TypeNode>,
    pub override_type: Option<String>,
}

impl TypeNode {
    fn leaf(tag: TypeTag) -> Self {
        Self {
            tag,
            children: Vec::new(),
            override_type: None,
        }
    }

    pub fn primitive(primitive: Primitive) -> Self {
        Self::leaf(TypeTag::Primitive(primitive))
    }

    /// The absent value (`None`).
    pub fn none() -> Self {
        Self::primitive(Primitive::None)
    }

    /// A host class without a default mapping.
    pub fn class(name: impl Into<String>) -> Self {
        Self::primitive(Primitive::Class(name.into()))
    }

    pub fn container(container: Container, children: Vec<TypeNode>) -> Self {
        Self {
            tag: TypeTag::Container(container),
            children,
            override_type: None,
        }
    }

    pub fn optional(inner: TypeNode) -> Self {
        Self {
            tag: TypeTag::Optional,
            children: vec![inner],
            override_type: None,
        }
    }

    /// A raw union, alternatives kept exactly as given.
    pub fn union(alternatives: Vec<TypeNode>) -> Self {
        Self {
            tag: TypeTag::Union,
            children: alternatives,
            override_type: None,
        }
    }

    /// Build a union the way a host writes it, folding `None` members.
    ///
    /// - `T | None` becomes `Optional(T)`
    /// - `T | U | None` becomes `Optional(Union(T, U))`
    /// - `T | U` stays a `Union`
    pub fn union_of(alternatives: Vec<TypeNode>) -> Self {
        let total = alternatives.len();
        let present: Vec<TypeNode> = alternatives.into_iter().filter(|t| !t.is_none()).collect();
        if present.len() == total {
            return Self::union(present);
        }
        match present.len() {
            0 => Self::none(),
            1 => Self::optional(present.into_iter().next().unwrap_or_else(Self::none)),
            _ => Self::optional(Self::union(present)),
        }
    }

    pub fn callable(ret: TypeNode, params: Vec<TypeNode>) -> Self {
        let mut children = Vec::with_capacity(params.len() + 1);
        children.push(ret);
        children.extend(params);
        Self {
            tag: TypeTag::Callable,
            children,
            override_type: None,
        }
    }

    pub fn ellipsis() -> Self {
        Self::leaf(TypeTag::Ellipsis)
    }

    pub fn object() -> Self {
        Self::leaf(TypeTag::Object)
    }

    /// Attach an explicit target type, bypassing mapping for this node.
    pub fn with_override(mut self, target: impl Into<String>) -> Self {
        self.override_type = Some(target.into());
        self
    }

    pub fn is_none(&self) -> bool {
        matches!(self.tag, TypeTag::Primitive(Primitive::None)) && self.override_type.is_none()
    }

    pub fn is_overridden(&self) -> bool {
        self.override_type.is_some()
    }

    /// Whether any descendant (not this node) carries an override.
    pub fn has_nested_override(&self) -> bool {
        self.children
            .iter()
            .any(|c| c.is_overridden() || c.has_nested_override())
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.tag {
            TypeTag::Primitive(p) => p.host_name(),
            TypeTag::Container(c) => c.host_name(),
            TypeTag::Optional => "Optional",
            TypeTag::Union => "Union",
            TypeTag::Callable => "Callable",
            TypeTag::Ellipsis => "...",
            TypeTag::Object => "Any",
        };
        f.write_str(name)?;
        if !self.children.is_empty() {
            f.write_str("[")?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str("]")?;
        }
        if let Some(target) = &self.override_type {
            write!(f, " as \"{target}\"")?;
        }
        Ok(())
    }
}
