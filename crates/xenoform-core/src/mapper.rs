//! Host-to-target type mapping.
//!
//! [`map_type`] is a pure recursive function over [`TypeNode`]. Rules apply in
//! priority order:
//!
//! 1. an explicit override is emitted verbatim (then qualifier-wrapped)
//! 2. primitives use a fixed table
//! 3. containers substitute their mapped children into a template
//! 4. `Optional` becomes `std::optional<T>`
//! 5. `Union` becomes `std::variant<...>` in declared order
//! 6. `Callable` becomes `std::function<R(A...)>`
//! 7. `Ellipsis` becomes `py::ellipsis`, only at top level
//! 8. `Object` becomes `py::object`
//!
//! [`required_headers`] reports the headers the mapped types need.

use crate::error::TypeError;
use crate::qualifier::Qualifier;
use crate::types::{Container, Primitive, TypeNode, TypeTag};

/// Header needed for `std::complex` conversions.
pub const COMPLEX_HEADER: &str = "<pybind11/complex.h>";
/// Header needed for `std::string`.
pub const STRING_HEADER: &str = "<string>";
/// Header needed for STL container conversions.
pub const STL_HEADER: &str = "<pybind11/stl.h>";
/// Header needed for numpy arrays and vectorized functions.
pub const NUMPY_HEADER: &str = "<pybind11/numpy.h>";
/// Header needed for `std::function` conversions.
pub const FUNCTIONAL_HEADER: &str = "<pybind11/functional.h>";

/// Map a type node and wrap it with a qualifier.
///
/// ```
/// use xenoform_core::{map_type, Container, Primitive, Qualifier, TypeNode};
///
/// let ty = TypeNode::container(Container::List, vec![TypeNode::primitive(Primitive::Float)]);
/// assert_eq!(map_type(&ty, Qualifier::CRef).unwrap(), "const std::vector<double>&");
///
/// let fixed = TypeNode::primitive(Primitive::Int).with_override("uint64_t");
/// assert_eq!(map_type(&fixed, Qualifier::Auto).unwrap(), "uint64_t");
/// ```
pub fn map_type(node: &TypeNode, qualifier: Qualifier) -> Result<String, TypeError> {
    let base = match &node.override_type {
        Some(target) => target.clone(),
        None => {
            if node.has_nested_override() {
                return Err(TypeError::NestedOverride {
                    ty: node.to_string(),
                });
            }
            if node.is_none() && !qualifier.is_auto() {
                return Err(TypeError::QualifiedNone { qualifier });
            }
            let mapped = map_inner(node, false)?;
            // a const qualifier already covers the frozenset's constness
            if is_const_container(node) && !qualifier.adds_const() {
                format!("const {mapped}")
            } else {
                mapped
            }
        }
    };
    Ok(qualifier.wrap(&base))
}

fn map_inner(node: &TypeNode, nested: bool) -> Result<String, TypeError> {
    match &node.tag {
        TypeTag::Primitive(p) => map_primitive(p).map(str::to_string).ok_or_else(|| {
            TypeError::Unmapped {
                ty: node.to_string(),
            }
        }),
        TypeTag::Container(c) => map_container(node, *c),
        TypeTag::Optional => {
            expect_arity(node, 1, "1")?;
            Ok(format!("std::optional<{}>", map_children(node)?.join(", ")))
        }
        TypeTag::Union => {
            if node.children.len() < 2 {
                return Err(TypeError::Arity {
                    ty: node.to_string(),
                    expected: "at least 2",
                    got: node.children.len(),
                });
            }
            Ok(format!("std::variant<{}>", map_children(node)?.join(", ")))
        }
        TypeTag::Callable => {
            if node.children.is_empty() {
                return Err(TypeError::Arity {
                    ty: node.to_string(),
                    expected: "at least 1",
                    got: 0,
                });
            }
            let mapped = map_children(node)?;
            Ok(format!(
                "std::function<{}({})>",
                mapped[0],
                mapped[1..].join(", ")
            ))
        }
        TypeTag::Ellipsis => {
            // callers reject nested ellipses before reaching here
            debug_assert!(!nested);
            Ok("py::ellipsis".to_string())
        }
        TypeTag::Object => Ok("py::object".to_string()),
    }
}

fn map_primitive(primitive: &Primitive) -> Option<&'static str> {
    let mapped = match primitive {
        Primitive::None => "void",
        Primitive::Int => "int",
        Primitive::Int32 => "int32_t",
        Primitive::Int64 => "int64_t",
        Primitive::Bool => "bool",
        Primitive::Float | Primitive::Float64 => "double",
        Primitive::Float32 => "float",
        Primitive::Complex | Primitive::Complex128 => "std::complex<double>",
        Primitive::Complex64 => "std::complex<float>",
        Primitive::Str => "std::string",
        Primitive::Bytes => "py::bytes",
        Primitive::ByteArray => "py::bytearray",
        Primitive::Slice => "py::slice",
        Primitive::Type => "py::type",
        Primitive::Class(_) => return None,
    };
    Some(mapped)
}

fn container_template(container: Container) -> &'static str {
    match container {
        Container::List => "std::vector",
        Container::Set => "std::unordered_set",
        Container::FrozenSet => "std::unordered_set",
        Container::Dict => "std::unordered_map",
        Container::Tuple => "std::tuple",
        Container::Array => "py::array_t",
    }
}

/// Binding-framework object used for a container without type arguments.
fn container_object(container: Container) -> &'static str {
    match container {
        Container::List => "py::list",
        Container::Set => "py::set",
        Container::FrozenSet => "py::frozenset",
        Container::Dict => "py::dict",
        Container::Tuple => "py::tuple",
        Container::Array => "py::array",
    }
}

fn map_container(node: &TypeNode, container: Container) -> Result<String, TypeError> {
    if node.children.is_empty() {
        return Ok(container_object(container).to_string());
    }
    match container.arity() {
        Some(1) => expect_arity(node, 1, "1")?,
        Some(2) => expect_arity(node, 2, "2")?,
        _ => {}
    }
    Ok(format!(
        "{}<{}>",
        container_template(container),
        map_children(node)?.join(", ")
    ))
}

/// Outermost `frozenset[T]` is passed as `const std::unordered_set<T>`.
fn is_const_container(node: &TypeNode) -> bool {
    node.tag == TypeTag::Container(Container::FrozenSet) && !node.children.is_empty()
}

fn map_children(node: &TypeNode) -> Result<Vec<String>, TypeError> {
    node.children
        .iter()
        .enumerate()
        .map(|(index, child)| {
            if child.tag == TypeTag::Ellipsis {
                return Err(TypeError::NestedEllipsis {
                    ty: node.to_string(),
                });
            }
            // only a callable's return type may be void
            let void_return = node.tag == TypeTag::Callable && index == 0;
            if child.is_none() && !void_return {
                return Err(TypeError::NestedNone {
                    ty: node.to_string(),
                });
            }
            map_inner(child, true)
        })
        .collect()
}

fn expect_arity(node: &TypeNode, count: usize, expected: &'static str) -> Result<(), TypeError> {
    if node.children.len() == count {
        Ok(())
    } else {
        Err(TypeError::Arity {
            ty: node.to_string(),
            expected,
            got: node.children.len(),
        })
    }
}

/// Headers required by the types used in `node`, in pre-order.
///
/// Duplicates are kept; deduplication happens when headers are grouped for a
/// module. An overridden node contributes nothing, whoever writes the
/// override must include what it needs.
pub fn required_headers(node: &TypeNode) -> Vec<&'static str> {
    let mut collected = Vec::new();
    collect_headers(node, &mut collected);
    collected
}

fn collect_headers(node: &TypeNode, collected: &mut Vec<&'static str>) {
    if node.is_overridden() {
        return;
    }
    if let Some(header) = header_for(&node.tag) {
        collected.push(header);
    }
    for child in &node.children {
        collect_headers(child, collected);
    }
}

fn header_for(tag: &TypeTag) -> Option<&'static str> {
    match tag {
        TypeTag::Primitive(
            Primitive::Complex | Primitive::Complex64 | Primitive::Complex128,
        ) => Some(COMPLEX_HEADER),
        TypeTag::Primitive(Primitive::Str) => Some(STRING_HEADER),
        TypeTag::Primitive(_) => None,
        TypeTag::Container(Container::Array) => Some(NUMPY_HEADER),
        TypeTag::Container(_) | TypeTag::Optional | TypeTag::Union => Some(STL_HEADER),
        TypeTag::Callable => Some(FUNCTIONAL_HEADER),
        TypeTag::Ellipsis | TypeTag::Object => None,
    }
}
