//! Signature extraction.
//!
//! Turns a [`HostFunction`] into an immutable [`FunctionSpec`], rejecting
//! everything the module assembler cannot express before any build happens.

use xenoform_core::{
    CompileConfig, DeclarationError, FunctionSpec, ParameterSpec, QualifiedName, Qualifier,
    TypeError, TypeNode, TypeTag, map_type,
};

use crate::declaration::{Annotation, AnnotationExtra, HostFunction};

/// Position label used for the return value in diagnostics.
pub const RETURN_POSITION: &str = "(return)";

/// Extract a [`FunctionSpec`] from a host declaration.
///
/// Every parameter and the return type are validated through the type mapper
/// here, so an unsupported type fails at declaration time.
///
/// ```
/// use xenoform_codegen::{extract, HostFunction, HostParam};
/// use xenoform_core::{CompileConfig, Primitive, TypeNode};
///
/// let int = TypeNode::primitive(Primitive::Int);
/// let decl = HostFunction::new("max", "basic", "return a > b ? a : b;")
///     .param(HostParam::new("a", int.clone()))
///     .param(HostParam::new("b", int.clone()))
///     .returns(int);
///
/// let spec = extract(&decl, CompileConfig::default()).unwrap();
/// assert_eq!(spec.entry_name(), "_max");
/// assert_eq!(spec.params.len(), 2);
/// ```
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn extract(
    decl: &HostFunction,
    config: CompileConfig,
) -> Result<FunctionSpec, DeclarationError> {
    let name = QualifiedName::from_host_qualname(&decl.qualname);
    let function = decl.qualname.clone();

    if decl.kind.has_context_param()
        && decl.params.first().is_none_or(|p| p.annotation.is_none())
    {
        return Err(DeclarationError::MissingContextAnnotation { function });
    }

    let mut missing: Vec<String> = decl
        .params
        .iter()
        .filter(|p| p.annotation.is_none())
        .map(|p| p.name.clone())
        .collect();
    if decl.returns.is_none() {
        missing.push(RETURN_POSITION.to_string());
    }
    if !missing.is_empty() {
        return Err(DeclarationError::MissingAnnotations { function, missing });
    }

    if !decl.captures.is_empty() {
        return Err(DeclarationError::UnsupportedConstruct {
            function,
            construct: format!(
                "closure over enclosing scope ({})",
                decl.captures.join(", ")
            ),
        });
    }
    if calls_function(&decl.body, name.simple_name()) {
        return Err(DeclarationError::UnsupportedConstruct {
            construct: format!("recursive call to '{}'", name.simple_name()),
            function,
        });
    }

    let unsupported = |position: String, source: TypeError| DeclarationError::UnsupportedType {
        function: function.clone(),
        position,
        source,
    };

    let mut params = Vec::with_capacity(decl.params.len());
    for param in &decl.params {
        let position = format!("parameter '{}'", param.name);
        let Some(annotation) = &param.annotation else {
            continue;
        };
        let (ty, qualifier) =
            resolve_annotation(annotation).map_err(|e| unsupported(position.clone(), e))?;
        // *args and **kwargs have fixed target types
        if !param.flags.is_variadic() {
            map_type(&ty, qualifier).map_err(|e| unsupported(position, e))?;
        }
        params.push(ParameterSpec {
            name: param.name.clone(),
            ty,
            qualifier,
            default: param.default.clone(),
            flags: param.flags,
        });
    }

    let (return_type, return_qualifier) = match &decl.returns {
        Some(annotation) => {
            let resolved = resolve_annotation(annotation)
                .map_err(|e| unsupported(RETURN_POSITION.to_string(), e))?;
            map_type(&resolved.0, resolved.1)
                .map_err(|e| unsupported(RETURN_POSITION.to_string(), e))?;
            resolved
        }
        None => (TypeNode::none(), Qualifier::Auto),
    };

    Ok(FunctionSpec {
        name,
        module: decl.module.clone(),
        kind: decl.kind,
        params,
        return_type,
        return_qualifier,
        body: decl.body.clone(),
        config,
    })
}

/// Flatten an annotation into the type node to map and its qualifier.
pub fn resolve_annotation(annotation: &Annotation) -> Result<(TypeNode, Qualifier), TypeError> {
    let (node, extras) = match annotation {
        Annotation::Plain(node) => {
            check_nested_ellipsis(node)?;
            return Ok((node.clone(), Qualifier::Auto));
        }
        Annotation::Annotated { base, extras } => match base.as_ref() {
            Annotation::Plain(node) => (node, extras),
            Annotation::Annotated { .. } => {
                return Err(TypeError::NestedAnnotation {
                    ty: base.to_string(),
                });
            }
        },
    };

    if extras.is_empty() {
        return Err(TypeError::EmptyAnnotation {
            ty: node.to_string(),
        });
    }

    let mut override_type = None;
    let mut qualifier = None;
    for extra in extras {
        let duplicate = match extra {
            AnnotationExtra::Override(target) => {
                override_type.replace(target.clone()).is_some().then_some("override")
            }
            AnnotationExtra::Qualifier(q) => qualifier.replace(*q).is_some().then_some("qualifier"),
        };
        if let Some(kind) = duplicate {
            return Err(TypeError::DuplicateAnnotation {
                ty: node.to_string(),
                kind,
            });
        }
    }

    let mut node = node.clone();
    if let Some(target) = override_type {
        if node.is_overridden() {
            return Err(TypeError::NestedAnnotation {
                ty: node.to_string(),
            });
        }
        node.override_type = Some(target);
    }
    check_nested_ellipsis(&node)?;
    Ok((node, qualifier.unwrap_or_default()))
}

fn check_nested_ellipsis(node: &TypeNode) -> Result<(), TypeError> {
    if node.is_overridden() {
        return Ok(());
    }
    for child in &node.children {
        if child.tag == TypeTag::Ellipsis && child.is_overridden() {
            return Err(TypeError::AnnotatedNestedEllipsis {
                ty: node.to_string(),
            });
        }
        check_nested_ellipsis(child)?;
    }
    Ok(())
}

/// Whether `body` calls a free function called `name`.
///
/// Comments and string/char literals are skipped, as are member and scoped
/// calls (`.name(`, `->name(`, `::name(`).
pub fn calls_function(body: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let code = strip_comments_and_literals(body);
    let bytes = code.as_bytes();
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';

    let mut from = 0;
    while let Some(offset) = code[from..].find(name) {
        let start = from + offset;
        let end = start + name.len();
        from = end;

        if start > 0 && is_ident(bytes[start - 1]) {
            continue;
        }
        if end < bytes.len() && is_ident(bytes[end]) {
            continue;
        }
        if !code[end..].trim_start().starts_with('(') {
            continue;
        }
        let before = code[..start].trim_end();
        if before.ends_with('.') || before.ends_with("->") || before.ends_with("::") {
            continue;
        }
        return true;
    }
    false
}

/// Blank out comments and literals, keeping byte offsets stable.
fn strip_comments_and_literals(body: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Literal(char),
    }

    let mut out = String::with_capacity(body.len());
    let mut state = State::Code;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment;
                }
                '"' | '\'' => {
                    out.push(' ');
                    state = State::Literal(c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            State::Literal(quote) => {
                if c == '\\' {
                    blank(&mut out, c);
                    if let Some(escaped) = chars.next() {
                        blank(&mut out, escaped);
                    }
                } else if c == quote {
                    out.push(' ');
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
        }
    }
    out
}

fn blank(out: &mut String, c: char) {
    for _ in 0..c.len_utf8() {
        out.push(' ');
    }
}
