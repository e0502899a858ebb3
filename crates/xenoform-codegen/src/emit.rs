//! Target-language text for a single function.
//!
//! A function becomes an anonymous lambda registered with the binding
//! framework:
//!
//! ```text
//! m.def("_max", [](int a, int b) -> int {return a > b ? a : b;}, py::arg("a"), py::arg("b"), py::return_value_policy::automatic);
//! ```

use xenoform_core::{FunctionSpec, ParamFlags, ParameterSpec, TypeError, map_type};

pub const POS_ONLY_MARKER: &str = "py::pos_only()";
pub const KW_ONLY_MARKER: &str = "py::kw_only()";

/// Translate a host default expression into the target language.
pub fn translate_default(value: &str) -> &str {
    match value {
        "True" => "true",
        "False" => "false",
        "None" => "py::none()",
        other => other,
    }
}

fn param_declaration(param: &ParameterSpec) -> Result<String, TypeError> {
    let mut decl = if param.flags.contains(ParamFlags::VAR_POSITIONAL) {
        format!("py::args {}", param.name)
    } else if param.flags.contains(ParamFlags::VAR_KEYWORD) {
        format!("const py::kwargs& {}", param.name)
    } else {
        format!("{} {}", map_type(&param.ty, param.qualifier)?, param.name)
    };
    if let Some(default) = &param.default {
        decl.push('=');
        decl.push_str(translate_default(default));
    }
    Ok(decl)
}

/// The lambda head, e.g. `[](double a, bool c=true) -> void`.
pub fn lambda_signature(spec: &FunctionSpec) -> Result<String, TypeError> {
    let params = spec
        .params
        .iter()
        .map(param_declaration)
        .collect::<Result<Vec<_>, _>>()?;
    let ret = map_type(&spec.return_type, spec.return_qualifier)?;
    Ok(format!("[]({}) -> {}", params.join(", "), ret))
}

/// Argument annotations with positional-only and keyword-only markers in
/// their declared positions. Variadic parameters get no annotation.
pub fn arg_annotations(spec: &FunctionSpec) -> Vec<String> {
    let positional_only = spec
        .params
        .iter()
        .filter(|p| p.flags.contains(ParamFlags::POSITIONAL_ONLY))
        .count();
    // keyword-only parameters after *args need no marker
    let has_var_positional = spec
        .params
        .iter()
        .any(|p| p.flags.contains(ParamFlags::VAR_POSITIONAL));

    let mut annotations = Vec::with_capacity(spec.params.len() + 2);
    let mut seen_positional_only = 0;
    let mut keyword_marked = false;
    for param in spec.mapped_params() {
        if param.flags.contains(ParamFlags::KEYWORD_ONLY) && !keyword_marked && !has_var_positional {
            annotations.push(KW_ONLY_MARKER.to_string());
            keyword_marked = true;
        }
        let mut arg = format!("py::arg(\"{}\")", param.name);
        if let Some(default) = &param.default {
            arg.push('=');
            arg.push_str(translate_default(default));
        }
        annotations.push(arg);
        if param.flags.contains(ParamFlags::POSITIONAL_ONLY) {
            seen_positional_only += 1;
            if seen_positional_only == positional_only {
                annotations.push(POS_ONLY_MARKER.to_string());
            }
        }
    }
    annotations
}

/// The full lambda expression including the body.
pub fn lambda(spec: &FunctionSpec) -> Result<String, TypeError> {
    Ok(format!("{} {{{}}}", lambda_signature(spec)?, spec.body))
}

/// Escape text for use inside a double-quoted string literal.
pub fn escape_string_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Registration statements for one function: the scalar entry point, plus a
/// broadcasting overload under the same name when vectorized.
pub fn registrations(spec: &FunctionSpec) -> Result<Vec<String>, TypeError> {
    let lambda = lambda(spec)?;
    let mut extras = arg_annotations(spec);
    extras.push(spec.config.return_value_policy.to_string());
    if let Some(help) = &spec.config.help {
        extras.push(format!("\"{}\"", escape_string_literal(help)));
    }
    let tail = extras
        .iter()
        .map(|extra| format!(", {extra}"))
        .collect::<String>();
    let entry = spec.entry_name();

    let mut statements = vec![format!("m.def(\"{entry}\", {lambda}{tail});")];
    if spec.is_vectorized() {
        statements.push(format!(
            "m.def(\"{entry}\", py::vectorize({lambda}){tail});"
        ));
    }
    Ok(statements)
}
