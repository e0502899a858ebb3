//! Module assembly.
//!
//! A [`ModuleSpec`] groups the functions declared in one host module. All of
//! them are compiled into a single translation unit, so they must agree on
//! every toolchain-affecting setting.

use xenoform_core::{
    AssemblyError, CompileConfig, DEFAULT_LANGUAGE_STANDARD, FunctionSpec, mapper::NUMPY_HEADER,
    required_headers,
};

use crate::emit;
use crate::headers::{HeaderGroups, group_headers};

/// Stands in for the content hash until the build substitutes it.
pub const CHECKSUM_PLACEHOLDER: &str = "__HASH__";

/// Exported C symbol returning the embedded checksum.
pub const CHECKSUM_SYMBOL: &str = "xenoform_checksum";

/// Host-runtime facts that affect the generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssemblyOptions {
    /// Declare the module safe to run without the global interpreter lock.
    pub free_threaded: bool,
}

/// Complete source for one module, checksum not yet substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledModule {
    pub name: String,
    pub includes: HeaderGroups,
    pub text: String,
}

impl AssembledModule {
    /// The source with every checksum placeholder replaced.
    pub fn with_checksum(&self, checksum: &str) -> String {
        self.text.replace(CHECKSUM_PLACEHOLDER, checksum)
    }
}

/// The functions that make up one compiled module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    name: String,
    functions: Vec<FunctionSpec>,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Build a module without validating its functions. [`assemble`]
    /// still rejects conflicting settings.
    ///
    /// [`assemble`]: ModuleSpec::assemble
    pub fn from_functions(name: impl Into<String>, functions: Vec<FunctionSpec>) -> Self {
        Self {
            name: name.into(),
            functions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn functions(&self) -> &[FunctionSpec] {
        &self.functions
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Settings shared by every function; the first function's config.
    pub fn toolchain_config(&self) -> Option<&CompileConfig> {
        self.functions.first().map(|f| &f.config)
    }

    pub fn language_standard(&self) -> u32 {
        self.toolchain_config()
            .map_or(DEFAULT_LANGUAGE_STANDARD, |c| c.language_standard)
    }

    /// Whether any function asked for verbose lifecycle reporting.
    pub fn is_verbose(&self) -> bool {
        self.functions.iter().any(|f| f.config.verbose)
    }

    /// Add a function, checking it fits the module.
    pub fn add_function(&mut self, function: FunctionSpec) -> Result<(), AssemblyError> {
        self.check_owned(&function)?;
        let entry = function.entry_name();
        if self.functions.iter().any(|f| f.entry_name() == entry) {
            return Err(AssemblyError::DuplicateFunction {
                module: self.name.clone(),
                name: function.name.to_string(),
            });
        }
        self.check_compatible(&function)?;
        self.functions.push(function);
        Ok(())
    }

    /// Add a function, or swap out the one with the same entry name while
    /// keeping its position in the module.
    pub fn replace_function(&mut self, function: FunctionSpec) -> Result<(), AssemblyError> {
        self.check_owned(&function)?;
        let entry = function.entry_name();
        let Some(index) = self.functions.iter().position(|f| f.entry_name() == entry) else {
            self.check_compatible(&function)?;
            self.functions.push(function);
            return Ok(());
        };
        // compare against the other functions only
        let reference = self
            .functions
            .iter()
            .enumerate()
            .find(|(i, _)| *i != index)
            .map(|(_, f)| &f.config);
        if let Some(existing) = reference {
            self.conflict(existing, &function)?;
        }
        self.functions[index] = function;
        Ok(())
    }

    fn check_owned(&self, function: &FunctionSpec) -> Result<(), AssemblyError> {
        if function.module != self.name {
            return Err(AssemblyError::ForeignFunction {
                module: self.name.clone(),
                function: function.name.to_string(),
                declared: function.module.clone(),
            });
        }
        Ok(())
    }

    /// Fail if `function` disagrees with the module on any toolchain setting.
    pub fn check_compatible(&self, function: &FunctionSpec) -> Result<(), AssemblyError> {
        match self.toolchain_config() {
            Some(existing) => self.conflict(existing, function),
            None => Ok(()),
        }
    }

    fn conflict(
        &self,
        existing: &CompileConfig,
        function: &FunctionSpec,
    ) -> Result<(), AssemblyError> {
        match existing
            .toolchain_signature()
            .first_difference(&function.config.toolchain_signature())
        {
            Some((field, existing, requested)) => Err(AssemblyError::ConflictingConfig {
                module: self.name.clone(),
                function: function.name.to_string(),
                field,
                existing,
                requested,
            }),
            None => Ok(()),
        }
    }

    /// All requested headers, per function in declaration order: inferred
    /// from types, then numpy for vectorized functions, then extras.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = Vec::new();
        for function in &self.functions {
            for param in function.mapped_params() {
                headers.extend(required_headers(&param.ty).into_iter().map(str::to_string));
            }
            headers.extend(
                required_headers(&function.return_type)
                    .into_iter()
                    .map(str::to_string),
            );
            if function.is_vectorized() {
                headers.push(NUMPY_HEADER.to_string());
            }
            headers.extend(function.config.extra_includes.iter().cloned());
        }
        headers
    }

    /// Produce the module source.
    ///
    /// The output is a pure function of the module's functions and
    /// `options`; identical inputs yield byte-identical text.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn assemble(&self, options: &AssemblyOptions) -> Result<AssembledModule, AssemblyError> {
        if let Some((first, rest)) = self.functions.split_first() {
            let reference = ModuleSpec::from_functions(self.name.clone(), vec![first.clone()]);
            for function in rest {
                reference.check_compatible(function)?;
            }
        }

        let includes = group_headers(&self.headers());

        let mut registrations = Vec::with_capacity(self.functions.len());
        for function in &self.functions {
            let statements =
                emit::registrations(function).map_err(|source| AssemblyError::UnsupportedType {
                    module: self.name.clone(),
                    function: function.name.to_string(),
                    source,
                })?;
            registrations.extend(statements);
        }

        let gil = if options.free_threaded {
            ", py::mod_gil_not_used()"
        } else {
            ""
        };

        let mut text = String::new();
        text.push_str(&format!("// {} (generated by xenoform)\n\n", self.name));
        text.push_str(&includes.render());
        text.push_str("\nnamespace py = pybind11;\n\n");
        text.push_str(&format!(
            "extern \"C\" PYBIND11_EXPORT const char* {CHECKSUM_SYMBOL}() {{ return \"{CHECKSUM_PLACEHOLDER}\"; }}\n\n"
        ));
        text.push_str(&format!("PYBIND11_MODULE({}, m{gil}) {{\n", self.name));
        text.push_str(&format!(
            "  m.attr(\"__checksum__\") = \"{CHECKSUM_PLACEHOLDER}\";\n"
        ));
        for statement in &registrations {
            text.push_str("  ");
            text.push_str(statement);
            text.push('\n');
        }
        text.push_str("}\n");

        Ok(AssembledModule {
            name: self.name.clone(),
            includes,
            text,
        })
    }
}
