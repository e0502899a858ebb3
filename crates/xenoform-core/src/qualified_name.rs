use std::fmt;

/// Identity of a host function within its module.
///
/// The scope path holds enclosing classes; it is empty for free functions.
///
/// # Examples
///
/// ```
/// use xenoform_core::QualifiedName;
///
/// let free = QualifiedName::global("max");
/// assert_eq!(free.to_string(), "max");
/// assert_eq!(free.entry_name(), "_max");
///
/// let method = QualifiedName::new("norm", vec!["Vec".into()]);
/// assert_eq!(method.to_string(), "Vec.norm");
/// assert_eq!(method.entry_name(), "_Vec_norm");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    /// Simple name (e.g., "max", "norm")
    pub name: String,
    /// Enclosing scopes (e.g., ["Vec"])
    pub scope: Vec<String>,
}

impl QualifiedName {
    pub fn new(name: impl Into<String>, scope: Vec<String>) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }

    /// A name at module level.
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Vec::new(),
        }
    }

    /// Create from a host qualified name (e.g., "Vec.norm").
    ///
    /// Splits on "." - the last segment is the name, the rest is scope.
    /// `<locals>` markers left by nested definitions are dropped.
    pub fn from_host_qualname(s: &str) -> Self {
        let mut parts: Vec<&str> = s
            .split('.')
            .filter(|p| !p.is_empty() && *p != "<locals>")
            .collect();
        match parts.pop() {
            None => Self::global(""),
            Some(name) => Self::new(name, parts.into_iter().map(str::to_string).collect()),
        }
    }

    pub fn is_global(&self) -> bool {
        self.scope.is_empty()
    }

    pub fn simple_name(&self) -> &str {
        &self.name
    }

    pub fn scope_path(&self) -> &[String] {
        &self.scope
    }

    /// Name under which the compiled function is registered in its module.
    ///
    /// The leading underscore keeps compiled entries apart from the host
    /// placeholders that share the module's namespace.
    pub fn entry_name(&self) -> String {
        let mut entry = String::from("_");
        for part in &self.scope {
            entry.push_str(part);
            entry.push('_');
        }
        entry.push_str(&self.name);
        entry
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.scope.join("."), self.name)
        }
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        Self::from_host_qualname(s)
    }
}
