//! Lazily compiled functions.

use std::fmt;
use std::sync::{Arc, OnceLock};

use xenoform_core::{QualifiedName, XenoformError};

use crate::driver::BuildCache;
use crate::loader::{ArtifactLoader, LoadedArtifact};
use crate::registry::ModuleSlot;

/// Entry point type produced by loader `L`.
pub type EntryOf<L> = <<L as ArtifactLoader>::Artifact as LoadedArtifact>::Entry;

/// Placeholder returned by [`Context::declare`](crate::Context::declare).
///
/// The first [`resolve`](LazyFunction::resolve) builds or loads the owning
/// module and caches the entry point. Later calls return the cached entry
/// without touching the registry.
pub struct LazyFunction<L: ArtifactLoader> {
    name: QualifiedName,
    module: String,
    entry_name: String,
    verbose: bool,
    slot: Arc<ModuleSlot<L::Artifact>>,
    cache: Arc<BuildCache<L>>,
    entry: OnceLock<EntryOf<L>>,
}

impl<L: ArtifactLoader> LazyFunction<L> {
    pub(crate) fn new(
        name: QualifiedName,
        module: String,
        verbose: bool,
        slot: Arc<ModuleSlot<L::Artifact>>,
        cache: Arc<BuildCache<L>>,
    ) -> Self {
        Self {
            entry_name: name.entry_name(),
            name,
            module,
            verbose,
            slot,
            cache,
            entry: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Name of the compiled entry point.
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Whether calls already go straight to the compiled entry point.
    pub fn is_redirected(&self) -> bool {
        self.entry.get().is_some()
    }

    /// The compiled entry point, building the module on first use.
    ///
    /// Build and load failures are returned to every caller waiting on that
    /// build; the next call tries again.
    pub fn resolve(&self) -> Result<&EntryOf<L>, XenoformError> {
        if let Some(entry) = self.entry.get() {
            return Ok(entry);
        }

        let verbose = self.verbose;
        let artifact = self.slot.get_or_build(|spec| {
            let outcome = self.cache.ensure_built(spec)?;
            lifecycle!(
                verbose,
                module = spec.name(),
                "imported compiled module {} ({})",
                spec.name(),
                if outcome.rebuilt { "rebuilt" } else { "cached" }
            );
            Ok(outcome.artifact)
        })?;

        let entry = artifact.entry_point(&self.entry_name)?;
        let entry = self.entry.get_or_init(|| entry);
        lifecycle!(
            verbose,
            module = self.module.as_str(),
            "redirected {}.{} to compiled function {}",
            self.module,
            self.name,
            self.entry_name
        );
        Ok(entry)
    }

    /// Resolve, then hand the entry point to `f`.
    pub fn call<R>(&self, f: impl FnOnce(&EntryOf<L>) -> R) -> Result<R, XenoformError> {
        self.resolve().map(f)
    }
}

impl<L: ArtifactLoader> fmt::Debug for LazyFunction<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFunction")
            .field("name", &self.name.to_string())
            .field("module", &self.module)
            .field("entry_name", &self.entry_name)
            .field("redirected", &self.is_redirected())
            .finish()
    }
}
