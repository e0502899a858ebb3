//! Declaration context.
//!
//! A `Context` owns the module registry and the build cache. Host
//! declarations go in through [`Context::declare`]; compiled functions come
//! out as [`LazyFunction`]s.
//!
//! # Example
//!
//! ```no_run
//! use xenoform::{CompileConfig, Context, HostFunction, HostParam, Primitive, TypeNode};
//!
//! let int = TypeNode::primitive(Primitive::Int);
//! let max = HostFunction::new("max", "basic", "return a > b ? a : b;")
//!     .param(HostParam::new("a", int.clone()))
//!     .param(HostParam::new("b", int.clone()))
//!     .returns(int);
//!
//! let max = Context::global().declare(&max, CompileConfig::default()).unwrap();
//! // The first resolve builds (or loads) the basic module.
//! let entry = max.resolve().unwrap();
//! ```

use std::sync::{Arc, OnceLock};

use xenoform_codegen::{HostFunction, extract};
use xenoform_core::{CompileConfig, XenoformError};

use crate::driver::BuildCache;
use crate::function::LazyFunction;
use crate::loader::{ArtifactLoader, DylibLoader};
use crate::registry::{ModuleSlot, Registry};
use crate::settings::Settings;
use crate::toolchain::{CxxToolchain, Toolchain};

pub struct Context<L: ArtifactLoader = DylibLoader> {
    registry: Registry<L::Artifact>,
    cache: Arc<BuildCache<L>>,
}

impl Context<DylibLoader> {
    /// The process-wide context, configured from the environment on first
    /// use.
    pub fn global() -> &'static Context {
        static GLOBAL: OnceLock<Context> = OnceLock::new();
        GLOBAL.get_or_init(Context::from_env)
    }

    #[must_use]
    pub fn from_env() -> Self {
        Context::new(
            Settings::from_env(),
            Arc::new(CxxToolchain::from_env()),
            DylibLoader,
        )
    }
}

impl<L: ArtifactLoader> Context<L> {
    pub fn new(settings: Settings, toolchain: Arc<dyn Toolchain>, loader: L) -> Self {
        Self::with_cache(BuildCache::new(settings, toolchain, loader))
    }

    pub fn with_cache(cache: BuildCache<L>) -> Self {
        Self {
            registry: Registry::new(),
            cache: Arc::new(cache),
        }
    }

    pub fn settings(&self) -> &Settings {
        self.cache.settings()
    }

    pub fn registry(&self) -> &Registry<L::Artifact> {
        &self.registry
    }

    /// Register a host function. Nothing is compiled until the returned
    /// function is first resolved.
    pub fn declare(
        &self,
        decl: &HostFunction,
        config: CompileConfig,
    ) -> Result<LazyFunction<L>, XenoformError> {
        let spec = extract(decl, config)?;
        let verbose = spec.config.verbose;
        lifecycle!(
            verbose,
            module = spec.module.as_str(),
            "registering {}_ext.{}.{} (in {})",
            spec.module,
            spec.module,
            spec.name,
            self.settings().root().display()
        );

        let slot = self.registry.slot(&spec.module);
        let (name, module) = (spec.name.clone(), spec.module.clone());
        slot.add_function(spec)?;
        Ok(LazyFunction::new(
            name,
            module,
            verbose,
            slot,
            Arc::clone(&self.cache),
        ))
    }

    /// Build or load `module` now, without resolving any function.
    pub fn ensure_module(&self, module: &str) -> Result<Arc<L::Artifact>, XenoformError> {
        let slot: Arc<ModuleSlot<L::Artifact>> = self.registry.slot(module);
        slot.get_or_build(|spec| Ok(self.cache.ensure_built(spec)?.artifact))
    }
}
