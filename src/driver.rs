//! Build cache and compiler driver.
//!
//! [`BuildCache::ensure_built`] turns a [`ModuleSpec`] into a loaded artifact,
//! reusing the one on disk whenever its recorded hash still matches. Each
//! module gets its own working directory:
//!
//! ```text
//! <root>/<module>_ext/
//!     module.cpp        generated source, checksum substituted
//!     build.log         toolchain command and output
//!     build.json        BuildRecord
//!     <module>.so       artifact
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use xenoform_codegen::{AssembledModule, AssemblyOptions, ModuleSpec};
use xenoform_core::{BuildError, LoadError, XenoformError};

use crate::format::SourceFormatter;
use crate::hash::BuildHash;
use crate::loader::{ArtifactLoader, LoadedArtifact};
use crate::record::{BuildRecord, LOG_FILE, SOURCE_FILE};
use crate::settings::Settings;
use crate::toolchain::{CompileJob, Toolchain};

/// A loaded artifact and how it was obtained.
#[derive(Debug)]
pub struct BuildOutcome<A> {
    pub artifact: A,
    /// `false` when the cached artifact was reused.
    pub rebuilt: bool,
    pub hash: BuildHash,
}

pub struct BuildCache<L: ArtifactLoader> {
    settings: Settings,
    toolchain: Arc<dyn Toolchain>,
    loader: L,
    formatter: SourceFormatter,
    host_free_threaded: bool,
}

struct ModulePaths {
    dir: PathBuf,
    source: PathBuf,
    log: PathBuf,
    artifact: PathBuf,
}

impl<L: ArtifactLoader> BuildCache<L> {
    pub fn new(settings: Settings, toolchain: Arc<dyn Toolchain>, loader: L) -> Self {
        let formatter = SourceFormatter::new(settings.format_style());
        Self {
            settings,
            toolchain,
            loader,
            formatter,
            host_free_threaded: false,
        }
    }

    /// Report whether the host runtime runs without a global lock.
    pub fn with_host_free_threaded(mut self, free_threaded: bool) -> Self {
        self.host_free_threaded = free_threaded;
        self
    }

    pub fn with_formatter(mut self, formatter: SourceFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            free_threaded: self.settings.build_free_threaded(self.host_free_threaded),
        }
    }

    fn paths(&self, module: &str) -> ModulePaths {
        let dir = self.settings.module_dir(module);
        ModulePaths {
            source: dir.join(SOURCE_FILE),
            log: dir.join(LOG_FILE),
            artifact: dir.join(self.toolchain.artifact_file_name(module)),
            dir,
        }
    }

    /// Load the module's artifact, building it first if the cache is stale.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn ensure_built(
        &self,
        module: &ModuleSpec,
    ) -> Result<BuildOutcome<L::Artifact>, XenoformError> {
        let options = self.assembly_options();
        let assembled = module.assemble(&options)?;
        let hash = BuildHash::compute(module, &assembled, &options)?;
        let paths = self.paths(module.name());
        let verbose = module.is_verbose();

        if let Some(artifact) = self.cached(module, &paths, &hash, verbose) {
            return Ok(BuildOutcome {
                artifact,
                rebuilt: false,
                hash,
            });
        }

        self.build(module, &assembled, &paths, &hash, verbose)?;

        let artifact = self.loader.load(&paths.artifact, module.name())?;
        match artifact.checksum() {
            Some(checksum) if checksum != hash.as_str() => {
                return Err(LoadError::Load {
                    path: paths.artifact,
                    message: format!(
                        "built artifact reports checksum {checksum}, expected {hash}"
                    ),
                }
                .into());
            }
            _ => {}
        }
        Ok(BuildOutcome {
            artifact,
            rebuilt: true,
            hash,
        })
    }

    /// The artifact on disk, if it is valid for `hash`.
    fn cached(
        &self,
        module: &ModuleSpec,
        paths: &ModulePaths,
        hash: &BuildHash,
        verbose: bool,
    ) -> Option<L::Artifact> {
        let name = module.name();
        let Some(record) = BuildRecord::read(&paths.dir) else {
            lifecycle!(verbose, module = name, "module {name} not found");
            return None;
        };
        if !record.is_valid_for(hash) {
            lifecycle!(verbose, module = name, "module is outdated ({hash})");
            return None;
        }
        if !paths.artifact.exists() {
            lifecycle!(verbose, module = name, "artifact {} is missing", paths.artifact.display());
            return None;
        }
        let artifact = match self.loader.load(&paths.artifact, name) {
            Ok(artifact) => artifact,
            Err(err) => {
                lifecycle!(verbose, module = name, "cached artifact did not load, rebuilding: {err}");
                return None;
            }
        };
        match artifact.checksum() {
            Some(checksum) if checksum != hash.as_str() => {
                lifecycle!(verbose, module = name, "module is outdated ({hash}, artifact has {checksum})");
                None
            }
            _ => {
                lifecycle!(verbose, module = name, "module is up-to-date ({hash})");
                Some(artifact)
            }
        }
    }

    fn build(
        &self,
        module: &ModuleSpec,
        assembled: &AssembledModule,
        paths: &ModulePaths,
        hash: &BuildHash,
        verbose: bool,
    ) -> Result<(), BuildError> {
        let name = module.name();
        lifecycle!(verbose, module = name, "(re)building module {name} in {}", paths.dir.display());

        fs::create_dir_all(&paths.dir).map_err(|e| BuildError::io(&paths.dir, &e))?;
        fs::write(&paths.source, assembled.with_checksum(hash.as_str()))
            .map_err(|e| BuildError::io(&paths.source, &e))?;
        lifecycle!(verbose, module = name, "wrote {}", paths.source.display());

        self.formatter.format(&paths.source);

        let job = CompileJob::new(module, &self.settings, &paths.source, &paths.artifact);
        lifecycle!(verbose, module = name, "building {name}...");
        let output = self.toolchain.compile(&job);

        write_log(&paths.log, &output.log_text());

        if !output.success {
            return Err(BuildError::Toolchain {
                module: name.to_string(),
                diagnostics: output.diagnostics,
            });
        }

        BuildRecord {
            hash: hash.clone(),
            artifact: paths.artifact.clone(),
            log: paths.log.clone(),
            source: paths.source.clone(),
        }
        .write(&paths.dir)?;
        lifecycle!(verbose, module = name, "built {name}");
        Ok(())
    }
}

/// A log that cannot be written must not hide the build result.
fn write_log(path: &Path, text: &str) {
    if let Err(err) = fs::write(path, text) {
        tracing::warn!(
            target: "xenoform",
            path = %path.display(),
            "could not write build log: {err}"
        );
    }
}
