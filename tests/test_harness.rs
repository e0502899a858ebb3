// tests/test_harness.rs
//! Test harness for xenoform integration tests
//!
//! Provides a toolchain that "compiles" by copying the generated source to
//! the artifact path, and a loader that reads that text back and serves
//! entry points implemented as Rust closures.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tempfile::TempDir;
use xenoform::{
    ArtifactLoader, BuildCache, CHECKSUM_PLACEHOLDER, CompileJob, Context, LoadError,
    LoadedArtifact, Settings, Toolchain, ToolchainOutput,
};

/// Toolchain that writes the source text as the artifact.
#[derive(Default)]
pub struct FakeToolchain {
    runs: AtomicUsize,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    jobs: Mutex<Vec<CompileJob>>,
}

impl FakeToolchain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of compile invocations so far.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Make subsequent compiles fail with these diagnostics.
    pub fn fail_with(&self, diagnostics: &str) {
        *self.failure.lock().unwrap() = Some(diagnostics.to_string());
    }

    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Make each compile take at least `delay`.
    pub fn slow(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn last_job(&self) -> Option<CompileJob> {
        self.jobs.lock().unwrap().last().cloned()
    }
}

impl Toolchain for FakeToolchain {
    fn compile(&self, job: &CompileJob) -> ToolchainOutput {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(job.clone());
        if let Some(delay) = *self.delay.lock().unwrap() {
            thread::sleep(delay);
        }
        if let Some(diagnostics) = self.failure.lock().unwrap().clone() {
            return ToolchainOutput {
                success: false,
                command: format!("fake-cxx {}", job.source.display()),
                diagnostics,
            };
        }
        match fs::copy(&job.source, &job.output) {
            Ok(_) => ToolchainOutput {
                success: true,
                command: format!("fake-cxx {}", job.source.display()),
                diagnostics: String::new(),
            },
            Err(err) => ToolchainOutput {
                success: false,
                command: format!("fake-cxx {}", job.source.display()),
                diagnostics: err.to_string(),
            },
        }
    }

    fn artifact_file_name(&self, module: &str) -> String {
        format!("{module}.fake")
    }
}

pub type Entry = Arc<dyn Fn(&[i64]) -> i64 + Send + Sync>;

/// Loader that serves registered closures for entries the source defines.
#[derive(Clone, Default)]
pub struct FakeLoader {
    entries: Arc<FxHashMap<String, Entry>>,
    loads: Arc<AtomicUsize>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(
        mut self,
        name: &str,
        f: impl Fn(&[i64]) -> i64 + Send + Sync + 'static,
    ) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(name.to_string(), Arc::new(f));
        self.entries = Arc::new(entries);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

pub struct FakeArtifact {
    pub source: String,
    entries: Arc<FxHashMap<String, Entry>>,
    module: String,
}

impl ArtifactLoader for FakeLoader {
    type Artifact = FakeArtifact;

    fn load(&self, path: &Path, module: &str) -> Result<FakeArtifact, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let source = fs::read_to_string(path).map_err(|e| LoadError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(FakeArtifact {
            source,
            entries: Arc::clone(&self.entries),
            module: module.to_string(),
        })
    }
}

impl LoadedArtifact for FakeArtifact {
    type Entry = Entry;

    fn checksum(&self) -> Option<String> {
        let marker = "m.attr(\"__checksum__\") = \"";
        let start = self.source.find(marker)? + marker.len();
        let end = self.source[start..].find('"')? + start;
        let checksum = &self.source[start..end];
        (checksum != CHECKSUM_PLACEHOLDER).then(|| checksum.to_string())
    }

    fn entry_point(&self, name: &str) -> Result<Entry, LoadError> {
        let registered = format!("m.def(\"{name}\"");
        let missing = || LoadError::MissingEntry {
            module: self.module.clone(),
            name: name.to_string(),
        };
        if !self.source.contains(&registered) {
            return Err(missing());
        }
        self.entries.get(name).cloned().ok_or_else(missing)
    }
}

/// Scratch artifact root plus the fakes wired into a context.
pub struct TestEnv {
    pub root: TempDir,
    pub toolchain: Arc<FakeToolchain>,
    pub loader: FakeLoader,
}

impl TestEnv {
    pub fn new(loader: FakeLoader) -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            toolchain: FakeToolchain::new(),
            loader,
        }
    }

    pub fn settings(&self) -> Settings {
        Settings::with_root(self.root.path()).cpp_format("none")
    }

    /// A fresh context (empty registry) over the same artifact root.
    pub fn context(&self) -> Context<FakeLoader> {
        Context::new(self.settings(), self.toolchain.clone(), self.loader.clone())
    }

    pub fn free_threaded_context(&self) -> Context<FakeLoader> {
        let cache = BuildCache::new(self.settings(), self.toolchain.clone(), self.loader.clone())
            .with_host_free_threaded(true);
        Context::with_cache(cache)
    }

    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.root.path().join(format!("{module}_ext"))
    }

    pub fn source(&self, module: &str) -> String {
        fs::read_to_string(self.module_dir(module).join("module.cpp")).unwrap()
    }
}
