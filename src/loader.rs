//! Artifact loading.
//!
//! Loading is split in two: an [`ArtifactLoader`] opens a built artifact, and
//! the resulting [`LoadedArtifact`] reports its embedded checksum and hands
//! out entry points. [`DylibLoader`] is the `libloading` implementation.

use std::ffi::{CStr, c_char};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use xenoform_codegen::CHECKSUM_SYMBOL;
use xenoform_core::LoadError;

pub trait ArtifactLoader: Send + Sync + 'static {
    type Artifact: LoadedArtifact;

    fn load(&self, path: &Path, module: &str) -> Result<Self::Artifact, LoadError>;
}

pub trait LoadedArtifact: Send + Sync + 'static {
    /// Handle to one compiled function.
    type Entry: Clone + Send + Sync + 'static;

    /// Checksum embedded at build time, if the artifact exposes one.
    fn checksum(&self) -> Option<String>;

    fn entry_point(&self, name: &str) -> Result<Self::Entry, LoadError>;
}

/// Opens artifacts as shared libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DylibLoader;

/// A loaded shared library.
#[derive(Debug)]
pub struct DylibArtifact {
    library: Arc<Library>,
    module: String,
    path: PathBuf,
}

/// A compiled function inside a [`DylibArtifact`].
///
/// Functions are registered on the module object the binding framework
/// creates from `init_symbol`; the library stays loaded while any entry is
/// alive.
#[derive(Debug, Clone)]
pub struct DylibEntry {
    pub library: Arc<Library>,
    pub init_symbol: String,
    pub name: String,
}

impl ArtifactLoader for DylibLoader {
    type Artifact = DylibArtifact;

    fn load(&self, path: &Path, module: &str) -> Result<DylibArtifact, LoadError> {
        // SAFETY: the artifact was produced by our own build and its static
        // initializers only register functions.
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(DylibArtifact {
            library: Arc::new(library),
            module: module.to_string(),
            path: path.to_path_buf(),
        })
    }
}

impl DylibArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Symbol the host runtime calls to create the module object.
    pub fn init_symbol(&self) -> String {
        format!("PyInit_{}", self.module)
    }
}

impl LoadedArtifact for DylibArtifact {
    type Entry = DylibEntry;

    fn checksum(&self) -> Option<String> {
        type ChecksumFn = unsafe extern "C" fn() -> *const c_char;
        // SAFETY: the symbol is emitted by the module assembler with exactly
        // this signature and returns a pointer to a static string.
        unsafe {
            let checksum_fn = self
                .library
                .get::<ChecksumFn>(CHECKSUM_SYMBOL.as_bytes())
                .ok()?;
            let ptr = checksum_fn();
            if ptr.is_null() {
                return None;
            }
            Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
    }

    fn entry_point(&self, name: &str) -> Result<DylibEntry, LoadError> {
        let init_symbol = self.init_symbol();
        // SAFETY: only the symbol's presence is checked, it is not called.
        let present = unsafe {
            self.library
                .get::<unsafe extern "C" fn()>(init_symbol.as_bytes())
                .is_ok()
        };
        if !present {
            return Err(LoadError::MissingEntry {
                module: self.module.clone(),
                name: name.to_string(),
            });
        }
        Ok(DylibEntry {
            library: Arc::clone(&self.library),
            init_symbol,
            name: name.to_string(),
        })
    }
}
