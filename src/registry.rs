//! Module registry.
//!
//! Every module identity maps to one [`ModuleSlot`]. A slot moves through
//! three phases:
//!
//! ```text
//! Uncompiled --first call--> Building --success--> Compiled (final)
//!     ^                         |
//!     +--------failure----------+
//! ```
//!
//! Entering `Building` happens under the slot's lock, so exactly one thread
//! builds a module at a time. Threads that arrive during a build wait for
//! that attempt and share its result; a failed attempt leaves the slot
//! `Uncompiled` for the next caller to retry.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;
use xenoform_codegen::ModuleSpec;
use xenoform_core::{AssemblyError, FunctionSpec, XenoformError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle phase of a module.
#[derive(Debug)]
pub enum Phase<A> {
    Uncompiled,
    Building,
    Compiled(Arc<A>),
}

impl<A> Phase<A> {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Uncompiled => "uncompiled",
            Phase::Building => "building",
            Phase::Compiled(_) => "compiled",
        }
    }
}

struct SlotState<A> {
    phase: Phase<A>,
    spec: ModuleSpec,
    /// Incremented each time a build starts.
    attempt: u64,
    last_failure: Option<(u64, XenoformError)>,
}

pub struct ModuleSlot<A> {
    state: Mutex<SlotState<A>>,
    finished: Condvar,
}

/// Returns the slot to `Uncompiled` if a build unwinds.
struct BuildGuard<'a, A> {
    slot: &'a ModuleSlot<A>,
    armed: bool,
}

impl<A> Drop for BuildGuard<'_, A> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = lock(&self.slot.state);
            state.phase = Phase::Uncompiled;
            self.slot.finished.notify_all();
        }
    }
}

impl<A> ModuleSlot<A> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(SlotState {
                phase: Phase::Uncompiled,
                spec: ModuleSpec::new(name),
                attempt: 0,
                last_failure: None,
            }),
            finished: Condvar::new(),
        }
    }

    /// Add a function to the module. Only possible until a build succeeds.
    ///
    /// Once a build has failed, declaring a function again under the same
    /// name replaces the earlier declaration so the next attempt compiles
    /// the corrected body.
    pub fn add_function(&self, function: FunctionSpec) -> Result<(), AssemblyError> {
        let mut state = lock(&self.state);
        if !matches!(state.phase, Phase::Uncompiled) {
            return Err(AssemblyError::ModuleAlreadyCompiled {
                module: state.spec.name().to_string(),
                function: function.name.to_string(),
            });
        }
        if state.attempt > 0 {
            state.spec.replace_function(function)
        } else {
            state.spec.add_function(function)
        }
    }

    /// Snapshot of the module's functions.
    pub fn spec(&self) -> ModuleSpec {
        lock(&self.state).spec.clone()
    }

    pub fn phase_name(&self) -> &'static str {
        lock(&self.state).phase.name()
    }

    pub fn is_compiled(&self) -> bool {
        matches!(lock(&self.state).phase, Phase::Compiled(_))
    }

    /// Number of builds started so far.
    pub fn attempts(&self) -> u64 {
        lock(&self.state).attempt
    }

    /// The compiled artifact, running `build` first if nobody has yet.
    ///
    /// `build` runs without the lock held, on at most one thread at a time.
    pub fn get_or_build<F>(&self, build: F) -> Result<Arc<A>, XenoformError>
    where
        F: FnOnce(&ModuleSpec) -> Result<A, XenoformError>,
    {
        let mut state = lock(&self.state);
        loop {
            let awaited = match &state.phase {
                Phase::Compiled(artifact) => return Ok(Arc::clone(artifact)),
                Phase::Uncompiled => break,
                Phase::Building => state.attempt,
            };
            state = self
                .finished
                .wait_while(state, |s| {
                    matches!(s.phase, Phase::Building) && s.attempt == awaited
                })
                .unwrap_or_else(PoisonError::into_inner);
            match &state.last_failure {
                Some((attempt, err)) if *attempt == awaited => return Err(err.clone()),
                _ => {}
            }
        }

        state.phase = Phase::Building;
        state.attempt += 1;
        let attempt = state.attempt;
        let spec = state.spec.clone();
        drop(state);

        let mut guard = BuildGuard {
            slot: self,
            armed: true,
        };
        let result = build(&spec);

        let mut state = lock(&self.state);
        guard.armed = false;
        let outcome = match result {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                state.phase = Phase::Compiled(Arc::clone(&artifact));
                state.last_failure = None;
                Ok(artifact)
            }
            Err(err) => {
                state.phase = Phase::Uncompiled;
                state.last_failure = Some((attempt, err.clone()));
                Err(err)
            }
        };
        self.finished.notify_all();
        outcome
    }
}

/// Module identity to slot. Slots are created on first use and never removed.
pub struct Registry<A> {
    modules: Mutex<FxHashMap<String, Arc<ModuleSlot<A>>>>,
}

impl<A> Default for Registry<A> {
    fn default() -> Self {
        Self {
            modules: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<A> Registry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `module`, created if needed.
    pub fn slot(&self, module: &str) -> Arc<ModuleSlot<A>> {
        let mut modules = lock(&self.modules);
        Arc::clone(
            modules
                .entry(module.to_string())
                .or_insert_with(|| Arc::new(ModuleSlot::new(module))),
        )
    }

    pub fn get(&self, module: &str) -> Option<Arc<ModuleSlot<A>>> {
        lock(&self.modules).get(module).cloned()
    }

    /// Registered module names, sorted.
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.modules).keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use xenoform_core::{BuildError, CompileConfig, FunctionKind, QualifiedName, TypeNode};

    fn function(name: &str, module: &str) -> FunctionSpec {
        FunctionSpec {
            name: QualifiedName::global(name),
            module: module.into(),
            kind: FunctionKind::Free,
            params: vec![],
            return_type: TypeNode::none(),
            return_qualifier: Default::default(),
            body: String::new(),
            config: CompileConfig::default(),
        }
    }

    fn build_failure() -> XenoformError {
        BuildError::Toolchain {
            module: "m".into(),
            diagnostics: "error".into(),
        }
        .into()
    }

    #[test]
    fn phases() {
        let slot: ModuleSlot<u32> = ModuleSlot::new("m");
        assert_eq!(slot.phase_name(), "uncompiled");
        let value = slot.get_or_build(|_| Ok(7)).unwrap();
        assert_eq!(*value, 7);
        assert!(slot.is_compiled());
        assert_eq!(slot.phase_name(), "compiled");

        // compiled is final
        let again = slot.get_or_build(|_| Ok(8)).unwrap();
        assert_eq!(*again, 7);
        assert_eq!(slot.attempts(), 1);
    }

    #[test]
    fn build_sees_registered_functions() {
        let slot: ModuleSlot<usize> = ModuleSlot::new("m");
        slot.add_function(function("f", "m")).unwrap();
        slot.add_function(function("g", "m")).unwrap();
        let count = slot.get_or_build(|spec| Ok(spec.len())).unwrap();
        assert_eq!(*count, 2);
    }

    #[test]
    fn no_functions_after_compilation() {
        let slot: ModuleSlot<()> = ModuleSlot::new("m");
        slot.add_function(function("f", "m")).unwrap();
        slot.get_or_build(|_| Ok(())).unwrap();
        assert!(matches!(
            slot.add_function(function("g", "m")),
            Err(AssemblyError::ModuleAlreadyCompiled { .. })
        ));
    }

    #[test]
    fn redeclaring_after_failure_replaces() {
        let slot: ModuleSlot<String> = ModuleSlot::new("m");
        slot.add_function(function("f", "m")).unwrap();
        assert!(matches!(
            slot.add_function(function("f", "m")),
            Err(AssemblyError::DuplicateFunction { .. })
        ));
        slot.get_or_build(|_| Err(build_failure())).unwrap_err();

        let mut fixed = function("f", "m");
        fixed.body = "return;".into();
        slot.add_function(fixed).unwrap();
        let body = slot
            .get_or_build(|spec| {
                assert_eq!(spec.len(), 1);
                Ok(spec.functions()[0].body.clone())
            })
            .unwrap();
        assert_eq!(*body, "return;");
    }

    #[test]
    fn failure_returns_to_uncompiled() {
        let slot: ModuleSlot<u32> = ModuleSlot::new("m");
        let err = slot.get_or_build(|_| Err(build_failure())).unwrap_err();
        assert!(err.is_build());
        assert_eq!(slot.phase_name(), "uncompiled");

        let value = slot.get_or_build(|_| Ok(1)).unwrap();
        assert_eq!(*value, 1);
        assert_eq!(slot.attempts(), 2);
    }

    #[test]
    fn panic_during_build_resets_slot() {
        let slot: ModuleSlot<u32> = ModuleSlot::new("m");
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _ = slot.get_or_build(|_| panic!("toolchain crashed"));
        }));
        assert!(result.is_err());
        assert_eq!(slot.phase_name(), "uncompiled");
        assert_eq!(*slot.get_or_build(|_| Ok(3)).unwrap(), 3);
    }

    #[test]
    fn concurrent_callers_build_once() {
        let slot: Arc<ModuleSlot<u32>> = Arc::new(ModuleSlot::new("m"));
        let builds = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let builds = Arc::clone(&builds);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    slot.get_or_build(|_| {
                        builds.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        Ok(42)
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(*handle.join().unwrap().unwrap(), 42);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn waiters_share_a_failure() {
        let slot: Arc<ModuleSlot<u32>> = Arc::new(ModuleSlot::new("m"));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    slot.get_or_build(|_| {
                        thread::sleep(Duration::from_millis(50));
                        Err(build_failure())
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap_err(), build_failure());
        }
        assert_eq!(slot.phase_name(), "uncompiled");
    }

    #[test]
    fn registry_creates_slots_lazily() {
        let registry: Registry<()> = Registry::new();
        assert!(registry.get("basic").is_none());
        let a = registry.slot("basic");
        let b = registry.slot("basic");
        assert!(Arc::ptr_eq(&a, &b));
        registry.slot("alpha");
        assert_eq!(registry.module_names(), vec!["alpha", "basic"]);
    }
}
