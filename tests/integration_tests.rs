//! End-to-end tests: declare, build, cache, load, redirect.

mod test_harness;

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use test_harness::{FakeLoader, TestEnv};
use xenoform::{
    Annotation, AssemblyError, BuildError, BuildRecord, CompileConfig, Container, Context,
    CxxToolchain, DeclarationError, HostFunction, HostParam, Primitive, Qualifier, TypeNode,
    XenoformError,
};

fn int() -> TypeNode {
    TypeNode::primitive(Primitive::Int)
}

fn max_decl(body: &str) -> HostFunction {
    HostFunction::new("max", "basic", body)
        .param(HostParam::new("a", int()))
        .param(HostParam::new("b", int()))
        .returns(int())
}

fn min_decl() -> HostFunction {
    HostFunction::new("min", "basic", "return a < b ? a : b;")
        .param(HostParam::new("a", int()))
        .param(HostParam::new("b", int()))
        .returns(int())
}

const MAX_BODY: &str = "return a > b ? a : b;";

fn loader() -> FakeLoader {
    FakeLoader::new()
        .with_entry("_max", |args| args[0].max(args[1]))
        .with_entry("_min", |args| args[0].min(args[1]))
}

#[test]
fn test_max_is_compiled_and_redirected() {
    let env = TestEnv::new(loader());
    let ctx = env.context();
    let max = ctx.declare(&max_decl(MAX_BODY), CompileConfig::default()).unwrap();

    assert!(!max.is_redirected());
    assert_eq!(env.toolchain.runs(), 0, "declaring must not build");

    assert_eq!(max.call(|f| f(&[3, 5])).unwrap(), 5);
    assert!(max.is_redirected());
    assert_eq!(env.toolchain.runs(), 1);

    // later calls use the cached entry
    assert_eq!(max.call(|f| f(&[9, 2])).unwrap(), 9);
    assert_eq!(env.toolchain.runs(), 1);
    assert_eq!(env.loader.loads(), 1);

    let dir = env.module_dir("basic");
    assert!(dir.join("module.cpp").exists());
    assert!(dir.join("build.log").exists());
    assert!(dir.join("build.json").exists());
    assert!(dir.join("basic.fake").exists());
}

#[test]
fn test_module_functions_share_one_build() {
    let env = TestEnv::new(loader());
    let ctx = env.context();
    let max = ctx.declare(&max_decl(MAX_BODY), CompileConfig::default()).unwrap();
    let min = ctx.declare(&min_decl(), CompileConfig::default()).unwrap();

    assert_eq!(min.call(|f| f(&[3, 5])).unwrap(), 3);
    assert_eq!(max.call(|f| f(&[3, 5])).unwrap(), 5);
    assert_eq!(env.toolchain.runs(), 1);

    let source = env.source("basic");
    assert!(source.find("m.def(\"_max\"").unwrap() < source.find("m.def(\"_min\"").unwrap());
}

#[test]
fn test_concurrent_first_calls_build_once() {
    let env = TestEnv::new(loader());
    env.toolchain.slow(Duration::from_millis(100));
    let ctx = env.context();
    let max = Arc::new(ctx.declare(&max_decl(MAX_BODY), CompileConfig::default()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let max = Arc::clone(&max);
            thread::spawn(move || max.call(|f| f(&[i, 4])).unwrap())
        })
        .collect();
    let results: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results, vec![4, 4, 4, 4, 4, 5, 6, 7]);
    assert_eq!(env.toolchain.runs(), 1);
}

#[test]
fn test_concurrent_module_requests_share_one_artifact() {
    let env = TestEnv::new(loader());
    env.toolchain.slow(Duration::from_millis(100));
    let ctx = env.context();
    ctx.declare(&max_decl(MAX_BODY), CompileConfig::default())
        .unwrap();
    ctx.declare(&min_decl(), CompileConfig::default()).unwrap();

    let artifacts: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| ctx.ensure_module("basic").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(env.toolchain.runs(), 1);
    assert_eq!(env.loader.loads(), 1);
    for artifact in &artifacts[1..] {
        assert!(Arc::ptr_eq(&artifacts[0], artifact));
    }
    assert!(Arc::ptr_eq(&artifacts[0], &ctx.ensure_module("basic").unwrap()));
}

#[test]
fn test_valid_cache_skips_toolchain() {
    let env = TestEnv::new(loader());
    {
        let ctx = env.context();
        let max = ctx.declare(&max_decl(MAX_BODY), CompileConfig::default()).unwrap();
        max.resolve().unwrap();
    }
    assert_eq!(env.toolchain.runs(), 1);

    // a new process: fresh registry, same artifact root
    let ctx = env.context();
    let max = ctx.declare(&max_decl(MAX_BODY), CompileConfig::default()).unwrap();
    assert_eq!(max.call(|f| f(&[3, 5])).unwrap(), 5);
    assert_eq!(env.toolchain.runs(), 1);
}

#[test]
fn test_body_change_triggers_rebuild() {
    let env = TestEnv::new(loader());
    env.context()
        .declare(&max_decl(MAX_BODY), CompileConfig::default())
        .unwrap()
        .resolve()
        .unwrap();
    let first = BuildRecord::read(&env.module_dir("basic")).unwrap();

    env.context()
        .declare(&max_decl("return a >= b ? a : b;"), CompileConfig::default())
        .unwrap()
        .resolve()
        .unwrap();
    let second = BuildRecord::read(&env.module_dir("basic")).unwrap();

    assert_eq!(env.toolchain.runs(), 2);
    assert_ne!(first.hash, second.hash);
    assert!(env.source("basic").contains("return a >= b ? a : b;"));
}

#[test]
fn test_config_change_triggers_rebuild() {
    let env = TestEnv::new(loader());
    env.context()
        .declare(&max_decl(MAX_BODY), CompileConfig::default())
        .unwrap()
        .resolve()
        .unwrap();
    env.context()
        .declare(&max_decl(MAX_BODY), CompileConfig::new().extra_compile_args(["-O3"]))
        .unwrap()
        .resolve()
        .unwrap();

    assert_eq!(env.toolchain.runs(), 2);
    assert_eq!(env.toolchain.last_job().unwrap().compile_args, vec!["-O3"]);
}

#[test]
fn test_conflicting_language_standard() {
    let env = TestEnv::new(loader());
    let ctx = env.context();
    ctx.declare(&max_decl(MAX_BODY), CompileConfig::new().language_standard(20))
        .unwrap();
    let err = ctx
        .declare(&min_decl(), CompileConfig::new().language_standard(17))
        .unwrap_err();

    assert_eq!(
        err,
        XenoformError::Assembly(AssemblyError::ConflictingConfig {
            module: "basic".into(),
            function: "min".into(),
            field: "language_standard",
            existing: "20".into(),
            requested: "17".into(),
        })
    );
    assert_eq!(env.toolchain.runs(), 0);
}

#[test]
fn test_uint64_override() {
    let env = TestEnv::new(FakeLoader::new().with_entry("_big", |args| args[0]));
    let ctx = env.context();
    let decl = HostFunction::new("big", "overrides", "return x;")
        .param(HostParam::new("x", Annotation::overridden(int(), "uint64_t")))
        .returns(Annotation::overridden(int(), "uint64_t"));
    let big = ctx.declare(&decl, CompileConfig::default()).unwrap();

    assert_eq!(big.call(|f| f(&[7])).unwrap(), 7);
    assert!(env
        .source("overrides")
        .contains("[](uint64_t x) -> uint64_t {return x;}"));
}

#[test]
fn test_const_reference_string() {
    let env = TestEnv::new(FakeLoader::new().with_entry("_length", |_| 5));
    let ctx = env.context();
    let decl = HostFunction::new("length", "text", "return s.size();")
        .param(HostParam::new(
            "s",
            Annotation::qualified(TypeNode::primitive(Primitive::Str), Qualifier::CRef),
        ))
        .returns(int());
    ctx.declare(&decl, CompileConfig::default())
        .unwrap()
        .resolve()
        .unwrap();

    let source = env.source("text");
    assert!(source.contains("[](const std::string& s) -> int {return s.size();}"));
    assert!(source.contains("#include <string>"));
}

#[test]
fn test_build_failure_then_retry() {
    let env = TestEnv::new(loader());
    let ctx = env.context();
    let max = ctx.declare(&max_decl(MAX_BODY), CompileConfig::default()).unwrap();

    let diagnostics = "module.cpp:14:3: error: use of undeclared identifier 'c'\n";
    env.toolchain.fail_with(diagnostics);
    let err = max.resolve().map(|_| ()).unwrap_err();
    assert_eq!(
        err,
        XenoformError::Build(BuildError::Toolchain {
            module: "basic".into(),
            diagnostics: diagnostics.into(),
        })
    );
    assert!(err.is_retryable());
    assert!(!max.is_redirected());
    let log = fs::read_to_string(env.module_dir("basic").join("build.log")).unwrap();
    assert!(log.contains(diagnostics));

    env.toolchain.succeed();
    assert_eq!(max.call(|f| f(&[3, 5])).unwrap(), 5);
    assert_eq!(env.toolchain.runs(), 2);
}

#[test]
fn test_redeclaring_after_build_failure() {
    let env = TestEnv::new(loader());
    let ctx = env.context();
    let broken = ctx
        .declare(&max_decl("return a > b ? a : c;"), CompileConfig::default())
        .unwrap();
    ctx.declare(&min_decl(), CompileConfig::default()).unwrap();

    env.toolchain
        .fail_with("module.cpp:14:41: error: use of undeclared identifier 'c'\n");
    assert!(broken.resolve().is_err());
    assert!(env.source("basic").contains("return a > b ? a : c;"));

    env.toolchain.succeed();
    let max = ctx.declare(&max_decl(MAX_BODY), CompileConfig::default()).unwrap();
    assert_eq!(max.call(|f| f(&[3, 5])).unwrap(), 5);
    assert_eq!(env.toolchain.runs(), 2);

    let source = env.source("basic");
    assert!(source.contains(MAX_BODY));
    assert!(!source.contains("return a > b ? a : c;"));
    assert!(source.find("m.def(\"_max\"").unwrap() < source.find("m.def(\"_min\"").unwrap());

    // the earlier handle shares the module and now resolves too
    assert_eq!(broken.call(|f| f(&[9, 2])).unwrap(), 9);
    assert_eq!(env.toolchain.runs(), 2);
}

#[test]
fn test_missing_entry_is_a_load_failure() {
    let env = TestEnv::new(FakeLoader::new());
    let ctx = env.context();
    let max = ctx.declare(&max_decl(MAX_BODY), CompileConfig::default()).unwrap();
    let err = max.resolve().map(|_| ()).unwrap_err();
    assert!(err.is_load());
    assert!(!max.is_redirected());
}

#[test]
fn test_declaring_after_compilation_is_rejected() {
    let env = TestEnv::new(loader());
    let ctx = env.context();
    ctx.declare(&max_decl(MAX_BODY), CompileConfig::default())
        .unwrap()
        .resolve()
        .unwrap();
    assert!(matches!(
        ctx.declare(&min_decl(), CompileConfig::default()),
        Err(XenoformError::Assembly(AssemblyError::ModuleAlreadyCompiled { .. }))
    ));
}

#[test]
fn test_unsupported_type_fails_at_declaration() {
    let env = TestEnv::new(loader());
    let ctx = env.context();
    let decl = HostFunction::new("total", "basic", "return 0;")
        .param(HostParam::new(
            "xs",
            TypeNode::container(Container::List, vec![TypeNode::class("Widget")]),
        ))
        .returns(int());
    let err = ctx.declare(&decl, CompileConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        XenoformError::Declaration(DeclarationError::UnsupportedType { .. })
    ));
    assert!(ctx.registry().get("basic").is_none());
}

#[test]
fn test_generated_source_is_deterministic() {
    let a = TestEnv::new(loader());
    let b = TestEnv::new(loader());
    for env in [&a, &b] {
        let ctx = env.context();
        ctx.declare(&max_decl(MAX_BODY), CompileConfig::new().help("largest"))
            .unwrap();
        ctx.declare(&min_decl(), CompileConfig::new().vectorize(true))
            .unwrap();
        ctx.ensure_module("basic").unwrap();
    }
    assert_eq!(a.source("basic"), b.source("basic"));
    assert_eq!(
        BuildRecord::read(&a.module_dir("basic")).unwrap().hash,
        BuildRecord::read(&b.module_dir("basic")).unwrap().hash
    );
}

#[test]
fn test_free_threaded_build() {
    let env = TestEnv::new(loader());
    let ctx = env.free_threaded_context();
    ctx.declare(&max_decl(MAX_BODY), CompileConfig::default())
        .unwrap()
        .resolve()
        .unwrap();
    assert!(env
        .source("basic")
        .contains("PYBIND11_MODULE(basic, m, py::mod_gil_not_used())"));
}

#[test]
fn test_missing_compiler_reports_build_failure() {
    let env = TestEnv::new(loader());
    let ctx: Context<FakeLoader> = Context::new(
        env.settings(),
        Arc::new(CxxToolchain::new("/nonexistent/xenoform-cxx")),
        env.loader.clone(),
    );
    let max = ctx.declare(&max_decl(MAX_BODY), CompileConfig::default()).unwrap();
    match max.resolve().map(|_| ()).unwrap_err() {
        XenoformError::Build(BuildError::Toolchain { diagnostics, .. }) => {
            assert!(diagnostics.contains("failed to spawn"));
        }
        other => panic!("expected build failure, got {other:?}"),
    }
    assert!(env.module_dir("basic").join("module.cpp").exists());
}
