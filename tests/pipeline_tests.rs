//! Pipeline Tests
//!
//! End-to-end tests of the module pipeline against a real library folder.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use stemflow::audio::{generate_test_tone, write_wav};
use stemflow::modules::{INSTRUMENTS, LEAD_BACKING, VOCAL_INSTRUMENTAL};
use stemflow::pipeline::MockRunner;
use stemflow::{ModuleRegistry, PipelineExecutor, ProjectStore, StemflowError};

const SONG: &str = "song.wav";

struct Fixture {
    root: TempDir,
    store: Arc<ProjectStore>,
    runner: Arc<MockRunner>,
    executor: PipelineExecutor,
}

fn fixture_with(runner: MockRunner) -> Fixture {
    let root = TempDir::new().unwrap();
    let registry = Arc::new(ModuleRegistry::builtin().unwrap());
    let store = Arc::new(ProjectStore::open(root.path(), Arc::clone(&registry)).unwrap());
    let runner = Arc::new(runner);
    let executor = PipelineExecutor::new(registry, Arc::clone(&store), runner.clone());
    Fixture {
        root,
        store,
        runner,
        executor,
    }
}

fn fixture() -> Fixture {
    fixture_with(MockRunner::new())
}

/// Place an original file where the pipeline expects it.
fn stage_original(root: &Path, project_id: &str) {
    let dir = root.join(project_id);
    fs::create_dir_all(&dir).unwrap();
    write_wav(&generate_test_tone(440.0, 0.5, 2205, 2, 44100), &dir.join(SONG)).unwrap();
}

// === Idempotence & Monotonicity ===

#[test]
fn test_process_twice_equals_once() {
    let f = fixture();
    stage_original(f.root.path(), "20240301101500");

    let first = f
        .executor
        .process("20240301101500", SONG, &[LEAD_BACKING, INSTRUMENTS])
        .unwrap();
    let calls = f.runner.total_invocations();
    assert_eq!(calls, 3);

    let second = f
        .executor
        .process("20240301101500", SONG, &[LEAD_BACKING, INSTRUMENTS])
        .unwrap();

    assert_eq!(f.runner.total_invocations(), calls);
    assert_eq!(first.completed_modules, second.completed_modules);
    assert_eq!(first.stems, second.stems);
}

#[test]
fn test_completed_modules_never_shrink() {
    let f = fixture();
    stage_original(f.root.path(), "20240301101500");

    let mut previous = f
        .executor
        .process("20240301101500", SONG, &[VOCAL_INSTRUMENTAL])
        .unwrap()
        .completed_modules;

    for request in [vec![INSTRUMENTS], vec![VOCAL_INSTRUMENTAL], vec![LEAD_BACKING]] {
        let current = f
            .executor
            .process("20240301101500", SONG, &request)
            .unwrap()
            .completed_modules;
        assert!(previous.is_subset(&current));
        previous = current;
    }

    assert_eq!(previous.len(), 3);
}

// === Rejection ===

#[test]
fn test_unknown_module_rejects_whole_request() {
    let f = fixture();

    let result = f
        .executor
        .process("20240301101500", SONG, &["vocal_instrumental", "drums_only"]);

    assert!(matches!(result, Err(StemflowError::InvalidModule { .. })));
    assert!(!f.root.path().join("20240301101500").exists());
    assert_eq!(f.runner.total_invocations(), 0);
}

#[test]
fn test_failure_is_resumable() {
    let f = fixture_with(MockRunner::new().failing(INSTRUMENTS));
    stage_original(f.root.path(), "20240301101500");

    let err = f
        .executor
        .process("20240301101500", SONG, &[INSTRUMENTS])
        .unwrap_err();
    assert_eq!(err.error_code(), "MODULE_EXECUTION");

    // Only the module that succeeded is recorded, on disk as well
    f.store.rescan_from_disk().unwrap();
    let project = f.store.metadata("20240301101500").unwrap();
    assert_eq!(
        project.completed_modules.into_iter().collect::<Vec<_>>(),
        vec![VOCAL_INSTRUMENTAL]
    );
}

// === Persistence ===

#[test]
fn test_rescan_reconstructs_records() {
    let f = fixture();
    stage_original(f.root.path(), "20240301101500");
    stage_original(f.root.path(), "20240302090000");

    f.executor
        .process("20240301101500", SONG, &[LEAD_BACKING])
        .unwrap();
    f.executor
        .process("20240302090000", SONG, &[VOCAL_INSTRUMENTAL])
        .unwrap();
    let before = f.store.history();

    let registry = Arc::new(ModuleRegistry::builtin().unwrap());
    let reopened = ProjectStore::open(f.root.path(), registry).unwrap();
    let after = reopened.history();

    assert_eq!(after.len(), 2);
    assert_eq!(after[0].id, "20240302090000");
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.stems, b.stems);
        assert_eq!(a.completed_modules, b.completed_modules);
    }
}

#[test]
fn test_download_refs_resolve() {
    let f = fixture();
    stage_original(f.root.path(), "20240301101500");

    let project = f
        .executor
        .process("20240301101500", SONG, &[VOCAL_INSTRUMENTAL])
        .unwrap();

    for stem in project.stem_refs() {
        let (id, name) = stem.download_ref.split_once('/').unwrap();
        assert!(f.store.resolve_file(id, name).unwrap().is_file());
    }
    assert!(matches!(
        f.store.resolve_file("20240301101500", "../metadata.json"),
        Err(StemflowError::InvalidFilename { .. })
    ));
}

// === Concurrency ===

#[test]
fn test_concurrent_requests_on_one_project() {
    let f = fixture();
    stage_original(f.root.path(), "20240301101500");
    let executor = Arc::new(f.executor);

    let handles: Vec<_> = [LEAD_BACKING, INSTRUMENTS, LEAD_BACKING, INSTRUMENTS]
        .into_iter()
        .map(|module| {
            let executor = Arc::clone(&executor);
            thread::spawn(move || executor.process("20240301101500", SONG, &[module]))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(f.runner.invocations(VOCAL_INSTRUMENTAL), 1);
    assert_eq!(f.runner.invocations(LEAD_BACKING), 1);
    assert_eq!(f.runner.invocations(INSTRUMENTS), 1);

    let project = f.store.metadata("20240301101500").unwrap();
    assert_eq!(project.completed_modules.len(), 3);
    assert_eq!(project.stems.len(), 7);
}

#[test]
fn test_projects_run_in_parallel() {
    let f = fixture();
    let ids = ["20240301101500", "20240301101501", "20240301101502"];
    for id in ids {
        stage_original(f.root.path(), id);
    }
    let executor = Arc::new(f.executor);

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let executor = Arc::clone(&executor);
            thread::spawn(move || executor.process(id, SONG, &[INSTRUMENTS]))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(f.store.history().len(), 3);
    assert_eq!(f.runner.invocations(INSTRUMENTS), 3);
}
