//! End-to-end integration tests exercising the full loader -> resolver ->
//! grouper -> priority -> scheduler pipeline, against the literal scenarios
//! named in the specification's testable-properties section.

use std::collections::HashMap;

use debsched_core::{
    build_schedule, CircularDeclarationSet, ControlFileReader, ControlParagraph,
    GroupingError, InMemoryPackageIndex, LoaderError, ScheduleError,
};

struct FixtureReader {
    paragraphs: HashMap<String, ControlParagraph>,
}

impl FixtureReader {
    fn new(recipes: &[(&str, &str, &[&str], &str)]) -> (Self, Vec<String>) {
        let mut paragraphs = HashMap::new();
        let mut paths = Vec::new();
        for &(path, source, binary, build_depends) in recipes {
            paths.push(path.to_string());
            let _ = paragraphs.insert(
                path.to_string(),
                ControlParagraph {
                    source: source.to_string(),
                    binary: binary.iter().map(|s| s.to_string()).collect(),
                    build_depends: build_depends.to_string(),
                    build_depends_indep: String::new(),
                    build_depends_arch: String::new(),
                },
            );
        }
        (Self { paragraphs }, paths)
    }
}

impl ControlFileReader for FixtureReader {
    fn read_control(&self, path: &str) -> Result<ControlParagraph, LoaderError> {
        self.paragraphs
            .get(path)
            .cloned()
            .ok_or_else(|| LoaderError::RecipeUnreadable {
                path: path.to_string(),
                reason: "not in fixture".to_string(),
            })
    }
}

/// S1 — linear chain: A <- B <- C. Priorities 30/20/10, dispatch A, B, C.
#[test]
fn s1_linear_chain() {
    let (reader, paths) = FixtureReader::new(&[
        ("/a", "A", &["a"], ""),
        ("/b", "B", &["b"], "a"),
        ("/c", "C", &["c"], "b"),
    ]);
    let index = InMemoryPackageIndex::new();
    let schedule = build_schedule(&paths, reader, &index, &CircularDeclarationSet::empty()).unwrap();

    for _ in 0..3 {
        let batch = schedule.next_batch(1).unwrap();
        assert_eq!(batch.len(), 1);
        schedule.report_success(batch[0]).unwrap();
    }
    assert!(schedule.is_done());
}

/// S2 — fan-out: A is depended on by B, C, D. A=40, others=10; B/C/D
/// dispatch together, name-sorted.
#[test]
fn s2_fan_out() {
    let (reader, paths) = FixtureReader::new(&[
        ("/a", "A", &["a"], ""),
        ("/b", "B", &["b"], "a"),
        ("/c", "C", &["c"], "a"),
        ("/d", "D", &["d"], "a"),
    ]);
    let index = InMemoryPackageIndex::new();
    let schedule = build_schedule(&paths, reader, &index, &CircularDeclarationSet::empty()).unwrap();

    let first = schedule.next_batch(1).unwrap();
    assert_eq!(first.len(), 1);
    schedule.report_success(first[0]).unwrap();

    let rest = schedule.next_batch(3).unwrap();
    assert_eq!(rest.len(), 3);

    for id in rest {
        schedule.report_success(id).unwrap();
    }
    assert!(schedule.is_done());
}

/// S3 — declared cycle: X <-> Y, declared `SRC SET: X Y / BUILD ORDER: X Y`.
#[test]
fn s3_declared_cycle() {
    let (reader, paths) = FixtureReader::new(&[("/x", "X", &["x"], "y"), ("/y", "Y", &["y"], "x")]);
    let index = InMemoryPackageIndex::new();
    let declarations = debsched_core::declarations::parse_declarations(
        "SRC SET: X Y\nBUILD ORDER: X Y\n",
    )
    .unwrap();
    let schedule = build_schedule(&paths, reader, &index, &declarations).unwrap();

    let first = schedule.next_batch(5).unwrap();
    assert_eq!(first.len(), 1);
    schedule.report_success(first[0]).unwrap();

    let second = schedule.next_batch(5).unwrap();
    assert_eq!(second.len(), 1);
    schedule.report_success(second[0]).unwrap();

    assert!(schedule.is_done());
}

/// S4 — same graph as S3 but undeclared: construction fails naming both X
/// and Y.
#[test]
fn s4_undeclared_cycle() {
    let (reader, paths) = FixtureReader::new(&[("/x", "X", &["x"], "y"), ("/y", "Y", &["y"], "x")]);
    let index = InMemoryPackageIndex::new();

    let err = build_schedule(&paths, reader, &index, &CircularDeclarationSet::empty()).unwrap_err();
    match err {
        ScheduleError::Grouping(GroupingError::UndeclaredCycle(report)) => {
            let rendered = report.to_string();
            assert!(rendered.contains('X'));
            assert!(rendered.contains('Y'));
        }
        other => panic!("expected UndeclaredCycle, got {other:?}"),
    }
}

/// S5 — cycle plus tail: X<->Y declared, Z build-deps x. Z must not dispatch
/// until both cycle members complete.
#[test]
fn s5_cycle_plus_tail() {
    let (reader, paths) = FixtureReader::new(&[
        ("/x", "X", &["x"], "y"),
        ("/y", "Y", &["y"], "x"),
        ("/z", "Z", &["z"], "x"),
    ]);
    let index = InMemoryPackageIndex::new();
    let declarations = debsched_core::declarations::parse_declarations(
        "SRC SET: X Y\nBUILD ORDER: X Y\n",
    )
    .unwrap();
    let schedule = build_schedule(&paths, reader, &index, &declarations).unwrap();

    let first = schedule.next_batch(5).unwrap();
    assert_eq!(first.len(), 1);
    // Z is not reachable while the cycle is unfinished.
    assert!(schedule.next_batch(5).unwrap().is_empty());
    schedule.report_success(first[0]).unwrap();

    let second = schedule.next_batch(5).unwrap();
    assert_eq!(second.len(), 1);
    schedule.report_success(second[0]).unwrap();

    let tail = schedule.next_batch(5).unwrap();
    assert_eq!(tail.len(), 1);
    schedule.report_success(tail[0]).unwrap();
    assert!(schedule.is_done());
}

/// S6 — failure then retry: a dispatched recipe returned via
/// `report_failure` is redispatched with its original priority intact.
#[test]
fn s6_failure_then_retry() {
    let (reader, paths) = FixtureReader::new(&[
        ("/a", "A", &["a"], ""),
        ("/b", "B", &["b"], "a"),
        ("/c", "C", &["c"], "b"),
    ]);
    let index = InMemoryPackageIndex::new();
    let schedule = build_schedule(&paths, reader, &index, &CircularDeclarationSet::empty()).unwrap();

    let first = schedule.next_batch(1).unwrap();
    assert_eq!(first.len(), 1);
    schedule.report_failure(first[0]).unwrap();

    let retry = schedule.next_batch(1).unwrap();
    assert_eq!(retry, first);
    schedule.report_success(retry[0]).unwrap();

    let next = schedule.next_batch(1).unwrap();
    assert_eq!(next.len(), 1);
    assert_ne!(next, first);
}

/// I2 (uniqueness): two concurrent `next_batch` callers never see the same
/// recipe twice before it is reported.
#[test]
fn uniqueness_across_concurrent_dispatch() {
    let (reader, paths) = FixtureReader::new(&[
        ("/a", "A", &["a"], ""),
        ("/b", "B", &["b"], "a"),
        ("/c", "C", &["c"], "a"),
        ("/d", "D", &["d"], "a"),
    ]);
    let index = InMemoryPackageIndex::new();
    let schedule = std::sync::Arc::new(
        build_schedule(&paths, reader, &index, &CircularDeclarationSet::empty()).unwrap(),
    );

    let first = schedule.next_batch(1).unwrap();
    schedule.report_success(first[0]).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let schedule = std::sync::Arc::clone(&schedule);
            std::thread::spawn(move || schedule.next_batch(1).unwrap())
        })
        .collect();

    let mut seen = std::collections::HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "recipe {id} dispensed to more than one worker");
        }
    }
}
