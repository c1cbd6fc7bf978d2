//! Debian source-package dependency resolver and build scheduler.
//!
//! Given a collection of source-package recipes (each declaring the binary
//! packages it produces and the binaries it build-depends upon), this crate
//! computes a safe build order and exposes a concurrent-safe API for a pool
//! of build workers to pull work, report success, or report failure.
//!
//! The pipeline is five cooperating components:
//!
//! 1. [`recipe`] — ingests recipes, extracting produced binaries and raw
//!    build-depends strings (C1).
//! 2. [`resolver`] — closes runtime deps through an external [`index::PackageIndex`]
//!    and derives the source-to-source dependency graph (C2).
//! 3. [`grouping`] — partitions the graph into Simple (acyclic) and Circular
//!    (declared-cycle) build groups, rejecting any cycle left undeclared (C3).
//! 4. [`priority`] (internal) — assigns bottom-up dispatch priorities within
//!    each Simple group (C4).
//! 5. [`scheduler`] — the mutex-protected runtime state machine workers call
//!    into (C5).
//!
//! [`build_schedule`] wires all five together for the common case; callers
//! needing finer control (a pre-built [`resolver::DependencyGraph`], a
//! custom [`grouping::BuildGroup`] set) can call the stage functions
//! directly.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

pub mod config;
pub mod declarations;
pub mod error;
pub mod grouping;
pub mod index;
mod priority;
pub mod recipe;
pub mod resolver;
pub mod scheduler;

pub use config::ScheduleConfig;
pub use declarations::{read_declarations, CircularDeclaration, CircularDeclarationSet};
pub use error::{GroupingError, LoaderError, ResolverError, ScheduleError, SchedulerError};
pub use grouping::BuildGroup;
pub use index::{InMemoryPackageIndex, PackageIndex};
pub use recipe::{
    read_recipe_list, ControlFileReader, ControlParagraph, DscControlFileReader, RecipeId,
    RecipeLoader, SourceRecipe,
};
pub use scheduler::{GroupStats, Schedule, ScheduleStats};

/// Run the full C1-C4 pipeline and assemble a ready-to-dispatch [`Schedule`].
///
/// This is the one-call convenience entry point; it reads every recipe in
/// `recipe_paths` via `reader`, resolves and groups the dependency graph
/// against `index` and `declarations`, and returns a scheduler workers can
/// immediately call `next_batch` against.
///
/// # Errors
///
/// Returns [`ScheduleError`] if recipe loading, dependency resolution, or
/// cycle classification fails — see each stage's error kind for detail.
pub fn build_schedule<R: ControlFileReader>(
    recipe_paths: &[String],
    reader: R,
    index: &dyn PackageIndex,
    declarations: &CircularDeclarationSet,
) -> Result<Schedule, ScheduleError> {
    let recipes = RecipeLoader::new(reader).load(recipe_paths)?;
    let graph = resolver::resolve(&recipes, index)?;
    let groups = grouping::group(&recipes, &graph, declarations)?;

    let names = recipes.iter().map(|r| (r.id, r.name.clone())).collect();
    Ok(Schedule::from_groups(groups, names))
}

/// Run [`build_schedule`] from a [`ScheduleConfig`], reading the recipe list
/// and (if named) the circular-declarations file from disk first.
///
/// # Errors
///
/// Returns [`ScheduleError`] if the recipe-list file, the declarations file,
/// or any pipeline stage fails to load.
pub fn build_schedule_from_config<R: ControlFileReader>(
    config: &ScheduleConfig,
    reader: R,
    index: &dyn PackageIndex,
) -> Result<Schedule, ScheduleError> {
    let recipe_paths = read_recipe_list(&config.recipe_list_path)?;
    let declarations = match &config.declarations_path {
        Some(path) => read_declarations(path)?,
        None => CircularDeclarationSet::empty(),
    };

    build_schedule(&recipe_paths, reader, index, &declarations)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReader {
        paragraphs: std::collections::HashMap<String, ControlParagraph>,
    }

    impl ControlFileReader for FixedReader {
        fn read_control(&self, path: &str) -> Result<ControlParagraph, LoaderError> {
            self.paragraphs
                .get(path)
                .cloned()
                .ok_or_else(|| LoaderError::RecipeUnreadable {
                    path: path.to_string(),
                    reason: "no such recipe in fixture".to_string(),
                })
        }
    }

    fn paragraph(source: &str, binary: &[&str], build_depends: &str) -> ControlParagraph {
        ControlParagraph {
            source: source.to_string(),
            binary: binary.iter().map(|s| s.to_string()).collect(),
            build_depends: build_depends.to_string(),
            build_depends_indep: String::new(),
            build_depends_arch: String::new(),
        }
    }

    #[test]
    fn end_to_end_linear_chain() {
        let reader = FixedReader {
            paragraphs: std::collections::HashMap::from([
                ("/a".to_string(), paragraph("A", &["a"], "")),
                ("/b".to_string(), paragraph("B", &["b"], "a")),
                ("/c".to_string(), paragraph("C", &["c"], "b")),
            ]),
        };
        let index = InMemoryPackageIndex::new();
        let paths = vec!["/a".to_string(), "/b".to_string(), "/c".to_string()];

        let schedule =
            build_schedule(&paths, reader, &index, &CircularDeclarationSet::empty()).unwrap();

        let first = schedule.next_batch(1).unwrap();
        assert_eq!(first.len(), 1);
        schedule.report_success(first[0]).unwrap();

        let second = schedule.next_batch(1).unwrap();
        assert_eq!(second.len(), 1);
        schedule.report_success(second[0]).unwrap();

        let third = schedule.next_batch(1).unwrap();
        assert_eq!(third.len(), 1);
        schedule.report_success(third[0]).unwrap();

        assert!(schedule.is_done());
    }

    #[test]
    fn end_to_end_undeclared_cycle_is_rejected() {
        let reader = FixedReader {
            paragraphs: std::collections::HashMap::from([
                ("/x".to_string(), paragraph("X", &["x"], "y")),
                ("/y".to_string(), paragraph("Y", &["y"], "x")),
            ]),
        };
        let index = InMemoryPackageIndex::new();
        let paths = vec!["/x".to_string(), "/y".to_string()];

        let result = build_schedule(&paths, reader, &index, &CircularDeclarationSet::empty());
        assert!(matches!(result, Err(ScheduleError::Grouping(GroupingError::UndeclaredCycle(_)))));
    }

    #[test]
    fn end_to_end_declared_cycle_dispatches_serially() {
        let reader = FixedReader {
            paragraphs: std::collections::HashMap::from([
                ("/x".to_string(), paragraph("X", &["x"], "y")),
                ("/y".to_string(), paragraph("Y", &["y"], "x")),
            ]),
        };
        let index = InMemoryPackageIndex::new();
        let paths = vec!["/x".to_string(), "/y".to_string()];
        let declarations =
            declarations::parse_declarations("SRC SET: X Y\nBUILD ORDER: X Y\n").unwrap();

        let schedule = build_schedule(&paths, reader, &index, &declarations).unwrap();

        let first = schedule.next_batch(5).unwrap();
        assert_eq!(first.len(), 1);
        assert!(schedule.next_batch(5).unwrap().is_empty());
        schedule.report_success(first[0]).unwrap();

        let second = schedule.next_batch(5).unwrap();
        assert_eq!(second.len(), 1);
        schedule.report_success(second[0]).unwrap();

        assert!(schedule.is_done());
    }

    #[test]
    fn duplicate_binary_is_fatal() {
        let reader = FixedReader {
            paragraphs: std::collections::HashMap::from([
                ("/a".to_string(), paragraph("A", &["shared"], "")),
                ("/b".to_string(), paragraph("B", &["shared"], "")),
            ]),
        };
        let index = InMemoryPackageIndex::new();
        let paths = vec!["/a".to_string(), "/b".to_string()];

        let result = build_schedule(&paths, reader, &index, &CircularDeclarationSet::empty());
        assert!(matches!(result, Err(ScheduleError::Loader(LoaderError::DuplicateBinary { .. }))));
    }
}
