//! Typed error taxonomy, one `thiserror`-derived enum per component, composed
//! into a single [`ScheduleError`] for `Schedule::build`.

use crate::recipe::RecipeId;

/// Errors raised while ingesting recipes (C1).
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// A recipe path could not be opened or read.
    #[error("recipe {path} could not be read: {reason}")]
    RecipeUnreadable {
        /// Path of the unreadable recipe.
        path: String,
        /// Underlying reason.
        reason: String,
    },

    /// A recipe's control data was missing required fields.
    #[error("recipe {path} is malformed: {reason}")]
    RecipeMalformed {
        /// Path of the malformed recipe.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Two recipes list the same binary in their `produces` set.
    #[error("binary {binary} is produced by both {first} and {second}")]
    DuplicateBinary {
        /// The conflicting binary name.
        binary: String,
        /// Path of the first recipe producing it.
        first: String,
        /// Path of the second recipe producing it.
        second: String,
    },
}

/// Errors raised while resolving binary-to-source dependencies (C2).
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// The external package index could not answer a dependency query.
    #[error("package index unavailable: {0}")]
    IndexUnavailable(String),

    /// Two recipes list the same binary in their `produces` set.
    #[error("binary {binary} is produced by both {first} and {second}")]
    DuplicateBinary {
        /// The conflicting binary name.
        binary: String,
        /// Path of the first recipe producing it.
        first: String,
        /// Path of the second recipe producing it.
        second: String,
    },
}

/// Errors raised while classifying and grouping the dependency graph (C3).
#[derive(Debug, thiserror::Error)]
pub enum GroupingError {
    /// The remaining graph contains at least one cycle not covered by any
    /// declaration. Carries every strongly-connected component involved.
    #[error("undeclared cycle(s) in build graph: {0}")]
    UndeclaredCycle(
        /// Each entry is one cycle's participants, by recipe name, in
        /// traversal order.
        CycleReport,
    ),

    /// A circular declaration's `members` and `order` disagree, or the
    /// declarations file alternation is broken.
    #[error("malformed circular declaration: {0}")]
    MalformedDeclaration(String),
}

/// The set of strongly-connected components found when an undeclared cycle
/// forces construction to fail. Each inner vector is one cycle's
/// participants, by recipe name, in traversal order.
#[derive(Debug, Clone)]
pub struct CycleReport(pub Vec<Vec<String>>);

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|cycle| {
                let mut chain = cycle.join(" build depends on ");
                if let Some(first) = cycle.first() {
                    chain.push_str(" build depends on ");
                    chain.push_str(first);
                }
                chain
            })
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// Fatal, construction-time errors, composed across C1-C3.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Recipe ingestion failed.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Dependency resolution failed.
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Cycle classification or declaration parsing failed.
    #[error(transparent)]
    Grouping(#[from] GroupingError),
}

/// Recoverable, runtime errors raised by the scheduler (C5).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `report_success`/`report_failure` was called for a recipe that is not
    /// currently `building`.
    #[error("recipe {0} is not currently dispatched")]
    NotDispatched(RecipeId),

    /// `next_batch` was called with `n` outside `[1, 99]`.
    #[error("invalid batch size {0}, must be in 1..=99")]
    InvalidBatchSize(usize),
}
