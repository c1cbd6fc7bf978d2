//! Ambient configuration surface: a thin argument bag wiring a run together,
//! independent of how it's populated (CLI flags, defaults, or a caller's own
//! wiring).

use std::path::PathBuf;

/// Default dispatch batch size when a caller doesn't specify one.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Names the inputs needed to build and run a [`crate::Schedule`]: where to
/// read recipes from, an optional circular-declarations file, and the
/// default batch size a worker pool should request per `next_batch` call.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Path to the recipe-list file (one recipe path per line).
    pub recipe_list_path: PathBuf,
    /// Path to the circular-declarations file. `None` means "no declared
    /// circular groups" — any cycle found is rejected as undeclared.
    pub declarations_path: Option<PathBuf>,
    /// Default dispatch batch size for a worker pool's `next_batch` calls.
    pub batch_size: usize,
}

impl ScheduleConfig {
    /// Build a config naming only the recipe-list path, with no declared
    /// circular groups and the default batch size.
    #[must_use]
    pub fn new(recipe_list_path: PathBuf) -> Self {
        Self { recipe_list_path, declarations_path: None, batch_size: DEFAULT_BATCH_SIZE }
    }

    /// Set the circular-declarations file path.
    #[must_use]
    pub fn with_declarations(mut self, path: PathBuf) -> Self {
        self.declarations_path = Some(path);
        self
    }

    /// Override the default dispatch batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}
