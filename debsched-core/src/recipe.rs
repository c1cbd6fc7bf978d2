//! Recipe data model, control-file collaborator boundary, and the recipe
//! loader (C1).

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use crate::error::LoaderError;

/// Stable identifier for a [`SourceRecipe`] within one schedule build.
///
/// Assigned sequentially in load order; never reused once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecipeId(pub(crate) usize);

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A Debian source-package recipe: the unit of work scheduled by this crate.
#[derive(Debug, Clone)]
pub struct SourceRecipe {
    /// Stable identifier assigned at load time.
    pub id: RecipeId,
    /// Filesystem-like path identifying the recipe, as handed to the loader.
    pub path: String,
    /// Short human name (`Source:` field), used in diagnostics and to match
    /// declared circular groups.
    pub name: String,
    /// Binary package names this recipe produces. Non-empty.
    pub produces: BTreeSet<String>,
    /// The three build-depends fields, concatenated with `,`, unparsed.
    pub raw_build_depends: String,
}

/// A parsed Debian control paragraph, the sole shape the core ever sees of a
/// recipe's control data.
#[derive(Debug, Clone, Default)]
pub struct ControlParagraph {
    /// `Source:` field.
    pub source: String,
    /// `Binary:` field, already split on commas.
    pub binary: Vec<String>,
    /// `Build-Depends:` field, raw.
    pub build_depends: String,
    /// `Build-Depends-Indep:` field, raw.
    pub build_depends_indep: String,
    /// `Build-Depends-Arch:` field, raw.
    pub build_depends_arch: String,
}

/// Collaborator boundary: turns a recipe path into a parsed control
/// paragraph. The core never tokenizes RFC822 itself.
pub trait ControlFileReader {
    /// Read and parse the control data for the recipe at `path`.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::RecipeUnreadable` if the recipe cannot be
    /// opened, or `LoaderError::RecipeMalformed` if its shape is invalid.
    fn read_control(&self, path: &str) -> Result<ControlParagraph, LoaderError>;
}

/// Reference [`ControlFileReader`] reading the classic `Field: value` line
/// format found in a `.dsc`, with RFC822-style continuation lines (lines
/// beginning with whitespace extend the previous field).
///
/// This is a concrete binding, not part of the core contract: swapping it
/// for a full RFC822 parser does not change the loader's behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct DscControlFileReader;

impl ControlFileReader for DscControlFileReader {
    fn read_control(&self, path: &str) -> Result<ControlParagraph, LoaderError> {
        let contents = std::fs::read_to_string(path).map_err(|e| LoaderError::RecipeUnreadable {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let mut fields: Vec<(String, String)> = Vec::new();
        for line in contents.lines() {
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = fields.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                fields.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        let field = |name: &str| -> String {
            fields
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };

        let source = field("Source");
        let binary = field("Binary");
        let binary: Vec<String> = binary
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(ControlParagraph {
            source,
            binary,
            build_depends: field("Build-Depends"),
            build_depends_indep: field("Build-Depends-Indep"),
            build_depends_arch: field("Build-Depends-Arch"),
        })
    }
}

/// Read a recipe-list file: one recipe path per line, blank lines and lines
/// whose first non-whitespace character is `#` ignored.
///
/// # Errors
///
/// Returns `LoaderError::RecipeUnreadable` if the list file itself cannot be
/// read.
pub fn read_recipe_list(path: &Path) -> Result<Vec<String>, LoaderError> {
    let contents = std::fs::read_to_string(path).map_err(|e| LoaderError::RecipeUnreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Loads [`SourceRecipe`]s from recipe paths via a [`ControlFileReader`].
pub struct RecipeLoader<R: ControlFileReader> {
    reader: R,
}

impl<R: ControlFileReader> RecipeLoader<R> {
    /// Create a loader backed by `reader`.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Load every recipe named in `paths`, in order, assigning sequential
    /// [`RecipeId`]s.
    ///
    /// # Errors
    ///
    /// - `LoaderError::RecipeUnreadable` / `RecipeMalformed` per recipe.
    /// - `LoaderError::DuplicateBinary` if two recipes share a produced
    ///   binary.
    pub fn load(&self, paths: &[String]) -> Result<Vec<SourceRecipe>, LoaderError> {
        let mut recipes = Vec::with_capacity(paths.len());
        let mut seen_binaries: std::collections::HashMap<String, String> =
            std::collections::HashMap::new();

        for (index, path) in paths.iter().enumerate() {
            let paragraph = self.reader.read_control(path)?;

            if paragraph.source.is_empty() || paragraph.binary.is_empty() {
                return Err(LoaderError::RecipeMalformed {
                    path: path.clone(),
                    reason: "Source and Binary fields must both be non-empty".to_string(),
                });
            }

            let produces: BTreeSet<String> = paragraph.binary.into_iter().collect();

            for binary in &produces {
                if let Some(existing) = seen_binaries.insert(binary.clone(), path.clone()) {
                    tracing::error!(
                        binary = %binary,
                        first = %existing,
                        second = %path,
                        "binary produced by more than one recipe"
                    );
                    return Err(LoaderError::DuplicateBinary {
                        binary: binary.clone(),
                        first: existing,
                        second: path.clone(),
                    });
                }
            }

            let raw_build_depends = [
                paragraph.build_depends.as_str(),
                paragraph.build_depends_indep.as_str(),
                paragraph.build_depends_arch.as_str(),
            ]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(",");

            recipes.push(SourceRecipe {
                id: RecipeId(index),
                path: path.clone(),
                name: paragraph.source,
                produces,
                raw_build_depends,
            });
        }

        tracing::debug!(count = recipes.len(), "loaded recipes");
        Ok(recipes)
    }
}
