//! Dependency resolver (C2): turns raw build-depends strings into a
//! source-to-source dependency multigraph.

use std::collections::{BTreeSet, HashMap};

use crate::error::ResolverError;
use crate::index::PackageIndex;
use crate::recipe::{RecipeId, SourceRecipe};

/// The derived source dependency graph.
///
/// `on(A)` is the set of recipes `A` build-depends on (transitively, via
/// runtime deps); `by(B)` is its reverse — the set of recipes that depend on
/// `B`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    on: HashMap<RecipeId, BTreeSet<RecipeId>>,
    by: HashMap<RecipeId, BTreeSet<RecipeId>>,
}

impl DependencyGraph {
    pub(crate) fn from_maps(
        on: HashMap<RecipeId, BTreeSet<RecipeId>>,
        by: HashMap<RecipeId, BTreeSet<RecipeId>>,
    ) -> Self {
        Self { on, by }
    }

    /// Build a graph directly from `on`/`by` maps, for grouping-module tests
    /// that want to exercise the grouper without a full loader/resolver
    /// pipeline.
    #[cfg(test)]
    pub(crate) fn test_new(
        on: HashMap<RecipeId, BTreeSet<RecipeId>>,
        by: HashMap<RecipeId, BTreeSet<RecipeId>>,
    ) -> Self {
        Self::from_maps(on, by)
    }

    /// Direct+transitive recipes that `id` build-depends on.
    #[must_use]
    pub fn on(&self, id: RecipeId) -> BTreeSet<RecipeId> {
        self.on.get(&id).cloned().unwrap_or_default()
    }

    /// Recipes that build-depend on `id`.
    #[must_use]
    pub fn by(&self, id: RecipeId) -> BTreeSet<RecipeId> {
        self.by.get(&id).cloned().unwrap_or_default()
    }
}

/// Split a recipe's raw build-depends string into the direct set of bare
/// binary names.
///
/// Splits on `,` then `|`, strips any parenthesized version constraint,
/// square-bracketed architecture restriction, or angle-bracketed build
/// profile restriction. Any token containing the profile `<cross>` anywhere
/// (checked before stripping) is discarded in full.
#[must_use]
pub fn tokenize_build_depends(raw: &str) -> BTreeSet<String> {
    let mut direct = BTreeSet::new();

    for clause in raw.split(',') {
        for alt in clause.split('|') {
            let alt = alt.trim();
            if alt.is_empty() {
                continue;
            }
            if alt.contains("<cross>") {
                continue;
            }
            let name = strip_restrictions(alt);
            if !name.is_empty() {
                let _ = direct.insert(name);
            }
        }
    }

    direct
}

/// Strip any `(...)`, `[...]`, or `<...>` bracketed restriction from a single
/// dependency token, leaving the bare binary name.
fn strip_restrictions(token: &str) -> String {
    let mut name = String::with_capacity(token.len());
    let mut depth: i32 = 0;

    for ch in token.chars() {
        match ch {
            '(' | '[' | '<' => depth += 1,
            ')' | ']' | '>' => depth = (depth - 1).max(0),
            _ if depth == 0 => name.push(ch),
            _ => {}
        }
    }

    name.trim().to_string()
}

/// Resolve the dependency graph for a set of recipes against an external
/// [`PackageIndex`].
///
/// # Errors
///
/// Returns `ResolverError::DuplicateBinary` if two recipes produce the same
/// binary.
pub fn resolve(
    recipes: &[SourceRecipe],
    index: &dyn PackageIndex,
) -> Result<DependencyGraph, ResolverError> {
    let binary_to_recipe = build_binary_map(recipes)?;

    let mut on: HashMap<RecipeId, BTreeSet<RecipeId>> = HashMap::new();
    let mut by: HashMap<RecipeId, BTreeSet<RecipeId>> = HashMap::new();

    for recipe in recipes {
        let direct = tokenize_build_depends(&recipe.raw_build_depends);
        let closed = transitive_closure(direct, index);

        let deps: BTreeSet<RecipeId> = closed
            .iter()
            .filter_map(|binary| binary_to_recipe.get(binary).copied())
            .filter(|&dep| dep != recipe.id)
            .collect();

        for &dep in &deps {
            let _ = by.entry(dep).or_default().insert(recipe.id);
        }
        let _ = on.insert(recipe.id, deps);
    }

    tracing::debug!(recipes = recipes.len(), "resolved dependency graph");
    Ok(DependencyGraph::from_maps(on, by))
}

fn build_binary_map(recipes: &[SourceRecipe]) -> Result<HashMap<String, RecipeId>, ResolverError> {
    let mut map = HashMap::new();
    let mut owner_path: HashMap<String, String> = HashMap::new();

    for recipe in recipes {
        for binary in &recipe.produces {
            if let Some(existing) = owner_path.insert(binary.clone(), recipe.path.clone()) {
                tracing::error!(
                    binary = %binary,
                    first = %existing,
                    second = %recipe.path,
                    "binary produced by more than one recipe"
                );
                return Err(ResolverError::DuplicateBinary {
                    binary: binary.clone(),
                    first: existing,
                    second: recipe.path.clone(),
                });
            }
            let _ = map.insert(binary.clone(), recipe.id);
        }
    }

    Ok(map)
}

/// Starting from `direct`, repeatedly query the index and accumulate until
/// fixed point. Binaries unknown to the index stay in the set but
/// contribute no further edges.
fn transitive_closure(direct: BTreeSet<String>, index: &dyn PackageIndex) -> BTreeSet<String> {
    let mut closed = direct.clone();
    let mut frontier: Vec<String> = direct.into_iter().collect();

    while let Some(binary) = frontier.pop() {
        for dep in index.candidate_dependencies(&binary) {
            if closed.insert(dep.clone()) {
                frontier.push(dep);
            }
        }
    }

    closed
}
