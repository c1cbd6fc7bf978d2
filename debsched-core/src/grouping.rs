//! Cycle classifier & grouper (C3): partitions the dependency graph into an
//! ordered sequence of Simple and Circular build groups.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use debsched_graph::DAG;

use crate::declarations::CircularDeclarationSet;
use crate::error::{CycleReport, GroupingError};
use crate::priority::assign_priorities;
use crate::recipe::{RecipeId, SourceRecipe};
use crate::resolver::DependencyGraph;

/// One group in the build schedule: either a cycle-free DAG fragment built
/// in priority order, or a declared-cyclic fragment built in a fixed serial
/// order.
#[derive(Debug, Clone)]
pub enum BuildGroup {
    /// A cycle-free subset of recipes.
    Simple {
        /// Members, in no particular order.
        members: Vec<RecipeId>,
        /// In-group build-depends edges (restricted to `members`).
        on: HashMap<RecipeId, BTreeSet<RecipeId>>,
        /// In-group reverse edges (restricted to `members`).
        by: HashMap<RecipeId, BTreeSet<RecipeId>>,
        /// Dispatch priority per member (§4.4).
        priority: HashMap<RecipeId, i64>,
    },
    /// A declared-cyclic subset, built one at a time in `order`.
    Circular {
        /// Members, in no particular order.
        members: Vec<RecipeId>,
        /// The declared serial build order, a permutation of `members`.
        order: Vec<RecipeId>,
    },
}

impl BuildGroup {
    /// Members of this group, in no particular order.
    #[must_use]
    pub fn members(&self) -> &[RecipeId] {
        match self {
            BuildGroup::Simple { members, .. } | BuildGroup::Circular { members, .. } => members,
        }
    }
}

/// Partition `graph` into an ordered sequence of build groups, honoring
/// `declarations` for any cycle the graph contains.
///
/// # Errors
///
/// - `GroupingError::UndeclaredCycle` if the remaining graph contains a
///   cycle not covered by any declaration, after all possible Simple and
///   Circular layers have been extracted.
pub fn group(
    recipes: &[SourceRecipe],
    graph: &DependencyGraph,
    declarations: &CircularDeclarationSet,
) -> Result<Vec<BuildGroup>, GroupingError> {
    let name_of: HashMap<RecipeId, &str> = recipes.iter().map(|r| (r.id, r.name.as_str())).collect();
    let id_of: HashMap<&str, RecipeId> = recipes.iter().map(|r| (r.name.as_str(), r.id)).collect();

    let mut remaining: BTreeSet<RecipeId> = recipes.iter().map(|r| r.id).collect();
    let mut groups = Vec::new();

    while !remaining.is_empty() {
        let simple_layer = extract_simple_layer(&remaining, graph);
        if !simple_layer.is_empty() {
            for id in &simple_layer {
                let _ = remaining.remove(id);
            }
            groups.push(build_simple_group(&simple_layer, graph));
            continue;
        }

        // Fresh each outer-loop pass: a declaration that failed "depends
        // only on self" against this pass's `remaining` may legitimately
        // succeed once `remaining` has shrunk further, so the blacklist
        // must not persist across passes.
        let mut checked_set: Vec<BTreeSet<RecipeId>> = Vec::new();
        if let Some((declaration_members, order)) =
            extract_circular_layer(&remaining, graph, declarations, &id_of, &mut checked_set)
        {
            for id in &declaration_members {
                let _ = remaining.remove(id);
            }
            groups.push(BuildGroup::Circular {
                members: declaration_members,
                order,
            });
            continue;
        }

        // Neither extraction shrank `remaining`: an undeclared cycle exists.
        let cycles = diagnose_cycles(&remaining, graph, &name_of);
        tracing::error!(cycles = ?cycles, "undeclared cycle in build graph");
        for cycle in &cycles {
            for participant in cycle {
                tracing::info!(recipe = %participant, "cycle participant");
            }
        }
        return Err(GroupingError::UndeclaredCycle(CycleReport(cycles)));
    }

    tracing::debug!(groups = groups.len(), "partitioned build graph into groups");
    Ok(groups)
}

/// Repeatedly remove recipes in `remaining` whose dependencies (restricted
/// to `remaining`) are already satisfied, accumulating them into one layer,
/// until no more can be removed.
fn extract_simple_layer(remaining: &BTreeSet<RecipeId>, graph: &DependencyGraph) -> Vec<RecipeId> {
    let mut working: BTreeSet<RecipeId> = remaining.clone();
    let mut layer = Vec::new();

    loop {
        let free: Vec<RecipeId> = working
            .iter()
            .copied()
            .filter(|&id| graph.on(id).is_disjoint(&working))
            .collect();

        if free.is_empty() {
            break;
        }
        for id in &free {
            let _ = working.remove(id);
        }
        layer.extend(free);
    }

    layer
}

/// Scan the declaration set in order for one whose members are entirely
/// contained in `remaining` and which depends only on itself.
fn extract_circular_layer(
    remaining: &BTreeSet<RecipeId>,
    graph: &DependencyGraph,
    declarations: &CircularDeclarationSet,
    id_of: &HashMap<&str, RecipeId>,
    checked_set: &mut Vec<BTreeSet<RecipeId>>,
) -> Option<(Vec<RecipeId>, Vec<RecipeId>)> {
    'declarations: for declaration in &declarations.declarations {
        let Some(member_ids): Option<BTreeSet<RecipeId>> = declaration
            .members
            .iter()
            .map(|name| id_of.get(name.as_str()).copied())
            .collect()
        else {
            continue;
        };

        if !member_ids.is_subset(remaining) {
            continue;
        }

        for known_bad in checked_set.iter() {
            if member_ids.is_subset(known_bad) {
                continue 'declarations;
            }
        }

        let depends_only_on_self = member_ids
            .iter()
            .all(|&id| graph.on(id).intersection(remaining).all(|dep| member_ids.contains(dep)));

        if depends_only_on_self {
            let order: Option<Vec<RecipeId>> = declaration
                .order
                .iter()
                .map(|name| id_of.get(name.as_str()).copied())
                .collect();
            if let Some(order) = order {
                return Some((member_ids.into_iter().collect(), order));
            }
        }

        checked_set.push(member_ids);
    }

    None
}

fn build_simple_group(layer: &[RecipeId], graph: &DependencyGraph) -> BuildGroup {
    let members: BTreeSet<RecipeId> = layer.iter().copied().collect();

    let mut on = HashMap::new();
    let mut by = HashMap::new();
    for &id in layer {
        let in_group_on: BTreeSet<RecipeId> = graph
            .on(id)
            .into_iter()
            .filter(|dep| members.contains(dep))
            .collect();
        for &dep in &in_group_on {
            let _ = by.entry(dep).or_insert_with(BTreeSet::new).insert(id);
        }
        let _ = on.insert(id, in_group_on);
    }
    for &id in layer {
        let _ = by.entry(id).or_insert_with(BTreeSet::new);
    }

    let priority = assign_priorities(layer, &on, &by);

    BuildGroup::Simple {
        members: layer.to_vec(),
        on,
        by,
        priority,
    }
}

/// Enumerate every cycle remaining in the subgraph induced by `remaining`,
/// expanding each to its full strongly-connected region.
fn diagnose_cycles(
    remaining: &BTreeSet<RecipeId>,
    graph: &DependencyGraph,
    name_of: &HashMap<RecipeId, &str>,
) -> Vec<Vec<String>> {
    let mut dag = DAG::<RecipeId, ()>::new();
    let mut node_of: BTreeMap<RecipeId, debsched_graph::NodeId> = BTreeMap::new();
    for &id in remaining {
        let _ = node_of.insert(id, dag.add_node(id));
    }
    for &id in remaining {
        for dep in graph.on(id) {
            if remaining.contains(&dep) {
                // dep must complete before id: edge dep -> id.
                let _ = dag.add_edge_unchecked(node_of[&dep], node_of[&id], ());
            }
        }
    }

    let cycles = dag.find_cycles();
    let mut reported: BTreeSet<RecipeId> = BTreeSet::new();
    let mut result = Vec::new();

    for cycle in &cycles {
        let cycle_recipes: Vec<RecipeId> = cycle
            .iter()
            .map(|node_id| *dag.node(*node_id).expect("node exists"))
            .collect();
        if cycle_recipes.iter().any(|id| reported.contains(id)) {
            continue;
        }

        let region_nodes = dag.strongly_connected_region(cycle);
        let mut region_recipes: Vec<RecipeId> = region_nodes
            .iter()
            .map(|node_id| *dag.node(*node_id).expect("node exists"))
            .collect();
        region_recipes.sort();

        for &id in &region_recipes {
            let _ = reported.insert(id);
        }

        result.push(
            region_recipes
                .iter()
                .map(|id| (*name_of.get(id).unwrap_or(&"?")).to_string())
                .collect(),
        );
    }

    result
}
