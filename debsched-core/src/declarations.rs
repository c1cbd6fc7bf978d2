//! Circular declaration set: the collaborator file naming which recipe sets
//! are allowed to form a build cycle, and the serial order to build them in.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::GroupingError;

/// One declared circular build group, by short recipe name.
#[derive(Debug, Clone)]
pub struct CircularDeclaration {
    /// The set of recipe names forming the group.
    pub members: BTreeSet<String>,
    /// The serial build order, a permutation of `members`.
    pub order: Vec<String>,
}

/// An ordered list of [`CircularDeclaration`]s, as read from a declarations
/// file.
#[derive(Debug, Clone, Default)]
pub struct CircularDeclarationSet {
    /// Declarations in file order.
    pub declarations: Vec<CircularDeclaration>,
}

impl CircularDeclarationSet {
    /// An empty declaration set — "no declared circular groups".
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Read a circular-declarations file.
///
/// Lines are `#`-comment-stripped (an inline `#` suffix is stripped, matching
/// the reference implementation) before being interpreted. Declarations come
/// in strictly alternating `SRC SET:` / `BUILD ORDER:` pairs.
///
/// # Errors
///
/// - `GroupingError::MalformedDeclaration` if the alternation is broken, or
///   a declaration's `members` and `order` disagree, or `members` is empty.
pub fn read_declarations(path: &Path) -> Result<CircularDeclarationSet, GroupingError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| malformed(format!("cannot read {path:?}: {e}")))?;
    parse_declarations(&contents)
}

/// Build a `MalformedDeclaration` error, logging it per §4.8's per-fatal-
/// condition `tracing::error!` contract before returning it to the caller.
fn malformed(reason: impl Into<String>) -> GroupingError {
    let reason = reason.into();
    tracing::error!(reason = %reason, "malformed circular declaration");
    GroupingError::MalformedDeclaration(reason)
}

/// Parse a circular-declarations file body (see [`read_declarations`]).
///
/// # Errors
///
/// `GroupingError::MalformedDeclaration` on any alternation or member/order
/// mismatch.
pub fn parse_declarations(contents: &str) -> Result<CircularDeclarationSet, GroupingError> {
    let mut declarations = Vec::new();
    let mut pending_src_set: Option<Vec<String>> = None;

    for raw_line in contents.lines() {
        let line = match raw_line.split_once('#') {
            Some((before, _)) => before,
            None => raw_line,
        }
        .trim();

        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("SRC SET:") {
            if pending_src_set.is_some() {
                return Err(malformed(
                    "two SRC SET: lines in a row, expected a BUILD ORDER: line between them",
                ));
            }
            pending_src_set = Some(rest.split_whitespace().map(str::to_string).collect());
        } else if let Some(rest) = line.strip_prefix("BUILD ORDER:") {
            let Some(members) = pending_src_set.take() else {
                return Err(malformed("BUILD ORDER: line with no preceding SRC SET: line"));
            };
            let order: Vec<String> = rest.split_whitespace().map(str::to_string).collect();

            let member_set: BTreeSet<String> = members.into_iter().collect();
            let order_set: BTreeSet<String> = order.iter().cloned().collect();

            if member_set.is_empty() {
                return Err(malformed("SRC SET: must not be empty"));
            }
            if member_set != order_set || member_set.len() != order.len() {
                return Err(malformed(format!(
                    "SRC SET {member_set:?} does not match BUILD ORDER {order:?}"
                )));
            }

            declarations.push(CircularDeclaration {
                members: member_set,
                order,
            });
        } else {
            return Err(malformed(format!("unrecognized declaration line: {line}")));
        }
    }

    if pending_src_set.is_some() {
        return Err(malformed("SRC SET: line with no following BUILD ORDER: line"));
    }

    Ok(CircularDeclarationSet { declarations })
}
