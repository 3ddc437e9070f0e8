//! Plan construction: `to_apply`, `to_rollback`, `reapply`, `develop`,
//! `mark`/`unmark` (spec §4.2), implemented as free functions over a
//! [`MigrationGraph`] and an [`AppliedSet`] rather than the teacher's
//! single-app-scoped `make_plan`, since yoyo's graph has no app
//! boundary to scope within.

use std::collections::BTreeSet;

use yoyo_core::YoyoError;

use crate::migration::MigrationGraph;

/// The ids currently recorded as applied in bookkeeping, in the order
/// they were applied (oldest first) as reconstructed from the `_yoyo_log`
/// table — needed for `develop`'s "n most recently applied" semantics.
#[derive(Debug, Clone, Default)]
pub struct AppliedSet {
    ids: BTreeSet<String>,
    /// Applied ids in the order bookkeeping recorded them, oldest first.
    order: Vec<String>,
}

impl AppliedSet {
    pub fn new(order: Vec<String>) -> Self {
        Self {
            ids: order.iter().cloned().collect(),
            order,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    /// The `n` most recently applied ids, most recent first.
    pub fn most_recent(&self, n: usize) -> Vec<String> {
        self.order.iter().rev().take(n).cloned().collect()
    }
}

/// A plan: an ordered sequence of ids with the direction they execute in.
#[derive(Debug, Clone)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDirection {
    Apply,
    Rollback,
}

#[derive(Debug, Clone)]
pub struct PlanStep {
    pub id: String,
    pub direction: PlanDirection,
}

impl Plan {
    fn apply(ids: Vec<String>) -> Self {
        Self {
            steps: ids
                .into_iter()
                .map(|id| PlanStep {
                    id,
                    direction: PlanDirection::Apply,
                })
                .collect(),
        }
    }

    fn rollback(ids: Vec<String>) -> Self {
        Self {
            steps: ids
                .into_iter()
                .map(|id| PlanStep {
                    id,
                    direction: PlanDirection::Rollback,
                })
                .collect(),
        }
    }

    fn then(mut self, mut other: Self) -> Self {
        self.steps.append(&mut other.steps);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// `to_apply(G) = ` canonical order of `V(G) \ A`, restricted to vertices
/// whose transitive dependencies are all in `A ∪ selected`. When `target`
/// is `Some(m)`, the plan is the canonical order of `({m} ∪ ancestors(m)) \ A`.
pub fn to_apply(
    graph: &MigrationGraph,
    applied: &AppliedSet,
    target: Option<&str>,
) -> Result<Plan, YoyoError> {
    let candidates: BTreeSet<String> = match target {
        Some(m) => {
            let mut set = graph.ancestors(m);
            set.insert(m.to_string());
            set.difference(applied.ids()).cloned().collect()
        }
        None => graph
            .ids()
            .difference(applied.ids())
            .cloned()
            .collect(),
    };

    let order = graph.topological_order_over(&candidates)?;
    Ok(Plan::apply(order))
}

/// `to_rollback = ` reverse canonical order of
/// `({m} ∪ descendants(m)) ∩ A` (or `A` when `target` is `None`, meaning
/// "all").
pub fn to_rollback(
    graph: &MigrationGraph,
    applied: &AppliedSet,
    target: Option<&str>,
) -> Result<Plan, YoyoError> {
    let candidates: BTreeSet<String> = match target {
        Some(m) => {
            let mut set = graph.descendants(m);
            set.insert(m.to_string());
            set.intersection(applied.ids()).cloned().collect()
        }
        None => applied.ids().clone(),
    };

    validate_rollback_targets(graph, &candidates)?;

    let mut order = graph.topological_order_over(&candidates)?;
    order.reverse();
    Ok(Plan::rollback(order))
}

/// Checks that no id in `candidates` requires rolling back a ghost with no
/// recorded rollback — spec's "dangling rollback target" validation error.
/// Ghosts themselves carry no reconstructable rollback payload in this
/// engine, so any ghost present in a rollback set is fatal.
fn validate_rollback_targets(graph: &MigrationGraph, candidates: &BTreeSet<String>) -> Result<(), YoyoError> {
    for id in candidates {
        if graph.is_ghost(id) {
            return Err(YoyoError::DanglingRollbackTarget {
                migration: id.clone(),
                descendant: id.clone(),
            });
        }
    }
    Ok(())
}

/// `reapply` = rollback plan followed by apply plan for the same set.
pub fn reapply(graph: &MigrationGraph, applied: &AppliedSet, target: Option<&str>) -> Result<Plan, YoyoError> {
    let rollback_plan = to_rollback(graph, applied, target)?;
    let ids: BTreeSet<String> = rollback_plan.steps.iter().map(|s| s.id.clone()).collect();

    let apply_order = graph.topological_order_over(&ids)?;
    Ok(rollback_plan.then(Plan::apply(apply_order)))
}

/// `develop` = apply all unapplied; if none, rollback-then-reapply the `n`
/// most recently applied (from the log, not the graph).
pub fn develop(graph: &MigrationGraph, applied: &AppliedSet, n: usize) -> Result<Plan, YoyoError> {
    let unapplied_plan = to_apply(graph, applied, None)?;
    if !unapplied_plan.is_empty() {
        return Ok(unapplied_plan);
    }

    let recent = applied.most_recent(n);
    let recent_set: BTreeSet<String> = recent.into_iter().collect();
    validate_rollback_targets(graph, &recent_set)?;

    let mut rollback_order = graph.topological_order_over(&recent_set)?;
    rollback_order.reverse();
    let apply_order = graph.topological_order_over(&recent_set)?;

    Ok(Plan::rollback(rollback_order).then(Plan::apply(apply_order)))
}

/// `mark`/`unmark` update the applied-set without executing steps. These
/// return the ids to write into (or delete from) bookkeeping; the caller
/// (executor) performs the idempotent insert/delete.
pub fn mark_targets(graph: &MigrationGraph, applied: &AppliedSet, target: &str) -> Result<Vec<String>, YoyoError> {
    let mut set = graph.ancestors(target);
    set.insert(target.to_string());
    let candidates: BTreeSet<String> = set.difference(applied.ids()).cloned().collect();
    graph.topological_order_over(&candidates)
}

pub fn unmark_targets(graph: &MigrationGraph, applied: &AppliedSet, target: &str) -> Result<Vec<String>, YoyoError> {
    let mut set = graph.descendants(target);
    set.insert(target.to_string());
    let candidates: BTreeSet<String> = set.intersection(applied.ids()).cloned().collect();
    let mut order = graph.topological_order_over(&candidates)?;
    order.reverse();
    Ok(order)
}
