//! End-to-end tests of the full data flow: sources -> loader -> graph ->
//! planner -> executor -> backend -> database, against a real SQLite
//! in-memory database. These exercise the concrete scenarios and
//! round-trip laws from spec §8.

use std::collections::BTreeSet;
use std::fs;

use yoyo_backends::sqlite::SqliteBackend;
use yoyo_backends::DatabaseBackend;
use yoyo_migrations::executor::{bookkeeping, Actor};
use yoyo_migrations::{loader::MigrationLoader, planner, Executor, MigrationGraph};

fn actor() -> Actor {
    Actor {
        username: "tester".to_string(),
        hostname: "ci".to_string(),
    }
}

fn write_migration(dir: &std::path::Path, stem: &str, apply: &str, rollback: Option<&str>) {
    fs::write(dir.join(format!("{stem}.sql")), apply).unwrap();
    if let Some(rollback) = rollback {
        fs::write(dir.join(format!("{stem}.rollback.sql")), rollback).unwrap();
    }
}

// ── Scenario 1: two dependent migrations apply then roll back cleanly ──

#[tokio::test]
async fn test_scenario_apply_then_rollback_two_dependent_migrations() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "0001", "CREATE TABLE t(id INT)", Some("DROP TABLE t"));
    write_migration(
        dir.path(),
        "0002",
        "-- depends: 0001\nALTER TABLE t ADD c INT",
        Some("ALTER TABLE t DROP COLUMN c"),
    );

    let backend = SqliteBackend::memory().unwrap();
    let loader = MigrationLoader::new();
    let migrations = loader
        .load(&[dir.path().to_str().unwrap().to_string()])
        .unwrap();

    let applied = BTreeSet::new();
    let graph = MigrationGraph::build(migrations, &applied).unwrap();
    let applied_set = planner::AppliedSet::default();

    let plan = planner::to_apply(&graph, &applied_set, None).unwrap();
    let apply_order: Vec<String> = plan.steps.iter().map(|s| s.id.clone()).collect();
    assert_eq!(apply_order, vec!["0001", "0002"]);

    let mut executor = Executor::new();
    let actor = actor();
    executor
        .run(&backend, |id| graph.get(id), &plan, &actor, None)
        .await
        .unwrap();

    let applied_ids = bookkeeping::applied_ids_in_order(&backend).await.unwrap();
    assert_eq!(applied_ids, vec!["0001", "0002"]);

    let applied_after = planner::AppliedSet::new(applied_ids);
    let rollback_plan = planner::to_rollback(&graph, &applied_after, None).unwrap();
    let rollback_order: Vec<String> = rollback_plan.steps.iter().map(|s| s.id.clone()).collect();
    assert_eq!(rollback_order, vec!["0002", "0001"]);

    executor
        .run(&backend, |id| graph.get(id), &rollback_plan, &actor, None)
        .await
        .unwrap();

    let applied_ids = bookkeeping::applied_ids_in_order(&backend).await.unwrap();
    assert!(applied_ids.is_empty());
}

// ── Scenario 3: ignore_errors="apply" lets the plan proceed past a failure ──

#[tokio::test]
async fn test_scenario_ignore_errors_apply_lets_plan_proceed() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "0001", "CREATE TABLE t(id INT)", Some("DROP TABLE t"));
    write_migration(
        dir.path(),
        "0002",
        "-- depends: 0001\nSELECT this is not valid sql",
        None,
    );
    write_migration(
        dir.path(),
        "0003",
        "-- depends: 0002\nCREATE TABLE u(id INT)",
        Some("DROP TABLE u"),
    );

    let backend = SqliteBackend::memory().unwrap();
    let loader = MigrationLoader::new();
    let mut migrations = loader
        .load(&[dir.path().to_str().unwrap().to_string()])
        .unwrap();

    for m in &mut migrations {
        if m.id == "0002" {
            for step in &mut m.steps {
                step.ignore_errors = yoyo_migrations::IgnoreErrors::Apply;
            }
        }
    }

    let graph = MigrationGraph::build(migrations, &BTreeSet::new()).unwrap();
    let applied_set = planner::AppliedSet::default();
    let plan = planner::to_apply(&graph, &applied_set, None).unwrap();

    let mut executor = Executor::new();
    let actor = actor();
    executor
        .run(&backend, |id| graph.get(id), &plan, &actor, None)
        .await
        .unwrap();

    let applied_ids = bookkeeping::applied_ids_in_order(&backend).await.unwrap();
    assert_eq!(applied_ids, vec!["0001", "0002", "0003"]);
}

// ── Scenario 6: develop rolls back and reapplies the n most recent ──

#[tokio::test]
async fn test_scenario_develop_rolls_back_and_reapplies_n_most_recent() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "0001", "CREATE TABLE a(id INT)", Some("DROP TABLE a"));
    write_migration(
        dir.path(),
        "0002",
        "-- depends: 0001\nCREATE TABLE b(id INT)",
        Some("DROP TABLE b"),
    );
    write_migration(
        dir.path(),
        "0003",
        "-- depends: 0002\nCREATE TABLE c(id INT)",
        Some("DROP TABLE c"),
    );

    let backend = SqliteBackend::memory().unwrap();
    let loader = MigrationLoader::new();
    let migrations = loader
        .load(&[dir.path().to_str().unwrap().to_string()])
        .unwrap();

    let graph = MigrationGraph::build(migrations, &BTreeSet::new()).unwrap();
    let mut executor = Executor::new();
    let actor = actor();

    let apply_all = planner::to_apply(&graph, &planner::AppliedSet::default(), None).unwrap();
    executor
        .run(&backend, |id| graph.get(id), &apply_all, &actor, None)
        .await
        .unwrap();

    let applied_ids = bookkeeping::applied_ids_in_order(&backend).await.unwrap();
    let applied_set = planner::AppliedSet::new(applied_ids);

    let develop_plan = planner::develop(&graph, &applied_set, 2).unwrap();
    let rollback_ids: Vec<&str> = develop_plan
        .steps
        .iter()
        .filter(|s| s.direction == planner::PlanDirection::Rollback)
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(rollback_ids, vec!["0003", "0002"]);

    executor
        .run(&backend, |id| graph.get(id), &develop_plan, &actor, None)
        .await
        .unwrap();

    let final_ids = bookkeeping::applied_ids_in_order(&backend).await.unwrap();
    let final_set: BTreeSet<String> = final_ids.into_iter().collect();
    assert_eq!(
        final_set,
        vec!["0001".to_string(), "0002".to_string(), "0003".to_string()]
            .into_iter()
            .collect()
    );
}

// ── Boundary behaviors ───────────────────────────────────────────────

#[tokio::test]
async fn test_empty_sources_directory_applies_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let loader = MigrationLoader::new();
    let migrations = loader
        .load(&[dir.path().to_str().unwrap().to_string()])
        .unwrap();
    assert!(migrations.is_empty());

    let graph = MigrationGraph::build(migrations, &BTreeSet::new()).unwrap();
    let plan = planner::to_apply(&graph, &planner::AppliedSet::default(), None).unwrap();
    assert!(plan.is_empty());
}

#[tokio::test]
async fn test_apply_twice_is_a_noop_on_the_second_call() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "0001", "CREATE TABLE t(id INT)", Some("DROP TABLE t"));

    let backend = SqliteBackend::memory().unwrap();
    let loader = MigrationLoader::new();
    let migrations = loader
        .load(&[dir.path().to_str().unwrap().to_string()])
        .unwrap();
    let graph = MigrationGraph::build(migrations, &BTreeSet::new()).unwrap();

    let mut executor = Executor::new();
    let actor = actor();

    let plan = planner::to_apply(&graph, &planner::AppliedSet::default(), None).unwrap();
    executor
        .run(&backend, |id| graph.get(id), &plan, &actor, None)
        .await
        .unwrap();

    let applied_ids = bookkeeping::applied_ids_in_order(&backend).await.unwrap();
    let applied_set = planner::AppliedSet::new(applied_ids);
    let second_plan = planner::to_apply(&graph, &applied_set, None).unwrap();
    assert!(second_plan.is_empty());
}

#[tokio::test]
async fn test_post_apply_hook_runs_and_is_never_recorded() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "0001", "CREATE TABLE t(id INT)", Some("DROP TABLE t"));
    write_migration(dir.path(), "post-apply", "CREATE TABLE audit(id INT)", None);

    let backend = SqliteBackend::memory().unwrap();
    let loader = MigrationLoader::new();
    let mut migrations = loader
        .load(&[dir.path().to_str().unwrap().to_string()])
        .unwrap();

    let post_apply_index = migrations.iter().position(|m| m.id == "post-apply").unwrap();
    let post_apply = migrations.remove(post_apply_index);

    let graph = MigrationGraph::build(migrations, &BTreeSet::new()).unwrap();
    assert!(!graph.contains("post-apply"));

    let mut executor = Executor::new();
    let actor = actor();
    let plan = planner::to_apply(&graph, &planner::AppliedSet::default(), None).unwrap();
    executor
        .run(&backend, |id| graph.get(id), &plan, &actor, Some(&post_apply))
        .await
        .unwrap();

    let audit_table = backend
        .query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='audit'",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(audit_table.len(), 1);

    let applied_ids = bookkeeping::applied_ids_in_order(&backend).await.unwrap();
    assert_eq!(applied_ids, vec!["0001".to_string()]);
}
