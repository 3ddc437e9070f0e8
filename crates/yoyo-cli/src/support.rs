//! Shared plumbing used by every subcommand: connecting a backend from
//! `Settings`, loading the migration graph, and the "print the plan, prompt
//! unless `--batch`" interaction spec §7 requires of every command that
//! touches the database.

use std::io::Write as _;

use yoyo_backends::{DatabaseBackend, DatabaseConfig, Vendor};
use yoyo_core::{Settings, YoyoError};
use yoyo_migrations::loader::MigrationLoader;
use yoyo_migrations::planner::{AppliedSet, Plan, PlanDirection};
use yoyo_migrations::{executor::bookkeeping, Executor, Migration, MigrationGraph, RhaiScriptProvider};

/// Opens the backend named by `settings.database_url`.
///
/// # Errors
///
/// Returns [`YoyoError::Connection`] if the URL cannot be parsed or names a
/// vendor this build was not compiled with support for.
pub fn open_backend(settings: &Settings) -> Result<Box<dyn DatabaseBackend>, YoyoError> {
    let config = DatabaseConfig::from_url(&settings.database_url)?;

    match config.vendor {
        #[cfg(feature = "sqlite")]
        Vendor::Sqlite => {
            let backend = if config.name == ":memory:" {
                yoyo_backends::sqlite::SqliteBackend::memory()?
            } else {
                yoyo_backends::sqlite::SqliteBackend::open(config.name.clone())?
            };
            Ok(Box::new(backend))
        }
        #[cfg(feature = "postgres")]
        Vendor::PostgreSql => Ok(Box::new(yoyo_backends::postgresql::PostgresBackend::from_config(&config)?)),
        #[cfg(feature = "mysql")]
        Vendor::MySql => Ok(Box::new(yoyo_backends::mysql::MySqlBackend::from_config(&config)?)),
        #[allow(unreachable_patterns)]
        other => Err(YoyoError::Connection {
            url: settings.redacted_database_url(),
            reason: format!("this build has no driver compiled in for {}", other.as_str()),
        }),
    }
}

/// Loads the migration graph: ensures bookkeeping exists, reads the applied
/// set, loads sources, and builds the graph (ghost vertices included for
/// applied ids with no surviving source file). Also returns the
/// `post-apply.*` hook migration, if one was found among the sources (spec
/// §3, §4.3, §8) — it is not a graph vertex and is never recorded in
/// bookkeeping, so [`MigrationGraph::build`] filters it out.
pub async fn load_graph(
    settings: &Settings,
    backend: &dyn DatabaseBackend,
) -> Result<(MigrationGraph, AppliedSet, Option<Migration>), YoyoError> {
    bookkeeping::ensure_schema(backend).await?;
    let applied_ids = bookkeeping::applied_ids_in_order(backend).await?;
    let applied_set: std::collections::BTreeSet<String> = applied_ids.iter().cloned().collect();

    let loader = MigrationLoader::new().with_script_provider(Box::new(RhaiScriptProvider::new()));
    let migrations = loader.load(&settings.sources)?;
    let post_apply = migrations.iter().find(|m| m.is_post_apply).cloned();
    let graph = MigrationGraph::build(migrations, &applied_set)?;

    Ok((graph, AppliedSet::new(applied_ids), post_apply))
}

/// Prints the migrations a plan is about to touch, and unless
/// `settings.batch`, prompts for confirmation on stdin.
///
/// Returns `true` if the plan should proceed.
pub fn confirm_plan(plan: &Plan, settings: &Settings) -> Result<bool, YoyoError> {
    if plan.is_empty() {
        println!("Nothing to do.");
        return Ok(false);
    }

    println!("The following migrations will be touched:");
    for step in &plan.steps {
        let verb = match step.direction {
            PlanDirection::Apply => "apply",
            PlanDirection::Rollback => "rollback",
        };
        println!("  {verb:<8} {}", step.id);
    }

    if settings.batch {
        return Ok(true);
    }

    print!("Proceed? [y/N] ");
    std::io::stdout().flush().ok();
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer).ok();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// As [`confirm_plan`], but for the id lists `mark`/`unmark` produce —
/// bookkeeping-only operations with no SQL execution.
pub fn confirm_ids(ids: &[String], verb: &str, settings: &Settings) -> bool {
    if ids.is_empty() {
        println!("Nothing to do.");
        return false;
    }

    println!("The following migrations will be {verb} without running their steps:");
    for id in ids {
        println!("  {id}");
    }

    if settings.batch {
        return true;
    }

    print!("Proceed? [y/N] ");
    std::io::stdout().flush().ok();
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer).ok();
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Runs `plan` against `backend`, acquiring the migration lock for the
/// duration, and reports the outcome to stdout. `post_apply` is run once
/// after a fully successful apply-only plan (spec §3, §4.3, §8).
pub async fn run_plan(
    backend: &dyn DatabaseBackend,
    graph: &MigrationGraph,
    plan: &Plan,
    post_apply: Option<&Migration>,
    settings: &Settings,
) -> Result<(), YoyoError> {
    let mut executor = Executor::new();
    let actor = yoyo_migrations::Actor::current();

    executor
        .run_with_timeout(
            backend,
            |id| graph.get(id),
            plan,
            &actor,
            post_apply,
            std::time::Duration::from_secs(settings.lock_timeout_seconds),
        )
        .await?;

    for step in &plan.steps {
        let verb = match step.direction {
            PlanDirection::Apply => "applied",
            PlanDirection::Rollback => "rolled back",
        };
        println!("{} {}", step.id, verb);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_backend_rejects_unrecognized_scheme() {
        let mut settings = Settings::default();
        settings.database_url = "oracle://localhost/xe".to_string();
        let result = open_backend(&settings);
        assert!(result.is_err());
    }

    #[test]
    fn test_confirm_plan_empty_plan_is_false() {
        let plan = Plan { steps: Vec::new() };
        let settings = Settings::default();
        assert!(!confirm_plan(&plan, &settings).unwrap());
    }
}
