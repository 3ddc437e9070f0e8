//! The `mark` command: records migrations as applied in bookkeeping
//! without running their steps, for schemas that were already brought up
//! to date by other means (spec §4.2's `mark`).

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};
use yoyo_migrations::{executor::bookkeeping, planner};

use crate::command::ManagementCommand;
use crate::support;

pub struct MarkCommand;

#[async_trait]
impl ManagementCommand for MarkCommand {
    fn name(&self) -> &str {
        "mark"
    }

    fn help(&self) -> &str {
        "Record migrations as applied without running them"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        let target = settings.revision.as_deref().ok_or_else(|| YoyoError::MalformedMigration {
            path: "<cli>".to_string(),
            reason: "mark requires -r/--revision ID".to_string(),
        })?;

        let backend = support::open_backend(settings)?;
        let (graph, applied, _post_apply) = support::load_graph(settings, backend.as_ref()).await?;
        let ids = planner::mark_targets(&graph, &applied, target)?;

        if !support::confirm_ids(&ids, "marked applied", settings) {
            return Ok(());
        }

        let pid = i64::from(std::process::id());
        let guard = yoyo_backends::lock::acquire(
            backend.as_ref(),
            pid,
            std::time::Duration::from_secs(settings.lock_timeout_seconds),
        )
        .await?;

        let actor = yoyo_migrations::Actor::current();
        let result = mark_all(backend.as_ref(), &ids, &actor).await;

        yoyo_backends::lock::release(backend.as_ref(), &guard).await?;
        result
    }
}

async fn mark_all(
    backend: &dyn yoyo_backends::DatabaseBackend,
    ids: &[String],
    actor: &yoyo_migrations::Actor,
) -> Result<(), YoyoError> {
    for id in ids {
        bookkeeping::record_applied_by_id(backend, id, actor).await?;
        println!("{id} marked applied");
    }
    Ok(())
}
