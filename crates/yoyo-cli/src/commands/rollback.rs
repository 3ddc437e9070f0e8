//! The `rollback` command: rolls back applied migrations down to
//! `-r/--revision` (or all of them), in reverse dependency order (spec
//! §4.2's `to_rollback`).

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};
use yoyo_migrations::planner;

use crate::command::ManagementCommand;
use crate::support;

pub struct RollbackCommand;

#[async_trait]
impl ManagementCommand for RollbackCommand {
    fn name(&self) -> &str {
        "rollback"
    }

    fn help(&self) -> &str {
        "Roll back applied migrations"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        let backend = support::open_backend(settings)?;
        let (graph, applied, _post_apply) = support::load_graph(settings, backend.as_ref()).await?;
        let plan = planner::to_rollback(&graph, &applied, settings.revision.as_deref())?;

        if support::confirm_plan(&plan, settings)? {
            support::run_plan(backend.as_ref(), &graph, &plan, None, settings).await?;
        }
        Ok(())
    }
}
