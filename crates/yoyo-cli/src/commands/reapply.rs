//! The `reapply` command: rolls back then re-applies migrations down to
//! (and including) `-r/--revision`, useful after editing an already-applied
//! migration's SQL (spec §4.2's `reapply`).

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};
use yoyo_migrations::planner;

use crate::command::ManagementCommand;
use crate::support;

pub struct ReapplyCommand;

#[async_trait]
impl ManagementCommand for ReapplyCommand {
    fn name(&self) -> &str {
        "reapply"
    }

    fn help(&self) -> &str {
        "Roll back then re-apply migrations"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        let backend = support::open_backend(settings)?;
        let (graph, applied, post_apply) = support::load_graph(settings, backend.as_ref()).await?;
        let plan = planner::reapply(&graph, &applied, settings.revision.as_deref())?;

        if support::confirm_plan(&plan, settings)? {
            support::run_plan(backend.as_ref(), &graph, &plan, post_apply.as_ref(), settings).await?;
        }
        Ok(())
    }
}
