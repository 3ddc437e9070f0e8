//! The `apply` command: applies pending migrations up to `-r/--revision`
//! (or all of them), in dependency order (spec §4.2's `to_apply`).

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};
use yoyo_migrations::planner;

use crate::command::ManagementCommand;
use crate::support;

pub struct ApplyCommand;

#[async_trait]
impl ManagementCommand for ApplyCommand {
    fn name(&self) -> &str {
        "apply"
    }

    fn help(&self) -> &str {
        "Apply pending migrations"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        let backend = support::open_backend(settings)?;
        let (graph, applied, post_apply) = support::load_graph(settings, backend.as_ref()).await?;
        let plan = planner::to_apply(&graph, &applied, settings.revision.as_deref())?;

        if support::confirm_plan(&plan, settings)? {
            support::run_plan(backend.as_ref(), &graph, &plan, post_apply.as_ref(), settings).await?;
        }
        Ok(())
    }
}
