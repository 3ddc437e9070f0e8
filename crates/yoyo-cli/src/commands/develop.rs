//! The `develop` command: applies everything pending, or if nothing is
//! pending, rolls back and re-applies the `n` most recently applied
//! migrations — the inner-loop command for iterating on a migration that
//! is already applied (spec §4.2's `develop`).

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};
use yoyo_migrations::planner;

use crate::command::ManagementCommand;
use crate::support;

pub struct DevelopCommand;

#[async_trait]
impl ManagementCommand for DevelopCommand {
    fn name(&self) -> &str {
        "develop"
    }

    fn help(&self) -> &str {
        "Apply pending migrations, or cycle the n most recently applied ones"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("n")
                .short('n')
                .value_name("N")
                .default_value("1")
                .value_parser(clap::value_parser!(usize))
                .help("How many of the most recently applied migrations to cycle"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        let n = matches.get_one::<usize>("n").copied().unwrap_or(1);

        let backend = support::open_backend(settings)?;
        let (graph, applied, post_apply) = support::load_graph(settings, backend.as_ref()).await?;
        let plan = planner::develop(&graph, &applied, n)?;

        if support::confirm_plan(&plan, settings)? {
            support::run_plan(backend.as_ref(), &graph, &plan, post_apply.as_ref(), settings).await?;
        }
        Ok(())
    }
}
