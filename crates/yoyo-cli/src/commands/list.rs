//! The `list` command: shows every known migration in dependency order,
//! marking which are applied, pending, or ghosts (spec §4.2).

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};

use crate::command::ManagementCommand;
use crate::support;

pub struct ListCommand;

#[async_trait]
impl ManagementCommand for ListCommand {
    fn name(&self) -> &str {
        "list"
    }

    fn help(&self) -> &str {
        "List known migrations and their status"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        let backend = support::open_backend(settings)?;
        let (graph, applied, _post_apply) = support::load_graph(settings, backend.as_ref()).await?;

        for id in graph.topological_order()? {
            let status = if graph.is_ghost(&id) {
                "ghost"
            } else if applied.contains(&id) {
                "applied"
            } else {
                "pending"
            };
            println!("{status:<8} {id}");
        }
        Ok(())
    }
}
