//! The `init` command: creates the bookkeeping tables on a database that
//! has never been migrated before (spec §6's persisted schema).

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};
use yoyo_migrations::executor::bookkeeping;

use crate::command::ManagementCommand;
use crate::support;

pub struct InitCommand;

#[async_trait]
impl ManagementCommand for InitCommand {
    fn name(&self) -> &str {
        "init"
    }

    fn help(&self) -> &str {
        "Create the bookkeeping tables"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        let backend = support::open_backend(settings)?;
        bookkeeping::ensure_schema(backend.as_ref()).await?;
        println!("Bookkeeping tables are up to date.");
        Ok(())
    }
}
