//! The `break-lock` command: forcibly clears the cross-process migration
//! lock, for recovering from a crashed holder (spec §5's lock).

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};

use crate::command::ManagementCommand;
use crate::support;

pub struct BreakLockCommand;

#[async_trait]
impl ManagementCommand for BreakLockCommand {
    fn name(&self) -> &str {
        "break-lock"
    }

    fn help(&self) -> &str {
        "Forcibly clear the migration lock"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        if !settings.batch {
            print!("This will forcibly clear the migration lock, even if another process is \
                     still running. Proceed? [y/N] ");
            use std::io::Write as _;
            std::io::stdout().flush().ok();
            let mut answer = String::new();
            std::io::stdin().read_line(&mut answer).ok();
            if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Not breaking the lock.");
                return Ok(());
            }
        }

        let backend = support::open_backend(settings)?;
        yoyo_backends::lock::break_lock(backend.as_ref()).await?;
        println!("Lock cleared.");
        Ok(())
    }
}
