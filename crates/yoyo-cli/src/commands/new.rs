//! The `new` command: creates a `<id>.sql` / `<id>.rollback.sql` pair and
//! opens them in `$EDITOR`. The richer templated-generation and
//! layered-config collaborators spec.md §6 calls out of scope; this is the
//! minimal front-end needed to exercise the full data flow end-to-end
//! (SPEC_FULL.md §6).

use std::io::Write as _;
use std::process::Command;

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};

use crate::command::ManagementCommand;

pub struct NewCommand;

#[async_trait]
impl ManagementCommand for NewCommand {
    fn name(&self) -> &str {
        "new"
    }

    fn help(&self) -> &str {
        "Create a new migration file pair"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("id")
                .required(true)
                .value_name("ID")
                .help("The new migration's id"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        let id = matches
            .get_one::<String>("id")
            .expect("id is a required argument");

        let source_dir = settings
            .sources
            .first()
            .cloned()
            .unwrap_or_else(|| ".".to_string());
        let dir = std::path::Path::new(&source_dir);
        std::fs::create_dir_all(dir).map_err(|e| YoyoError::UnreadableSource {
            path: source_dir.clone(),
            reason: e.to_string(),
        })?;

        let apply_path = dir.join(format!("{id}.sql"));
        let rollback_path = dir.join(format!("{id}.rollback.sql"));

        if apply_path.exists() || rollback_path.exists() {
            return Err(YoyoError::DuplicateId {
                id: id.clone(),
                first: apply_path.display().to_string(),
                second: rollback_path.display().to_string(),
            });
        }

        write_template(&apply_path, "-- Write the forward migration below.\n")?;
        write_template(&rollback_path, "-- Write the rollback for the migration above.\n")?;

        println!("Created {}", apply_path.display());
        println!("Created {}", rollback_path.display());

        if !settings.batch {
            if let Ok(editor) = std::env::var("EDITOR") {
                if !editor.is_empty() {
                    let _ = Command::new(editor).arg(&apply_path).status();
                }
            }
        }

        Ok(())
    }
}

fn write_template(path: &std::path::Path, contents: &str) -> Result<(), YoyoError> {
    let mut file = std::fs::File::create(path).map_err(|e| YoyoError::UnreadableSource {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    file.write_all(contents.as_bytes())
        .map_err(|e| YoyoError::UnreadableSource {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}
