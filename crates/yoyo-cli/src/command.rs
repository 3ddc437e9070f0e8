//! Management command framework for yoyo.
//!
//! This module provides the [`ManagementCommand`] trait for defining CLI
//! commands and [`CommandRegistry`] for registering and discovering them.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use yoyo_cli::command::ManagementCommand;
//! use yoyo_core::{Settings, YoyoError};
//!
//! struct GreetCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for GreetCommand {
//!     fn name(&self) -> &str { "greet" }
//!     fn help(&self) -> &str { "Say hello" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         _settings: &Settings,
//!     ) -> Result<(), YoyoError> {
//!         println!("Hello from yoyo!");
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use yoyo_core::{Settings, YoyoError};

/// A management command that can be registered and invoked through the CLI.
///
/// Implementations define a name, help text, optional arguments, and an
/// async handler. All commands must be `Send + Sync` to support concurrent
/// execution.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// Returns the name of this command (used to invoke it from the CLI).
    fn name(&self) -> &str;

    /// Returns a short help description for this command.
    fn help(&self) -> &str;

    /// Adds custom arguments to the clap command.
    ///
    /// Override this to add positional arguments, flags, or options.
    /// The default implementation returns the command unchanged.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Executes the command with the given argument matches and settings.
    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError>;
}

/// Global flags shared by every subcommand (spec §6): `--database`,
/// `--batch`, `-p/--prompt-password`, `--no-config-file`, `-r/--revision`,
/// `-v/-q`.
fn global_arguments(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        clap::Arg::new("database")
            .long("database")
            .value_name("URL")
            .global(true)
            .help("Database connection URL"),
    )
    .arg(
        clap::Arg::new("batch")
            .long("batch")
            .action(clap::ArgAction::SetTrue)
            .global(true)
            .help("Run non-interactively: skip the per-migration confirmation prompt"),
    )
    .arg(
        clap::Arg::new("prompt-password")
            .short('p')
            .long("prompt-password")
            .action(clap::ArgAction::SetTrue)
            .global(true)
            .help("Prompt for the database password rather than reading it from the URL"),
    )
    .arg(
        clap::Arg::new("no-config-file")
            .long("no-config-file")
            .action(clap::ArgAction::SetTrue)
            .global(true)
            .help("Do not read the yoyo.toml configuration file"),
    )
    .arg(
        clap::Arg::new("revision")
            .short('r')
            .long("revision")
            .value_name("ID")
            .global(true)
            .help("Target migration id"),
    )
    .arg(
        clap::Arg::new("verbose")
            .short('v')
            .action(clap::ArgAction::Count)
            .global(true)
            .help("Increase verbosity (repeatable)"),
    )
    .arg(
        clap::Arg::new("quiet")
            .short('q')
            .action(clap::ArgAction::Count)
            .global(true)
            .help("Decrease verbosity (repeatable)"),
    )
}

/// A registry of management commands.
///
/// Commands are registered by name and can be looked up, listed, or
/// executed. This is the central dispatcher for the `yoyo` binary.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a management command.
    ///
    /// If a command with the same name already exists, it is replaced.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Returns a reference to the command with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns a sorted list of all registered command names.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds a top-level clap `Command` containing all registered
    /// subcommands plus the shared global flags.
    pub fn build_cli(&self) -> clap::Command {
        let app = clap::Command::new("yoyo")
            .about("A database schema-migration engine")
            .subcommand_required(true);
        let mut app = global_arguments(app);

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| (*name).clone());

        for (name, cmd) in entries {
            // clap requires &'static str for command names. Commands are
            // registered once at startup, so the leak is bounded.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            let subcmd = cmd.add_arguments(subcmd);
            app = app.subcommand(subcmd);
        }

        app
    }

    /// Executes the command identified by the given argument matches.
    pub async fn execute(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), YoyoError> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| YoyoError::MalformedMigration {
            path: "<cli>".to_string(),
            reason: "no subcommand specified".to_string(),
        })?;

        let cmd = self.get(name).ok_or_else(|| YoyoError::MalformedMigration {
            path: "<cli>".to_string(),
            reason: format!("unknown command: {name}"),
        })?;

        cmd.handle(sub_matches, settings).await
    }
}
