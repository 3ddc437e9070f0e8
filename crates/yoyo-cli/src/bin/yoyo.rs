//! The `yoyo` binary: parses arguments, resolves settings, sets up
//! logging, and dispatches to the registered management command.

use yoyo_cli::commands::register_builtin_commands;
use yoyo_cli::{resolve_settings, CommandRegistry};

#[tokio::main]
async fn main() {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);

    let cli = registry.build_cli();
    let matches = cli.get_matches();
    let settings = resolve_settings(&matches);

    yoyo_core::logging::setup_logging(&settings);

    // Racing the command future against ctrl_c (rather than spawning it)
    // means SIGINT drops the in-flight await point, closing whatever
    // connection a transaction is pinned to — the driver's own
    // close-mid-transaction rollback then covers spec §5's "rolls back the
    // current step's transaction" without yoyo needing a cancellation
    // token threaded through the executor.
    tokio::select! {
        result = registry.execute(&matches, &settings) => {
            if let Err(err) = result {
                eprintln!("error: {err}");
                std::process::exit(exit_code(&err));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, rolling back in-flight step");
            eprintln!("interrupted");
            std::process::exit(130);
        }
    }
}

/// Maps an error's class to a process exit code. Distinct codes per class
/// are recommended but not semantically required (spec.md §6).
fn exit_code(err: &yoyo_core::YoyoError) -> i32 {
    match err.kind() {
        "load" => 2,
        "connection" => 3,
        "lock" => 4,
        "execution" => 5,
        "non_transactional" => 6,
        "schema_drift" => 7,
        _ => 1,
    }
}
