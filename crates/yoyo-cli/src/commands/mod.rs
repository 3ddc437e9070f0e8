//! Built-in management commands: `new`, `list`, `apply`, `rollback`,
//! `reapply`, `develop`, `mark`, `unmark`, `init`, `break-lock` (spec §6).
//! Each implements the [`ManagementCommand`](crate::command::ManagementCommand)
//! trait.

pub mod apply;
pub mod break_lock;
pub mod develop;
pub mod init;
pub mod list;
pub mod mark;
pub mod new;
pub mod reapply;
pub mod rollback;
pub mod unmark;

pub use apply::ApplyCommand;
pub use break_lock::BreakLockCommand;
pub use develop::DevelopCommand;
pub use init::InitCommand;
pub use list::ListCommand;
pub use mark::MarkCommand;
pub use new::NewCommand;
pub use reapply::ReapplyCommand;
pub use rollback::RollbackCommand;
pub use unmark::UnmarkCommand;

use crate::command::CommandRegistry;

/// Registers every built-in command into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(NewCommand));
    registry.register(Box::new(ListCommand));
    registry.register(Box::new(ApplyCommand));
    registry.register(Box::new(RollbackCommand));
    registry.register(Box::new(ReapplyCommand));
    registry.register(Box::new(DevelopCommand));
    registry.register(Box::new(MarkCommand));
    registry.register(Box::new(UnmarkCommand));
    registry.register(Box::new(InitCommand));
    registry.register(Box::new(BreakLockCommand));
}
