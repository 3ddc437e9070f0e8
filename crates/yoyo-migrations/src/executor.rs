//! Execution engine: drives a [`Plan`](crate::planner::Plan) against a live
//! backend — per-migration transaction, per-step savepoint, `ignore_errors`
//! policy, bookkeeping writes, and the post-apply hook (spec §4.3).
//!
//! Generalizes the teacher's `MigrationExecutor`/`MigrationRecorder` pair:
//! where the teacher drove `Operation`s through a `SchemaEditor` against an
//! in-memory `ProjectState`, this engine drives `Step` payloads straight
//! against a [`DatabaseBackend`], since yoyo migrations already carry their
//! own SQL/callable payloads rather than deriving them from model diffs.

use yoyo_backends::{DatabaseBackend, Savepoint, Value};
use yoyo_core::YoyoError;

use crate::migration::{Direction, Migration, Payload, Step};
use crate::planner::{Plan, PlanDirection};

/// Identifies who is running the command, persisted on applied/log rows.
#[derive(Debug, Clone)]
pub struct Actor {
    pub username: String,
    pub hostname: String,
}

impl Actor {
    /// Resolves the current OS user and hostname via
    /// [`yoyo_core::identity::current_identity`].
    pub fn current() -> Self {
        let (username, hostname) = yoyo_core::identity::current_identity();
        Self { username, hostname }
    }

    fn applied_by(&self) -> String {
        format!("{}@{}", self.username, self.hostname)
    }
}

/// Bookkeeping table DDL/DML: the four tables spec §6 names
/// (`_yoyo_migration`, `_yoyo_log`, `_yoyo_version`, `yoyo_lock`).
/// `yoyo_lock` itself is owned by [`yoyo_backends::lock`]; this module owns
/// the other three. Timestamps are stored as RFC 3339 text, the one column
/// type every vendor's `TEXT`/`VARCHAR` accepts without per-vendor DDL
/// branching (consistent with the simplified cross-backend `Value` enum).
pub mod bookkeeping {
    use super::*;

    pub const SCHEMA_VERSION: i32 = 1;

    /// Idempotently creates the bookkeeping tables and seeds the version
    /// row if absent.
    pub async fn ensure_schema(backend: &dyn DatabaseBackend) -> Result<(), YoyoError> {
        let q = |s: &str| backend.quote_identifier(s);

        backend
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (\
                     {} TEXT PRIMARY KEY, {} TEXT NOT NULL, \
                     {} TEXT NOT NULL, {} TEXT NOT NULL)",
                    q("_yoyo_migration"),
                    q("migration_hash"),
                    q("migration_id"),
                    q("applied_at_utc"),
                    q("applied_by_user"),
                ),
                &[],
            )
            .await?;

        backend
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (\
                     {} TEXT PRIMARY KEY, {} TEXT NOT NULL, {} TEXT NOT NULL, \
                     {} TEXT NOT NULL, {} TEXT NOT NULL, {} TEXT NOT NULL, \
                     {} TEXT, {} TEXT NOT NULL)",
                    q("_yoyo_log"),
                    q("id"),
                    q("migration_hash"),
                    q("migration_id"),
                    q("operation"),
                    q("username"),
                    q("hostname"),
                    q("comment"),
                    q("created_at_utc"),
                ),
                &[],
            )
            .await?;

        backend
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY, {} TEXT NOT NULL)",
                    q("_yoyo_version"),
                    q("version"),
                    q("installed_at_utc"),
                ),
                &[],
            )
            .await?;

        yoyo_backends::lock::ensure_lock_table(backend).await?;

        migrate_schema_forward(backend).await
    }

    /// Detects the recorded schema version and migrates forward if it is
    /// older than [`SCHEMA_VERSION`]. There is exactly one version so far;
    /// this is the hook future bookkeeping changes attach to.
    pub async fn migrate_schema_forward(backend: &dyn DatabaseBackend) -> Result<(), YoyoError> {
        let rows = backend
            .query("SELECT version FROM _yoyo_version", &[])
            .await?;

        if let Some(row) = rows.first() {
            let found = row.get_int("version").unwrap_or(SCHEMA_VERSION as i64) as i32;
            if found > SCHEMA_VERSION {
                return Err(YoyoError::SchemaDrift {
                    found,
                    expected: SCHEMA_VERSION,
                    reason: "bookkeeping schema is newer than this engine understands".to_string(),
                });
            }
            return Ok(());
        }

        backend
            .execute(
                "INSERT INTO _yoyo_version (version, installed_at_utc) VALUES (?, ?)",
                &[
                    Value::Int(SCHEMA_VERSION as i64),
                    Value::from(chrono::Utc::now().to_rfc3339()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Applied ids in the order bookkeeping recorded them, oldest first —
    /// the ordering `develop`'s "n most recently applied" needs.
    pub async fn applied_ids_in_order(backend: &dyn DatabaseBackend) -> Result<Vec<String>, YoyoError> {
        let rows = backend
            .query(
                "SELECT migration_id FROM _yoyo_migration ORDER BY applied_at_utc ASC",
                &[],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.get_string("migration_id").ok())
            .collect())
    }

    /// Inserts an applied row and an `apply` log row. A no-op if the row
    /// already exists (spec §4.2's bookkeeping idempotence).
    pub async fn record_applied(
        backend: &dyn DatabaseBackend,
        migration: &Migration,
        actor: &Actor,
    ) -> Result<(), YoyoError> {
        record_applied_by_id(backend, &migration.id, actor).await
    }

    /// As [`record_applied`], but for an id with no loaded [`Migration`] —
    /// `mark` needs this for ghost ids (applied but source-deleted).
    pub async fn record_applied_by_id(
        backend: &dyn DatabaseBackend,
        id: &str,
        actor: &Actor,
    ) -> Result<(), YoyoError> {
        let hash = crate::migration::hash_id(id);
        let existing = backend
            .query(
                "SELECT migration_hash FROM _yoyo_migration WHERE migration_hash = ?",
                &[Value::from(hash.clone())],
            )
            .await?;
        if !existing.is_empty() {
            return Ok(());
        }

        backend
            .execute(
                "INSERT INTO _yoyo_migration (migration_hash, migration_id, applied_at_utc, applied_by_user) \
                 VALUES (?, ?, ?, ?)",
                &[
                    Value::from(hash.clone()),
                    Value::from(id.to_string()),
                    Value::from(chrono::Utc::now().to_rfc3339()),
                    Value::from(actor.applied_by()),
                ],
            )
            .await?;

        append_log_row(backend, id, &hash, "apply", actor, None).await
    }

    /// Deletes the applied row and appends a `rollback` log row. A no-op if
    /// the row is already absent.
    pub async fn unrecord_applied(
        backend: &dyn DatabaseBackend,
        migration: &Migration,
        actor: &Actor,
    ) -> Result<(), YoyoError> {
        unrecord_applied_by_id(backend, &migration.id, actor).await
    }

    /// As [`unrecord_applied`], but for an id with no loaded [`Migration`]
    /// — `unmark` needs this for ghost ids (applied but source-deleted).
    pub async fn unrecord_applied_by_id(
        backend: &dyn DatabaseBackend,
        id: &str,
        actor: &Actor,
    ) -> Result<(), YoyoError> {
        let hash = crate::migration::hash_id(id);
        backend
            .execute(
                "DELETE FROM _yoyo_migration WHERE migration_hash = ?",
                &[Value::from(hash.clone())],
            )
            .await?;

        append_log_row(backend, id, &hash, "rollback", actor, None).await
    }

    /// Appends a row to the append-only `_yoyo_log` table. Used both for
    /// successful apply/rollback/mark/unmark operations and, on failure,
    /// for a fresh autocommitted insert outside the aborted transaction
    /// (spec §7).
    pub async fn append_log_row(
        backend: &dyn DatabaseBackend,
        migration_id: &str,
        migration_hash: &str,
        operation: &str,
        actor: &Actor,
        comment: Option<&str>,
    ) -> Result<(), YoyoError> {
        backend
            .execute(
                "INSERT INTO _yoyo_log \
                 (id, migration_hash, migration_id, operation, username, hostname, comment, created_at_utc) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    Value::from(uuid::Uuid::new_v4().to_string()),
                    Value::from(migration_hash.to_string()),
                    Value::from(migration_id.to_string()),
                    Value::from(operation.to_string()),
                    Value::from(actor.username.clone()),
                    Value::from(actor.hostname.clone()),
                    comment.map_or(Value::Null, |c| Value::from(c.to_string())),
                    Value::from(chrono::Utc::now().to_rfc3339()),
                ],
            )
            .await?;
        Ok(())
    }
}

/// Drives one [`Plan`] to completion, holding the cross-process lock for
/// its entire duration (spec §4.5).
pub struct Executor {
    counter: u64,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    fn next_savepoint(&mut self) -> Savepoint {
        let sp = Savepoint::numbered(self.counter);
        self.counter += 1;
        sp
    }

    /// Runs `plan` against `backend`, resolving each step's migration from
    /// `lookup`, then (if the plan succeeded) runs `post_apply` in apply
    /// direction without writing bookkeeping rows. Waits up to 60 seconds
    /// for the migration lock; see [`Self::run_with_timeout`] to configure
    /// that wait.
    pub async fn run(
        &mut self,
        backend: &dyn DatabaseBackend,
        lookup: impl Fn(&str) -> Option<&Migration>,
        plan: &Plan,
        actor: &Actor,
        post_apply: Option<&Migration>,
    ) -> Result<(), YoyoError> {
        self.run_with_timeout(backend, lookup, plan, actor, post_apply, std::time::Duration::from_secs(60))
            .await
    }

    /// As [`Self::run`], but with an explicit timeout for acquiring the
    /// migration lock (spec §6's `lock_timeout_seconds` setting).
    pub async fn run_with_timeout(
        &mut self,
        backend: &dyn DatabaseBackend,
        lookup: impl Fn(&str) -> Option<&Migration>,
        plan: &Plan,
        actor: &Actor,
        post_apply: Option<&Migration>,
        lock_timeout: std::time::Duration,
    ) -> Result<(), YoyoError> {
        bookkeeping::ensure_schema(backend).await?;

        let pid = std::process::id() as i64;
        let guard = yoyo_backends::lock::acquire(backend, pid, lock_timeout).await?;

        let result = self.run_locked(backend, &lookup, plan, actor, post_apply).await;

        yoyo_backends::lock::release(backend, &guard).await?;
        result
    }

    async fn run_locked(
        &mut self,
        backend: &dyn DatabaseBackend,
        lookup: &impl Fn(&str) -> Option<&Migration>,
        plan: &Plan,
        actor: &Actor,
        post_apply: Option<&Migration>,
    ) -> Result<(), YoyoError> {
        for step in &plan.steps {
            let migration = lookup(&step.id).ok_or_else(|| {
                YoyoError::UnknownDependency {
                    migration: step.id.clone(),
                    missing: step.id.clone(),
                }
            })?;
            let direction = match step.direction {
                PlanDirection::Apply => Direction::Apply,
                PlanDirection::Rollback => Direction::Rollback,
            };
            self.execute_migration(backend, migration, direction, actor, true).await?;
        }

        if let Some(hook) = post_apply {
            self.execute_migration(backend, hook, Direction::Apply, actor, false).await?;
        }

        Ok(())
    }

    /// Executes one migration end-to-end: outer transaction (if
    /// transactional), each step in direction order, then bookkeeping
    /// writes (unless `record_bookkeeping` is false, used for the
    /// post-apply hook).
    async fn execute_migration(
        &mut self,
        backend: &dyn DatabaseBackend,
        migration: &Migration,
        direction: Direction,
        actor: &Actor,
        record_bookkeeping: bool,
    ) -> Result<(), YoyoError> {
        if migration.transactional {
            backend.begin().await?;
        }

        let ordered: Vec<&Step> = match direction {
            Direction::Apply => migration.steps.iter().collect(),
            Direction::Rollback => migration.steps.iter().rev().collect(),
        };

        for (idx, step) in ordered.iter().enumerate() {
            if let Err(e) = self.execute_step(backend, step, direction).await {
                let statement = describe_step(step, direction);
                let hash = migration.hash();

                if migration.transactional {
                    let _ = backend.rollback().await;
                    bookkeeping::append_log_row(
                        backend,
                        &migration.id,
                        &hash,
                        log_operation(direction),
                        actor,
                        Some(&e.to_string()),
                    )
                    .await?;
                    return Err(YoyoError::Execution {
                        migration: migration.id.clone(),
                        step: idx,
                        statement,
                        reason: e.to_string(),
                    });
                } else {
                    bookkeeping::append_log_row(
                        backend,
                        &migration.id,
                        &hash,
                        log_operation(direction),
                        actor,
                        Some(&e.to_string()),
                    )
                    .await?;
                    return Err(YoyoError::NonTransactionalFailure {
                        migration: migration.id.clone(),
                        step: idx,
                        statement,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if record_bookkeeping {
            match direction {
                Direction::Apply => bookkeeping::record_applied(backend, migration, actor).await?,
                Direction::Rollback => bookkeeping::unrecord_applied(backend, migration, actor).await?,
            }
        }

        if migration.transactional {
            backend.commit().await?;
        }

        Ok(())
    }

    /// Executes one step: establishes a savepoint, runs the step's payload
    /// for `direction`, and on failure either swallows the error (when
    /// `ignore_errors` covers this direction) or propagates it to the
    /// caller, which aborts the migration.
    async fn execute_step(
        &mut self,
        backend: &dyn DatabaseBackend,
        step: &Step,
        direction: Direction,
    ) -> Result<(), YoyoError> {
        let payload = match direction {
            Direction::Apply => Some(&step.apply),
            Direction::Rollback => step.rollback.as_ref(),
        };
        let Some(payload) = payload else {
            return Ok(());
        };

        let sp = self.next_savepoint();
        backend.savepoint(&sp).await?;

        match execute_payload(backend, payload, direction).await {
            Ok(()) => {
                backend.release_savepoint(&sp).await?;
                Ok(())
            }
            Err(e) => {
                if step.ignore_errors.covers(direction) {
                    backend.rollback_to_savepoint(&sp).await?;
                    Ok(())
                } else {
                    backend.rollback_to_savepoint(&sp).await?;
                    Err(e)
                }
            }
        }
    }
}

/// Executes a single payload. A [`Payload::Group`]'s nested steps run
/// sequentially sharing the parent step's savepoint — no savepoint is
/// established per nested step, since the group's own `ignore_errors`
/// (on the enclosing [`Step`]) governs the whole group (spec §4.3).
fn execute_payload<'a>(
    backend: &'a dyn DatabaseBackend,
    payload: &'a Payload,
    direction: Direction,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), YoyoError>> + Send + 'a>> {
    Box::pin(async move {
        match payload {
            Payload::Sql(sql) => {
                backend.execute(sql, &[]).await?;
                Ok(())
            }
            Payload::Callable(callable) => callable.call(backend).await,
            Payload::Group(steps) => {
                let ordered: Vec<&Step> = match direction {
                    Direction::Apply => steps.iter().collect(),
                    Direction::Rollback => steps.iter().rev().collect(),
                };
                for step in ordered {
                    let nested_payload = match direction {
                        Direction::Apply => Some(&step.apply),
                        Direction::Rollback => step.rollback.as_ref(),
                    };
                    if let Some(nested_payload) = nested_payload {
                        execute_payload(backend, nested_payload, direction).await?;
                    }
                }
                Ok(())
            }
        }
    })
}

fn log_operation(direction: Direction) -> &'static str {
    match direction {
        Direction::Apply => "apply",
        Direction::Rollback => "rollback",
    }
}

fn describe_step(step: &Step, direction: Direction) -> String {
    let payload = match direction {
        Direction::Apply => Some(&step.apply),
        Direction::Rollback => step.rollback.as_ref(),
    };
    match payload {
        Some(Payload::Sql(sql)) => truncate(sql, 200),
        Some(Payload::Callable(_)) => "<callable>".to_string(),
        Some(Payload::Group(_)) => "<group>".to_string(),
        None => "<no-op>".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max])
    }
}
