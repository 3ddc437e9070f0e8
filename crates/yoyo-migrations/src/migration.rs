//! Migration structs and dependency graph.
//!
//! A [`Migration`] is a named unit of schema change containing a sequence of
//! [`Step`]s. The [`MigrationGraph`] manages the dependency DAG across all
//! loaded migrations plus ghost vertices for ids recorded as applied but no
//! longer present on disk, enabling deterministic topological ordering.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use yoyo_core::YoyoError;

/// What a [`Step`]'s payload actually does when executed.
#[derive(Clone)]
pub enum Payload {
    /// A single SQL statement, dispatched verbatim.
    Sql(String),
    /// An opaque callable invoked with a live connection (in-language
    /// migration scripts, §9).
    Callable(Arc<dyn StepCallable>),
    /// A nested ordered list of steps sharing one savepoint.
    Group(Vec<Step>),
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
            Self::Group(steps) => f.debug_tuple("Group").field(steps).finish(),
        }
    }
}

/// A callable step payload for in-language migration scripts.
///
/// Implementations receive the backend trait object for the current
/// migration's connection and are responsible for raising a [`YoyoError`]
/// on failure exactly like a failed SQL statement would.
#[async_trait::async_trait]
pub trait StepCallable: Send + Sync {
    async fn call(&self, backend: &dyn yoyo_backends::DatabaseBackend) -> Result<(), YoyoError>;
}

/// Which directions a step's `ignore_errors` policy covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreErrors {
    None,
    Apply,
    Rollback,
    All,
}

impl IgnoreErrors {
    /// Whether this policy covers the given direction.
    pub fn covers(self, direction: Direction) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Apply => direction == Direction::Apply,
            Self::Rollback => direction == Direction::Rollback,
        }
    }
}

/// The direction a plan executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Apply,
    Rollback,
}

/// One sub-unit of a migration.
#[derive(Debug, Clone)]
pub struct Step {
    pub apply: Payload,
    pub rollback: Option<Payload>,
    pub ignore_errors: IgnoreErrors,
}

impl Step {
    /// Creates a plain SQL step with no rollback and no error tolerance.
    pub fn sql(apply: impl Into<String>) -> Self {
        Self {
            apply: Payload::Sql(apply.into()),
            rollback: None,
            ignore_errors: IgnoreErrors::None,
        }
    }

    /// Creates an SQL step with a paired rollback statement.
    pub fn sql_pair(apply: impl Into<String>, rollback: impl Into<String>) -> Self {
        Self {
            apply: Payload::Sql(apply.into()),
            rollback: Some(Payload::Sql(rollback.into())),
            ignore_errors: IgnoreErrors::None,
        }
    }

    pub fn with_ignore_errors(mut self, policy: IgnoreErrors) -> Self {
        self.ignore_errors = policy;
        self
    }
}

/// Whether a migration's steps came from a SQL apply/rollback file pair or
/// an in-language script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationKind {
    SqlPair,
    InlineCodeScript,
}

/// A single migration: a globally unique id, its dependency set, and the
/// steps it executes.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Globally unique id, equal to the source file's stem.
    pub id: String,
    /// Absolute path to the source file, kept for diagnostics.
    pub source_path: PathBuf,
    pub kind: MigrationKind,
    /// Ids this migration depends on; may reference ghosts.
    pub depends_on: BTreeSet<String>,
    pub steps: Vec<Step>,
    /// Whether this migration runs inside a wrapping transaction.
    pub transactional: bool,
    /// True iff `id == "post-apply"`; post-apply migrations are not graph
    /// vertices and are never recorded in bookkeeping.
    pub is_post_apply: bool,
}

impl Migration {
    pub fn new(id: impl Into<String>, source_path: PathBuf, kind: MigrationKind) -> Self {
        let id = id.into();
        let is_post_apply = id == "post-apply";
        Self {
            id,
            source_path,
            kind,
            depends_on: BTreeSet::new(),
            steps: Vec::new(),
            transactional: true,
            is_post_apply,
        }
    }

    /// A stable hash of the migration's id, used as the bookkeeping
    /// primary key (spec §3, §6: `migration_hash`).
    pub fn hash(&self) -> String {
        hash_id(&self.id)
    }
}

/// Computes the stable bookkeeping hash for a migration id (spec §3, §6:
/// `migration_hash`). A pure function of the id, so ghost vertices and
/// mark/unmark (spec §4.2) can hash an id without a loaded [`Migration`].
pub fn hash_id(id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, hasher.finalize())
}

/// A vertex in the graph for an id recorded as applied in bookkeeping but
/// no longer present among the loaded sources (spec §4.2).
#[derive(Debug, Clone)]
pub struct GhostVertex {
    pub id: String,
}

enum Node {
    Loaded(Migration),
    Ghost(GhostVertex),
}

impl Node {
    fn id(&self) -> &str {
        match self {
            Self::Loaded(m) => &m.id,
            Self::Ghost(g) => &g.id,
        }
    }

    fn depends_on(&self) -> BTreeSet<String> {
        match self {
            Self::Loaded(m) => m.depends_on.clone(),
            Self::Ghost(_) => BTreeSet::new(),
        }
    }
}

/// A directed acyclic graph over migration ids, plus ghost vertices for
/// applied-but-missing ids.
pub struct MigrationGraph {
    nodes: HashMap<String, Node>,
    /// edges from dependency id to the set of ids that depend on it.
    forward_edges: HashMap<String, BTreeSet<String>>,
}

impl Default for MigrationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            forward_edges: HashMap::new(),
        }
    }

    /// Builds a graph from loaded migrations and the current applied-set.
    /// Applied ids with no corresponding loaded migration become ghost
    /// vertices. Post-apply migrations are excluded (spec §3).
    ///
    /// # Errors
    ///
    /// Returns a load error on duplicate id, unknown dependency, or a
    /// cycle.
    pub fn build(migrations: Vec<Migration>, applied_ids: &BTreeSet<String>) -> Result<Self, YoyoError> {
        let mut graph = Self::new();
        let mut seen_ids: HashMap<String, PathBuf> = HashMap::new();

        for migration in migrations {
            if migration.is_post_apply {
                continue;
            }
            if let Some(first_path) = seen_ids.get(&migration.id) {
                return Err(YoyoError::DuplicateId {
                    id: migration.id.clone(),
                    first: first_path.display().to_string(),
                    second: migration.source_path.display().to_string(),
                });
            }
            seen_ids.insert(migration.id.clone(), migration.source_path.clone());
            graph.add_loaded(migration);
        }

        let loaded_ids: BTreeSet<String> = graph.nodes.keys().cloned().collect();
        for ghost_id in applied_ids.difference(&loaded_ids) {
            graph.add_ghost(ghost_id.clone());
        }

        graph.link_edges()?;
        graph.topological_order()?;
        Ok(graph)
    }

    fn add_loaded(&mut self, migration: Migration) {
        let id = migration.id.clone();
        self.nodes.insert(id.clone(), Node::Loaded(migration));
        self.forward_edges.entry(id).or_default();
    }

    fn add_ghost(&mut self, id: String) {
        self.nodes
            .insert(id.clone(), Node::Ghost(GhostVertex { id: id.clone() }));
        self.forward_edges.entry(id).or_default();
    }

    fn link_edges(&mut self) -> Result<(), YoyoError> {
        let deps: Vec<(String, BTreeSet<String>)> = self
            .nodes
            .values()
            .map(|n| (n.id().to_string(), n.depends_on()))
            .collect();

        for (child, parents) in deps {
            for parent in parents {
                if !self.nodes.contains_key(&parent) {
                    return Err(YoyoError::UnknownDependency {
                        migration: child.clone(),
                        missing: parent,
                    });
                }
                self.forward_edges
                    .entry(parent)
                    .or_default()
                    .insert(child.clone());
            }
        }
        Ok(())
    }

    /// Returns whether `id` names a ghost vertex.
    pub fn is_ghost(&self, id: &str) -> bool {
        matches!(self.nodes.get(id), Some(Node::Ghost(_)))
    }

    /// Returns whether the graph contains `id` (loaded or ghost).
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns the loaded migration for `id`, if it is not a ghost.
    pub fn get(&self, id: &str) -> Option<&Migration> {
        match self.nodes.get(id) {
            Some(Node::Loaded(m)) => Some(m),
            _ => None,
        }
    }

    /// Direct dependencies of `id`.
    pub fn dependencies(&self, id: &str) -> BTreeSet<String> {
        self.nodes
            .get(id)
            .map(Node::depends_on)
            .unwrap_or_default()
    }

    /// Direct dependents of `id`.
    pub fn dependents(&self, id: &str) -> BTreeSet<String> {
        self.forward_edges.get(id).cloned().unwrap_or_default()
    }

    /// All ids transitively depended on by `id` (not including `id`).
    pub fn ancestors(&self, id: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let mut queue: VecDeque<String> = self.dependencies(id).into_iter().collect();
        while let Some(next) = queue.pop_front() {
            if result.insert(next.clone()) {
                queue.extend(self.dependencies(&next));
            }
        }
        result
    }

    /// All ids transitively depending on `id` (not including `id`).
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let mut queue: VecDeque<String> = self.dependents(id).into_iter().collect();
        while let Some(next) = queue.pop_front() {
            if result.insert(next.clone()) {
                queue.extend(self.dependents(&next));
            }
        }
        result
    }

    /// Returns all ids in the graph.
    pub fn ids(&self) -> BTreeSet<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deterministic topological order over the whole graph: at each step,
    /// among vertices whose unsatisfied dependencies are zero, picks the
    /// lexicographically smallest id (spec §4.2).
    ///
    /// # Errors
    ///
    /// Returns a cycle error if the graph is not acyclic.
    pub fn topological_order(&self) -> Result<Vec<String>, YoyoError> {
        self.topological_order_over(&self.ids())
    }

    /// Topological order restricted to `subset`; edges to ids outside the
    /// subset are treated as already satisfied.
    pub fn topological_order_over(&self, subset: &BTreeSet<String>) -> Result<Vec<String>, YoyoError> {
        let mut in_degree: HashMap<String, usize> = HashMap::new();
        for id in subset {
            let deps_in_subset = self
                .dependencies(id)
                .into_iter()
                .filter(|d| subset.contains(d))
                .count();
            in_degree.insert(id.clone(), deps_in_subset);
        }

        let mut ready: BTreeSet<String> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(id, _)| id.clone())
            .collect();

        let mut result = Vec::with_capacity(subset.len());
        while let Some(next) = ready.iter().next().cloned() {
            ready.remove(&next);
            result.push(next.clone());
            for dependent in self.dependents(&next) {
                if !subset.contains(&dependent) {
                    continue;
                }
                if let Some(deg) = in_degree.get_mut(&dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if result.len() != subset.len() {
            return Err(YoyoError::Cycle(
                subset.difference(&result.iter().cloned().collect()).cloned().collect(),
            ));
        }

        Ok(result)
    }
}
