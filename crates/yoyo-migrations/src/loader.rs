//! Migration source loading: specifier resolution, file classification,
//! SQL tokenizing, and directive parsing (spec §4.1, §6).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use yoyo_core::YoyoError;

use crate::migration::{Migration, MigrationKind, Step};

/// Resolves a `package:<name>:<subpath>` source specifier to a filesystem
/// directory. The core never hardcodes a language runtime's package
/// layout (spec §6); callers supply their own resolver, or use
/// [`NullPackageResolver`] when no package-form specifiers are expected.
pub trait PackageResolver: Send + Sync {
    fn resolve(&self, package: &str, subpath: &str) -> Result<PathBuf, YoyoError>;
}

/// A [`PackageResolver`] that always errors; used where a deployment has
/// no package-relative sources configured.
#[derive(Debug, Default)]
pub struct NullPackageResolver;

impl PackageResolver for NullPackageResolver {
    fn resolve(&self, package: &str, _subpath: &str) -> Result<PathBuf, YoyoError> {
        Err(YoyoError::UnreadableSource {
            path: format!("package:{package}"),
            reason: "no package resolver configured".to_string(),
        })
    }
}

/// Supplies the declarative step/dependency result of an in-language
/// migration script (spec §4.1, §9). The core treats each step's apply/
/// rollback as opaque callables; it never parses the script language
/// itself.
pub trait CodeScriptProvider: Send + Sync {
    /// Returns `true` if this provider handles files with the given
    /// extension (e.g. `"rhai"`).
    fn handles_extension(&self, extension: &str) -> bool;

    /// Loads a code-script migration from `path`, returning its steps,
    /// dependency set, and transactional flag.
    fn load(&self, path: &Path) -> Result<CodeScriptResult, YoyoError>;
}

/// The declarative result of loading one code-script migration file.
pub struct CodeScriptResult {
    pub steps: Vec<Step>,
    pub depends_on: BTreeSet<String>,
    pub transactional: bool,
}

/// Resolves source specifiers and parses migration files.
pub struct MigrationLoader {
    package_resolver: Box<dyn PackageResolver>,
    script_providers: Vec<Box<dyn CodeScriptProvider>>,
}

impl Default for MigrationLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationLoader {
    pub fn new() -> Self {
        Self {
            package_resolver: Box::new(NullPackageResolver),
            script_providers: Vec::new(),
        }
    }

    pub fn with_package_resolver(mut self, resolver: Box<dyn PackageResolver>) -> Self {
        self.package_resolver = resolver;
        self
    }

    pub fn with_script_provider(mut self, provider: Box<dyn CodeScriptProvider>) -> Self {
        self.script_providers.push(provider);
        self
    }

    /// Resolves the given source specifiers (filesystem globs or
    /// `package:<name>:<subpath>` tokens) into an ordered list of
    /// migrations, plus the post-apply hook's steps if a `post-apply.*`
    /// file was found.
    ///
    /// # Errors
    ///
    /// Returns a load error on an unreadable source, a malformed
    /// directive, or (via the caller feeding the result into
    /// [`crate::migration::MigrationGraph::build`]) a duplicate id, cycle,
    /// or unknown dependency.
    pub fn load(&self, specifiers: &[String]) -> Result<Vec<Migration>, YoyoError> {
        let mut migrations = Vec::new();
        for specifier in specifiers {
            let dirs = self.resolve_specifier(specifier)?;
            for dir in dirs {
                migrations.extend(self.load_directory(&dir)?);
            }
        }
        Ok(migrations)
    }

    fn resolve_specifier(&self, specifier: &str) -> Result<Vec<PathBuf>, YoyoError> {
        if let Some(rest) = specifier.strip_prefix("package:") {
            let mut parts = rest.splitn(2, ':');
            let package = parts.next().unwrap_or_default();
            let subpath = parts.next().unwrap_or_default();
            return Ok(vec![self.package_resolver.resolve(package, subpath)?]);
        }

        if specifier.contains(['*', '?', '[']) {
            let paths: Vec<PathBuf> = glob::glob(specifier)
                .map_err(|e| YoyoError::UnreadableSource {
                    path: specifier.to_string(),
                    reason: e.to_string(),
                })?
                .filter_map(Result::ok)
                .filter(|p| p.is_dir())
                .collect();
            Ok(paths)
        } else {
            Ok(vec![PathBuf::from(specifier)])
        }
    }

    fn load_directory(&self, dir: &Path) -> Result<Vec<Migration>, YoyoError> {
        let mut migrations = Vec::new();
        let entries = std::fs::read_dir(dir).map_err(|e| YoyoError::UnreadableSource {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut sql_files: Vec<PathBuf> = Vec::new();
        let mut script_files: Vec<PathBuf> = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| YoyoError::UnreadableSource {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.ends_with(".rollback.sql") {
                continue;
            }
            if name == "post-apply.sql" {
                sql_files.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("sql") {
                sql_files.push(path);
            } else if self.provider_for(&path).is_some() {
                script_files.push(path);
            }
        }

        for path in sql_files {
            migrations.push(self.load_sql_migration(&path)?);
        }
        for path in script_files {
            migrations.push(self.load_script_migration(&path)?);
        }

        Ok(migrations)
    }

    fn provider_for(&self, path: &Path) -> Option<&dyn CodeScriptProvider> {
        let ext = path.extension()?.to_str()?;
        self.script_providers
            .iter()
            .map(AsRef::as_ref)
            .find(|p| p.handles_extension(ext))
    }

    fn load_sql_migration(&self, path: &Path) -> Result<Migration, YoyoError> {
        let id = stem(path);
        let apply_source = read_file(path)?;
        let rollback_path = rollback_sibling(path);
        let rollback_source = rollback_path
            .filter(|p| p.exists())
            .map(|p| read_file(&p))
            .transpose()?;

        let depends_on = parse_depends(&apply_source);
        let transactional = parse_transactional(&apply_source);

        let apply_statements = split_statements(&apply_source);
        let rollback_statements = rollback_source
            .as_deref()
            .map(split_statements)
            .unwrap_or_default();

        let mut migration = Migration::new(&id, path.to_path_buf(), MigrationKind::SqlPair);
        migration.depends_on = depends_on;
        migration.transactional = transactional;
        migration.steps = pair_apply_rollback(apply_statements, rollback_statements);
        Ok(migration)
    }

    fn load_script_migration(&self, path: &Path) -> Result<Migration, YoyoError> {
        let id = stem(path);
        let provider = self.provider_for(path).ok_or_else(|| YoyoError::MalformedMigration {
            path: path.display().to_string(),
            reason: "no code-script provider registered for this extension".to_string(),
        })?;
        let result = provider.load(path)?;

        let mut migration = Migration::new(&id, path.to_path_buf(), MigrationKind::InlineCodeScript);
        migration.depends_on = result.depends_on;
        migration.transactional = result.transactional;
        migration.steps = result.steps;
        Ok(migration)
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

fn rollback_sibling(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    Some(path.with_file_name(format!("{stem}.rollback.sql")))
}

fn read_file(path: &Path) -> Result<String, YoyoError> {
    std::fs::read_to_string(path).map_err(|e| YoyoError::UnreadableSource {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn parse_depends(source: &str) -> BTreeSet<String> {
    let re = Regex::new(r"(?i)^\s*--\s*depends:\s*(.+)$").expect("valid regex");
    let mut deps = BTreeSet::new();
    for line in source.lines() {
        if let Some(caps) = re.captures(line) {
            for id in caps[1].split_whitespace() {
                deps.insert(id.to_string());
            }
        }
    }
    deps
}

fn parse_transactional(source: &str) -> bool {
    let re = Regex::new(r"(?i)^\s*--\s*transactional:\s*(true|false)\s*$").expect("valid regex");
    for line in source.lines() {
        if let Some(caps) = re.captures(line) {
            return caps[1].eq_ignore_ascii_case("true");
        }
    }
    true
}

/// Splits a SQL source string into individual statements, aware of
/// single/double-quoted literals, `--` line comments, `/* */` block
/// comments (non-nesting), dollar-quoted strings (`$tag$ ... $tag$`), and
/// the `;` terminator. Empty statements are discarded (spec §4.1).
pub fn split_statements(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i += 2;
            }
            '\'' | '"' => {
                current.push(c);
                let quote = c;
                i += 1;
                while i < chars.len() {
                    current.push(chars[i]);
                    if chars[i] == quote {
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '$' => {
                if let Some((tag, consumed)) = dollar_tag(&chars, i) {
                    current.push_str(&tag);
                    i += consumed;
                    if let Some(end) = find_dollar_close(&chars, i, &tag) {
                        current.push_str(&chars[i..end].iter().collect::<String>());
                        current.push_str(&tag);
                        i = end + tag.len();
                    } else {
                        current.extend(&chars[i..]);
                        i = chars.len();
                    }
                } else {
                    current.push(c);
                    i += 1;
                }
            }
            ';' => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    statements.push(trimmed.to_string());
                }
                current.clear();
                i += 1;
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }

    statements
}

fn dollar_tag(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut end = start + 1;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    if end < chars.len() && chars[end] == '$' {
        let tag: String = chars[start..=end].iter().collect();
        Some((tag, end - start + 1))
    } else {
        None
    }
}

fn find_dollar_close(chars: &[char], from: usize, tag: &str) -> Option<usize> {
    let tag_chars: Vec<char> = tag.chars().collect();
    let mut i = from;
    while i + tag_chars.len() <= chars.len() {
        if chars[i..i + tag_chars.len()] == tag_chars[..] {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Pairs apply statements with rollback statements per the deterministic
/// rule in spec §4.1: statement *i* of apply pairs with statement
/// *n-1-i* of rollback when counts match; otherwise the whole rollback
/// file attaches to the last apply step.
fn pair_apply_rollback(apply: Vec<String>, rollback: Vec<String>) -> Vec<Step> {
    use crate::migration::Payload;

    if apply.is_empty() {
        return Vec::new();
    }

    if !rollback.is_empty() && apply.len() == rollback.len() {
        let n = rollback.len();
        apply
            .into_iter()
            .enumerate()
            .map(|(i, stmt)| Step {
                apply: Payload::Sql(stmt),
                rollback: Some(Payload::Sql(rollback[n - 1 - i].clone())),
                ignore_errors: crate::migration::IgnoreErrors::None,
            })
            .collect()
    } else {
        let last_index = apply.len() - 1;
        apply
            .into_iter()
            .enumerate()
            .map(|(i, stmt)| {
                let step_rollback = if i == last_index && !rollback.is_empty() {
                    Some(Payload::Sql(rollback.join(";\n")))
                } else {
                    None
                };
                Step {
                    apply: Payload::Sql(stmt),
                    rollback: step_rollback,
                    ignore_errors: crate::migration::IgnoreErrors::None,
                }
            })
            .collect()
    }
}
